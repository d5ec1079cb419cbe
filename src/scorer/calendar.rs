use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::config::release::HOLIDAY_RADIUS_DAYS;

/// Major holidays that depress release-week attention.
pub fn major_holidays(year: i32) -> Vec<(NaiveDate, &'static str)> {
    let fixed = [
        (1, 1, "New Year's Day"),
        (7, 4, "Independence Day"),
        (12, 25, "Christmas Day"),
        (12, 31, "New Year's Eve"),
    ];
    let mut days: Vec<(NaiveDate, &'static str)> = fixed
        .iter()
        .filter_map(|&(m, d, name)| NaiveDate::from_ymd_opt(year, m, d).map(|date| (date, name)))
        .collect();
    if let Some(thanksgiving) = NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Thu, 4) {
        days.push((thanksgiving, "Thanksgiving"));
    }
    days.sort();
    days
}

/// The closest major holiday within ±2 days of `date`, if any.
pub fn nearby_holiday(date: NaiveDate) -> Option<(NaiveDate, &'static str)> {
    (date.year() - 1..=date.year() + 1)
        .flat_map(major_holidays)
        .filter(|(h, _)| (*h - date).num_days().abs() <= HOLIDAY_RADIUS_DAYS)
        .min_by_key(|(h, _)| (*h - date).num_days().abs())
}

/// Fixed seasonal table for release dates.
pub fn calendar_score(date: NaiveDate) -> f64 {
    if nearby_holiday(date).is_some() {
        return 3.0;
    }
    match (date.month(), date.day()) {
        (12, d) if d >= 15 => 5.0,
        (6..=8, _) => 8.0,
        (1..=2, _) => 9.0,
        _ => 7.0,
    }
}

/// The next `weeks` Fridays strictly after `today`.
pub fn upcoming_fridays(today: NaiveDate, weeks: u32) -> Vec<NaiveDate> {
    let offset = (Weekday::Fri.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);
    let first = today + Duration::days(if offset == 0 { 7 } else { offset });
    (0..weeks as i64).map(|w| first + Duration::weeks(w)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn thanksgiving_is_fourth_thursday() {
        let holidays = major_holidays(2024);
        assert!(holidays.contains(&(d(2024, 11, 28), "Thanksgiving")));
    }

    #[test]
    fn holiday_radius_crosses_year_boundary() {
        assert_eq!(nearby_holiday(d(2024, 12, 30)).map(|(h, _)| h), Some(d(2024, 12, 31)));
        assert_eq!(nearby_holiday(d(2025, 1, 2)).map(|(h, _)| h), Some(d(2025, 1, 1)));
        assert!(nearby_holiday(d(2024, 7, 7)).is_none());
    }

    #[test]
    fn calendar_table() {
        assert_eq!(calendar_score(d(2024, 12, 24)), 3.0);
        assert_eq!(calendar_score(d(2024, 12, 18)), 5.0);
        assert_eq!(calendar_score(d(2024, 7, 12)), 8.0);
        assert_eq!(calendar_score(d(2024, 7, 5)), 3.0);
        assert_eq!(calendar_score(d(2024, 2, 9)), 9.0);
        assert_eq!(calendar_score(d(2024, 10, 11)), 7.0);
    }

    #[test]
    fn fridays_exclude_today() {
        // 2024-06-07 is a Friday
        let fridays = upcoming_fridays(d(2024, 6, 7), 3);
        assert_eq!(fridays, vec![d(2024, 6, 14), d(2024, 6, 21), d(2024, 6, 28)]);

        let from_monday = upcoming_fridays(d(2024, 6, 10), 1);
        assert_eq!(from_monday, vec![d(2024, 6, 14)]);

        let from_saturday = upcoming_fridays(d(2024, 6, 8), 1);
        assert_eq!(from_saturday, vec![d(2024, 6, 14)]);
    }
}
