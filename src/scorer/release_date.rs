//! Release-date scoring over five weighted factors, with a first-week stream
//! prediction and reproducible advantage/risk text.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregator::stats::{clamp_score, interpolate, mean, pct_change, EPSILON};
use crate::config::{release::*, release_weights, HISTORY_LOOKBACK_DAYS};
use crate::error::EngineError;
use crate::scorer::calendar::{calendar_score, nearby_holiday, upcoming_fridays};
use crate::scorer::momentum::MomentumResult;
use crate::types::{AggregatedDayPoint, CompetingRelease};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Recommended,
    Caution,
    NotRecommended,
}

impl Recommendation {
    pub fn from_score(overall: f64) -> Self {
        if overall >= GREEN_LIGHT {
            Recommendation::Recommended
        } else if overall < NOT_RECOMMENDED {
            Recommendation::NotRecommended
        } else {
            Recommendation::Caution
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Recommendation::Recommended => "recommended",
            Recommendation::Caution => "caution",
            Recommendation::NotRecommended => "not_recommended",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReleaseFactors {
    pub momentum: f64,
    pub competition: f64,
    pub historical: f64,
    pub audience_readiness: f64,
    pub calendar: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseScoreResult {
    pub artist_id: String,
    pub date: NaiveDate,
    pub overall: f64,
    pub factors: ReleaseFactors,
    pub competing_release_count: usize,
    pub major_competitors: Vec<String>,
    pub predicted_first_week_streams: u64,
    /// (low, high) around the predicted median.
    pub confidence_interval: (u64, u64),
    pub advantages: Vec<String>,
    pub risks: Vec<String>,
    pub recommendation: Recommendation,
    pub recommendation_text: String,
    pub computed_at: DateTime<Utc>,
}

pub struct ReleaseContext<'a> {
    pub artist_id: &'a str,
    /// Genre used to match competing releases; every release competes when absent.
    pub genre: Option<&'a str>,
    pub momentum: &'a MomentumResult,
    /// Daily history, oldest first. Only the trailing 180 days are used.
    pub history: &'a [AggregatedDayPoint],
    pub competing: &'a [CompetingRelease],
    pub monthly_listeners: u64,
}

pub fn score_dates(
    ctx: &ReleaseContext<'_>,
    today: NaiveDate,
    weeks_ahead: u32,
) -> Result<Vec<ReleaseScoreResult>, EngineError> {
    if weeks_ahead == 0 || weeks_ahead > MAX_WEEKS_AHEAD {
        return Err(EngineError::InvalidWindow(format!(
            "weeks ahead must be 1..={MAX_WEEKS_AHEAD}, got {weeks_ahead}"
        )));
    }
    Ok(upcoming_fridays(today, weeks_ahead)
        .into_iter()
        .map(|date| score_date(ctx, date))
        .collect())
}

pub fn score_date(ctx: &ReleaseContext<'_>, date: NaiveDate) -> ReleaseScoreResult {
    let history = trailing_history(ctx.history);
    let rivals = competing_on(ctx.competing, ctx.genre, date);
    let majors: Vec<String> = rivals
        .iter()
        .filter(|r| r.followers >= MAJOR_FOLLOWERS)
        .map(|r| r.artist_name.clone())
        .collect();

    let momentum = clamp_score(ctx.momentum.overall, 0.0, 10.0);
    let factors = ReleaseFactors {
        momentum,
        competition: competition_score(rivals.len(), majors.len()),
        historical: historical_score(history, date.weekday()),
        audience_readiness: readiness_score(history),
        calendar: calendar_score(date),
    };

    let overall = clamp_score(
        factors.momentum * release_weights::MOMENTUM
            + factors.competition * release_weights::COMPETITION
            + factors.historical * release_weights::HISTORICAL
            + factors.audience_readiness * release_weights::AUDIENCE_READINESS
            + factors.calendar * release_weights::CALENDAR,
        0.0,
        10.0,
    );

    let (median, low, high) = predict_first_week(ctx.monthly_listeners, overall, momentum);
    let (advantages, risks) = explain(&factors, date, rivals.len(), majors.len());
    let recommendation = Recommendation::from_score(overall);

    debug!(
        artist_id = ctx.artist_id,
        %date,
        overall,
        competing = rivals.len(),
        %recommendation,
        "release date scored"
    );

    ReleaseScoreResult {
        artist_id: ctx.artist_id.to_string(),
        date,
        overall,
        factors,
        competing_release_count: rivals.len(),
        major_competitors: majors,
        predicted_first_week_streams: median,
        confidence_interval: (low, high),
        advantages,
        risks,
        recommendation,
        recommendation_text: recommendation_text(recommendation, date, overall),
        computed_at: Utc::now(),
    }
}

fn trailing_history(history: &[AggregatedDayPoint]) -> &[AggregatedDayPoint] {
    let Some(last) = history.last() else {
        return history;
    };
    let cutoff = last.date - Duration::days(HISTORY_LOOKBACK_DAYS as i64);
    let start = history.partition_point(|p| p.date <= cutoff);
    &history[start..]
}

fn competing_on<'c>(
    releases: &'c [CompetingRelease],
    genre: Option<&str>,
    date: NaiveDate,
) -> Vec<&'c CompetingRelease> {
    releases
        .iter()
        .filter(|r| r.release_date == date)
        .filter(|r| match (genre, r.genre.as_deref()) {
            (Some(ours), Some(theirs)) => ours.eq_ignore_ascii_case(theirs),
            (Some(_), None) => false,
            (None, _) => true,
        })
        .collect()
}

/// Ladder by competing count, minus 0.5 per major competitor.
pub fn competition_score(count: usize, majors: usize) -> f64 {
    let base = match count {
        0 => return 10.0,
        1..=3 => 9.0,
        4..=7 => 7.0,
        8..=15 => 5.0,
        _ => 3.0,
    };
    clamp_score(base - MAJOR_PENALTY * majors as f64, 0.0, 10.0)
}

/// Candidate weekday's mean listener level against the all-weekday mean.
fn historical_score(history: &[AggregatedDayPoint], weekday: Weekday) -> f64 {
    if history.len() < HISTORICAL_MIN_POINTS {
        return HISTORICAL_DEFAULT;
    }
    let all: Vec<f64> = history.iter().map(|p| p.monthly_listeners as f64).collect();
    let same_day: Vec<f64> = history
        .iter()
        .filter(|p| p.date.weekday() == weekday)
        .map(|p| p.monthly_listeners as f64)
        .collect();
    let (overall, weekday_mean) = match (mean(&all), mean(&same_day)) {
        (Some(o), Some(w)) if o >= EPSILON => (o, w),
        _ => return HISTORICAL_DEFAULT,
    };
    let ratio = weekday_mean / overall;
    if ratio >= 1.2 {
        9.0
    } else if ratio >= 1.1 {
        8.0
    } else if ratio >= 1.0 {
        7.0
    } else if ratio >= 0.9 {
        6.0
    } else {
        5.0
    }
}

/// Last-7-day listener trend against the 7 days before it.
fn readiness_score(history: &[AggregatedDayPoint]) -> f64 {
    if history.len() < READINESS_MIN_POINTS {
        return READINESS_DEFAULT;
    }
    let split = history.len() - 7;
    let prior_start = split.saturating_sub(7);
    let recent: Vec<f64> = history[split..].iter().map(|p| p.monthly_listeners as f64).collect();
    let prior: Vec<f64> = history[prior_start..split]
        .iter()
        .map(|p| p.monthly_listeners as f64)
        .collect();

    let trend = match (mean(&prior), mean(&recent)) {
        (Some(p), Some(r)) => pct_change(p, r, "audience readiness"),
        _ => return READINESS_DEFAULT,
    };
    match trend {
        Ok(pct) if pct >= 20.0 => 10.0,
        Ok(pct) if pct >= 10.0 => 8.5,
        Ok(pct) if pct >= 5.0 => 7.5,
        Ok(pct) if pct >= 0.0 => 6.5,
        Ok(pct) if pct > -10.0 => 5.0,
        Ok(_) => 4.0,
        Err(_) => READINESS_DEFAULT,
    }
}

/// (median, low, high) first-week streams.
fn predict_first_week(monthly_listeners: u64, overall: f64, momentum: f64) -> (u64, u64, u64) {
    let baseline = monthly_listeners as f64 / 30.0 * 7.0 * FIRST_WEEK_STREAM_FACTOR;
    let score_multiplier = interpolate(overall / 10.0, 0.0, 1.0, 0.7, 1.3);
    let momentum_multiplier = interpolate(momentum / 10.0, 0.0, 1.0, 0.8, 1.2);
    let median = baseline * score_multiplier * momentum_multiplier;
    (
        median.round() as u64,
        (median * CI_LOW).round() as u64,
        (median * CI_HIGH).round() as u64,
    )
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Mondays",
        Weekday::Tue => "Tuesdays",
        Weekday::Wed => "Wednesdays",
        Weekday::Thu => "Thursdays",
        Weekday::Fri => "Fridays",
        Weekday::Sat => "Saturdays",
        Weekday::Sun => "Sundays",
    }
}

/// Fixed rule list keyed on factor bands. Order of the output is stable.
fn explain(
    f: &ReleaseFactors,
    date: NaiveDate,
    competing: usize,
    majors: usize,
) -> (Vec<String>, Vec<String>) {
    let mut advantages = Vec::new();
    let mut risks = Vec::new();
    let day = weekday_name(date.weekday());

    if f.momentum >= 7.0 {
        advantages.push(format!(
            "Strong momentum ({:.1}/10) will carry first-week streams",
            f.momentum
        ));
    } else if f.momentum < 4.0 {
        risks.push(format!(
            "Weak momentum ({:.1}/10); build buzz before releasing",
            f.momentum
        ));
    }

    if competing == 0 {
        advantages.push("No competing releases in your genre on this date".to_string());
    } else if f.competition >= 8.0 {
        advantages.push(format!("Light competition: {competing} genre releases on this date"));
    } else if f.competition <= 5.0 {
        risks.push(format!(
            "Crowded date: {competing} competing releases ({majors} from major artists)"
        ));
    }

    if f.historical >= 8.0 {
        advantages.push(format!("{day} historically outperform your average listener level"));
    } else if f.historical <= 5.0 {
        risks.push(format!("{day} historically underperform your average listener level"));
    }

    if f.audience_readiness >= 8.0 {
        advantages.push("Listeners are rising week over week".to_string());
    } else if f.audience_readiness <= 5.0 {
        risks.push("Listener trend is cooling week over week".to_string());
    }

    if f.calendar >= 8.0 {
        advantages.push("Favorable season for new releases".to_string());
    } else if let Some((_, holiday)) = nearby_holiday(date) {
        risks.push(format!("Within 2 days of {holiday}"));
    } else if f.calendar <= 5.0 {
        risks.push("Late-December release clutter".to_string());
    }

    (advantages, risks)
}

fn recommendation_text(recommendation: Recommendation, date: NaiveDate, overall: f64) -> String {
    match recommendation {
        Recommendation::Recommended => {
            format!("Green light: {date} is a strong release date (score {overall:.1}/10)")
        }
        Recommendation::Caution => {
            format!("Proceed with caution: {date} is workable but not ideal (score {overall:.1}/10)")
        }
        Recommendation::NotRecommended => {
            format!("Not recommended: choose a different date than {date} (score {overall:.1}/10)")
        }
    }
}
