//! Fan Value Score: 0–100 fanbase-quality indicator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregator::latest_per_platform;
use crate::aggregator::stats::{clamp_score, interpolate, mean, pct_change};
use crate::config::{fvs_weights, neutral, RECENT_SNAPSHOT_COUNT};
use crate::types::{AggregatedDayPoint, MetricSnapshot, SocialPost};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FvsResult {
    pub artist_id: String,
    pub overall: f64,
    pub engagement: f64,
    pub growth: f64,
    pub reach: f64,
    pub conversion: f64,
    pub computed_at: DateTime<Utc>,
    pub window_days: u32,
}

/// Inputs for one FVS computation over a single window.
pub struct FvsInput<'a> {
    pub series: &'a [AggregatedDayPoint],
    pub snapshots: &'a [MetricSnapshot],
    pub posts: &'a [SocialPost],
    pub window_days: u32,
}

pub fn score(artist_id: &str, input: &FvsInput<'_>) -> FvsResult {
    let (followers, reach_audience) = current_audience(input.snapshots, input.series);

    let engagement = engagement_score(input.posts, followers);
    let growth = growth_score(input.series);
    let reach = reach_score(reach_audience);
    let conversion = conversion_score(input.posts);

    let overall = clamp_score(
        engagement * fvs_weights::ENGAGEMENT
            + growth * fvs_weights::GROWTH
            + reach * fvs_weights::REACH
            + conversion * fvs_weights::CONVERSION,
        0.0,
        100.0,
    );

    debug!(artist_id, overall, engagement, growth, reach, conversion, "fvs scored");

    FvsResult {
        artist_id: artist_id.to_string(),
        overall,
        engagement,
        growth,
        reach,
        conversion,
        computed_at: Utc::now(),
        window_days: input.window_days,
    }
}

/// (followers, followers + 0.5 × listeners) over the latest reading per platform.
/// Falls back to the newest aggregated day when no raw snapshots are supplied.
fn current_audience(snapshots: &[MetricSnapshot], series: &[AggregatedDayPoint]) -> (f64, f64) {
    let latest = latest_per_platform(snapshots, RECENT_SNAPSHOT_COUNT);
    if !latest.is_empty() {
        let followers: f64 = latest.iter().map(|s| s.followers as f64).sum();
        let listeners: f64 = latest.iter().map(|s| s.monthly_listeners as f64).sum();
        return (followers, followers + 0.5 * listeners);
    }
    match series.last() {
        Some(p) => (
            p.followers as f64,
            p.followers as f64 + 0.5 * p.monthly_listeners as f64,
        ),
        None => (0.0, 0.0),
    }
}

/// Shared curve for rate-style factors, `pct` in percent.
fn rate_curve(pct: f64) -> f64 {
    if pct >= 5.0 {
        100.0
    } else if pct >= 2.0 {
        interpolate(pct, 2.0, 5.0, 60.0, 100.0)
    } else if pct >= 1.0 {
        interpolate(pct, 1.0, 2.0, 40.0, 60.0)
    } else {
        interpolate(pct, 0.0, 1.0, 0.0, 40.0)
    }
}

fn engagement_score(posts: &[SocialPost], followers: f64) -> f64 {
    if posts.is_empty() || followers < 1.0 {
        return neutral::FVS_FACTOR;
    }
    let rates: Vec<f64> = posts
        .iter()
        .map(|p| (p.engagement() as f64 / followers).min(1.0))
        .collect();
    let pct = mean(&rates).unwrap_or(0.0) * 100.0;
    rate_curve(pct)
}

/// Mean audience of the current half-window against the prior half.
fn growth_score(series: &[AggregatedDayPoint]) -> f64 {
    if series.len() < 2 {
        return neutral::FVS_FACTOR;
    }
    let mid = series.len() / 2;
    let prior: Vec<f64> = series[..mid].iter().map(|p| p.audience()).collect();
    let current: Vec<f64> = series[mid..].iter().map(|p| p.audience()).collect();
    let (prior, current) = match (mean(&prior), mean(&current)) {
        (Some(p), Some(c)) => (p, c),
        _ => return neutral::FVS_FACTOR,
    };
    match pct_change(prior, current, "fvs growth") {
        Ok(pct) if pct >= 20.0 => 100.0,
        Ok(pct) if pct >= 10.0 => interpolate(pct, 10.0, 20.0, 80.0, 100.0),
        Ok(pct) if pct >= 5.0 => interpolate(pct, 5.0, 10.0, 65.0, 80.0),
        Ok(pct) if pct >= 0.0 => interpolate(pct, 0.0, 5.0, 50.0, 65.0),
        Ok(pct) => interpolate(pct, -20.0, 0.0, 0.0, 50.0),
        Err(_) => neutral::FVS_FACTOR,
    }
}

/// Log-bucketed reach over followers + 0.5 × monthly listeners.
fn reach_score(audience: f64) -> f64 {
    if audience < 1.0 {
        return 0.0;
    }
    let log = audience.log10();
    if audience < 10_000.0 {
        interpolate(log, 0.0, 4.0, 0.0, 40.0)
    } else if audience < 100_000.0 {
        interpolate(log, 4.0, 5.0, 40.0, 70.0)
    } else if audience < 1_000_000.0 {
        interpolate(log, 5.0, 6.0, 70.0, 90.0)
    } else {
        interpolate(log, 6.0, 7.0, 90.0, 100.0)
    }
}

/// (saves + shares) / views across the window's posts.
fn conversion_score(posts: &[SocialPost]) -> f64 {
    let views: u64 = posts.iter().map(|p| p.views).sum();
    if views == 0 {
        return neutral::FVS_FACTOR;
    }
    let converted: u64 = posts.iter().map(|p| p.saves + p.shares).sum();
    let pct = (converted as f64 / views as f64).min(1.0) * 100.0;
    rate_curve(pct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EngagementCounts, Platform};
    use chrono::{Duration, NaiveDate, TimeZone};
    use proptest::prelude::*;

    fn day(i: i64, followers: u64, listeners: u64) -> AggregatedDayPoint {
        AggregatedDayPoint {
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap() + Duration::days(i),
            followers,
            monthly_listeners: listeners,
            engagement: EngagementCounts::default(),
            popularity: None,
            snapshot_count: 1,
        }
    }

    fn snapshot(platform: Platform, followers: u64, listeners: u64) -> MetricSnapshot {
        MetricSnapshot {
            artist_id: "a".to_string(),
            platform,
            captured_at: Utc.with_ymd_and_hms(2024, 5, 30, 0, 0, 0).unwrap(),
            followers,
            monthly_listeners: listeners,
            popularity: None,
            top_track_popularity: None,
            engagement: EngagementCounts::default(),
            audience: None,
        }
    }

    fn post(likes: u64, saves: u64, shares: u64, views: u64) -> SocialPost {
        SocialPost {
            post_id: "p".to_string(),
            platform: Platform::Instagram,
            posted_at: Utc.with_ymd_and_hms(2024, 5, 20, 0, 0, 0).unwrap(),
            likes,
            comments: 0,
            shares,
            saves,
            views,
        }
    }

    #[test]
    fn engagement_curve_bands() {
        assert_eq!(engagement_score(&[post(600, 0, 0, 0)], 10_000.0), 100.0);
        // 3% → between 60 and 100
        let s = engagement_score(&[post(300, 0, 0, 0)], 10_000.0);
        assert!((s - 73.333).abs() < 0.01, "score {s}");
        // 0.5% → 20
        assert!((engagement_score(&[post(50, 0, 0, 0)], 10_000.0) - 20.0).abs() < 1e-9);
        assert_eq!(engagement_score(&[], 10_000.0), 50.0);
        assert_eq!(engagement_score(&[post(10, 0, 0, 0)], 0.0), 50.0);
    }

    #[test]
    fn engagement_rate_caps_at_one_hundred_percent() {
        assert_eq!(engagement_score(&[post(1_000_000, 0, 0, 0)], 10.0), 100.0);
    }

    #[test]
    fn growth_defaults_without_comparison_data() {
        assert_eq!(growth_score(&[day(0, 100, 100)]), 50.0);
        assert_eq!(growth_score(&[day(0, 0, 0), day(1, 10, 10)]), 50.0);
    }

    #[test]
    fn growth_bands() {
        let strong = [day(0, 1_000, 0), day(1, 1_000, 0), day(2, 1_300, 0), day(3, 1_300, 0)];
        assert_eq!(growth_score(&strong), 100.0);
        let shrinking = [day(0, 1_000, 0), day(1, 1_000, 0), day(2, 700, 0), day(3, 700, 0)];
        assert_eq!(growth_score(&shrinking), 0.0);
        let flat = [day(0, 1_000, 0), day(1, 1_000, 0)];
        assert_eq!(growth_score(&flat), 50.0);
    }

    #[test]
    fn reach_buckets() {
        assert_eq!(reach_score(0.0), 0.0);
        assert!((reach_score(10_000.0) - 40.0).abs() < 1e-9);
        assert!((reach_score(100_000.0) - 70.0).abs() < 1e-9);
        assert!((reach_score(1_000_000.0) - 90.0).abs() < 1e-9);
        assert_eq!(reach_score(50_000_000.0), 100.0);
        let mid = reach_score(5_000.0);
        assert!(mid > 30.0 && mid < 40.0);
    }

    #[test]
    fn reach_sums_latest_reading_per_platform() {
        let snaps = vec![
            snapshot(Platform::Spotify, 60_000, 80_000),
            snapshot(Platform::Instagram, 0, 0),
        ];
        let (followers, audience) = current_audience(&snaps, &[]);
        assert_eq!(followers, 60_000.0);
        assert_eq!(audience, 100_000.0);
    }

    #[test]
    fn conversion_defaults_without_views() {
        assert_eq!(conversion_score(&[post(10, 5, 5, 0)]), 50.0);
        // 10 / 200 = 5%
        assert_eq!(conversion_score(&[post(0, 5, 5, 200)]), 100.0);
    }

    #[test]
    fn overall_is_weighted_sum() {
        let series = [day(0, 10_000, 0), day(1, 10_000, 0)];
        let snaps = vec![snapshot(Platform::Spotify, 10_000, 0)];
        let posts = vec![post(600, 0, 0, 0)];
        let result = score(
            "a",
            &FvsInput { series: &series, snapshots: &snaps, posts: &posts, window_days: 30 },
        );
        // engagement 100, growth 50, reach 40, conversion 50
        let expected = 100.0 * 0.4 + 50.0 * 0.3 + 40.0 * 0.2 + 50.0 * 0.1;
        assert!((result.overall - expected).abs() < 1e-9, "overall {}", result.overall);
    }

    #[test]
    fn identical_input_gives_identical_scores() {
        let series: Vec<AggregatedDayPoint> =
            (0..20).map(|i| day(i, 10_000 + (i as u64 * 131) % 700, 4_000)).collect();
        let snaps = vec![snapshot(Platform::Spotify, 12_000, 40_000), snapshot(Platform::Tiktok, 3_000, 0)];
        let posts = vec![post(320, 40, 12, 9_000), post(95, 3, 1, 2_500)];
        let input = FvsInput { series: &series, snapshots: &snaps, posts: &posts, window_days: 20 };

        let mut a = score("a", &input);
        let b = score("a", &input);
        assert_eq!(a.overall.to_bits(), b.overall.to_bits());
        a.computed_at = b.computed_at;
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn fvs_stays_in_range(
            followers in prop::collection::vec(0u64..10_000_000, 0..30),
            likes in prop::collection::vec(0u64..5_000_000, 0..10),
            views in 0u64..1_000_000,
        ) {
            let series: Vec<AggregatedDayPoint> = followers
                .iter()
                .enumerate()
                .map(|(i, &f)| day(i as i64, f, f / 2))
                .collect();
            let posts: Vec<SocialPost> = likes.iter().map(|&l| post(l, l / 3, l / 4, views)).collect();
            let result = score(
                "a",
                &FvsInput { series: &series, snapshots: &[], posts: &posts, window_days: 30 },
            );
            prop_assert!((0.0..=100.0).contains(&result.overall));
            for sub in [result.engagement, result.growth, result.reach, result.conversion] {
                prop_assert!((0.0..=100.0).contains(&sub));
            }
        }
    }
}
