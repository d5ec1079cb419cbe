//! One measurement function per rule type.
//!
//! Each handler turns the artist's current data into a single number that the
//! rule's comparator is applied to. Viral post, engagement drop and superfan
//! churn carry a fixed qualifying condition; below it they measure 0. Adding a
//! rule type means adding a variant and one row to [`RULE_HANDLERS`].

use chrono::{DateTime, Duration, Utc};

use crate::aggregator::latest_per_platform;
use crate::aggregator::stats::{mean, EPSILON};
use crate::alerts::rules::RuleType;
use crate::config::{alert_defaults, RECENT_SNAPSHOT_COUNT};
use crate::scorer::{fan_value, momentum, superfan, FvsInput, MomentumInput};
use crate::types::{AggregatedDayPoint, FanActivity, MetricSnapshot, SocialPost};

/// Everything a handler may read for one artist at one instant.
pub struct AlertContext<'a> {
    pub artist_id: &'a str,
    pub series: &'a [AggregatedDayPoint],
    pub snapshots: &'a [MetricSnapshot],
    pub posts: &'a [SocialPost],
    pub fans: &'a [FanActivity],
    pub window_days: u32,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub value: f64,
    pub detail: String,
}

pub type RuleHandler = fn(&AlertContext<'_>) -> Measurement;

pub const RULE_HANDLERS: [(RuleType, RuleHandler); 8] = [
    (RuleType::MomentumSpike, momentum_overall),
    (RuleType::MomentumDrop, momentum_overall),
    (RuleType::FvsThreshold, fvs_overall),
    (RuleType::FollowerMilestone, follower_total),
    (RuleType::ViralPost, viral_post_multiple),
    (RuleType::EngagementDrop, engagement_decline_pct),
    (RuleType::SuperfanChurn, superfan_churn_pct),
    (RuleType::GrowthStall, growth_stall_level),
];

pub fn handler_for(rule_type: RuleType) -> Option<RuleHandler> {
    RULE_HANDLERS
        .iter()
        .find(|(t, _)| *t == rule_type)
        .map(|(_, h)| *h)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn momentum_overall(ctx: &AlertContext<'_>) -> Measurement {
    let result = momentum::score(
        ctx.artist_id,
        MomentumInput::TimeSeries {
            series: ctx.series,
            posts: ctx.posts,
            window_days: ctx.window_days,
        },
    );
    Measurement {
        value: result.overall,
        detail: format!("momentum {:.1}/10 ({})", result.overall, result.status),
    }
}

fn fvs_overall(ctx: &AlertContext<'_>) -> Measurement {
    let result = fan_value::score(
        ctx.artist_id,
        &FvsInput {
            series: ctx.series,
            snapshots: ctx.snapshots,
            posts: ctx.posts,
            window_days: ctx.window_days,
        },
    );
    Measurement {
        value: result.overall,
        detail: format!("fan value score {:.1}/100", result.overall),
    }
}

fn follower_total(ctx: &AlertContext<'_>) -> Measurement {
    let total: u64 = latest_per_platform(ctx.snapshots, RECENT_SNAPSHOT_COUNT)
        .iter()
        .map(|s| s.followers)
        .sum();
    Measurement {
        value: total as f64,
        detail: format!("{total} followers across platforms"),
    }
}

/// Highest engagement multiple among posts that beat both outlier tests, or 0.
fn viral_post_multiple(ctx: &AlertContext<'_>) -> Measurement {
    let engagements: Vec<f64> = ctx.posts.iter().map(|p| p.engagement() as f64).collect();
    let average = match mean(&engagements) {
        Some(avg) if avg > EPSILON => avg,
        _ => {
            return Measurement {
                value: 0.0,
                detail: "no post engagement to compare".to_string(),
            }
        }
    };

    let best = ctx
        .posts
        .iter()
        .filter(|p| p.engagement() > alert_defaults::VIRAL_MIN_ENGAGEMENT)
        .map(|p| (p, p.engagement() as f64 / average))
        .filter(|(_, multiple)| *multiple > alert_defaults::VIRAL_MULTIPLE)
        .max_by(|a, b| a.1.total_cmp(&b.1));

    match best {
        Some((post, multiple)) => Measurement {
            value: multiple,
            detail: format!(
                "post {} reached {} engagements ({multiple:.1}x average)",
                post.post_id,
                post.engagement()
            ),
        },
        None => Measurement {
            value: 0.0,
            detail: "no outlier posts".to_string(),
        },
    }
}

/// Week-over-week decline in engagement rate, percent, when it is a real drop.
fn engagement_decline_pct(ctx: &AlertContext<'_>) -> Measurement {
    let week = Duration::days(alert_defaults::ENGAGEMENT_WEEK_DAYS);
    let this_week_start = ctx.now - week;
    let last_week_start = this_week_start - week;

    let followers: u64 = latest_per_platform(ctx.snapshots, RECENT_SNAPSHOT_COUNT)
        .iter()
        .map(|s| s.followers)
        .sum();
    let rate = |from: DateTime<Utc>, to: DateTime<Utc>| -> f64 {
        let total: u64 = ctx
            .posts
            .iter()
            .filter(|p| p.posted_at > from && p.posted_at <= to)
            .map(|p| p.engagement())
            .sum();
        total as f64 / followers.max(1) as f64
    };

    let current = rate(this_week_start, ctx.now);
    let previous = rate(last_week_start, this_week_start);
    if previous <= EPSILON {
        return Measurement {
            value: 0.0,
            detail: "no engagement in the prior week".to_string(),
        };
    }

    let decline = (previous - current) / previous * 100.0;
    if decline <= alert_defaults::ENGAGEMENT_DROP_MIN_PCT {
        return Measurement {
            value: 0.0,
            detail: format!("engagement rate change {:.1}% within normal range", -decline),
        };
    }
    Measurement {
        value: decline,
        detail: format!("engagement rate down {decline:.1}% week over week"),
    }
}

fn superfan_churn_pct(ctx: &AlertContext<'_>) -> Measurement {
    let report = superfan::segment(ctx.artist_id, ctx.fans, ctx.now);
    if report.churn_rate_pct <= alert_defaults::SUPERFAN_CHURN_MIN_PCT {
        return Measurement {
            value: 0.0,
            detail: format!("superfan churn {:.1}% within normal range", report.churn_rate_pct),
        };
    }
    Measurement {
        value: report.churn_rate_pct,
        detail: format!(
            "{:.1}% of superfans at churn risk ({} fans flagged)",
            report.churn_rate_pct,
            report.at_risk.len()
        ),
    }
}

/// The larger of velocity and acceleration, so `lt` fires only when both are low.
fn growth_stall_level(ctx: &AlertContext<'_>) -> Measurement {
    let result = momentum::score(
        ctx.artist_id,
        MomentumInput::TimeSeries {
            series: ctx.series,
            posts: ctx.posts,
            window_days: ctx.window_days,
        },
    );
    let velocity = result.velocity().unwrap_or(result.overall);
    let acceleration = result.acceleration().unwrap_or(result.overall);
    Measurement {
        value: velocity.max(acceleration),
        detail: format!("velocity {velocity:.1}, acceleration {acceleration:.1}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EngagementCounts, Platform};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap()
    }

    fn post(id: &str, likes: u64, days_ago: i64) -> SocialPost {
        SocialPost {
            post_id: id.to_string(),
            platform: Platform::Instagram,
            posted_at: now() - Duration::days(days_ago),
            likes,
            comments: 0,
            shares: 0,
            saves: 0,
            views: 0,
        }
    }

    fn snapshot(platform: Platform, followers: u64) -> MetricSnapshot {
        MetricSnapshot {
            artist_id: "a".to_string(),
            platform,
            captured_at: now() - Duration::hours(2),
            followers,
            monthly_listeners: 0,
            popularity: None,
            top_track_popularity: None,
            engagement: EngagementCounts::default(),
            audience: None,
        }
    }

    fn fan(id: &str, inactive_days: i64) -> FanActivity {
        FanActivity {
            fan_id: id.to_string(),
            lifetime_streams: 1_000,
            saves: 0,
            shares: 0,
            purchases: 0,
            streams_last_30d: 100,
            streams_prior_30d: 100,
            last_active_at: now() - Duration::days(inactive_days),
        }
    }

    fn ctx<'a>(
        snapshots: &'a [MetricSnapshot],
        posts: &'a [SocialPost],
    ) -> AlertContext<'a> {
        AlertContext {
            artist_id: "a",
            series: &[],
            snapshots,
            posts,
            fans: &[],
            window_days: 30,
            now: now(),
        }
    }

    #[test]
    fn table_covers_every_rule_type() {
        for (rule_type, _) in RULE_HANDLERS {
            assert!(handler_for(rule_type).is_some());
        }
        let seen: std::collections::HashSet<RuleType> =
            RULE_HANDLERS.iter().map(|(t, _)| *t).collect();
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn followers_sum_across_platforms() {
        let snaps = vec![
            snapshot(Platform::Spotify, 60_000),
            snapshot(Platform::Instagram, 40_001),
        ];
        let m = follower_total(&ctx(&snaps, &[]));
        assert_eq!(m.value, 100_001.0);
    }

    #[test]
    fn viral_requires_multiple_and_absolute_floor() {
        let mut posts: Vec<SocialPost> = (0..9).map(|i| post(&format!("p{i}"), 500, i)).collect();
        posts.push(post("hit", 20_000, 1));
        let m = viral_post_multiple(&ctx(&[], &posts));
        // average = (9*500 + 20000) / 10 = 2450
        assert!((m.value - 20_000.0 / 2_450.0).abs() < 1e-9);

        let small: Vec<SocialPost> = vec![post("a", 10, 1), post("b", 10, 2), post("c", 900, 3)];
        assert_eq!(viral_post_multiple(&ctx(&[], &small)).value, 0.0);
    }

    #[test]
    fn engagement_drop_is_week_over_week() {
        let snaps = vec![snapshot(Platform::Instagram, 10_000)];
        let posts = vec![post("old", 1_000, 10), post("new", 600, 2)];
        let m = engagement_decline_pct(&ctx(&snaps, &posts));
        assert!((m.value - 40.0).abs() < 1e-9);

        let quiet = vec![post("new", 600, 2)];
        assert_eq!(engagement_decline_pct(&ctx(&snaps, &quiet)).value, 0.0);
    }

    #[test]
    fn engagement_drop_must_exceed_thirty_percent() {
        let snaps = vec![snapshot(Platform::Instagram, 10_000)];
        let exactly = vec![post("old", 1_000, 10), post("new", 700, 2)];
        assert_eq!(engagement_decline_pct(&ctx(&snaps, &exactly)).value, 0.0);

        let mild = vec![post("old", 1_000, 10), post("new", 950, 2)];
        assert_eq!(engagement_decline_pct(&ctx(&snaps, &mild)).value, 0.0);

        let steep = vec![post("old", 1_000, 10), post("new", 690, 2)];
        assert!((engagement_decline_pct(&ctx(&snaps, &steep)).value - 31.0).abs() < 1e-9);
    }

    #[test]
    fn superfan_churn_must_exceed_twenty_percent() {
        // 1 of 5 superfans inactive: exactly 20%
        let fans: Vec<FanActivity> = (0..5).map(|i| fan(&format!("f{i}"), if i == 0 { 30 } else { 1 })).collect();
        let mut c = ctx(&[], &[]);
        c.fans = &fans;
        assert_eq!(superfan_churn_pct(&c).value, 0.0);

        // 2 of 5: 40%
        let fans: Vec<FanActivity> = (0..5).map(|i| fan(&format!("f{i}"), if i < 2 { 30 } else { 1 })).collect();
        let mut c = ctx(&[], &[]);
        c.fans = &fans;
        assert!((superfan_churn_pct(&c).value - 40.0).abs() < 1e-9);
    }

    #[test]
    fn sparse_series_is_not_a_stall() {
        let m = growth_stall_level(&ctx(&[], &[]));
        assert_eq!(m.value, 5.0);
    }
}
