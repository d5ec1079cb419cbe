//! Superfan segmentation: fan tiers, per-tier buckets and churn-risk detection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::superfan::*;
use crate::types::FanActivity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanTier {
    Passive,
    Casual,
    Core,
    Superfan,
}

impl FanTier {
    pub fn from_points(points: u64) -> Self {
        if points >= SUPERFAN_POINTS {
            FanTier::Superfan
        } else if points >= CORE_POINTS {
            FanTier::Core
        } else if points >= CASUAL_POINTS {
            FanTier::Casual
        } else {
            FanTier::Passive
        }
    }

    pub const ALL: [FanTier; 4] = [FanTier::Superfan, FanTier::Core, FanTier::Casual, FanTier::Passive];
}

impl std::fmt::Display for FanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FanTier::Passive => "passive",
            FanTier::Casual => "casual",
            FanTier::Core => "core",
            FanTier::Superfan => "superfan",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChurnRisk {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtRiskFan {
    pub fan_id: String,
    pub tier: FanTier,
    pub risk: ChurnRisk,
    pub days_inactive: i64,
    /// streams_last_30d / streams_prior_30d, when there was prior activity.
    pub stream_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentBucket {
    pub tier: FanTier,
    pub count: usize,
    /// Share of all fans, percent.
    pub share_pct: f64,
    pub mean_points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentReport {
    pub artist_id: String,
    pub total_fans: usize,
    /// Superfan first, Passive last.
    pub segments: Vec<SegmentBucket>,
    pub at_risk: Vec<AtRiskFan>,
    /// At-risk superfans / superfans, percent. 0 with no superfans.
    pub churn_rate_pct: f64,
    pub computed_at: DateTime<Utc>,
}

/// streams + 3×saves + 5×shares + 20×purchases over the fan's lifetime.
pub fn engagement_points(fan: &FanActivity) -> u64 {
    fan.lifetime_streams
        .saturating_add(fan.saves.saturating_mul(SAVE_POINTS))
        .saturating_add(fan.shares.saturating_mul(SHARE_POINTS))
        .saturating_add(fan.purchases.saturating_mul(PURCHASE_POINTS))
}

pub fn segment(artist_id: &str, fans: &[FanActivity], now: DateTime<Utc>) -> SegmentReport {
    let tiered: Vec<(&FanActivity, FanTier, u64)> = fans
        .iter()
        .map(|f| {
            let points = engagement_points(f);
            (f, FanTier::from_points(points), points)
        })
        .collect();

    let total = tiered.len();
    let segments = FanTier::ALL
        .iter()
        .map(|&tier| {
            let points: Vec<u64> = tiered
                .iter()
                .filter(|(_, t, _)| *t == tier)
                .map(|(_, _, p)| *p)
                .collect();
            let count = points.len();
            SegmentBucket {
                tier,
                count,
                share_pct: if total == 0 { 0.0 } else { count as f64 / total as f64 * 100.0 },
                mean_points: if count == 0 {
                    0.0
                } else {
                    points.iter().map(|&p| p as f64).sum::<f64>() / count as f64
                },
            }
        })
        .collect();

    let at_risk: Vec<AtRiskFan> = tiered
        .iter()
        .filter(|(_, tier, _)| *tier >= FanTier::Core)
        .filter_map(|(fan, tier, _)| churn_risk(fan, *tier, now))
        .collect();

    let superfans = tiered.iter().filter(|(_, t, _)| *t == FanTier::Superfan).count();
    let superfans_at_risk = at_risk.iter().filter(|f| f.tier == FanTier::Superfan).count();
    let churn_rate_pct = if superfans == 0 {
        0.0
    } else {
        superfans_at_risk as f64 / superfans as f64 * 100.0
    };

    SegmentReport {
        artist_id: artist_id.to_string(),
        total_fans: total,
        segments,
        at_risk,
        churn_rate_pct,
        computed_at: now,
    }
}

fn churn_risk(fan: &FanActivity, tier: FanTier, now: DateTime<Utc>) -> Option<AtRiskFan> {
    let days_inactive = (now - fan.last_active_at).num_days().max(0);
    let stream_ratio = if fan.streams_prior_30d > 0 {
        Some(fan.streams_last_30d as f64 / fan.streams_prior_30d as f64)
    } else {
        None
    };

    let inactive = days_inactive > INACTIVE_DAYS;
    let dropping = stream_ratio.is_some_and(|r| r < STREAM_DROP_RATIO);
    if !inactive && !dropping {
        return None;
    }

    let high = days_inactive > HIGH_RISK_INACTIVE_DAYS
        || stream_ratio.is_some_and(|r| r <= HIGH_RISK_STREAM_DROP_RATIO);

    Some(AtRiskFan {
        fan_id: fan.fan_id.clone(),
        tier,
        risk: if high { ChurnRisk::High } else { ChurnRisk::Medium },
        days_inactive,
        stream_ratio,
    })
}
