//! Momentum Index: a 0–10 growth-velocity score.
//!
//! Two strategies sit behind [`score`]:
//! - `TimeSeries`: velocity, acceleration, consistency and viral potential
//!   over an aggregated day series plus the artist's social posts.
//! - `Snapshot`: popularity, follower growth and top-track popularity from a
//!   single reading (optionally compared with the previous one).
//!
//! Both classify through [`MomentumStatus::from_score`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregator::stats::{
    clamp_score, coefficient_of_variation, interpolate, mean, pct_change, std_dev, EPSILON,
};
use crate::config::{
    momentum_status, momentum_weights, neutral, snapshot_momentum_weights, LISTENER_DELTA_WEIGHT,
};
use crate::error::EngineError;
use crate::types::{AggregatedDayPoint, MetricSnapshot, SocialPost};

// ---------------------------------------------------------------------------
// Status table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentumStatus {
    Declining,
    Stable,
    Growing,
    RapidGrowth,
    Viral,
    /// Fewer than two aggregated days; overall is the neutral 5.0.
    InsufficientData,
}

impl MomentumStatus {
    pub fn from_score(score: f64) -> Self {
        use momentum_status::*;
        if score >= VIRAL {
            MomentumStatus::Viral
        } else if score >= RAPID_GROWTH {
            MomentumStatus::RapidGrowth
        } else if score >= GROWING {
            MomentumStatus::Growing
        } else if score >= STABLE {
            MomentumStatus::Stable
        } else {
            MomentumStatus::Declining
        }
    }
}

impl std::fmt::Display for MomentumStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MomentumStatus::Declining => "declining",
            MomentumStatus::Stable => "stable",
            MomentumStatus::Growing => "growing",
            MomentumStatus::RapidGrowth => "rapid_growth",
            MomentumStatus::Viral => "viral",
            MomentumStatus::InsufficientData => "insufficient_data",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum MomentumFactors {
    TimeSeries {
        velocity: f64,
        acceleration: f64,
        consistency: f64,
        viral_potential: f64,
    },
    Snapshot {
        popularity: f64,
        follower_growth: f64,
        top_track: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumResult {
    pub artist_id: String,
    pub overall: f64,
    pub factors: MomentumFactors,
    pub status: MomentumStatus,
    pub computed_at: DateTime<Utc>,
    pub window_days: u32,
}

impl MomentumResult {
    pub fn velocity(&self) -> Option<f64> {
        match self.factors {
            MomentumFactors::TimeSeries { velocity, .. } => Some(velocity),
            MomentumFactors::Snapshot { .. } => None,
        }
    }

    pub fn acceleration(&self) -> Option<f64> {
        match self.factors {
            MomentumFactors::TimeSeries { acceleration, .. } => Some(acceleration),
            MomentumFactors::Snapshot { .. } => None,
        }
    }

    /// Snapshot momentum above the "fire" line.
    pub fn is_on_fire(&self) -> bool {
        matches!(self.factors, MomentumFactors::Snapshot { .. })
            && self.overall > momentum_status::FIRE
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

pub enum MomentumInput<'a> {
    TimeSeries {
        series: &'a [AggregatedDayPoint],
        posts: &'a [SocialPost],
        window_days: u32,
    },
    Snapshot {
        current: &'a MetricSnapshot,
        previous: Option<&'a MetricSnapshot>,
    },
}

pub fn score(artist_id: &str, input: MomentumInput<'_>) -> MomentumResult {
    match input {
        MomentumInput::TimeSeries { series, posts, window_days } => {
            score_series(artist_id, series, posts, window_days)
        }
        MomentumInput::Snapshot { current, previous } => {
            score_snapshot(artist_id, current, previous)
        }
    }
}

pub fn score_series(
    artist_id: &str,
    series: &[AggregatedDayPoint],
    posts: &[SocialPost],
    window_days: u32,
) -> MomentumResult {
    if series.len() < 2 {
        debug!(artist_id, points = series.len(), "momentum: insufficient data, using neutral");
        return MomentumResult {
            artist_id: artist_id.to_string(),
            overall: neutral::MOMENTUM,
            factors: MomentumFactors::TimeSeries {
                velocity: neutral::MOMENTUM,
                acceleration: neutral::MOMENTUM,
                consistency: neutral::MOMENTUM,
                viral_potential: neutral::MOMENTUM,
            },
            status: MomentumStatus::InsufficientData,
            computed_at: Utc::now(),
            window_days,
        };
    }

    let deltas = combined_deltas(series);
    let velocity = velocity_pct_per_day(series)
        .map(velocity_score)
        .unwrap_or(neutral::MOMENTUM);
    let acceleration = acceleration_pct(&deltas)
        .map(acceleration_score)
        .unwrap_or(neutral::MOMENTUM);
    let consistency = coefficient_of_variation(&deltas)
        .map(consistency_score)
        .unwrap_or(neutral::MOMENTUM);
    let viral_potential = viral_potential_score(posts);

    let overall = clamp_score(
        velocity * momentum_weights::VELOCITY
            + acceleration * momentum_weights::ACCELERATION
            + consistency * momentum_weights::CONSISTENCY
            + viral_potential * momentum_weights::VIRAL_POTENTIAL,
        0.0,
        10.0,
    );

    MomentumResult {
        artist_id: artist_id.to_string(),
        overall,
        factors: MomentumFactors::TimeSeries {
            velocity,
            acceleration,
            consistency,
            viral_potential,
        },
        status: MomentumStatus::from_score(overall),
        computed_at: Utc::now(),
        window_days,
    }
}

pub fn score_snapshot(
    artist_id: &str,
    current: &MetricSnapshot,
    previous: Option<&MetricSnapshot>,
) -> MomentumResult {
    let popularity = clamp_score(current.popularity.unwrap_or(50.0) / 10.0, 0.0, 10.0);
    let top_track = clamp_score(
        current
            .top_track_popularity
            .or(current.popularity)
            .unwrap_or(50.0)
            / 10.0,
        0.0,
        10.0,
    );
    let follower_growth = previous
        .and_then(|prev| {
            pct_change(prev.followers as f64, current.followers as f64, "snapshot follower growth").ok()
        })
        .map(|pct| clamp_score(neutral::MOMENTUM + pct / 2.0, 0.0, 10.0))
        .unwrap_or(neutral::MOMENTUM);

    let overall = clamp_score(
        popularity * snapshot_momentum_weights::POPULARITY
            + follower_growth * snapshot_momentum_weights::FOLLOWER_GROWTH
            + top_track * snapshot_momentum_weights::TOP_TRACK,
        0.0,
        10.0,
    );

    let window_days = previous
        .map(|p| (current.captured_at - p.captured_at).num_days().max(0) as u32)
        .unwrap_or(0);

    MomentumResult {
        artist_id: artist_id.to_string(),
        overall,
        factors: MomentumFactors::Snapshot {
            popularity,
            follower_growth,
            top_track,
        },
        status: MomentumStatus::from_score(overall),
        computed_at: Utc::now(),
        window_days,
    }
}

// ---------------------------------------------------------------------------
// Factors
// ---------------------------------------------------------------------------

/// Day-over-day follower delta plus half the listener delta.
fn combined_deltas(series: &[AggregatedDayPoint]) -> Vec<f64> {
    series
        .windows(2)
        .map(|w| {
            let followers = w[1].followers as f64 - w[0].followers as f64;
            let listeners = w[1].monthly_listeners as f64 - w[0].monthly_listeners as f64;
            followers + LISTENER_DELTA_WEIGHT * listeners
        })
        .collect()
}

/// Total combined change as a percentage of the first day's audience,
/// spread over the calendar days the series covers.
fn velocity_pct_per_day(series: &[AggregatedDayPoint]) -> Result<f64, EngineError> {
    let (first, last) = match (series.first(), series.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => {
            return Err(EngineError::InsufficientData { what: "velocity", needed: 2, got: 0 });
        }
    };
    let baseline = first.audience();
    if baseline < EPSILON {
        return Err(EngineError::DivisionGuard("velocity baseline"));
    }
    let total: f64 = combined_deltas(series).iter().sum();
    let span_days = ((last.date - first.date).num_days() + 1).max(1) as f64;
    Ok(total / baseline * 100.0 / span_days)
}

fn velocity_score(pct_per_day: f64) -> f64 {
    let p = pct_per_day;
    if p >= 1.0 {
        10.0
    } else if p >= 0.5 {
        interpolate(p, 0.5, 1.0, 7.0, 10.0)
    } else if p >= 0.1 {
        interpolate(p, 0.1, 0.5, 5.0, 7.0)
    } else if p >= 0.0 {
        interpolate(p, 0.0, 0.1, 3.0, 5.0)
    } else {
        // -1%/day reaches the floor
        (3.0 + 3.0 * p).max(0.0)
    }
}

/// Growth rate of the second half of the deltas relative to the first half.
fn acceleration_pct(deltas: &[f64]) -> Result<f64, EngineError> {
    if deltas.len() < 2 {
        return Err(EngineError::InsufficientData {
            what: "acceleration",
            needed: 2,
            got: deltas.len(),
        });
    }
    let mid = deltas.len() / 2;
    let first = mean(&deltas[..mid]).unwrap_or(0.0);
    let second = mean(&deltas[mid..]).unwrap_or(0.0);
    pct_change(first, second, "acceleration")
}

fn acceleration_score(pct: f64) -> f64 {
    if pct >= 50.0 {
        10.0
    } else if pct >= 20.0 {
        interpolate(pct, 20.0, 50.0, 8.0, 10.0)
    } else if pct >= 0.0 {
        interpolate(pct, 0.0, 20.0, 5.0, 8.0)
    } else if pct > -20.0 {
        interpolate(pct, -20.0, 0.0, 3.0, 5.0)
    } else {
        interpolate(pct, -100.0, -20.0, 0.0, 3.0)
    }
}

fn consistency_score(cv: f64) -> f64 {
    if cv <= 0.2 {
        10.0
    } else if cv <= 1.0 {
        interpolate(cv, 0.2, 1.0, 10.0, 1.0)
    } else {
        interpolate(cv, 1.0, 3.0, 1.0, 0.0)
    }
}

/// Discrete ladder over outlier-post ratio and peak spike magnitude.
fn viral_potential_score(posts: &[SocialPost]) -> f64 {
    let engagement: Vec<f64> = posts.iter().map(|p| p.engagement() as f64).collect();
    let (m, sd) = match (mean(&engagement), std_dev(&engagement)) {
        (Some(m), Some(sd)) if m >= EPSILON => (m, sd),
        _ => return neutral::MOMENTUM,
    };

    let threshold = m + 2.0 * sd;
    let outliers = engagement.iter().filter(|&&e| e > threshold).count();
    let ratio = outliers as f64 / engagement.len() as f64;
    let peak = engagement.iter().cloned().fold(0.0_f64, f64::max);
    let spike = peak / m;

    if ratio >= 0.10 && spike >= 5.0 {
        10.0
    } else if ratio >= 0.05 || spike >= 5.0 {
        8.0
    } else if ratio > 0.0 || spike >= 3.0 {
        6.0
    } else if spike >= 1.5 {
        5.0
    } else {
        3.0
    }
}
