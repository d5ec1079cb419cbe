use crate::error::{AppError, Result};

/// Longest scoring window accepted at the boundary (two years of daily points).
pub const MAX_WINDOW_DAYS: u32 = 730;

/// Batch cycle interval (seconds) for the host runner.
pub const CYCLE_INTERVAL_SECS: u64 = 3_600;

/// Longest accepted result cache lifetime (one year).
pub const MAX_RESULT_TTL_HOURS: i64 = 24 * 365;

/// Trailing history pulled for release-date history and revenue baselines.
pub const HISTORY_LOOKBACK_DAYS: u32 = 180;

/// Neutral defaults substituted when a factor cannot be computed.
pub mod neutral {
    /// Momentum and every 0–10 sub-score.
    pub const MOMENTUM: f64 = 5.0;
    /// FVS sub-scores (0–100 scale).
    pub const FVS_FACTOR: f64 = 50.0;
}

/// MomentumScorer time-series weights. Sum to 1.0.
pub mod momentum_weights {
    pub const VELOCITY: f64 = 0.35;
    pub const ACCELERATION: f64 = 0.30;
    pub const CONSISTENCY: f64 = 0.20;
    pub const VIRAL_POTENTIAL: f64 = 0.15;
}

/// Snapshot-only momentum variant weights. Sum to 1.0.
pub mod snapshot_momentum_weights {
    pub const POPULARITY: f64 = 0.40;
    pub const FOLLOWER_GROWTH: f64 = 0.30;
    pub const TOP_TRACK: f64 = 0.30;
}

/// Momentum status thresholds (lower bounds, inclusive). Shared by both variants.
pub mod momentum_status {
    pub const VIRAL: f64 = 9.0;
    pub const RAPID_GROWTH: f64 = 7.0;
    pub const GROWING: f64 = 5.0;
    pub const STABLE: f64 = 3.0;
    /// Snapshot momentum strictly above this is "on fire".
    pub const FIRE: f64 = 7.0;
}

/// Weight applied to monthly-listener deltas when combining with follower deltas.
pub const LISTENER_DELTA_WEIGHT: f64 = 0.5;

/// FanValueScorer weights. Sum to 1.0.
pub mod fvs_weights {
    pub const ENGAGEMENT: f64 = 0.40;
    pub const GROWTH: f64 = 0.30;
    pub const REACH: f64 = 0.20;
    pub const CONVERSION: f64 = 0.10;
}

/// Number of most-recent snapshots considered for reach and follower milestones.
pub const RECENT_SNAPSHOT_COUNT: usize = 10;

/// Superfan tiering and churn-risk thresholds.
pub mod superfan {
    pub const SUPERFAN_POINTS: u64 = 500;
    pub const CORE_POINTS: u64 = 150;
    pub const CASUAL_POINTS: u64 = 25;

    pub const SAVE_POINTS: u64 = 3;
    pub const SHARE_POINTS: u64 = 5;
    pub const PURCHASE_POINTS: u64 = 20;

    pub const INACTIVE_DAYS: i64 = 21;
    pub const HIGH_RISK_INACTIVE_DAYS: i64 = 45;
    /// Last-30-day streams below this fraction of the prior 30 days flags risk.
    pub const STREAM_DROP_RATIO: f64 = 0.5;
    pub const HIGH_RISK_STREAM_DROP_RATIO: f64 = 0.2;
}

/// RevenueForecaster constants.
pub mod revenue {
    pub const MIN_MONTHS_AHEAD: u32 = 3;
    pub const MAX_MONTHS_AHEAD: u32 = 12;

    /// Monthly streams per monthly listener.
    pub const STREAMS_PER_LISTENER: f64 = 10.0;
    /// Payout per stream in USD.
    pub const STREAM_RATE: f64 = 0.004;

    pub const CONCERT_SHARE: f64 = 0.15;
    pub const CONCERT_HOT_MULTIPLIER: f64 = 1.5;
    pub const CONCERT_HOT_MOMENTUM: f64 = 7.0;
    pub const MERCH_SHARE: f64 = 0.08;

    pub const MIN_GROWTH: f64 = -0.50;
    pub const MAX_GROWTH: f64 = 2.00;

    pub const MOMENTUM_FACTOR_MIN: f64 = 0.8;
    pub const MOMENTUM_FACTOR_MAX: f64 = 1.2;

    pub const OPTIMISTIC_MULTIPLIER: f64 = 1.40;
    pub const PESSIMISTIC_MULTIPLIER: f64 = 0.60;

    pub const CONFIDENCE_START: f64 = 0.95;
    pub const CONFIDENCE_STEP: f64 = 0.05;
    pub const CONFIDENCE_FLOOR: f64 = 0.50;
    pub const MARGIN_START: f64 = 0.15;
    pub const MARGIN_STEP: f64 = 0.025;
    pub const MARGIN_CAP: f64 = 0.40;

    /// Days of history below which the fixed conservative baseline is used.
    pub const MIN_HISTORY_DAYS: usize = 30;
    /// Days of history needed to estimate a growth rate.
    pub const GROWTH_HISTORY_DAYS: usize = 60;
    pub const BASELINE_BLOCK_DAYS: usize = 30;

    pub const FALLBACK_LISTENERS: f64 = 10_000.0;
    pub const FALLBACK_GROWTH: f64 = 0.02;
    pub const FALLBACK_CONFIDENCE: f64 = 0.50;

    /// Jan..Dec streaming seasonality.
    pub const SEASONAL_FACTORS: [f64; 12] = [
        0.95, 0.92, 0.97, 0.98, 1.00, 1.02, 1.03, 1.02, 0.99, 1.01, 1.05, 1.10,
    ];
}

/// ReleaseDateOptimizer weights. Sum to 1.0.
pub mod release_weights {
    pub const MOMENTUM: f64 = 0.30;
    pub const COMPETITION: f64 = 0.25;
    pub const HISTORICAL: f64 = 0.20;
    pub const AUDIENCE_READINESS: f64 = 0.15;
    pub const CALENDAR: f64 = 0.10;
}

pub mod release {
    pub const MAX_WEEKS_AHEAD: u32 = 52;
    /// A competing artist at or above this follower count is "major".
    pub const MAJOR_FOLLOWERS: u64 = 1_000_000;
    pub const MAJOR_PENALTY: f64 = 0.5;
    pub const HISTORICAL_MIN_POINTS: usize = 30;
    pub const HISTORICAL_DEFAULT: f64 = 7.0;
    pub const READINESS_MIN_POINTS: usize = 7;
    pub const READINESS_DEFAULT: f64 = 6.0;
    pub const HOLIDAY_RADIUS_DAYS: i64 = 2;

    /// First-week streams = daily listeners × 7 × this.
    pub const FIRST_WEEK_STREAM_FACTOR: f64 = 2.5;
    pub const CI_LOW: f64 = 0.7;
    pub const CI_HIGH: f64 = 1.3;

    pub const GREEN_LIGHT: f64 = 7.5;
    pub const NOT_RECOMMENDED: f64 = 5.0;
}

/// Fixed conditions baked into specific rule types.
pub mod alert_defaults {
    /// A post is viral when it beats the mean engagement by this multiple...
    pub const VIRAL_MULTIPLE: f64 = 3.0;
    /// ...and reaches this absolute engagement.
    pub const VIRAL_MIN_ENGAGEMENT: u64 = 1_000;
    /// Days per comparison window for the engagement-drop rule.
    pub const ENGAGEMENT_WEEK_DAYS: i64 = 7;
    /// Week-over-week engagement-rate decline must exceed this percentage.
    pub const ENGAGEMENT_DROP_MIN_PCT: f64 = 30.0;
    /// Superfan churn rate must exceed this percentage.
    pub const SUPERFAN_CHURN_MIN_PCT: f64 = 20.0;
}

pub mod actions {
    pub const MIN_DATA_POINTS: usize = 7;
    pub const STALE_SNAPSHOT_DAYS: i64 = 3;
    pub const BACKUP_POPULARITY: f64 = 80.0;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    /// Days scored per cycle (SCORING_WINDOW_DAYS)
    pub scoring_window_days: u32,
    /// Months projected by the revenue forecaster (FORECAST_MONTHS)
    pub forecast_months: u32,
    /// Upcoming Fridays scored for release planning (RELEASE_WEEKS_AHEAD)
    pub release_weeks_ahead: u32,
    /// Seconds between batch cycles (CYCLE_INTERVAL_SECS)
    pub cycle_interval_secs: u64,
    /// Artists scored concurrently per cycle (MAX_CONCURRENT_ARTISTS)
    pub max_concurrent_artists: usize,
    /// Cached forecasts and release scores younger than this are reused (RESULT_TTL_HOURS)
    pub result_ttl_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys take their defaults; set but
    /// unparsable values are configuration errors.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let cfg = Self {
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            db_path: var("DB_PATH").unwrap_or_else(|| "growth_engine.db".to_string()),
            scoring_window_days: var("SCORING_WINDOW_DAYS")
                .unwrap_or_else(|| "30".to_string())
                .parse::<u32>()
                .map_err(|_| AppError::Config("SCORING_WINDOW_DAYS must be a positive integer".to_string()))?,
            forecast_months: var("FORECAST_MONTHS")
                .unwrap_or_else(|| "6".to_string())
                .parse::<u32>()
                .map_err(|_| AppError::Config("FORECAST_MONTHS must be an integer".to_string()))?,
            release_weeks_ahead: var("RELEASE_WEEKS_AHEAD")
                .unwrap_or_else(|| "8".to_string())
                .parse::<u32>()
                .map_err(|_| AppError::Config("RELEASE_WEEKS_AHEAD must be an integer".to_string()))?,
            cycle_interval_secs: var("CYCLE_INTERVAL_SECS")
                .unwrap_or_else(|| CYCLE_INTERVAL_SECS.to_string())
                .parse::<u64>()
                .map_err(|_| AppError::Config("CYCLE_INTERVAL_SECS must be an integer".to_string()))?,
            max_concurrent_artists: var("MAX_CONCURRENT_ARTISTS")
                .unwrap_or_else(|| "8".to_string())
                .parse::<usize>()
                .map_err(|_| AppError::Config("MAX_CONCURRENT_ARTISTS must be an integer".to_string()))?,
            result_ttl_hours: var("RESULT_TTL_HOURS")
                .unwrap_or_else(|| "24".to_string())
                .parse::<i64>()
                .map_err(|_| AppError::Config("RESULT_TTL_HOURS must be an integer".to_string()))?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scoring_window_days == 0 || self.scoring_window_days > MAX_WINDOW_DAYS {
            return Err(AppError::Config(format!(
                "SCORING_WINDOW_DAYS must be in 1..={MAX_WINDOW_DAYS}"
            )));
        }
        if !(revenue::MIN_MONTHS_AHEAD..=revenue::MAX_MONTHS_AHEAD).contains(&self.forecast_months) {
            return Err(AppError::Config(format!(
                "FORECAST_MONTHS must be in {}..={}",
                revenue::MIN_MONTHS_AHEAD,
                revenue::MAX_MONTHS_AHEAD
            )));
        }
        if self.release_weeks_ahead == 0 || self.release_weeks_ahead > release::MAX_WEEKS_AHEAD {
            return Err(AppError::Config(format!(
                "RELEASE_WEEKS_AHEAD must be in 1..={}",
                release::MAX_WEEKS_AHEAD
            )));
        }
        if self.cycle_interval_secs == 0 {
            return Err(AppError::Config("CYCLE_INTERVAL_SECS must be > 0".to_string()));
        }
        if self.max_concurrent_artists == 0 {
            return Err(AppError::Config("MAX_CONCURRENT_ARTISTS must be > 0".to_string()));
        }
        if !(1..=MAX_RESULT_TTL_HOURS).contains(&self.result_ttl_hours) {
            return Err(AppError::Config(format!(
                "RESULT_TTL_HOURS must be in 1..={MAX_RESULT_TTL_HOURS}"
            )));
        }
        Ok(())
    }
}
