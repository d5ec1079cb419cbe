//! Three-scenario monthly revenue projection.
//!
//! The realistic scenario is projected from listener history; optimistic and
//! pessimistic are fixed multiples of it on every field, so
//! pessimistic ≤ realistic ≤ optimistic holds for each month by construction.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregator::stats::{interpolate, mean, moving_average, EPSILON};
use crate::config::{neutral, revenue::*};
use crate::error::EngineError;
use crate::types::AggregatedDayPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Optimistic,
    Realistic,
    Pessimistic,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Optimistic, Scenario::Realistic, Scenario::Pessimistic];

    pub fn multiplier(self) -> f64 {
        match self {
            Scenario::Optimistic => OPTIMISTIC_MULTIPLIER,
            Scenario::Realistic => 1.0,
            Scenario::Pessimistic => PESSIMISTIC_MULTIPLIER,
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Scenario::Optimistic => "optimistic",
            Scenario::Realistic => "realistic",
            Scenario::Pessimistic => "pessimistic",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    /// 1 = the month after `as_of`.
    pub month_index: u32,
    pub year: i32,
    /// Calendar month, 1–12.
    pub month: u32,
    pub scenario: Scenario,
    pub projected_streams: f64,
    pub streaming_revenue: f64,
    pub concert_revenue: f64,
    pub merch_revenue: f64,
    pub sync_revenue: f64,
    pub total_revenue: f64,
    pub confidence: f64,
    pub margin_of_error: f64,
}

impl MonthlyRevenue {
    fn scaled(&self, scenario: Scenario) -> Self {
        let k = scenario.multiplier();
        Self {
            scenario,
            projected_streams: self.projected_streams * k,
            streaming_revenue: self.streaming_revenue * k,
            concert_revenue: self.concert_revenue * k,
            merch_revenue: self.merch_revenue * k,
            sync_revenue: self.sync_revenue * k,
            total_revenue: self.total_revenue * k,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueForecast {
    pub artist_id: String,
    pub months_ahead: u32,
    pub baseline_monthly_streams: f64,
    pub monthly_growth_rate: f64,
    pub momentum_factor: f64,
    /// True when history was too short and the conservative baseline was used.
    pub used_fallback: bool,
    /// Optimistic, realistic, pessimistic for month 1, then month 2, ...
    pub months: Vec<MonthlyRevenue>,
    pub computed_at: DateTime<Utc>,
}

impl RevenueForecast {
    pub fn scenario(&self, scenario: Scenario) -> impl Iterator<Item = &MonthlyRevenue> {
        self.months.iter().filter(move |m| m.scenario == scenario)
    }

    pub fn month(&self, month_index: u32, scenario: Scenario) -> Option<&MonthlyRevenue> {
        self.months
            .iter()
            .find(|m| m.month_index == month_index && m.scenario == scenario)
    }
}

pub struct ForecastInput<'a> {
    /// Daily aggregated history, oldest first.
    pub history: &'a [AggregatedDayPoint],
    /// Current momentum overall (0–10); neutral when absent.
    pub momentum: Option<f64>,
    /// Month 1 of the forecast is the calendar month after this date.
    pub as_of: NaiveDate,
}

pub fn forecast(
    artist_id: &str,
    input: &ForecastInput<'_>,
    months_ahead: u32,
) -> Result<RevenueForecast, EngineError> {
    if !(MIN_MONTHS_AHEAD..=MAX_MONTHS_AHEAD).contains(&months_ahead) {
        return Err(EngineError::InvalidWindow(format!(
            "forecast horizon must be {MIN_MONTHS_AHEAD}..={MAX_MONTHS_AHEAD} months, got {months_ahead}"
        )));
    }

    let momentum = input.momentum.unwrap_or(neutral::MOMENTUM).clamp(0.0, 10.0);
    let momentum_factor = interpolate(momentum, 0.0, 10.0, MOMENTUM_FACTOR_MIN, MOMENTUM_FACTOR_MAX);

    let used_fallback = input.history.len() < MIN_HISTORY_DAYS;
    let (baseline_listeners, growth) = if used_fallback {
        debug!(
            artist_id,
            days = input.history.len(),
            "revenue: short history, using conservative baseline"
        );
        (FALLBACK_LISTENERS, FALLBACK_GROWTH)
    } else {
        let listeners: Vec<f64> = input
            .history
            .iter()
            .map(|p| p.monthly_listeners as f64)
            .collect();
        let baseline = moving_average(&listeners, BASELINE_BLOCK_DAYS).unwrap_or(0.0);
        (baseline, monthly_growth_rate(input.history))
    };
    let baseline_streams = baseline_listeners * STREAMS_PER_LISTENER;

    let mut months = Vec::with_capacity(months_ahead as usize * Scenario::ALL.len());
    for m in 1..=months_ahead {
        let (year, month) = add_months(input.as_of, m);
        let seasonal = SEASONAL_FACTORS[(month - 1) as usize];
        let streams = baseline_streams * (1.0 + growth).powi(m as i32) * momentum_factor * seasonal;

        let streaming = streams * STREAM_RATE;
        let concert_share = if momentum >= CONCERT_HOT_MOMENTUM {
            CONCERT_SHARE * CONCERT_HOT_MULTIPLIER
        } else {
            CONCERT_SHARE
        };
        let concert = streaming * concert_share;
        let merch = streaming * MERCH_SHARE;
        let sync = 0.0;

        let step = (m - 1) as f64;
        let confidence = if used_fallback {
            FALLBACK_CONFIDENCE
        } else {
            (CONFIDENCE_START - CONFIDENCE_STEP * step).max(CONFIDENCE_FLOOR)
        };
        let margin_of_error = (MARGIN_START + MARGIN_STEP * step).min(MARGIN_CAP);

        let realistic = MonthlyRevenue {
            month_index: m,
            year,
            month,
            scenario: Scenario::Realistic,
            projected_streams: streams,
            streaming_revenue: streaming,
            concert_revenue: concert,
            merch_revenue: merch,
            sync_revenue: sync,
            total_revenue: streaming + concert + merch + sync,
            confidence,
            margin_of_error,
        };
        let optimistic = realistic.scaled(Scenario::Optimistic);
        let pessimistic = realistic.scaled(Scenario::Pessimistic);
        months.extend([optimistic, realistic, pessimistic]);
    }

    Ok(RevenueForecast {
        artist_id: artist_id.to_string(),
        months_ahead,
        baseline_monthly_streams: baseline_streams,
        monthly_growth_rate: growth,
        momentum_factor,
        used_fallback,
        months,
        computed_at: Utc::now(),
    })
}

/// Compound monthly growth between the first and last 30-day listener blocks.
/// Zero when the history is shorter than 60 days or the first block is empty.
fn monthly_growth_rate(history: &[AggregatedDayPoint]) -> f64 {
    if history.len() < GROWTH_HISTORY_DAYS {
        return 0.0;
    }
    let listeners: Vec<f64> = history.iter().map(|p| p.monthly_listeners as f64).collect();
    let first = mean(&listeners[..BASELINE_BLOCK_DAYS]).unwrap_or(0.0);
    let last = moving_average(&listeners, BASELINE_BLOCK_DAYS).unwrap_or(0.0);
    if first < EPSILON {
        return 0.0;
    }

    let span_days = match (history.first(), history.last()) {
        (Some(a), Some(b)) => (b.date - a.date).num_days() + 1,
        _ => return 0.0,
    };
    let periods = ((span_days - BASELINE_BLOCK_DAYS as i64) as f64 / 30.0).max(1.0);
    let rate = (last / first).powf(1.0 / periods) - 1.0;
    rate.clamp(MIN_GROWTH, MAX_GROWTH)
}

/// (year, month 1–12) of the calendar month `n` months after `date`.
fn add_months(date: NaiveDate, n: u32) -> (i32, u32) {
    let total = date.year() * 12 + date.month0() as i32 + n as i32;
    (total.div_euclid(12), total.rem_euclid(12) as u32 + 1)
}
