//! Small numeric helpers shared by every scorer.
//!
//! Windowed helpers shrink gracefully: asking for more points than exist
//! uses every available point instead of failing.

use crate::error::EngineError;

/// Denominators with an absolute value below this are treated as zero.
pub const EPSILON: f64 = 1e-9;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// std / |mean| of `values`.
pub fn coefficient_of_variation(values: &[f64]) -> Result<f64, EngineError> {
    if values.len() < 2 {
        return Err(EngineError::InsufficientData {
            what: "coefficient of variation",
            needed: 2,
            got: values.len(),
        });
    }
    let m = mean(values).unwrap_or(0.0);
    if m.abs() < EPSILON {
        return Err(EngineError::DivisionGuard("coefficient of variation"));
    }
    Ok(std_dev(values).unwrap_or(0.0) / m.abs())
}

/// Mean of the trailing `window` values, or of all values when fewer exist.
pub fn moving_average(values: &[f64], window: usize) -> Option<f64> {
    if window == 0 {
        return None;
    }
    let start = values.len().saturating_sub(window);
    mean(&values[start..])
}

/// Percentage change from `from` to `to`.
pub fn pct_change(from: f64, to: f64, what: &'static str) -> Result<f64, EngineError> {
    if from.abs() < EPSILON {
        return Err(EngineError::DivisionGuard(what));
    }
    Ok((to - from) / from.abs() * 100.0)
}

/// Linear map of `x` from `[x0, x1]` onto `[y0, y1]`, clamped to the segment.
pub fn interpolate(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    if (x1 - x0).abs() < EPSILON {
        return y0;
    }
    let t = ((x - x0) / (x1 - x0)).clamp(0.0, 1.0);
    y0 + t * (y1 - y0)
}

/// Clamp that also maps NaN onto the lower bound.
pub fn clamp_score(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        return lo;
    }
    value.clamp(lo, hi)
}
