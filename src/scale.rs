use crate::error::{ChartError, ChartResult};
use serde::{Deserialize, Serialize};

/// Value range of one vertical axis plus its tick spacing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
    /// `None` leaves tick placement to the backend.
    pub tick_step: Option<f64>,
}

impl AxisRange {
    pub fn new(min: f64, max: f64) -> ChartResult<Self> {
        if !(min.is_finite() && max.is_finite()) || min >= max {
            return Err(ChartError::InvalidConfig(format!(
                "axis limits must satisfy min < max, got ({}, {})",
                min, max
            )));
        }
        Ok(AxisRange { min, max, tick_step: None })
    }

    pub fn with_tick_step(mut self, step: f64) -> Self {
        self.tick_step = Some(step);
        self
    }

    /// Tick values from `min` in `tick_step` increments, not past `max`.
    pub fn ticks(&self) -> Vec<f64> {
        let Some(step) = self.tick_step.filter(|s| *s > 0.0) else {
            return Vec::new();
        };
        let count = ((self.max - self.min) / step + 1e-9).floor() as usize;
        (0..=count).map(|i| self.min + step * i as f64).collect()
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Tick spacing giving at most ~11 gridlines: `max(1, ceil(max / 10))`.
pub fn tick_interval(max_value: f64) -> f64 {
    (max_value / 10.0).ceil().max(1.0)
}

/// Demand axis: override wins, otherwise `(0, headroom * max)` where a non-positive max becomes 100.
pub fn demand_axis(max_value: f64, headroom: f64, limits: Option<(f64, f64)>) -> ChartResult<AxisRange> {
    if let Some((min, max)) = limits {
        let axis = AxisRange::new(min, max)?;
        return Ok(axis.with_tick_step(tick_interval(axis.span())));
    }
    let max_value = if max_value > 0.0 { max_value } else { 100.0 };
    Ok(AxisRange::new(0.0, max_value * headroom)?.with_tick_step(tick_interval(max_value)))
}

/// Axis from zero to `headroom * max_total`; `None` when there is nothing above zero.
pub fn headroom_axis(max_total: f64, headroom: f64) -> Option<AxisRange> {
    if max_total > 0.0 && max_total.is_finite() {
        AxisRange::new(0.0, max_total * headroom).ok()
    } else {
        None
    }
}

/// Secondary price axis padded by `padding` of the observed range.
///
/// A zero range pads by `padding * |value|`, or `zero_fallback` when the value is 0.
/// `None` when there are no values.
pub fn padded_axis(
    values: &[f64],
    padding: f64,
    zero_fallback: f64,
    limits: Option<(f64, f64)>,
) -> ChartResult<Option<AxisRange>> {
    if values.is_empty() {
        return Ok(None);
    }
    if let Some((min, max)) = limits {
        return AxisRange::new(min, max).map(Some);
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    let pad = if range > 0.0 {
        range * padding
    } else if min != 0.0 {
        min.abs() * padding
    } else {
        zero_fallback
    };
    AxisRange::new(min - pad, max + pad).map(Some)
}
