use super::ValueLabels;
use crate::error::{ChartError, ChartResult};
use crate::ir::{LabelTone, RangeLayout, Segment, SegmentLabel, SeriesKey};
use crate::palette::{legend_label, BUSINESS_PLAN_COLORS};
use crate::prepare::{BusinessPlanRecord, BUSINESS_PLAN_BANDS};
use crate::scale::headroom_axis;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeLayoutConfig {
    pub bar_width: f64,
    pub label_fraction: f64,
    /// Absolute floor of the label threshold.
    pub label_floor: f64,
    pub headroom: f64,
}

impl Default for RangeLayoutConfig {
    fn default() -> Self {
        RangeLayoutConfig {
            bar_width: 0.7,
            label_fraction: 0.05,
            label_floor: 50.0,
            headroom: 1.15,
        }
    }
}

impl RangeLayoutConfig {
    pub fn validate(&self) -> ChartResult<()> {
        if !(0.0..1.0).contains(&self.label_fraction) || self.label_floor < 0.0 {
            return Err(ChartError::InvalidConfig(format!(
                "range label threshold must satisfy 0 <= label_fraction < 1 and label_floor >= 0, got ({}, {})",
                self.label_fraction, self.label_floor
            )));
        }
        if self.headroom < 1.0 || !(self.bar_width > 0.0 && self.bar_width <= 1.0) {
            return Err(ChartError::InvalidConfig(
                "range headroom must be at least 1 and bar_width in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Stack min, base and max bottom to top for each year.
///
/// `None` when every year's total is zero.
pub fn layout_range(
    records: &[BusinessPlanRecord],
    config: &RangeLayoutConfig,
    value_labels: ValueLabels,
) -> Option<RangeLayout> {
    let totals: Vec<f64> = records.iter().map(BusinessPlanRecord::total).collect();
    let y_axis = headroom_axis(totals.iter().copied().fold(0.0, f64::max), config.headroom)?;

    let mut segments = Vec::with_capacity(records.len() * BUSINESS_PLAN_BANDS.len());
    for (year_index, record) in records.iter().enumerate() {
        let total = totals[year_index];
        let threshold = (config.label_fraction * total).max(config.label_floor);
        let mut bottom = 0.0;
        for (band_index, value) in record.bands().into_iter().enumerate() {
            segments.push(Segment {
                series: BUSINESS_PLAN_BANDS[band_index].to_string(),
                year_index,
                bottom,
                height: value,
                color: BUSINESS_PLAN_COLORS[band_index].to_string(),
                label: (value > threshold).then(|| SegmentLabel {
                    text: value_labels.format(value, total),
                    tone: LabelTone::Light,
                }),
            });
            bottom += value;
        }
    }

    debug!(years = records.len(), segments = segments.len(), y_max = y_axis.max, "laid out business plan");

    Some(RangeLayout {
        years: records.iter().map(|r| r.year).collect(),
        series: BUSINESS_PLAN_BANDS
            .iter()
            .zip(BUSINESS_PLAN_COLORS)
            .map(|(band, color)| SeriesKey {
                name: band.to_string(),
                label: legend_label(band),
                color: color.to_string(),
            })
            .collect(),
        segments,
        totals,
        y_axis,
        bar_width: config.bar_width,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(year: i32, min: f64, base: f64, max: f64) -> BusinessPlanRecord {
        BusinessPlanRecord {
            year,
            customer: "ACME".to_string(),
            min,
            base,
            max,
        }
    }

    #[test]
    fn test_scenario_e_labels() {
        let layout = layout_range(&[record(2023, 10.0, 600.0, 5.0)], &RangeLayoutConfig::default(), ValueLabels::Values)
            .unwrap();

        let labels: Vec<Option<&str>> = layout
            .segments
            .iter()
            .map(|s| s.label.as_ref().map(|l| l.text.as_str()))
            .collect();
        assert_eq!(labels, vec![None, Some("600"), None]);
        assert_eq!(layout.totals, vec![615.0]);
        assert_relative_eq!(layout.y_axis.max, 615.0 * 1.15);
    }

    #[test]
    fn test_bands_stack_in_order() {
        let layout = layout_range(&[record(2024, 100.0, 600.0, 300.0)], &RangeLayoutConfig::default(), ValueLabels::Percentages)
            .unwrap();
        let tops: Vec<f64> = layout.segments.iter().map(|s| s.top()).collect();
        assert_eq!(tops, vec![100.0, 700.0, 1000.0]);
        let max_label = layout.segments[2].label.as_ref().unwrap();
        assert_eq!(max_label.text, "30.0%");
        assert_eq!(layout.series[1].label, "Base");
        assert_eq!(layout.series[2].color, "#ff7f41");
    }

    #[test]
    fn test_floor_applies_to_small_totals() {
        // 40 is 80% of the total but below the 50-unit floor
        let layout = layout_range(&[record(2023, 0.0, 40.0, 10.0)], &RangeLayoutConfig::default(), ValueLabels::Values)
            .unwrap();
        assert!(layout.segments.iter().all(|s| s.label.is_none()));
    }

    #[test]
    fn test_all_zero_is_empty() {
        assert!(layout_range(&[record(2023, 0.0, 0.0, 0.0)], &RangeLayoutConfig::default(), ValueLabels::Values).is_none());
        assert!(layout_range(&[], &RangeLayoutConfig::default(), ValueLabels::Values).is_none());
    }
}
