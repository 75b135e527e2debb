use super::ValueLabels;
use crate::error::{ChartError, ChartResult};
use crate::ir::{DemandMarker, LabelTone, MarkerKind, Segment, SegmentLabel, SeriesKey, StackedLayout};
use crate::palette::{legend_label, ColorPalette};
use crate::prepare::PreparedSeries;
use crate::scale::demand_axis;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Tunable constants of the stacked supplier chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackedLayoutConfig {
    pub bar_width: f64,
    /// Segments at or below this share of the stack total stay unlabeled.
    pub label_threshold: f64,
    /// Segments above this share get light-on-dark labels.
    pub contrast_threshold: f64,
    pub demand_headroom: f64,
    /// Years that get a realized-demand outline. Defaults to every year before the forecast year.
    pub demand_outline_years: Option<Vec<i32>>,
    /// Defaults to the most recent year in the data.
    pub forecast_year: Option<i32>,
}

impl Default for StackedLayoutConfig {
    fn default() -> Self {
        StackedLayoutConfig {
            bar_width: 0.6,
            label_threshold: 0.05,
            contrast_threshold: 0.15,
            demand_headroom: 1.1,
            demand_outline_years: None,
            forecast_year: None,
        }
    }
}

impl StackedLayoutConfig {
    pub fn validate(&self) -> ChartResult<()> {
        let fractions = [("label_threshold", self.label_threshold), ("contrast_threshold", self.contrast_threshold)];
        for (name, value) in fractions {
            if !(0.0..1.0).contains(&value) {
                return Err(ChartError::InvalidConfig(format!("{} must be in [0, 1), got {}", name, value)));
            }
        }
        if !(self.bar_width > 0.0 && self.bar_width <= 1.0) {
            return Err(ChartError::InvalidConfig(format!("bar_width must be in (0, 1], got {}", self.bar_width)));
        }
        if self.demand_headroom < 1.0 {
            return Err(ChartError::InvalidConfig(format!(
                "demand_headroom must be at least 1, got {}",
                self.demand_headroom
            )));
        }
        Ok(())
    }
}

/// Per-request choices for one stacked chart.
#[derive(Debug, Clone, PartialEq)]
pub struct StackOptions {
    pub value_labels: ValueLabels,
    pub total_labels: bool,
    /// Value labels over realized-demand outlines. Forecast outlines are always labeled.
    pub outline_labels: bool,
    pub y_limits: Option<(f64, f64)>,
}

impl Default for StackOptions {
    fn default() -> Self {
        StackOptions {
            value_labels: ValueLabels::Values,
            total_labels: false,
            outline_labels: true,
            y_limits: None,
        }
    }
}

/// Stack supplier volumes per year in supplier order and place demand markers over the stacks.
pub fn layout_stacked(
    series: &PreparedSeries,
    config: &StackedLayoutConfig,
    options: &StackOptions,
) -> ChartResult<StackedLayout> {
    series.check_aligned()?;
    let names: Vec<String> = series.suppliers.keys().cloned().collect();
    let colors = ColorPalette::for_series(names.len()).assign_colors(&names);
    let totals = series.stack_totals();

    let mut segments = Vec::with_capacity(names.len() * series.years.len());
    let mut bottoms = vec![0.0; series.years.len()];
    for (name, values) in &series.suppliers {
        for (i, &value) in values.iter().enumerate() {
            let total = totals[i];
            let label = (value > 0.0 && value > config.label_threshold * total).then(|| SegmentLabel {
                text: options.value_labels.format(value, total),
                tone: if value > config.contrast_threshold * total {
                    LabelTone::Light
                } else {
                    LabelTone::Dark
                },
            });
            segments.push(Segment {
                series: name.clone(),
                year_index: i,
                bottom: bottoms[i],
                height: value,
                color: colors[name].clone(),
                label,
            });
            bottoms[i] += value;
        }
    }

    let total_labels = totals
        .iter()
        .map(|&t| (options.total_labels && t > 0.0).then(|| format!("{:.0}", t)))
        .collect();

    let forecast_year = config.forecast_year.or_else(|| series.years.last().copied());
    let markers = demand_markers(series, config, forecast_year, options.outline_labels);

    let max_value = totals
        .iter()
        .copied()
        .chain(markers.iter().map(|m| m.value))
        .fold(0.0, f64::max);
    let y_axis = demand_axis(max_value, config.demand_headroom, options.y_limits)?;

    debug!(
        customer = %series.customer,
        segments = segments.len(),
        markers = markers.len(),
        y_max = y_axis.max,
        "laid out stacked bars"
    );

    Ok(StackedLayout {
        years: series.years.clone(),
        series: names
            .iter()
            .map(|n| SeriesKey {
                name: n.clone(),
                label: legend_label(n),
                color: colors[n].clone(),
            })
            .collect(),
        segments,
        totals,
        total_labels,
        markers,
        forecast_year,
        y_axis,
        bar_width: config.bar_width,
    })
}

fn demand_markers(
    series: &PreparedSeries,
    config: &StackedLayoutConfig,
    forecast_year: Option<i32>,
    outline_labels: bool,
) -> Vec<DemandMarker> {
    let mut markers = Vec::new();
    for (i, (&year, &value)) in series.years.iter().zip(&series.demand).enumerate() {
        let kind = if Some(year) == forecast_year {
            MarkerKind::Forecast
        } else {
            let outlined = match &config.demand_outline_years {
                Some(years) => years.contains(&year),
                None => forecast_year.map_or(true, |f| year < f),
            };
            if !outlined {
                continue;
            }
            MarkerKind::Outline
        };

        if value <= 0.0 {
            warn!(customer = %series.customer, year, "demand value is zero or missing, no demand bar drawn");
            continue;
        }
        markers.push(DemandMarker {
            year_index: i,
            value,
            kind,
            label: (kind == MarkerKind::Forecast || outline_labels).then(|| format!("{:.0}", value)),
        });
    }
    markers
}
