use crate::error::{ChartError, ChartResult};
use crate::ir::{PriceAnnotation, PriceLayout, PriceLine};
use crate::palette::{legend_label, line_dash, ColorPalette, ShapePalette};
use crate::prepare::PreparedSeries;
use crate::scale::padded_axis;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceOverlayConfig {
    /// Points above the data point for the lowest label of a year.
    pub annotation_base_offset: f64,
    /// Points between consecutive labels of a year.
    pub annotation_spacing: f64,
    pub range_padding: f64,
    pub zero_range_fallback: f64,
}

impl Default for PriceOverlayConfig {
    fn default() -> Self {
        PriceOverlayConfig {
            annotation_base_offset: 25.0,
            annotation_spacing: 20.0,
            range_padding: 0.2,
            zero_range_fallback: 20.0,
        }
    }
}

impl PriceOverlayConfig {
    pub fn validate(&self) -> ChartResult<()> {
        if !(self.annotation_spacing > 0.0) {
            return Err(ChartError::InvalidConfig(format!(
                "annotation_spacing must be positive, got {}",
                self.annotation_spacing
            )));
        }
        if self.range_padding < 0.0 || self.zero_range_fallback <= 0.0 {
            return Err(ChartError::InvalidConfig(
                "price padding must be non-negative and the zero-range fallback positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Rank and offset for the co-located values of one year.
///
/// Present values are ranked ascending (ties keep series order) and placed at
/// `base + rank * spacing`. Output is index-aligned with `values`.
pub fn annotation_offsets(values: &[Option<f64>], base: f64, spacing: f64) -> Vec<Option<(usize, f64)>> {
    let mut present: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();
    present.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut offsets = vec![None; values.len()];
    for (rank, (series_index, _)) in present.into_iter().enumerate() {
        offsets[series_index] = Some((rank, base + rank as f64 * spacing));
    }
    offsets
}

/// Price lines on a secondary scale with collision-avoiding value labels.
///
/// `Ok(None)` when no price column has a value for this customer.
pub fn layout_price(
    series: &PreparedSeries,
    palette: &ColorPalette,
    config: &PriceOverlayConfig,
    limits: Option<(f64, f64)>,
) -> ChartResult<Option<PriceLayout>> {
    series.check_aligned()?;
    let values: Vec<f64> = series.prices.values().flatten().flatten().copied().collect();
    let Some(axis) = padded_axis(&values, config.range_padding, config.zero_range_fallback, limits)? else {
        return Ok(None);
    };

    let shapes = ShapePalette::default_shapes();
    let columns: Vec<(&String, &Vec<Option<f64>>)> = series.prices.iter().collect();

    let mut annotations = Vec::new();
    for year_index in 0..series.years.len() {
        let at_year: Vec<Option<f64>> = columns.iter().map(|(_, v)| v[year_index]).collect();
        let offsets = annotation_offsets(&at_year, config.annotation_base_offset, config.annotation_spacing);
        for (column_index, placed) in offsets.into_iter().enumerate() {
            let (Some((rank, offset)), Some(value)) = (placed, at_year[column_index]) else {
                continue;
            };
            annotations.push(PriceAnnotation {
                series: columns[column_index].0.clone(),
                year_index,
                value,
                rank,
                offset,
                text: format!("{:.2}", value),
            });
        }
    }

    let lines: Vec<PriceLine> = columns
        .iter()
        .enumerate()
        .filter_map(|(i, (name, values))| {
            let points: Vec<(usize, f64)> = values
                .iter()
                .enumerate()
                .filter_map(|(year_index, v)| v.map(|v| (year_index, v)))
                .collect();
            (!points.is_empty()).then(|| PriceLine {
                name: name.to_string(),
                label: legend_label(name),
                color: palette.get_color(i),
                marker: shapes.get_shape(i),
                dash: line_dash(i),
                points,
            })
        })
        .collect();

    debug!(
        customer = %series.customer,
        lines = lines.len(),
        annotations = annotations.len(),
        "laid out price overlay"
    );

    Ok(Some(PriceLayout { lines, annotations, axis }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use indexmap::IndexMap;
    use proptest::prelude::*;

    fn priced(prices: Vec<(&str, Vec<Option<f64>>)>) -> PreparedSeries {
        let years = prices.first().map(|(_, v)| v.len()).unwrap_or(0);
        PreparedSeries {
            customer: "ACME".to_string(),
            years: (0..years as i32).map(|i| 2022 + i).collect(),
            suppliers: IndexMap::new(),
            demand: vec![0.0; years],
            prices: prices.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    #[test]
    fn test_scenario_b_offsets() {
        let series = priced(vec![("pocket price", vec![Some(10.0)]), ("apac_pp", vec![Some(10.5)])]);
        let layout = layout_price(&series, &ColorPalette::price_lines(), &PriceOverlayConfig::default(), None)
            .unwrap()
            .unwrap();

        let offset = |name: &str| layout.annotations.iter().find(|a| a.series == name).unwrap().offset;
        assert_eq!(offset("pocket price"), 25.0);
        assert_eq!(offset("apac_pp"), 45.0);
        assert_eq!(layout.annotations[0].text, "10.00");
    }

    #[test]
    fn test_offsets_follow_value_not_column_order() {
        let offsets = annotation_offsets(&[Some(12.0), None, Some(9.0)], 25.0, 20.0);
        assert_eq!(offsets, vec![Some((1, 45.0)), None, Some((0, 25.0))]);
    }

    #[test]
    fn test_missing_values_skip_points() {
        let series = priced(vec![
            ("pocket price", vec![Some(10.0), None, Some(12.0)]),
            ("apac_pp", vec![None, None, None]),
        ]);
        let layout = layout_price(&series, &ColorPalette::price_lines(), &PriceOverlayConfig::default(), None)
            .unwrap()
            .unwrap();
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.lines[0].points, vec![(0, 10.0), (2, 12.0)]);
        assert_eq!(layout.lines[0].label, "Pocket Price");
        assert_eq!(layout.lines[0].color, "#FF0000");
        assert_eq!(layout.max_price(), Some(12.0));
        assert_relative_eq!(layout.axis.min, 9.6);
    }

    #[test]
    fn test_no_prices_yields_none() {
        let series = priced(vec![("pocket price", vec![None, None])]);
        let layout = layout_price(&series, &ColorPalette::price_lines(), &PriceOverlayConfig::default(), None).unwrap();
        assert!(layout.is_none());
    }

    #[test]
    fn test_price_series_shorter_than_years() {
        let series = priced(vec![
            ("pocket price", vec![Some(10.0), Some(11.0)]),
            ("apac_pp", vec![Some(10.5)]),
        ]);
        let result = layout_price(&series, &ColorPalette::price_lines(), &PriceOverlayConfig::default(), None);
        assert!(matches!(result, Err(ChartError::InvalidConfig(_))));
    }

    #[test]
    fn test_price_limits_override() {
        let series = priced(vec![("pocket price", vec![Some(2.0)])]);
        let layout = layout_price(
            &series,
            &ColorPalette::price_lines(),
            &PriceOverlayConfig::default(),
            Some((0.5, 3.0)),
        )
        .unwrap()
        .unwrap();
        assert_eq!((layout.axis.min, layout.axis.max), (0.5, 3.0));
    }

    proptest! {
        #[test]
        fn offsets_strictly_increase_with_rank(
            values in proptest::collection::vec(proptest::option::of(-1000.0f64..1000.0), 1..6),
            spacing in 1.0f64..50.0,
        ) {
            let offsets = annotation_offsets(&values, 25.0, spacing);
            let mut placed: Vec<(usize, f64, f64)> = offsets
                .iter()
                .zip(&values)
                .filter_map(|(o, v)| o.map(|(rank, off)| (rank, off, v.unwrap())))
                .collect();
            prop_assert_eq!(placed.len(), values.iter().filter(|v| v.is_some()).count());

            placed.sort_by_key(|(rank, _, _)| *rank);
            for pair in placed.windows(2) {
                prop_assert!(pair[1].1 > pair[0].1);
                prop_assert!(pair[1].2 >= pair[0].2);
            }
        }
    }
}
