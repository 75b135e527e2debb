use crate::config::FontSizes;
use crate::ir::{
    Axis, ChartScene, DrawCommand, Legend, LegendEntry, LegendSwatch, MarkerKind, PriceLayout, RangeLayout,
    Segment, StackedLayout, Stroke, TextAnchor, TextBox,
};
use crate::palette::{DEMAND_OUTLINE_COLOR, FORECAST_OUTLINE_COLOR};

const OUTLINE_WIDTH: f64 = 0.3;
const FORECAST_WIDTH: f64 = 2.0;
const PRICE_LINE_WIDTH: f64 = 3.0;
const PRICE_MARKER_SIZE: f64 = 10.0;
/// Labels above bars sit this fraction of the value higher.
const LABEL_LIFT: f64 = 0.05;

/// Caption and axis titles of a chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartText {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub secondary_label: Option<String>,
}

/// Stacked canvas widens with the number of series: `max(1200, 100 * series)` x 900 px.
pub fn stacked_canvas(series_count: usize) -> (u32, u32) {
    ((100 * series_count as u32).max(1200), 900)
}

pub const RANGE_CANVAS: (u32, u32) = (1500, 900);

/// Compile a stacked layout, optionally with a price overlay, into a scene graph.
pub fn compile_stacked(
    layout: &StackedLayout,
    price: Option<&PriceLayout>,
    text: ChartText,
    fonts: &FontSizes,
) -> ChartScene {
    let mut commands = Vec::new();
    let half = layout.bar_width / 2.0;

    let style = SegmentStyle {
        opacity: 1.0,
        edge: None,
        label_box_opacity: 0.7,
    };
    compile_segments(&layout.segments, half, &style, fonts, &mut commands);

    for (i, label) in layout.total_labels.iter().enumerate() {
        let Some(label) = label else { continue };
        let total = layout.totals[i];
        commands.push(DrawCommand::DrawText {
            at: (i as f64, total * (1.0 + LABEL_LIFT)),
            offset: 0.0,
            text: label.clone(),
            size: fonts.demand_label,
            color: "black".to_string(),
            bold: true,
            anchor: TextAnchor::Bottom,
            background: Some(TextBox {
                fill: "lightgray".to_string(),
                opacity: 0.8,
                border: Some("black".to_string()),
            }),
            axis: Axis::Primary,
        });
    }

    for marker in &layout.markers {
        let x = marker.year_index as f64;
        let (color, width) = match marker.kind {
            MarkerKind::Outline => (DEMAND_OUTLINE_COLOR, OUTLINE_WIDTH),
            MarkerKind::Forecast => (FORECAST_OUTLINE_COLOR, FORECAST_WIDTH),
        };
        commands.push(DrawCommand::DrawRect {
            tl: (x - half, marker.value),
            br: (x + half, 0.0),
            fill: None,
            opacity: 1.0,
            stroke: Some(Stroke {
                color: color.to_string(),
                width,
            }),
        });
        if let Some(label) = &marker.label {
            commands.push(DrawCommand::DrawText {
                at: (x, marker.value * (1.0 + LABEL_LIFT)),
                offset: 0.0,
                text: label.clone(),
                size: fonts.demand_label,
                color: color.to_string(),
                bold: true,
                anchor: TextAnchor::Bottom,
                background: None,
                axis: Axis::Primary,
            });
        }
    }

    let mut legend = Legend {
        title: Some("Legend".to_string()),
        entries: layout
            .series
            .iter()
            .map(|s| LegendEntry {
                label: s.label.clone(),
                color: s.color.clone(),
                swatch: LegendSwatch::Filled,
            })
            .collect(),
    };
    legend.entries.extend(demand_legend(layout));

    if let Some(price) = price {
        compile_price(price, fonts, &mut commands);
        legend.entries.extend(price.lines.iter().map(|line| LegendEntry {
            label: line.label.clone(),
            color: line.color.clone(),
            swatch: LegendSwatch::Line {
                dash: line.dash,
                marker: line.marker,
            },
        }));
    }

    let price_series = price.map_or(0, |p| p.lines.len());
    let (width, height) = stacked_canvas(layout.series.len() + price_series);

    ChartScene {
        width,
        height,
        title: text.title,
        x_label: text.x_label,
        y_label: text.y_label,
        secondary_label: price.and(text.secondary_label),
        categories: layout.years.iter().map(|y| y.to_string()).collect(),
        y_axis: layout.y_axis,
        secondary_axis: price.map(|p| p.axis),
        commands,
        legend,
        fonts: fonts.clone(),
    }
}

/// Compile a business-plan layout into a scene graph.
pub fn compile_range(layout: &RangeLayout, text: ChartText, fonts: &FontSizes) -> ChartScene {
    let mut commands = Vec::new();
    let style = SegmentStyle {
        opacity: 0.8,
        edge: Some(Stroke {
            color: "white".to_string(),
            width: 1.0,
        }),
        label_box_opacity: 0.3,
    };
    compile_segments(&layout.segments, layout.bar_width / 2.0, &style, fonts, &mut commands);

    let legend = Legend {
        title: None,
        entries: layout
            .series
            .iter()
            .map(|s| LegendEntry {
                label: s.label.clone(),
                color: s.color.clone(),
                swatch: LegendSwatch::Filled,
            })
            .collect(),
    };

    ChartScene {
        width: RANGE_CANVAS.0,
        height: RANGE_CANVAS.1,
        title: text.title,
        x_label: text.x_label,
        y_label: text.y_label,
        secondary_label: None,
        categories: layout.years.iter().map(|y| y.to_string()).collect(),
        y_axis: layout.y_axis,
        secondary_axis: None,
        commands,
        legend,
        fonts: fonts.clone(),
    }
}

struct SegmentStyle {
    opacity: f64,
    edge: Option<Stroke>,
    label_box_opacity: f64,
}

fn compile_segments(
    segments: &[Segment],
    half_width: f64,
    style: &SegmentStyle,
    fonts: &FontSizes,
    commands: &mut Vec<DrawCommand>,
) {
    // Rects first so labels stay on top of neighbouring segments
    for segment in segments.iter().filter(|s| s.height > 0.0) {
        let x = segment.year_index as f64;
        commands.push(DrawCommand::DrawRect {
            tl: (x - half_width, segment.top()),
            br: (x + half_width, segment.bottom),
            fill: Some(segment.color.clone()),
            opacity: style.opacity,
            stroke: style.edge.clone(),
        });
    }

    for segment in segments {
        let Some(label) = &segment.label else { continue };
        commands.push(DrawCommand::DrawText {
            at: (segment.year_index as f64, segment.center()),
            offset: 0.0,
            text: label.text.clone(),
            size: fonts.value_label,
            color: label.tone.text_color().to_string(),
            bold: true,
            anchor: TextAnchor::Center,
            background: Some(TextBox {
                fill: label.tone.box_color().to_string(),
                opacity: style.label_box_opacity,
                border: None,
            }),
            axis: Axis::Primary,
        });
    }
}

fn demand_legend(layout: &StackedLayout) -> Vec<LegendEntry> {
    let outline_years: Vec<i32> = layout
        .markers
        .iter()
        .filter(|m| m.kind == MarkerKind::Outline)
        .map(|m| layout.years[m.year_index])
        .collect();

    let mut entries = Vec::new();
    if let (Some(first), Some(last)) = (outline_years.first(), outline_years.last()) {
        let label = if first == last {
            format!("Demand ({})", first)
        } else {
            format!("Demand ({}-{})", first, last)
        };
        entries.push(LegendEntry {
            label,
            color: DEMAND_OUTLINE_COLOR.to_string(),
            swatch: LegendSwatch::Outline { width: OUTLINE_WIDTH },
        });
    }
    if layout.markers.iter().any(|m| m.kind == MarkerKind::Forecast) {
        if let Some(year) = layout.forecast_year {
            entries.push(LegendEntry {
                label: format!("{} Demand", year),
                color: FORECAST_OUTLINE_COLOR.to_string(),
                swatch: LegendSwatch::Outline { width: FORECAST_WIDTH },
            });
        }
    }
    entries
}

fn compile_price(price: &PriceLayout, fonts: &FontSizes, commands: &mut Vec<DrawCommand>) {
    for line in &price.lines {
        let points: Vec<(f64, f64)> = line.points.iter().map(|&(i, v)| (i as f64, v)).collect();
        commands.push(DrawCommand::DrawLine {
            points: points.clone(),
            stroke: Stroke {
                color: line.color.clone(),
                width: PRICE_LINE_WIDTH,
            },
            dash: line.dash,
            axis: Axis::Secondary,
        });
        commands.push(DrawCommand::DrawMarkers {
            points,
            shape: line.marker,
            color: line.color.clone(),
            size: PRICE_MARKER_SIZE,
            axis: Axis::Secondary,
        });
    }

    for annotation in &price.annotations {
        let color = price
            .lines
            .iter()
            .find(|l| l.name == annotation.series)
            .map(|l| l.color.clone())
            .unwrap_or_else(|| "black".to_string());
        commands.push(DrawCommand::DrawText {
            at: (annotation.year_index as f64, annotation.value),
            offset: annotation.offset,
            text: annotation.text.clone(),
            size: fonts.price_annotation,
            color: color.clone(),
            bold: true,
            anchor: TextAnchor::Bottom,
            background: Some(TextBox {
                fill: "white".to_string(),
                opacity: 0.9,
                border: Some(color),
            }),
            axis: Axis::Secondary,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DemandMarker, LabelTone, PriceAnnotation, PriceLine, SegmentLabel, SeriesKey};
    use crate::palette::{LineDash, MarkerShape};
    use crate::scale::AxisRange;

    fn text() -> ChartText {
        ChartText {
            title: "Demand Analysis for ACME total demand (mt)".to_string(),
            x_label: "Year".to_string(),
            y_label: "Demand".to_string(),
            secondary_label: Some("Price".to_string()),
        }
    }

    fn segment(series: &str, year_index: usize, bottom: f64, height: f64, label: Option<&str>) -> Segment {
        Segment {
            series: series.to_string(),
            year_index,
            bottom,
            height,
            color: "#1f77b4".to_string(),
            label: label.map(|t| SegmentLabel {
                text: t.to_string(),
                tone: LabelTone::Light,
            }),
        }
    }

    fn make_layout() -> StackedLayout {
        StackedLayout {
            years: vec![2022, 2023, 2024, 2025],
            series: vec![SeriesKey {
                name: "covestro".to_string(),
                label: "Covestro".to_string(),
                color: "#1f77b4".to_string(),
            }],
            segments: vec![
                segment("covestro", 0, 0.0, 100.0, Some("100")),
                segment("covestro", 1, 0.0, 120.0, Some("120")),
                segment("covestro", 2, 0.0, 130.0, Some("130")),
                segment("covestro", 3, 0.0, 0.0, None),
            ],
            totals: vec![100.0, 120.0, 130.0, 0.0],
            total_labels: vec![None; 4],
            markers: vec![
                DemandMarker {
                    year_index: 1,
                    value: 200.0,
                    kind: MarkerKind::Outline,
                    label: None,
                },
                DemandMarker {
                    year_index: 3,
                    value: 300.0,
                    kind: MarkerKind::Forecast,
                    label: Some("300".to_string()),
                },
            ],
            forecast_year: Some(2025),
            y_axis: AxisRange::new(0.0, 330.0).unwrap(),
            bar_width: 0.6,
        }
    }

    #[test]
    fn test_compile_stacked_rects_and_markers() {
        let scene = compile_stacked(&make_layout(), None, text(), &FontSizes::default());

        let rects: Vec<&DrawCommand> = scene
            .commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::DrawRect { .. }))
            .collect();
        // Three non-empty segments plus two demand outlines
        assert_eq!(rects.len(), 5);

        if let DrawCommand::DrawRect { tl, br, fill, .. } = rects[0] {
            assert_eq!(*tl, (-0.3, 100.0));
            assert_eq!(*br, (0.3, 0.0));
            assert_eq!(fill.as_deref(), Some("#1f77b4"));
        } else {
            panic!("Expected DrawRect");
        }

        if let DrawCommand::DrawRect { fill, stroke, .. } = rects[4] {
            assert!(fill.is_none());
            assert_eq!(stroke.as_ref().unwrap().color, "red");
        } else {
            panic!("Expected DrawRect");
        }

        assert_eq!(scene.categories, vec!["2022", "2023", "2024", "2025"]);
        assert_eq!(scene.secondary_axis, None);
        assert_eq!(scene.secondary_label, None);
        assert_eq!((scene.width, scene.height), (1200, 900));
    }

    #[test]
    fn test_compile_stacked_legend() {
        let scene = compile_stacked(&make_layout(), None, text(), &FontSizes::default());
        let labels: Vec<&str> = scene.legend.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Covestro", "Demand (2023)", "2025 Demand"]);
        assert_eq!(scene.legend.title.as_deref(), Some("Legend"));
    }

    #[test]
    fn test_compile_price_overlay() {
        let price = PriceLayout {
            lines: vec![PriceLine {
                name: "pocket price".to_string(),
                label: "Pocket Price".to_string(),
                color: "red".to_string(),
                marker: MarkerShape::Circle,
                dash: LineDash::Solid,
                points: vec![(0, 10.0), (2, 12.0)],
            }],
            annotations: vec![PriceAnnotation {
                series: "pocket price".to_string(),
                year_index: 0,
                value: 10.0,
                rank: 0,
                offset: 25.0,
                text: "10.00".to_string(),
            }],
            axis: AxisRange::new(9.6, 12.4).unwrap(),
        };
        let scene = compile_stacked(&make_layout(), Some(&price), text(), &FontSizes::default());

        assert_eq!(scene.secondary_label.as_deref(), Some("Price"));
        assert!(scene.secondary_axis.is_some());
        let line = scene
            .commands
            .iter()
            .find_map(|c| match c {
                DrawCommand::DrawLine { points, axis, .. } => Some((points.clone(), *axis)),
                _ => None,
            })
            .unwrap();
        assert_eq!(line, (vec![(0.0, 10.0), (2.0, 12.0)], Axis::Secondary));
        assert!(scene.texts().any(|t| t == "10.00"));
        assert_eq!(scene.legend.entries.last().unwrap().label, "Pocket Price");
    }

    #[test]
    fn test_stacked_canvas_grows() {
        assert_eq!(stacked_canvas(7), (1200, 900));
        assert_eq!(stacked_canvas(15), (1500, 900));
    }
}
