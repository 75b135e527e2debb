use crate::error::{ChartError, ChartResult};
use crate::ir::{Axis, ChartScene, DrawCommand, Legend, LegendSwatch, TextAnchor, TextBox};
use crate::palette::{LineDash, MarkerShape};
use crate::scale::AxisRange;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontDesc, FontFamily, FontStyle};

/// Scene sizes are in points; the canvas is laid out at 100 px per inch.
const PX_PER_POINT: f64 = 100.0 / 72.0;
const MARGIN: u32 = 20;

fn px(points: f64) -> i32 {
    (points * PX_PER_POINT).round() as i32
}

fn font_size(points: f64) -> f64 {
    points * PX_PER_POINT
}

fn stroke_px(points: f64) -> u32 {
    (points * PX_PER_POINT).round().max(1.0) as u32
}

fn font(points: f64, bold: bool) -> FontDesc<'static> {
    let style = if bold { FontStyle::Bold } else { FontStyle::Normal };
    FontDesc::new(FontFamily::SansSerif, font_size(points), style)
}

fn render_error<E: std::fmt::Display>(err: E) -> ChartError {
    ChartError::Render(err.to_string())
}

/// `#rrggbb`, `#rgb`, or one of the basic color names used in chart configs.
pub fn parse_color(spec: &str) -> ChartResult<RGBColor> {
    let spec = spec.trim();
    if let Some(hex) = spec.strip_prefix('#') {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ChartError::InvalidConfig(format!("invalid hex color '{}'", spec)));
        }
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(ChartError::InvalidConfig(format!("invalid hex color '{}'", spec))),
        };
        let channel = |i: usize| {
            u8::from_str_radix(&expanded[i..i + 2], 16)
                .map_err(|_| ChartError::InvalidConfig(format!("invalid hex color '{}'", spec)))
        };
        return Ok(RGBColor(channel(0)?, channel(2)?, channel(4)?));
    }

    let rgb = match spec.to_ascii_lowercase().as_str() {
        "black" => (0, 0, 0),
        "white" => (255, 255, 255),
        "red" => (255, 0, 0),
        "green" => (0, 128, 0),
        "lime" => (0, 255, 0),
        "blue" => (0, 0, 255),
        "orange" => (255, 165, 0),
        "purple" => (128, 0, 128),
        "brown" => (165, 42, 42),
        "pink" => (255, 192, 203),
        "gray" | "grey" => (128, 128, 128),
        "lightgray" | "lightgrey" => (211, 211, 211),
        "olive" => (128, 128, 0),
        "cyan" => (0, 255, 255),
        "magenta" => (255, 0, 255),
        "yellow" => (255, 255, 0),
        _ => return Err(ChartError::InvalidConfig(format!("unknown color '{}'", spec))),
    };
    Ok(RGBColor(rgb.0, rgb.1, rgb.2))
}

/// Render a scene to an SVG document.
pub fn render_svg(scene: &ChartScene) -> ChartResult<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (scene.width, scene.height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;
        draw_chart(&root, scene)?;
        draw_legend(&root, &scene.legend, scene)?;
        root.present().map_err(render_error)?;
    }
    Ok(svg)
}

fn draw_chart(root: &DrawingArea<SVGBackend, Shift>, scene: &ChartScene) -> ChartResult<()> {
    let fonts = &scene.fonts;
    let slots = scene.categories.len().max(1);
    let x_range = -0.5..(slots as f64 - 0.5);
    let primary = scene.y_axis;
    let secondary = scene.secondary_axis.unwrap_or(primary);

    let label_area = (font_size(fonts.tick) * 3.0 + font_size(fonts.axis_label) * 1.5) as u32;
    let right_area = if scene.secondary_axis.is_some() { label_area } else { 0 };

    let mut chart = ChartBuilder::on(root)
        .margin(MARGIN)
        .caption(&scene.title, font(fonts.title, true))
        .x_label_area_size((font_size(fonts.tick) + font_size(fonts.axis_label)) as u32 * 2)
        .y_label_area_size(label_area)
        .right_y_label_area_size(right_area)
        .build_cartesian_2d(
            x_range.clone(),
            (primary.min..primary.max).with_key_points(key_points(&primary)),
        )
        .map_err(render_error)?
        .set_secondary_coord(
            x_range,
            (secondary.min..secondary.max).with_key_points(key_points(&secondary)),
        );

    let categories = &scene.categories;
    let year_label = |x: &f64| {
        let slot = x.round();
        if (x - slot).abs() > 1e-6 || slot < 0.0 {
            return String::new();
        }
        categories.get(slot as usize).cloned().unwrap_or_default()
    };

    chart
        .configure_mesh()
        .disable_x_mesh()
        .light_line_style(BLACK.mix(0.05))
        .bold_line_style(BLACK.mix(0.15))
        .x_labels(slots)
        .x_label_formatter(&year_label)
        .y_label_formatter(&|y| format!("{:.0}", y))
        .x_desc(scene.x_label.as_str())
        .y_desc(scene.y_label.as_str())
        .label_style(font(fonts.tick, false))
        .axis_desc_style(font(fonts.axis_label, false))
        .draw()
        .map_err(render_error)?;

    if let Some(label) = &scene.secondary_label {
        chart
            .configure_secondary_axes()
            .y_desc(label.as_str())
            .y_label_formatter(&|y| format!("{:.2}", y))
            .label_style(font(fonts.tick, false).color(&RED))
            .axis_desc_style(font(fonts.axis_label, false).color(&RED))
            .draw()
            .map_err(render_error)?;
    }

    // Secondary values are drawn in primary data space
    let place = |axis: Axis, (x, y): (f64, f64)| -> (f64, f64) {
        match axis {
            Axis::Primary => (x, y),
            Axis::Secondary => (x, rescale(y, &secondary, &primary)),
        }
    };

    for command in &scene.commands {
        match command {
            DrawCommand::DrawRect {
                tl,
                br,
                fill,
                opacity,
                stroke,
            } => {
                if let Some(fill) = fill {
                    let style = parse_color(fill)?.mix(*opacity).filled();
                    chart
                        .draw_series(std::iter::once(Rectangle::new([*tl, *br], style)))
                        .map_err(render_error)?;
                }
                if let Some(stroke) = stroke {
                    let style = parse_color(&stroke.color)?.stroke_width(stroke_px(stroke.width));
                    chart
                        .draw_series(std::iter::once(Rectangle::new([*tl, *br], style)))
                        .map_err(render_error)?;
                }
            }
            DrawCommand::DrawLine {
                points,
                stroke,
                dash,
                axis,
            } => {
                let points: Vec<(f64, f64)> = points.iter().map(|p| place(*axis, *p)).collect();
                let style = parse_color(&stroke.color)?.stroke_width(stroke_px(stroke.width));
                let result = match dash {
                    LineDash::Solid => chart.draw_series(LineSeries::new(points, style)).map(|_| ()),
                    LineDash::Dashed => chart.draw_series(DashedLineSeries::new(points, 12, 6, style)).map(|_| ()),
                    LineDash::DashDot => chart.draw_series(DashedLineSeries::new(points, 10, 4, style)).map(|_| ()),
                    LineDash::Dotted => chart.draw_series(DashedLineSeries::new(points, 3, 5, style)).map(|_| ()),
                };
                result.map_err(render_error)?;
            }
            DrawCommand::DrawMarkers {
                points,
                shape,
                color,
                size,
                axis,
            } => {
                let color = parse_color(color)?;
                let radius = (px(*size) / 2).max(2);
                for point in points {
                    let at = place(*axis, *point);
                    match marker_vertices(*shape, radius) {
                        None => {
                            chart
                                .draw_series(std::iter::once(
                                    EmptyElement::at(at) + Circle::new((0, 0), radius, WHITE.filled()),
                                ))
                                .map_err(render_error)?;
                            chart
                                .draw_series(std::iter::once(
                                    EmptyElement::at(at) + Circle::new((0, 0), radius, color.stroke_width(2)),
                                ))
                                .map_err(render_error)?;
                        }
                        Some(vertices) => {
                            let mut outline = vertices.clone();
                            outline.push(vertices[0]);
                            chart
                                .draw_series(std::iter::once(
                                    EmptyElement::at(at) + Polygon::new(vertices, WHITE.filled()),
                                ))
                                .map_err(render_error)?;
                            chart
                                .draw_series(std::iter::once(
                                    EmptyElement::at(at) + PathElement::new(outline, color.stroke_width(2)),
                                ))
                                .map_err(render_error)?;
                        }
                    }
                }
            }
            DrawCommand::DrawText {
                at,
                offset,
                text,
                size,
                color,
                bold,
                anchor,
                background,
                axis,
            } => {
                let at = place(*axis, *at);
                let lift = px(*offset);
                if let Some(background) = background {
                    for rect in text_box(background, text, *size, *anchor, lift)? {
                        chart
                            .draw_series(std::iter::once(EmptyElement::at(at) + rect))
                            .map_err(render_error)?;
                    }
                }
                let v_pos = match anchor {
                    TextAnchor::Center => VPos::Center,
                    TextAnchor::Bottom => VPos::Bottom,
                };
                let style = font(*size, *bold)
                    .color(&parse_color(color)?)
                    .pos(Pos::new(HPos::Center, v_pos));
                chart
                    .draw_series(std::iter::once(
                        EmptyElement::at(at) + Text::new(text.clone(), (0, -lift), style),
                    ))
                    .map_err(render_error)?;
            }
        }
    }

    Ok(())
}

/// Y tick values: the axis' own spacing, or plotters' round steps when it has none.
fn key_points(axis: &AxisRange) -> Vec<f64> {
    let ticks = axis.ticks();
    if ticks.is_empty() {
        RangedCoordf64::from(axis.min..axis.max).key_points(10)
    } else {
        ticks
    }
}

fn rescale(value: f64, from: &AxisRange, to: &AxisRange) -> f64 {
    to.min + (value - from.min) / from.span() * to.span()
}

/// Rough text extent in pixels for the naive font metrics of the SVG backend.
fn text_extent(text: &str, points: f64) -> (i32, i32) {
    let size = font_size(points);
    ((text.chars().count() as f64 * size * 0.6) as i32, (size * 1.2) as i32)
}

/// Filled box plus optional border, relative to the anchor point.
fn text_box(
    background: &TextBox,
    text: &str,
    points: f64,
    anchor: TextAnchor,
    lift: i32,
) -> ChartResult<Vec<Rectangle<(i32, i32)>>> {
    let (width, height) = text_extent(text, points);
    let pad = (height / 5).max(2);
    let (top, bottom) = match anchor {
        TextAnchor::Center => (-height / 2, height / 2),
        TextAnchor::Bottom => (-height, 0),
    };
    let corners = [(-width / 2 - pad, top - lift - pad), (width / 2 + pad, bottom - lift + pad)];

    let mut rects = vec![Rectangle::new(
        corners,
        parse_color(&background.fill)?.mix(background.opacity).filled(),
    )];
    if let Some(border) = &background.border {
        rects.push(Rectangle::new(corners, parse_color(border)?.stroke_width(2)));
    }
    Ok(rects)
}

fn marker_vertices(shape: MarkerShape, r: i32) -> Option<Vec<(i32, i32)>> {
    let t = (r / 3).max(1);
    match shape {
        MarkerShape::Circle => None,
        MarkerShape::Square => Some(vec![(-r, -r), (r, -r), (r, r), (-r, r)]),
        MarkerShape::TriangleUp => Some(vec![(0, -r), (r, r), (-r, r)]),
        MarkerShape::TriangleDown => Some(vec![(-r, -r), (r, -r), (0, r)]),
        MarkerShape::Diamond => Some(vec![(0, -r), (r, 0), (0, r), (-r, 0)]),
        MarkerShape::Cross => Some(vec![
            (-t, -r),
            (t, -r),
            (t, -t),
            (r, -t),
            (r, t),
            (t, t),
            (t, r),
            (-t, r),
            (-t, t),
            (-r, t),
            (-r, -t),
            (-t, -t),
        ]),
    }
}

/// Legend box in the top-right corner of the plotting area.
fn draw_legend(root: &DrawingArea<SVGBackend, Shift>, legend: &Legend, scene: &ChartScene) -> ChartResult<()> {
    if legend.entries.is_empty() {
        return Ok(());
    }
    let fonts = &scene.fonts;
    let row = (font_size(fonts.legend) * 1.6) as i32;
    let swatch = (font_size(fonts.legend) * 1.8) as i32;
    let title_row = legend.title.as_ref().map_or(0, |_| (font_size(fonts.legend_title) * 1.6) as i32);

    let widest = legend
        .entries
        .iter()
        .map(|e| text_extent(&e.label, fonts.legend).0)
        .chain(legend.title.iter().map(|t| text_extent(t, fonts.legend_title).0))
        .max()
        .unwrap_or(0);
    let width = widest + swatch + 30;
    let height = title_row + row * legend.entries.len() as i32 + 16;

    let right_area = if scene.secondary_axis.is_some() { 140 } else { 40 };
    let x0 = scene.width as i32 - right_area - width;
    let y0 = (font_size(fonts.title) * 2.5) as i32 + MARGIN as i32;

    root.draw(&Rectangle::new([(x0, y0), (x0 + width, y0 + height)], WHITE.mix(0.95).filled()))
        .map_err(render_error)?;
    root.draw(&Rectangle::new(
        [(x0, y0), (x0 + width, y0 + height)],
        RGBColor(128, 128, 128).stroke_width(1),
    ))
    .map_err(render_error)?;

    if let Some(title) = &legend.title {
        root.draw_text(
            title,
            &font(fonts.legend_title, true).color(&BLACK).pos(Pos::new(HPos::Center, VPos::Top)),
            (x0 + width / 2, y0 + 8),
        )
        .map_err(render_error)?;
    }

    for (i, entry) in legend.entries.iter().enumerate() {
        let y = y0 + 8 + title_row + row * i as i32;
        let mid = y + row / 2;
        let sx = x0 + 10;
        let color = parse_color(&entry.color)?;
        match &entry.swatch {
            LegendSwatch::Filled => root
                .draw(&Rectangle::new([(sx, mid - row / 3), (sx + swatch, mid + row / 3)], color.filled()))
                .map_err(render_error)?,
            LegendSwatch::Outline { width } => root
                .draw(&Rectangle::new(
                    [(sx, mid - row / 3), (sx + swatch, mid + row / 3)],
                    color.stroke_width(stroke_px(*width)),
                ))
                .map_err(render_error)?,
            LegendSwatch::Line { marker, .. } => {
                root.draw(&PathElement::new(vec![(sx, mid), (sx + swatch, mid)], color.stroke_width(3)))
                    .map_err(render_error)?;
                let r = (row / 4).max(2);
                match marker_vertices(*marker, r) {
                    None => root
                        .draw(&Circle::new((sx + swatch / 2, mid), r, color.stroke_width(2)))
                        .map_err(render_error)?,
                    Some(vertices) => {
                        let mut outline: Vec<(i32, i32)> =
                            vertices.iter().map(|(vx, vy)| (sx + swatch / 2 + vx, mid + vy)).collect();
                        outline.push(outline[0]);
                        root.draw(&PathElement::new(outline, color.stroke_width(2)))
                            .map_err(render_error)?;
                    }
                }
            }
        }
        root.draw_text(
            &entry.label,
            &font(fonts.legend, false).color(&BLACK).pos(Pos::new(HPos::Left, VPos::Center)),
            (sx + swatch + 8, mid),
        )
        .map_err(render_error)?;
    }
    Ok(())
}
