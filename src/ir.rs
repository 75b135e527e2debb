use crate::config::FontSizes;
use crate::palette::{LineDash, MarkerShape};
use crate::scale::AxisRange;

// =============================================================================
// Phase 1: Layout
// =============================================================================

/// Contrast choice of a value label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelTone {
    /// White text on a dark box, for large segments.
    Light,
    /// Black text on a light box.
    Dark,
}

impl LabelTone {
    pub fn text_color(&self) -> &'static str {
        match self {
            LabelTone::Light => "white",
            LabelTone::Dark => "black",
        }
    }

    pub fn box_color(&self) -> &'static str {
        match self {
            LabelTone::Light => "black",
            LabelTone::Dark => "white",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentLabel {
    pub text: String,
    pub tone: LabelTone,
}

/// One stacked bar piece: a series' value at one year.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub series: String,
    pub year_index: usize,
    pub bottom: f64,
    pub height: f64,
    pub color: String,
    pub label: Option<SegmentLabel>,
}

impl Segment {
    pub fn top(&self) -> f64 {
        self.bottom + self.height
    }

    pub fn center(&self) -> f64 {
        self.bottom + self.height / 2.0
    }
}

/// Legend identity of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesKey {
    pub name: String,
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// Realized demand, thin outline.
    Outline,
    /// Forecast or target demand, heavy outline.
    Forecast,
}

/// Unfilled bar drawn over a stack to show demand.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandMarker {
    pub year_index: usize,
    pub value: f64,
    pub kind: MarkerKind,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StackedLayout {
    pub years: Vec<i32>,
    pub series: Vec<SeriesKey>,
    /// Series-major: every series has one segment per year.
    pub segments: Vec<Segment>,
    pub totals: Vec<f64>,
    pub total_labels: Vec<Option<String>>,
    pub markers: Vec<DemandMarker>,
    pub forecast_year: Option<i32>,
    pub y_axis: AxisRange,
    pub bar_width: f64,
}

impl StackedLayout {
    pub fn segments_at(&self, year_index: usize) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(move |s| s.year_index == year_index)
    }
}

/// Price value label with its vertical offset in points above the data point.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceAnnotation {
    pub series: String,
    pub year_index: usize,
    pub value: f64,
    pub rank: usize,
    pub offset: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceLine {
    pub name: String,
    pub label: String,
    pub color: String,
    pub marker: MarkerShape,
    pub dash: LineDash,
    pub points: Vec<(usize, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceLayout {
    pub lines: Vec<PriceLine>,
    pub annotations: Vec<PriceAnnotation>,
    pub axis: AxisRange,
}

impl PriceLayout {
    /// Highest plotted price across all lines.
    pub fn max_price(&self) -> Option<f64> {
        self.lines
            .iter()
            .flat_map(|l| l.points.iter().map(|(_, v)| *v))
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeLayout {
    pub years: Vec<i32>,
    pub series: Vec<SeriesKey>,
    pub segments: Vec<Segment>,
    pub totals: Vec<f64>,
    pub y_axis: AxisRange,
    pub bar_width: f64,
}

// =============================================================================
// Phase 2: Compilation (Scene Graph)
// =============================================================================

/// Which vertical scale a command's y values are in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Center,
    Bottom,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: String,
    /// Points
    pub width: f64,
}

/// Box behind a text label.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    pub fill: String,
    pub opacity: f64,
    pub border: Option<String>,
}

/// A list of primitive drawing commands.
/// The backend just executes these blindly.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    DrawRect {
        // Top-Left, Bottom-Right in data space
        tl: (f64, f64),
        br: (f64, f64),
        fill: Option<String>,
        opacity: f64,
        stroke: Option<Stroke>,
    },
    DrawLine {
        points: Vec<(f64, f64)>,
        stroke: Stroke,
        dash: LineDash,
        axis: Axis,
    },
    DrawMarkers {
        points: Vec<(f64, f64)>,
        shape: MarkerShape,
        color: String,
        /// Points
        size: f64,
        axis: Axis,
    },
    DrawText {
        at: (f64, f64),
        /// Upward shift in points from `at`.
        offset: f64,
        text: String,
        /// Points
        size: f64,
        color: String,
        bold: bool,
        anchor: TextAnchor,
        background: Option<TextBox>,
        axis: Axis,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LegendSwatch {
    Filled,
    Outline { width: f64 },
    Line { dash: LineDash, marker: MarkerShape },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: String,
    pub swatch: LegendSwatch,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Legend {
    pub title: Option<String>,
    pub entries: Vec<LegendEntry>,
}

/// A fully resolved chart, independent of any drawing backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartScene {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub secondary_label: Option<String>,
    /// X tick labels, one per bar slot at x = 0, 1, ...
    pub categories: Vec<String>,
    pub y_axis: AxisRange,
    pub secondary_axis: Option<AxisRange>,
    pub commands: Vec<DrawCommand>,
    pub legend: Legend,
    pub fonts: FontSizes,
}

impl ChartScene {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::DrawText { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}
