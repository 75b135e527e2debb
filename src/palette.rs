// Color and marker palettes for chart series

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

const CATEGORY10: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f", "#bcbd22",
    "#17becf",
];

const TAB20: [&str; 20] = [
    "#1f77b4", "#aec7e8", "#ff7f0e", "#ffbb78", "#2ca02c", "#98df8a", "#d62728", "#ff9896", "#9467bd",
    "#c5b0d5", "#8c564b", "#c49c94", "#e377c2", "#f7b6d2", "#7f7f7f", "#c7c7c7", "#bcbd22", "#dbdb8d",
    "#17becf", "#9edae5",
];

const PRICE_LINES: [&str; 10] = [
    "#FF0000", "#00FF00", "#008000", "#FF00FF", "#00FFFF", "#FFA500", "#800080", "#008000", "#FFC0CB",
    "#A52A2A",
];

/// Min, base, max band colors of the business-plan chart.
pub const BUSINESS_PLAN_COLORS: [&str; 3] = ["#009fe4", "#00bb7e", "#ff7f41"];

pub const DEMAND_OUTLINE_COLOR: &str = "blue";
pub const FORECAST_OUTLINE_COLOR: &str = "red";

/// Color palette for categorical data
#[derive(Debug, Clone, PartialEq)]
pub struct ColorPalette {
    colors: Vec<String>,
}

impl ColorPalette {
    /// Create a Category10 color palette (D3-inspired)
    pub fn category10() -> Self {
        ColorPalette::from_colors(CATEGORY10.iter().map(|c| c.to_string()).collect())
    }

    /// Paired light/dark variant with 20 entries
    pub fn tab20() -> Self {
        ColorPalette::from_colors(TAB20.iter().map(|c| c.to_string()).collect())
    }

    /// Category10 while it has enough distinct colors, Tab20 beyond that.
    pub fn for_series(count: usize) -> Self {
        if count <= CATEGORY10.len() {
            ColorPalette::category10()
        } else {
            ColorPalette::tab20()
        }
    }

    /// Line colors for price overlays, used when a product line configures none.
    pub fn price_lines() -> Self {
        ColorPalette::from_colors(PRICE_LINES.iter().map(|c| c.to_string()).collect())
    }

    /// An empty list falls back to Category10.
    pub fn from_colors(colors: Vec<String>) -> Self {
        if colors.is_empty() {
            return ColorPalette::category10();
        }
        ColorPalette { colors }
    }

    /// Get color for a specific index (wraps around if index > palette size)
    pub fn get_color(&self, index: usize) -> String {
        self.colors[index % self.colors.len()].clone()
    }

    /// Assign colors to series names, keeping their order
    pub fn assign_colors(&self, keys: &[String]) -> IndexMap<String, String> {
        keys.iter()
            .enumerate()
            .map(|(i, key)| (key.clone(), self.get_color(i)))
            .collect()
    }
}

/// Point marker drawn on price lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerShape {
    Circle,
    Square,
    TriangleUp,
    Diamond,
    TriangleDown,
    Cross,
}

/// Stroke pattern of a price line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineDash {
    Solid,
    Dashed,
    DashDot,
    Dotted,
}

/// Shape palette for price series
pub struct ShapePalette {
    shapes: Vec<MarkerShape>,
}

impl ShapePalette {
    pub fn default_shapes() -> Self {
        ShapePalette {
            shapes: vec![
                MarkerShape::Circle,
                MarkerShape::Square,
                MarkerShape::TriangleUp,
                MarkerShape::Diamond,
                MarkerShape::TriangleDown,
                MarkerShape::Cross,
            ],
        }
    }

    /// Get shape for a specific index (wraps around)
    pub fn get_shape(&self, index: usize) -> MarkerShape {
        self.shapes[index % self.shapes.len()]
    }
}

pub fn line_dash(index: usize) -> LineDash {
    const CYCLE: [LineDash; 4] = [LineDash::Solid, LineDash::Dashed, LineDash::DashDot, LineDash::Dotted];
    CYCLE[index % CYCLE.len()]
}

/// Legend text for a column name: underscores become spaces, words are title-cased.
///
/// `pocket price` -> `Pocket Price`, `apac_pp` -> `Apac Pp`.
pub fn legend_label(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut previous_cased = false;
    for ch in name.chars() {
        let ch = if ch == '_' { ' ' } else { ch };
        if ch.is_alphabetic() {
            if previous_cased {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            previous_cased = true;
        } else {
            out.push(ch);
            previous_cased = false;
        }
    }
    out
}
