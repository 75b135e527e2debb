// Chart geometry: stacked supplier bars, price overlays, business-plan ranges.

pub mod price;
pub mod range;
pub mod stacked;

pub use price::{annotation_offsets, layout_price, PriceOverlayConfig};
pub use range::{layout_range, RangeLayoutConfig};
pub use stacked::{layout_stacked, StackOptions, StackedLayoutConfig};

use serde::{Deserialize, Serialize};

/// What a segment label shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ValueLabels {
    #[default]
    Values,
    /// Share of the year's stack total.
    Percentages,
}

impl ValueLabels {
    pub fn format(&self, value: f64, total: f64) -> String {
        match self {
            ValueLabels::Percentages if total > 0.0 => format!("{:.1}%", value / total * 100.0),
            _ => format!("{:.0}", value),
        }
    }
}
