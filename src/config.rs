use crate::error::{ChartError, ChartResult};
use crate::graph::parse_color;
use crate::layout::{PriceOverlayConfig, RangeLayoutConfig, StackedLayoutConfig, ValueLabels};
use crate::palette::ColorPalette;
use crate::runtime::ChartKind;
use crate::transform::{CompetitorList, CustomerMapping, DateParser, RawColumns};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Product line; selects suppliers, price columns and data files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum Material {
    #[serde(rename = "MDI")]
    Mdi,
    #[serde(rename = "TDI")]
    Tdi,
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Material::Mdi => write!(f, "MDI"),
            Material::Tdi => write!(f, "TDI"),
        }
    }
}

/// Point sizes per text role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSizes {
    pub title: f64,
    pub axis_label: f64,
    pub tick: f64,
    pub legend: f64,
    pub legend_title: f64,
    pub value_label: f64,
    pub price_annotation: f64,
    pub demand_label: f64,
}

impl Default for FontSizes {
    fn default() -> Self {
        FontSizes {
            title: 14.0,
            axis_label: 12.0,
            tick: 10.0,
            legend: 9.0,
            legend_title: 10.0,
            value_label: 10.0,
            price_annotation: 9.0,
            demand_label: 12.0,
        }
    }
}

impl FontSizes {
    pub(crate) fn validate(&self) -> ChartResult<()> {
        let sizes = [
            self.title,
            self.axis_label,
            self.tick,
            self.legend,
            self.legend_title,
            self.value_label,
            self.price_annotation,
            self.demand_label,
        ];
        if sizes.iter().all(|s| *s > 0.0 && s.is_finite()) {
            Ok(())
        } else {
            Err(ChartError::InvalidConfig("font sizes must be positive".to_string()))
        }
    }
}

/// Which supplier columns a stacked chart shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplierScope {
    /// Reporting entity followed by every competitor.
    #[default]
    All,
    /// Own volume only.
    ReportingEntity,
}

/// Price axis derived from the customer's highest price: `(min, factor * max_price)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceAxisPolicy {
    pub min: f64,
    pub factor: f64,
}

/// Per chart kind defaults, overridable per request.
///
/// A `[charts.*]` table in a config file replaces the built-in preset as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartDefaults {
    pub fonts: FontSizes,
    pub value_labels: ValueLabels,
    pub total_labels: bool,
    pub outline_labels: bool,
    pub suppliers: SupplierScope,
    pub show_prices: bool,
    /// Demand axis `(0, factor * max_demand)`; auto-scaled when absent.
    pub demand_axis_factor: Option<f64>,
    pub price_axis: Option<PriceAxisPolicy>,
    /// Replaces `price.annotation_spacing` for this chart kind.
    pub annotation_spacing: Option<f64>,
}

impl Default for ChartDefaults {
    fn default() -> Self {
        ChartDefaults {
            fonts: FontSizes::default(),
            value_labels: ValueLabels::Values,
            total_labels: false,
            outline_labels: true,
            suppliers: SupplierScope::All,
            show_prices: false,
            demand_axis_factor: None,
            price_axis: None,
            annotation_spacing: None,
        }
    }
}

impl ChartDefaults {
    pub fn customer_demand() -> Self {
        ChartDefaults {
            fonts: FontSizes {
                title: 20.0,
                axis_label: 16.0,
                tick: 16.0,
                legend: 12.0,
                legend_title: 18.0,
                value_label: 14.0,
                price_annotation: 12.0,
                demand_label: 18.0,
            },
            value_labels: ValueLabels::Percentages,
            total_labels: true,
            outline_labels: false,
            demand_axis_factor: Some(1.4),
            ..ChartDefaults::default()
        }
    }

    pub fn price_volume() -> Self {
        ChartDefaults {
            fonts: FontSizes {
                title: 22.0,
                axis_label: 20.0,
                tick: 18.0,
                legend: 16.0,
                legend_title: 16.0,
                value_label: 18.0,
                price_annotation: 16.0,
                demand_label: 20.0,
            },
            suppliers: SupplierScope::ReportingEntity,
            show_prices: true,
            demand_axis_factor: Some(2.0),
            price_axis: Some(PriceAxisPolicy { min: 0.5, factor: 1.5 }),
            annotation_spacing: Some(25.0),
            ..ChartDefaults::default()
        }
    }

    pub fn business_plan() -> Self {
        ChartDefaults {
            fonts: FontSizes {
                title: 22.0,
                axis_label: 20.0,
                tick: 20.0,
                legend: 18.0,
                legend_title: 18.0,
                value_label: 16.0,
                price_annotation: 16.0,
                demand_label: 16.0,
            },
            ..ChartDefaults::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Charts {
    pub customer_demand: ChartDefaults,
    pub price_volume: ChartDefaults,
    pub business_plan: ChartDefaults,
}

impl Default for Charts {
    fn default() -> Self {
        Charts {
            customer_demand: ChartDefaults::customer_demand(),
            price_volume: ChartDefaults::price_volume(),
            business_plan: ChartDefaults::business_plan(),
        }
    }
}

impl Charts {
    pub fn get(&self, kind: ChartKind) -> &ChartDefaults {
        match kind {
            ChartKind::CustomerDemand => &self.customer_demand,
            ChartKind::PriceVolume => &self.price_volume,
            ChartKind::BusinessPlan => &self.business_plan,
        }
    }
}

/// Everything that differs between product lines.
///
/// A product line given in a config file replaces the built-in one as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductLine {
    #[serde(default = "default_customer_column")]
    pub customer_column: String,
    #[serde(default = "default_year_column")]
    pub year_column: String,
    #[serde(default = "default_reporting_entity")]
    pub reporting_entity: String,
    pub competitors: Vec<String>,
    #[serde(default)]
    pub price_columns: Vec<String>,
    #[serde(default)]
    pub price_colors: Vec<String>,
    #[serde(default)]
    pub customer_mapping: CustomerMapping,
    #[serde(default)]
    pub raw_columns: RawColumns,
    #[serde(default)]
    pub date_parser: DateParser,
}

fn default_customer_column() -> String {
    "customer".to_string()
}

fn default_year_column() -> String {
    "year".to_string()
}

fn default_reporting_entity() -> String {
    "covestro".to_string()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl ProductLine {
    pub fn mdi() -> Self {
        ProductLine {
            customer_column: default_customer_column(),
            year_column: default_year_column(),
            reporting_entity: default_reporting_entity(),
            competitors: strings(&["tosoh", "wanhua", "kmc", "basf", "sabic", "huntsman"]),
            price_columns: strings(&["pocket price", "seap_pp", "apac_pp"]),
            price_colors: strings(&["red", "green", "blue"]),
            customer_mapping: CustomerMapping::default(),
            raw_columns: RawColumns::default(),
            date_parser: DateParser::month_year(),
        }
    }

    pub fn tdi() -> Self {
        ProductLine {
            competitors: strings(&["mcns", "wanhua", "basf", "hanwha", "sabic", "other"]),
            price_columns: strings(&["pocket price", "apac_pp"]),
            price_colors: strings(&["red", "green"]),
            customer_mapping: CustomerMapping::new([
                ("HEADWAY ADVANCED MATERIALS INC", "HEADWAY ADVANCED MATERIALS"),
                ("Headway Advanced Materials Inc.", "HEADWAY ADVANCED MATERIALS"),
                ("KUN CHING KEY-INDUSTRY CO LTD", "KUN CHING"),
                ("KUN CHING INDUSTRIAL CO., LTD.", "KUN CHING"),
                ("CHEN CHI HSIANG INDUSTRY", "CHEN CHI HSIANG"),
                ("Chiao Fu Enterprise Co.Ltd", "CHIAO FU"),
                ("Chiao Fu Enterprises Co., Ltd", "CHIAO FU"),
                ("JIANN FONG POLYURETHANE", "JIANN FONG"),
                ("TONG FONG TRADING CO LTD", "TONG FONG"),
                ("TONG FONG TRADING CO., LTD.", "TONG FONG"),
                ("Len Wa Enterprise Corp.", "LEN WA"),
                ("Tayfull Industrial Co.Ltd", "TAYFULL"),
            ]),
            ..ProductLine::mdi()
        }
    }

    /// Stack order: reporting entity first, then competitors in list order.
    pub fn suppliers(&self, scope: SupplierScope) -> Vec<String> {
        let mut suppliers = vec![self.reporting_entity.clone()];
        if scope == SupplierScope::All {
            suppliers.extend(self.competitors.iter().cloned());
        }
        suppliers
    }

    pub fn competitor_list(&self) -> ChartResult<CompetitorList> {
        CompetitorList::new(
            self.competitors.clone(),
            &self.reporting_entity,
            &self.customer_mapping.canonical_ids(),
        )
    }

    pub fn price_palette(&self) -> ColorPalette {
        if self.price_colors.is_empty() {
            ColorPalette::price_lines()
        } else {
            ColorPalette::from_colors(self.price_colors.clone())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductLines {
    #[serde(rename = "MDI")]
    pub mdi: ProductLine,
    #[serde(rename = "TDI")]
    pub tdi: ProductLine,
}

impl Default for ProductLines {
    fn default() -> Self {
        ProductLines {
            mdi: ProductLine::mdi(),
            tdi: ProductLine::tdi(),
        }
    }
}

impl ProductLines {
    pub fn get(&self, material: Material) -> &ProductLine {
        match material {
            Material::Mdi => &self.mdi,
            Material::Tdi => &self.tdi,
        }
    }
}

/// Cleaned sales table and business plan of one product line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPaths {
    pub sales: PathBuf,
    pub business_plan: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    #[serde(rename = "MDI")]
    pub mdi: DataPaths,
    #[serde(rename = "TDI")]
    pub tdi: DataPaths,
}

impl Default for Paths {
    fn default() -> Self {
        Paths {
            mdi: DataPaths {
                sales: PathBuf::from("data/MDI_final.csv"),
                business_plan: PathBuf::from("data/MDI_BP_23_26.csv"),
            },
            tdi: DataPaths {
                sales: PathBuf::from("data/TDI_final.csv"),
                business_plan: PathBuf::from("data/TDI_BP_23_27.csv"),
            },
        }
    }
}

impl Paths {
    pub fn get(&self, material: Material) -> &DataPaths {
        match material {
            Material::Mdi => &self.mdi,
            Material::Tdi => &self.tdi,
        }
    }
}

/// Dashboard configuration, passed explicitly into every pipeline call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub paths: Paths,
    pub product_lines: ProductLines,
    pub layout: StackedLayoutConfig,
    pub price: PriceOverlayConfig,
    pub range: RangeLayoutConfig,
    pub charts: Charts,
}

impl DashboardConfig {
    pub fn from_toml_str(source: &str) -> ChartResult<Self> {
        let config: DashboardConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> ChartResult<Self> {
        let source = fs::read_to_string(path)?;
        let config = DashboardConfig::from_toml_str(&source)?;
        info!(path = %path.display(), "loaded dashboard config");
        Ok(config)
    }

    /// Built-in defaults when `path` is absent or does not exist.
    pub fn load_or_default(path: Option<&Path>) -> ChartResult<Self> {
        match path {
            Some(p) if p.exists() => DashboardConfig::load(p),
            Some(p) => {
                info!(path = %p.display(), "config file not found, using built-in defaults");
                Ok(DashboardConfig::default())
            }
            None => {
                info!("no config file given, using built-in defaults");
                Ok(DashboardConfig::default())
            }
        }
    }

    pub fn validate(&self) -> ChartResult<()> {
        self.layout.validate()?;
        self.price.validate()?;
        self.range.validate()?;
        for line in [&self.product_lines.mdi, &self.product_lines.tdi] {
            line.competitor_list()?;
            for color in &line.price_colors {
                parse_color(color)?;
            }
        }
        for defaults in [&self.charts.customer_demand, &self.charts.price_volume, &self.charts.business_plan] {
            defaults.fonts.validate()?;
            if defaults.demand_axis_factor.is_some_and(|f| f <= 0.0) {
                return Err(ChartError::InvalidConfig("demand_axis_factor must be positive".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = DashboardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.product_lines.mdi.suppliers(SupplierScope::All),
            vec!["covestro", "tosoh", "wanhua", "kmc", "basf", "sabic", "huntsman"]
        );
        assert_eq!(config.product_lines.tdi.suppliers(SupplierScope::ReportingEntity), vec!["covestro"]);
        assert_eq!(config.paths.get(Material::Tdi).business_plan, PathBuf::from("data/TDI_BP_23_27.csv"));
    }

    #[test]
    fn test_tdi_mapping_is_many_to_one() {
        let tdi = ProductLine::tdi();
        assert_eq!(tdi.customer_mapping.canonical("Chiao Fu Enterprises Co., Ltd"), Some("CHIAO FU"));
        assert_eq!(tdi.customer_mapping.canonical("Chiao Fu Enterprise Co.Ltd"), Some("CHIAO FU"));
        assert_eq!(tdi.customer_mapping.canonical_ids().len(), 8);
        assert_eq!(tdi.date_parser, DateParser::month_year());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = DashboardConfig::from_toml_str(
            r#"
            [layout]
            label_threshold = 0.1

            [price]
            annotation_spacing = 30.0

            [product_lines.TDI]
            competitors = ["mcns", "wanhua"]
            date_parser = { format = "DD.MM.YYYY", on_malformed = "reject" }

            [charts.business_plan]
            value_labels = "percentages"
            "#,
        )
        .unwrap();

        assert_eq!(config.layout.label_threshold, 0.1);
        assert_eq!(config.layout.contrast_threshold, 0.15);
        assert_eq!(config.price.annotation_spacing, 30.0);
        assert_eq!(config.price.annotation_base_offset, 25.0);
        assert_eq!(config.product_lines.tdi.competitors, vec!["mcns", "wanhua"]);
        assert_eq!(config.product_lines.tdi.date_parser, DateParser::day_month_year());
        assert_eq!(config.product_lines.tdi.reporting_entity, "covestro");
        assert_eq!(config.product_lines.mdi, ProductLine::mdi());
        assert_eq!(config.charts.business_plan.value_labels, ValueLabels::Percentages);
    }

    #[test]
    fn test_reporting_entity_in_competitors_is_rejected() {
        let result = DashboardConfig::from_toml_str(
            r#"
            [product_lines.MDI]
            competitors = ["covestro", "basf"]
            "#,
        );
        assert!(matches!(result, Err(ChartError::InvalidConfig(_))));
    }

    #[test]
    fn test_customer_overlap_is_rejected() {
        let result = DashboardConfig::from_toml_str(
            r#"
            [product_lines.TDI]
            competitors = ["basf", "TAYFULL"]

            [product_lines.TDI.customer_mapping]
            "Tayfull Industrial Co.Ltd" = "TAYFULL"
            "#,
        );
        assert!(matches!(result, Err(ChartError::InvalidConfig(_))));
    }

    #[test]
    fn test_unknown_price_color_is_rejected() {
        let result = DashboardConfig::from_toml_str(
            r#"
            [product_lines.MDI]
            competitors = ["basf"]
            price_colors = ["red", "ultraviolet"]
            "#,
        );
        assert!(matches!(result, Err(ChartError::InvalidConfig(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = DashboardConfig::from_toml_str("[layout\nbar_width = ");
        assert!(matches!(result, Err(ChartError::Toml(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[range]\nlabel_floor = 10.0").unwrap();
        let config = DashboardConfig::load(file.path()).unwrap();
        assert_eq!(config.range.label_floor, 10.0);
        assert_eq!(config.range.headroom, 1.15);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = DashboardConfig::load_or_default(Some(Path::new("does/not/exist.toml"))).unwrap();
        assert_eq!(config, DashboardConfig::default());
    }
}
