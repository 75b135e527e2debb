// Chart requests -> prepared series -> layout -> scene -> SVG

use crate::compiler::{compile_range, compile_stacked, ChartText};
use crate::config::{ChartDefaults, DashboardConfig, FontSizes, Material, ProductLine};
use crate::csv_reader::{self, CsvData};
use crate::error::ChartResult;
use crate::graph;
use crate::ir::ChartScene;
use crate::layout::{layout_price, layout_range, layout_stacked, PriceOverlayConfig, StackOptions, ValueLabels};
use crate::palette::legend_label;
use crate::prepare::{prepare_series, BusinessPlanTable, PreparedSeries, SeriesRequest};
use crate::scale::AxisRange;
use crate::transform::{aggregate_transactions, synthesize_demand, AggregatedTable};
use crate::validate::distinct_values;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    /// Supplier stacks with demand outlines.
    CustomerDemand,
    /// Own volume with price lines on a secondary axis.
    PriceVolume,
    /// Min/base/max business plan bands.
    BusinessPlan,
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChartKind::CustomerDemand => "customer-demand",
            ChartKind::PriceVolume => "price-volume",
            ChartKind::BusinessPlan => "business-plan",
        };
        f.write_str(name)
    }
}

/// One render request. Unset fields fall back to the chart kind's configured defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub material: Material,
    pub customer: String,
    pub y_limits: Option<(f64, f64)>,
    pub price_limits: Option<(f64, f64)>,
    pub value_labels: Option<ValueLabels>,
    pub fonts: Option<FontSizes>,
    pub annotation_spacing: Option<f64>,
}

impl ChartSpec {
    pub fn new(kind: ChartKind, material: Material, customer: &str) -> Self {
        ChartSpec {
            kind,
            material,
            customer: customer.to_string(),
            y_limits: None,
            price_limits: None,
            value_labels: None,
            fonts: None,
            annotation_spacing: None,
        }
    }

    pub fn with_y_limits(mut self, min: f64, max: f64) -> Self {
        self.y_limits = Some((min, max));
        self
    }

    pub fn with_price_limits(mut self, min: f64, max: f64) -> Self {
        self.price_limits = Some((min, max));
        self
    }

    pub fn with_value_labels(mut self, labels: ValueLabels) -> Self {
        self.value_labels = Some(labels);
        self
    }

    pub fn with_fonts(mut self, fonts: FontSizes) -> Self {
        self.fonts = Some(fonts);
        self
    }
}

/// Result of a chart request for a customer that exists.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartOutcome<T> {
    Rendered(T),
    /// The customer exists but has nothing to plot.
    Empty { customer: String },
}

impl<T> ChartOutcome<T> {
    pub fn rendered(self) -> Option<T> {
        match self {
            ChartOutcome::Rendered(chart) => Some(chart),
            ChartOutcome::Empty { .. } => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ChartOutcome::Empty { .. })
    }
}

/// Scalars shown next to a chart.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChartSummary {
    pub max_demand: Option<f64>,
    pub max_price: Option<f64>,
}

impl fmt::Display for ChartSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v));
        write!(f, "max demand: {}, max price: {}", show(self.max_demand), show(self.max_price))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedChart {
    pub scene: ChartScene,
    pub svg: String,
    pub summary: ChartSummary,
}

/// Everything a renderer needs besides the table.
struct RenderContext<'a> {
    config: &'a DashboardConfig,
    spec: &'a ChartSpec,
    line: &'a ProductLine,
    defaults: &'a ChartDefaults,
}

impl RenderContext<'_> {
    /// Request fonts win over the preset; both must be positive.
    fn fonts(&self) -> ChartResult<FontSizes> {
        let fonts = self.spec.fonts.clone().unwrap_or_else(|| self.defaults.fonts.clone());
        fonts.validate()?;
        Ok(fonts)
    }

    fn value_labels(&self) -> ValueLabels {
        self.spec.value_labels.unwrap_or(self.defaults.value_labels)
    }

    fn x_label(&self) -> String {
        legend_label(&self.line.year_column)
    }
}

/// Trait for the per-kind rendering strategies
trait Renderer {
    fn render(&self, ctx: &RenderContext, data: &CsvData) -> ChartResult<ChartOutcome<RenderedChart>>;
}

struct DemandRenderer;
impl Renderer for DemandRenderer {
    fn render(&self, ctx: &RenderContext, data: &CsvData) -> ChartResult<ChartOutcome<RenderedChart>> {
        let title = format!("Demand Analysis for {} total demand (mt)", ctx.spec.customer);
        render_stacked(ctx, data, title)
    }
}

struct PriceVolumeRenderer;
impl Renderer for PriceVolumeRenderer {
    fn render(&self, ctx: &RenderContext, data: &CsvData) -> ChartResult<ChartOutcome<RenderedChart>> {
        let title = format!("COV sale volumes & Pocket price to {}", ctx.spec.customer);
        render_stacked(ctx, data, title)
    }
}

struct BusinessPlanRenderer;
impl Renderer for BusinessPlanRenderer {
    fn render(&self, ctx: &RenderContext, data: &CsvData) -> ChartResult<ChartOutcome<RenderedChart>> {
        let fonts = ctx.fonts()?;
        let table = BusinessPlanTable::from_csv(data, &ctx.line.customer_column, &ctx.line.year_column)?;
        let records = table.for_customer(&ctx.spec.customer)?;

        let Some(mut layout) = layout_range(&records, &ctx.config.range, ctx.value_labels()) else {
            info!(customer = %ctx.spec.customer, "business plan has no volume");
            return Ok(empty(ctx));
        };
        if let Some((min, max)) = ctx.spec.y_limits {
            layout.y_axis = AxisRange::new(min, max)?;
        }

        let years = match (layout.years.first(), layout.years.last()) {
            (Some(first), Some(last)) => format!("{}-{}", first, last),
            _ => String::new(),
        };
        let text = ChartText {
            title: format!("Business plan {} of {}", years, ctx.spec.customer),
            x_label: ctx.x_label(),
            y_label: "Value".to_string(),
            secondary_label: None,
        };
        let summary = ChartSummary {
            max_demand: layout.totals.iter().copied().reduce(f64::max),
            max_price: None,
        };

        let scene = compile_range(&layout, text, &fonts);
        finish(scene, summary)
    }
}

fn empty(ctx: &RenderContext) -> ChartOutcome<RenderedChart> {
    ChartOutcome::Empty {
        customer: ctx.spec.customer.clone(),
    }
}

fn finish(scene: ChartScene, summary: ChartSummary) -> ChartResult<ChartOutcome<RenderedChart>> {
    let svg = graph::render_svg(&scene)?;
    debug!(commands = scene.commands.len(), bytes = svg.len(), "rendered chart");
    Ok(ChartOutcome::Rendered(RenderedChart { scene, svg, summary }))
}

/// `(min, factor * max)` when the data gives a usable maximum.
fn derived_limits(min: f64, factor: f64, max: Option<f64>) -> Option<(f64, f64)> {
    let upper = factor * max.filter(|m| *m > 0.0)?;
    (upper > min).then_some((min, upper))
}

fn summarize(series: &PreparedSeries, line: &ProductLine) -> ChartSummary {
    ChartSummary {
        max_demand: series.max_demand(),
        max_price: line.price_columns.first().and_then(|c| series.max_price(c)),
    }
}

fn render_stacked(ctx: &RenderContext, data: &CsvData, title: String) -> ChartResult<ChartOutcome<RenderedChart>> {
    let fonts = ctx.fonts()?;
    let request = SeriesRequest::new(
        &ctx.spec.customer,
        &ctx.line.customer_column,
        ctx.line.suppliers(ctx.defaults.suppliers),
    )
    .with_year_column(&ctx.line.year_column)
    .with_price_columns(ctx.line.price_columns.clone());
    let series = prepare_series(data, &request)?;

    if !series.has_values() {
        info!(customer = %ctx.spec.customer, "no volume, demand or price values");
        return Ok(empty(ctx));
    }
    let summary = summarize(&series, ctx.line);

    let y_limits = ctx.spec.y_limits.or_else(|| {
        ctx.defaults
            .demand_axis_factor
            .and_then(|factor| derived_limits(0.0, factor, summary.max_demand))
    });
    let options = StackOptions {
        value_labels: ctx.value_labels(),
        total_labels: ctx.defaults.total_labels,
        outline_labels: ctx.defaults.outline_labels,
        y_limits,
    };
    let layout = layout_stacked(&series, &ctx.config.layout, &options)?;

    let price = if ctx.defaults.show_prices {
        let price_limits = ctx.spec.price_limits.or_else(|| {
            ctx.defaults
                .price_axis
                .and_then(|policy| derived_limits(policy.min, policy.factor, summary.max_price))
        });
        let mut overlay: PriceOverlayConfig = ctx.config.price.clone();
        if let Some(spacing) = ctx.spec.annotation_spacing.or(ctx.defaults.annotation_spacing) {
            overlay.annotation_spacing = spacing;
        }
        overlay.validate()?;
        layout_price(&series, &ctx.line.price_palette(), &overlay, price_limits)?
    } else {
        None
    };

    let text = ChartText {
        title,
        x_label: ctx.x_label(),
        y_label: "Demand".to_string(),
        secondary_label: Some("Price".to_string()),
    };
    let scene = compile_stacked(&layout, price.as_ref(), text, &fonts);
    finish(scene, summary)
}

/// Entry point for the UI layer.
#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    config: DashboardConfig,
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> Self {
        Dashboard { config }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Table a chart kind reads: the business plan for `BusinessPlan`, the sales table otherwise.
    pub fn load_table(&self, kind: ChartKind, material: Material) -> ChartResult<CsvData> {
        let paths = self.config.paths.get(material);
        let path = match kind {
            ChartKind::BusinessPlan => &paths.business_plan,
            ChartKind::CustomerDemand | ChartKind::PriceVolume => &paths.sales,
        };
        let data = csv_reader::read_csv_file(path)?;
        info!(path = %path.display(), rows = data.len(), "loaded table");
        Ok(data)
    }

    /// Sorted distinct customer ids of a table, for the customer picker.
    pub fn customers(&self, material: Material, data: &CsvData) -> ChartResult<Vec<String>> {
        distinct_values(data, &self.config.product_lines.get(material).customer_column)
    }

    /// Raw transactions -> aggregated table with synthesized demand, in export column order.
    pub fn aggregate(&self, material: Material, raw: &CsvData) -> ChartResult<CsvData> {
        let line = self.config.product_lines.get(material);
        let competitors = line.competitor_list()?;
        let records = aggregate_transactions(raw, &line.raw_columns, line.date_parser, &line.customer_mapping)?;
        let records = synthesize_demand(records, &competitors);
        let price_column = line.price_columns.first().map_or("pocket price", String::as_str);
        Ok(AggregatedTable::new(records, &line.customer_column, price_column).to_csv_data())
    }

    pub fn render(&self, spec: &ChartSpec, data: &CsvData) -> ChartResult<ChartOutcome<RenderedChart>> {
        let renderer: Box<dyn Renderer> = match spec.kind {
            ChartKind::CustomerDemand => Box::new(DemandRenderer),
            ChartKind::PriceVolume => Box::new(PriceVolumeRenderer),
            ChartKind::BusinessPlan => Box::new(BusinessPlanRenderer),
        };
        let ctx = RenderContext {
            config: &self.config,
            spec,
            line: self.config.product_lines.get(spec.material),
            defaults: self.config.charts.get(spec.kind),
        };
        debug!(kind = %spec.kind, material = %spec.material, customer = %spec.customer, "rendering chart");
        renderer.render(&ctx, data)
    }

    /// Load the kind's configured table and render.
    pub fn render_from_files(&self, spec: &ChartSpec) -> ChartResult<ChartOutcome<RenderedChart>> {
        let data = self.load_table(spec.kind, spec.material)?;
        self.render(spec, &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_reader::read_csv_bytes;
    use crate::error::ChartError;
    use approx::assert_relative_eq;

    const SALES: &str = "\
year,customer,pocket price,apac_pp,demand,covestro,mcns,wanhua,basf,hanwha,sabic,other
2022,ACME,10.5,11.2,300,150,50,100,0,0,0,0
2023,ACME,11.0,,250,100,50,0,100,0,0,0
2023,BETA,9.0,9.5,120,60,0,30,30,0,0,0
2023,GHOST,,,0,0,0,0,0,0,0,0
";

    const PLAN: &str = "\
year,customer,min,base,max
2023,ACME,10,600,5
2024,ACME,20,650,40
2023,ZERO,0,0,0
";

    fn dashboard() -> Dashboard {
        Dashboard::default()
    }

    fn sales() -> CsvData {
        read_csv_bytes(SALES.as_bytes()).unwrap()
    }

    #[test]
    fn test_customer_demand_chart() {
        let spec = ChartSpec::new(ChartKind::CustomerDemand, Material::Tdi, "ACME");
        let chart = dashboard().render(&spec, &sales()).unwrap().rendered().unwrap();

        assert_eq!(chart.scene.title, "Demand Analysis for ACME total demand (mt)");
        assert_eq!(chart.scene.categories, vec!["2022", "2023"]);
        assert_eq!(chart.scene.x_label, "Year");
        assert!(chart.scene.secondary_axis.is_none());
        // demand axis (0, 1.4 * max demand)
        assert_relative_eq!(chart.scene.y_axis.max, 300.0 * 1.4);
        assert!(chart.scene.texts().any(|t| t == "50.0%"));
        assert_eq!(chart.summary.max_demand, Some(300.0));
        assert_eq!(chart.summary.max_price, Some(11.0));
        assert!(chart.svg.contains("Demand Analysis for ACME"));
    }

    #[test]
    fn test_price_volume_chart() {
        let spec = ChartSpec::new(ChartKind::PriceVolume, Material::Tdi, "ACME");
        let chart = dashboard().render(&spec, &sales()).unwrap().rendered().unwrap();

        assert_eq!(chart.scene.title, "COV sale volumes & Pocket price to ACME");
        assert_eq!(chart.scene.secondary_label.as_deref(), Some("Price"));
        let price_axis = chart.scene.secondary_axis.unwrap();
        assert_relative_eq!(price_axis.min, 0.5);
        assert_relative_eq!(price_axis.max, 11.0 * 1.5);
        assert_relative_eq!(chart.scene.y_axis.max, 600.0);
        assert!(chart.scene.texts().any(|t| t == "10.50"));
        let legend: Vec<&str> = chart.scene.legend.entries.iter().map(|e| e.label.as_str()).collect();
        assert!(legend.contains(&"Covestro"));
        assert!(legend.contains(&"Pocket Price"));
        assert!(legend.contains(&"Apac Pp"));
    }

    #[test]
    fn test_request_overrides_win() {
        let mut spec = ChartSpec::new(ChartKind::PriceVolume, Material::Tdi, "ACME")
            .with_y_limits(0.0, 1000.0)
            .with_price_limits(5.0, 15.0)
            .with_value_labels(ValueLabels::Percentages);
        spec.annotation_spacing = Some(30.0);
        let chart = dashboard().render(&spec, &sales()).unwrap().rendered().unwrap();
        assert_eq!(chart.scene.y_axis.max, 1000.0);
        assert_eq!(chart.scene.secondary_axis.unwrap().min, 5.0);
        assert!(chart.scene.texts().any(|t| t.ends_with('%')));
    }

    #[test]
    fn test_request_fonts_are_validated() {
        let large = FontSizes {
            title: 24.0,
            ..FontSizes::default()
        };
        let spec = ChartSpec::new(ChartKind::CustomerDemand, Material::Tdi, "ACME").with_fonts(large);
        let chart = dashboard().render(&spec, &sales()).unwrap().rendered().unwrap();
        assert_eq!(chart.scene.fonts.title, 24.0);

        let plan = read_csv_bytes(PLAN.as_bytes()).unwrap();
        let sales = sales();
        let zero_title = FontSizes {
            title: 0.0,
            ..FontSizes::default()
        };
        for kind in [ChartKind::CustomerDemand, ChartKind::PriceVolume, ChartKind::BusinessPlan] {
            let data = if kind == ChartKind::BusinessPlan { &plan } else { &sales };
            let spec = ChartSpec::new(kind, Material::Tdi, "ACME").with_fonts(zero_title.clone());
            let result = dashboard().render(&spec, data);
            assert!(matches!(result, Err(ChartError::InvalidConfig(_))), "{} accepted a zero font", kind);
        }
    }

    #[test]
    fn test_unknown_customer_fails_on_every_path() {
        let plan = read_csv_bytes(PLAN.as_bytes()).unwrap();
        let sales = sales();
        for kind in [ChartKind::CustomerDemand, ChartKind::PriceVolume, ChartKind::BusinessPlan] {
            let data = if kind == ChartKind::BusinessPlan { &plan } else { &sales };
            let result = dashboard().render(&ChartSpec::new(kind, Material::Tdi, "NOBODY"), data);
            assert!(
                matches!(result, Err(ChartError::CustomerNotFound { .. })),
                "{} should reject unknown customers",
                kind
            );
        }
    }

    #[test]
    fn test_known_customer_without_values_is_empty() {
        let outcome = dashboard()
            .render(&ChartSpec::new(ChartKind::CustomerDemand, Material::Tdi, "GHOST"), &sales())
            .unwrap();
        assert_eq!(
            outcome,
            ChartOutcome::Empty {
                customer: "GHOST".to_string()
            }
        );

        let plan = read_csv_bytes(PLAN.as_bytes()).unwrap();
        let outcome = dashboard()
            .render(&ChartSpec::new(ChartKind::BusinessPlan, Material::Tdi, "ZERO"), &plan)
            .unwrap();
        assert!(outcome.is_empty());
    }

    #[test]
    fn test_business_plan_chart() {
        let plan = read_csv_bytes(PLAN.as_bytes()).unwrap();
        let spec = ChartSpec::new(ChartKind::BusinessPlan, Material::Tdi, "ACME");
        let chart = dashboard().render(&spec, &plan).unwrap().rendered().unwrap();

        assert_eq!(chart.scene.title, "Business plan 2023-2024 of ACME");
        assert_eq!(chart.scene.y_label, "Value");
        assert_eq!((chart.scene.width, chart.scene.height), (1500, 900));
        assert!(chart.scene.legend.title.is_none());
        assert_eq!(chart.summary.max_demand, Some(710.0));
    }

    #[test]
    fn test_customers_are_sorted() {
        let customers = dashboard().customers(Material::Tdi, &sales()).unwrap();
        assert_eq!(customers, vec!["ACME", "BETA", "GHOST"]);
    }

    #[test]
    fn test_derived_limits() {
        assert_eq!(derived_limits(0.0, 2.0, Some(150.0)), Some((0.0, 300.0)));
        assert_eq!(derived_limits(0.5, 1.5, Some(0.0)), None);
        assert_eq!(derived_limits(0.5, 1.5, Some(0.2)), None);
        assert_eq!(derived_limits(0.0, 1.4, None), None);
    }
}
