use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use polyboard::config::{DashboardConfig, Material};
use polyboard::csv_reader::{self, CsvData};
use polyboard::layout::ValueLabels;
use polyboard::runtime::{ChartKind, ChartOutcome, ChartSpec, Dashboard};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "polyboard")]
#[command(about = "Customer demand, price and business plan charts from MDI/TDI sales tables", long_about = None)]
struct Args {
    #[arg(short, long, global = true, help = "Dashboard config (TOML); built-in defaults when absent")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a chart as SVG
    Chart {
        #[arg(value_enum)]
        kind: ChartKind,

        #[arg(short, long, value_enum)]
        material: Material,

        #[arg(short = 'u', long)]
        customer: String,

        #[arg(short, long, help = "Input table (defaults to the configured path for the chart kind)")]
        input: Option<PathBuf>,

        #[arg(short, long, help = "Write SVG here instead of stdout")]
        output: Option<PathBuf>,

        #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
        y_limits: Option<Vec<f64>>,

        #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
        price_limits: Option<Vec<f64>>,

        #[arg(long, value_enum)]
        value_labels: Option<ValueLabels>,

        #[arg(long, help = "Vertical spacing between stacked price labels, in points")]
        annotation_spacing: Option<f64>,
    },
    /// List the customers of a table
    Customers {
        #[arg(short, long, value_enum)]
        material: Material,

        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "customer-demand")]
        kind: ChartKind,
    },
    /// Aggregate raw transactions (stdin or --input) into the cleaned sales table
    Aggregate {
        #[arg(short, long, value_enum)]
        material: Material,

        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn limits(values: Option<Vec<f64>>) -> Option<(f64, f64)> {
    match values.as_deref() {
        Some([min, max]) => Some((*min, *max)),
        _ => None,
    }
}

fn read_table(path: &Path) -> Result<CsvData> {
    csv_reader::read_csv_file(path).with_context(|| format!("Failed to read CSV from {}", path.display()))
}

fn write_output(output: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match output {
        Some(path) => fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(bytes).context("Failed to write to stdout")?;
            handle.flush().context("Failed to flush stdout")
        }
    }
}

fn load_table(dashboard: &Dashboard, kind: ChartKind, material: Material, input: Option<&Path>) -> Result<CsvData> {
    match input {
        Some(path) => read_table(path),
        None => dashboard
            .load_table(kind, material)
            .with_context(|| format!("Failed to load the configured {} table for {}", material, kind)),
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = DashboardConfig::load_or_default(args.config.as_deref()).context("Failed to load dashboard config")?;
    let dashboard = Dashboard::new(config);

    match args.command {
        Command::Chart {
            kind,
            material,
            customer,
            input,
            output,
            y_limits,
            price_limits,
            value_labels,
            annotation_spacing,
        } => {
            let data = load_table(&dashboard, kind, material, input.as_deref())?;
            let spec = ChartSpec {
                y_limits: limits(y_limits),
                price_limits: limits(price_limits),
                value_labels,
                annotation_spacing,
                ..ChartSpec::new(kind, material, &customer)
            };

            match dashboard.render(&spec, &data).context("Failed to render chart")? {
                ChartOutcome::Rendered(chart) => {
                    info!(customer = %customer, "{}", chart.summary);
                    write_output(output.as_deref(), chart.svg.as_bytes())?;
                }
                ChartOutcome::Empty { customer } => {
                    warn!(customer = %customer, "nothing to plot");
                }
            }
        }
        Command::Customers { material, input, kind } => {
            let data = load_table(&dashboard, kind, material, input.as_deref())?;
            let customers = dashboard.customers(material, &data).context("Failed to list customers")?;
            let mut listing = customers.join("\n");
            listing.push('\n');
            write_output(None, listing.as_bytes())?;
        }
        Command::Aggregate { material, input, output } => {
            let raw = match input.as_deref() {
                Some(path) => read_table(path)?,
                None => csv_reader::read_csv_from_stdin().context("Failed to read CSV from stdin")?,
            };
            let table = dashboard.aggregate(material, &raw).context("Failed to aggregate transactions")?;

            let mut buffer = Vec::new();
            table.write_csv(&mut buffer).context("Failed to encode aggregated table")?;
            write_output(output.as_deref(), &buffer)?;
        }
    }

    Ok(())
}
