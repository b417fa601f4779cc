//! # NGO Report CLI (`ngo-report`)
//!
//! ## Usage
//!
//! ```bash
//! ngo-report --config ./config/ngo-report.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ngo-report report` | Generate a report for a country and date range |
//! | `ngo-report corpus` | Fetch sources and print the corpus or its passages |
//! | `ngo-report sources` | List sources and whether their credentials are set |
//! | `ngo-report countries` | List supported countries |
//! | `ngo-report serve` | Start the HTTP API |
//!
//! Logs go to stderr (`RUST_LOG`, default `info`); reports go to stdout
//! unless `--output` is given.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use ngo_report::config::{self, Config};
use ngo_report::country::COUNTRIES;
use ngo_report::export::{self, Format};
use ngo_report::models::{DateRange, ReportDocument};
use ngo_report::{server, sources, ReportPipeline};

const DEFAULT_CONFIG: &str = "./config/ngo-report.toml";

/// Retrieval-augmented humanitarian situation reports.
#[derive(Parser)]
#[command(
    name = "ngo-report",
    about = "Generate cited humanitarian situation reports from public data sources",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/ngo-report.toml`; built-in defaults are used
    /// when that file does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Country and date window shared by `report` and `corpus`.
#[derive(clap::Args)]
struct RequestArgs {
    /// Country name or ISO code (e.g. `Kenya`, `KE`, `KEN`).
    #[arg(long)]
    country: String,

    /// First day of the window (YYYY-MM-DD).
    #[arg(long)]
    start: NaiveDate,

    /// Last day of the window, inclusive (YYYY-MM-DD).
    #[arg(long)]
    end: NaiveDate,
}

impl RequestArgs {
    fn range(&self) -> DateRange {
        DateRange::new(self.start, self.end)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a report.
    ///
    /// Fetches every enabled source, retrieves the most relevant passages,
    /// and asks the configured model for a cited report.
    Report {
        #[command(flatten)]
        request: RequestArgs,

        #[arg(long, value_enum, default_value = "markdown")]
        format: Format,

        /// Write the report to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Fetch sources and print the merged corpus without generating.
    Corpus {
        #[command(flatten)]
        request: RequestArgs,

        /// Print the chunked passages instead of the raw corpus.
        #[arg(long)]
        passages: bool,
    },

    /// List sources and their credential status.
    Sources,

    /// List supported countries.
    Countries,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

fn load(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => config::load_config(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG);
            if default.exists() {
                config::load_config(default)
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_report(
    cfg: &Config,
    request: &RequestArgs,
    format: Format,
    output: Option<&Path>,
) -> Result<()> {
    let pipeline = ReportPipeline::from_config(cfg)?;
    let req = pipeline.resolve(&request.country, request.range())?;
    let report = pipeline
        .generate_report(req.country.name, request.range())
        .await?;

    let doc = ReportDocument::new(req.country.name, request.range(), report);
    let rendered = export::render(&doc, format)?;
    match output {
        Some(path) => {
            export::write_output(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Report written to {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

async fn run_corpus(cfg: &Config, request: &RequestArgs, passages: bool) -> Result<()> {
    let pipeline = ReportPipeline::from_config(cfg)?;
    let req = pipeline.resolve(&request.country, request.range())?;
    let corpus = pipeline.corpus(&req).await;

    if !passages {
        println!("{}", corpus.text);
        return Ok(());
    }

    for passage in pipeline.passages(&corpus) {
        let labels: Vec<&str> = passage.provenance.iter().map(|p| p.label()).collect();
        println!(
            "--- passage {} [{}..{}] ({}) ---",
            passage.index,
            passage.start,
            passage.end,
            labels.join(", ")
        );
        println!("{}\n", passage.text);
    }
    Ok(())
}

fn list_countries() {
    for c in COUNTRIES {
        println!("{:<3} {:<4} {}", c.alpha2, c.alpha3, c.name);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    init_tracing();

    let cli = Cli::parse();

    if let Commands::Countries = cli.command {
        list_countries();
        return Ok(());
    }

    let cfg = load(cli.config.as_deref())?;

    match cli.command {
        Commands::Report {
            request,
            format,
            output,
        } => {
            run_report(&cfg, &request, format, output.as_deref()).await?;
        }
        Commands::Corpus { request, passages } => {
            run_corpus(&cfg, &request, passages).await?;
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Countries => {}
    }

    Ok(())
}
