//! olist — the pipeline CLI
//!
//! # Usage
//!
//! ```bash
//! # Full run: extract, load, transform, render
//! olist run
//!
//! # Load the store without transforming
//! olist load --dataset-dir ./dataset
//!
//! # Execute one catalog entry and print it
//! olist show revenue_per_state --format json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use olist_elt::prelude::*;
use olist_elt::transform;

use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "olist")]
#[command(version)]
#[command(about = "ELT pipeline for the Olist e-commerce dataset", long_about = None)]
#[command(after_help = "EXAMPLES:
    olist run
    olist transform --reload
    olist show get_freight_value_weight_relationship --format json")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite connection URL
    #[arg(long, env = "OLIST_DATABASE_URL")]
    database_url: Option<String>,

    /// Directory holding the source CSV files
    #[arg(long)]
    dataset_dir: Option<PathBuf>,

    /// Directory holding the catalog's .sql files
    #[arg(long)]
    queries_dir: Option<PathBuf>,

    /// Directory chart documents are written to
    #[arg(long)]
    charts_dir: Option<PathBuf>,

    /// Holiday feed / report year
    #[arg(long)]
    year: Option<i32>,

    /// Output format for `show`
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline (default)
    Run,
    /// Extract only: read the CSVs and the holiday feed
    Extract,
    /// Extract and load the store
    Load,
    /// Run the query catalog against the store
    Transform {
        /// Extract and load before transforming
        #[arg(long)]
        reload: bool,
    },
    /// Run the catalog and write chart documents
    Render {
        /// Extract and load before transforming
        #[arg(long)]
        reload: bool,
    },
    /// Execute one catalog entry and print its result
    Show {
        /// Catalog entry name, e.g. revenue_per_state
        query: String,
    },
    /// List the catalog entries
    Queries,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = dispatch(&cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn dispatch(cli: &Cli) -> anyhow::Result<()> {
    let config = build_config(cli)?;
    if cli.verbose {
        println!("{} {}", "Database:".dimmed(), config.database_url.yellow());
        println!("{} {}", "Dataset:".dimmed(), config.dataset_dir.display());
    }
    let pipeline = Pipeline::new(config);

    match &cli.command {
        None | Some(Commands::Run) => run_full(&pipeline).await,
        Some(Commands::Extract) => run_extract(&pipeline).await,
        Some(Commands::Load) => run_load(&pipeline).await,
        Some(Commands::Transform { reload }) => run_transform(&pipeline, *reload).await,
        Some(Commands::Render { reload }) => run_render(&pipeline, *reload).await,
        Some(Commands::Show { query }) => show_query(&pipeline, query, &cli.format).await,
        Some(Commands::Queries) => {
            list_queries();
            Ok(())
        }
    }
}

fn build_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::load_default()?,
    };
    if let Some(url) = &cli.database_url {
        config.database_url = url.clone();
    }
    if let Some(dir) = &cli.dataset_dir {
        config.dataset_dir = dir.clone();
    }
    if let Some(dir) = &cli.queries_dir {
        config.queries_dir = dir.clone();
    }
    if let Some(dir) = &cli.charts_dir {
        config.charts_dir = dir.clone();
    }
    if let Some(year) = cli.year {
        config.holiday_year = year;
    }
    Ok(config)
}

async fn run_full(pipeline: &Pipeline) -> anyhow::Result<()> {
    let summary = pipeline.run().await?;
    println!();
    println!(
        "{} {} tables loaded, {} queries, {} charts",
        "✓".green().bold(),
        summary.tables_loaded,
        summary.queries_ok,
        summary.charts_written
    );
    let failures = summary.tables_failed + summary.queries_failed + summary.charts_failed;
    if failures > 0 {
        println!("{} {} failures, see log above", "!".yellow(), failures);
    }
    Ok(())
}

async fn run_extract(pipeline: &Pipeline) -> anyhow::Result<()> {
    let dataset = pipeline.run_extract().await;
    for (table, frame) in &dataset {
        println!(
            "  {} {} rows, {} columns",
            table.white(),
            frame.len(),
            frame.columns().len()
        );
    }
    Ok(())
}

async fn run_load(pipeline: &Pipeline) -> anyhow::Result<()> {
    let store = pipeline.connect().await?;
    let dataset = pipeline.run_extract().await;
    pipeline.run_load(&dataset, &store).await?;
    Ok(())
}

async fn run_transform(pipeline: &Pipeline, reload: bool) -> anyhow::Result<()> {
    let store = pipeline.connect().await?;
    if reload {
        let dataset = pipeline.run_extract().await;
        pipeline.run_load(&dataset, &store).await?;
    }
    pipeline.run_transform(&store).await?;
    Ok(())
}

async fn run_render(pipeline: &Pipeline, reload: bool) -> anyhow::Result<()> {
    let store = pipeline.connect().await?;
    if reload {
        let dataset = pipeline.run_extract().await;
        pipeline.run_load(&dataset, &store).await?;
    }
    let report = pipeline.run_transform(&store).await?;
    pipeline.run_render(&report).await?;
    Ok(())
}

async fn show_query(pipeline: &Pipeline, query: &str, format: &OutputFormat) -> anyhow::Result<()> {
    let name: QueryName = query.parse()?;
    let store = pipeline.connect().await?;
    let frame = transform::run_query(&store, pipeline.config(), name).await?;
    format_output(&frame, format);
    Ok(())
}

fn format_output(frame: &Frame, format: &OutputFormat) {
    if frame.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&frame.to_json_rows()).unwrap_or_default()
            );
        }
        OutputFormat::Table => {
            let columns = frame.columns();

            // Calculate column widths
            let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
            for row in frame.rows() {
                for (i, cell) in row.iter().enumerate() {
                    widths[i] = widths[i].max(val_to_string(&cell.to_json()).len());
                }
            }

            // Print header
            let header: Vec<String> = columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:width$}", c, width = *w))
                .collect();
            println!("{}", header.join(" │ ").white().bold());

            // Print separator
            let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            println!("{}", sep.join("─┼─").dimmed());

            // Print rows
            for row in frame.rows() {
                let cells: Vec<String> = row
                    .iter()
                    .zip(&widths)
                    .map(|(cell, w)| {
                        format!("{:width$}", val_to_string(&cell.to_json()), width = *w)
                    })
                    .collect();
                println!("{}", cells.join(" │ "));
            }

            println!();
            println!("{} row(s) returned", frame.len().to_string().cyan());
        }
    }
}

fn val_to_string(val: &serde_json::Value) -> String {
    match val {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => val.to_string(),
    }
}

fn list_queries() {
    println!("{}", "Catalog entries".cyan().bold());
    println!();
    println!(
        "{:38} {}",
        "Name".white().bold(),
        "Execution".white().bold()
    );
    println!("{}", "─".repeat(50).dimmed());
    for name in QueryName::ALL {
        let kind = match name.kind() {
            transform::QueryKind::Sql => "SQL file".to_string(),
            transform::QueryKind::Computed => "computed".to_string(),
        };
        println!("{:38} {}", name.as_str().cyan(), kind.dimmed());
    }
}
