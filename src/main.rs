mod error;
mod fetcher;
mod notify;
mod parser;
mod pipeline;
mod settings;
mod table;
#[cfg(test)]
mod testing;
mod writer;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use pipeline::Pipeline;
use settings::Settings;
use table::RatingTable;

#[derive(Parser)]
#[command(name = "hero_roles", about = "Dota 2 hero role ratings scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the roles page, parse it, and write a timestamped roles file
    Run {
        /// Directory for the roles file (default: default_output_directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Settings file (default: ./hero_roles.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Abort after this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },
    /// Parse a saved copy of the roles page and print the table
    Parse {
        file: PathBuf,
        /// Print JSON instead of a text table
        #[arg(long)]
        json: bool,
    },
    /// Print a previously written roles file
    Show {
        file: PathBuf,
        /// Print JSON instead of a text table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            output_dir,
            config,
            timeout,
        } => run(output_dir.as_deref(), config.as_deref(), timeout).await,
        Commands::Parse { file, json } => {
            let markup = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let table = parser::parse(&markup)?;
            print_table(&table, json)
        }
        Commands::Show { file, json } => {
            let table = writer::read_table(&file)?;
            print_table(&table, json)
        }
    }
}

async fn run(output_dir: Option<&Path>, config: Option<&Path>, timeout: Option<u64>) -> Result<()> {
    let t0 = Instant::now();
    let settings = Settings::load(config)?;
    let pipeline = Pipeline::from_settings(&settings)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        });
    }
    if let Some(secs) = timeout {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            warn!("Timed out after {}s, cancelling", secs);
            cancel.cancel();
        });
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    spinner.set_message(format!("Scraping {}", settings.url()));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = pipeline.get_data(output_dir, &cancel).await;
    spinner.finish_and_clear();

    let path = result?;
    println!("Wrote {}", path.display());
    println!("Done in {:.1}s", t0.elapsed().as_secs_f64());
    Ok(())
}

fn print_table(table: &RatingTable, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(table)?);
        return Ok(());
    }

    println!("{:<24} | {:<16} | {:>6}", "Hero", "Role", "Rating");
    println!("{}", "-".repeat(52));
    for (hero, entries) in table.iter() {
        if entries.is_empty() {
            println!("{:<24} | {:<16} | {:>6}", truncate(hero, 24), "-", "-");
        }
        for (i, e) in entries.iter().enumerate() {
            let name = if i == 0 { truncate(hero, 24) } else { String::new() };
            println!("{:<24} | {:<16} | {:>6}", name, truncate(&e.category, 16), e.score);
        }
    }
    println!("\n{} heroes, {} ratings", table.len(), table.entry_count());
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
