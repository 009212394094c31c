use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lampfit::chart::ChartRecord;
use lampfit::config::AppConfig;
use lampfit::db::models::PlayRecord;
use lampfit::pipeline::Outcome;
use lampfit::report::Sections;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lampfit", version, about = "Estimate skill from clear lamps and recommend charts")]
struct Cli {
    /// Path to the score database (score.db)
    #[arg(long, global = true)]
    scores: Option<PathBuf>,

    /// Path to the chart reference table (CSV)
    #[arg(long, global = true)]
    charts: Option<PathBuf>,

    /// Display level category to calibrate against (e.g. sl, st)
    #[arg(long, global = true)]
    prefix: Option<String>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate skill, rank clears and write the HTML report
    Recommend {
        /// Number of clears to keep in the ranked list
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Report path (defaults to config output)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Remember --scores and --charts in the config file
        #[arg(long)]
        save: bool,

        /// Print the result as JSON instead of writing a report
        #[arg(long)]
        json: bool,
    },

    /// Print the estimated skill only
    Estimate,

    /// Write the per-level difficulty table without the ranked list
    Table {
        /// Report path (defaults to config output)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the config file location and effective values
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let mut config = AppConfig::load();

    // CLI > config
    if let Some(prefix) = cli.prefix.clone() {
        config.level_prefix = prefix;
    }
    if let Some(path) = cli.scores.clone() {
        config.score_db = Some(path);
    }
    if let Some(path) = cli.charts.clone() {
        config.chart_table = Some(path);
    }

    match cli.command {
        Commands::Recommend { limit, output, save, json } => {
            if let Some(n) = limit {
                config.rating.top_n = n;
            }
            let (charts, plays) = load_inputs(&config)?;
            let outcome = lampfit::pipeline::run(&charts, &plays, &config.settings())
                .context("Recommendation failed")?;

            if json {
                let text = serde_json::to_string_pretty(&outcome)
                    .context("Failed to serialize result")?;
                println!("{text}");
            } else {
                print_estimate(&outcome);
                println!();
                print_recommendations(&outcome);

                let path = output.unwrap_or_else(|| config.output.clone());
                lampfit::report::write_report(&path, &outcome, Sections::Full)?;
                println!();
                println!("Report written to {}", path.display());
            }

            // Only persist after a successful run, and only the two paths
            if save {
                let path = AppConfig::config_path()
                    .context("No config directory on this platform")?;
                if AppConfig::save_inputs(&path, cli.scores.clone(), cli.charts.clone())? {
                    println!("Saved input paths to {}", path.display());
                }
            }
        }

        Commands::Estimate => {
            let (charts, plays) = load_inputs(&config)?;
            let (calibration, estimate) =
                lampfit::pipeline::fit(&charts, &plays, &config.settings())
                    .context("Estimation failed")?;
            println!(
                "Estimated: {}{:.2}",
                config.level_prefix,
                calibration.latent_to_level(estimate.theta)
            );
            println!(
                "theta = {:.4}  (nll {:.3}, {} plays, {} evaluations)",
                estimate.theta, estimate.nll, estimate.observations, estimate.evaluations
            );
        }

        Commands::Table { output } => {
            let (charts, plays) = load_inputs(&config)?;
            let outcome = lampfit::pipeline::run(&charts, &plays, &config.settings())
                .context("Difficulty table failed")?;
            print_estimate(&outcome);

            let path = output.unwrap_or_else(|| config.output.clone());
            lampfit::report::write_report(&path, &outcome, Sections::TableOnly)?;
            println!("Difficulty table written to {}", path.display());
        }

        Commands::Config => {
            match AppConfig::config_path() {
                Some(path) => println!("Config file: {}", path.display()),
                None => println!("Config file: (no config directory on this platform)"),
            }
            println!();
            let text = toml::to_string_pretty(&config).context("Failed to serialize config")?;
            print!("{text}");
        }
    }

    Ok(())
}

/// Read both inputs. Nothing is written before both load cleanly.
fn load_inputs(config: &AppConfig) -> Result<(Vec<ChartRecord>, Vec<PlayRecord>)> {
    let chart_path = config.chart_table.as_deref().context(
        "No chart table. Pass --charts or set chart_table in config.",
    )?;
    let score_path = config.score_db.as_deref().context(
        "No score database. Pass --scores or set score_db in config.",
    )?;

    let charts = lampfit::chart::load_chart_table(chart_path)
        .context("Failed to load chart table")?;

    let db = lampfit::db::Database::open(score_path).context("Failed to open score database")?;
    let plays = db.load_plays().context("Failed to read scores")?;
    drop(db);

    Ok((charts, plays))
}

fn print_estimate(outcome: &Outcome) {
    println!("Estimated: {}{:.2}", outcome.prefix, outcome.level);
    println!(
        "Rating: {:.1} (raw {:.1}, {} clears)",
        outcome.rating.decayed,
        outcome.rating.raw,
        outcome.recommendations.len()
    );
}

/// Print the ranked clears.
fn print_recommendations(outcome: &Outcome) {
    for (num, entry) in outcome.recommendations.iter().enumerate() {
        println!(
            "{:>3}: {:>4.0}pp {:<9} {}{:>5.2} {}",
            num + 1,
            entry.pp,
            entry.lamp.label(),
            outcome.prefix,
            entry.level_value,
            entry.title
        );
    }
}
