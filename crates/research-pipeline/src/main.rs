//! research-pipeline: train, generate signals and backtest from a price CSV.
//!
//! Usage:
//!   research-pipeline train --prices prices.csv [--cutoff 2023-06-30] [--initial N --assess N --skip N]
//!   research-pipeline signals --prices prices.csv [--live] [--threshold 0.6]
//!   research-pipeline backtest [--threshold 0.6 --take-profit 0.05 --stop-loss -0.05]
//!
//! Settings not given as flags come from `PIPELINE_*` environment variables.

use std::path::PathBuf;

use anyhow::{bail, Context};

use research_core::{parse_date, DashboardParams, PipelineConfig};

mod pipeline;

const USAGE: &str = "\
Usage:
  research-pipeline train --prices FILE [--cutoff YYYY-MM-DD] [--initial N] [--assess N] [--skip N]
  research-pipeline signals --prices FILE [--live] [--threshold T]
  research-pipeline backtest [--threshold T] [--take-profit TP] [--stop-loss SL]";

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "research_pipeline=info,ml_engine=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> anyhow::Result<()> {
    let command = args.first().map(String::as_str).unwrap_or("");
    let config = PipelineConfig::from_env().context("Invalid PIPELINE_* configuration")?;

    match command {
        "train" => {
            let prices = required_path(args, "--prices")?;
            let cutoff = match flag_value(args, "--cutoff") {
                Some(raw) => Some(parse_date(raw)?),
                None => config.cutoff_date,
            };
            let mut policy = ml_engine::FoldPolicy::default();
            policy.initial = parsed_flag(args, "--initial")?.unwrap_or(policy.initial);
            policy.assess = parsed_flag(args, "--assess")?.unwrap_or(policy.assess);
            policy.skip = parsed_flag(args, "--skip")?.unwrap_or(policy.skip);

            let outcome = pipeline::train(&config, &prices, cutoff, policy)?;
            println!(
                "Trained on {} rows through {} (cutoff {}); selected config {} with {:?} = {:.4}",
                outcome.report.training_rows,
                outcome.trained_through,
                outcome.cutoff,
                outcome.report.selected_index,
                outcome.report.metric,
                outcome.report.selected_score
            );
        }
        "signals" => {
            let prices = required_path(args, "--prices")?;
            let live = args.iter().any(|a| a == "--live");
            let threshold = parsed_flag(args, "--threshold")?.unwrap_or(DashboardParams::default().threshold);
            let artifact = pipeline::generate(&config, &prices, live, threshold)?;
            let signaled = artifact.rows.iter().filter(|r| r.is_signaled()).count();
            println!(
                "Wrote {} signal rows ({} signaled) for {:?} to {}",
                artifact.rows.len(),
                signaled,
                artifact.latest_date(),
                config.artifact_dir.join(artifact.kind.file_name()).display()
            );
        }
        "backtest" => {
            let defaults = DashboardParams::default();
            let params = DashboardParams {
                threshold: parsed_flag(args, "--threshold")?.unwrap_or(defaults.threshold),
                take_profit: parsed_flag(args, "--take-profit")?.unwrap_or(defaults.take_profit),
                stop_loss: parsed_flag(args, "--stop-loss")?.unwrap_or(defaults.stop_loss),
            };
            let result = pipeline::backtest(&config, &params)?;
            if result.is_empty() {
                println!("No data to evaluate.");
            } else {
                println!(
                    "{} rows, {} dates ({} to {})",
                    result.row_count,
                    result.daily.len(),
                    result.start_date.map(|d| d.to_string()).unwrap_or_default(),
                    result.end_date.map(|d| d.to_string()).unwrap_or_default()
                );
                println!("{}", pipeline::format_metrics_table(&result.display_metrics()));
            }
        }
        "" => bail!("Missing command"),
        other => bail!("Unknown command '{}'", other),
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn parsed_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> anyhow::Result<Option<T>> {
    match flag_value(args, flag) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("Invalid value for {}: '{}'", flag, raw)),
        None => Ok(None),
    }
}

fn required_path(args: &[String], flag: &str) -> anyhow::Result<PathBuf> {
    flag_value(args, flag)
        .map(PathBuf::from)
        .with_context(|| format!("{} is required", flag))
}
