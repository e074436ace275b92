use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use price_trend::{
    TrendUnit,
    analytics::summarize,
    config::resolve_config,
    input::read_observations,
    tz::{TimeBasis, parse_ts_to_utc},
};

#[derive(Parser)]
#[command(version, about = "Price trend CLI")]
struct Cli {
    /// Path to a trend config TOML file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Bucket observations into per-store series
    Aggregate(AggregateCmd),
    /// Summary figures (lowest/highest/average, volatility, insight)
    Summary(SummaryCmd),
}

#[derive(Args)]
struct AggregateCmd {
    /// JSON file: an array of observations or a `{ "price_trend": [...] }` payload
    #[arg(long, value_name = "FILE")]
    input: PathBuf,
    /// hour, day, or week (defaults to the configured unit)
    #[arg(long)]
    unit: Option<TrendUnit>,
    /// "utc" or an IANA zone; overrides the configured basis
    #[arg(long)]
    basis: Option<TimeBasis>,
}

#[derive(Args)]
struct SummaryCmd {
    /// JSON file, same shapes as `aggregate`
    #[arg(long, value_name = "FILE")]
    input: PathBuf,
    /// Evaluation instant for the trailing-week insight (default: now)
    #[arg(long)]
    now: Option<String>,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "price_trend=info".into()))
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = resolve_config(cli.config.as_deref())?;

    match cli.cmd {
        Cmd::Aggregate(AggregateCmd {
            input,
            unit,
            basis,
        }) => {
            let cfg = cfg.with_overrides(unit, basis);
            let observations = read_observations(&input)?;
            cfg.check_input_len(observations.len())?;

            let out = cfg.aggregator().aggregate(&observations, cfg.unit);
            info!(
                unit = %cfg.unit,
                basis = %out.basis,
                stores = out.trends.len(),
                dropped = out.dropped.total(),
                "aggregated {}",
                input.display()
            );
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Cmd::Summary(SummaryCmd { input, now }) => {
            let now: DateTime<Utc> = match now {
                Some(s) => parse_ts_to_utc(&s)?,
                None => Utc::now(),
            };
            let observations = read_observations(&input)?;
            cfg.check_input_len(observations.len())?;

            let analytics = summarize(&observations, now)?;
            println!("{}", serde_json::to_string_pretty(&analytics)?);
        }
    }

    Ok(())
}
