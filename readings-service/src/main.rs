use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use readings_client::{
    domain::{GroupId, MeterId, TimeInterval, UnitId},
    PgReadingStore,
};
use readings_service::{
    compare::Shift,
    config::AppConfig,
    metrics_server, observability,
    units::UnitGraphCache,
    ReadingsQuery, Target,
};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Query canonical meter readings and print the result as JSON.
#[derive(Parser, Debug)]
#[command(name = "readings-service", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone, Copy)]
#[group(required = true, multiple = false)]
struct TargetArgs {
    #[arg(long)]
    meter: Option<MeterId>,
    #[arg(long)]
    group: Option<GroupId>,
}

impl TargetArgs {
    fn target(self) -> Result<Target> {
        match (self.meter, self.group) {
            (Some(id), None) => Ok(Target::Meter(id)),
            (None, Some(id)) => Ok(Target::Group(id)),
            _ => anyhow::bail!("exactly one of --meter or --group is required"),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summed usage per fixed-width bucket.
    Bar {
        #[command(flatten)]
        target: TargetArgs,
        /// `all`, `start_end`, `start_` or `_end` with RFC 3339 timestamps.
        #[arg(long, default_value = "all")]
        interval: TimeInterval,
        #[arg(long, default_value_t = 1)]
        width_days: u32,
        #[arg(long)]
        unit: UnitId,
    },
    /// Rate per reading, coarsened when there are too many points.
    Line {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long, default_value = "all")]
        interval: TimeInterval,
        #[arg(long)]
        unit: UnitId,
    },
    /// Minimum and maximum rate per bucket of one meter.
    Range {
        #[arg(long)]
        meter: MeterId,
        #[arg(long, default_value = "all")]
        interval: TimeInterval,
        #[arg(long, default_value_t = 1)]
        width_days: u32,
        #[arg(long)]
        unit: UnitId,
    },
    /// Totals of a period and the same period shifted back.
    Compare {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long, value_parser = parse_instant)]
        start: OffsetDateTime,
        #[arg(long, value_parser = parse_instant)]
        end: OffsetDateTime,
        /// ISO 8601 duration such as `P1D`, `P1W` or `P1M`.
        #[arg(long, default_value = "P1D")]
        shift: Shift,
        #[arg(long)]
        unit: UnitId,
        /// Print both line series and their alignment notes instead of totals.
        #[arg(long)]
        lines: bool,
    },
    /// Display units the given meters can be graphed in.
    Units {
        #[arg(long = "meter", required = true)]
        meters: Vec<MeterId>,
        #[arg(long)]
        admin: bool,
    },
}

fn parse_instant(s: &str) -> Result<OffsetDateTime, time::error::Parse> {
    OffsetDateTime::parse(s, &Rfc3339)
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();
    let cli = Cli::parse();

    let cfg = AppConfig::load()?;
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;
    let store = Arc::new(PgReadingStore::new(pool));
    let query = ReadingsQuery::new(store, Arc::new(UnitGraphCache::new()), cfg.line);

    match cli.command {
        Command::Bar {
            target,
            interval,
            width_days,
            unit,
        } => print(&query.bar_series(target.target()?, interval, width_days, unit).await?),
        Command::Line { target, interval, unit } => {
            print(&query.line_series(target.target()?, interval, unit).await?)
        }
        Command::Range {
            meter,
            interval,
            width_days,
            unit,
        } => print(&query.range_series(Target::Meter(meter), interval, width_days, unit).await?),
        Command::Compare {
            target,
            start,
            end,
            shift,
            unit,
            lines,
        } => {
            let target = target.target()?;
            if lines {
                print(&query.compare_lines(target, start, end, shift, unit).await?)
            } else {
                let totals = query.compare_totals(target, start, end, shift, unit).await?;
                print(&[totals.shifted_total, totals.current_total])
            }
        }
        Command::Units { meters, admin } => print(&query.unit_options(&meters, admin).await?),
    }
}
