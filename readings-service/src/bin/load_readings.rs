use anyhow::{Context, Result};
use clap::Parser;
use readings_client::{domain::MeterId, PgReadingStore, ReadingStore};
use readings_service::{
    config::AppConfig,
    ingest::{ConditionSet, NormalizeOptions, RawRow},
    metrics_server, observability,
    pipeline::Pipeline,
    sinks::CanonicalReadingsSink,
    sources::ReadingsFileSource,
    transform::RowShapeCheck,
};
use sqlx::postgres::PgPoolOptions;
use std::{path::PathBuf, sync::Arc, time::Duration};

/// Load one meter's readings file into canonical readings.
#[derive(Parser, Debug)]
#[command(name = "load_readings", version)]
struct Args {
    /// Meter the readings belong to; its stored ingestion defaults apply.
    #[arg(long)]
    meter: MeterId,
    /// Comma-separated file, or pipe-separated when it ends in `.dat`.
    file: PathBuf,
    /// First line is a header.
    #[arg(long)]
    header: bool,
    /// Override the delimiter picked from the file extension.
    #[arg(long)]
    delimiter: Option<char>,
    /// Interpret wall-clock times in the meter's time zone.
    #[arg(long)]
    honor_dst: bool,
    /// Replace stored readings overlapping the upload.
    #[arg(long)]
    update: bool,
    /// Accept quoted or comma-grouped numbers and looser date formats.
    #[arg(long)]
    relaxed: bool,
    /// TOML file with value and date bounds checked after normalization.
    #[arg(long, env = "READINGS_CONDITIONS")]
    conditions: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();
    let args = Args::parse();

    let cfg = AppConfig::load()?;
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;
    let store = Arc::new(PgReadingStore::new(pool));

    let meter = store
        .fetch_meter(args.meter)
        .await?
        .with_context(|| format!("unknown meter {}", args.meter))?;

    let relaxed = args.relaxed || cfg.ingest.relaxed_parsing;
    let mut options = NormalizeOptions::from_meter(&meter, args.honor_dst, relaxed)?;
    if let Some(path) = &args.conditions {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read conditions {}", path.display()))?;
        let conditions: ConditionSet = toml::from_str(&contents)?;
        options = options.with_conditions(conditions);
    }

    let mut source = ReadingsFileSource::new(&args.file, args.header, meter.end_only_time);
    if let Some(delimiter) = args.delimiter {
        let delimiter = u8::try_from(delimiter).context("delimiter must be a single-byte character")?;
        source = source.with_delimiter(delimiter);
    }

    let sink = CanonicalReadingsSink::new(store, options, args.update || cfg.ingest.should_update).with_retries(
        cfg.ingest.max_retries,
        Duration::from_millis(cfg.ingest.retry_backoff_ms),
    );

    let pipeline: Pipeline<_, RawRow, _> = Pipeline {
        source,
        transforms: vec![Arc::new(RowShapeCheck { relaxed })],
        sink,
    };

    tracing::info!(meter_id = meter.id, file = %args.file.display(), "loading readings");
    pipeline.run().await?;

    Ok(())
}
