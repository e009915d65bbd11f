use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use readings_client::{domain::Reading, ReadingStore};

use crate::{
    ingest::{normalize, NormalizeOptions, RawRow},
    pipeline::{Envelope, PipelineError, Sink},
};

/// Collects a whole upload, normalizes it and stores it in one write.
///
/// Any failed row, upstream or during normalization, rejects the batch; nothing
/// is written.
pub struct CanonicalReadingsSink<S: ?Sized> {
    store: Arc<S>,
    options: NormalizeOptions,
    should_update: bool,
    max_retries: u32,
    retry_backoff: Duration,
}

impl<S> CanonicalReadingsSink<S>
where
    S: ReadingStore + ?Sized,
{
    pub fn new(store: Arc<S>, options: NormalizeOptions, should_update: bool) -> Self {
        Self {
            store,
            options,
            should_update,
            max_retries: 0,
            retry_backoff: Duration::ZERO,
        }
    }

    pub fn with_retries(mut self, max_retries: u32, retry_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = retry_backoff;
        self
    }

    async fn write(&self, readings: &[Reading]) -> Result<u64, PipelineError> {
        let meter_id = self.options.meter_id;
        let mut attempt: u32 = 0;
        loop {
            match self
                .store
                .replace_canonical_readings(meter_id, readings, self.should_update)
                .await
            {
                Ok(written) => return Ok(written),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(error = %e, meter_id, attempt, "storing readings failed, retrying with backoff");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, meter_id, "storing readings failed, giving up");
                    metrics::counter!("ingest_store_errors_total").increment(1);
                    return Err(PipelineError::Sink(e.to_string()));
                }
            }
        }
    }

    fn reject(&self, error: PipelineError) -> PipelineError {
        tracing::error!(error = %error, meter_id = self.options.meter_id, "readings batch rejected");
        metrics::counter!("ingest_batches_rejected_total").increment(1);
        error
    }
}

#[async_trait::async_trait]
impl<S> Sink<RawRow> for CanonicalReadingsSink<S>
where
    S: ReadingStore + ?Sized,
{
    async fn run<I>(&self, mut input: I) -> Result<(), PipelineError>
    where
        I: futures::Stream<Item = Result<Envelope<RawRow>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut rows = Vec::new();
        let mut first_received = None;

        while let Some(item) = input.next().await {
            let env = item.map_err(|e| self.reject(e))?;
            if first_received.is_none() {
                first_received = Some(env.received_at);
            }
            rows.push(env.payload);
        }

        let readings = normalize(&rows, &self.options).map_err(|e| self.reject(e.into()))?;
        let written = self.write(&readings).await?;

        metrics::counter!("readings_ingested_total").increment(written);
        if let Some(dur) = first_received.and_then(|t| std::time::SystemTime::now().duration_since(t).ok()) {
            metrics::histogram!("ingest_end_to_end_latency_seconds").record(dur.as_secs_f64());
        }
        tracing::info!(
            meter_id = self.options.meter_id,
            rows = rows.len(),
            readings = readings.len(),
            written,
            should_update = self.should_update,
            "readings batch stored"
        );
        Ok(())
    }
}
