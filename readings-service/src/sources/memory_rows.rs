use crate::{
    ingest::RawRow,
    pipeline::{Envelope, ItemStream, Source},
};

/// Rows already in memory, such as a decoded upload body.
#[derive(Debug, Clone, Default)]
pub struct MemoryRowsSource {
    rows: Vec<RawRow>,
}

impl MemoryRowsSource {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self { rows }
    }
}

#[async_trait::async_trait]
impl Source<RawRow> for MemoryRowsSource {
    async fn stream(&self) -> ItemStream<RawRow> {
        let rows = self.rows.clone();
        Box::pin(futures::stream::iter(rows.into_iter().map(|row| Ok(Envelope::now(row)))))
    }
}
