use std::{fs::File, path::PathBuf};

use csv::StringRecord;

use crate::{
    error::ReadingsError,
    ingest::RawRow,
    pipeline::{Envelope, ItemStream, PipelineError, Source},
};

/// Delimited readings upload for one meter.
///
/// Columns are positional: `reading,start,end`, or `reading,end` for
/// end-only meters. `.dat` files are pipe-delimited, everything else uses
/// commas.
#[derive(Debug, Clone)]
pub struct ReadingsFileSource {
    path: PathBuf,
    delimiter: u8,
    has_header: bool,
    end_only: bool,
}

impl ReadingsFileSource {
    pub fn new<P: Into<PathBuf>>(path: P, has_header: bool, end_only: bool) -> Self {
        let path = path.into();
        let delimiter = match path.extension().and_then(|e| e.to_str()) {
            Some("dat") => b'|',
            _ => b',',
        };
        Self {
            path,
            delimiter,
            has_header,
            end_only,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

fn record_to_raw_row(record: &StringRecord, row: usize, end_only: bool) -> Result<RawRow, ReadingsError> {
    let field = |idx: usize, name: &'static str| {
        record
            .get(idx)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ReadingsError::parse(row, name, "", "missing column"))
    };

    let value = field(0, "reading")?;
    let (start, end) = if end_only {
        (None, field(1, "end")?)
    } else {
        (Some(field(1, "start")?), field(2, "end")?)
    };
    Ok(RawRow { row, value, start, end })
}

#[async_trait::async_trait]
impl Source<RawRow> for ReadingsFileSource {
    async fn stream(&self) -> ItemStream<RawRow> {
        let source = self.clone();
        let s = async_stream::try_stream! {
            let file = File::open(&source.path)
                .map_err(|e| PipelineError::Source(format!("failed to open {}: {e}", source.path.display())))?;
            let mut rdr = csv::ReaderBuilder::new()
                .delimiter(source.delimiter)
                .has_headers(source.has_header)
                .flexible(true)
                .from_reader(file);

            for result in rdr.records() {
                let record = result.map_err(|e| PipelineError::Source(format!("failed to read record: {e}")))?;
                let row = record
                    .position()
                    .and_then(|p| usize::try_from(p.line()).ok())
                    .unwrap_or_default();

                let raw = match record_to_raw_row(&record, row, source.end_only) {
                    Ok(raw) => raw,
                    Err(e) => {
                        metrics::counter!("readings_file_parse_errors_total").increment(1);
                        Err(PipelineError::Rejected(e))?
                    }
                };

                yield Envelope::now(raw);
            }
        };

        Box::pin(s)
    }
}
