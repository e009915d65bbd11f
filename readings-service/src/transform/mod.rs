use crate::{
    error::ReadingsError,
    ingest::{parse_value, RawRow},
    pipeline::{Envelope, PipelineError, Transform},
};

/// Pure shape check of one uploaded row.
///
/// Rules:
/// - the reading must be numeric (relaxed parsing allows separators).
/// - the end timestamp must be present.
pub fn check_row(env: Envelope<RawRow>, relaxed: bool) -> Result<Envelope<RawRow>, ReadingsError> {
    let row = &env.payload;
    parse_value(row.row, &row.value, relaxed)?;
    if row.end.trim().is_empty() {
        return Err(ReadingsError::parse(row.row, "end", &row.end, "missing end timestamp"));
    }
    Ok(env)
}

#[derive(Clone, Default)]
pub struct RowShapeCheck {
    pub relaxed: bool,
}

#[async_trait::async_trait]
impl Transform<RawRow, RawRow> for RowShapeCheck {
    async fn apply(&self, input: Envelope<RawRow>) -> Result<Envelope<RawRow>, PipelineError> {
        match check_row(input, self.relaxed) {
            Ok(env) => Ok(env),
            Err(e) => {
                metrics::counter!("ingest_rows_rejected_total").increment(1);
                Err(PipelineError::Transform(e))
            }
        }
    }
}
