use serde::{Deserialize, Serialize};

use super::UnitId;

/// A directed edge of the conversion graph: `destination = slope * source + intercept`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Conversion {
    pub source_id: UnitId,
    pub destination_id: UnitId,
    pub bidirectional: bool,
    pub slope: f64,
    pub intercept: f64,
    pub note: Option<String>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("conversion {source_id} -> {destination_id} converts a unit to itself")]
    SelfLoop { source_id: UnitId, destination_id: UnitId },
    #[error("conversion {source_id} -> {destination_id} has a non-finite slope or intercept")]
    NonFinite { source_id: UnitId, destination_id: UnitId },
    #[error("bidirectional conversion {source_id} <-> {destination_id} has a zero slope and cannot be inverted")]
    ZeroSlope { source_id: UnitId, destination_id: UnitId },
}

impl Conversion {
    pub fn validate(&self) -> Result<(), ConversionError> {
        let (source_id, destination_id) = (self.source_id, self.destination_id);
        if source_id == destination_id {
            return Err(ConversionError::SelfLoop { source_id, destination_id });
        }
        if !self.slope.is_finite() || !self.intercept.is_finite() {
            return Err(ConversionError::NonFinite { source_id, destination_id });
        }
        if self.bidirectional && self.slope == 0.0 {
            return Err(ConversionError::ZeroSlope { source_id, destination_id });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversion(bidirectional: bool, slope: f64) -> Conversion {
        Conversion {
            source_id: 1,
            destination_id: 2,
            bidirectional,
            slope,
            intercept: 0.0,
            note: None,
        }
    }

    #[test]
    fn zero_slope_only_matters_when_bidirectional() {
        assert!(conversion(false, 0.0).validate().is_ok());
        assert!(matches!(
            conversion(true, 0.0).validate(),
            Err(ConversionError::ZeroSlope { .. })
        ));
    }

    #[test]
    fn rejects_self_loops_and_nan() {
        let looped = Conversion { destination_id: 1, ..conversion(false, 1.0) };
        assert!(matches!(looped.validate(), Err(ConversionError::SelfLoop { .. })));
        assert!(matches!(
            conversion(false, f64::NAN).validate(),
            Err(ConversionError::NonFinite { .. })
        ));
    }
}
