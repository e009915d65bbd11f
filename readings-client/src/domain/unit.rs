use serde::{Deserialize, Serialize};

use super::{Conversion, Meter, UnitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "unit_represent_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UnitRepresent {
    Quantity,
    Flow,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "unit_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    Unit,
    Meter,
    Suffix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "displayable_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Displayable {
    All,
    AllSpecial,
    Admin,
    None,
}

impl Displayable {
    pub const fn visible_to(self, is_admin: bool) -> bool {
        match self {
            Self::All | Self::AllSpecial => true,
            Self::Admin => is_admin,
            Self::None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    pub identifier: String,
    pub unit_represent: UnitRepresent,
    pub sec_in_rate: i32,
    pub type_of_unit: UnitType,
    pub suffix: String,
    pub displayable: Displayable,
    pub preferred_display: bool,
    pub note: Option<String>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    #[error("unit '{name}': seconds in rate must be a positive integer, got {sec_in_rate}")]
    SecInRate { name: String, sec_in_rate: i32 },
    #[error("unit '{name}': a suffix requires the suffix unit type and vice versa")]
    SuffixType { name: String },
    #[error("unit '{name}': meter and suffix units cannot be displayable")]
    Displayable { name: String },
    #[error("unit '{name}' cannot be deleted, it is used by: {}", referrers.join(", "))]
    InUse { name: String, referrers: Vec<String> },
}

/// Cache signals raised by editing a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EditSignals {
    /// Conversion paths through this unit may have changed.
    pub redo_cik: bool,
    /// Stored rate views computed with the old representation are invalid.
    pub refresh_reading_views: bool,
}

impl EditSignals {
    pub const fn any(self) -> bool {
        self.redo_cik || self.refresh_reading_views
    }
}

impl Unit {
    pub fn validate(&self) -> Result<(), UnitError> {
        if self.sec_in_rate < 1 {
            return Err(UnitError::SecInRate {
                name: self.name.clone(),
                sec_in_rate: self.sec_in_rate,
            });
        }
        if self.suffix.is_empty() == (self.type_of_unit == UnitType::Suffix) {
            return Err(UnitError::SuffixType { name: self.name.clone() });
        }
        if matches!(self.type_of_unit, UnitType::Meter | UnitType::Suffix) && self.displayable != Displayable::None {
            return Err(UnitError::Displayable { name: self.name.clone() });
        }
        Ok(())
    }

    /// Classify an edit from `self` to `edited`.
    pub fn edit_signals(&self, edited: &Unit) -> EditSignals {
        let rate_based = matches!(self.unit_represent, UnitRepresent::Flow | UnitRepresent::Raw);
        EditSignals {
            redo_cik: self.suffix != edited.suffix
                || self.type_of_unit != edited.type_of_unit
                || self.displayable != edited.displayable,
            refresh_reading_views: self.unit_represent != edited.unit_represent
                || (rate_based && self.sec_in_rate != edited.sec_in_rate),
        }
    }
}

/// Refuse to delete a unit still referenced by a meter or a conversion.
pub fn check_unit_deletable(unit: &Unit, meters: &[Meter], conversions: &[Conversion], units: &[Unit]) -> Result<(), UnitError> {
    let name_of = |id: UnitId| {
        units
            .iter()
            .find(|u| u.id == id)
            .map_or_else(|| format!("#{id}"), |u| u.name.clone())
    };

    let mut referrers: Vec<String> = meters
        .iter()
        .filter(|m| m.unit_id == unit.id || m.default_graphic_unit == Some(unit.id))
        .map(|m| format!("meter {}", m.name))
        .collect();
    referrers.extend(
        conversions
            .iter()
            .filter(|c| c.source_id == unit.id || c.destination_id == unit.id)
            .map(|c| {
                let arrow = if c.bidirectional { "↔" } else { "→" };
                format!("conversion {} {arrow} {}", name_of(c.source_id), name_of(c.destination_id))
            }),
    );

    if referrers.is_empty() {
        Ok(())
    } else {
        Err(UnitError::InUse {
            name: unit.name.clone(),
            referrers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kwh() -> Unit {
        Unit {
            id: 1,
            name: "kWh".to_string(),
            identifier: "kWh".to_string(),
            unit_represent: UnitRepresent::Quantity,
            sec_in_rate: 3600,
            type_of_unit: UnitType::Unit,
            suffix: String::new(),
            displayable: Displayable::All,
            preferred_display: true,
            note: None,
        }
    }

    #[test]
    fn validation_rules() {
        assert!(kwh().validate().is_ok());

        let zero_rate = Unit { sec_in_rate: 0, ..kwh() };
        assert!(matches!(zero_rate.validate(), Err(UnitError::SecInRate { .. })));

        let stray_suffix = Unit { suffix: " CO2".to_string(), ..kwh() };
        assert!(matches!(stray_suffix.validate(), Err(UnitError::SuffixType { .. })));

        let visible_meter = Unit { type_of_unit: UnitType::Meter, ..kwh() };
        assert!(matches!(visible_meter.validate(), Err(UnitError::Displayable { .. })));
    }

    #[test]
    fn edit_signals_follow_changed_fields() {
        let before = kwh();
        assert!(!before.edit_signals(&before).any());

        let hidden = Unit { displayable: Displayable::None, ..kwh() };
        assert_eq!(
            before.edit_signals(&hidden),
            EditSignals { redo_cik: true, refresh_reading_views: false }
        );

        // secInRate only matters for rate based units.
        let rate_changed = Unit { sec_in_rate: 60, ..kwh() };
        assert!(!before.edit_signals(&rate_changed).any());
        let flow = Unit { unit_represent: UnitRepresent::Flow, ..kwh() };
        let flow_rate_changed = Unit { sec_in_rate: 60, ..flow.clone() };
        assert!(flow.edit_signals(&flow_rate_changed).refresh_reading_views);
    }

    #[test]
    fn deletion_blocked_by_conversion() {
        let mj = Unit { id: 2, name: "MJ".to_string(), ..kwh() };
        let conversions = vec![Conversion {
            source_id: 1,
            destination_id: 2,
            bidirectional: true,
            slope: 3.6,
            intercept: 0.0,
            note: None,
        }];
        let units = vec![kwh(), mj.clone()];
        let err = check_unit_deletable(&mj, &[], &conversions, &units).unwrap_err();
        assert_eq!(
            err,
            UnitError::InUse {
                name: "MJ".to_string(),
                referrers: vec!["conversion kWh ↔ MJ".to_string()],
            }
        );
        assert!(check_unit_deletable(&mj, &[], &[], &units).is_ok());
    }
}
