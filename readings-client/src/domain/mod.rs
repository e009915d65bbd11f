mod conversion;
mod interval;
mod meter;
mod reading;
mod unit;

pub use conversion::{Conversion, ConversionError};
pub use interval::{IntervalError, TimeInterval};
pub use meter::{Meter, TimeSort};
pub use reading::{merge_readings, Reading};
pub use unit::{check_unit_deletable, Displayable, EditSignals, Unit, UnitError, UnitRepresent, UnitType};

pub type MeterId = i32;
pub type GroupId = i32;
pub type UnitId = i32;
