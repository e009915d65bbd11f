use chrono::{LocalResult, NaiveDate, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;
use time::{OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

/// How meter wall-clock times map to instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WallClock {
    #[default]
    Utc,
    /// Wall clock follows the zone's daylight saving rules.
    Zone(Tz),
}

/// Lower bound a resolved timestamp must respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Floor {
    None,
    AtOrAfter(OffsetDateTime),
    After(OffsetDateTime),
}

impl Floor {
    fn admits(self, candidate: OffsetDateTime) -> bool {
        match self {
            Self::None => true,
            Self::AtOrAfter(floor) => candidate >= floor,
            Self::After(floor) => candidate > floor,
        }
    }
}

impl WallClock {
    /// Place `wall` on the timeline.
    ///
    /// A fall-back time that occurs twice resolves to the earlier instant
    /// unless `floor` rules it out. Returns `None` for a spring-forward time
    /// that never occurs.
    pub fn resolve(self, wall: PrimitiveDateTime, floor: Floor) -> Option<OffsetDateTime> {
        let tz = match self {
            Self::Utc => return Some(wall.assume_utc()),
            Self::Zone(tz) => tz,
        };

        let naive = to_naive(wall)?;
        let candidates: Vec<OffsetDateTime> = match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => vec![wall.assume_offset(fixed(dt.offset().fix())?)],
            LocalResult::Ambiguous(earlier, later) => vec![
                wall.assume_offset(fixed(earlier.offset().fix())?),
                wall.assume_offset(fixed(later.offset().fix())?),
            ],
            LocalResult::None => return None,
        };

        candidates
            .iter()
            .copied()
            .find(|&c| floor.admits(c))
            .or_else(|| candidates.last().copied())
    }

    /// Wall-clock time of day of `instant`.
    pub fn time_of_day(self, instant: OffsetDateTime) -> Time {
        match self {
            Self::Utc => instant.to_offset(UtcOffset::UTC).time(),
            Self::Zone(tz) => {
                let offset = chrono::DateTime::from_timestamp(instant.unix_timestamp(), 0)
                    .and_then(|utc| fixed(tz.offset_from_utc_datetime(&utc.naive_utc()).fix()))
                    .unwrap_or(UtcOffset::UTC);
                instant.to_offset(offset).time()
            }
        }
    }
}

fn to_naive(wall: PrimitiveDateTime) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(wall.year(), u32::from(u8::from(wall.month())), u32::from(wall.day()))?.and_hms_nano_opt(
        u32::from(wall.hour()),
        u32::from(wall.minute()),
        u32::from(wall.second()),
        wall.nanosecond(),
    )
}

fn fixed(offset: chrono::FixedOffset) -> Option<UtcOffset> {
    UtcOffset::from_whole_seconds(offset.local_minus_utc()).ok()
}
