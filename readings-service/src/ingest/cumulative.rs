use time::Time;

/// Time-of-day window in which a cumulative counter may restart.
///
/// Both edges are inclusive. A window whose start is after its end wraps
/// past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetWindow {
    pub start: Time,
    pub end: Time,
}

impl ResetWindow {
    pub fn contains(self, at: Time) -> bool {
        if self.start <= self.end {
            self.start <= at && at <= self.end
        } else {
            at >= self.start || at <= self.end
        }
    }
}

/// Interval value implied by two consecutive counter samples.
///
/// A decrease is a counter reset: with a window that contains the reading's
/// start time of day the new counter value is the interval value, otherwise
/// `None`.
pub fn interval_value(previous: f64, current: f64, start_of_day: Time, reset: Option<ResetWindow>) -> Option<f64> {
    if current >= previous {
        return Some(current - previous);
    }
    match reset {
        Some(window) if window.contains(start_of_day) => Some(current),
        _ => None,
    }
}
