use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Decision;

/// Remaining wait, broken down for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Countdown {
    pub remaining_ms: u64,
    /// Whole hours; exceeds 24 for multi-day waits.
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    /// 0.0 ..= 1.0 share of the wait already elapsed.
    pub fraction_elapsed: f64,
}

impl Countdown {
    pub fn is_elapsed(&self) -> bool {
        self.remaining_ms == 0
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// Derive the countdown for `decision` at `now`.
///
/// Always computed from `end_time - now`, so it stays correct across suspend
/// and clock adjustments. A decision that never started waiting reports a
/// zero-length, fully elapsed countdown.
pub fn remaining(now: DateTime<Utc>, decision: &Decision) -> Countdown {
    let (start, end) = match (decision.start_time, decision.end_time) {
        (Some(start), Some(end)) => (start, end),
        _ => return Countdown::from_parts(0, 1.0),
    };

    let remaining_ms = (end - now).num_milliseconds().max(0) as u64;
    let total_ms = (end - start).num_milliseconds();
    let fraction_elapsed = if total_ms <= 0 {
        1.0
    } else {
        let elapsed_ms = (now - start).num_milliseconds();
        (elapsed_ms as f64 / total_ms as f64).clamp(0.0, 1.0)
    };

    Countdown::from_parts(remaining_ms, fraction_elapsed)
}

impl Countdown {
    fn from_parts(remaining_ms: u64, fraction_elapsed: f64) -> Self {
        let total_secs = remaining_ms / 1000;
        Self {
            remaining_ms,
            hours: total_secs / 3600,
            minutes: (total_secs % 3600) / 60,
            seconds: total_secs % 60,
            fraction_elapsed,
        }
    }
}
