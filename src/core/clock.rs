//! Injectable time source
//!
//! Every operation that defaults a missing timestamp to "now" resolves it
//! through the owning chain's clock, so interval checks and mining stay
//! deterministic under test.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source of the current time for timestamp defaulting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Clock {
    /// Wall-clock time
    System,
    /// A constant instant, for deterministic tests and replays
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// The current instant according to this clock
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(instant) => *instant,
        }
    }

    /// Resolve an optional timestamp, falling back to this clock
    pub fn resolve(&self, timestamp: Option<DateTime<Utc>>) -> DateTime<Utc> {
        timestamp.unwrap_or_else(|| self.now())
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::System
    }
}
