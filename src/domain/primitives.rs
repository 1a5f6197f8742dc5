//! Domain primitives: TimeSec, TimeMs, UserId, VesselId.

use serde::{Deserialize, Serialize};

/// Time in whole seconds since Unix epoch (the game ledger's native unit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeSec(pub i64);

impl TimeSec {
    pub fn new(secs: i64) -> Self {
        TimeSec(secs)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Widen to milliseconds for comparison against log/trip timestamps.
    pub fn as_ms(&self) -> TimeMs {
        TimeMs(self.0 * 1000)
    }

    pub fn now() -> Self {
        TimeSec(chrono::Utc::now().timestamp())
    }
}

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    /// Absolute distance to another instant, in milliseconds.
    pub fn delta(&self, other: TimeMs) -> i64 {
        (self.0 - other.0).abs()
    }
}

/// Game user id. Every table carries it; per-user data sets never mix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric vessel id assigned by the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VesselId(pub i64);

impl VesselId {
    pub fn new(id: i64) -> Self {
        VesselId(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for VesselId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timesec_widens_to_ms() {
        assert_eq!(TimeSec::new(1000).as_ms(), TimeMs::new(1_000_000));
    }

    #[test]
    fn test_timems_delta_is_absolute() {
        let a = TimeMs::new(5000);
        let b = TimeMs::new(3000);
        assert_eq!(a.delta(b), 2000);
        assert_eq!(b.delta(a), 2000);
    }

    #[test]
    fn test_timems_ordering() {
        assert!(TimeMs::new(1000) < TimeMs::new(2000));
    }

    #[test]
    fn test_user_id_display() {
        assert_eq!(UserId::new("42").to_string(), "42");
    }
}
