//! Timestamp value object for immutable points in time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from a DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Checks if this timestamp is before another.
    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.0 < other.0
    }

    /// Checks if this timestamp is after another.
    pub fn is_after(&self, other: &Timestamp) -> bool {
        self.0 > other.0
    }

    /// Returns the duration from another timestamp to this one.
    ///
    /// Returns negative duration if other is after self.
    pub fn duration_since(&self, other: &Timestamp) -> Duration {
        self.0.signed_duration_since(other.0)
    }

    /// Creates a new timestamp by adding the specified number of minutes.
    pub fn plus_minutes(&self, minutes: i64) -> Self {
        Self(self.0 + Duration::minutes(minutes))
    }

    /// Creates a new timestamp by subtracting the specified number of minutes.
    pub fn minus_minutes(&self, minutes: i64) -> Self {
        Self(self.0 - Duration::minutes(minutes))
    }

    /// Returns the smallest timestamp strictly after `previous` that is not
    /// earlier than now. Keeps per-conversation ordering monotonic when the
    /// wall clock stalls or steps backwards.
    pub fn monotonic_after(previous: Option<&Timestamp>) -> Self {
        let now = Self::now();
        match previous {
            Some(prev) if !now.is_after(prev) => Self(prev.0 + Duration::microseconds(1)),
            _ => now,
        }
    }

    /// Returns the RFC 3339 representation used on the wire.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_now_creates_current_time() {
        let before = Utc::now();
        let ts = Timestamp::now();
        let after = Utc::now();

        assert!(ts.as_datetime() >= &before);
        assert!(ts.as_datetime() <= &after);
    }

    #[test]
    fn plus_and_minus_minutes_are_inverse() {
        let ts = Timestamp::now();
        assert_eq!(ts.plus_minutes(15).minus_minutes(15), ts);
        assert_eq!(ts.plus_minutes(90).duration_since(&ts).num_minutes(), 90);
    }

    #[test]
    fn monotonic_after_moves_past_future_previous() {
        let future = Timestamp::now().plus_minutes(5);
        let next = Timestamp::monotonic_after(Some(&future));
        assert!(next.is_after(&future));
    }

    #[test]
    fn monotonic_after_uses_now_when_previous_is_old() {
        let old = Timestamp::now().minus_minutes(5);
        let next = Timestamp::monotonic_after(Some(&old));
        assert!(next.is_after(&old));
        assert!(next.duration_since(&old).num_minutes() >= 4);
    }

    #[test]
    fn ordering_follows_time() {
        let earlier = Timestamp::now();
        let later = earlier.plus_minutes(1);
        assert!(earlier.is_before(&later));
        assert!(later.is_after(&earlier));
        assert!(earlier < later);
    }
}
