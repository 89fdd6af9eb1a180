//! Recency decisions for normalized dates.
//!
//! The cutoff is computed from the wall clock at evaluation time, not from
//! the start of the crawl. A long run therefore sees a cutoff that advances
//! slightly while it works; this drift is accepted and not corrected.

use crate::dates::NormalizedDate;
use chrono::{DateTime, Duration, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// What to do with items whose publication date is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UnknownPolicy {
    #[default]
    Keep,
    Drop,
}

/// Keep/drop decision against the current wall clock.
pub fn is_recent(date: NormalizedDate, lookback: Duration, unknown_policy: UnknownPolicy) -> bool {
    is_recent_at(date, lookback, unknown_policy, Utc::now())
}

/// `Known(t)` is recent iff `now - t <= lookback`; dates in the future are
/// recent. `Unknown` follows the policy.
pub fn is_recent_at(
    date: NormalizedDate,
    lookback: Duration,
    unknown_policy: UnknownPolicy,
    now: DateTime<Utc>,
) -> bool {
    match date {
        NormalizedDate::Known(t) => now - t <= lookback,
        NormalizedDate::Unknown => unknown_policy == UnknownPolicy::Keep,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let lookback = Duration::days(30);
        let edge = NormalizedDate::Known(now() - lookback);
        let past_edge = NormalizedDate::Known(now() - lookback - Duration::seconds(1));
        for policy in [UnknownPolicy::Keep, UnknownPolicy::Drop] {
            assert!(is_recent_at(edge, lookback, policy, now()));
            assert!(!is_recent_at(past_edge, lookback, policy, now()));
        }
    }

    #[test]
    fn test_future_dates_are_recent() {
        let tomorrow = NormalizedDate::Known(now() + Duration::days(1));
        assert!(is_recent_at(tomorrow, Duration::days(1), UnknownPolicy::Drop, now()));
    }

    #[test]
    fn test_unknown_follows_policy() {
        let lookback = Duration::days(365);
        assert!(is_recent_at(NormalizedDate::Unknown, lookback, UnknownPolicy::Keep, now()));
        assert!(!is_recent_at(NormalizedDate::Unknown, lookback, UnknownPolicy::Drop, now()));
    }

    #[test]
    fn test_wall_clock_variant() {
        let recent = NormalizedDate::Known(Utc::now() - Duration::hours(1));
        assert!(is_recent(recent, Duration::days(1), UnknownPolicy::Drop));
        let stale = NormalizedDate::Known(Utc::now() - Duration::days(400));
        assert!(!is_recent(stale, Duration::days(365), UnknownPolicy::Keep));
    }

    #[test]
    fn test_policy_parses_lowercase() {
        let policy: UnknownPolicy = serde_yaml::from_str("drop").unwrap();
        assert_eq!(policy, UnknownPolicy::Drop);
    }
}
