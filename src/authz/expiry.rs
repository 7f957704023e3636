use chrono::{DateTime, TimeDelta, Utc};

/// Returns true once `now` has reached `updated_at + ttl`.
///
/// The boundary instant counts as expired. A deadline past the end of the
/// representable time range never expires; one before its start already has.
pub fn is_expired(updated_at: DateTime<Utc>, ttl: TimeDelta, now: DateTime<Utc>) -> bool {
    match updated_at.checked_add_signed(ttl) {
        Some(deadline) => now >= deadline,
        None => ttl < TimeDelta::zero(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_expired_at_boundary() {
        let ttl = TimeDelta::minutes(5);
        assert!(is_expired(t0(), ttl, t0() + ttl));
    }

    #[test]
    fn test_not_expired_one_nanosecond_before() {
        let ttl = TimeDelta::minutes(5);
        let now = t0() + ttl - TimeDelta::nanoseconds(1);
        assert!(!is_expired(t0(), ttl, now));
    }

    #[test]
    fn test_expired_well_after() {
        assert!(is_expired(t0(), TimeDelta::seconds(30), t0() + TimeDelta::hours(1)));
    }

    #[test]
    fn test_zero_ttl_is_immediately_expired() {
        assert!(is_expired(t0(), TimeDelta::zero(), t0()));
    }

    #[test]
    fn test_now_before_updated_at() {
        assert!(!is_expired(t0(), TimeDelta::seconds(1), t0() - TimeDelta::days(1)));
    }

    #[test]
    fn test_overflowing_deadline_never_expires() {
        assert!(!is_expired(t0(), TimeDelta::MAX, DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn test_underflowing_deadline_is_expired() {
        assert!(is_expired(t0(), TimeDelta::MIN, t0()));
        assert!(is_expired(t0(), TimeDelta::MIN, DateTime::<Utc>::MIN_UTC));
    }
}
