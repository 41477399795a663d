//! Time source and calendar windows.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, TimeZone, Utc};

/// Port for getting the current time.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// System clock using the OS time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// First instant of the calendar month containing `now`, as seen from `tz`.
///
/// The monthly window is `[start_of_month(now, tz), now]`.
pub fn start_of_month(now: DateTime<Utc>, tz: FixedOffset) -> DateTime<Utc> {
    let local = now.with_timezone(&tz);
    let first_day = local
        .date_naive()
        .with_day(1)
        .unwrap_or_else(|| local.date_naive());

    // A fixed offset never has gaps, so the mapping is always single.
    tz.from_local_datetime(&first_day.and_time(NaiveTime::MIN))
        .single()
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_start_of_month_utc() {
        let tz = FixedOffset::east_opt(0).unwrap();

        assert_eq!(
            start_of_month(utc("2025-03-17T10:42:13Z"), tz),
            utc("2025-03-01T00:00:00Z")
        );
        // First instant belongs to the new month.
        assert_eq!(
            start_of_month(utc("2025-04-01T00:00:00Z"), tz),
            utc("2025-04-01T00:00:00Z")
        );
        assert_eq!(
            start_of_month(utc("2025-03-31T23:59:59Z"), tz),
            utc("2025-03-01T00:00:00Z")
        );
    }

    #[test]
    fn test_start_of_month_with_offset() {
        // UTC+01:00, 23:30 UTC on the 31st is already April locally.
        let tz = FixedOffset::east_opt(3600).unwrap();
        assert_eq!(
            start_of_month(utc("2025-03-31T23:30:00Z"), tz),
            utc("2025-03-31T23:00:00Z")
        );

        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        assert_eq!(
            start_of_month(utc("2025-04-01T03:00:00Z"), tz),
            utc("2025-03-01T05:00:00Z")
        );
    }

    #[test]
    fn test_fixed_clock() {
        let now = utc("2025-01-15T12:00:00Z");
        assert_eq!(FixedClock(now).now(), now);
    }
}
