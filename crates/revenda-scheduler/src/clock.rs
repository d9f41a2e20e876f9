//! Wall-clock source pinned to the panel's civil timezone.
//!
//! The panel operates on GMT-3 regardless of where the process runs.
//! The offset is a hardcoded constant, not a named zone: schedule
//! matching and cohort math must not shift with the host timezone
//! database or anyone's DST rules.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use revenda_core::{Result, RevendaError};

/// Seconds west of UTC for the panel timezone (GMT-3).
const CIVIL_OFFSET_SECS: i32 = -3 * 3600;

/// The fixed civil offset. Statically valid.
pub fn civil_offset() -> FixedOffset {
    FixedOffset::east_opt(CIVIL_OFFSET_SECS).expect("offset within range")
}

/// Supplies the current instant. The one seam the tests replace.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    /// Current instant expressed in civil (GMT-3) wall-clock terms.
    fn civil_now(&self) -> DateTime<FixedOffset> {
        self.now_utc().with_timezone(&civil_offset())
    }

    /// Current civil time-of-day as `HH:MM`, the form campaign
    /// schedules are stored in.
    fn civil_time_string(&self) -> String {
        self.civil_now().format("%H:%M").to_string()
    }

    /// Today's civil calendar date.
    fn civil_date(&self) -> NaiveDate {
        self.civil_now().date_naive()
    }
}

/// Production clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Civil calendar date of an arbitrary instant.
pub fn civil_date_of(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&civil_offset()).date_naive()
}

/// The instant at which the civil day containing `instant` began
/// (00:00:00 GMT-3).
pub fn start_of_civil_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    let civil = instant.with_timezone(&civil_offset());
    civil
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| naive.and_local_timezone(civil_offset()).single())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(instant)
}

/// Parse a stored `HH:MM` schedule string.
pub fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| RevendaError::InvalidTime(s.to_string()))
}


#[cfg(test)]
mod tests {
    use super::testing::{civil_instant, FixedClock};
    use super::*;

    #[test]
    fn civil_strings_ignore_host_timezone() {
        // 2026-03-10 09:30 GMT-3 == 12:30 UTC.
        let clock = FixedClock(civil_instant(2026, 3, 10, 9, 30, 0));
        assert_eq!(clock.civil_time_string(), "09:30");
        assert_eq!(
            clock.civil_date(),
            NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
        );
        assert_eq!(clock.now_utc().format("%H:%M").to_string(), "12:30");
    }

    #[test]
    fn civil_date_rolls_over_at_civil_midnight_not_utc() {
        // 23:30 civil on the 9th is already 02:30 UTC on the 10th.
        let late = civil_instant(2026, 3, 9, 23, 30, 0);
        assert_eq!(
            civil_date_of(late),
            NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
        );
    }

    #[test]
    fn start_of_civil_day_is_civil_midnight() {
        let noon = civil_instant(2026, 3, 10, 12, 0, 0);
        assert_eq!(start_of_civil_day(noon), civil_instant(2026, 3, 10, 0, 0, 0));
    }

    #[test]
    fn parse_hhmm_accepts_schedule_strings() {
        assert_eq!(
            parse_hhmm("09:30").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert!(parse_hhmm("9h30").is_err());
        assert!(parse_hhmm("25:00").is_err());
    }
}
