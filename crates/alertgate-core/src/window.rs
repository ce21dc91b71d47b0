//! Day/night classification for repeat intervals.
//!
//! A [`DayWindow`] is a same-day `[start, end)` range of wall-clock time.
//! Wall-clock time is always taken in an explicit [`FixedOffset`] supplied by
//! configuration so that classification never depends on the host timezone.

use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{AlertError, Result};

/// Format of window bounds in rule files.
pub const TIME_OF_DAY_FORMAT: &str = "%H:%M:%S";

/// The daytime range of a repeat policy.
///
/// Deserialization goes through [`DayWindow::new`], so an unordered window
/// never exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDayWindow")]
pub struct DayWindow {
    start: NaiveTime,
    end: NaiveTime,
}

#[derive(Deserialize)]
struct RawDayWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl TryFrom<RawDayWindow> for DayWindow {
    type Error = AlertError;

    fn try_from(raw: RawDayWindow) -> Result<Self> {
        Self::new(raw.start, raw.end)
    }
}

const fn whole_hour(hour: u32) -> NaiveTime {
    match NaiveTime::from_hms_opt(hour, 0, 0) {
        Some(t) => t,
        None => NaiveTime::MIN,
    }
}

impl DayWindow {
    /// The built-in day: 10:00:00 to 23:00:00.
    pub const DEFAULT: Self = Self {
        start: whole_hour(10),
        end: whole_hour(23),
    };

    /// Creates a window from two times of day.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::MalformedTimeWindow`] unless `start < end`;
    /// windows crossing midnight are not supported.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if start >= end {
            return Err(AlertError::MalformedTimeWindow {
                reason: format!("start {start} is not before end {end}"),
            });
        }
        Ok(Self { start, end })
    }

    /// Parses a window from two `HH:MM:SS` literals.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::MalformedTimeWindow`] if either bound is not a
    /// valid time of day or the bounds are not ordered.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_time_of_day(start)?, parse_time_of_day(end)?)
    }

    /// Start of the day range (inclusive).
    #[must_use]
    pub const fn start(&self) -> NaiveTime {
        self.start
    }

    /// End of the day range (exclusive).
    #[must_use]
    pub const fn end(&self) -> NaiveTime {
        self.end
    }

    /// Returns true if `time` lies in `[start, end)`.
    #[must_use]
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.start && time < self.end
    }
}

impl fmt::Display for DayWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format(TIME_OF_DAY_FORMAT),
            self.end.format(TIME_OF_DAY_FORMAT)
        )
    }
}

/// Parses an `HH:MM:SS` literal.
///
/// # Errors
///
/// Returns [`AlertError::MalformedTimeWindow`] if the literal is not a valid
/// time of day.
pub fn parse_time_of_day(literal: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(literal.trim(), TIME_OF_DAY_FORMAT).map_err(|e| {
        AlertError::MalformedTimeWindow {
            reason: format!("'{literal}' is not HH:MM:SS: {e}"),
        }
    })
}

/// Returns true if `now` falls in the daytime regime.
///
/// With `use_night_at_weekend`, Saturdays and Sundays (in `offset`) are always
/// night. Otherwise the wall-clock time in `offset` is tested against `window`.
#[must_use]
pub fn is_day_time(
    now: DateTime<Utc>,
    window: &DayWindow,
    use_night_at_weekend: bool,
    offset: FixedOffset,
) -> bool {
    let local = now.with_timezone(&offset);
    if use_night_at_weekend && matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    window.contains(local.time())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn window() -> DayWindow {
        DayWindow::parse("10:00:00", "23:00:00").unwrap()
    }

    // 2024-01-08 is a Monday, 2024-01-06 a Saturday.
    fn at(day: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, h, m, s).unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    mod window_tests {
        use super::*;
        use test_case::test_case;

        #[test]
        fn deserialize_checks_order() {
            let ok: DayWindow =
                serde_json::from_str(r#"{"start": "09:00:00", "end": "18:00:00"}"#).unwrap();
            assert_eq!(ok.to_string(), "09:00:00-18:00:00");

            let err = serde_json::from_str::<DayWindow>(r#"{"start": "23:00:00", "end": "10:00:00"}"#)
                .unwrap_err();
            assert!(err.to_string().contains("malformed time window"));
        }

        #[test]
        fn serialized_window_reads_back() {
            let json = serde_json::to_string(&DayWindow::DEFAULT).unwrap();
            assert_eq!(serde_json::from_str::<DayWindow>(&json).unwrap(), DayWindow::DEFAULT);
        }

        #[test]
        fn parse_valid_window() {
            let w = window();
            assert_eq!(w.start(), NaiveTime::from_hms_opt(10, 0, 0).unwrap());
            assert_eq!(w.end(), NaiveTime::from_hms_opt(23, 0, 0).unwrap());
            assert_eq!(w.to_string(), "10:00:00-23:00:00");
        }

        #[test_case("23:00:00", "10:00:00" ; "crosses midnight")]
        #[test_case("10:00:00", "10:00:00" ; "empty range")]
        #[test_case("25:00:00", "26:00:00" ; "out of range hour")]
        #[test_case("10:00", "23:00:00" ; "missing seconds")]
        #[test_case("ten", "23:00:00" ; "not a time")]
        fn parse_rejects(start: &str, end: &str) {
            let err = DayWindow::parse(start, end).unwrap_err();
            assert!(matches!(err, AlertError::MalformedTimeWindow { .. }));
        }

        #[test]
        fn contains_is_half_open() {
            let w = window();
            assert!(w.contains(NaiveTime::from_hms_opt(10, 0, 0).unwrap()));
            assert!(w.contains(NaiveTime::from_hms_opt(22, 59, 59).unwrap()));
            assert!(!w.contains(NaiveTime::from_hms_opt(23, 0, 0).unwrap()));
            assert!(!w.contains(NaiveTime::from_hms_opt(9, 59, 59).unwrap()));
        }
    }

    mod classifier_tests {
        use super::*;
        use test_case::test_case;

        #[test_case(at(8, 12, 0, 0), true ; "weekday noon")]
        #[test_case(at(8, 10, 0, 0), true ; "weekday window start")]
        #[test_case(at(8, 23, 0, 0), false ; "weekday window end")]
        #[test_case(at(8, 3, 0, 0), false ; "weekday night")]
        #[test_case(at(6, 12, 0, 0), false ; "saturday noon")]
        #[test_case(at(7, 12, 0, 0), false ; "sunday noon")]
        fn classify_with_weekend_nights(now: DateTime<Utc>, expected: bool) {
            assert_eq!(is_day_time(now, &window(), true, utc()), expected);
        }

        #[test]
        fn weekend_uses_window_when_override_disabled() {
            assert!(is_day_time(at(6, 12, 0, 0), &window(), false, utc()));
            assert!(!is_day_time(at(6, 3, 0, 0), &window(), false, utc()));
        }

        #[test]
        fn offset_shifts_time_of_day() {
            // 08:00 UTC is 11:00 at +03:00.
            let plus_three = FixedOffset::east_opt(3 * 3600).unwrap();
            assert!(!is_day_time(at(8, 8, 0, 0), &window(), true, utc()));
            assert!(is_day_time(at(8, 8, 0, 0), &window(), true, plus_three));
        }

        #[test]
        fn offset_shifts_weekday() {
            // Friday 22:00 UTC is already Saturday at +03:00.
            let plus_three = FixedOffset::east_opt(3 * 3600).unwrap();
            assert!(is_day_time(at(5, 22, 0, 0), &window(), true, utc()));
            assert!(!is_day_time(at(5, 22, 0, 0), &window(), true, plus_three));
        }
    }

    proptest! {
        #[test]
        fn prop_weekend_is_always_night(
            weekend_day in prop::sample::select(vec![6u32, 7, 13, 14]),
            secs in 0u32..86_400,
            offset_hours in -12i32..=12,
        ) {
            let offset = FixedOffset::east_opt(offset_hours * 3600).unwrap();
            // Build the instant in local time so the weekday is the local one.
            let local = offset
                .with_ymd_and_hms(2024, 1, weekend_day, secs / 3600, (secs / 60) % 60, secs % 60)
                .unwrap();
            let now = local.with_timezone(&Utc);
            prop_assert!(!is_day_time(now, &window(), true, offset));
        }
    }
}
