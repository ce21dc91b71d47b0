//! Compact duration strings.
//!
//! Rule files express intervals as `<int>h<int>m<int>s` with every segment
//! optional but the order fixed, e.g. `"2h"`, `"10m30s"`, `"45s"`. This module
//! converts them to and from millisecond counts.

use crate::error::{AlertError, Result};

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;

/// Units in the only order they may appear.
const UNITS: [(char, u64); 3] = [('h', MS_PER_HOUR), ('m', MS_PER_MINUTE), ('s', MS_PER_SECOND)];

/// Parses a compact duration string into milliseconds.
///
/// Missing segments contribute zero. Surrounding whitespace is ignored.
///
/// # Errors
///
/// Returns [`AlertError::InvalidDurationFormat`] when the string is empty,
/// contains an unknown unit or a unit without a number, repeats a unit,
/// places units out of `h`, `m`, `s` order, ends with a bare number, or
/// overflows.
pub fn parse_duration(input: &str) -> Result<u64> {
    let s = input.trim();
    if s.is_empty() {
        return Err(AlertError::duration(input, "empty duration"));
    }

    let mut total: u64 = 0;
    let mut last_rank: Option<usize> = None;
    let mut number_start = 0;

    for (idx, ch) in s.char_indices() {
        if ch.is_ascii_digit() {
            continue;
        }

        let Some(rank) = UNITS.iter().position(|(unit, _)| *unit == ch) else {
            return Err(AlertError::duration(
                input,
                format!("unexpected character '{ch}'"),
            ));
        };

        let digits = &s[number_start..idx];
        if digits.is_empty() {
            return Err(AlertError::duration(
                input,
                format!("unit '{ch}' has no value"),
            ));
        }

        if last_rank.is_some_and(|last| last >= rank) {
            return Err(AlertError::duration(
                input,
                format!("unit '{ch}' is out of order (expected h, m, s)"),
            ));
        }

        let value: u64 = digits
            .parse()
            .map_err(|e| AlertError::duration(input, format!("bad value '{digits}': {e}")))?;

        total = value
            .checked_mul(UNITS[rank].1)
            .and_then(|ms| total.checked_add(ms))
            .ok_or_else(|| AlertError::duration(input, "duration overflows"))?;

        last_rank = Some(rank);
        number_start = idx + ch.len_utf8();
    }

    if number_start < s.len() {
        return Err(AlertError::duration(
            input,
            format!("trailing value '{}' has no unit", &s[number_start..]),
        ));
    }

    Ok(total)
}

/// Formats a millisecond count as the shortest compact duration string.
///
/// Sub-second remainders are truncated; zero renders as `"0s"`.
#[must_use]
pub fn format_duration(ms: u64) -> String {
    let mut remaining = ms - ms % MS_PER_SECOND;
    if remaining == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, unit_ms) in UNITS {
        let count = remaining / unit_ms;
        if count > 0 {
            out.push_str(&count.to_string());
            out.push(unit);
            remaining -= count * unit_ms;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("2h", 7_200_000 ; "hours only")]
    #[test_case("10m", 600_000 ; "minutes only")]
    #[test_case("45s", 45_000 ; "seconds only")]
    #[test_case("1h30m", 5_400_000 ; "hours and minutes")]
    #[test_case("10m30s", 630_000 ; "minutes and seconds")]
    #[test_case("1h2m3s", 3_723_000 ; "all segments")]
    #[test_case("0s", 0 ; "zero")]
    #[test_case(" 24h ", 86_400_000 ; "surrounding whitespace")]
    #[test_case("90m", 5_400_000 ; "minutes above an hour")]
    fn parse_valid(input: &str, expected: u64) {
        assert_eq!(parse_duration(input).unwrap(), expected);
    }

    #[test_case("" ; "empty")]
    #[test_case("   " ; "blank")]
    #[test_case("10" ; "bare number")]
    #[test_case("1h30" ; "trailing number")]
    #[test_case("h" ; "unit without value")]
    #[test_case("30m1h" ; "out of order")]
    #[test_case("1m1m" ; "repeated unit")]
    #[test_case("1.5h" ; "fractional value")]
    #[test_case("-1h" ; "negative value")]
    #[test_case("2d" ; "unknown unit")]
    #[test_case("99999999999999999999h" ; "overflow")]
    fn parse_invalid(input: &str) {
        let err = parse_duration(input).unwrap_err();
        assert!(matches!(err, AlertError::InvalidDurationFormat { .. }));
    }

    #[test_case(0, "0s")]
    #[test_case(999, "0s" ; "sub second truncates")]
    #[test_case(45_000, "45s")]
    #[test_case(3_600_000, "1h")]
    #[test_case(5_400_000, "1h30m")]
    #[test_case(3_723_000, "1h2m3s")]
    #[test_case(3_601_000, "1h1s" ; "skips empty minutes")]
    fn format_canonical(ms: u64, expected: &str) {
        assert_eq!(format_duration(ms), expected);
    }

    proptest! {
        #[test]
        fn prop_format_then_parse_is_identity(secs in 0u64..10_000_000) {
            let ms = secs * 1_000;
            prop_assert_eq!(parse_duration(&format_duration(ms)).unwrap(), ms);
        }

        #[test]
        fn prop_parse_never_panics(input in "[0-9hms .x-]{0,12}") {
            let _ = parse_duration(&input);
        }
    }
}
