//! Timestamp prefixes embedded in delta file names.
//!
//! Every delta file starts with a fixed-width UTC timestamp:
//!
//! ```text
//! YYYY-MM-DD-HH-MM-SS-NNNNNNNNN[-<action>]<suffix>
//! 2024-03-02-00-00-00-000000000-delete.grn
//! ```
//!
//! The nine trailing digits are the nanosecond fraction. The optional
//! action is a run of ASCII word characters (`[A-Za-z0-9_]`). Whatever
//! follows is returned untouched as the suffix (`.grn`, `.parquet`, or
//! nothing at all for packed bundles).

use chrono::{DateTime, NaiveDate, Utc};

/// Width of the `YYYY-MM-DD-HH-MM-SS-NNNNNNNNN` prefix.
const PREFIX_LEN: usize = 29;

/// `(offset, width)` of each numeric field in the prefix.
const FIELDS: [(usize, usize); 7] = [(0, 4), (5, 2), (8, 2), (11, 2), (14, 2), (17, 2), (20, 9)];

/// The parsed parts of a delta file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaName<'a> {
    /// Timestamp encoded in the prefix.
    pub timestamp: DateTime<Utc>,
    /// Action tag following the timestamp, e.g. `delete`.
    pub action: Option<&'a str>,
    /// Everything after the prefix and action.
    pub suffix: &'a str,
}

/// The prefix had the right shape but does not name a real instant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid timestamp in file name '{name}'")]
pub struct TimestampError {
    /// The offending file name.
    pub name: String,
}

/// Parse a delta file name.
///
/// Returns `Ok(None)` when the name does not start with a timestamp prefix
/// at all (an unrelated file), and `Err` when the prefix is well-formed but
/// its components are out of range (month 13, February 30, hour 24, ...).
/// Neither case is fatal to discovery; callers skip the file.
///
/// # Errors
///
/// Returns [`TimestampError`] if the date or time components are invalid.
pub fn parse_timestamp(name: &str) -> Result<Option<DeltaName<'_>>, TimestampError> {
    let bytes = name.as_bytes();
    if bytes.len() < PREFIX_LEN {
        return Ok(None);
    }

    let mut values = [0u32; 7];
    for (value, (offset, width)) in values.iter_mut().zip(FIELDS) {
        let digits = &bytes[offset..offset + width];
        if !digits.iter().all(u8::is_ascii_digit) {
            return Ok(None);
        }
        *value = digits
            .iter()
            .fold(0, |acc, digit| acc * 10 + u32::from(digit - b'0'));
        if offset + width < PREFIX_LEN && bytes[offset + width] != b'-' {
            return Ok(None);
        }
    }

    let [year, month, day, hour, minute, second, nanosecond] = values;
    // Four digits always fit in an i32.
    #[allow(clippy::cast_possible_wrap)]
    let timestamp = NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|date| date.and_hms_nano_opt(hour, minute, second, nanosecond))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| TimestampError {
            name: name.to_string(),
        })?;

    let rest = &name[PREFIX_LEN..];
    let (action, suffix) = split_action(rest);

    Ok(Some(DeltaName {
        timestamp,
        action,
        suffix,
    }))
}

/// Split an optional `-<word>` action off the remainder.
fn split_action(rest: &str) -> (Option<&str>, &str) {
    let Some(tail) = rest.strip_prefix('-') else {
        return (None, rest);
    };
    let word_len = tail
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
        .count();
    if word_len == 0 {
        return (None, rest);
    }
    (Some(&tail[..word_len]), &tail[word_len..])
}

/// Format a timestamp back into the file name prefix form.
#[must_use]
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d-%H-%M-%S-%9f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_plain_script() {
        let parsed = parse_timestamp("2024-01-02-03-04-05-000000006.grn")
            .unwrap()
            .unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::nanoseconds(6);
        assert_eq!(parsed.timestamp, expected);
        assert_eq!(parsed.action, None);
        assert_eq!(parsed.suffix, ".grn");
    }

    #[test]
    fn test_parse_action() {
        let parsed = parse_timestamp("2024-03-02-00-00-00-000000000-delete.grn")
            .unwrap()
            .unwrap();
        assert_eq!(parsed.action, Some("delete"));
        assert_eq!(parsed.suffix, ".grn");
    }

    #[test]
    fn test_parse_bare_prefix() {
        let parsed = parse_timestamp("2024-01-02-00-00-00-000000000")
            .unwrap()
            .unwrap();
        assert_eq!(parsed.action, None);
        assert!(parsed.suffix.is_empty());
    }

    #[test]
    fn test_parse_dash_without_word_is_suffix() {
        let parsed = parse_timestamp("2024-01-02-00-00-00-000000000-.grn")
            .unwrap()
            .unwrap();
        assert_eq!(parsed.action, None);
        assert_eq!(parsed.suffix, "-.grn");
    }

    #[test]
    fn test_unrelated_names_are_not_deltas() {
        for name in [
            "notes.txt",
            "",
            "packed",
            "2024-01-02",
            "2024-01-02-00-00-00-00000000.grn",
            "2024/01/02-00-00-00-000000000.grn",
            "x2024-01-02-00-00-00-000000000.grn",
        ] {
            assert_eq!(parse_timestamp(name), Ok(None), "{name}");
        }
    }

    #[test]
    fn test_out_of_range_components_are_rejected() {
        for name in [
            "2024-13-01-00-00-00-000000000.grn",
            "2024-02-30-00-00-00-000000000.grn",
            "2024-01-01-24-00-00-000000000.grn",
            "2024-01-01-00-60-00-000000000.grn",
            "2024-01-01-00-00-61-000000000.grn",
        ] {
            assert!(parse_timestamp(name).is_err(), "{name}");
        }
    }

    #[test]
    fn test_ordering_follows_nanoseconds() {
        let a = parse_timestamp("2024-01-01-00-00-00-000000001").unwrap().unwrap();
        let b = parse_timestamp("2024-01-01-00-00-00-000000002").unwrap().unwrap();
        assert!(a.timestamp < b.timestamp);
    }

    #[test]
    fn test_format_matches_prefix() {
        let name = "2024-01-02-03-04-05-123456789";
        let parsed = parse_timestamp(name).unwrap().unwrap();
        assert_eq!(format_timestamp(&parsed.timestamp), name);
    }
}
