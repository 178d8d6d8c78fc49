use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};

// Input formats accepted for dates and datetimes, tried in order. Daily
// formats come first; the stamp format is included so control files can use
// it for the simulation window.
const INPUT_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y%m%d_%H%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parses a date or datetime string, trying each known input format in turn.
/// Date-only matches are taken as midnight. Returns the wrapped u64 timestamp
/// together with the format that matched, so a caller parsing a whole column
/// can reuse the format for the remaining rows.
pub fn date_string_to_u64_flexible(date_str: &str) -> Result<(u64, &'static str), String> {
    for format in INPUT_FORMATS {
        let parsed = NaiveDateTime::parse_from_str(date_str, format).or_else(|_| {
            NaiveDate::parse_from_str(date_str, format)
                .map(|date| date.and_hms_opt(0, 0, 0).unwrap())
        });
        if let Ok(dt) = parsed {
            return Ok((wrap_to_u64(dt.and_utc().timestamp()), format));
        }
    }
    Err(format!("Unrecognised date '{}'", date_str))
}

/// Formats a u64 timestamp as a `YYYYMMDD_HHmm` stamp.
///
/// This is the key format for the engineered discharge table and for every
/// timestamped state file, independent of locale.
pub fn u64_to_stamp(value: u64) -> String {
    match DateTime::from_timestamp(wrap_to_i64(value), 0) {
        Some(dt) => format!(
            "{:04}{:02}{:02}_{:02}{:02}",
            dt.year(),
            dt.month(),
            dt.day(),
            dt.hour(),
            dt.minute()
        ),
        None => value.to_string(),
    }
}

/// Parses a `YYYYMMDD_HHmm` stamp back into a u64 timestamp.
pub fn stamp_to_u64(stamp: &str) -> Result<u64, String> {
    match NaiveDateTime::parse_from_str(stamp, "%Y%m%d_%H%M") {
        Ok(dt) => Ok(wrap_to_u64(dt.and_utc().timestamp())),
        Err(e) => Err(format!("Failed to parse stamp '{}': {}", stamp, e)),
    }
}

/// Renders a timestamp for CSV output: `YYYY-MM-DD` when the value falls on
/// midnight, a full `YYYY-MM-DDTHH:MM:SS` otherwise.
pub fn u64_to_auto_datetime_string(value: u64) -> String {
    let dt = match DateTime::from_timestamp(wrap_to_i64(value), 0) {
        Some(dt) => dt,
        None => return format!("INVALID_TIMESTAMP_{}", value),
    };
    let format = if dt.num_seconds_from_midnight() == 0 {
        "%Y-%m-%d"
    } else {
        "%Y-%m-%dT%H:%M:%S"
    };
    dt.format(format).to_string()
}

/// Timestamp rendering for the commented headers of snapshot files.
pub fn u64_to_iso_datetime_string(value: u64) -> String {
    match DateTime::from_timestamp(wrap_to_i64(value), 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => value.to_string(),
    }
}

/// Substitutes date tokens in a forcing file name pattern. The supported tokens
/// are YYYY, MM, DD, HH and UU (minute), each replaced with the zero-padded
/// component of the given time. Tokens are substituted everywhere they appear.
pub fn stamped_name(pattern: &str, value: u64) -> String {
    match DateTime::from_timestamp(wrap_to_i64(value), 0) {
        Some(dt) => pattern
            .replace("YYYY", &format!("{:04}", dt.year()))
            .replace("MM", &format!("{:02}", dt.month()))
            .replace("DD", &format!("{:02}", dt.day()))
            .replace("HH", &format!("{:02}", dt.hour()))
            .replace("UU", &format!("{:02}", dt.minute())),
        None => pattern.to_string(),
    }
}

pub fn wrap_to_u64(x: i64) -> u64 {
    (x as u64).wrapping_add(u64::MAX/2 + 1)
}

pub fn wrap_to_i64(x: u64) -> i64 {
    x.wrapping_sub(u64::MAX/2 + 1) as i64
}
