use chrono::{Local, NaiveDateTime, TimeZone};
use serde::de::DeserializeOwned;
use std::fs;

use crate::error::{Error, Result};

/// Format accepted for earliest-start times, e.g. `2017-Jan-2-15:04`.
pub const START_TIME_FORMAT: &str = "%Y-%b-%d-%H:%M";

/// Parses a JSON file into a given type `T`.
///
/// This function reads a file from `file_path`, attempts to parse it
/// as JSON, and returns an instance of `T`.
///
/// Errors are automatically converted into `crate::error::Error` variants:
/// - `Error::IoError` if the file cannot be read.
/// - `Error::DeserializationError` if the JSON is malformed.
pub fn parse_json_file<T: DeserializeOwned>(file_path: &str) -> Result<T> {
    let data = fs::read_to_string(file_path).map_err(|e| Error::IoError(e))?;

    let parsed_data: T = serde_json::from_str(&data).map_err(|e| Error::DeserializationError(e))?;

    Ok(parsed_data)
}

/// Parses a reservation length such as `60m`, `1h30m`, `7d` or `4d6h30m`
/// into whole minutes.
///
/// A leading `<n>d` counts days of 24*60 minutes. The remainder is a
/// sequence of `<n>h`, `<n>m` and `<n>s` terms. Seconds are truncated.
pub fn parse_duration(input: &str) -> Result<i64> {
    let invalid = || Error::InvalidDuration(input.to_string());
    let text = input.trim();

    if text.is_empty() {
        return Err(invalid());
    }

    if text == "0" {
        return Ok(0);
    }

    let (days, rest) = match text.split_once('d') {
        Some((days, rest)) => (days.parse::<i64>().map_err(|_| invalid())?, rest),
        None => (0, text),
    };

    let mut seconds: i64 = days.checked_mul(24 * 60 * 60).ok_or_else(invalid)?;
    let mut number = String::new();

    for c in rest.chars() {
        if c.is_ascii_digit() {
            number.push(c);
            continue;
        }

        let unit = match c {
            'h' => 60 * 60,
            'm' => 60,
            's' => 1,
            _ => return Err(invalid()),
        };

        let value = number.parse::<i64>().map_err(|_| invalid())?;
        seconds = value.checked_mul(unit).and_then(|term| seconds.checked_add(term)).ok_or_else(invalid)?;
        number.clear();
    }

    if !number.is_empty() {
        return Err(invalid());
    }

    Ok(seconds / 60)
}

/// Parses an earliest-start time in local time, e.g. `2017-Jan-2-15:04`,
/// into unix seconds.
pub fn parse_start_time(input: &str) -> Result<i64> {
    let invalid = || Error::InvalidStartTime(input.to_string());

    let naive = NaiveDateTime::parse_from_str(input.trim(), START_TIME_FORMAT).map_err(|_| invalid())?;
    let local = Local.from_local_datetime(&naive).earliest().ok_or_else(invalid)?;

    Ok(local.timestamp())
}

/// Formats unix seconds in local time with the same format `parse_start_time` reads.
pub fn format_start_time(time: i64) -> String {
    match Local.timestamp_opt(time, 0).earliest() {
        Some(local) => local.format(START_TIME_FORMAT).to_string(),
        None => time.to_string(),
    }
}
