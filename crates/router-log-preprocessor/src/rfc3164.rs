// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Parser for the BSD syslog lines emitted by the router.
//!
//! The router sends one line per datagram in the RFC 3164 layout:
//!
//! ```text
//! <PRI>MMM D HH:MM:SS HOST [PROC[PID]: ]MSG
//! <30>Feb  2 13:02:57 GT-AX11000 dnsmasq-dhcp[23568]: DHCPDISCOVER(br0) ab:cd:ef:01:23:45
//! ```
//!
//! The timestamp carries no year; the current year is attached as-is.

use std::sync::OnceLock;

use chrono::{Datelike, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use crate::errors::ParseError;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const MAX_PRIORITY: u16 = 191;

fn line_regex() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| {
        #[allow(clippy::expect_used)]
        let regex = Regex::new(concat!(
            r"^<(?P<pri>\d{1,3})>",
            r"(?P<month>[A-Za-z]{3}) {1,2}(?P<day>\d{1,2}) ",
            r"(?P<hour>\d{2}):(?P<minute>\d{2}):(?P<second>\d{2}) ",
            r"(?P<host>\S+) ",
            r"(?:(?P<proc>[^\s:\[\]()]+)(?:\[(?P<pid>\d+)\]|\((?P<ppid>\d+)\))?: )?",
            r"(?P<msg>(?s:.*))$",
        ))
        .expect("syslog line regex is valid");
        regex
    })
}

/// A parsed syslog line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub facility: u8,
    pub severity: u8,
    /// Router wall-clock time with the year of reception attached.
    pub timestamp: NaiveDateTime,
    pub hostname: String,
    pub process: Option<String>,
    pub process_id: Option<u32>,
    pub message: String,
}

impl LogRecord {
    /// The priority value the record was sent with.
    #[must_use]
    pub fn priority(&self) -> u16 {
        u16::from(self.facility) * 8 + u16::from(self.severity)
    }

    /// Unix timestamp in whole seconds, reading `timestamp` as local time.
    #[must_use]
    pub fn clock(&self) -> i64 {
        match Local.from_local_datetime(&self.timestamp) {
            LocalResult::Single(dt) => dt.timestamp(),
            LocalResult::Ambiguous(earliest, _) => earliest.timestamp(),
            LocalResult::None => Utc.from_utc_datetime(&self.timestamp).timestamp(),
        }
    }
}

/// Parse a syslog line, attaching the current local year.
pub fn parse(raw: &str) -> Result<LogRecord, ParseError> {
    parse_with_year(raw, Local::now().year())
}

/// Parse a syslog line, attaching the given year.
pub fn parse_with_year(raw: &str, year: i32) -> Result<LogRecord, ParseError> {
    let line = raw.trim_end_matches(['\0', '\n', '\r']);
    let captures = line_regex()
        .captures(line)
        .ok_or_else(|| ParseError::Malformed(line.to_string()))?;

    // The regex only lets 1 to 3 digits through
    let priority: u16 = captures["pri"]
        .parse()
        .map_err(|_| ParseError::Malformed(line.to_string()))?;
    if priority > MAX_PRIORITY {
        return Err(ParseError::PriorityOutOfRange(priority));
    }

    let timestamp = timestamp_to_datetime(
        year,
        &captures["month"],
        &captures["day"],
        &captures["hour"],
        &captures["minute"],
        &captures["second"],
    )?;

    let process_id = captures
        .name("pid")
        .or_else(|| captures.name("ppid"))
        .map(|pid| {
            pid.as_str()
                .parse::<u32>()
                .map_err(|_| ParseError::Malformed(line.to_string()))
        })
        .transpose()?;

    Ok(LogRecord {
        facility: (priority / 8) as u8,
        severity: (priority % 8) as u8,
        timestamp,
        hostname: captures["host"].to_string(),
        process: captures.name("proc").map(|p| p.as_str().to_string()),
        process_id,
        message: captures["msg"].to_string(),
    })
}

/// Build the record timestamp from the textual parts of a syslog header.
pub fn timestamp_to_datetime(
    year: i32,
    month: &str,
    day: &str,
    hour: &str,
    minute: &str,
    second: &str,
) -> Result<NaiveDateTime, ParseError> {
    let month_number = MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(month))
        .ok_or_else(|| ParseError::InvalidMonth(month.to_string()))?;
    let invalid = || ParseError::InvalidTimestamp(format!("{month} {day} {hour}:{minute}:{second}"));

    let day: u32 = day.parse().map_err(|_| invalid())?;
    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    let minute: u32 = minute.parse().map_err(|_| invalid())?;
    let second: u32 = second.parse().map_err(|_| invalid())?;

    // position() is below 12, so the month fits
    NaiveDate::from_ymd_opt(year, month_number as u32 + 1, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .ok_or_else(invalid)
}
