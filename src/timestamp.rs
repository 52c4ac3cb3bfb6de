/**
 * Capture timestamp value as stored in EXIF DateTimeOriginal
 */

use chrono::{Datelike, NaiveDateTime, Timelike};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Second-granularity capture time without timezone.
///
/// Only the digit layout `YYYY:MM:DD HH:MM:SS` is checked when parsing; the
/// calendar itself is not validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaptureTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

fn exif_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{4}):(\d{2}):(\d{2}) (\d{2}):(\d{2}):(\d{2})$")
            .expect("invalid timestamp regex")
    })
}

impl CaptureTimestamp {
    /// Parse an EXIF ASCII value. Returns `None` for anything malformed.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        let caps = exif_pattern().captures(trimmed)?;
        let field = |i: usize| caps.get(i).map(|m| m.as_str());
        Some(Self {
            year: field(1)?.parse().ok()?,
            month: field(2)?.parse().ok()?,
            day: field(3)?.parse().ok()?,
            hour: field(4)?.parse().ok()?,
            minute: field(5)?.parse().ok()?,
            second: field(6)?.parse().ok()?,
        })
    }

    /// Parse raw EXIF ASCII bytes.
    pub fn from_exif_bytes(bytes: &[u8]) -> Option<Self> {
        std::str::from_utf8(bytes).ok().and_then(Self::parse)
    }

    /// Filename form: `2021:05:03 10:15:02` -> `2021-05-03_10-15-02`.
    pub fn sanitized(&self) -> String {
        self.to_string().replace(':', "-").replace(' ', "_")
    }

    pub fn year_bucket(&self) -> String {
        format!("{:04}", self.year)
    }
}

impl From<NaiveDateTime> for CaptureTimestamp {
    fn from(dt: NaiveDateTime) -> Self {
        Self {
            year: dt.year().clamp(0, 9999) as u16,
            month: dt.month() as u8,
            day: dt.day() as u8,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
        }
    }
}

impl fmt::Display for CaptureTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}:{:02}:{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parses_exif_layout() {
        let ts = CaptureTimestamp::parse("2021:05:03 10:15:02").unwrap();
        assert_eq!(ts.year, 2021);
        assert_eq!(ts.month, 5);
        assert_eq!(ts.second, 2);
        assert_eq!(ts.to_string(), "2021:05:03 10:15:02");
    }

    #[test]
    fn tolerates_nul_terminator_and_padding() {
        assert!(CaptureTimestamp::from_exif_bytes(b"2019:12:31 23:59:59\0").is_some());
        assert!(CaptureTimestamp::parse("  2019:12:31 23:59:59 ").is_some());
    }

    #[test]
    fn malformed_values_are_absent() {
        assert_eq!(CaptureTimestamp::parse(""), None);
        assert_eq!(CaptureTimestamp::parse("    :  :     :  :  "), None);
        assert_eq!(CaptureTimestamp::parse("2021-05-03 10:15:02"), None);
        assert_eq!(CaptureTimestamp::parse("2021:5:3 10:15:02"), None);
        assert_eq!(CaptureTimestamp::parse("2021:05:03T10:15:02"), None);
    }

    #[test]
    fn calendar_is_not_validated() {
        let ts = CaptureTimestamp::parse("0000:00:00 00:00:00").unwrap();
        assert_eq!(ts.year_bucket(), "0000");
    }

    #[test]
    fn sanitized_filename_form() {
        let ts = CaptureTimestamp::parse("2021:05:03 10:15:02").unwrap();
        assert_eq!(ts.sanitized(), "2021-05-03_10-15-02");
        assert_eq!(ts.year_bucket(), "2021");
    }

    #[test]
    fn converts_from_chrono() {
        let dt = NaiveDate::from_ymd_opt(2020, 1, 2)
            .unwrap()
            .and_hms_opt(0, 1, 1)
            .unwrap();
        assert_eq!(CaptureTimestamp::from(dt).to_string(), "2020:01:02 00:01:01");
    }
}
