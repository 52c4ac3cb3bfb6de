/**
 * Capture-date stamping for images that were never dated (scans, exports)
 *
 * Each written file gets the chosen date plus one second per file already
 * stamped in this run, so the files keep a stable order once organized.
 */

use anyhow::{bail, Context};
use chrono::{Duration, NaiveDate};
use log::{info, warn};
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::error::{OrganizeError, Result};
use crate::events::{Event, EventSink};
use crate::exif::{MetadataCodec, WriteOutcome};
use crate::scanner;
use crate::summary::FileIssue;
use crate::timestamp::CaptureTimestamp;

/// One second per file: a day holds this many distinct timestamps.
pub const MAX_STAMPS_PER_DAY: usize = 24 * 60 * 60;

/// Parse a `YYYY:MM:DD` date argument.
pub fn parse_stamp_date(value: &str) -> anyhow::Result<NaiveDate> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"^\d{4}:\d{2}:\d{2}$").expect("invalid date regex"));
    if !pattern.is_match(value) {
        bail!("Date format incorrect, expected YYYY:MM:DD: {}", value);
    }
    NaiveDate::parse_from_str(value, "%Y:%m:%d").with_context(|| format!("Invalid date: {}", value))
}

#[derive(Debug, Clone)]
pub struct StampConfig {
    pub input_dir: PathBuf,
    pub date: NaiveDate,
    pub recursive: bool,
    /// Replace capture timestamps that are already present.
    pub overwrite: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StampSummary {
    pub discovered: usize,
    pub stamped: usize,
    pub already_set: usize,
    pub failures: Vec<FileIssue>,
    pub limit_reached: bool,
}

/// Timestamp for the `index`-th stamped file of the day.
pub fn timestamp_for(date: NaiveDate, index: usize) -> CaptureTimestamp {
    let seconds = (index % MAX_STAMPS_PER_DAY) as i64;
    CaptureTimestamp::from(date.and_time(chrono::NaiveTime::MIN) + Duration::seconds(seconds))
}

/// Write sequential capture timestamps onto the images under `input_dir`.
pub fn stamp_directory(
    config: &StampConfig,
    codec: &dyn MetadataCodec,
    sink: &dyn EventSink,
) -> Result<StampSummary> {
    if !config.input_dir.is_dir() {
        return Err(OrganizeError::precondition(&config.input_dir, "specified directory was not found"));
    }

    let mut files: Vec<PathBuf> = scanner::scan(&config.input_dir, config.recursive).collect();
    files.sort();
    info!("Found {} files. Processing...", files.len());
    sink.record(Event::RunStarted {
        input: config.input_dir.clone(),
        discovered: files.len(),
    });

    let mut summary = StampSummary {
        discovered: files.len(),
        ..StampSummary::default()
    };

    for path in &files {
        if summary.stamped == MAX_STAMPS_PER_DAY {
            warn!("Maximum number of images reached for this day.");
            summary.limit_reached = true;
            break;
        }
        sink.record(Event::FileStarted { path: path.clone() });

        let timestamp = timestamp_for(config.date, summary.stamped);
        match codec.write(path, timestamp, config.overwrite) {
            Ok(WriteOutcome::Written) => {
                summary.stamped += 1;
                sink.record(Event::Stamped { path: path.clone(), timestamp: timestamp.to_string() });
            }
            Ok(WriteOutcome::AlreadySet) => {
                summary.already_set += 1;
                sink.record(Event::Skipped {
                    path: path.clone(),
                    reason: "file already has a capture timestamp".to_string(),
                });
            }
            Err(e) => {
                let reason = e.to_string();
                summary.failures.push(FileIssue { path: path.clone(), reason: reason.clone() });
                sink.record(Event::Failed { path: path.clone(), reason });
            }
        }
    }

    sink.record(Event::RunFinished {
        transformed: summary.stamped,
        skipped: summary.already_set,
        failed: summary.failures.len(),
        total: summary.discovered,
    });
    Ok(summary)
}
