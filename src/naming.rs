/**
 * File naming and placement module
 */

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{OrganizeError, Result};
use crate::timestamp::CaptureTimestamp;

/// Bucket for images without a usable capture timestamp.
pub const FALLBACK_BUCKET: &str = "Other";

/// One file under consideration.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub path: PathBuf,
    /// Lower-cased extension.
    pub extension: String,
    pub timestamp: Option<CaptureTimestamp>,
    pub raw_metadata: Option<Vec<u8>>,
}

impl ImageRecord {
    pub fn new(path: PathBuf) -> Self {
        let extension = crate::scanner::extension_of(&path).unwrap_or_default();
        Self {
            path,
            extension,
            timestamp: None,
            raw_metadata: None,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Where destination buckets live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementMode {
    /// `<root>/<YYYY>/`, or `<root>/Other/` without a timestamp.
    ByYear { root: PathBuf },
    /// Everything goes into one directory.
    Flat { dir: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameStyle {
    /// Sanitized timestamp plus the original extension, when a timestamp exists.
    #[default]
    Timestamp,
    /// Keep the source file name.
    Original,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementDecision {
    pub bucket: PathBuf,
    pub file_name: String,
}

impl PlacementDecision {
    pub fn desired_path(&self) -> PathBuf {
        self.bucket.join(&self.file_name)
    }
}

/// Decide bucket and file name for `record`. Pure: touches no files.
pub fn plan(record: &ImageRecord, mode: &PlacementMode, style: NameStyle) -> PlacementDecision {
    let bucket = match mode {
        PlacementMode::ByYear { root } => match &record.timestamp {
            Some(ts) => root.join(ts.year_bucket()),
            None => root.join(FALLBACK_BUCKET),
        },
        PlacementMode::Flat { dir } => dir.clone(),
    };

    let file_name = match (style, &record.timestamp) {
        (NameStyle::Timestamp, Some(ts)) => {
            // keep the extension exactly as the source spells it
            match record.path.extension() {
                Some(ext) => format!("{}.{}", ts.sanitized(), ext.to_string_lossy()),
                None => ts.sanitized(),
            }
        }
        _ => record.file_name(),
    };

    PlacementDecision { bucket, file_name }
}

/// Create the bucket if missing. Returns `true` when it was newly created.
///
/// Safe to call concurrently for the same bucket.
pub fn ensure_bucket(bucket: &Path) -> Result<bool> {
    if bucket.is_dir() {
        return Ok(false);
    }
    fs::create_dir_all(bucket).map_err(|e| OrganizeError::io(bucket, e))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(path: &str, ts: Option<&str>) -> ImageRecord {
        let mut record = ImageRecord::new(PathBuf::from(path));
        record.timestamp = ts.and_then(CaptureTimestamp::parse);
        record
    }

    #[test]
    fn dated_file_goes_to_year_bucket() {
        let mode = PlacementMode::ByYear { root: PathBuf::from("/out") };
        let decision = plan(&record("/in/IMG_1.jpg", Some("2021:05:03 10:15:02")), &mode, NameStyle::Timestamp);

        assert_eq!(decision.bucket, PathBuf::from("/out/2021"));
        assert_eq!(decision.file_name, "2021-05-03_10-15-02.jpg");
        assert_eq!(decision.desired_path(), PathBuf::from("/out/2021/2021-05-03_10-15-02.jpg"));
    }

    #[test]
    fn undated_file_goes_to_other_with_original_name() {
        let mode = PlacementMode::ByYear { root: PathBuf::from("/out") };
        let decision = plan(&record("/in/IMG_2.JPEG", None), &mode, NameStyle::Timestamp);

        assert_eq!(decision.bucket, PathBuf::from("/out/Other"));
        assert_eq!(decision.file_name, "IMG_2.JPEG");
    }

    #[test]
    fn extension_case_is_preserved() {
        let mode = PlacementMode::Flat { dir: PathBuf::from("/flat") };
        let decision = plan(&record("/in/IMG_3.JPG", Some("1999:12:31 23:59:59")), &mode, NameStyle::Timestamp);

        assert_eq!(decision.bucket, PathBuf::from("/flat"));
        assert_eq!(decision.file_name, "1999-12-31_23-59-59.JPG");
        assert_eq!(record("/in/IMG_3.JPG", None).extension, "jpg");
    }

    #[test]
    fn original_style_keeps_name() {
        let mode = PlacementMode::ByYear { root: PathBuf::from("/out") };
        let decision = plan(&record("/in/IMG_4.png", Some("2003:03:03 03:03:03")), &mode, NameStyle::Original);

        assert_eq!(decision.bucket, PathBuf::from("/out/2003"));
        assert_eq!(decision.file_name, "IMG_4.png");
    }

    #[test]
    fn ensure_bucket_is_idempotent() {
        let dir = tempdir().unwrap();
        let bucket = dir.path().join("2020");

        assert!(ensure_bucket(&bucket).unwrap());
        assert!(!ensure_bucket(&bucket).unwrap());
        assert!(bucket.is_dir());
    }
}
