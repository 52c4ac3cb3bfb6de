/**
 * EXIF processing module
 *
 * Reads and writes the capture timestamp (DateTimeOriginal) of an image.
 * A missing or damaged Exif block is reported as `None`; only files that are
 * not a readable image container are errors.
 */

use exif::{Exif, In, Reader as ExifReader, Tag, Value};
use log::debug;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use crate::error::{OrganizeError, Result};
use crate::exif_writer::{self, ContainerFormat};
use crate::timestamp::CaptureTimestamp;

/// Metadata extracted from one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageMetadata {
    pub timestamp: Option<CaptureTimestamp>,
    /// Raw Exif (TIFF) block, carried through resizes untouched.
    pub raw: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// A capture timestamp was already present and overwriting was not requested.
    AlreadySet,
}

/// Reads and writes the capture timestamp embedded in an image.
pub trait MetadataCodec: Send + Sync {
    fn read(&self, path: &Path) -> Result<ImageMetadata>;

    /// Rewrites the file in place. Not atomic: a crash mid-write can corrupt it.
    fn write(
        &self,
        path: &Path,
        timestamp: CaptureTimestamp,
        overwrite_existing: bool,
    ) -> Result<WriteOutcome>;
}

/// kamadak-exif backed codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifCodec;

impl ExifCodec {
    pub fn new() -> Self {
        Self
    }
}

/// DateTimeOriginal of a parsed Exif block, if well formed.
pub fn capture_timestamp(exif: &Exif) -> Option<CaptureTimestamp> {
    let field = exif.get_field(Tag::DateTimeOriginal, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(values) => values
            .first()
            .and_then(|v| CaptureTimestamp::from_exif_bytes(v)),
        _ => None,
    }
}

/// Parse the Exif block of an in-memory container.
///
/// Fields that fail to parse are dropped and the rest kept. `Ok(None)` when
/// the container has no Exif block at all.
fn parse_exif(bytes: &[u8]) -> std::result::Result<Option<Exif>, exif::Error> {
    let mut reader = ExifReader::new();
    reader.continue_on_error(true);
    match reader.read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => Ok(Some(exif)),
        Err(exif::Error::NotFound(_)) => Ok(None),
        Err(e) => e
            .distill_partial_result(|errors| {
                for err in errors {
                    debug!("Ignoring damaged Exif field: {}", err);
                }
            })
            .map(Some),
    }
}

impl MetadataCodec for ExifCodec {
    fn read(&self, path: &Path) -> Result<ImageMetadata> {
        debug!("Reading metadata: {}", path.display());

        let bytes = fs::read(path).map_err(|e| OrganizeError::io(path, e))?;

        let exif = match parse_exif(&bytes) {
            Ok(exif) => exif,
            // a damaged Exif block inside a readable image counts as no metadata
            Err(e) if ContainerFormat::detect(&bytes).is_some() => {
                debug!("Unreadable Exif block in {}: {}", path.display(), e);
                None
            }
            Err(e) => return Err(OrganizeError::decode(path, e)),
        };

        let Some(exif) = exif else {
            debug!("No Exif block in {}", path.display());
            return Ok(ImageMetadata::default());
        };

        let timestamp = capture_timestamp(&exif);
        if timestamp.is_none() {
            debug!("No usable DateTimeOriginal in {}", path.display());
        }
        Ok(ImageMetadata {
            timestamp,
            raw: Some(exif.buf().to_vec()),
        })
    }

    fn write(
        &self,
        path: &Path,
        timestamp: CaptureTimestamp,
        overwrite_existing: bool,
    ) -> Result<WriteOutcome> {
        let bytes = fs::read(path).map_err(|e| OrganizeError::io(path, e))?;
        let format = ContainerFormat::detect(&bytes)
            .ok_or_else(|| OrganizeError::encode(path, "unsupported container format"))?;

        // a damaged block is replaced wholesale
        let existing = parse_exif(&bytes).unwrap_or_else(|e| {
            debug!("Discarding unreadable Exif block in {}: {}", path.display(), e);
            None
        });

        if !overwrite_existing && existing.as_ref().and_then(capture_timestamp).is_some() {
            debug!("{} already has a capture timestamp, skipping", path.display());
            return Ok(WriteOutcome::AlreadySet);
        }

        let blob = exif_writer::build_exif_blob(existing.as_ref(), timestamp)
            .map_err(|e| OrganizeError::encode(path, format!("{:#}", e)))?;

        let updated = match format {
            ContainerFormat::Jpeg => exif_writer::splice_jpeg(&bytes, &blob),
            ContainerFormat::Png => exif_writer::reencode_png(&bytes, &blob),
        }
        .map_err(|e| OrganizeError::encode(path, format!("{:#}", e)))?;

        fs::write(path, updated).map_err(|e| OrganizeError::io(path, e))?;
        debug!("Wrote DateTimeOriginal {} to {}", timestamp, path.display());
        Ok(WriteOutcome::Written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    fn save_plain(path: &Path) {
        RgbImage::from_pixel(8, 6, Rgb([10, 120, 30])).save(path).unwrap();
    }

    /// A valid JPEG whose Exif APP1 points its first IFD far past the end.
    fn save_with_damaged_exif(path: &Path) {
        save_plain(path);
        let jpeg = fs::read(path).unwrap();
        let payload: &[u8] = b"Exif\0\0II*\0\xff\xff\xff\x7f";
        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out.extend_from_slice(&jpeg[2..]);
        fs::write(path, out).unwrap();
    }

    #[test]
    fn image_without_exif_has_no_timestamp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.jpg");
        save_plain(&path);

        let meta = ExifCodec::new().read(&path).unwrap();
        assert_eq!(meta.timestamp, None);
        assert_eq!(meta.raw, None);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        fs::write(&path, b"definitely not an image").unwrap();

        let err = ExifCodec::new().read(&path).unwrap_err();
        assert!(matches!(err, OrganizeError::Decode { .. }));
    }

    #[test]
    fn damaged_exif_reads_as_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("damaged.jpg");
        save_with_damaged_exif(&path);
        assert!(image::open(&path).is_ok());

        let meta = ExifCodec::new().read(&path).unwrap();
        assert_eq!(meta, ImageMetadata::default());
    }

    #[test]
    fn write_replaces_damaged_exif() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("damaged.jpg");
        save_with_damaged_exif(&path);
        let codec = ExifCodec::new();
        let ts = CaptureTimestamp::parse("2012:12:12 12:12:12").unwrap();

        assert_eq!(codec.write(&path, ts, false).unwrap(), WriteOutcome::Written);
        assert_eq!(codec.read(&path).unwrap().timestamp, Some(ts));
        assert!(image::open(&path).is_ok());
    }

    #[test]
    fn write_then_read_jpeg() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        save_plain(&path);
        let codec = ExifCodec::new();
        let ts = CaptureTimestamp::parse("2021:05:03 10:15:02").unwrap();

        assert_eq!(codec.write(&path, ts, false).unwrap(), WriteOutcome::Written);
        let meta = codec.read(&path).unwrap();
        assert_eq!(meta.timestamp, Some(ts));
        assert!(meta.raw.is_some());
    }

    #[test]
    fn write_then_read_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.png");
        save_plain(&path);
        let codec = ExifCodec::new();
        let ts = CaptureTimestamp::parse("2015:11:30 08:00:59").unwrap();

        codec.write(&path, ts, false).unwrap();
        assert_eq!(codec.read(&path).unwrap().timestamp, Some(ts));
    }

    #[test]
    fn existing_timestamp_is_kept_without_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        save_plain(&path);
        let codec = ExifCodec::new();
        let first = CaptureTimestamp::parse("2010:01:01 01:01:01").unwrap();
        let second = CaptureTimestamp::parse("2011:02:02 02:02:02").unwrap();
        codec.write(&path, first, false).unwrap();
        let before = fs::read(&path).unwrap();

        assert_eq!(codec.write(&path, second, false).unwrap(), WriteOutcome::AlreadySet);
        assert_eq!(fs::read(&path).unwrap(), before);

        assert_eq!(codec.write(&path, second, true).unwrap(), WriteOutcome::Written);
        assert_eq!(codec.read(&path).unwrap().timestamp, Some(second));
    }

    #[test]
    fn write_rejects_unsupported_container() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake.png");
        fs::write(&path, b"GIF89a....").unwrap();
        let ts = CaptureTimestamp::parse("2010:01:01 01:01:01").unwrap();

        let err = ExifCodec::new().write(&path, ts, true).unwrap_err();
        assert!(matches!(err, OrganizeError::Encode { .. }));
    }
}
