/**
 * File operations module: relocating and resizing images
 */

use image::imageops::FilterType;
use image::{GenericImageView, ImageReader};
use log::{debug, warn};
use std::fs;
use std::path::Path;

use crate::error::{OrganizeError, Result};
use crate::exif_writer::{self, ContainerFormat};
use crate::naming::ImageRecord;
use crate::scanner::extension_of;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelocateMode {
    /// Rename; copy then delete when crossing devices.
    Move,
    /// Duplicate the bytes, leaving the source untouched.
    #[default]
    Copy,
}

impl RelocateMode {
    pub fn from_delete_flag(delete_original: bool) -> Self {
        if delete_original {
            Self::Move
        } else {
            Self::Copy
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Copy => "copy",
        }
    }
}

/// Move or copy `source_path` to `target_path` byte for byte.
///
/// `target_path` may be an empty placeholder left by the resolver; it is
/// replaced.
pub fn relocate(source_path: &Path, target_path: &Path, mode: RelocateMode) -> Result<()> {
    debug!(
        "Attempting {} operation: '{}' -> '{}'",
        mode.verb(),
        source_path.display(),
        target_path.display()
    );

    if !source_path.exists() {
        return Err(OrganizeError::io(
            source_path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "source file does not exist"),
        ));
    }

    match mode {
        RelocateMode::Move => match fs::rename(source_path, target_path) {
            Ok(()) => debug!("Move operation successful"),
            Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
                debug!("Cross-device move detected, using copy+delete strategy");
                fs::copy(source_path, target_path).map_err(|e| OrganizeError::io(target_path, e))?;
                fs::remove_file(source_path).map_err(|e| OrganizeError::io(source_path, e))?;
                debug!("Cross-device move operation successful");
            }
            Err(e) => return Err(OrganizeError::io(source_path, e)),
        },
        RelocateMode::Copy => {
            fs::copy(source_path, target_path).map_err(|e| OrganizeError::io(target_path, e))?;
            debug!("Copy operation successful");
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeKind {
    Resized,
    /// Target was not smaller than the image; the file was copied as is.
    CopiedUnchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeOutcome {
    pub kind: ResizeKind,
    pub original: (u32, u32),
    pub written: (u32, u32),
    /// Non-fatal problems, e.g. metadata that could not be re-attached.
    pub warnings: Vec<String>,
}

/// Proportional dimensions whose larger side is `max_dimension`, floor-rounded.
///
/// Returns the input unchanged when it already fits.
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let biggest = width.max(height);
    if biggest == 0 || max_dimension >= biggest {
        return (width, height);
    }
    let scale = |side: u32| -> u32 {
        ((side as u64 * max_dimension as u64) / biggest as u64).max(1) as u32
    };
    (scale(width), scale(height))
}

/// Shrink `record` so its larger side is `max_dimension` and write it to `target_path`.
///
/// Never upscales: an image that already fits is copied unchanged. The raw
/// metadata block of the record is re-attached; if that fails the image is
/// still written and a warning is returned. With `delete_original` the source
/// is removed only after the destination has been written.
pub fn resize_and_relocate(
    record: &ImageRecord,
    target_path: &Path,
    max_dimension: u32,
    delete_original: bool,
) -> Result<ResizeOutcome> {
    let source_path = record.path.as_path();
    let img = ImageReader::open(source_path)
        .map_err(|e| OrganizeError::io(source_path, e))?
        .with_guessed_format()
        .map_err(|e| OrganizeError::io(source_path, e))?
        .decode()
        .map_err(|e| OrganizeError::decode(source_path, e))?;

    let original = img.dimensions();
    let mut warnings = Vec::new();

    let (kind, written) = if max_dimension >= original.0.max(original.1) {
        warn!(
            "Images can only be reduced in size. Max dimension {} is not smaller than {}x{}, copying {}",
            max_dimension,
            original.0,
            original.1,
            source_path.display()
        );
        fs::copy(source_path, target_path).map_err(|e| OrganizeError::io(target_path, e))?;
        (ResizeKind::CopiedUnchanged, original)
    } else {
        let (width, height) = scaled_dimensions(original.0, original.1, max_dimension);
        let format = extension_of(target_path)
            .and_then(|ext| ContainerFormat::from_extension(&ext))
            .or_else(|| ContainerFormat::from_extension(&record.extension))
            .ok_or_else(|| OrganizeError::encode(target_path, "unsupported output format"))?;

        let resized = img.resize_exact(width, height, FilterType::Lanczos3);
        let encoded = exif_writer::encode_with_metadata(&resized, format, record.raw_metadata.as_deref())
            .map_err(|e| OrganizeError::encode(target_path, format!("{:#}", e)))?;
        if let Some(reason) = encoded.metadata_dropped {
            warnings.push(format!("metadata not preserved: {}", reason));
        }
        fs::write(target_path, &encoded.bytes).map_err(|e| OrganizeError::io(target_path, e))?;
        (ResizeKind::Resized, (width, height))
    };

    if delete_original {
        if let Err(e) = fs::remove_file(source_path) {
            warnings.push(format!("original not deleted: {}", e));
        }
    }

    Ok(ResizeOutcome {
        kind,
        original,
        written,
        warnings,
    })
}
