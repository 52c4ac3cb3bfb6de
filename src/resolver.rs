/**
 * Destination conflict resolution
 *
 * The existence check and the claim on a path are a single exclusive create,
 * so concurrent workers can never settle on the same destination.
 */

use log::debug;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{OrganizeError, Result};

/// Marker appended by rename runs.
pub const RENAME_MARKER: &str = "D";
/// Marker appended by resize runs.
pub const RESIZE_MARKER: &str = "_RESIZED";

const MAX_FILE_NAME_BYTES: usize = 255;

/// What to do when the desired destination already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Replace the existing file.
    Overwrite,
    /// Leave the existing file alone and skip the source.
    SkipIfExists,
    /// Insert a marker before the extension until the name is free.
    #[default]
    Disambiguate,
}

impl ConflictPolicy {
    /// CLI flag mapping. `skip` wins over `overwrite`.
    pub fn from_flags(overwrite: bool, skip: bool) -> Self {
        if skip {
            Self::SkipIfExists
        } else if overwrite {
            Self::Overwrite
        } else {
            Self::Disambiguate
        }
    }
}

/// A destination the caller may write to.
#[derive(Debug, PartialEq, Eq)]
pub struct ResolvedPath {
    path: PathBuf,
    /// An empty placeholder was created to hold the name.
    reserved: bool,
}

impl ResolvedPath {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_reserved(&self) -> bool {
        self.reserved
    }

    /// Give the name back after a failed transform.
    pub fn release(self) {
        if self.reserved {
            if let Err(e) = fs::remove_file(&self.path) {
                debug!("Failed to remove placeholder {}: {}", self.path.display(), e);
            }
        }
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Resolution {
    Target(ResolvedPath),
    /// `SkipIfExists` found this path occupied.
    Skip { existing: PathBuf },
}

#[derive(Debug, Clone)]
pub struct Resolver {
    policy: ConflictPolicy,
    marker: String,
}

impl Resolver {
    pub fn new(policy: ConflictPolicy, marker: impl Into<String>) -> Self {
        Self {
            policy,
            marker: marker.into(),
        }
    }

    /// Turn `desired` into a destination according to the policy.
    ///
    /// `Disambiguate` adds exactly one marker per occupied candidate, so it
    /// stops after at most (colliding files + 1) attempts.
    pub fn resolve(&self, desired: &Path) -> Result<Resolution> {
        match self.policy {
            ConflictPolicy::Overwrite => Ok(Resolution::Target(ResolvedPath {
                path: desired.to_path_buf(),
                reserved: false,
            })),
            ConflictPolicy::SkipIfExists => match reserve(desired)? {
                true => Ok(Resolution::Target(ResolvedPath {
                    path: desired.to_path_buf(),
                    reserved: true,
                })),
                false => Ok(Resolution::Skip {
                    existing: desired.to_path_buf(),
                }),
            },
            ConflictPolicy::Disambiguate => {
                let mut candidate = desired.to_path_buf();
                loop {
                    if name_len(&candidate) > MAX_FILE_NAME_BYTES {
                        return Err(OrganizeError::ConflictExhausted {
                            path: desired.to_path_buf(),
                        });
                    }
                    if reserve(&candidate)? {
                        return Ok(Resolution::Target(ResolvedPath {
                            path: candidate,
                            reserved: true,
                        }));
                    }
                    debug!("{} exists, adding marker", candidate.display());
                    candidate = with_marker(&candidate, &self.marker);
                }
            }
        }
    }
}

/// Claim `path` by creating it exclusively. `false` when it already exists.
fn reserve(path: &Path) -> Result<bool> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(OrganizeError::io(path, e)),
    }
}

fn name_len(path: &Path) -> usize {
    path.file_name().map(|n| n.len()).unwrap_or(0)
}

/// `dir/photo.jpg` -> `dir/photo<marker>.jpg`.
pub fn with_marker(path: &Path, marker: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}{}.{}", stem, marker, ext.to_string_lossy()),
        None => format!("{}{}", stem, marker),
    };
    path.with_file_name(name)
}
