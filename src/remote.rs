/**
 * Remote photo store abstraction
 *
 * Authentication and transport belong to the implementation. The crate ships
 * `LocalDirectoryStore`, which treats a directory (a NAS mount, a synced
 * folder) as the remote side.
 */

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::exif::MetadataCodec;
use crate::resolver::{ConflictPolicy, Resolution, Resolver};
use crate::scanner;

const STAGING_DIR: &str = ".staging";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItem {
    pub id: String,
    pub content_url: String,
    /// Original file name on the remote side, when known.
    pub filename: Option<String>,
}

/// Handle for an upload that still needs `finalize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadToken(pub String);

pub trait RemotePhotoStore {
    /// Items captured between `start` and `end`, both inclusive.
    fn list_items(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<RemoteItem>>;

    /// Save `item` into `dest_dir` and return the written path.
    fn download(&self, item: &RemoteItem, dest_dir: &Path) -> Result<PathBuf>;

    fn upload(&self, file: &Path) -> Result<UploadToken>;

    /// Commit an upload so it shows up in the store.
    fn finalize(&self, token: UploadToken) -> Result<()>;
}

/// Drop non-ASCII characters from an upload file name.
pub fn sanitize_filename(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii()).collect()
}

/// A directory standing in for a remote store.
pub struct LocalDirectoryStore<'a> {
    root: PathBuf,
    codec: &'a dyn MetadataCodec,
}

impl<'a> LocalDirectoryStore<'a> {
    pub fn open(root: impl Into<PathBuf>, codec: &'a dyn MetadataCodec) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            bail!("Store directory was not found: {}", root.display());
        }
        Ok(Self { root, codec })
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    fn item_path(&self, item: &RemoteItem) -> Result<PathBuf> {
        let path = self.root.join(&item.id);
        // ids are relative paths under the root; refuse anything escaping it
        if Path::new(&item.id).components().any(|c| !matches!(c, std::path::Component::Normal(_))) {
            bail!("Invalid item id: {}", item.id);
        }
        Ok(path)
    }
}

impl RemotePhotoStore for LocalDirectoryStore<'_> {
    fn list_items(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<RemoteItem>> {
        let staging = self.staging_dir();
        let mut items = Vec::new();

        for path in scanner::scan(&self.root, true) {
            if path.starts_with(&staging) {
                continue;
            }
            let timestamp = match self.codec.read(&path) {
                Ok(meta) => meta.timestamp,
                Err(e) => {
                    debug!("Not listing {}: {}", path.display(), e);
                    continue;
                }
            };
            let Some(ts) = timestamp else { continue };
            let Some(date) = NaiveDate::from_ymd_opt(ts.year as i32, ts.month as u32, ts.day as u32) else {
                continue;
            };
            if date < start || date > end {
                continue;
            }

            let relative = path.strip_prefix(&self.root).unwrap_or(&path);
            items.push(RemoteItem {
                id: relative.to_string_lossy().into_owned(),
                content_url: format!("file://{}", path.display()),
                filename: path.file_name().map(|n| n.to_string_lossy().into_owned()),
            });
        }

        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    fn download(&self, item: &RemoteItem, dest_dir: &Path) -> Result<PathBuf> {
        let source = self.item_path(item)?;
        fs::create_dir_all(dest_dir)
            .with_context(|| format!("Failed to create download directory: {}", dest_dir.display()))?;

        // flatten nested ids into one file name, keeping the extension
        let name = item.id.replace(['/', '\\'], "_");
        let target = dest_dir.join(name);
        fs::copy(&source, &target)
            .with_context(|| format!("Failed to download {} to {}", item.id, target.display()))?;
        Ok(target)
    }

    fn upload(&self, file: &Path) -> Result<UploadToken> {
        let name = file
            .file_name()
            .map(|n| sanitize_filename(&n.to_string_lossy()))
            .filter(|n| !n.is_empty() && !n.starts_with('.'))
            .with_context(|| format!("Cannot upload a file without an ASCII name: {}", file.display()))?;

        let staging = self.staging_dir();
        fs::create_dir_all(&staging)
            .with_context(|| format!("Failed to create staging directory: {}", staging.display()))?;

        let resolver = Resolver::new(ConflictPolicy::Disambiguate, "D");
        let target = match resolver.resolve(&staging.join(&name))? {
            Resolution::Target(target) => target,
            Resolution::Skip { existing } => bail!("Staging slot taken: {}", existing.display()),
        };
        if let Err(e) = fs::copy(file, target.path()) {
            target.release();
            return Err(e).with_context(|| format!("Failed to upload {}", file.display()));
        }

        let staged = target.into_path();
        let token = staged
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(name);
        Ok(UploadToken(token))
    }

    fn finalize(&self, token: UploadToken) -> Result<()> {
        let staged = self.staging_dir().join(&token.0);
        if !staged.is_file() {
            bail!("Unknown upload token: {}", token.0);
        }

        let resolver = Resolver::new(ConflictPolicy::Disambiguate, "D");
        let target = match resolver.resolve(&self.root.join(&token.0))? {
            Resolution::Target(target) => target,
            Resolution::Skip { existing } => bail!("Destination taken: {}", existing.display()),
        };
        if let Err(e) = fs::rename(&staged, target.path()) {
            target.release();
            return Err(e).with_context(|| format!("Failed to commit upload {}", token.0));
        }
        Ok(())
    }
}
