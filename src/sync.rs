/**
 * Transfers between a local directory and a remote photo store
 */

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{info, warn};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::events::{Event, EventSink};
use crate::remote::RemotePhotoStore;
use crate::scanner;
use crate::summary::FileIssue;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub succeeded: usize,
    pub failures: Vec<FileIssue>,
}

impl TransferSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failures.len()
    }

    /// Write one failed path per line. Does nothing when nothing failed.
    pub fn write_failures(&self, path: &Path) -> Result<bool> {
        if self.failures.is_empty() {
            return Ok(false);
        }
        let mut file = fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for failure in &self.failures {
            writeln!(file, "{}", failure.path.display())?;
        }
        Ok(true)
    }

    fn fail(&mut self, path: PathBuf, reason: String, sink: &dyn EventSink) {
        warn!("{}: {}", path.display(), reason);
        sink.record(Event::Failed { path: path.clone(), reason: reason.clone() });
        self.failures.push(FileIssue { path, reason });
    }
}

/// Download every item captured between `start` and `end` into `dest_dir`.
pub fn download_range(
    store: &dyn RemotePhotoStore,
    start: NaiveDate,
    end: NaiveDate,
    dest_dir: &Path,
    sink: &dyn EventSink,
) -> Result<TransferSummary> {
    fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create download directory: {}", dest_dir.display()))?;

    let items = store
        .list_items(start, end)
        .with_context(|| format!("Failed to list media items between {} and {}", start, end))?;
    info!("Found {} media items between {} and {}", items.len(), start, end);

    let mut summary = TransferSummary::default();
    for item in &items {
        match store.download(item, dest_dir) {
            Ok(path) => {
                summary.succeeded += 1;
                sink.record(Event::Downloaded { id: item.id.clone(), to: path });
            }
            Err(e) => summary.fail(PathBuf::from(&item.id), format!("{:#}", e), sink),
        }
    }
    Ok(summary)
}

/// Upload and finalize every image under `dir`, recursively.
pub fn upload_directory(
    store: &dyn RemotePhotoStore,
    dir: &Path,
    sink: &dyn EventSink,
) -> Result<TransferSummary> {
    if !dir.is_dir() {
        anyhow::bail!("Upload directory was not found: {}", dir.display());
    }

    let mut summary = TransferSummary::default();
    for path in scanner::scan(dir, true) {
        info!("Uploading {}...", path.display());
        let result = store.upload(&path).and_then(|token| store.finalize(token));
        match result {
            Ok(()) => {
                summary.succeeded += 1;
                sink.record(Event::Uploaded { path });
            }
            Err(e) => summary.fail(path, format!("{:#}", e), sink),
        }
    }

    info!(
        "Upload completed: {} files successfully uploaded, {} files failed.",
        summary.succeeded,
        summary.failures.len()
    );
    Ok(summary)
}
