/**
 * End-to-end backup: pull from the store, consolidate by year, shrink a
 * local copy, push the copy back.
 */

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::info;
use std::fs;
use std::path::PathBuf;

use crate::events::EventSink;
use crate::exif::MetadataCodec;
use crate::organizer::{Organizer, RunConfig};
use crate::remote::RemotePhotoStore;
use crate::resolver::ConflictPolicy;
use crate::summary::RunSummary;
use crate::sync::{self, TransferSummary};

pub const DOWNLOAD_SUBDIR: &str = "Google_Photos";
pub const PHONE_SUBDIR: &str = "Phone_Photos";
pub const DEFAULT_BACKUP_MAX_DIMENSION: u32 = 1200;

#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Archive root that receives the year buckets.
    pub external: PathBuf,
    /// Mounted phone or camera directory.
    pub phone: PathBuf,
    /// Where the shrunk copies go.
    pub local_backup: PathBuf,
    pub max_dimension: u32,
    pub workers: Option<usize>,
    pub show_progress: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BackupReport {
    pub download: TransferSummary,
    pub phone: RunSummary,
    pub downloaded: RunSummary,
    pub phone_photos: Option<RunSummary>,
    pub resize: RunSummary,
    pub upload: TransferSummary,
}

pub fn run_backup(
    config: &BackupConfig,
    store: &dyn RemotePhotoStore,
    codec: &dyn MetadataCodec,
    sink: &dyn EventSink,
) -> Result<BackupReport> {
    let download_dir = config.external.join(DOWNLOAD_SUBDIR);
    let organize = |run: RunConfig| -> Result<RunSummary> {
        let run = run.workers(config.workers).show_progress(config.show_progress);
        let input = run.input_dir.clone();
        Organizer::new(run, codec, sink)
            .run()
            .with_context(|| format!("Stage failed for {}", input.display()))
    };

    info!("Downloading photos from the store...");
    let download = sync::download_range(store, config.start, config.end, &download_dir, sink)?;

    info!("Copying photos from phone/device to {}...", config.external.display());
    let phone = organize(RunConfig::rename(&config.phone, &config.external).recursive(true))?;

    info!("Consolidating downloaded photos into {}...", config.external.display());
    let downloaded = organize(
        RunConfig::rename(&download_dir, &config.external)
            .recursive(true)
            .policy(ConflictPolicy::Overwrite)
            .delete_originals(true),
    )?;

    let phone_dir = config.external.join(PHONE_SUBDIR);
    let phone_photos = if phone_dir.is_dir() {
        Some(organize(
            RunConfig::rename(&phone_dir, &config.external)
                .recursive(true)
                .policy(ConflictPolicy::Overwrite),
        )?)
    } else {
        None
    };

    info!("Resizing photos into {}...", config.local_backup.display());
    fs::create_dir_all(&config.local_backup)
        .with_context(|| format!("Failed to create {}", config.local_backup.display()))?;
    let resize = organize(
        RunConfig::resize(&config.external, &config.local_backup, config.max_dimension)
            .recursive(true)
            .policy(ConflictPolicy::Overwrite),
    )?;

    info!("Uploading resized photos...");
    let upload = sync::upload_directory(store, &config.local_backup, sink)?;

    info!("Backup process completed.");
    Ok(BackupReport {
        download,
        phone,
        downloaded,
        phone_photos,
        resize,
        upload,
    })
}
