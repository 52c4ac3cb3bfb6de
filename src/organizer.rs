/**
 * Run orchestration: one pass over a scanned directory
 *
 * scan -> read metadata -> plan -> resolve -> transform -> tally.
 * A failing file is recorded and the batch moves on; only directory
 * preconditions abort a run.
 */

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{OrganizeError, Result};
use crate::events::{Event, EventSink};
use crate::exif::MetadataCodec;
use crate::file_ops::{self, RelocateMode};
use crate::naming::{self, ImageRecord, NameStyle, PlacementMode};
use crate::resolver::{ConflictPolicy, Resolution, Resolver, RENAME_MARKER, RESIZE_MARKER};
use crate::scanner;
use crate::summary::RunSummary;

/// What a run does to each file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Rename { mode: RelocateMode },
    Resize { max_dimension: u32, delete_original: bool },
}

impl Job {
    pub fn marker(&self) -> &'static str {
        match self {
            Job::Rename { .. } => RENAME_MARKER,
            Job::Resize { .. } => RESIZE_MARKER,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub recursive: bool,
    pub policy: ConflictPolicy,
    pub job: Job,
    /// Put everything directly into `output_dir` instead of year buckets.
    pub flat: bool,
    pub name_style: NameStyle,
    /// Worker threads; `None` or 1 processes files sequentially.
    pub workers: Option<usize>,
    pub show_progress: bool,
}

impl RunConfig {
    pub fn rename(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            recursive: false,
            policy: ConflictPolicy::default(),
            job: Job::Rename { mode: RelocateMode::Copy },
            flat: false,
            name_style: NameStyle::Timestamp,
            workers: None,
            show_progress: false,
        }
    }

    pub fn resize(
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        max_dimension: u32,
    ) -> Self {
        Self {
            job: Job::Resize { max_dimension, delete_original: false },
            ..Self::rename(input_dir, output_dir)
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Move for renames, remove the source after writing for resizes.
    pub fn delete_originals(mut self, delete: bool) -> Self {
        self.job = match self.job {
            Job::Rename { .. } => Job::Rename { mode: RelocateMode::from_delete_flag(delete) },
            Job::Resize { max_dimension, .. } => Job::Resize { max_dimension, delete_original: delete },
        };
        self
    }

    pub fn flat(mut self, flat: bool) -> Self {
        self.flat = flat;
        self
    }

    pub fn name_style(mut self, style: NameStyle) -> Self {
        self.name_style = style;
        self
    }

    pub fn workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}

/// Stops a run between files. Files already handled stay as they are.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

enum FileOutcome {
    Transformed { warnings: Vec<String> },
    Skipped(String),
}

pub struct Organizer<'a> {
    config: RunConfig,
    codec: &'a dyn MetadataCodec,
    sink: &'a dyn EventSink,
    resolver: Resolver,
    cancel: CancellationToken,
}

impl<'a> Organizer<'a> {
    pub fn new(config: RunConfig, codec: &'a dyn MetadataCodec, sink: &'a dyn EventSink) -> Self {
        let resolver = Resolver::new(config.policy, config.job.marker());
        Self {
            config,
            codec,
            sink,
            resolver,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Process every image under the input directory once.
    ///
    /// Fails only when the input or output directory is unusable; that check
    /// happens before any file is touched.
    pub fn run(&self) -> Result<RunSummary> {
        let (input_dir, output_dir) = self.check_preconditions()?;
        let placement = if self.config.flat {
            PlacementMode::Flat { dir: output_dir }
        } else {
            PlacementMode::ByYear { root: output_dir }
        };

        info!("Searching for images in {}...", input_dir.display());
        // materialized so files created under an output nested in the input are not picked up
        let files: Vec<PathBuf> = scanner::scan(&input_dir, self.config.recursive).collect();
        self.sink.record(Event::RunStarted {
            input: input_dir.clone(),
            discovered: files.len(),
        });

        let summary = Mutex::new(RunSummary::new(files.len()));
        let pb = self.progress_bar(files.len());

        let process = |path: &PathBuf| {
            if self.cancel.is_cancelled() {
                return;
            }
            let outcome = self.process_file(path, &placement);
            self.tally(path, outcome, &summary, &pb);
        };

        match self.worker_pool() {
            Some(pool) => pool.install(|| files.par_iter().for_each(process)),
            None => files.iter().for_each(process),
        }
        pb.finish_with_message("Done");

        let mut summary = summary.into_inner().unwrap_or_else(|p| p.into_inner());
        summary.cancelled = self.cancel.is_cancelled() && summary.unprocessed() > 0;
        self.sink.record(Event::RunFinished {
            transformed: summary.transformed,
            skipped: summary.skipped,
            failed: summary.failed(),
            total: summary.discovered,
        });
        Ok(summary)
    }

    fn check_preconditions(&self) -> Result<(PathBuf, PathBuf)> {
        let check = |dir: &Path| -> Result<PathBuf> {
            if !dir.is_dir() {
                return Err(OrganizeError::precondition(dir, "specified directory was not found"));
            }
            fs::canonicalize(dir).map_err(|e| OrganizeError::precondition(dir, e.to_string()))
        };
        Ok((check(&self.config.input_dir)?, check(&self.config.output_dir)?))
    }

    fn worker_pool(&self) -> Option<rayon::ThreadPool> {
        let requested = self.config.workers?;
        let threads = requested.min(num_cpus::get()).max(1);
        if threads <= 1 {
            return None;
        }
        info!("Configuring thread pool with {} threads (requested: {}, CPUs: {})",
              threads, requested, num_cpus::get());
        match ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("photo-sorter-worker-{}", i))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!("Failed to configure thread pool, processing sequentially: {}", e);
                None
            }
        }
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec:.1} files/s) ETA: {eta} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        pb.set_message("Processing files");
        pb
    }

    fn tally(&self, path: &Path, outcome: Result<FileOutcome>, summary: &Mutex<RunSummary>, pb: &ProgressBar) {
        let mut summary = summary.lock().unwrap_or_else(|p| p.into_inner());
        match outcome {
            Ok(FileOutcome::Transformed { warnings }) => {
                summary.record_transformed();
                for message in warnings {
                    summary.record_warning(path, message.clone());
                    self.sink.record(Event::Warning { path: path.to_path_buf(), message });
                }
            }
            Ok(FileOutcome::Skipped(reason)) => {
                summary.record_skipped();
                self.sink.record(Event::Skipped { path: path.to_path_buf(), reason });
            }
            Err(e) => {
                let reason = e.to_string();
                summary.record_failure(path, reason.clone());
                self.sink.record(Event::Failed { path: path.to_path_buf(), reason });
            }
        }
        pb.inc(1);
    }

    fn process_file(&self, path: &Path, placement: &PlacementMode) -> Result<FileOutcome> {
        self.sink.record(Event::FileStarted { path: path.to_path_buf() });

        let metadata = self.codec.read(path)?;
        let mut record = ImageRecord::new(path.to_path_buf());
        record.timestamp = metadata.timestamp;
        record.raw_metadata = metadata.raw;
        if record.timestamp.is_none() {
            debug!("No capture timestamp for {}, using fallback placement", path.display());
        }

        let decision = naming::plan(&record, placement, self.config.name_style);
        if naming::ensure_bucket(&decision.bucket)? {
            self.sink.record(Event::DirectoryCreated { path: decision.bucket.clone() });
        }

        let desired = decision.desired_path();
        if is_same_file(path, &desired) {
            return Ok(FileOutcome::Skipped("already in place".to_string()));
        }

        let target = match self.resolver.resolve(&desired)? {
            Resolution::Target(target) => target,
            Resolution::Skip { existing } => {
                return Ok(FileOutcome::Skipped(format!("{} already exists", existing.display())));
            }
        };

        let result = match self.config.job {
            Job::Rename { mode } => file_ops::relocate(path, target.path(), mode).map(|()| {
                self.sink.record(Event::Relocated {
                    from: path.to_path_buf(),
                    to: target.path().to_path_buf(),
                    moved: mode == RelocateMode::Move,
                });
                Vec::new()
            }),
            Job::Resize { max_dimension, delete_original } => {
                file_ops::resize_and_relocate(&record, target.path(), max_dimension, delete_original)
                    .map(|outcome| {
                        self.sink.record(Event::Resized {
                            from: path.to_path_buf(),
                            to: target.path().to_path_buf(),
                            width: outcome.written.0,
                            height: outcome.written.1,
                        });
                        outcome.warnings
                    })
            }
        };

        match result {
            Ok(warnings) => Ok(FileOutcome::Transformed { warnings }),
            Err(e) => {
                target.release();
                Err(e)
            }
        }
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
