use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use log::info;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use photo_sorter::backup::{self, BackupConfig, DEFAULT_BACKUP_MAX_DIMENSION};
use photo_sorter::naming::NameStyle;
use photo_sorter::remote::LocalDirectoryStore;
use photo_sorter::stamp::{self, StampConfig};
use photo_sorter::sync;
use photo_sorter::{ConflictPolicy, ExifCodec, LogSink, Organizer, RunConfig, RunSummary};

#[derive(Parser)]
#[command(name = "photo-sorter")]
#[command(version)]
#[command(about = "Rename, resize and timestamp photos from their EXIF capture dates")]
#[command(long_about = "Organizes JPEG and PNG photos by the DateTimeOriginal stored in their EXIF data.

Output layout: <output>/<YYYY>/YYYY-MM-DD_HH-MM-SS<ext>
Files without a capture date go to <output>/Other/ under their original name.
Name clashes get a marker before the extension (D for rename, _RESIZED for resize)
unless --overwrite or --skip is given.")]
struct Cli {
    /// Increase verbosity (-v=INFO, -vv=DEBUG, -vvv=TRACE)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Also append log lines to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct OrganizeArgs {
    /// Directory in which to search for images
    #[arg(short, long = "input-directory")]
    input_directory: PathBuf,
    /// Root directory that receives the year folders
    #[arg(short, long = "output-dir")]
    output_dir: PathBuf,
    /// Search for images recursively in directories
    #[arg(short, long)]
    recursive: bool,
    /// Replace existing files instead of adding a marker to the new name
    #[arg(short = 'f', long)]
    overwrite: bool,
    /// Leave existing files alone and skip the duplicate (wins over --overwrite)
    #[arg(short, long)]
    skip: bool,
    /// Remove the originals (rename moves instead of copying)
    #[arg(short = 'D', long = "delete-orig")]
    delete_orig: bool,
    /// Put every file directly into the output directory, without year folders
    #[arg(long)]
    flat: bool,
    /// Number of parallel workers (default: sequential)
    #[arg(short, long)]
    workers: Option<usize>,
    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

impl OrganizeArgs {
    fn into_config(self, base: impl FnOnce(PathBuf, PathBuf) -> RunConfig) -> RunConfig {
        base(self.input_directory, self.output_dir)
            .recursive(self.recursive)
            .policy(ConflictPolicy::from_flags(self.overwrite, self.skip))
            .delete_originals(self.delete_orig)
            .flat(self.flat)
            .workers(self.workers)
            .show_progress(!self.no_progress)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Copy or move images into year folders named by capture time
    Rename {
        #[command(flatten)]
        args: OrganizeArgs,
    },
    /// Shrink images so the larger side is at most the given size
    Resize {
        #[command(flatten)]
        args: OrganizeArgs,
        /// Largest allowed dimension in pixels; images are only ever reduced
        #[arg(long = "resize_max_dim_pix", visible_alias = "resize")]
        resize_max_dim_pix: u32,
        /// Keep the original file names instead of capture-time names
        #[arg(long)]
        keep_names: bool,
    },
    /// Write sequential capture times onto images that have none
    Stamp {
        #[arg(short, long = "input-directory")]
        input_directory: PathBuf,
        /// Date to add (YYYY:MM:DD); each file gets one more second
        #[arg(short, long, value_parser = stamp::parse_stamp_date)]
        date: NaiveDate,
        #[arg(short, long)]
        recursive: bool,
        /// Replace capture times that are already present
        #[arg(short, long)]
        overwrite: bool,
    },
    /// Download photos captured in a date range from the store
    Download {
        /// Store directory
        #[arg(long)]
        store: PathBuf,
        /// First capture date (YYYY-MM-DD)
        #[arg(long)]
        start_date: NaiveDate,
        /// Last capture date (YYYY-MM-DD), inclusive
        #[arg(long)]
        end_date: NaiveDate,
        /// Where downloaded files go
        dest: PathBuf,
    },
    /// Upload every image under a directory to the store
    Upload {
        #[arg(long)]
        store: PathBuf,
        /// File that receives the paths that failed to upload
        #[arg(long, default_value = "failed_uploads.txt")]
        failed_list: PathBuf,
        directory: PathBuf,
    },
    /// Download, consolidate, resize and upload in one go
    Backup {
        #[arg(long)]
        store: PathBuf,
        #[arg(short, long)]
        start_date: NaiveDate,
        #[arg(short, long)]
        end_date: NaiveDate,
        /// Archive root receiving the year folders
        #[arg(short = 'x', long)]
        external_hd: PathBuf,
        /// Phone or camera directory to copy from
        #[arg(short, long)]
        phone_device: PathBuf,
        /// Local directory for the resized copies
        #[arg(short, long)]
        local_backup: PathBuf,
        #[arg(long, default_value_t = DEFAULT_BACKUP_MAX_DIMENSION)]
        max_dim: u32,
        #[arg(short, long)]
        workers: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.log_file.as_deref())?;

    info!("Starting photo-sorter");

    let codec = ExifCodec::new();
    let sink = LogSink;

    match cli.command {
        Commands::Rename { args } => {
            let config = args.into_config(RunConfig::rename);
            run_organizer(config, &codec, &sink)
        }
        Commands::Resize { args, resize_max_dim_pix, keep_names } => {
            let style = if keep_names { NameStyle::Original } else { NameStyle::Timestamp };
            let config = args
                .into_config(|i, o| RunConfig::resize(i, o, resize_max_dim_pix))
                .name_style(style);
            run_organizer(config, &codec, &sink)
        }
        Commands::Stamp { input_directory, date, recursive, overwrite } => {
            let config = StampConfig { input_dir: input_directory, date, recursive, overwrite };
            let summary = stamp::stamp_directory(&config, &codec, &sink)?;
            println!("\nStamping complete!");
            println!("Files found: {}", summary.discovered);
            println!("Files stamped: {}", summary.stamped);
            println!("Already dated: {}", summary.already_set);
            println!("Errors: {}", summary.failures.len());
            if summary.limit_reached {
                println!("Stopped at the limit of {} files per day", stamp::MAX_STAMPS_PER_DAY);
            }
            Ok(())
        }
        Commands::Download { store, start_date, end_date, dest } => {
            let store = LocalDirectoryStore::open(store, &codec)?;
            let summary = sync::download_range(&store, start_date, end_date, &dest, &sink)?;
            println!(
                "Download completed: {} files downloaded, {} files failed.",
                summary.succeeded,
                summary.failures.len()
            );
            Ok(())
        }
        Commands::Upload { store, failed_list, directory } => {
            let store = LocalDirectoryStore::open(store, &codec)?;
            let summary = sync::upload_directory(&store, &directory, &sink)?;
            println!(
                "Upload completed: {} files successfully uploaded, {} files failed.",
                summary.succeeded,
                summary.failures.len()
            );
            if summary.write_failures(&failed_list)? {
                println!("Failed uploads written to {}.", failed_list.display());
            }
            Ok(())
        }
        Commands::Backup {
            store,
            start_date,
            end_date,
            external_hd,
            phone_device,
            local_backup,
            max_dim,
            workers,
        } => {
            let store = LocalDirectoryStore::open(store, &codec)?;
            let config = BackupConfig {
                start: start_date,
                end: end_date,
                external: external_hd,
                phone: phone_device,
                local_backup,
                max_dimension: max_dim,
                workers,
                show_progress: true,
            };
            let report = backup::run_backup(&config, &store, &codec, &sink)?;
            println!("\nBackup complete!");
            println!("Downloaded: {}", report.download.succeeded);
            println!("Phone photos organized: {}", report.phone.transformed);
            println!("Downloads consolidated: {}", report.downloaded.transformed);
            println!("Resized: {}", report.resize.transformed);
            println!("Uploaded: {}", report.upload.succeeded);
            Ok(())
        }
    }
}

fn run_organizer(config: RunConfig, codec: &ExifCodec, sink: &LogSink) -> Result<()> {
    info!(
        "Initiating new run: {} -> {} ({:?}, {:?})",
        config.input_dir.display(),
        config.output_dir.display(),
        config.job,
        config.policy
    );
    let summary = Organizer::new(config, codec, sink)
        .run()
        .context("Cannot start run")?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("\nProcessing complete!");
    println!("{}", summary);
}

/// Writes every log line to both the log file and stderr.
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        io::stderr().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        io::stderr().flush()
    }
}

fn setup_logging(verbosity: u8, log_file: Option<&Path>) -> Result<()> {
    let mut level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_default_env();

    if let Some(path) = log_file {
        // the file is an action log, so it records at least INFO
        level = level.max(log::LevelFilter::Info);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(TeeWriter { file })));
    }

    builder.filter_level(level).init();

    Ok(())
}
