/**
 * Per-run counters and failure list
 */

use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIssue {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    pub transformed: usize,
    pub skipped: usize,
    pub failures: Vec<FileIssue>,
    /// Non-fatal problems on files that were still transformed.
    pub warnings: Vec<FileIssue>,
    /// The run stopped early on cancellation.
    pub cancelled: bool,
}

impl RunSummary {
    pub fn new(discovered: usize) -> Self {
        Self {
            discovered,
            ..Self::default()
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn record_transformed(&mut self) {
        self.transformed += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn record_failure(&mut self, path: &Path, reason: impl Into<String>) {
        self.failures.push(FileIssue {
            path: path.to_path_buf(),
            reason: reason.into(),
        });
    }

    pub fn record_warning(&mut self, path: &Path, reason: impl Into<String>) {
        self.warnings.push(FileIssue {
            path: path.to_path_buf(),
            reason: reason.into(),
        });
    }

    /// Files that never got an outcome, i.e. left over after cancellation.
    pub fn unprocessed(&self) -> usize {
        self.discovered
            .saturating_sub(self.transformed + self.skipped + self.failed())
    }

    pub fn failed_paths(&self) -> Vec<&Path> {
        self.failures.iter().map(|f| f.path.as_path()).collect()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Files found: {}", self.discovered)?;
        writeln!(f, "Files processed: {}", self.transformed)?;
        writeln!(f, "Files skipped: {}", self.skipped)?;
        write!(f, "Errors: {}", self.failed())?;
        if self.cancelled {
            write!(f, "\nCancelled with {} files left", self.unprocessed())?;
        }
        if !self.failures.is_empty() {
            write!(f, "\n\nErrors:")?;
            for failure in &self.failures {
                write!(f, "\n  {}: {}", failure.path.display(), failure.reason)?;
            }
        }
        Ok(())
    }
}
