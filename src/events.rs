/**
 * Structured run events and the sinks that receive them
 */

use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    RunStarted { input: PathBuf, discovered: usize },
    FileStarted { path: PathBuf },
    DirectoryCreated { path: PathBuf },
    Relocated { from: PathBuf, to: PathBuf, moved: bool },
    Resized { from: PathBuf, to: PathBuf, width: u32, height: u32 },
    Skipped { path: PathBuf, reason: String },
    Warning { path: PathBuf, message: String },
    Failed { path: PathBuf, reason: String },
    Stamped { path: PathBuf, timestamp: String },
    Downloaded { id: String, to: PathBuf },
    Uploaded { path: PathBuf },
    RunFinished { transformed: usize, skipped: usize, failed: usize, total: usize },
}

/// Receiver for engine events. Shared across workers.
pub trait EventSink: Send + Sync {
    fn record(&self, event: Event);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn record(&self, event: Event) {
        match event {
            Event::RunStarted { input, discovered } => {
                info!("Found {} files in {}. Processing...", discovered, input.display())
            }
            Event::FileStarted { path } => debug!("Opening image: {}", path.display()),
            Event::DirectoryCreated { path } => info!("Created directory: {}", path.display()),
            Event::Relocated { from, to, moved } => info!(
                "{} {} to {}",
                if moved { "Moved" } else { "Copied" },
                from.display(),
                to.display()
            ),
            Event::Resized { from, to, width, height } => {
                info!("Resized {} to {} ({}x{})", from.display(), to.display(), width, height)
            }
            Event::Skipped { path, reason } => info!("Skipped {}: {}", path.display(), reason),
            Event::Warning { path, message } => warn!("{}: {}", path.display(), message),
            Event::Failed { path, reason } => warn!("Failed {}: {}", path.display(), reason),
            Event::Stamped { path, timestamp } => {
                info!("Set capture time of {} to {}", path.display(), timestamp)
            }
            Event::Downloaded { id, to } => info!("Downloaded {} to {}", id, to.display()),
            Event::Uploaded { path } => info!("Uploaded {}", path.display()),
            Event::RunFinished { transformed, skipped, failed, total } => info!(
                "Jobs completed. Processed {} of {} files ({} skipped, {} failed)",
                transformed, total, skipped, failed
            ),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.record(Event::FileStarted { path: PathBuf::from("a.jpg") });
        sink.record(Event::Skipped { path: PathBuf::from("a.jpg"), reason: "exists".into() });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Event::Skipped { .. }));
    }
}
