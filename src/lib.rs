pub mod backup;
pub mod error;
pub mod events;
pub mod exif;
pub mod exif_writer;
pub mod file_ops;
pub mod naming;
pub mod organizer;
pub mod remote;
pub mod resolver;
pub mod scanner;
pub mod stamp;
pub mod summary;
pub mod sync;
pub mod timestamp;

pub use error::{OrganizeError, Result};
pub use events::{Event, EventSink, LogSink, MemorySink};
pub use exif::{ExifCodec, ImageMetadata, MetadataCodec, WriteOutcome};
pub use organizer::{CancellationToken, Job, Organizer, RunConfig};
pub use resolver::ConflictPolicy;
pub use summary::RunSummary;
pub use timestamp::CaptureTimestamp;
