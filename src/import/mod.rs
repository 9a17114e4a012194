// # Import Module
//
// Pipeline orchestration with focused, testable components:
//
// - **MediaUploadPipeline**: bounded-batch media upload with optional transcode
// - **DeckPersister**: batched deck/flashcard writes with per-deck failure tolerance
// - **ProgressReporter**: injected, monotonic progress reporting
// - **ImportService**: orchestrates the import workflow
//
// Public API:
// - `ImportService`: run `import_full` / `import_preview`
// - `ImportOptions` / `ImportConfig`: per-run options and batch widths
// - `ImportResult` / `PreviewResult`: always-populated run results

mod media_upload;
mod persister;
mod progress;
mod service;
mod types;

pub use media_upload::{MediaUploadOutcome, MediaUploadPipeline};
pub use persister::{DeckPersister, PersistOutcome, PreparedDeck};
pub use progress::{ChannelProgress, NoopProgress, ProgressObserver, ProgressReporter};
pub use service::{ImportConfig, ImportError, ImportService};
pub use types::{DeckWriteError, DuplicateHandling, ImportOptions, ImportResult, PreviewResult};
