use crate::dedup::DeduplicationDecision;
use crate::fingerprint::StructureFingerprint;

/// What to do with decks that already exist in the matched collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateHandling {
    /// Drop incoming decks whose name/path matches an existing deck.
    #[default]
    Ignore,
    /// Keep everything and update existing decks in place.
    Overwrite,
}

/// Caller-supplied options for one import run.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Overrides the suggested collection name.
    pub collection_name: Option<String>,
    /// Attached to the persisted collection.
    pub cover_image_url: Option<String>,
    /// When false the pipeline stops after analysis; nothing is uploaded or
    /// written.
    pub save_to_database: bool,
    pub duplicate_handling: DuplicateHandling,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            collection_name: None,
            cover_image_url: None,
            save_to_database: true,
            duplicate_handling: DuplicateHandling::default(),
        }
    }
}

/// A deck that failed to persist. Non-fatal: siblings continue.
#[derive(Debug, Clone)]
pub struct DeckWriteError {
    pub deck_path: String,
    pub error: String,
}

/// Result of a full import run. Extraction/structure/dedup fields are always
/// populated, even when persistence partially or fully failed.
#[derive(Debug)]
pub struct ImportResult {
    /// Set once the collection row was written.
    pub collection_id: Option<String>,
    pub collection_name: String,
    pub fingerprint: StructureFingerprint,
    pub dedup: DeduplicationDecision,
    pub note_count: usize,
    pub card_count: usize,
    pub deck_paths: Vec<String>,
    pub decks_persisted: usize,
    pub flashcards_persisted: usize,
    pub media_uploaded: usize,
    /// Media entries whose filename reconciliation stayed ambiguous.
    pub media_unresolved: usize,
    pub deck_errors: Vec<DeckWriteError>,
    /// Run-level persistence failure. The analysis above is still valid.
    pub persistence_error: Option<String>,
}

/// Result of a preview run: extraction through dedup analysis, no side effects.
#[derive(Debug)]
pub struct PreviewResult {
    pub suggested_name: String,
    pub fingerprint: StructureFingerprint,
    pub dedup: DeduplicationDecision,
    pub deck_paths: Vec<String>,
    pub note_count: usize,
    pub card_count: usize,
    pub media_count: usize,
    pub media_unresolved: usize,
}
