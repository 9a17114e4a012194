// Anki package import & reconciliation engine for the Mnemo study platform.
//
// Ingests a third-party flashcard archive (.apkg), normalizes it into a
// deduplicated collection of decks and flashcards, and persists it through
// injected collaborators (datastore, object store, optional transcoder).

pub mod apkg;
pub mod db;
pub mod dedup;
pub mod fingerprint;
pub mod hierarchy;
pub mod identity;
pub mod import;
pub mod models;
pub mod object_store;
pub mod transcoder;

pub use import::{
    ImportConfig, ImportError, ImportOptions, ImportResult, ImportService, PreviewResult,
};
