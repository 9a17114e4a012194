// Duplicate-import analysis. Classifies a parsed archive against the owner's
// existing collections before anything is written. Strictly read-only: the
// analyzer never mutates the datastore, and a dead backend degrades to a
// local-only decision instead of failing the run.

use tracing::{debug, warn};

use crate::db::{Datastore, DatastoreError};
use crate::fingerprint::StructureFingerprint;
use crate::hierarchy::HIERARCHY_SEPARATOR;

/// Name-overlap percentage above which another collection counts as similar.
pub const SIMILARITY_THRESHOLD: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupAction {
    /// No fingerprint match, no similar collections: import as new.
    Create,
    /// Fingerprint matched; some decks exist, some are new.
    Merge,
    /// Fingerprint matched; every deck already exists.
    Update,
    /// Fingerprint matched but no deck-name overlap.
    Add,
    /// No fingerprint match, but similar collections exist. Terminal for the
    /// engine; the caller resolves it and re-invokes with an explicit
    /// duplicate-handling choice.
    AskUser,
}

#[derive(Debug, Clone)]
pub struct SimilarCollection {
    pub collection_id: String,
    pub name: String,
    pub overlap_percent: f64,
}

/// Computed once per import run; read-only afterward.
#[derive(Debug, Clone)]
pub struct DeduplicationDecision {
    pub action: DedupAction,
    pub collection_exists: bool,
    pub collection_id: Option<String>,
    /// Incoming deck paths that match a deck already in the collection.
    pub existing_decks: Vec<String>,
    /// Incoming deck paths with no counterpart in the collection.
    pub new_decks: Vec<String>,
    pub similar_collections: Vec<SimilarCollection>,
    pub duplicate_percentage: f64,
}

impl DeduplicationDecision {
    /// Local-only fallback used when the backend is unavailable.
    fn local_only(deck_paths: &[String]) -> Self {
        DeduplicationDecision {
            action: DedupAction::Create,
            collection_exists: false,
            collection_id: None,
            existing_decks: Vec::new(),
            new_decks: deck_paths.to_vec(),
            similar_collections: Vec::new(),
            duplicate_percentage: 0.0,
        }
    }
}

pub struct DeduplicationAnalyzer<'a> {
    datastore: &'a dyn Datastore,
}

impl<'a> DeduplicationAnalyzer<'a> {
    pub fn new(datastore: &'a dyn Datastore) -> Self {
        DeduplicationAnalyzer { datastore }
    }

    /// Classify the import. Never fails: backend errors degrade to a
    /// local-only decision.
    pub async fn analyze(
        &self,
        owner_id: &str,
        fingerprint: &StructureFingerprint,
        deck_paths: &[String],
    ) -> DeduplicationDecision {
        match self.analyze_inner(owner_id, fingerprint, deck_paths).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!("dedup backend unavailable, using local-only analysis: {}", e);
                DeduplicationDecision::local_only(deck_paths)
            }
        }
    }

    async fn analyze_inner(
        &self,
        owner_id: &str,
        fingerprint: &StructureFingerprint,
        deck_paths: &[String],
    ) -> Result<DeduplicationDecision, DatastoreError> {
        if let Some(collection) = self
            .datastore
            .find_collection_by_fingerprint(owner_id, &fingerprint.hash)
            .await?
        {
            debug!("fingerprint {} matches collection {}", fingerprint.hash, collection.id);
            let known = self.datastore.decks_for_collection(&collection.id).await?;

            let mut existing = Vec::new();
            let mut new = Vec::new();
            for path in deck_paths {
                if known.iter().any(|deck| deck_matches(deck_path_leaf(path), path, &deck.name, &deck.full_path)) {
                    existing.push(path.clone());
                } else {
                    new.push(path.clone());
                }
            }

            let duplicate_percentage = percentage(existing.len(), deck_paths.len());
            let action = if existing.is_empty() {
                DedupAction::Add
            } else if new.is_empty() {
                DedupAction::Update
            } else {
                DedupAction::Merge
            };

            return Ok(DeduplicationDecision {
                action,
                collection_exists: true,
                collection_id: Some(collection.id),
                existing_decks: existing,
                new_decks: new,
                similar_collections: Vec::new(),
                duplicate_percentage,
            });
        }

        // No fingerprint match: scan the owner's other collections for
        // name overlap.
        let mut similar = Vec::new();
        let mut best_overlap = 0.0f64;
        for collection in self.datastore.collections_for_owner(owner_id).await? {
            let known = self.datastore.decks_for_collection(&collection.id).await?;
            let matching = deck_paths
                .iter()
                .filter(|path| {
                    known
                        .iter()
                        .any(|deck| deck_matches(deck_path_leaf(path), path, &deck.name, &deck.full_path))
                })
                .count();
            let overlap = percentage(matching, deck_paths.len());
            if overlap > SIMILARITY_THRESHOLD {
                similar.push(SimilarCollection {
                    collection_id: collection.id,
                    name: collection.name,
                    overlap_percent: overlap,
                });
            }
            best_overlap = best_overlap.max(overlap);
        }

        let action = if similar.is_empty() {
            DedupAction::Create
        } else {
            DedupAction::AskUser
        };

        Ok(DeduplicationDecision {
            action,
            collection_exists: false,
            collection_id: None,
            existing_decks: Vec::new(),
            new_decks: deck_paths.to_vec(),
            similar_collections: similar,
            duplicate_percentage: best_overlap,
        })
    }
}

/// A deck matches when either the leaf name or the full hierarchy path lines up.
fn deck_matches(leaf: &str, path: &str, known_name: &str, known_path: &str) -> bool {
    path == known_path || leaf == known_name
}

fn deck_path_leaf(path: &str) -> &str {
    path.rsplit(HIERARCHY_SEPARATOR).next().unwrap_or(path)
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64) * 100.0
    }
}
