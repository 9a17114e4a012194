// # Import Service - Orchestrator
//
// Drives the full pipeline: archive open -> extraction -> media
// reconciliation -> hierarchy -> fingerprint -> dedup analysis -> media
// upload -> conversion -> batched persistence -> roll-up recompute.
//
// Only archive/database errors abort a run. Everything downstream of the
// analysis is failure-tolerant: the result always carries the extraction,
// structure and dedup information that was computed, whatever happened to
// persistence.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::apkg::archive::{ApkgArchive, ArchiveError};
use crate::apkg::extractor::{self, ExtractError};
use crate::apkg::media;
use crate::dedup::{DeduplicationAnalyzer, DeduplicationDecision};
use crate::db::{Datastore, DbCollection, DbDeck, DbFlashcard};
use crate::fingerprint;
use crate::hierarchy::{self, DeckTree};
use crate::identity;
use crate::import::media_upload::MediaUploadPipeline;
use crate::import::persister::{DeckPersister, PreparedDeck};
use crate::import::progress::{NoopProgress, ProgressObserver, ProgressReporter};
use crate::import::types::{DuplicateHandling, ImportOptions, ImportResult, PreviewResult};
use crate::object_store::ObjectStore;
use crate::transcoder::MediaTranscoder;

/// Batch widths for the bounded-concurrency stages.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Media uploads issued concurrently per batch window.
    pub media_batch_size: usize,
    /// Decks written concurrently per batch window.
    pub persist_batch_size: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            media_batch_size: 24,
            persist_batch_size: 8,
        }
    }
}

/// Errors that abort an import before any analysis is available.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// The import engine. All collaborators are injected once by the composition
/// root; the service holds no global state.
pub struct ImportService {
    datastore: Arc<dyn Datastore>,
    object_store: Arc<dyn ObjectStore>,
    transcoder: Option<Arc<dyn MediaTranscoder>>,
    observer: Arc<dyn ProgressObserver>,
    config: ImportConfig,
}

impl ImportService {
    pub fn new(
        datastore: Arc<dyn Datastore>,
        object_store: Arc<dyn ObjectStore>,
        transcoder: Option<Arc<dyn MediaTranscoder>>,
        observer: Arc<dyn ProgressObserver>,
        config: ImportConfig,
    ) -> Self {
        ImportService {
            datastore,
            object_store,
            transcoder,
            observer,
            config,
        }
    }

    /// Service with no transcoder, no progress observer and default batching.
    pub fn with_defaults(datastore: Arc<dyn Datastore>, object_store: Arc<dyn ObjectStore>) -> Self {
        Self::new(
            datastore,
            object_store,
            None,
            Arc::new(NoopProgress),
            ImportConfig::default(),
        )
    }

    /// Run the complete pipeline including persistence.
    pub async fn import_full(
        &self,
        archive_bytes: &[u8],
        owner_id: &str,
        options: ImportOptions,
    ) -> Result<ImportResult, ImportError> {
        let progress = ProgressReporter::new(self.observer.clone());

        progress.report(2, "Reading archive");
        let archive = ApkgArchive::open(archive_bytes)?;

        progress.report(10, "Extracting notes and cards");
        let collection = extractor::extract(archive.database()).await?;
        progress.report(20, &format!("Parsed {} notes", collection.notes.len()));

        let reconciled = media::reconcile(&archive, &collection.notes);
        progress.report(30, &format!("Reconciled {} media entries", reconciled.assets.len()));

        let tree = hierarchy::build(&collection.deck_names, &collection.cards, &collection.notes);
        let deck_paths = tree.deck_paths();
        let deck_name_list: Vec<String> = collection.deck_names.values().cloned().collect();
        let fp = fingerprint::fingerprint(&deck_name_list);
        let suggested = fingerprint::suggest_collection_name(&deck_name_list);
        let collection_name = options.collection_name.clone().unwrap_or(suggested);
        progress.report(40, "Built deck hierarchy");

        let analyzer = DeduplicationAnalyzer::new(self.datastore.as_ref());
        let dedup = analyzer.analyze(owner_id, &fp, &deck_paths).await;
        progress.report(50, "Analyzed duplicates");

        let mut result = ImportResult {
            collection_id: None,
            collection_name: collection_name.clone(),
            fingerprint: fp.clone(),
            dedup: dedup.clone(),
            note_count: collection.notes.len(),
            card_count: collection.cards.len(),
            deck_paths,
            decks_persisted: 0,
            flashcards_persisted: 0,
            media_uploaded: 0,
            media_unresolved: reconciled.unresolved,
            deck_errors: Vec::new(),
            persistence_error: None,
        };

        if !options.save_to_database {
            progress.report(100, "Analysis complete (persistence not requested)");
            return Ok(result);
        }

        let uploader = MediaUploadPipeline::new(self.object_store.clone(), self.transcoder.clone());
        let folder = format!("apkg-media/{}", owner_id);
        let upload = uploader
            .upload_all(&reconciled.assets, &folder, self.config.media_batch_size, |done, total| {
                let percent = 50 + (done * 20 / total.max(1)) as u8;
                progress.report(percent, &format!("Uploaded media {}/{}", done, total));
            })
            .await;
        result.media_uploaded = upload.uploaded;
        progress.report(70, "Media upload complete");

        let collection_id = dedup
            .collection_id
            .clone()
            .unwrap_or_else(|| identity::collection_id(owner_id, &collection_name));
        let db_collection = DbCollection::new(
            &collection_id,
            owner_id,
            &collection_name,
            &fp.hash,
            options.cover_image_url.clone(),
        );
        let prepared = convert_decks(
            &tree,
            owner_id,
            &collection_name,
            &collection_id,
            &dedup,
            options.duplicate_handling,
            &upload.urls,
        );
        progress.report(75, &format!("Converted {} decks", prepared.len()));

        if let Err(e) = self.datastore.upsert_collection(&db_collection).await {
            warn!("collection write failed, keeping analysis results: {}", e);
            result.persistence_error = Some(e.to_string());
            progress.report(100, "Import finished with persistence failure");
            return Ok(result);
        }
        result.collection_id = Some(collection_id);

        let persister = DeckPersister::new(self.datastore.as_ref());
        let outcome = persister
            .persist(&prepared, self.config.persist_batch_size, |done, total| {
                let percent = 75 + (done * 15 / total.max(1)) as u8;
                progress.report(percent, &format!("Persisted deck {}/{}", done, total));
            })
            .await;
        result.decks_persisted = outcome.decks_written;
        result.flashcards_persisted = outcome.flashcards_written;

        progress.report(92, "Updating collection totals");
        if let Err(e) = persister.recompute_counts(&db_collection, &prepared, &outcome).await {
            warn!("roll-up recompute failed: {}", e);
            result.persistence_error = Some(e);
        }
        result.deck_errors = outcome.deck_errors;

        info!(
            "import complete for {}: {} decks, {} flashcards, {} media, {} deck failures",
            collection_name,
            result.decks_persisted,
            result.flashcards_persisted,
            result.media_uploaded,
            result.deck_errors.len()
        );
        progress.report(100, "Import complete");
        Ok(result)
    }

    /// Run extraction through dedup analysis only: no media upload, no
    /// persistence. Shows the caller what a full import would do.
    pub async fn import_preview(
        &self,
        archive_bytes: &[u8],
        owner_id: &str,
        options: ImportOptions,
    ) -> Result<PreviewResult, ImportError> {
        let progress = ProgressReporter::new(self.observer.clone());

        progress.report(2, "Reading archive");
        let archive = ApkgArchive::open(archive_bytes)?;

        progress.report(10, "Extracting notes and cards");
        let collection = extractor::extract(archive.database()).await?;
        progress.report(30, &format!("Parsed {} notes", collection.notes.len()));

        let reconciled = media::reconcile(&archive, &collection.notes);

        let tree = hierarchy::build(&collection.deck_names, &collection.cards, &collection.notes);
        let deck_paths = tree.deck_paths();
        let deck_name_list: Vec<String> = collection.deck_names.values().cloned().collect();
        let fp = fingerprint::fingerprint(&deck_name_list);
        let suggested = options
            .collection_name
            .unwrap_or_else(|| fingerprint::suggest_collection_name(&deck_name_list));
        progress.report(60, "Built deck hierarchy");

        let analyzer = DeduplicationAnalyzer::new(self.datastore.as_ref());
        let dedup = analyzer.analyze(owner_id, &fp, &deck_paths).await;
        progress.report(100, "Preview complete");

        Ok(PreviewResult {
            suggested_name: suggested,
            fingerprint: fp,
            dedup,
            deck_paths,
            note_count: collection.notes.len(),
            card_count: collection.cards.len(),
            media_count: reconciled.assets.len(),
            media_unresolved: reconciled.unresolved,
        })
    }
}

/// Flatten the hierarchy into persistable records, honoring the duplicate
/// handling policy. Flashcard identity hashes the original front/back, so
/// media URL rewriting never perturbs ids across runs.
fn convert_decks(
    tree: &DeckTree,
    owner_id: &str,
    collection_name: &str,
    collection_id: &str,
    dedup: &DeduplicationDecision,
    handling: DuplicateHandling,
    media_urls: &HashMap<String, String>,
) -> Vec<PreparedDeck> {
    let skip: HashSet<&str> = match handling {
        DuplicateHandling::Ignore => dedup.existing_decks.iter().map(String::as_str).collect(),
        DuplicateHandling::Overwrite => HashSet::new(),
    };

    let mut prepared = Vec::new();
    for node in tree.decks_with_cards() {
        if skip.contains(node.full_path.as_str()) {
            continue;
        }

        let deck_id = identity::deck_id(owner_id, collection_name, &node.full_path);
        let deck = DbDeck::new(&deck_id, collection_id, &node.name, &node.full_path, node.level as i64);

        let mut flashcards = Vec::with_capacity(node.cards.len());
        for (index, enriched) in node.cards.iter().enumerate() {
            let id = identity::flashcard_id(
                owner_id,
                collection_name,
                &node.full_path,
                index,
                &enriched.note.front,
                &enriched.note.back,
                enriched.note.id,
            );
            flashcards.push(DbFlashcard::new(
                &id,
                &deck_id,
                rewrite_media_refs(&enriched.note.front, media_urls),
                rewrite_media_refs(&enriched.note.back, media_urls),
                index as i64,
                &enriched.note.tags.join(" "),
                &enriched.note.guid,
                enriched.card.card_type,
                enriched.card.queue,
            ));
        }

        prepared.push(PreparedDeck { deck, flashcards });
    }
    prepared
}

/// Point note references at the uploaded public URLs.
fn rewrite_media_refs(text: &str, urls: &HashMap<String, String>) -> String {
    if urls.is_empty() {
        return text.to_string();
    }
    let mut rewritten = text.to_string();
    for (name, url) in urls {
        rewritten = rewritten.replace(&format!("src=\"{}\"", name), &format!("src=\"{}\"", url));
        rewritten = rewritten.replace(&format!("[sound:{}]", name), &format!("[sound:{}]", url));
    }
    rewritten
}
