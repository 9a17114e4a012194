// Batched deck/flashcard persistence.
//
// Decks are written in fixed-size batch windows; a failed deck is recorded
// and skipped without aborting siblings or later batches. Roll-up counters
// are recomputed in a single authoritative re-read pass after all batches,
// never incrementally during the concurrent writes.

use std::collections::HashSet;

use futures::future::join_all;
use tracing::{info, warn};

use crate::db::{Datastore, DbCollection, DbDeck, DbFlashcard};
use crate::import::types::DeckWriteError;

/// A deck converted from the hierarchy, ready to write.
#[derive(Debug)]
pub struct PreparedDeck {
    pub deck: DbDeck,
    pub flashcards: Vec<DbFlashcard>,
}

#[derive(Debug, Default)]
pub struct PersistOutcome {
    pub decks_written: usize,
    pub flashcards_written: usize,
    pub deck_errors: Vec<DeckWriteError>,
}

pub struct DeckPersister<'a> {
    datastore: &'a dyn Datastore,
}

impl<'a> DeckPersister<'a> {
    pub fn new(datastore: &'a dyn Datastore) -> Self {
        DeckPersister { datastore }
    }

    pub async fn persist(
        &self,
        decks: &[PreparedDeck],
        batch_size: usize,
        mut on_batch: impl FnMut(usize, usize),
    ) -> PersistOutcome {
        let total = decks.len();
        let mut outcome = PersistOutcome::default();
        let mut completed = 0usize;

        for window in decks.chunks(batch_size.max(1)) {
            let writes = window.iter().map(|prepared| self.persist_deck(prepared));
            for (prepared, result) in window.iter().zip(join_all(writes).await) {
                completed += 1;
                match result {
                    Ok(count) => {
                        outcome.decks_written += 1;
                        outcome.flashcards_written += count;
                    }
                    Err(error) => {
                        warn!("skipping deck {} after write failure: {}", prepared.deck.full_path, error);
                        outcome.deck_errors.push(DeckWriteError {
                            deck_path: prepared.deck.full_path.clone(),
                            error,
                        });
                    }
                }
            }
            on_batch(completed, total);
        }

        info!(
            "persisted {}/{} decks ({} flashcards, {} failures)",
            outcome.decks_written,
            total,
            outcome.flashcards_written,
            outcome.deck_errors.len()
        );
        outcome
    }

    async fn persist_deck(&self, prepared: &PreparedDeck) -> Result<usize, String> {
        self.datastore
            .upsert_deck(&prepared.deck)
            .await
            .map_err(|e| format!("deck write failed: {}", e))?;
        self.datastore
            .insert_flashcards(&prepared.flashcards)
            .await
            .map_err(|e| format!("flashcard write failed: {}", e))?;
        Ok(prepared.flashcards.len())
    }

    /// Authoritative roll-up recompute over the successfully written decks.
    pub async fn recompute_counts(
        &self,
        collection: &DbCollection,
        decks: &[PreparedDeck],
        outcome: &PersistOutcome,
    ) -> Result<(), String> {
        let failed: HashSet<&str> = outcome
            .deck_errors
            .iter()
            .map(|e| e.deck_path.as_str())
            .collect();

        let mut deck_count = 0i64;
        let mut card_count = 0i64;
        for prepared in decks {
            if failed.contains(prepared.deck.full_path.as_str()) {
                continue;
            }
            let count = self
                .datastore
                .flashcard_count_for_deck(&prepared.deck.id)
                .await
                .map_err(|e| format!("count re-read failed for {}: {}", prepared.deck.full_path, e))?;
            self.datastore
                .update_deck_card_count(&prepared.deck.id, count)
                .await
                .map_err(|e| format!("deck count update failed for {}: {}", prepared.deck.full_path, e))?;
            deck_count += 1;
            card_count += count;
        }

        self.datastore
            .update_collection_totals(&collection.id, deck_count, card_count)
            .await
            .map_err(|e| format!("collection totals update failed: {}", e))
    }
}
