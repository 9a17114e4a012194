use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use mnemo_import::db::{Datastore, DatastoreError, DbCollection, DbDeck, DbFlashcard};

/// In-memory datastore with failure injection.
#[derive(Default)]
pub struct MockDatastore {
    pub collections: Mutex<HashMap<String, DbCollection>>,
    pub decks: Mutex<HashMap<String, DbDeck>>,
    pub flashcards: Mutex<HashMap<String, DbFlashcard>>,
    /// Deck full paths whose upsert fails.
    pub fail_deck_paths: Mutex<HashSet<String>>,
    /// When set, every call fails (backend unreachable).
    pub fail_all: AtomicBool,
}

impl MockDatastore {
    pub fn new() -> Self {
        MockDatastore::default()
    }

    pub fn fail_deck(&self, full_path: &str) {
        self.fail_deck_paths.lock().unwrap().insert(full_path.to_string());
    }

    pub fn deck_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.decks.lock().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn flashcard_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.flashcards.lock().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.collections.lock().unwrap().is_empty()
            && self.decks.lock().unwrap().is_empty()
            && self.flashcards.lock().unwrap().is_empty()
    }

    fn check(&self) -> Result<(), DatastoreError> {
        if self.fail_all.load(Ordering::SeqCst) {
            Err(DatastoreError::Other("backend unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Datastore for MockDatastore {
    async fn find_collection_by_fingerprint(
        &self,
        owner_id: &str,
        fingerprint: &str,
    ) -> Result<Option<DbCollection>, DatastoreError> {
        self.check()?;
        Ok(self
            .collections
            .lock()
            .unwrap()
            .values()
            .find(|c| c.owner_id == owner_id && c.fingerprint == fingerprint)
            .cloned())
    }

    async fn collections_for_owner(&self, owner_id: &str) -> Result<Vec<DbCollection>, DatastoreError> {
        self.check()?;
        Ok(self
            .collections
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn decks_for_collection(&self, collection_id: &str) -> Result<Vec<DbDeck>, DatastoreError> {
        self.check()?;
        Ok(self
            .decks
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.collection_id == collection_id)
            .cloned()
            .collect())
    }

    async fn upsert_collection(&self, collection: &DbCollection) -> Result<(), DatastoreError> {
        self.check()?;
        self.collections
            .lock()
            .unwrap()
            .insert(collection.id.clone(), collection.clone());
        Ok(())
    }

    async fn upsert_deck(&self, deck: &DbDeck) -> Result<(), DatastoreError> {
        self.check()?;
        if self.fail_deck_paths.lock().unwrap().contains(&deck.full_path) {
            return Err(DatastoreError::Other(format!("injected failure for {}", deck.full_path)));
        }
        self.decks.lock().unwrap().insert(deck.id.clone(), deck.clone());
        Ok(())
    }

    async fn insert_flashcards(&self, flashcards: &[DbFlashcard]) -> Result<(), DatastoreError> {
        self.check()?;
        let mut store = self.flashcards.lock().unwrap();
        for card in flashcards {
            store.insert(card.id.clone(), card.clone());
        }
        Ok(())
    }

    async fn flashcard_count_for_deck(&self, deck_id: &str) -> Result<i64, DatastoreError> {
        self.check()?;
        Ok(self
            .flashcards
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.deck_id == deck_id)
            .count() as i64)
    }

    async fn update_deck_card_count(&self, deck_id: &str, count: i64) -> Result<(), DatastoreError> {
        self.check()?;
        if let Some(deck) = self.decks.lock().unwrap().get_mut(deck_id) {
            deck.card_count = count;
        }
        Ok(())
    }

    async fn update_collection_totals(
        &self,
        collection_id: &str,
        deck_count: i64,
        card_count: i64,
    ) -> Result<(), DatastoreError> {
        self.check()?;
        if let Some(collection) = self.collections.lock().unwrap().get_mut(collection_id) {
            collection.deck_count = deck_count;
            collection.card_count = card_count;
        }
        Ok(())
    }
}
