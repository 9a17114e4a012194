use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Destination-side models for the collections/decks/flashcards relations.
//
// All ids are deterministic (see `identity`): re-importing the same source
// material for the same owner upserts the same rows instead of duplicating
// them.

/// A persisted collection of decks, keyed by owner + structure fingerprint
/// for re-import detection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbCollection {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    /// Structure fingerprint over top-level deck prefixes (see `fingerprint`).
    pub fingerprint: String,
    pub cover_image_url: Option<String>,
    /// Roll-up totals, recomputed authoritatively after each import run.
    pub deck_count: i64,
    pub card_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbCollection {
    pub fn new(
        id: &str,
        owner_id: &str,
        name: &str,
        fingerprint: &str,
        cover_image_url: Option<String>,
    ) -> Self {
        let now = Utc::now();
        DbCollection {
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            fingerprint: fingerprint.to_string(),
            cover_image_url,
            deck_count: 0,
            card_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A persisted deck: one terminal node of the imported hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbDeck {
    pub id: String,
    pub collection_id: String,
    /// Leaf segment of the hierarchy path.
    pub name: String,
    /// Full `::`-delimited hierarchy path.
    pub full_path: String,
    pub level: i64,
    pub card_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbDeck {
    pub fn new(id: &str, collection_id: &str, name: &str, full_path: &str, level: i64) -> Self {
        let now = Utc::now();
        DbDeck {
            id: id.to_string(),
            collection_id: collection_id.to_string(),
            name: name.to_string(),
            full_path: full_path.to_string(),
            level,
            card_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A persisted flashcard.
///
/// `card_type` and `queue` are the source scheduling metadata, carried
/// through unchanged. `tags` keeps the source's space-separated form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbFlashcard {
    pub id: String,
    pub deck_id: String,
    pub front: String,
    pub back: String,
    /// Position within the deck; part of the deterministic identity.
    pub position: i64,
    pub tags: String,
    pub note_guid: String,
    pub card_type: i64,
    pub queue: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbFlashcard {
    pub fn new(
        id: &str,
        deck_id: &str,
        front: String,
        back: String,
        position: i64,
        tags: &str,
        note_guid: &str,
        card_type: i64,
        queue: i64,
    ) -> Self {
        let now = Utc::now();
        DbFlashcard {
            id: id.to_string(),
            deck_id: deck_id.to_string(),
            front,
            back,
            position,
            tags: tags.to_string(),
            note_guid: note_guid.to_string(),
            card_type,
            queue,
            created_at: now,
            updated_at: now,
        }
    }
}
