// Note and relationship extraction from the embedded collection database.
//
// Two fixed read queries (notes; cards) plus deck-name resolution. Every
// query failure is recovered locally: reduced-column retries first, then a
// synthetic one-card-per-note reconstruction, so extraction always yields at
// least the note-level data.

use std::collections::HashMap;
use std::path::PathBuf;

use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::apkg::segmenter;
use crate::models::{CardRecord, NoteRecord};

/// Deck used by the synthetic reconstruction path. Deliberately distinct from
/// Anki's default deck (id 1, "Default"), which the hierarchy pass excludes.
pub const FALLBACK_DECK_ID: i64 = -1;
pub const FALLBACK_DECK_NAME: &str = "Imported Deck";

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("collection database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Typed row from the notes query, validated at the extraction boundary.
#[derive(Debug)]
struct NoteRow {
    id: i64,
    guid: String,
    model_id: i64,
    tags: String,
    fields: String,
}

/// Typed row from the cards query.
#[derive(Debug)]
struct CardRow {
    id: i64,
    note_id: i64,
    deck_id: i64,
    ordinal: i64,
    card_type: i64,
    queue: i64,
}

#[derive(Debug)]
pub struct ExtractedCollection {
    pub notes: Vec<NoteRecord>,
    pub cards: Vec<CardRecord>,
    pub deck_names: HashMap<i64, String>,
    /// True when the card query failed or returned nothing and the
    /// one-card-per-note reconstruction produced the relationships.
    pub synthetic_cards: bool,
}

/// Extract notes, cards and deck names from a raw SQLite database image.
///
/// The image is written to a private scratch file (so journal-mode pragmas
/// cannot touch the archive bytes) and removed when extraction finishes.
pub async fn extract(database: &[u8]) -> Result<ExtractedCollection, ExtractError> {
    let scratch = ScratchDb::write(database)?;
    let url = format!("sqlite://{}", scratch.path.display());
    let pool = SqlitePool::connect(&url).await?;

    let result = extract_from_pool(&pool).await;
    pool.close().await;
    result
}

async fn extract_from_pool(pool: &SqlitePool) -> Result<ExtractedCollection, ExtractError> {
    let note_rows = match fetch_notes(pool).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!("notes query failed, retrying with reduced columns: {}", e);
            fetch_notes_reduced(pool).await?
        }
    };
    let notes: Vec<NoteRecord> = note_rows.into_iter().map(note_record).collect();

    let mut deck_names = fetch_deck_names(pool).await;

    let (cards, synthetic_cards) = match fetch_cards(pool).await {
        Ok(rows) if !rows.is_empty() => (rows.into_iter().map(card_record).collect(), false),
        Ok(_) => {
            debug!("cards query returned no rows, reconstructing one card per note");
            (synthetic_cards(&notes), true)
        }
        Err(e) => {
            warn!("cards query failed, reconstructing one card per note: {}", e);
            (synthetic_cards(&notes), true)
        }
    };

    if synthetic_cards {
        deck_names.insert(FALLBACK_DECK_ID, FALLBACK_DECK_NAME.to_string());
    }
    // Every card must stay attachable even when its deck row is missing.
    for card in &cards {
        deck_names
            .entry(card.deck_id)
            .or_insert_with(|| FALLBACK_DECK_NAME.to_string());
    }

    info!(
        "extracted {} notes, {} cards, {} decks{}",
        notes.len(),
        cards.len(),
        deck_names.len(),
        if synthetic_cards { " (synthetic cards)" } else { "" }
    );

    Ok(ExtractedCollection {
        notes,
        cards,
        deck_names,
        synthetic_cards,
    })
}

async fn fetch_notes(pool: &SqlitePool) -> Result<Vec<NoteRow>, sqlx::Error> {
    let rows = sqlx::query("SELECT id, guid, mid, tags, flds FROM notes ORDER BY id")
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|row| {
            Ok(NoteRow {
                id: row.try_get("id")?,
                guid: row.try_get("guid")?,
                model_id: row.try_get("mid")?,
                tags: row.try_get("tags")?,
                fields: row.try_get("flds")?,
            })
        })
        .collect()
}

/// Reduced-column retry for databases whose notes table deviates from the
/// standard schema. Only id and the field blob are essential.
async fn fetch_notes_reduced(pool: &SqlitePool) -> Result<Vec<NoteRow>, sqlx::Error> {
    let rows = sqlx::query("SELECT id, flds FROM notes ORDER BY id")
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|row| {
            let id: i64 = row.try_get("id")?;
            Ok(NoteRow {
                id,
                guid: id.to_string(),
                model_id: 0,
                tags: String::new(),
                fields: row.try_get("flds")?,
            })
        })
        .collect()
}

async fn fetch_cards(pool: &SqlitePool) -> Result<Vec<CardRow>, sqlx::Error> {
    let rows = sqlx::query("SELECT id, nid, did, ord, type, queue FROM cards ORDER BY id")
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|row| {
            Ok(CardRow {
                id: row.try_get("id")?,
                note_id: row.try_get("nid")?,
                deck_id: row.try_get("did")?,
                ordinal: row.try_get("ord")?,
                card_type: row.try_get("type")?,
                queue: row.try_get("queue")?,
            })
        })
        .collect()
}

/// Deck names by id. The modern schema keeps a `decks` table (hierarchy
/// separated by 0x1F); the legacy schema stores a JSON object in `col.decks`.
/// Both are normalized to the `::` convention. Never fails: an unreadable
/// deck catalog degrades to an empty map.
async fn fetch_deck_names(pool: &SqlitePool) -> HashMap<i64, String> {
    match sqlx::query("SELECT id, name FROM decks").fetch_all(pool).await {
        Ok(rows) => {
            let mut names = HashMap::new();
            for row in &rows {
                let id: i64 = match row.try_get("id") {
                    Ok(id) => id,
                    Err(_) => continue,
                };
                let name: String = match row.try_get("name") {
                    Ok(name) => name,
                    Err(_) => continue,
                };
                names.insert(id, name.replace('\u{1f}', "::"));
            }
            if !names.is_empty() {
                return names;
            }
        }
        Err(e) => debug!("no decks table, trying col JSON: {}", e),
    }

    deck_names_from_col(pool).await.unwrap_or_default()
}

async fn deck_names_from_col(pool: &SqlitePool) -> Option<HashMap<i64, String>> {
    let row = sqlx::query("SELECT decks FROM col LIMIT 1")
        .fetch_optional(pool)
        .await
        .ok()??;
    let raw: String = row.try_get("decks").ok()?;
    let parsed: serde_json::Value = serde_json::from_str(&raw).ok()?;

    let mut names = HashMap::new();
    for (id, deck) in parsed.as_object()? {
        let id = match id.parse::<i64>() {
            Ok(id) => id,
            Err(_) => continue,
        };
        if let Some(name) = deck.get("name").and_then(|n| n.as_str()) {
            names.insert(id, name.replace('\u{1f}', "::"));
        }
    }
    Some(names)
}

fn note_record(row: NoteRow) -> NoteRecord {
    let segmented = segmenter::segment(&row.fields);
    NoteRecord {
        id: row.id,
        guid: row.guid,
        model_id: row.model_id,
        tags: row.tags.split_whitespace().map(str::to_string).collect(),
        raw_fields: row.fields,
        front: segmented.front,
        back: segmented.back,
    }
}

fn card_record(row: CardRow) -> CardRecord {
    CardRecord {
        card_id: row.id,
        note_id: row.note_id,
        deck_id: row.deck_id,
        ordinal: row.ordinal,
        card_type: row.card_type,
        queue: row.queue,
    }
}

fn synthetic_cards(notes: &[NoteRecord]) -> Vec<CardRecord> {
    notes
        .iter()
        .map(|note| CardRecord {
            card_id: note.id,
            note_id: note.id,
            deck_id: FALLBACK_DECK_ID,
            ordinal: 0,
            card_type: 0,
            queue: 0,
        })
        .collect()
}

/// Scratch file holding the embedded database image for the read-only pool.
struct ScratchDb {
    path: PathBuf,
}

impl ScratchDb {
    fn write(database: &[u8]) -> Result<Self, std::io::Error> {
        let path = std::env::temp_dir().join(format!("mnemo_apkg_{}.db", Uuid::new_v4()));
        std::fs::write(&path, database)?;
        Ok(ScratchDb { path })
    }
}

impl Drop for ScratchDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn build_db(sql: &[&str]) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collection.anki2");
        let pool = SqlitePool::connect(&format!("sqlite://{}?mode=rwc", path.display()))
            .await
            .unwrap();
        for statement in sql {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }
        pool.close().await;
        std::fs::read(&path).unwrap()
    }

    const NOTES_TABLE: &str =
        "CREATE TABLE notes (id INTEGER PRIMARY KEY, guid TEXT, mid INTEGER, tags TEXT, flds TEXT)";
    const CARDS_TABLE: &str =
        "CREATE TABLE cards (id INTEGER PRIMARY KEY, nid INTEGER, did INTEGER, ord INTEGER, type INTEGER, queue INTEGER)";
    const DECKS_TABLE: &str = "CREATE TABLE decks (id INTEGER PRIMARY KEY, name TEXT)";

    #[tokio::test]
    async fn extracts_notes_cards_and_decks() {
        let db = build_db(&[
            NOTES_TABLE,
            CARDS_TABLE,
            DECKS_TABLE,
            "INSERT INTO notes VALUES (1, 'g1', 10, 'anatomy heart', 'front text\u{1f}back text')",
            "INSERT INTO cards VALUES (100, 1, 5, 0, 2, 1)",
            "INSERT INTO decks VALUES (5, 'Cardio\u{1f}Arrhythmia')",
        ])
        .await;

        let extracted = extract(&db).await.unwrap();
        assert!(!extracted.synthetic_cards);
        assert_eq!(extracted.notes.len(), 1);
        assert_eq!(extracted.notes[0].front, "front text");
        assert_eq!(extracted.notes[0].back, "back text");
        assert_eq!(extracted.notes[0].tags, vec!["anatomy", "heart"]);
        assert_eq!(extracted.cards.len(), 1);
        assert_eq!(extracted.cards[0].deck_id, 5);
        assert_eq!(extracted.cards[0].card_type, 2);
        // 0x1F-separated deck names are normalized to the :: convention.
        assert_eq!(extracted.deck_names.get(&5).map(String::as_str), Some("Cardio::Arrhythmia"));
    }

    #[tokio::test]
    async fn deck_names_fall_back_to_col_json() {
        let db = build_db(&[
            NOTES_TABLE,
            CARDS_TABLE,
            "CREATE TABLE col (id INTEGER PRIMARY KEY, decks TEXT)",
            "INSERT INTO notes VALUES (1, 'g1', 10, '', 'a\u{1f}b')",
            "INSERT INTO cards VALUES (100, 1, 7, 0, 0, 0)",
            r#"INSERT INTO col VALUES (1, '{"7": {"name": "Neuro::Stroke"}}')"#,
        ])
        .await;

        let extracted = extract(&db).await.unwrap();
        assert_eq!(extracted.deck_names.get(&7).map(String::as_str), Some("Neuro::Stroke"));
    }

    #[tokio::test]
    async fn missing_cards_table_reconstructs_one_card_per_note() {
        let db = build_db(&[
            NOTES_TABLE,
            "INSERT INTO notes VALUES (1, 'g1', 10, '', 'q1\u{1f}a1')",
            "INSERT INTO notes VALUES (2, 'g2', 10, '', 'q2\u{1f}a2')",
        ])
        .await;

        let extracted = extract(&db).await.unwrap();
        assert!(extracted.synthetic_cards);
        assert_eq!(extracted.cards.len(), 2);
        assert!(extracted.cards.iter().all(|c| c.deck_id == FALLBACK_DECK_ID));
        assert_eq!(
            extracted.deck_names.get(&FALLBACK_DECK_ID).map(String::as_str),
            Some(FALLBACK_DECK_NAME)
        );
    }

    #[tokio::test]
    async fn unknown_deck_ids_get_fallback_names() {
        let db = build_db(&[
            NOTES_TABLE,
            CARDS_TABLE,
            DECKS_TABLE,
            "INSERT INTO notes VALUES (1, 'g1', 10, '', 'q\u{1f}a')",
            "INSERT INTO cards VALUES (100, 1, 42, 0, 0, 0)",
        ])
        .await;

        let extracted = extract(&db).await.unwrap();
        assert!(!extracted.synthetic_cards);
        assert_eq!(extracted.deck_names.get(&42).map(String::as_str), Some(FALLBACK_DECK_NAME));
    }
}
