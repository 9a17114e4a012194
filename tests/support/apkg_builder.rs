// Builds synthetic .apkg fixtures: a real SQLite collection database zipped
// together with a media manifest and payloads.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use sqlx::SqlitePool;

/// One note in a synthetic package. The raw field blob is front + 0x1F + back.
#[derive(Debug, Clone)]
pub struct TestNote {
    pub deck: &'static str,
    pub front: String,
    pub back: String,
}

impl TestNote {
    pub fn new(deck: &'static str, front: &str, back: &str) -> Self {
        TestNote {
            deck,
            front: front.to_string(),
            back: back.to_string(),
        }
    }
}

/// Build a legacy-format package with one card per note and the given media
/// entries (declared filename, payload bytes).
pub async fn build_apkg(notes: &[TestNote], media: &[(&str, &[u8])]) -> Vec<u8> {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("collection.anki2");

    let pool = SqlitePool::connect(&format!("sqlite://{}?mode=rwc", db_path.display()))
        .await
        .expect("create collection db");

    sqlx::query(
        "CREATE TABLE notes (id INTEGER PRIMARY KEY, guid TEXT, mid INTEGER, tags TEXT, flds TEXT)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TABLE cards (id INTEGER PRIMARY KEY, nid INTEGER, did INTEGER, ord INTEGER, type INTEGER, queue INTEGER)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("CREATE TABLE decks (id INTEGER PRIMARY KEY, name TEXT)")
        .execute(&pool)
        .await
        .unwrap();

    // Stable deck ids derived from first-seen order.
    let mut deck_ids: BTreeMap<&str, i64> = BTreeMap::new();
    for note in notes {
        let next = 100 + deck_ids.len() as i64;
        deck_ids.entry(note.deck).or_insert(next);
    }
    for (name, id) in &deck_ids {
        sqlx::query("INSERT INTO decks (id, name) VALUES (?, ?)")
            .bind(id)
            .bind(name)
            .execute(&pool)
            .await
            .unwrap();
    }

    for (index, note) in notes.iter().enumerate() {
        let note_id = index as i64 + 1;
        let flds = format!("{}\u{1f}{}", note.front, note.back);
        sqlx::query("INSERT INTO notes (id, guid, mid, tags, flds) VALUES (?, ?, ?, ?, ?)")
            .bind(note_id)
            .bind(format!("guid-{}", note_id))
            .bind(1i64)
            .bind("")
            .bind(&flds)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO cards (id, nid, did, ord, type, queue) VALUES (?, ?, ?, 0, 0, 0)")
            .bind(1000 + note_id)
            .bind(note_id)
            .bind(deck_ids[note.deck])
            .execute(&pool)
            .await
            .unwrap();
    }

    pool.close().await;
    let db_bytes = std::fs::read(&db_path).expect("read collection db");

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();

    writer.start_file("collection.anki2", options).unwrap();
    writer.write_all(&db_bytes).unwrap();

    let manifest: BTreeMap<String, &str> = media
        .iter()
        .enumerate()
        .map(|(index, (name, _))| (index.to_string(), *name))
        .collect();
    writer.start_file("media", options).unwrap();
    writer
        .write_all(serde_json::to_string(&manifest).unwrap().as_bytes())
        .unwrap();

    for (index, (_, bytes)) in media.iter().enumerate() {
        writer.start_file(index.to_string(), options).unwrap();
        writer.write_all(bytes).unwrap();
    }

    writer.finish().unwrap().into_inner()
}
