use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::info;

use crate::db::models::{DbCollection, DbDeck, DbFlashcard};

#[derive(Error, Debug)]
pub enum DatastoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("datastore error: {0}")]
    Other(String),
}

/// Read/write surface over the destination collections/decks/flashcards
/// relations. The engine only ever talks to this trait; the composition root
/// picks the implementation once.
#[async_trait]
pub trait Datastore: Send + Sync {
    async fn find_collection_by_fingerprint(
        &self,
        owner_id: &str,
        fingerprint: &str,
    ) -> Result<Option<DbCollection>, DatastoreError>;

    async fn collections_for_owner(&self, owner_id: &str) -> Result<Vec<DbCollection>, DatastoreError>;

    async fn decks_for_collection(&self, collection_id: &str) -> Result<Vec<DbDeck>, DatastoreError>;

    async fn upsert_collection(&self, collection: &DbCollection) -> Result<(), DatastoreError>;

    async fn upsert_deck(&self, deck: &DbDeck) -> Result<(), DatastoreError>;

    async fn insert_flashcards(&self, flashcards: &[DbFlashcard]) -> Result<(), DatastoreError>;

    async fn flashcard_count_for_deck(&self, deck_id: &str) -> Result<i64, DatastoreError>;

    async fn update_deck_card_count(&self, deck_id: &str, count: i64) -> Result<(), DatastoreError>;

    async fn update_collection_totals(
        &self,
        collection_id: &str,
        deck_count: i64,
        card_count: i64,
    ) -> Result<(), DatastoreError>;
}

/// Reference SQLite-backed datastore.
#[derive(Debug, Clone)]
pub struct SqliteDatastore {
    pool: SqlitePool,
}

impl SqliteDatastore {
    /// Initialize database connection and create tables
    pub async fn new(database_path: &str) -> Result<Self, DatastoreError> {
        // Use sqlite:// with ?mode=rwc to create if it doesn't exist
        let database_url = format!("sqlite://{}?mode=rwc", database_path);
        info!("Connecting to {}", database_url);
        let pool = SqlitePool::connect(&database_url).await?;

        let db = SqliteDatastore { pool };
        db.create_tables().await?;
        Ok(db)
    }

    /// Create all necessary tables
    async fn create_tables(&self) -> Result<(), DatastoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                name TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                cover_image_url TEXT,
                deck_count INTEGER NOT NULL DEFAULT 0,
                card_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS decks (
                id TEXT PRIMARY KEY,
                collection_id TEXT NOT NULL,
                name TEXT NOT NULL,
                full_path TEXT NOT NULL,
                level INTEGER NOT NULL DEFAULT 0,
                card_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (collection_id) REFERENCES collections (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS flashcards (
                id TEXT PRIMARY KEY,
                deck_id TEXT NOT NULL,
                front TEXT NOT NULL,
                back TEXT NOT NULL,
                position INTEGER NOT NULL DEFAULT 0,
                tags TEXT NOT NULL DEFAULT '',
                note_guid TEXT NOT NULL DEFAULT '',
                card_type INTEGER NOT NULL DEFAULT 0,
                queue INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (deck_id) REFERENCES decks (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS ix_collections_owner ON collections (owner_id, fingerprint)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS ix_decks_collection ON decks (collection_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS ix_flashcards_deck ON flashcards (deck_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn collection_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<DbCollection, sqlx::Error> {
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(DbCollection {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        name: row.try_get("name")?,
        fingerprint: row.try_get("fingerprint")?,
        cover_image_url: row.try_get("cover_image_url")?,
        deck_count: row.try_get("deck_count")?,
        card_count: row.try_get("card_count")?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn deck_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<DbDeck, sqlx::Error> {
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(DbDeck {
        id: row.try_get("id")?,
        collection_id: row.try_get("collection_id")?,
        name: row.try_get("name")?,
        full_path: row.try_get("full_path")?,
        level: row.try_get("level")?,
        card_count: row.try_get("card_count")?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

#[async_trait]
impl Datastore for SqliteDatastore {
    async fn find_collection_by_fingerprint(
        &self,
        owner_id: &str,
        fingerprint: &str,
    ) -> Result<Option<DbCollection>, DatastoreError> {
        let row = sqlx::query(
            "SELECT * FROM collections WHERE owner_id = ? AND fingerprint = ? LIMIT 1",
        )
        .bind(owner_id)
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(collection_from_row).transpose().map_err(Into::into)
    }

    async fn collections_for_owner(&self, owner_id: &str) -> Result<Vec<DbCollection>, DatastoreError> {
        let rows = sqlx::query("SELECT * FROM collections WHERE owner_id = ? ORDER BY name")
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(collection_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    async fn decks_for_collection(&self, collection_id: &str) -> Result<Vec<DbDeck>, DatastoreError> {
        let rows = sqlx::query("SELECT * FROM decks WHERE collection_id = ? ORDER BY full_path")
            .bind(collection_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(deck_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    async fn upsert_collection(&self, collection: &DbCollection) -> Result<(), DatastoreError> {
        sqlx::query(
            r#"
            INSERT INTO collections (id, owner_id, name, fingerprint, cover_image_url, deck_count, card_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                fingerprint = excluded.fingerprint,
                cover_image_url = excluded.cover_image_url,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&collection.id)
        .bind(&collection.owner_id)
        .bind(&collection.name)
        .bind(&collection.fingerprint)
        .bind(&collection.cover_image_url)
        .bind(collection.deck_count)
        .bind(collection.card_count)
        .bind(collection.created_at.to_rfc3339())
        .bind(collection.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_deck(&self, deck: &DbDeck) -> Result<(), DatastoreError> {
        sqlx::query(
            r#"
            INSERT INTO decks (id, collection_id, name, full_path, level, card_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                full_path = excluded.full_path,
                level = excluded.level,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&deck.id)
        .bind(&deck.collection_id)
        .bind(&deck.name)
        .bind(&deck.full_path)
        .bind(deck.level)
        .bind(deck.card_count)
        .bind(deck.created_at.to_rfc3339())
        .bind(deck.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_flashcards(&self, flashcards: &[DbFlashcard]) -> Result<(), DatastoreError> {
        let mut tx = self.pool.begin().await?;
        for card in flashcards {
            sqlx::query(
                r#"
                INSERT INTO flashcards (id, deck_id, front, back, position, tags, note_guid, card_type, queue, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    front = excluded.front,
                    back = excluded.back,
                    position = excluded.position,
                    tags = excluded.tags,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&card.id)
            .bind(&card.deck_id)
            .bind(&card.front)
            .bind(&card.back)
            .bind(card.position)
            .bind(&card.tags)
            .bind(&card.note_guid)
            .bind(card.card_type)
            .bind(card.queue)
            .bind(card.created_at.to_rfc3339())
            .bind(card.updated_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn flashcard_count_for_deck(&self, deck_id: &str) -> Result<i64, DatastoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM flashcards WHERE deck_id = ?")
            .bind(deck_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    async fn update_deck_card_count(&self, deck_id: &str, count: i64) -> Result<(), DatastoreError> {
        sqlx::query("UPDATE decks SET card_count = ?, updated_at = ? WHERE id = ?")
            .bind(count)
            .bind(Utc::now().to_rfc3339())
            .bind(deck_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_collection_totals(
        &self,
        collection_id: &str,
        deck_count: i64,
        card_count: i64,
    ) -> Result<(), DatastoreError> {
        sqlx::query("UPDATE collections SET deck_count = ?, card_count = ?, updated_at = ? WHERE id = ?")
            .bind(deck_count)
            .bind(card_count)
            .bind(Utc::now().to_rfc3339())
            .bind(collection_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
