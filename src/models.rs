use serde::{Deserialize, Serialize};

// Source-side domain records extracted from an Anki package.
//
// These mirror what the embedded collection database actually contains,
// validated into typed records at the extraction boundary. Persisted
// (destination-side) models live in `db::models`.

/// A note extracted from the embedded collection database.
///
/// `front`/`back` are derived by the field segmenter and are always
/// recomputable from `raw_fields`; `raw_fields` stays authoritative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteRecord {
    pub id: i64,
    pub guid: String,
    pub model_id: i64,
    pub tags: Vec<String>,
    pub raw_fields: String,
    pub front: String,
    pub back: String,
}

/// A card row joined to its note and deck.
///
/// `card_type` and `queue` are scheduling metadata carried through unchanged;
/// the engine never interprets them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardRecord {
    pub card_id: i64,
    pub note_id: i64,
    pub deck_id: i64,
    pub ordinal: i64,
    pub card_type: i64,
    pub queue: i64,
}

/// A card paired with its source note, as attached to deck tree nodes.
#[derive(Debug, Clone)]
pub struct EnrichedCard {
    pub card: CardRecord,
    pub note: NoteRecord,
}

/// Coarse media classification derived from the resolved filename extension.
///
/// Only `Image` assets are eligible for the optional transcoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeCategory {
    Image,
    Audio,
    Video,
    Other,
}

impl MimeCategory {
    pub fn from_filename(filename: &str) -> Self {
        match extension(filename).as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "svg" | "bmp" => MimeCategory::Image,
            "mp3" | "ogg" | "wav" | "m4a" | "flac" | "opus" => MimeCategory::Audio,
            "mp4" | "webm" | "mov" | "mkv" => MimeCategory::Video,
            _ => MimeCategory::Other,
        }
    }
}

/// Content type for a media filename, used when uploading to the object store.
pub fn content_type(filename: &str) -> &'static str {
    match extension(filename).as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        "opus" => "audio/opus",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

fn extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}
