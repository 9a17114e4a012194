pub mod client;
pub mod models;

pub use client::{Datastore, DatastoreError, SqliteDatastore};
pub use models::{DbCollection, DbDeck, DbFlashcard};
