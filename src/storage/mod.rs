pub mod json;
pub mod sqlite;

pub use json::JsonFileStorage;
pub use sqlite::SqliteStorage;

use crate::model::{Offer, StorageError};

/// Destination for the offers of a run.
pub trait OfferSink {
    fn save_all(&mut self, offers: &[Offer]) -> Result<(), StorageError>;
}
