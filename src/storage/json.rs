use crate::model::{Offer, StorageError};
use crate::storage::OfferSink;

use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Pretty-printed JSON array of offers, dates as plain `YYYY-MM-DD` strings.
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<Offer>, StorageError> {
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl OfferSink for JsonFileStorage {
    fn save_all(&mut self, offers: &[Offer]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(offers)?;
        fs::write(&self.path, json)?;
        info!("Extracted offers saved to: {}", self.path.display());
        Ok(())
    }
}
