// ============================================
// Catalog Provider
// ============================================
//
// Read-only view of the nonprofit catalog. The ranker scans a full
// snapshot per refill, so providers hand out shared entries.

use crate::models::{CatalogEntry, CatalogRecord};
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog data: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Catalog seam
pub trait CatalogProvider: Send + Sync {
    /// Snapshot of every entry; static for the duration of one refill
    fn all_entries(&self) -> Vec<Arc<CatalogEntry>>;

    fn get(&self, id: &str) -> Option<Arc<CatalogEntry>>;

    fn len(&self) -> usize {
        self.all_entries().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// DashMap-backed catalog
#[derive(Default)]
pub struct InMemoryCatalog {
    entries: DashMap<String, Arc<CatalogEntry>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let catalog = Self::new();
        for entry in entries {
            catalog.upsert(entry);
        }
        catalog
    }

    /// Load a JSON array of catalog records
    pub fn from_json_file(path: impl AsRef<Path>, vocabulary_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&raw, vocabulary_size)?;
        info!(
            path = %path.display(),
            entries = catalog.entries.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_json_str(raw: &str, vocabulary_size: usize) -> Result<Self> {
        let records: Vec<CatalogRecord> = serde_json::from_str(raw)?;
        Ok(Self::from_entries(
            records
                .into_iter()
                .map(|record| CatalogEntry::from_record(record, vocabulary_size)),
        ))
    }

    pub fn upsert(&self, entry: CatalogEntry) {
        self.entries.insert(entry.id.clone(), Arc::new(entry));
    }

    pub fn remove(&self, id: &str) -> Option<Arc<CatalogEntry>> {
        self.entries.remove(id).map(|(_, entry)| entry)
    }
}

impl CatalogProvider for InMemoryCatalog {
    fn all_entries(&self) -> Vec<Arc<CatalogEntry>> {
        self.entries.iter().map(|item| item.value().clone()).collect()
    }

    fn get(&self, id: &str) -> Option<Arc<CatalogEntry>> {
        self.entries.get(id).map(|item| item.value().clone())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
