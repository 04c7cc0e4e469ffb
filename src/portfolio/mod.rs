// src/portfolio/mod.rs
//! Durable, newest-first portfolio of committed generations

use crate::error::PortfolioError;
use crate::types::{GenerationRecord, PortfolioCollection};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

pub mod seed;
pub mod storage;

pub use seed::seed_collection;
pub use storage::{FileStorage, MemoryStorage, StorageBackend};

/// Key the whole collection is stored under
pub const STORAGE_KEY: &str = "umedia_portfolio";

/// Portfolio store backed by an injected storage backend.
///
/// Writes always replace the whole stored collection. `add` holds the store
/// lock across its read-modify-write, so commits through one store are never
/// lost; two stores sharing one backend still race (last writer wins).
pub struct PortfolioStore {
    backend: Arc<dyn StorageBackend>,
    collection: Mutex<PortfolioCollection>,
}

impl PortfolioStore {
    /// Open the store and load whatever is persisted (or the seed)
    pub async fn open(backend: Arc<dyn StorageBackend>) -> Self {
        let collection = read_collection(backend.as_ref()).await;
        tracing::info!("📚 Portfolio loaded with {} records", collection.len());
        Self {
            backend,
            collection: Mutex::new(collection),
        }
    }

    /// Re-read the durable layer. Never fails: a missing or unreadable
    /// portfolio yields the seed collection.
    pub async fn load(&self) -> PortfolioCollection {
        let mut current = self.collection.lock().await;
        *current = read_collection(self.backend.as_ref()).await;
        current.clone()
    }

    /// Current in-memory collection
    pub async fn snapshot(&self) -> PortfolioCollection {
        self.collection.lock().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<GenerationRecord> {
        self.collection
            .lock()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Prepend `record` and persist the full collection before returning it
    pub async fn add(&self, record: GenerationRecord) -> Result<PortfolioCollection, PortfolioError> {
        let mut current = self.collection.lock().await;
        if current.iter().any(|r| r.id == record.id) {
            return Err(PortfolioError::DuplicateId(record.id));
        }

        let mut updated = Vec::with_capacity(current.len() + 1);
        let record_id = record.id.clone();
        updated.push(record);
        updated.extend(current.iter().cloned());

        write_collection(self.backend.as_ref(), &updated).await?;
        *current = updated;

        tracing::info!(record_id = %record_id, total = current.len(), "➕ Added record to portfolio");
        Ok(current.clone())
    }

    /// Overwrite the durable collection with exactly `collection`
    pub async fn persist(&self, collection: &PortfolioCollection) -> Result<(), PortfolioError> {
        let mut current = self.collection.lock().await;
        write_collection(self.backend.as_ref(), collection).await?;
        *current = collection.clone();
        Ok(())
    }

    /// Replace the whole portfolio, normalizing it to newest-first with unique ids.
    /// The first occurrence of a duplicated id wins.
    pub async fn replace_all(
        &self,
        collection: PortfolioCollection,
    ) -> Result<PortfolioCollection, PortfolioError> {
        let mut seen = HashSet::new();
        let mut normalized: PortfolioCollection = collection
            .into_iter()
            .filter(|r| seen.insert(r.id.clone()))
            .collect();
        normalized.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        self.persist(&normalized).await?;
        tracing::info!("🔄 Portfolio replaced ({} records)", normalized.len());
        Ok(normalized)
    }
}

async fn read_collection(backend: &dyn StorageBackend) -> PortfolioCollection {
    let raw = match backend.read(STORAGE_KEY).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            tracing::debug!("No stored portfolio, using seed collection");
            return seed_collection();
        }
        Err(e) => {
            tracing::warn!("Failed to read portfolio, using seed collection: {}", e);
            return seed_collection();
        }
    };

    match serde_json::from_str::<PortfolioCollection>(&raw) {
        Ok(collection) => collection,
        Err(e) => {
            tracing::warn!("⚠️ Stored portfolio is corrupt ({}), replacing with seed collection", e);
            seed_collection()
        }
    }
}

async fn write_collection(
    backend: &dyn StorageBackend,
    collection: &PortfolioCollection,
) -> Result<(), PortfolioError> {
    let json = serde_json::to_string(collection)?;
    backend.write(STORAGE_KEY, &json).await
}
