// src/types.rs
//! Core data types shared by the generation workflow and the portfolio store

use chrono::Utc;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

lazy_static! {
    /// Wall-clock time (epoch ms) when the process first touched the clock.
    /// Seed records are dated relative to this instant.
    pub static ref PROCESS_START_MS: i64 = Utc::now().timestamp_millis();
}

static LAST_COMMIT_MS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Epoch milliseconds for a new record. Never goes backwards within a process,
/// even if the system clock is adjusted.
pub fn commit_timestamp() -> i64 {
    let now = Utc::now().timestamp_millis();
    let previous = LAST_COMMIT_MS.fetch_max(now, Ordering::SeqCst);
    previous.max(now)
}

/// Unique identifier of a committed record
pub type RecordId = String;

/// Opaque API credential supplied by the host environment.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for blank values so that "set but empty" behaves like "missing".
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Remote media reference returned by a finished generation job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaLocator(String);

impl MediaLocator {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Locally usable reference to materialized media (a file path or URI)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalReference(String);

impl LocalReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocalReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A finished generation, as stored in the portfolio.
///
/// Field names on disk are camelCase. The older layout (`url`, `description`,
/// `timestamp`) is still accepted when reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    pub id: RecordId,
    #[serde(alias = "url")]
    pub source_locator: LocalReference,
    pub prompt: String,
    #[serde(default, alias = "description")]
    pub notes: String,
    #[serde(alias = "timestamp")]
    pub created_at: i64,
}

impl GenerationRecord {
    /// Build a freshly committed record with a new id and the current commit time
    pub fn commit(prompt: String, notes: String, source_locator: LocalReference) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_locator,
            prompt,
            notes,
            created_at: commit_timestamp(),
        }
    }

    /// Short label used by list views ("uMedia #1a2b")
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(4)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}

/// Newest-first sequence of records with unique ids
pub type PortfolioCollection = Vec<GenerationRecord>;
