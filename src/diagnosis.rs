//! Diagnosis queries and the patient query store.
//!
//! A patient first submits symptom text under a query id; a later location
//! query with the same id is matched against facilities by that text.
//! The store persists to `<data_dir>/queries.json` so the two steps may run
//! in separate processes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

use crate::error::ValidationError;
use crate::location::{CustomerId, GeoLocation, LocationQuery, QueryId};
use crate::logging::{debug, o, DEFAULT};

/// Queries untouched for this long are dropped (30 days in ms).
pub const QUERY_TTL_MS: i64 = 30 * 24 * 3600 * 1000;

/// Free-text symptom query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisQuery {
    pub query: String,
    pub query_id: QueryId,
}

impl DiagnosisQuery {
    pub fn new(query: impl Into<String>, query_id: impl Into<String>) -> Result<Self, ValidationError> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(ValidationError::Empty("diagnosis query"));
        }
        let query_id = query_id.into();
        if query_id.trim().is_empty() {
            return Err(ValidationError::Empty("query id"));
        }
        Ok(Self {
            query,
            query_id: QueryId(query_id),
        })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid query: {0}")]
    Invalid(#[from] ValidationError),
    #[error("query store lock poisoned")]
    Poisoned,
    #[error("failed to persist query store: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode query store: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("query store {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        source: serde_json::Error,
    },
}

/// Where patient queries are recorded.
pub trait PatientStore: Send + Sync {
    fn enqueue_diagnosis_query(&self, query: DiagnosisQuery) -> Result<(), StoreError>;

    fn enqueue_geolocation_query(&self, query: &LocationQuery) -> Result<(), StoreError>;

    /// Symptom text recorded for a query id, if any.
    fn symptoms(&self, query_id: &QueryId) -> Option<String>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredQuery {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    cust_id: Option<CustomerId>,
    #[serde(default)]
    location: Option<GeoLocation>,
    timestamp: i64,
}

/// JSON-file backed [`PatientStore`]. Without a path it is memory-only.
pub struct QueryStore {
    path: Option<PathBuf>,
    entries: RwLock<HashMap<QueryId, StoredQuery>>,
}

impl QueryStore {
    /// Load from `<data_dir>/queries.json`.
    pub fn load(data_dir: &Path) -> Result<Self, StoreError> {
        Self::load_from(data_dir.join("queries.json"))
    }

    /// A missing file starts an empty store; an unreadable or corrupt one is
    /// an error so recorded queries are never overwritten.
    pub fn load_from(path: PathBuf) -> Result<Self, StoreError> {
        let entries = match fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data).map_err(|source| StoreError::Corrupt {
                path: path.display().to_string(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: Some(path),
            entries: RwLock::new(entries),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Apply `f` to the entry for `query_id` and persist. Memory is only
    /// updated once the file is written. Entries older than [`QUERY_TTL_MS`]
    /// are dropped on every write.
    fn update<F>(&self, query_id: &QueryId, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut StoredQuery),
    {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        let now = chrono::Utc::now().timestamp_millis();

        let mut next: HashMap<QueryId, StoredQuery> = entries
            .iter()
            .filter(|(_, e)| now - e.timestamp <= QUERY_TTL_MS)
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect();
        let entry = next.entry(query_id.clone()).or_default();
        f(entry);
        entry.timestamp = now;

        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn persist(&self, entries: &HashMap<QueryId, StoredQuery>) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PatientStore for QueryStore {
    fn enqueue_diagnosis_query(&self, query: DiagnosisQuery) -> Result<(), StoreError> {
        let log = DEFAULT.new(o!(
            "function" => "QueryStore::enqueue_diagnosis_query",
            "query_id" => query.query_id.to_string(),
        ));
        // Re-validate: the fields are public.
        let query = DiagnosisQuery::new(query.query, query.query_id.0)?;
        self.update(&query.query_id, |entry| entry.query = Some(query.query.clone()))?;
        debug!(log, "recorded");
        Ok(())
    }

    fn enqueue_geolocation_query(&self, query: &LocationQuery) -> Result<(), StoreError> {
        self.update(&query.query_id, |entry| {
            entry.cust_id = Some(query.cust_id.clone());
            entry.location = Some(query.location);
        })
    }

    fn symptoms(&self, query_id: &QueryId) -> Option<String> {
        self.entries.read().ok()?.get(query_id)?.query.clone()
    }
}
