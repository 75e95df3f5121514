//! File-based reverse-geocoding cache at `<data_dir>/geocode_cache.json`.
//!
//! TTL: 30 days. Keys are coordinates rounded to 3 decimals (~100 m), so
//! nearby requests share an entry. Missing or corrupt files start empty.

use super::types::{GeoLocation, GeocodeSource, RawAddress};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const CACHE_TTL_MS: i64 = 30 * 24 * 3600 * 1000; // 30 days in ms

#[derive(Serialize, Deserialize, Clone)]
struct CacheEntry {
    address: RawAddress,
    timestamp: i64,
    #[serde(default)]
    source_name: Option<String>,
}

/// The geocode cache.
pub struct GeocodeCache {
    path: PathBuf,
    entries: HashMap<String, CacheEntry>,
}

impl GeocodeCache {
    /// Load cache from `<data_dir>/geocode_cache.json`.
    pub fn load(data_dir: &Path) -> Self {
        Self::load_from(data_dir.join("geocode_cache.json"))
    }

    /// Load cache from a specific file.
    pub fn load_from(path: PathBuf) -> Self {
        let entries = Self::read_file(&path).unwrap_or_default();
        Self { path, entries }
    }

    fn read_file(path: &Path) -> Option<HashMap<String, CacheEntry>> {
        let data = fs::read_to_string(path).ok()?;
        serde_json::from_str(&data).ok()
    }

    fn key(location: &GeoLocation) -> String {
        format!("{:.3},{:.3}", location.lat(), location.lng())
    }

    /// Look up an address. Returns None if missing or expired.
    pub fn get(&self, location: &GeoLocation) -> Option<RawAddress> {
        let entry = self.entries.get(&Self::key(location))?;

        let now = chrono::Utc::now().timestamp_millis();
        if now - entry.timestamp > CACHE_TTL_MS {
            return None; // expired
        }
        Some(entry.address.clone())
    }

    /// Store an address and persist to disk. Empty addresses are not cached
    /// so a later online lookup can still fill them in.
    pub fn put(&mut self, location: &GeoLocation, address: &RawAddress, source: GeocodeSource) {
        if address.is_empty() {
            return;
        }
        let now = chrono::Utc::now().timestamp_millis();
        let entry = CacheEntry {
            address: address.clone(),
            timestamp: now,
            source_name: Some(source.to_string()),
        };
        // Expired entries are dropped whenever the file is rewritten.
        self.entries.retain(|_, e| now - e.timestamp <= CACHE_TTL_MS);
        self.entries.insert(Self::key(location), entry);
        self.persist();
    }

    fn persist(&self) {
        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(&self.entries) {
            let _ = fs::write(&self.path, json);
        }
    }

    /// Number of entries (for testing).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
