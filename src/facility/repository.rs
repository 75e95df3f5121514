//! Provider directory access.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::types::Provider;
use crate::diagnosis::PatientStore;
use crate::location::{Address, QueryId};
use crate::logging::{debug, info, o, DEFAULT};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("provider directory unavailable: {0}")]
    Unavailable(String),
    #[error("invalid provider directory: {0}")]
    InvalidDirectory(String),
}

/// Read-only access to the facility directory.
pub trait ProviderRepository: Send + Sync {
    /// All providers serving the given address.
    fn fetch_by_address(&self, address: &Address) -> Result<Vec<Provider>, LookupError>;

    /// Narrow `providers` to those relevant to the query, most relevant first.
    fn fetch_by_query(&self, query_id: &QueryId, providers: Vec<Provider>) -> Result<Vec<Provider>, LookupError>;
}

/// Directory held in memory, loaded from a JSON array of providers.
pub struct DirectoryRepository {
    providers: Vec<Provider>,
    queries: Arc<dyn PatientStore>,
}

impl DirectoryRepository {
    pub fn new(providers: Vec<Provider>, queries: Arc<dyn PatientStore>) -> Self {
        Self { providers, queries }
    }

    /// Load from a JSON file. Every record is validated while parsing.
    pub fn load(path: &Path, queries: Arc<dyn PatientStore>) -> Result<Self, LookupError> {
        let data = fs::read_to_string(path)
            .map_err(|e| LookupError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let providers: Vec<Provider> =
            serde_json::from_str(&data).map_err(|e| LookupError::InvalidDirectory(e.to_string()))?;
        Ok(Self::new(providers, queries))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl ProviderRepository for DirectoryRepository {
    fn fetch_by_address(&self, address: &Address) -> Result<Vec<Provider>, LookupError> {
        let log = DEFAULT.new(o!("function" => "DirectoryRepository::fetch_by_address"));
        let found: Vec<Provider> = self
            .providers
            .iter()
            .filter(|p| serves(address, &p.display_address()))
            .cloned()
            .collect();
        info!(log, "finish"; "count" => found.len());
        Ok(found)
    }

    fn fetch_by_query(&self, query_id: &QueryId, providers: Vec<Provider>) -> Result<Vec<Provider>, LookupError> {
        let log = DEFAULT.new(o!(
            "function" => "DirectoryRepository::fetch_by_query",
            "query_id" => query_id.to_string(),
        ));
        let Some(symptoms) = self.queries.symptoms(query_id) else {
            debug!(log, "no diagnosis recorded, keeping all candidates");
            return Ok(providers);
        };

        let terms = symptom_terms(&symptoms);
        let mut scored: Vec<(usize, Provider)> = providers
            .into_iter()
            .map(|p| (matching_specialties(&terms, &p.specialties), p))
            .filter(|(score, _)| *score > 0)
            .collect();
        // Stable: equal scores keep directory order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        info!(log, "finish"; "count" => scored.len());
        Ok(scored.into_iter().map(|(_, p)| p).collect())
    }
}

/// Every field known on both sides must agree; unknown fields never exclude.
fn serves(resolved: &Address, facility: &Address) -> bool {
    fn agrees(a: &Option<String>, b: &Option<String>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
            _ => true,
        }
    }
    agrees(&resolved.city, &facility.city)
        && agrees(&resolved.state, &facility.state)
        && agrees(&resolved.country, &facility.country)
}

/// Lowercased words of at least 3 letters.
fn symptom_terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect()
}

/// Number of specialties that match any symptom term, by substring in either
/// direction or, for terms of 5+ letters, an edit distance of at most 2 from
/// any word of the specialty.
fn matching_specialties(terms: &[String], specialties: &[String]) -> usize {
    specialties
        .iter()
        .filter(|s| {
            let s = s.to_lowercase();
            terms.iter().any(|t| {
                s.contains(t.as_str())
                    || s.split_whitespace().any(|w| t.contains(w) && w.len() >= 3)
                    || (t.chars().count() >= 5 && s.split_whitespace().any(|w| edit_distance(t, w) <= 2))
            })
        })
        .count()
}

/// Compute edit distance between two strings (Levenshtein).
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (m, n) = (a.len(), b.len());

    let mut prev = (0..=n).collect::<Vec<_>>();
    let mut curr = vec![0; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[n]
}
