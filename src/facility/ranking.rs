//! Facility ranking and the repository-backed lookup capability.
//!
//! Order: distance ascending, then stars descending, then reviews descending,
//! then name. Relevance to the patient's symptoms is applied earlier by
//! [`ProviderRepository::fetch_by_query`], which drops unrelated providers.

use std::cmp::Ordering;

use super::repository::{LookupError, ProviderRepository};
use super::types::{EstimatedTime, FacilityResult, Provider, Rank, MAX_RANK};
use crate::location::{Address, LocationQuery};
use crate::logging::{debug, info, o, DEFAULT};

pub const DEFAULT_SEARCH_RADIUS_KM: f64 = 25.0;
pub const DEFAULT_TRAVEL_SPEED_KMH: f64 = 30.0;

/// Capability that turns a resolved address and query into ranked results.
///
/// Any `Fn(&Address, &LocationQuery) -> Result<Vec<FacilityResult>, LookupError>`
/// is a lookup.
#[allow(async_fn_in_trait)]
pub trait FacilityLookup {
    async fn lookup(&self, address: &Address, query: &LocationQuery) -> Result<Vec<FacilityResult>, LookupError>;
}

impl<F> FacilityLookup for F
where
    F: Fn(&Address, &LocationQuery) -> Result<Vec<FacilityResult>, LookupError>,
{
    async fn lookup(&self, address: &Address, query: &LocationQuery) -> Result<Vec<FacilityResult>, LookupError> {
        self(address, query)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FacilityRanking {
    max_results: u8,
    travel_speed_kmh: f64,
}

impl Default for FacilityRanking {
    fn default() -> Self {
        Self {
            max_results: MAX_RANK,
            travel_speed_kmh: DEFAULT_TRAVEL_SPEED_KMH,
        }
    }
}

impl FacilityRanking {
    /// `max_results` is clamped to `1..=MAX_RANK`; a non-positive speed falls
    /// back to the default.
    pub fn new(max_results: u8, travel_speed_kmh: f64) -> Self {
        let travel_speed_kmh = if travel_speed_kmh.is_finite() && travel_speed_kmh > 0.0 {
            travel_speed_kmh
        } else {
            DEFAULT_TRAVEL_SPEED_KMH
        };
        Self {
            max_results: max_results.clamp(1, MAX_RANK),
            travel_speed_kmh,
        }
    }

    /// Travel minutes for a distance at the configured average speed.
    pub fn travel_minutes(&self, distance_km: f64) -> f64 {
        (distance_km / self.travel_speed_kmh * 60.0 * 10.0).round() / 10.0
    }

    /// Rank providers for a query. An empty input yields an empty list.
    pub fn rank(&self, address: &Address, query: &LocationQuery, providers: Vec<Provider>) -> Vec<FacilityResult> {
        let log = DEFAULT.new(o!(
            "function" => "FacilityRanking::rank",
            "query_id" => query.query_id.to_string(),
        ));
        debug!(log, "start"; "candidates" => providers.len(), "city" => address.city.as_deref().unwrap_or("-"));

        let mut scored: Vec<(f64, Provider)> = providers
            .into_iter()
            .map(|p| (query.location.distance_km(&p.geo_location), p))
            .collect();
        scored.sort_by(|(da, a), (db, b)| compare(*da, a, *db, b));

        let results: Vec<FacilityResult> = scored
            .iter()
            .take(self.max_results as usize)
            .enumerate()
            .filter_map(|(i, (dist, provider))| {
                let rank = Rank::new(i as u8 + 1).ok()?;
                let eta = EstimatedTime::new(self.travel_minutes(*dist)).ok()?;
                Some(FacilityResult::from_provider(provider, rank, eta))
            })
            .collect();

        info!(log, "finish"; "count" => results.len());
        results
    }
}

fn compare(da: f64, a: &Provider, db: f64, b: &Provider) -> Ordering {
    da.total_cmp(&db)
        .then_with(|| b.stars.cmp(&a.stars))
        .then_with(|| b.reviews.cmp(&a.reviews))
        .then_with(|| a.name.cmp(&b.name))
}

/// Lookup backed by a [`ProviderRepository`]: providers serving the address,
/// within the search radius, relevant to the query, then ranked.
pub struct RepositoryLookup<R> {
    repository: R,
    ranking: FacilityRanking,
    radius_km: f64,
}

impl<R: ProviderRepository> RepositoryLookup<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            ranking: FacilityRanking::default(),
            radius_km: DEFAULT_SEARCH_RADIUS_KM,
        }
    }

    pub fn with_ranking(mut self, ranking: FacilityRanking) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn with_radius_km(mut self, radius_km: f64) -> Self {
        if radius_km.is_finite() && radius_km > 0.0 {
            self.radius_km = radius_km;
        }
        self
    }
}

impl<R: ProviderRepository> FacilityLookup for RepositoryLookup<R> {
    async fn lookup(&self, address: &Address, query: &LocationQuery) -> Result<Vec<FacilityResult>, LookupError> {
        let candidates = self.repository.fetch_by_address(address)?;
        let nearby: Vec<Provider> = candidates
            .into_iter()
            .filter(|p| query.location.distance_km(&p.geo_location) <= self.radius_km)
            .collect();
        let relevant = self.repository.fetch_by_query(&query.query_id, nearby)?;
        Ok(self.ranking.rank(address, query, relevant))
    }
}
