//! Address resolution.
//!
//! [`AddressResolver`] turns geocoder output into an [`Address`].
//! [`FallbackGeocoder`] is the production geocoding chain:
//! Cache → Nominatim → built-in dataset → network error or empty address.

use std::sync::Mutex;

use super::cache::GeocodeCache;
use super::providers::{builtin_reverse, NominatimGeocoder, ReverseGeocoder};
use super::types::{Address, GeocodeError, GeocodeSource, LocationQuery, RawAddress};
use crate::logging::{debug, info, o, warn, DEFAULT};

/// Resolves a query's coordinates to an address through an injected geocoder.
///
/// Holds no state, so the result depends only on what the geocoder returns.
/// Fields the geocoder leaves out stay unset; only geocoder failures are errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressResolver;

impl AddressResolver {
    pub async fn resolve<G>(&self, geocoder: &G, query: &LocationQuery) -> Result<Address, GeocodeError>
    where
        G: ReverseGeocoder,
    {
        let raw = geocoder.reverse(query).await?;
        Ok(Address::from_raw(&raw))
    }
}

/// The geocoder with its fallback pipeline.
pub struct FallbackGeocoder {
    cache: Mutex<GeocodeCache>,
    nominatim: NominatimGeocoder,
    offline: bool,
}

impl FallbackGeocoder {
    pub fn new(cache: GeocodeCache, nominatim: NominatimGeocoder) -> Self {
        Self {
            cache: Mutex::new(cache),
            nominatim,
            offline: false,
        }
    }

    /// Set offline mode, skipping network calls.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    fn cached(&self, query: &LocationQuery) -> Option<RawAddress> {
        self.cache.lock().ok()?.get(&query.location)
    }

    fn remember(&self, query: &LocationQuery, raw: &RawAddress, source: GeocodeSource) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(&query.location, raw, source);
        }
    }
}

impl ReverseGeocoder for FallbackGeocoder {
    async fn reverse(&self, query: &LocationQuery) -> Result<RawAddress, GeocodeError> {
        let log = DEFAULT.new(o!(
            "function" => "FallbackGeocoder::reverse",
            "location" => query.location.to_string(),
        ));

        // 1. Check cache
        if let Some(raw) = self.cached(query) {
            debug!(log, "resolved"; "source" => %GeocodeSource::Cache);
            return Ok(raw);
        }

        // 2. Try Nominatim (if online)
        let mut network_error = None;
        if !self.offline {
            match self.nominatim.reverse(query).await {
                Ok(raw) if !raw.is_empty() => {
                    self.remember(query, &raw, GeocodeSource::Nominatim);
                    info!(log, "resolved"; "source" => %GeocodeSource::Nominatim);
                    return Ok(raw);
                }
                Ok(_) => {
                    debug!(log, "nominatim has no address here");
                }
                Err(e) => {
                    warn!(log, "nominatim failed"; "error" => %e);
                    network_error = Some(e);
                }
            }
        }

        // 3. Try built-in dataset (always available)
        if let Some(raw) = builtin_reverse(&query.location) {
            info!(log, "resolved"; "source" => %GeocodeSource::Builtin);
            return Ok(raw);
        }

        match network_error {
            Some(e) => Err(e),
            None => {
                info!(log, "resolved"; "source" => %GeocodeSource::Unresolved);
                Ok(RawAddress::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::types::GeoLocation;
    use std::time::Duration;
    use tempfile::TempDir;

    fn query_at(lat: f64, lng: f64) -> LocationQuery {
        LocationQuery::new(GeoLocation::new(lat, lng).unwrap(), "test_cust_id", "test_query_id")
    }

    fn empty_geocoder(_: &LocationQuery) -> Result<RawAddress, GeocodeError> {
        Ok(RawAddress::new())
    }

    fn city_geocoder(_: &LocationQuery) -> Result<RawAddress, GeocodeError> {
        Ok([("city".to_string(), "Pune".to_string())].into_iter().collect())
    }

    fn failing_geocoder(_: &LocationQuery) -> Result<RawAddress, GeocodeError> {
        Err(GeocodeError::Network("connection refused".into()))
    }

    /// Points at a closed local port so online lookups fail fast.
    fn unreachable_nominatim() -> NominatimGeocoder {
        NominatimGeocoder::new("http://127.0.0.1:9", Duration::from_millis(200))
    }

    fn fallback(dir: &TempDir, offline: bool) -> FallbackGeocoder {
        let mut geocoder = FallbackGeocoder::new(GeocodeCache::load(dir.path()), unreachable_nominatim());
        geocoder.set_offline(offline);
        geocoder
    }

    #[tokio::test]
    async fn test_resolve_empty_is_default_address() {
        let addr = AddressResolver.resolve(&empty_geocoder, &query_at(0.0, 0.0)).await.unwrap();
        assert_eq!(addr, Address::default());
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let query = query_at(18.52, 73.85);
        let first = AddressResolver.resolve(&city_geocoder, &query).await.unwrap();
        let second = AddressResolver.resolve(&city_geocoder, &query).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.city.as_deref(), Some("Pune"));
    }

    #[tokio::test]
    async fn test_resolve_propagates_failure() {
        let err = AddressResolver.resolve(&failing_geocoder, &query_at(0.0, 0.0)).await.unwrap_err();
        assert_eq!(err, GeocodeError::Network("connection refused".into()));
    }

    #[tokio::test]
    async fn test_fallback_offline_builtin() {
        let dir = TempDir::new().unwrap();
        let raw = fallback(&dir, true).reverse(&query_at(-1.2921, 36.8219)).await.unwrap();
        assert_eq!(raw.get("city").map(String::as_str), Some("Nairobi"));
    }

    #[tokio::test]
    async fn test_fallback_offline_unknown_is_empty() {
        let dir = TempDir::new().unwrap();
        let raw = fallback(&dir, true).reverse(&query_at(0.0, 0.0)).await.unwrap();
        assert!(raw.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_cache_hit() {
        let dir = TempDir::new().unwrap();
        let query = query_at(10.0, 10.0);
        {
            let mut cache = GeocodeCache::load(dir.path());
            cache.put(&query.location, &city_geocoder(&query).unwrap(), GeocodeSource::Nominatim);
        }
        // Online but unreachable: the cache answers before the network is tried.
        let raw = fallback(&dir, false).reverse(&query).await.unwrap();
        assert_eq!(raw.get("city").map(String::as_str), Some("Pune"));
    }

    #[tokio::test]
    async fn test_fallback_network_failure_uses_builtin() {
        let dir = TempDir::new().unwrap();
        let raw = fallback(&dir, false).reverse(&query_at(59.33, 18.07)).await.unwrap();
        assert_eq!(raw.get("city").map(String::as_str), Some("Stockholm"));
    }

    #[tokio::test]
    async fn test_fallback_network_failure_surfaces() {
        let dir = TempDir::new().unwrap();
        let err = fallback(&dir, false).reverse(&query_at(0.0, 0.0)).await.unwrap_err();
        assert!(matches!(err, GeocodeError::Network(_)));
    }
}
