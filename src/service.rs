//! Location-aware facility lookup service.
//!
//! For one request: resolve the query's coordinates to an address, then hand
//! the address and query to the lookup capability. Both capabilities are
//! injected per call and awaited in sequence; the service keeps no state
//! between requests.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::facility::{FacilityLookup, FacilityResult, LookupError};
use crate::location::{Address, AddressResolver, GeocodeError, LocationQuery, ReverseGeocoder};
use crate::logging::{info, o, warn, DEFAULT};

/// Pipeline stage, for timeout reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Lookup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve => write!(f, "address resolution"),
            Self::Lookup => write!(f, "facility lookup"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The geocoder failed; carries its error unchanged.
    #[error(transparent)]
    Resolution(#[from] GeocodeError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("{stage} timed out after {timeout:?}")]
    Timeout { stage: Stage, timeout: Duration },
}

/// Contract for location-aware facility listing.
///
/// 1. Resolves coordinates of the query to an address.
/// 2. Fetches ranked facilities for that address and query.
///
/// `Ok(None)` means no results; it is never reported as an error.
#[allow(async_fn_in_trait)]
pub trait LocationQueryService {
    async fn resolve_coordinates<G>(&self, geocoder: &G, query: &LocationQuery) -> Result<Address, ServiceError>
    where
        G: ReverseGeocoder;

    async fn fetch_facilities<G, L>(
        &self,
        geocoder: &G,
        query: &LocationQuery,
        lookup: &L,
    ) -> Result<Option<Vec<FacilityResult>>, ServiceError>
    where
        G: ReverseGeocoder,
        L: FacilityLookup;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GeolocationQueryService {
    resolver: AddressResolver,
    stage_timeout: Option<Duration>,
}

impl GeolocationQueryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound each stage separately; an expired stage fails the whole request.
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    async fn within<T, E, Fut>(&self, stage: Stage, fut: Fut) -> Result<T, ServiceError>
    where
        Fut: Future<Output = Result<T, E>>,
        ServiceError: From<E>,
    {
        match self.stage_timeout {
            Some(timeout) => tokio::time::timeout(timeout, fut)
                .await
                .map_err(|_| ServiceError::Timeout { stage, timeout })?
                .map_err(ServiceError::from),
            None => fut.await.map_err(ServiceError::from),
        }
    }
}

impl LocationQueryService for GeolocationQueryService {
    async fn resolve_coordinates<G>(&self, geocoder: &G, query: &LocationQuery) -> Result<Address, ServiceError>
    where
        G: ReverseGeocoder,
    {
        self.within(Stage::Resolve, self.resolver.resolve(geocoder, query)).await
    }

    async fn fetch_facilities<G, L>(
        &self,
        geocoder: &G,
        query: &LocationQuery,
        lookup: &L,
    ) -> Result<Option<Vec<FacilityResult>>, ServiceError>
    where
        G: ReverseGeocoder,
        L: FacilityLookup,
    {
        let log = DEFAULT.new(o!(
            "function" => "GeolocationQueryService::fetch_facilities",
            "query_id" => query.query_id.to_string(),
            "cust_id" => query.cust_id.to_string(),
        ));
        info!(log, "start"; "location" => %query.location);

        let address = match self.resolve_coordinates(geocoder, query).await {
            Ok(address) => address,
            Err(e) => {
                warn!(log, "resolution failed"; "error" => %e);
                return Err(e);
            }
        };

        let facilities = self.within(Stage::Lookup, lookup.lookup(&address, query)).await?;

        info!(log, "finish"; "count" => facilities.len());
        Ok(Some(facilities).filter(|f| !f.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::{DiagnosisQuery, PatientStore, QueryStore};
    use crate::facility::{
        Contact, DirectoryRepository, EstimatedTime, FacilityEstablishment, FacilityOwnership, Provider, Rank,
        RepositoryLookup, Stars,
    };
    use crate::location::{GeoLocation, RawAddress};
    use std::sync::Arc;

    fn dummy_query() -> LocationQuery {
        LocationQuery::new(GeoLocation::new(0.0, 0.0).unwrap(), "test_cust_id", "test_query_id")
    }

    fn dummy_reverse_geo_lookup(_: &LocationQuery) -> Result<RawAddress, GeocodeError> {
        Ok(RawAddress::new())
    }

    fn failing_reverse_geo_lookup(_: &LocationQuery) -> Result<RawAddress, GeocodeError> {
        Err(GeocodeError::Unavailable("geocoder down".into()))
    }

    fn test_facility() -> FacilityResult {
        FacilityResult {
            name: "Test facility".into(),
            address: Address::default(),
            geolocation: GeoLocation::new(0.0, 0.0).unwrap(),
            contact: "+919999999999".into(),
            facility_type: FacilityEstablishment::Nursing,
            ownership: FacilityOwnership::Charity,
            specialties: vec!["surgery".into(), "pediatrics".into()],
            stars: Stars::new(4).unwrap(),
            reviews: 120,
            rank: Rank::new(2).unwrap(),
            estimated_time: EstimatedTime::new(20.0).unwrap(),
        }
    }

    fn dummy_patient_query_lookup(_: &Address, _: &LocationQuery) -> Result<Vec<FacilityResult>, LookupError> {
        Ok(vec![test_facility()])
    }

    fn dummy_patient_query_lookup_none(_: &Address, _: &LocationQuery) -> Result<Vec<FacilityResult>, LookupError> {
        Ok(vec![])
    }

    struct SlowGeocoder(Duration);

    impl ReverseGeocoder for SlowGeocoder {
        async fn reverse(&self, _: &LocationQuery) -> Result<RawAddress, GeocodeError> {
            tokio::time::sleep(self.0).await;
            Ok(RawAddress::new())
        }
    }

    #[tokio::test]
    async fn test_resolve_coordinates() {
        let result = GeolocationQueryService::new()
            .resolve_coordinates(&dummy_reverse_geo_lookup, &dummy_query())
            .await
            .unwrap();
        assert_eq!(result, Address::default());
    }

    #[tokio::test]
    async fn test_fetch_facilities() {
        let result = GeolocationQueryService::new()
            .fetch_facilities(&dummy_reverse_geo_lookup, &dummy_query(), &dummy_patient_query_lookup)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "Test facility");
        assert_eq!(result[0].address, Address::default());
        assert_eq!(result[0].facility_type, FacilityEstablishment::Nursing);
        assert_eq!(result[0].ownership, FacilityOwnership::Charity);
        assert_eq!(result[0].stars.value(), 4);
        assert_eq!(result[0].reviews, 120);
    }

    #[tokio::test]
    async fn test_fetch_facilities_no_results() {
        let result = GeolocationQueryService::new()
            .fetch_facilities(&dummy_reverse_geo_lookup, &dummy_query(), &dummy_patient_query_lookup_none)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_fetch_facilities_resolution_failure() {
        let err = GeolocationQueryService::new()
            .fetch_facilities(&failing_reverse_geo_lookup, &dummy_query(), &dummy_patient_query_lookup)
            .await
            .unwrap_err();
        match err {
            ServiceError::Resolution(e) => assert_eq!(e, GeocodeError::Unavailable("geocoder down".into())),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        fn broken(_: &Address, _: &LocationQuery) -> Result<Vec<FacilityResult>, LookupError> {
            Err(LookupError::Unavailable("directory offline".into()))
        }
        let err = GeolocationQueryService::new()
            .fetch_facilities(&dummy_reverse_geo_lookup, &dummy_query(), &broken)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Lookup(LookupError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_stage_timeout_aborts_request() {
        let service = GeolocationQueryService::new().with_stage_timeout(Duration::from_millis(20));
        let err = service
            .fetch_facilities(&SlowGeocoder(Duration::from_secs(5)), &dummy_query(), &dummy_patient_query_lookup)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Timeout { stage: Stage::Resolve, .. }));
    }

    #[tokio::test]
    async fn test_stage_timeout_not_hit() {
        let service = GeolocationQueryService::new().with_stage_timeout(Duration::from_secs(5));
        let result = service
            .fetch_facilities(&SlowGeocoder(Duration::from_millis(1)), &dummy_query(), &dummy_patient_query_lookup)
            .await
            .unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_independent() {
        let service = GeolocationQueryService::new();
        let geocoder = dummy_reverse_geo_lookup;
        let (some, none) = (dummy_patient_query_lookup, dummy_patient_query_lookup_none);
        let first = dummy_query();
        let other = LocationQuery::new(GeoLocation::new(10.0, 10.0).unwrap(), "c2", "q2");
        let (a, b) = tokio::join!(
            service.fetch_facilities(&geocoder, &first, &some),
            service.fetch_facilities(&geocoder, &other, &none),
        );
        assert_eq!(a.unwrap().map(|f| f.len()), Some(1));
        assert!(b.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_facilities_with_repository() {
        let store = Arc::new(QueryStore::in_memory());
        store
            .enqueue_diagnosis_query(DiagnosisQuery::new("surgery consult", "test_query_id").unwrap())
            .unwrap();
        let repo = DirectoryRepository::new(
            vec![Provider {
                name: "Dummy Hospital".into(),
                address: "123 Test Street".into(),
                geo_location: GeoLocation::new(0.0, 0.0).unwrap(),
                contact: Contact::new("+1234567890").unwrap(),
                facility_type: FacilityEstablishment::Hospital,
                ownership: FacilityOwnership::Private,
                specialties: vec!["General".into(), "Surgery".into()],
                available_doctors: vec![],
                stars: Stars::new(4).unwrap(),
                reviews: 100,
            }],
            store,
        );
        let lookup = RepositoryLookup::new(repo);

        let providers = GeolocationQueryService::new()
            .fetch_facilities(&dummy_reverse_geo_lookup, &dummy_query(), &lookup)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].rank.value(), 1);
        assert_eq!(providers[0].address.street.as_deref(), Some("123 Test Street"));
        assert_eq!(providers[0].estimated_time.minutes(), 0.0);
    }
}
