//! Reverse-geocoding providers: Nominatim and the built-in city dataset.

use serde::Deserialize;
use std::time::Duration;

use super::types::{GeoLocation, GeocodeError, LocationQuery, RawAddress};

/// Capability that maps a query's coordinates to raw address fields.
///
/// Any `Fn(&LocationQuery) -> Result<RawAddress, GeocodeError>` is a
/// geocoder, so tests and callers can inject plain functions.
#[allow(async_fn_in_trait)]
pub trait ReverseGeocoder {
    async fn reverse(&self, query: &LocationQuery) -> Result<RawAddress, GeocodeError>;
}

impl<F> ReverseGeocoder for F
where
    F: Fn(&LocationQuery) -> Result<RawAddress, GeocodeError>,
{
    async fn reverse(&self, query: &LocationQuery) -> Result<RawAddress, GeocodeError> {
        self(query)
    }
}

// ─── Built-in dataset ───────────────────────────────────────────

/// Built-in matches are only trusted this close to the city centre.
pub const BUILTIN_MAX_DISTANCE_KM: f64 = 50.0;

struct BuiltinCity {
    name: &'static str,
    lat: f64,
    lon: f64,
    state: Option<&'static str>,
    country: &'static str,
}

const BUILTIN_CITIES: &[BuiltinCity] = &[
    BuiltinCity { name: "Mumbai", lat: 19.0760, lon: 72.8777, state: Some("Maharashtra"), country: "India" },
    BuiltinCity { name: "Pune", lat: 18.5204, lon: 73.8567, state: Some("Maharashtra"), country: "India" },
    BuiltinCity { name: "New Delhi", lat: 28.6139, lon: 77.2090, state: Some("Delhi"), country: "India" },
    BuiltinCity { name: "Bengaluru", lat: 12.9716, lon: 77.5946, state: Some("Karnataka"), country: "India" },
    BuiltinCity { name: "Chennai", lat: 13.0827, lon: 80.2707, state: Some("Tamil Nadu"), country: "India" },
    BuiltinCity { name: "Kolkata", lat: 22.5726, lon: 88.3639, state: Some("West Bengal"), country: "India" },
    BuiltinCity { name: "Hyderabad", lat: 17.3850, lon: 78.4867, state: Some("Telangana"), country: "India" },
    BuiltinCity { name: "Dhaka", lat: 23.8103, lon: 90.4125, state: None, country: "Bangladesh" },
    BuiltinCity { name: "Karachi", lat: 24.8607, lon: 67.0011, state: Some("Sindh"), country: "Pakistan" },
    BuiltinCity { name: "Nairobi", lat: -1.2921, lon: 36.8219, state: None, country: "Kenya" },
    BuiltinCity { name: "Lagos", lat: 6.5244, lon: 3.3792, state: Some("Lagos"), country: "Nigeria" },
    BuiltinCity { name: "Cairo", lat: 30.0444, lon: 31.2357, state: None, country: "Egypt" },
    BuiltinCity { name: "Casablanca", lat: 33.5731, lon: -7.5898, state: None, country: "Morocco" },
    BuiltinCity { name: "Jakarta", lat: -6.2088, lon: 106.8456, state: None, country: "Indonesia" },
    BuiltinCity { name: "Kuala Lumpur", lat: 3.1390, lon: 101.6869, state: None, country: "Malaysia" },
    BuiltinCity { name: "Tokyo", lat: 35.6762, lon: 139.6503, state: None, country: "Japan" },
    BuiltinCity { name: "Sydney", lat: -33.8688, lon: 151.2093, state: Some("New South Wales"), country: "Australia" },
    BuiltinCity { name: "London", lat: 51.5074, lon: -0.1278, state: Some("England"), country: "United Kingdom" },
    BuiltinCity { name: "Paris", lat: 48.8566, lon: 2.3522, state: Some("Ile-de-France"), country: "France" },
    BuiltinCity { name: "Berlin", lat: 52.5200, lon: 13.4050, state: Some("Berlin"), country: "Germany" },
    BuiltinCity { name: "Stockholm", lat: 59.3293, lon: 18.0686, state: None, country: "Sweden" },
    BuiltinCity { name: "Oslo", lat: 59.9139, lon: 10.7522, state: None, country: "Norway" },
    BuiltinCity { name: "New York", lat: 40.7128, lon: -74.0060, state: Some("New York"), country: "United States" },
    BuiltinCity { name: "Los Angeles", lat: 34.0522, lon: -118.2437, state: Some("California"), country: "United States" },
    BuiltinCity { name: "Sao Paulo", lat: -23.5505, lon: -46.6333, state: Some("Sao Paulo"), country: "Brazil" },
];

/// Nearest built-in city within [`BUILTIN_MAX_DISTANCE_KM`], as raw address fields.
pub fn builtin_reverse(location: &GeoLocation) -> Option<RawAddress> {
    BUILTIN_CITIES
        .iter()
        .filter_map(|city| {
            let centre = GeoLocation::new(city.lat, city.lon).ok()?;
            let dist = location.distance_km(&centre);
            (dist <= BUILTIN_MAX_DISTANCE_KM).then_some((city, dist))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(city, _)| builtin_to_raw(city))
}

fn builtin_to_raw(city: &BuiltinCity) -> RawAddress {
    let mut raw = RawAddress::new();
    raw.insert("city".into(), city.name.to_string());
    if let Some(state) = city.state {
        raw.insert("state".into(), state.to_string());
    }
    raw.insert("country".into(), city.country.to_string());
    raw
}

/// Offline geocoder backed by the built-in dataset. Points far from every
/// known city resolve to an empty address.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinGeocoder;

impl ReverseGeocoder for BuiltinGeocoder {
    async fn reverse(&self, query: &LocationQuery) -> Result<RawAddress, GeocodeError> {
        Ok(builtin_reverse(&query.location).unwrap_or_default())
    }
}

// ─── Nominatim provider ─────────────────────────────────────────

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const USER_AGENT: &str = concat!("xcov19/", env!("CARGO_PKG_VERSION"), " (facility-lookup)");

#[derive(Deserialize, Debug, Default)]
struct NominatimReverse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<NominatimAddress>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct NominatimAddress {
    house_number: Option<String>,
    road: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    hamlet: Option<String>,
    state: Option<String>,
    postcode: Option<String>,
    country: Option<String>,
}

/// OpenStreetMap Nominatim `/reverse` client.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    base_url: String,
    timeout: Duration,
}

impl NominatimGeocoder {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn reverse_url(&self, location: &GeoLocation) -> String {
        format!(
            "{}/reverse?lat={}&lon={}&format=jsonv2&addressdetails=1",
            self.base_url,
            location.lat(),
            location.lng(),
        )
    }

    /// Blocking lookup; run it off the async executor.
    pub fn reverse_blocking(&self, location: &GeoLocation) -> Result<RawAddress, GeocodeError> {
        let response = ureq::get(&self.reverse_url(location))
            .set("User-Agent", USER_AGENT)
            .timeout(self.timeout)
            .call()
            .map_err(|e| GeocodeError::Network(e.to_string()))?;

        let body: NominatimReverse = response
            .into_json()
            .map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;

        Ok(nominatim_to_raw(body))
    }
}

impl Default for NominatimGeocoder {
    fn default() -> Self {
        Self::new(NOMINATIM_URL, Duration::from_secs(5))
    }
}

impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, query: &LocationQuery) -> Result<RawAddress, GeocodeError> {
        let client = self.clone();
        let location = query.location;
        tokio::task::spawn_blocking(move || client.reverse_blocking(&location))
            .await
            .map_err(|e| GeocodeError::Unavailable(e.to_string()))?
    }
}

/// A `{"error": ...}` body means Nominatim has no address at that point,
/// which is a partial (empty) resolution rather than a failure.
fn nominatim_to_raw(body: NominatimReverse) -> RawAddress {
    let mut raw = RawAddress::new();
    if body.error.is_some() {
        return raw;
    }
    let addr = body.address.unwrap_or_default();

    let street = match (addr.house_number, addr.road) {
        (Some(n), Some(r)) => Some(format!("{} {}", n, r)),
        (None, Some(r)) => Some(r),
        _ => None,
    };
    let city = addr.city.or(addr.town).or(addr.village).or(addr.hamlet);

    let fields = [
        ("name", body.name),
        ("street", street),
        ("city", city),
        ("state", addr.state),
        ("zip", addr.postcode),
        ("country", addr.country),
    ];
    for (key, value) in fields {
        if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
            raw.insert(key.to_string(), v);
        }
    }
    raw
}
