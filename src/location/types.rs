//! Core types for the location subsystem.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::error::ValidationError;

const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Raw key/value output of a reverse-geocoding capability.
pub type RawAddress = HashMap<String, String>;

/// A point on Earth. Both coordinates are range-checked on construction and
/// on deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeoLocationRepr")]
pub struct GeoLocation {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct GeoLocationRepr {
    lat: f64,
    lng: f64,
}

impl TryFrom<GeoLocationRepr> for GeoLocation {
    type Error = ValidationError;

    fn try_from(repr: GeoLocationRepr) -> Result<Self, Self::Error> {
        GeoLocation::new(repr.lat, repr.lng)
    }
}

impl GeoLocation {
    pub fn new(lat: f64, lng: f64) -> Result<Self, ValidationError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ValidationError::Latitude(lat));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(ValidationError::Longitude(lng));
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    /// Great-circle distance in kilometres (haversine).
    pub fn distance_km(&self, other: &GeoLocation) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlng = (other.lng - self.lng).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
    }
}

impl fmt::Display for GeoLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = if self.lat >= 0.0 { 'N' } else { 'S' };
        let ew = if self.lng >= 0.0 { 'E' } else { 'W' };
        write!(f, "{:.4}\u{00B0}{}, {:.4}\u{00B0}{}", self.lat.abs(), ns, self.lng.abs(), ew)
    }
}

/// A resolved postal address. Every field is independently optional since
/// reverse geocoding may only know part of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Address {
    /// Build an address from raw geocoder output. Unknown keys are ignored and
    /// blank values count as unset.
    pub fn from_raw(raw: &RawAddress) -> Self {
        let field = |key: &str| {
            raw.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            name: field("name"),
            street: field("street"),
            city: field("city"),
            state: field("state"),
            zip: field("zip"),
            country: field("country"),
        }
    }

    /// Derive a display address from a comma-separated address line.
    ///
    /// Parts are read from the right: `[..., street, city, state, zip, country]`.
    /// A postcode in one of the last two parts anchors the layout; without one,
    /// a line of three or more parts ends in the country. Leading parts beyond
    /// the street (place names) are dropped and positions that cannot be told
    /// apart stay unset.
    pub fn from_line(name: &str, line: &str) -> Self {
        let mut parts: Vec<String> = line
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        let mut address = Self {
            name: (!name.trim().is_empty()).then(|| name.trim().to_string()),
            ..Self::default()
        };

        let zip_at = parts
            .iter()
            .rposition(|p| looks_like_postcode(p))
            .filter(|&i| i > 0 && i + 2 >= parts.len());
        let anchored = match zip_at {
            Some(i) => {
                if i + 1 < parts.len() {
                    address.country = parts.pop();
                }
                address.zip = parts.pop();
                true
            }
            None if parts.len() >= 3 => {
                address.country = parts.pop();
                true
            }
            None => false,
        };
        if anchored && parts.len() >= 3 {
            address.state = parts.pop();
        }
        if parts.len() >= 2 {
            address.city = parts.pop();
        }
        address.street = parts.pop();
        address
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Back to the raw key/value shape (for caching).
    pub fn to_raw(&self) -> RawAddress {
        [
            ("name", &self.name),
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("zip", &self.zip),
            ("country", &self.country),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| (k.to_string(), v.clone())))
        .collect()
    }
}

/// Postcode shape: short, contains a digit, and at least as many digits as
/// letters (`411001`, `10115`, `560 034`).
fn looks_like_postcode(part: &str) -> bool {
    let digits = part.chars().filter(char::is_ascii_digit).count();
    let letters = part.chars().filter(|c| c.is_alphabetic()).count();
    part.chars().count() <= 10
        && digits > 0
        && digits >= letters
        && part.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-')
}

/// Anonymous requester handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub String);

/// Opaque identifier of a single patient query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(pub String);

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A location-aware facility request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationQuery {
    pub location: GeoLocation,
    pub cust_id: CustomerId,
    pub query_id: QueryId,
}

impl LocationQuery {
    pub fn new(location: GeoLocation, cust_id: impl Into<String>, query_id: impl Into<String>) -> Self {
        Self {
            location,
            cust_id: CustomerId(cust_id.into()),
            query_id: QueryId(query_id.into()),
        }
    }
}

/// Which link of the resolution chain produced an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeocodeSource {
    Cache,
    Nominatim,
    Builtin,
    Unresolved,
}

impl fmt::Display for GeocodeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "Cache"),
            Self::Nominatim => write!(f, "Nominatim"),
            Self::Builtin => write!(f, "Built-in"),
            Self::Unresolved => write!(f, "Unresolved"),
        }
    }
}

/// Reverse-geocoding failures. Missing address fields are not failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeocodeError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid geocoder response: {0}")]
    InvalidResponse(String),
    #[error("Geocoder unavailable: {0}")]
    Unavailable(String),
}
