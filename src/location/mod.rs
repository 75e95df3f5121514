//! Location subsystem: coordinates, addresses, and reverse geocoding.
//!
//! Provides the address resolver, a Nominatim client, a built-in city
//! dataset for offline use, and a local cache.

pub mod cache;
pub mod providers;
pub mod resolver;
pub mod types;

pub use providers::{BuiltinGeocoder, NominatimGeocoder, ReverseGeocoder};
pub use resolver::{AddressResolver, FallbackGeocoder};
pub use types::{Address, CustomerId, GeoLocation, GeocodeError, GeocodeSource, LocationQuery, QueryId, RawAddress};
