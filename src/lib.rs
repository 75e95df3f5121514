//! xcov19: geolocation-aware healthcare facility lookup.
//!
//! A patient query carries approximate coordinates. The pipeline resolves
//! them to an address, collects nearby providers relevant to the patient's
//! symptoms, and returns them ranked.

pub mod config;
pub mod diagnosis;
pub mod error;
pub mod facility;
pub mod location;
pub mod logging;
pub mod service;

pub use error::ValidationError;
pub use service::{GeolocationQueryService, LocationQueryService, ServiceError};
