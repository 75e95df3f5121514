//! Runtime settings read from `APP_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::facility::ranking::{DEFAULT_SEARCH_RADIUS_KM, DEFAULT_TRAVEL_SPEED_KMH};
use crate::facility::types::MAX_RANK;
use crate::location::providers::NOMINATIM_URL;

const PREFIX: &str = "APP_";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name}: cannot parse '{value}'")]
    Parse { name: String, value: String },
    #[error("{name}: {reason}")]
    OutOfRange { name: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub search_radius_km: f64,
    pub max_results: u8,
    pub travel_speed_kmh: f64,
    pub nominatim_url: String,
    pub offline: bool,
    pub data_dir: PathBuf,
    pub provider_directory: PathBuf,
    pub stage_timeout: Duration,
}

/// Raw value of `APP_<name>`, if set.
pub fn get(name: &str) -> Option<String> {
    std::env::var(format!("{}{}", PREFIX, name)).ok()
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".xcov19")
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(get)
    }

    /// Build settings from any `name -> value` source; names are given
    /// without the `APP_` prefix.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let search_radius_km = parse_var(&lookup, "SEARCH_RADIUS_KM")?.unwrap_or(DEFAULT_SEARCH_RADIUS_KM);
        if !(search_radius_km.is_finite() && search_radius_km > 0.0) {
            return Err(out_of_range("SEARCH_RADIUS_KM", "must be a positive number of kilometres"));
        }

        let max_results = parse_var(&lookup, "MAX_RESULTS")?.unwrap_or(MAX_RANK);
        if !(1..=MAX_RANK).contains(&max_results) {
            return Err(out_of_range("MAX_RESULTS", &format!("must be between 1 and {}", MAX_RANK)));
        }

        let travel_speed_kmh = parse_var(&lookup, "TRAVEL_SPEED_KMH")?.unwrap_or(DEFAULT_TRAVEL_SPEED_KMH);
        if !(travel_speed_kmh.is_finite() && travel_speed_kmh > 0.0) {
            return Err(out_of_range("TRAVEL_SPEED_KMH", "must be positive"));
        }

        let stage_timeout_secs: u64 = parse_var(&lookup, "STAGE_TIMEOUT_SECS")?.unwrap_or(10);
        if stage_timeout_secs == 0 {
            return Err(out_of_range("STAGE_TIMEOUT_SECS", "must be at least 1 second"));
        }

        let data_dir = lookup("DATA_DIR").map(PathBuf::from).unwrap_or_else(default_data_dir);
        let provider_directory = lookup("PROVIDER_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("providers.json"));

        Ok(Self {
            search_radius_km,
            max_results,
            travel_speed_kmh,
            nominatim_url: lookup("NOMINATIM_URL").unwrap_or_else(|| NOMINATIM_URL.to_string()),
            offline: parse_var(&lookup, "OFFLINE")?.unwrap_or(false),
            data_dir,
            provider_directory,
            stage_timeout: Duration::from_secs(stage_timeout_secs),
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value.trim().parse().map(Some).map_err(|_| ConfigError::Parse {
            name: format!("{}{}", PREFIX, name),
            value,
        }),
    }
}

fn out_of_range(name: &str, reason: &str) -> ConfigError {
    ConfigError::OutOfRange {
        name: format!("{}{}", PREFIX, name),
        reason: reason.to_string(),
    }
}
