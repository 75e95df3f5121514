use thiserror::Error;

/// Rejected input. Raised when a value is constructed or deserialized, so an
/// invalid value never reaches the lookup pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("latitude {0} is outside -90..=90")]
    Latitude(f64),
    #[error("longitude {0} is outside -180..=180")]
    Longitude(f64),
    #[error("invalid phone number format: '{0}'")]
    Contact(String),
    #[error("rating must be between {min} and {max}, got {value}")]
    Stars { value: u8, min: u8, max: u8 },
    #[error("rank must be between 1 and {max}, got {value}")]
    Rank { value: u8, max: u8 },
    #[error("estimated time must be a non-negative number of minutes, got {0}")]
    EstimatedTime(f64),
    #[error("{0} cannot be empty")]
    Empty(&'static str),
}
