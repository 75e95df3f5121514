//! Facility directory records and the client-facing result view.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::location::{Address, GeoLocation};

pub const MIN_STARS: u8 = 1;
pub const MAX_STARS: u8 = 5;
/// Highest rank a result can carry; result lists never exceed this length.
pub const MAX_RANK: u8 = 20;

/// Kind of care facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacilityEstablishment {
    Hospital,
    Clinic,
    Nursing,
    Lab,
    Pharmacy,
}

/// Who owns or runs a facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FacilityOwnership {
    Government,
    Private,
    Public,
    PublicPrivate,
    Charity,
}

impl fmt::Display for FacilityEstablishment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Hospital => "hospital",
            Self::Clinic => "clinic",
            Self::Nursing => "nursing",
            Self::Lab => "lab",
            Self::Pharmacy => "pharmacy",
        };
        f.write_str(s)
    }
}

impl fmt::Display for FacilityOwnership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Government => "government",
            Self::Private => "private",
            Self::Public => "public",
            Self::PublicPrivate => "public-private",
            Self::Charity => "charity",
        };
        f.write_str(s)
    }
}

/// A phone-like contact number: a leading `+` or digit, then digits with
/// optional spaces or hyphens as separators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Contact(String);

impl Contact {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let mut chars = value.chars();
        let valid_prefix = matches!(chars.next(), Some(c) if c == '+' || c.is_ascii_digit());
        let valid_rest = chars.all(|c| c.is_ascii_digit() || c == ' ' || c == '-');
        let has_digit = value.chars().any(|c| c.is_ascii_digit());
        if valid_prefix && valid_rest && has_digit {
            Ok(Self(value))
        } else {
            Err(ValidationError::Contact(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Contact {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Contact::new(value)
    }
}

impl From<Contact> for String {
    fn from(contact: Contact) -> String {
        contact.0
    }
}

/// Star rating in `MIN_STARS..=MAX_STARS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Stars(u8);

impl Stars {
    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if (MIN_STARS..=MAX_STARS).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::Stars {
                value,
                min: MIN_STARS,
                max: MAX_STARS,
            })
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Stars {
    fn default() -> Self {
        Self(MIN_STARS)
    }
}

impl TryFrom<u8> for Stars {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Stars::new(value)
    }
}

impl From<Stars> for u8 {
    fn from(stars: Stars) -> u8 {
        stars.0
    }
}

/// Request-scoped position of a result, `1..=MAX_RANK`, 1 being the best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rank(u8);

impl Rank {
    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if (1..=MAX_RANK).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::Rank { value, max: MAX_RANK })
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rank {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Rank::new(value)
    }
}

impl From<Rank> for u8 {
    fn from(rank: Rank) -> u8 {
        rank.0
    }
}

/// Estimated minutes until the patient can be seen. Finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct EstimatedTime(f64);

impl EstimatedTime {
    pub fn new(minutes: f64) -> Result<Self, ValidationError> {
        if minutes.is_finite() && minutes >= 0.0 {
            Ok(Self(minutes))
        } else {
            Err(ValidationError::EstimatedTime(minutes))
        }
    }

    pub fn minutes(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for EstimatedTime {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        EstimatedTime::new(value)
    }
}

impl From<EstimatedTime> for f64 {
    fn from(time: EstimatedTime) -> f64 {
        time.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub name: String,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub degree: Vec<String>,
    /// Years of practice.
    #[serde(default)]
    pub experience: f64,
    #[serde(default)]
    pub fee: f64,
}

/// A care facility as stored in the provider directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    /// Comma-separated address line: `street, city, state, zip, country`.
    pub address: String,
    pub geo_location: GeoLocation,
    pub contact: Contact,
    pub facility_type: FacilityEstablishment,
    pub ownership: FacilityOwnership,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub available_doctors: Vec<Doctor>,
    #[serde(default)]
    pub stars: Stars,
    #[serde(default)]
    pub reviews: u32,
}

impl Provider {
    /// Structured form of the address line.
    pub fn display_address(&self) -> Address {
        Address::from_line(&self.name, &self.address)
    }
}

/// A ranked provider as returned to the client. Derived per request, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityResult {
    pub name: String,
    pub address: Address,
    pub geolocation: GeoLocation,
    pub contact: String,
    pub facility_type: FacilityEstablishment,
    pub ownership: FacilityOwnership,
    pub specialties: Vec<String>,
    pub stars: Stars,
    pub reviews: u32,
    pub rank: Rank,
    pub estimated_time: EstimatedTime,
}

impl FacilityResult {
    pub fn from_provider(provider: &Provider, rank: Rank, estimated_time: EstimatedTime) -> Self {
        Self {
            name: provider.name.clone(),
            address: provider.display_address(),
            geolocation: provider.geo_location,
            contact: provider.contact.as_str().to_string(),
            facility_type: provider.facility_type,
            ownership: provider.ownership,
            specialties: provider.specialties.clone(),
            stars: provider.stars,
            reviews: provider.reviews,
            rank,
            estimated_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_contact_valid() {
        assert!(Contact::new("+1234567890").is_ok());
        assert!(Contact::new("+919999999999").is_ok());
        assert!(Contact::new("020 7946-0958").is_ok());
    }

    #[test]
    fn test_contact_invalid() {
        assert_eq!(Contact::new(""), Err(ValidationError::Contact(String::new())));
        assert!(Contact::new("+").is_err());
        assert!(Contact::new("call me").is_err());
        assert!(Contact::new("+12ab34").is_err());
        assert!(Contact::new("-123").is_err());
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_string(&FacilityEstablishment::Nursing).unwrap(), r#""nursing""#);
        assert_eq!(serde_json::to_string(&FacilityOwnership::PublicPrivate).unwrap(), r#""public-private""#);
        let owner: FacilityOwnership = serde_json::from_str(r#""charity""#).unwrap();
        assert_eq!(owner, FacilityOwnership::Charity);
        assert_eq!(FacilityOwnership::PublicPrivate.to_string(), "public-private");
        assert!(serde_json::from_str::<FacilityEstablishment>(r#""spa""#).is_err());
    }

    #[test]
    fn test_provider_deserialize_defaults() {
        let provider: Provider = serde_json::from_str(
            r#"{
                "name": "Dummy Hospital",
                "address": "123 Test Street",
                "geo_location": {"lat": 0.0, "lng": 0.0},
                "contact": "+1234567890",
                "facility_type": "hospital",
                "ownership": "private"
            }"#,
        )
        .unwrap();
        assert_eq!(provider.stars, Stars::default());
        assert_eq!(provider.reviews, 0);
        assert!(provider.available_doctors.is_empty());
    }

    #[test]
    fn test_provider_rejects_invalid_fields() {
        let base = |stars: &str, reviews: &str, contact: &str| {
            format!(
                r#"{{"name": "X", "address": "", "geo_location": {{"lat": 0, "lng": 0}},
                    "contact": "{}", "facility_type": "lab", "ownership": "public",
                    "stars": {}, "reviews": {}}}"#,
                contact, stars, reviews
            )
        };
        assert!(serde_json::from_str::<Provider>(&base("3", "10", "+100")).is_ok());
        assert!(serde_json::from_str::<Provider>(&base("0", "10", "+100")).is_err());
        assert!(serde_json::from_str::<Provider>(&base("6", "10", "+100")).is_err());
        assert!(serde_json::from_str::<Provider>(&base("3", "-1", "+100")).is_err());
        assert!(serde_json::from_str::<Provider>(&base("3", "10", "n/a")).is_err());
    }

    #[test]
    fn test_result_wire_shape() {
        let provider = Provider {
            name: "Test facility".into(),
            address: "".into(),
            geo_location: GeoLocation::new(0.0, 0.0).unwrap(),
            contact: Contact::new("+919999999999").unwrap(),
            facility_type: FacilityEstablishment::Nursing,
            ownership: FacilityOwnership::Charity,
            specialties: vec!["surgery".into(), "pediatrics".into()],
            available_doctors: vec![],
            stars: Stars::new(4).unwrap(),
            reviews: 120,
        };
        let result = FacilityResult::from_provider(&provider, Rank::new(2).unwrap(), EstimatedTime::new(20.0).unwrap());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["facility_type"], "nursing");
        assert_eq!(json["ownership"], "charity");
        assert_eq!(json["stars"], 4);
        assert_eq!(json["rank"], 2);
        assert_eq!(json["estimated_time"], 20.0);
        assert_eq!(json["contact"], "+919999999999");
        assert_eq!(json["address"]["name"], "Test facility");
        assert!(json["address"].get("street").is_none());
    }

    #[test]
    fn test_result_rejects_rank_zero_on_deserialize() {
        let json = r#"{"name": "A", "address": {}, "geolocation": {"lat": 0, "lng": 0},
            "contact": "+1", "facility_type": "clinic", "ownership": "private",
            "specialties": [], "stars": 3, "reviews": 0, "rank": 0, "estimated_time": 1.5}"#;
        assert!(serde_json::from_str::<FacilityResult>(json).is_err());
    }

    proptest! {
        #[test]
        fn prop_stars_bounds(value in any::<u8>()) {
            prop_assert_eq!(Stars::new(value).is_ok(), (1..=5).contains(&value));
        }

        #[test]
        fn prop_rank_bounds(value in any::<u8>()) {
            prop_assert_eq!(Rank::new(value).is_ok(), (1..=20).contains(&value));
        }

        #[test]
        fn prop_estimated_time_non_negative(minutes in -1.0e6f64..1.0e6) {
            prop_assert_eq!(EstimatedTime::new(minutes).is_ok(), minutes >= 0.0);
        }
    }
}
