//! Care facilities: directory records, repository access, and ranking.

pub mod ranking;
pub mod repository;
pub mod types;

pub use ranking::{FacilityLookup, FacilityRanking, RepositoryLookup};
pub use repository::{DirectoryRepository, LookupError, ProviderRepository};
pub use types::{
    Contact, Doctor, EstimatedTime, FacilityEstablishment, FacilityOwnership, FacilityResult, Provider, Rank, Stars,
};
