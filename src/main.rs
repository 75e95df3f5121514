use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use xcov19::config::Settings;
use xcov19::diagnosis::{DiagnosisQuery, PatientStore, QueryStore};
use xcov19::facility::{DirectoryRepository, FacilityRanking, RepositoryLookup};
use xcov19::location::cache::GeocodeCache;
use xcov19::location::{FallbackGeocoder, GeoLocation, LocationQuery, NominatimGeocoder};
use xcov19::logging::{info, o, DEFAULT};
use xcov19::{GeolocationQueryService, LocationQueryService};

/// xcov19: find care facilities near a patient.
///
/// Record the symptoms first, then look up facilities for the same query id.
///
/// Examples:
///   xcov19 diagnose --query-id q1 --query "fever, cough"
///   xcov19 locate --lat 18.52 --lng 73.85 --cust-id c1 --query-id q1
///   xcov19 locate --lat -1.29 --lng 36.82 --cust-id c1 --query-id q2 --offline
///
/// Settings come from APP_* environment variables (APP_DATA_DIR,
/// APP_PROVIDER_DIRECTORY, APP_SEARCH_RADIUS_KM, APP_MAX_RESULTS, ...).
#[derive(Parser)]
#[command(name = "xcov19", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a patient's symptom text under a query id.
    Diagnose {
        #[arg(long)]
        query_id: String,

        /// Free-text symptoms.
        #[arg(long)]
        query: String,
    },

    /// Find ranked facilities near a location. Prints JSON, or `null` when
    /// nothing matches.
    Locate {
        /// Latitude (-90 to 90).
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude (-180 to 180).
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,

        #[arg(long)]
        cust_id: String,

        #[arg(long)]
        query_id: String,

        /// Offline mode: only use cache and built-in data.
        #[arg(long)]
        offline: bool,

        /// Provider directory JSON file (overrides APP_PROVIDER_DIRECTORY).
        #[arg(long)]
        providers: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let log = DEFAULT.new(o!("function" => "main"));
    let store = Arc::new(QueryStore::load(&settings.data_dir)?);

    match cli.command {
        Command::Diagnose { query_id, query } => {
            store.enqueue_diagnosis_query(DiagnosisQuery::new(query, query_id.clone())?)?;
            info!(log, "diagnosis recorded"; "query_id" => query_id);
        }
        Command::Locate {
            lat,
            lng,
            cust_id,
            query_id,
            offline,
            providers,
        } => {
            let query = LocationQuery::new(GeoLocation::new(lat, lng)?, cust_id, query_id);
            store.enqueue_geolocation_query(&query)?;

            let mut geocoder = FallbackGeocoder::new(
                GeocodeCache::load(&settings.data_dir),
                NominatimGeocoder::new(&settings.nominatim_url, settings.stage_timeout),
            );
            geocoder.set_offline(offline || settings.offline);

            let directory = providers.unwrap_or_else(|| settings.provider_directory.clone());
            let queries: Arc<dyn PatientStore> = store.clone();
            let lookup = RepositoryLookup::new(DirectoryRepository::load(&directory, queries)?)
                .with_ranking(FacilityRanking::new(settings.max_results, settings.travel_speed_kmh))
                .with_radius_km(settings.search_radius_km);

            let service = GeolocationQueryService::new().with_stage_timeout(settings.stage_timeout);
            let results = service.fetch_facilities(&geocoder, &query, &lookup).await?;

            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }
    Ok(())
}
