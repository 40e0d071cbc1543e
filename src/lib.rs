pub mod config;
pub mod database;
pub mod descriptor;
pub mod error;
pub mod fairings;
pub mod models;
pub mod routes;
pub mod schema;
pub mod search;
pub mod services;
pub mod state;
pub mod storage;

use std::sync::Arc;

use log::error;
use rocket::Config;
use rocket_cors::{AllowedOrigins, CorsOptions};

pub use config::AppConfig;
pub use database::DatabaseService;
pub use descriptor::Descriptor;
pub use error::RegistryError;
pub use fairings::RequestLogger;
pub use search::SearchIndex;
pub use services::{AuthService, RegistryService};
pub use state::AppState;
pub use storage::PackageStore;

pub fn create_rocket() -> rocket::Rocket<rocket::Build> {
    // Load configuration from environment
    let config = AppConfig::from_env();

    let state = build_state(config).expect("Failed to initialize application state");

    // An empty index next to a populated store means the index was lost;
    // rebuild it before serving queries
    if let Err(e) = state.registry.rebuild_index_if_stale() {
        error!("Search index rebuild failed: {e}");
    }

    // Configure CORS
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .to_cors()
        .expect("Failed to create CORS configuration");

    // Configure Rocket with custom host and port
    let rocket_config = Config {
        port: state.config.port,
        address: state.config.host.parse().expect("Invalid host address"),
        ..Config::default()
    };

    rocket::custom(&rocket_config)
        .manage(state)
        .attach(cors)
        .attach(RequestLogger)
        .mount("/", routes::get_routes())
}

/// Wires up the shared handles: relational store, search index, archive
/// store and the registry service coordinating them.
pub fn build_state(config: AppConfig) -> Result<AppState, Box<dyn std::error::Error>> {
    let database = Arc::new(DatabaseService::new(&config.database_url)?);
    let index = Arc::new(SearchIndex::open(std::path::Path::new(&config.index_dir))?);
    let store = Arc::new(PackageStore::new(&config)?);
    let registry = RegistryService::new(database.clone(), index.clone());

    Ok(AppState {
        config,
        database,
        index,
        store,
        registry,
    })
}
