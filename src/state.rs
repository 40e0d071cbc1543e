use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::DatabaseService;
use crate::search::SearchIndex;
use crate::services::RegistryService;
use crate::storage::PackageStore;

pub struct AppState {
    pub config: AppConfig,
    pub database: Arc<DatabaseService>,
    pub index: Arc<SearchIndex>,
    pub store: Arc<PackageStore>,
    pub registry: RegistryService,
}
