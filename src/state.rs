// State module
// Shared application state handed to every handler

use std::sync::Arc;

use crate::{config::Config, services::DatabaseService};

pub struct AppState {
    pub config: Config,
    pub db: DatabaseService,
}

impl AppState {
    pub fn new(config: Config, db: DatabaseService) -> Arc<Self> {
        Arc::new(Self { config, db })
    }

    pub fn open(config: Config) -> anyhow::Result<Arc<Self>> {
        let db = DatabaseService::open(&config.database_path)?;
        Ok(Self::new(config, db))
    }
}
