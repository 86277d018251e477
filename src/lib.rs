pub mod models;
pub mod services;
pub mod commands;
pub mod db;
pub mod utils;

use std::sync::Arc;

use db::database::Database;
use models::settings::EvaluatorSettings;
use services::data_source::MarketDataSource;
use services::pipeline::Evaluator;
use services::sector_catalog::CatalogStore;

pub struct AppState {
    pub db: Database,
    pub evaluator: Evaluator,
}

impl AppState {
    pub fn new(db: Database, source: Arc<dyn MarketDataSource>, settings: EvaluatorSettings) -> Self {
        let evaluator = Evaluator::new(source, Arc::new(CatalogStore::new()), settings);
        Self { db, evaluator }
    }
}
