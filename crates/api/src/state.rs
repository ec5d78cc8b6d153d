use std::sync::Arc;
use std::time::Duration;

use quicknotes_cardano::ChainIndexer;
use quicknotes_db::NoteStore;
use quicknotes_pipeline::NoteChainService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Note persistence backend.
    pub store: Arc<dyn NoteStore>,
    /// Build / assemble / submit pipeline, sharing `store`.
    pub chain: Arc<NoteChainService>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn NoteStore>,
        indexer: Arc<dyn ChainIndexer>,
        config: ServerConfig,
    ) -> Self {
        let chain = NoteChainService::new(Arc::clone(&store), indexer)
            .with_ttl_slots(config.tx_ttl_slots)
            .with_in_flight_timeout(Duration::from_secs(config.in_flight_timeout_secs));
        Self {
            store,
            chain: Arc::new(chain),
            config: Arc::new(config),
        }
    }
}
