//! Application state wiring the draft services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! `AssessmentService` is generic over the repository ports; AppState pins it
//! to the SQLite implementations.

use std::path::PathBuf;
use std::sync::Arc;

use pillars_core::draft::conflict::ConflictGuard;
use pillars_core::draft::recovery::RecoveryAdvisor;
use pillars_core::draft::store::DraftStore;
use pillars_core::service::assessment::{AssessmentService, SaveContext};
use pillars_infra::config::{
    load_global_config, resolve_data_dir, resolve_expiry_threshold, resolve_remote_timeout,
};
use pillars_infra::device::{capture_device_info, device_metadata};
use pillars_infra::sqlite::draft::SqliteDraftRepository;
use pillars_infra::sqlite::pool::{DatabasePool, database_url};
use pillars_infra::sqlite::recovery::SqliteRecoveryProcedure;
use pillars_types::config::GlobalConfig;

/// Concrete type alias for the service generics pinned to infra implementations.
pub type ConcreteAssessmentService =
    AssessmentService<SqliteDraftRepository, SqliteRecoveryProcedure>;

/// Shared application state.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub assessment_service: Arc<ConcreteAssessmentService>,
    pub config: Arc<GlobalConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: load config, connect to DB, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_global_config(&data_dir).await;

        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        tracing::debug!(data_dir = %data_dir.display(), "application state initialized");
        Ok(Self::from_parts(db_pool, config, data_dir))
    }

    /// Wire services over an already-open pool.
    pub fn from_parts(db_pool: DatabasePool, config: GlobalConfig, data_dir: PathBuf) -> Self {
        let timeout = resolve_remote_timeout(&config);

        let store = DraftStore::new(SqliteDraftRepository::new(db_pool.clone())).with_timeout(timeout);
        let guard = ConflictGuard::new(resolve_expiry_threshold(&config));
        let advisor =
            RecoveryAdvisor::new(SqliteRecoveryProcedure::new(db_pool.clone())).with_timeout(timeout);

        Self {
            assessment_service: Arc::new(AssessmentService::new(store, guard, advisor)),
            config: Arc::new(config),
            data_dir,
            db_pool,
        }
    }

    /// Save context for a form filled on this machine, stamped with the
    /// current device snapshot and its fingerprint.
    pub fn save_context(
        &self,
        owner_id: &str,
        assessment_type: &str,
        assessment_key: &str,
    ) -> SaveContext {
        let device_info = capture_device_info();
        let metadata = device_metadata(&device_info);
        SaveContext::new(owner_id, assessment_type, assessment_key)
            .with_device(device_info, metadata)
    }
}
