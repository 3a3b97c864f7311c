//! Application state wiring the run services together.
//!
//! AppState holds the concrete services used by both the CLI and the HTTP
//! layer. `FlowRunService` is generic over its repository; here it is pinned
//! to the SQLite implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use flowrun_core::engine::FlowEngine;
use flowrun_core::llm::box_generator::BoxTextGenerator;
use flowrun_core::service::flow_run::FlowRunService;
use flowrun_infra::config::load_global_config;
use flowrun_infra::filesystem::{ensure_data_dir, resolve_data_dir};
use flowrun_infra::llm::generator_from_env;
use flowrun_infra::sqlite::flow_run::SqliteFlowRunRepository;
use flowrun_infra::sqlite::pool::{DatabasePool, database_url};
use flowrun_types::config::{EngineConfig, GlobalConfig};

pub type ConcreteRunService = FlowRunService<SqliteFlowRunRepository>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Runs with the regular engine profile.
    pub run_service: Arc<ConcreteRunService>,
    /// Runs with the preview profile.
    pub preview_service: Arc<ConcreteRunService>,
    pub config: Arc<GlobalConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Resolve the data directory, load `config.toml`, pick the text
    /// generator from the environment and open the database.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        let config = load_global_config(&data_dir).await;
        let generator = generator_from_env(&config.ai).context("failed to set up text generator")?;
        Self::open(&data_dir, config, generator).await
    }

    /// Build state from explicit parts.
    pub async fn open(
        data_dir: &Path,
        config: GlobalConfig,
        generator: BoxTextGenerator,
    ) -> anyhow::Result<Self> {
        let db_pool = open_pool(data_dir).await?;
        let generator = Arc::new(generator);

        let service = |engine: &EngineConfig| {
            Arc::new(FlowRunService::new(
                SqliteFlowRunRepository::new(db_pool.clone()),
                FlowEngine::new(engine.clone(), generator.clone()),
            ))
        };
        let run_service = service(&config.engine);
        let preview_service = service(&config.preview);

        Ok(Self {
            run_service,
            preview_service,
            config: Arc::new(config),
            data_dir: data_dir.to_path_buf(),
        })
    }

    /// The service for the requested profile.
    pub fn service(&self, preview: bool) -> &Arc<ConcreteRunService> {
        if preview {
            &self.preview_service
        } else {
            &self.run_service
        }
    }
}

/// Create the data directory if needed and open the run database in it.
pub async fn open_pool(data_dir: &Path) -> anyhow::Result<DatabasePool> {
    ensure_data_dir(data_dir)
        .await
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
    let url = format!("{}?mode=rwc", database_url(data_dir));
    DatabasePool::new(&url)
        .await
        .with_context(|| format!("failed to open database at {url}"))
}
