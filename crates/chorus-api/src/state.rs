//! Application state wiring the pipeline together.
//!
//! The pipeline is generic over repository/client traits, but AppState pins
//! it to the concrete infra implementations and holds it behind an Arc so
//! the axum handlers can share it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use chorus_core::pipeline::{MessagePipeline, PipelineSettings};
use chorus_infra::dispatch::HttpReplyDispatcher;
use chorus_infra::llm::completion::HttpCompletionClient;
use chorus_infra::llm::embedding::HttpEmbeddingClient;
use chorus_infra::sqlite::persona::SqlitePersonaRepository;
use chorus_infra::sqlite::pool::DatabasePool;
use chorus_infra::sqlite::session::SqliteSessionRepository;
use chorus_infra::sqlite::telemetry::SqliteTelemetryRepository;
use chorus_infra::sqlite::turn::SqliteTurnRepository;
use chorus_infra::vector::knowledge::LanceKnowledgeStore;
use chorus_infra::vector::lance::LanceVectorStore;
use chorus_types::config::AppConfig;

/// The message pipeline pinned to the concrete infra implementations.
pub type ConcretePipeline = MessagePipeline<
    SqliteSessionRepository,
    SqliteTurnRepository,
    SqlitePersonaRepository,
    HttpCompletionClient,
    HttpReplyDispatcher,
    SqliteTelemetryRepository,
    HttpEmbeddingClient,
    LanceKnowledgeStore,
>;

/// Shared application state used by CLI commands and HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ConcretePipeline>,
    pub config: Arc<AppConfig>,
    pub db_pool: DatabasePool,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: connect to DB, wire the pipeline.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let db_url = format!("sqlite://{}?mode=rwc", data_dir.join("chorus.db").display());
        let db_pool = DatabasePool::new(&db_url).await?;

        let vector_store = LanceVectorStore::new(data_dir.join("vector_store")).await?;
        let knowledge = LanceKnowledgeStore::new(vector_store, config.embedding.dimension);

        let completion = HttpCompletionClient::new(&config.completion)?;
        let embedder = HttpEmbeddingClient::new(&config.embedding)?;
        let dispatcher = HttpReplyDispatcher::new(config.webhook.secret.clone(), &config.dispatch)?;

        let pipeline = MessagePipeline::new(
            SqliteSessionRepository::new(db_pool.clone()),
            SqliteTurnRepository::new(db_pool.clone()),
            SqlitePersonaRepository::new(db_pool.clone()),
            completion,
            embedder,
            knowledge,
            dispatcher,
            SqliteTelemetryRepository::new(db_pool.clone()),
            PipelineSettings::from_config(&config),
        );

        Ok(Self {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
            db_pool,
            data_dir,
        })
    }
}

/// Resolve the data directory: `CHORUS_DATA_DIR` env var, else `~/.chorus`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHORUS_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".chorus")
}

/// Load `config.toml` from `CHORUS_CONFIG` or the data directory.
pub fn load_config() -> anyhow::Result<AppConfig> {
    let path = match std::env::var("CHORUS_CONFIG") {
        Ok(p) => PathBuf::from(p),
        Err(_) => resolve_data_dir().join("config.toml"),
    };

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: AppConfig = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}
