use std::sync::Arc;

use fernwood_agent::{AgentRuntime, GeminiClient, LlmError, RuntimeOptions};
use fernwood_core::config::{AppConfig, ConfigError, LoadOptions};
use fernwood_db::repositories::product::SqlProductRepository;
use fernwood_db::repositories::thread_log::SqlThreadLog;
use fernwood_db::{connect, migrations, DbPool, PoolSettings};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub agent_runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("model client initialization failed: {0}")]
    Llm(#[source] LlmError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect(&PoolSettings::from(&config.database))
        .await
        .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let llm = Arc::new(GeminiClient::from_config(&config.llm).map_err(BootstrapError::Llm)?);
    let products = Arc::new(SqlProductRepository::new(db_pool.clone()));
    let thread_log = Arc::new(SqlThreadLog::new(db_pool.clone()));
    let agent_runtime = Arc::new(AgentRuntime::with_item_lookup(
        llm,
        products,
        thread_log,
        RuntimeOptions {
            recursion_limit: config.agent.recursion_limit,
            max_model_retries: config.llm.max_retries,
        },
    ));
    info!(event_name = "system.bootstrap.agent_ready", "agent runtime initialized");

    Ok(Application { config, db_pool, agent_runtime })
}
