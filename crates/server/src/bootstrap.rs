use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use vendi_agent::llm::GenerativeClient;
use vendi_agent::orchestrator::Orchestrator;
use vendi_core::config::{AppConfig, ConfigError, LoadOptions};
use vendi_db::{connect, migrations, DbPool, SqlInventoryStore};

use crate::generative::OllamaClient;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("generative client initialization failed: {0}")]
    Generative(#[source] anyhow::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let client: Arc<dyn GenerativeClient> =
        Arc::new(OllamaClient::new(&config.generative).map_err(BootstrapError::Generative)?);
    let inventory = Arc::new(SqlInventoryStore::new(db_pool.clone()));
    let orchestrator = Arc::new(Orchestrator::new(client, inventory));

    Ok(Application { config, db_pool, orchestrator })
}
