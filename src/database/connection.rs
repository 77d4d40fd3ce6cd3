use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use super::PersistenceError;
use crate::config::DatabaseConfig;

/// Owns the shared connection pool for a process.
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, PersistenceError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(PersistenceError::Connect)?;

        info!(max_connections = config.max_connections, "🗄️ Database pool connected");

        let connection = Self { pool };
        if config.run_migrations {
            connection.migrate().await?;
        }
        Ok(connection)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> Result<(), PersistenceError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
