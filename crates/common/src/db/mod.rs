//! Database layer for SessionVault
//!
//! Provides:
//! - SeaORM entity models
//! - Repository for session records
//! - Connection pool lifecycle (connect, migrate, ping, close)

pub mod models;
pub mod query;
mod repository;

pub use query::{ListParams, Pagination};
pub use repository::{ListOutcome, Repository, SessionInput};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

/// Database connection pool handle
///
/// Built once at startup and handed to everything that touches the store.
/// Cloning is cheap; all clones share the same pool.
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Connect using configuration, applying migrations when enabled
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(config.sqlx_logging);

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e),
            })?;

        let pool = Self { conn };

        if config.run_migrations {
            pool.migrate().await?;
        }

        info!("Database connection established");

        Ok(pool)
    }

    /// Apply all pending migrations
    pub async fn migrate(&self) -> Result<()> {
        Migrator::up(&self.conn, None)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Migration failed: {}", e),
            })?;

        info!("Migrations applied");
        Ok(())
    }

    /// Underlying connection
    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;

        Ok(())
    }

    /// Close the pool; outstanding clones stop working afterwards
    pub async fn close(self) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to close: {}", e),
            })
    }
}
