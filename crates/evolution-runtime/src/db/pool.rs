use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Connection, PgConnection};
use tracing::{debug, warn};

use evolution_core::config::DatabaseConfig;
use evolution_core::db::{map_pg_error, map_sqlite_error, Dialect, Transaction};
use evolution_core::error::{EvolutionError, Result};

/// Database connection wrapper providing connection pooling.
///
/// The engine never holds a connection between migration steps: each step
/// checks one out through [`Database::begin`] and returns it on commit or
/// rollback.
#[derive(Clone)]
pub enum Database {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl Database {
    /// Create a new database connection from configuration.
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        if config.pool_size == 0 {
            return Err(EvolutionError::Config(
                "database.pool_size must be at least 1".to_string(),
            ));
        }
        let timeout = Duration::from_secs(config.pool_timeout_secs);

        match config.dialect()? {
            Dialect::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.pool_size)
                    .acquire_timeout(timeout)
                    .connect(&config.url)
                    .await
                    .map_err(|e| {
                        EvolutionError::database(format!("Failed to connect to database: {}", e))
                    })?;
                Ok(Database::Postgres(pool))
            }
            Dialect::Sqlite => {
                let options = SqliteConnectOptions::from_str(&config.url)
                    .map_err(|e| EvolutionError::Config(format!("Invalid SQLite URL: {}", e)))?
                    .create_if_missing(true);

                // Every connection to `:memory:` is a separate database, so
                // an in-memory pool must never open a second one.
                let in_memory = config.url.contains(":memory:");
                let pool_options = if in_memory {
                    SqlitePoolOptions::new()
                        .max_connections(1)
                        .min_connections(1)
                        .idle_timeout(None)
                        .max_lifetime(None)
                } else {
                    SqlitePoolOptions::new().max_connections(config.pool_size)
                };

                let pool = pool_options
                    .acquire_timeout(timeout)
                    .connect_with(options)
                    .await
                    .map_err(|e| {
                        EvolutionError::database(format!("Failed to connect to database: {}", e))
                    })?;
                Ok(Database::Sqlite(pool))
            }
        }
    }

    /// Connect to the given URL with default pool settings.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::from_config(&DatabaseConfig {
            url: url.to_string(),
            ..Default::default()
        })
        .await
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Database::Postgres(_) => Dialect::Postgres,
            Database::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Check out a connection and open a transaction on it.
    pub async fn begin(&self) -> Result<Transaction> {
        match self {
            Database::Postgres(pool) => pool
                .begin()
                .await
                .map(Transaction::Postgres)
                .map_err(map_pg_error),
            Database::Sqlite(pool) => pool
                .begin()
                .await
                .map(Transaction::Sqlite)
                .map_err(map_sqlite_error),
        }
    }

    /// Take the migration lock named `name`.
    ///
    /// On PostgreSQL this is a session advisory lock keyed by
    /// `hashtext(name)`. It is held on a connection opened outside the pool,
    /// so migration steps can still check out every pooled connection.
    /// SQLite serializes writers on the database file, so no lock is taken
    /// there.
    pub async fn lock(&self, name: &str) -> Result<MigrationLock> {
        match self {
            Database::Postgres(pool) => {
                debug!(lock = name, "Acquiring migration lock...");
                let mut conn = PgConnection::connect_with(pool.connect_options().as_ref())
                    .await
                    .map_err(map_pg_error)?;
                sqlx::query("SELECT pg_advisory_lock(hashtext($1))")
                    .bind(name)
                    .execute(&mut conn)
                    .await
                    .map_err(|e| {
                        EvolutionError::database(format!(
                            "Failed to acquire migration lock: {}",
                            e
                        ))
                    })?;
                debug!("Migration lock acquired");
                Ok(MigrationLock {
                    name: name.to_string(),
                    conn: Some(conn),
                })
            }
            Database::Sqlite(_) => Ok(MigrationLock {
                name: name.to_string(),
                conn: None,
            }),
        }
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<()> {
        let mut tx = self.begin().await?;
        tx.fetch_all("SELECT 1", &[]).await?;
        tx.rollback().await
    }

    /// Close all connections gracefully.
    pub async fn close(&self) {
        match self {
            Database::Postgres(pool) => pool.close().await,
            Database::Sqlite(pool) => pool.close().await,
        }
    }
}

/// A held migration lock.
pub struct MigrationLock {
    name: String,
    conn: Option<PgConnection>,
}

impl MigrationLock {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Release the lock and close the session that took it.
    pub async fn release(mut self) -> Result<()> {
        if let Some(mut conn) = self.conn.take() {
            sqlx::query("SELECT pg_advisory_unlock(hashtext($1))")
                .bind(&self.name)
                .execute(&mut conn)
                .await
                .map_err(|e| {
                    EvolutionError::database(format!("Failed to release migration lock: {}", e))
                })?;
            conn.close().await.map_err(map_pg_error)?;
            debug!(lock = %self.name, "Migration lock released");
        }
        Ok(())
    }
}

impl Drop for MigrationLock {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            // The server drops session locks when the socket closes.
            warn!(
                lock = %self.name,
                "Migration lock dropped without release; closing its connection"
            );
            drop(conn);
        }
    }
}
