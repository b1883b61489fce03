use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// SQLSTATE codes the data layer classifies
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const NOT_NULL_VIOLATION: &str = "23502";

/// Tagged errors raised by the data-access layer.
///
/// Handlers switch on the variant; the driver's message text is never inspected.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl DatabaseError {
    pub fn not_found(entity: impl Into<String>) -> Self {
        DatabaseError::NotFound(entity.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        DatabaseError::Conflict(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DatabaseError::Validation(message.into())
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return DatabaseError::NotFound("Record".to_string());
        }

        let Some(db_err) = err.as_database_error() else {
            return DatabaseError::Sqlx(err);
        };

        let constraint = db_err.constraint().unwrap_or("unknown").to_string();
        let code = db_err.code().map(|c| c.into_owned());
        match code.as_deref() {
            Some(UNIQUE_VIOLATION) => {
                DatabaseError::Conflict(format!("duplicate value violates {}", constraint))
            }
            Some(FOREIGN_KEY_VIOLATION) => {
                DatabaseError::Validation(format!("referenced record does not exist ({})", constraint))
            }
            Some(CHECK_VIOLATION) | Some(NOT_NULL_VIOLATION) => {
                DatabaseError::Validation(format!("value rejected by {}", constraint))
            }
            _ => DatabaseError::Sqlx(err),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationError(err.to_string())
    }
}

/// True when `err` is a unique violation raised by the named constraint
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    constraint_violation(err, UNIQUE_VIOLATION, constraint)
}

/// True when `err` is a foreign key violation raised by the named constraint
pub fn is_foreign_key_violation(err: &sqlx::Error, constraint: &str) -> bool {
    constraint_violation(err, FOREIGN_KEY_VIOLATION, constraint)
}

fn constraint_violation(err: &sqlx::Error, code: &str, constraint: &str) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.code().as_deref() == Some(code) && db_err.constraint() == Some(constraint))
        .unwrap_or(false)
}

/// Owns the connection pool for the application database
#[derive(Clone)]
pub struct DatabaseManager {
    pool: PgPool,
}

impl DatabaseManager {
    /// Connect eagerly; fails fast when the database is unreachable
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let url = Self::validate_url(&config.url)?;
        let pool = Self::pool_options(config).connect(&url).await.map_err(DatabaseError::Sqlx)?;
        info!("Connected database pool (max_connections={})", config.max_connections);
        Ok(Self { pool })
    }

    /// Build the pool without opening a connection; the first query connects
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let url = Self::validate_url(&config.url)?;
        let pool = Self::pool_options(config).connect_lazy(&url).map_err(DatabaseError::Sqlx)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
    }

    fn validate_url(raw: &str) -> Result<String, DatabaseError> {
        if raw.trim().is_empty() {
            return Err(DatabaseError::ConfigMissing("DATABASE_URL"));
        }
        let url = url::Url::parse(raw).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        match url.scheme() {
            "postgres" | "postgresql" => Ok(url.into()),
            _ => Err(DatabaseError::InvalidDatabaseUrl),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded SQL migrations
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(DatabaseError::Sqlx)?;
        Ok(())
    }

    /// Close the pool (e.g., on shutdown)
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }
}
