//! Postgres persistence: one store handle per table, all sharing a pool.

mod error;
mod events;
mod registrations;
mod resets;
mod users;

pub use error::DbError;
pub use events::{CalendarEntry, DeletedEvent, EventFilter, EventStore, EventUpdate, NewEvent};
pub use registrations::{MyRegistration, RegistrationStore, EVENT_STUDENT_CONSTRAINT};
pub use resets::{ResetStore, ValidReset};
pub use users::{normalize_email, NewUser, ProfileUpdate, UserStore, EMAIL_CONSTRAINT, ROLL_NUMBER_CONSTRAINT};

use std::path::PathBuf;
use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

/// Pool and schema settings, filled in by [`crate::config::Config`].
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    /// SQL migrations applied by `campus-api migrate` and in dev mode.
    pub migrations_dir: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/campusconnect".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            migrations_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations"),
        }
    }
}

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    migrations_dir: PathBuf,
}

impl Database {
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(DbError::Connect)?;

        info!(
            max_connections = config.max_connections,
            "Database pool ready"
        );

        Ok(Self {
            pool,
            migrations_dir: config.migrations_dir.clone(),
        })
    }

    /// Round-trip a trivial query; used by `/readyz`.
    pub async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn run_migrations(&self) -> Result<(), DbError> {
        let migrator = Migrator::new(self.migrations_dir.clone())
            .await
            .map_err(DbError::Migration)?;
        migrator.run(&self.pool).await.map_err(DbError::Migration)?;

        info!(migrations_dir = %self.migrations_dir.display(), "Schema up to date");
        Ok(())
    }

    /// Get a credential store handle.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get an event store handle.
    pub fn events(&self) -> EventStore {
        EventStore::new(self.pool.clone())
    }

    /// Get a registration store handle.
    pub fn registrations(&self) -> RegistrationStore {
        RegistrationStore::new(self.pool.clone())
    }

    /// Get a password-reset store handle.
    pub fn resets(&self) -> ResetStore {
        ResetStore::new(self.pool.clone())
    }
}

/// Parse a stored typed id, reporting the table on failure.
pub(crate) fn parse_id<T>(table: &'static str, raw: &str) -> Result<T, DbError>
where
    T: std::str::FromStr<Err = campus_id::IdError>,
{
    raw.parse().map_err(|e: campus_id::IdError| DbError::Corrupt {
        table,
        message: format!("bad id '{raw}': {e}"),
    })
}
