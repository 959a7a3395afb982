use anyhow::{anyhow, Context, Result};
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel_migrations::{FileBasedMigrations, MigrationHarness};

pub mod models;
pub mod resolve;
pub mod schema;

pub use resolve::ResolveError;

pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(thiserror::Error, Debug)]
#[error("Database error.")]
pub struct DatabaseError {
    #[from]
    source: diesel::r2d2::PoolError,
}

pub struct PostgresRepository {
    pool: Pool<ConnectionManager<PgConnection>>,
    migrations_dir: String,
}

impl PostgresRepository {
    pub fn new(database_url: &str, migrations_dir: &str) -> Result<Self> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::new(manager).context("could not create connection pool")?;

        let repository = Self {
            pool,
            migrations_dir: migrations_dir.to_string(),
        };
        // fail fast on a bad migrations path
        repository.migration_source()?;

        Ok(repository)
    }

    /// Checks out one pooled connection. The connection returns to the pool
    /// when the guard is dropped.
    pub fn conn(&self) -> Result<PgPooledConnection, DatabaseError> {
        Ok(self.pool.get()?)
    }

    pub fn any_pending_migrations(&self) -> Result<bool> {
        let mut conn = self.pool.get()?;
        conn.has_pending_migration(self.migration_source()?)
            .map_err(|e| anyhow!("failed checking pending migrations: {e}"))
    }

    pub fn run_pending_migrations(&self) -> Result<()> {
        let mut conn = self.pool.get()?;
        conn.run_pending_migrations(self.migration_source()?)
            .map_err(|e| anyhow!("failed running pending migrations: {e}"))?;
        Ok(())
    }

    fn migration_source(&self) -> Result<FileBasedMigrations> {
        FileBasedMigrations::from_path(&self.migrations_dir).map_err(|e| {
            anyhow!(
                "invalid migrations directory {}: {e}",
                self.migrations_dir
            )
        })
    }
}
