use std::path::{Path, PathBuf};

use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Migrations compiled into the binary.
pub static EMBEDDED: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug)]
pub enum MigrateError {
    Connect(sqlx::Error),
    Load(PathBuf, sqlx::migrate::MigrateError),
    Apply(sqlx::migrate::MigrateError),
}

impl std::fmt::Display for MigrateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrateError::Connect(err) => write!(f, "Failed to connect to database: {err}"),
            MigrateError::Load(dir, err) => {
                write!(f, "Failed to load migrations from {}: {err}", dir.display())
            }
            MigrateError::Apply(err) => write!(f, "Failed to run migrations: {err}"),
        }
    }
}

impl std::error::Error for MigrateError {}

/// Connect, apply every pending migration, then close the connection.
///
/// Migrations come from `dir` when given, otherwise from the embedded set.
/// Already applied versions are skipped, so running this twice is a no-op.
pub async fn run(database_url: &str, dir: Option<&Path>) -> Result<(), MigrateError> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(database_url)
        .await
        .map_err(MigrateError::Connect)?;

    let result = apply(&pool, dir).await;

    pool.close().await;
    result
}

/// Apply pending migrations on an existing pool.
pub async fn apply(pool: &PgPool, dir: Option<&Path>) -> Result<(), MigrateError> {
    match dir {
        Some(dir) => {
            let migrator = Migrator::new(dir)
                .await
                .map_err(|e| MigrateError::Load(dir.to_path_buf(), e))?;
            tracing::info!(
                "Applying migrations from {} ({} known)",
                dir.display(),
                migrator.iter().count()
            );
            migrator.run(pool).await.map_err(MigrateError::Apply)?;
        }
        None => {
            tracing::info!("Applying embedded migrations ({} known)", EMBEDDED.iter().count());
            EMBEDDED.run(pool).await.map_err(MigrateError::Apply)?;
        }
    }

    tracing::info!("Migrations applied");
    Ok(())
}
