//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! qmart-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string for the
//!   storefront (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Storefront migrations: `crates/storefront/migrations/`

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

fn database_url() -> Result<SecretString, MigrationError> {
    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MigrationError::MissingEnvVar("STOREFRONT_DATABASE_URL"))
}

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the URL is missing, the database is
/// unreachable, or a migration fails.
pub async fn storefront() -> Result<(), MigrationError> {
    let _ = dotenvy::dotenv();
    let database_url = database_url()?;

    tracing::info!("Connecting to storefront database...");
    let pool = qmart_storefront::db::create_pool(&database_url).await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Storefront migrations complete");
    Ok(())
}
