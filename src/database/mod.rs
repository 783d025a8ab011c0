pub mod records;

pub use records::*;

use std::str::FromStr;

use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::error::AppError;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[instrument]
pub async fn connect(database_url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new().connect_with(options).await?;

    info!("Running database migrations...");
    MIGRATOR.run(&pool).await?;
    info!("Migrations completed successfully");

    Ok(pool)
}
