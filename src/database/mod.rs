pub mod feeds;

use anyhow::Result;
use sqlx::PgPool;
use tracing::{info, warn};

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Runs every statement of `schema.sql`. Statements are idempotent, so
/// "already exists" noise is swallowed and anything else only warns.
pub async fn init_database(pool: &PgPool) -> Result<()> {
    info!("Checking database schema...");
    let statements: Vec<&str> = SCHEMA_SQL.split(';').map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
    for stmt in statements {
        if let Err(e) = sqlx::query(stmt).execute(pool).await {
            if !e.to_string().contains("already exists") {
                warn!("Schema warning: {}", e);
            }
        }
    }
    info!("Database schema check complete.");
    Ok(())
}
