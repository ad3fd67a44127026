use crate::models::RecordTable;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// Pool size used by the HTTP service.
pub const SERVICE_MAX_CONNECTIONS: u32 = 10;

/// Connection pool to the record store holding companies and leads.
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to record store: {}", e))?;

        // Both tables must exist before serving traffic
        for table in [RecordTable::Companies, RecordTable::Leads] {
            let sql = format!("SELECT 1 FROM {} LIMIT 1", table.table_name());
            sqlx::query(&sql).execute(&pool).await.map_err(|e| {
                anyhow::anyhow!(
                    "Record store table '{}' unavailable: {}",
                    table.table_name(),
                    e
                )
            })?;
        }

        Ok(Self { pool })
    }
}
