//! Recomputes ICP fields for every company and lead.
//!
//! Run after changing the scoring table so stored scores match the current rules.

use rust_crm_api::db::Database;
use rust_crm_api::models::RecordTable;
use rust_crm_api::store::QualificationStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();

    let database_url = std::env::var("DATABASE_URL")
        .or_else(|_| std::env::var("DB_URL"))
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let db = Database::connect(&database_url, 5).await?;
    let store = QualificationStore::new(db.pool.clone());

    tracing::info!("Connected to database. Rescoring companies and leads...");

    for table in [RecordTable::Companies, RecordTable::Leads] {
        let summary = store.rescore_all(table).await?;
        tracing::info!(
            "{}: {} records scanned, {} rescored",
            table.table_name(),
            summary.scanned,
            summary.updated
        );
    }

    Ok(())
}
