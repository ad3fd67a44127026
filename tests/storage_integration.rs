use std::env;

use rust_crm_api::db::Database;
use rust_crm_api::models::{NewRecord, RecordPatch, RecordTable};
use rust_crm_api::store::QualificationStore;

/// Integration smoke test for the qualification store writing derived ICP fields.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
/// Expects the tables from `sql/schema.sql`.
#[tokio::test]
#[ignore]
async fn create_and_update_keep_icp_fields_consistent() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::connect(&db_url, 2)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    let store = QualificationStore::new(db.pool.clone());

    let new_record: NewRecord = serde_json::from_value(serde_json::json!({
        "name": "Smoke Test Restaurant Group",
        "location_count": 1,
        "employee_count": 500,
        "revenue_range": "50M+",
        "industry_type": "restaurant"
    }))?;
    let created = store
        .create(RecordTable::Companies, new_record)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    assert_eq!(created.icp_score, 60);
    assert!(!created.icp_qualified);

    let patch: RecordPatch = serde_json::from_value(serde_json::json!({ "location_count": 30 }))?;
    let updated = store
        .update(RecordTable::Companies, created.id, patch)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    assert_eq!(updated.icp_score, 100);
    assert!(updated.icp_qualified);
    assert_eq!(updated.qualification_reason, None);

    Ok(())
}
