//! Record store adapter for companies and leads.
//!
//! Every write path scores the record before issuing the statement, so the
//! derived ICP columns stored alongside a row always match its inputs.
use crate::errors::AppError;
use crate::models::{ListFilter, NewRecord, QualificationRecord, RecordPatch, RecordTable};
use crate::qualification::{self, QualificationResult};
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const RECORD_COLUMNS: &str = "id, name, domain, location_count, employee_count, revenue_range, \
     industry_type, icp_score, icp_qualified, qualification_reason, created_at, updated_at";

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 500;

/// Outcome of a bulk rescore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RescoreSummary {
    pub scanned: usize,
    pub updated: usize,
}

pub struct QualificationStore {
    pool: PgPool,
}

impl QualificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Scores and inserts a new record.
    pub async fn create(
        &self,
        table: RecordTable,
        new_record: NewRecord,
    ) -> Result<QualificationRecord, AppError> {
        let name = new_record.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("name is required".to_string()));
        }

        let input = new_record.qualification;
        let result = qualification::score(&input);

        let sql = format!(
            "INSERT INTO {} (name, domain, location_count, employee_count, revenue_range, \
             industry_type, icp_score, icp_qualified, qualification_reason) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {}",
            table.table_name(),
            RECORD_COLUMNS
        );

        let record = sqlx::query_as::<_, QualificationRecord>(&sql)
            .bind(&name)
            .bind(&new_record.domain)
            .bind(input.location_count)
            .bind(input.employee_count)
            .bind(input.revenue_range.map(String::from))
            .bind(input.industry_type.map(String::from))
            .bind(result.total_score)
            .bind(result.is_qualified)
            .bind(result.reason_text())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert into {}: {:?}", table.table_name(), e);
                AppError::DatabaseError(e)
            })?;

        tracing::info!(
            "Created {} record {} with ICP score {} (qualified: {})",
            table.table_name(),
            record.id,
            record.icp_score,
            record.icp_qualified
        );

        Ok(record)
    }

    pub async fn get(
        &self,
        table: RecordTable,
        id: Uuid,
    ) -> Result<Option<QualificationRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1",
            RECORD_COLUMNS,
            table.table_name()
        );

        let record = sqlx::query_as::<_, QualificationRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    /// Merges `patch` into the stored record, rescores it and writes inputs
    /// and derived fields together.
    pub async fn update(
        &self,
        table: RecordTable,
        id: Uuid,
        patch: RecordPatch,
    ) -> Result<QualificationRecord, AppError> {
        if patch
            .name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(AppError::BadRequest("name cannot be empty".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1 FOR UPDATE",
            RECORD_COLUMNS,
            table.table_name()
        );
        let mut record = sqlx::query_as::<_, QualificationRecord>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("{} record {} not found", table.table_name(), id))
            })?;

        patch.apply_to(&mut record);
        qualification::apply_to(&mut record);

        let record = write_record(&mut tx, table, &record).await?;
        tx.commit().await?;

        tracing::info!(
            "Updated {} record {}: ICP score {} (qualified: {})",
            table.table_name(),
            record.id,
            record.icp_score,
            record.icp_qualified
        );

        Ok(record)
    }

    /// Recomputes the derived fields of one record from its stored inputs.
    pub async fn requalify(
        &self,
        table: RecordTable,
        id: Uuid,
    ) -> Result<(QualificationRecord, QualificationResult), AppError> {
        let mut record = self.get(table, id).await?.ok_or_else(|| {
            AppError::NotFound(format!("{} record {} not found", table.table_name(), id))
        })?;

        let result = qualification::apply_to(&mut record);

        let mut tx = self.pool.begin().await?;
        let record = write_record(&mut tx, table, &record).await?;
        tx.commit().await?;

        Ok((record, result))
    }

    /// Lists records matching `filter`, highest score first.
    pub async fn list(
        &self,
        table: RecordTable,
        filter: &ListFilter,
    ) -> Result<Vec<QualificationRecord>, AppError> {
        if let (Some(min), Some(max)) = (filter.min_score, filter.max_score) {
            if min > max {
                return Err(AppError::BadRequest(format!(
                    "min_score ({}) cannot exceed max_score ({})",
                    min, max
                )));
            }
        }

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM {} WHERE TRUE",
            RECORD_COLUMNS,
            table.table_name()
        ));

        if let Some(qualified) = filter.qualified {
            query.push(" AND icp_qualified = ").push_bind(qualified);
        }
        if let Some(min) = filter.min_score {
            query.push(" AND icp_score >= ").push_bind(min);
        }
        if let Some(max) = filter.max_score {
            query.push(" AND icp_score <= ").push_bind(max);
        }

        let (limit, offset) = page_bounds(filter);
        query
            .push(" ORDER BY icp_score DESC, created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let records = query
            .build_query_as::<QualificationRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    /// Rescores every record in `table`, writing only rows whose derived
    /// fields changed.
    pub async fn rescore_all(&self, table: RecordTable) -> Result<RescoreSummary, AppError> {
        let sql = format!("SELECT {} FROM {}", RECORD_COLUMNS, table.table_name());
        let records = sqlx::query_as::<_, QualificationRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;

        let mut summary = RescoreSummary {
            scanned: records.len(),
            updated: 0,
        };

        for mut record in records {
            let before = (
                record.icp_score,
                record.icp_qualified,
                record.qualification_reason.clone(),
            );
            qualification::apply_to(&mut record);
            if before
                == (
                    record.icp_score,
                    record.icp_qualified,
                    record.qualification_reason.clone(),
                )
            {
                continue;
            }

            let mut tx = self.pool.begin().await?;
            write_record(&mut tx, table, &record).await?;
            tx.commit().await?;
            summary.updated += 1;
        }

        tracing::info!(
            "Rescored {}: {} scanned, {} updated",
            table.table_name(),
            summary.scanned,
            summary.updated
        );

        Ok(summary)
    }
}

/// Writes all input and derived columns of `record`.
async fn write_record(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    table: RecordTable,
    record: &QualificationRecord,
) -> Result<QualificationRecord, AppError> {
    let sql = format!(
        "UPDATE {} SET name = $2, domain = $3, location_count = $4, employee_count = $5, \
         revenue_range = $6, industry_type = $7, icp_score = $8, icp_qualified = $9, \
         qualification_reason = $10, updated_at = $11 \
         WHERE id = $1 \
         RETURNING {}",
        table.table_name(),
        RECORD_COLUMNS
    );

    let updated = sqlx::query_as::<_, QualificationRecord>(&sql)
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.domain)
        .bind(record.location_count)
        .bind(record.employee_count)
        .bind(&record.revenue_range)
        .bind(&record.industry_type)
        .bind(record.icp_score)
        .bind(record.icp_qualified)
        .bind(&record.qualification_reason)
        .bind(Utc::now())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            tracing::error!(
                "Failed to write {} record {}: {:?}",
                table.table_name(),
                record.id,
                e
            );
            AppError::DatabaseError(e)
        })?;

    Ok(updated)
}

/// Clamped `(limit, offset)` for a list query.
fn page_bounds(filter: &ListFilter) -> (i64, i64) {
    let limit = filter
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = filter.offset.unwrap_or(0).max(0);
    (limit, offset)
}
