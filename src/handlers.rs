use crate::automation_client::AutomationClient;
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::models::{
    DnsCheckRequest, ListFilter, NewRecord, OAuthConnectRequest, PersonalizationRequest,
    QualificationInput, QualificationRecord, RecordPatch, RecordTable, SendEmailRequest,
};
use crate::personalization;
use crate::qualification::{self, QualificationResult};
use crate::store::QualificationStore;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Record store connection pool.
    pub db: PgPool,
    pub config: Config,
    /// n8n client for email, DNS and OAuth workflows.
    pub automation: AutomationClient,
    /// Personalization response cache, keyed by subject/template/strategy/variant/sequence/step.
    pub personalization_cache: ResponseCache,
}

/// Routes for one record table. The table is resolved from the
/// `Extension` layered on the nested router.
pub fn record_routes(table: RecordTable) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_records).post(create_record))
        .route("/:id", get(get_record).patch(update_record))
        .route("/:id/qualify", post(qualify_record))
        .layer(Extension(table))
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-crm-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/v1/qualification/score
///
/// Scores a record without persisting anything.
pub async fn score_preview(Json(input): Json<QualificationInput>) -> Json<QualificationResult> {
    tracing::debug!("Scoring preview: {:?}", input);
    Json(qualification::score(&input))
}

/// POST /api/v1/{companies|leads}
pub async fn create_record(
    State(state): State<Arc<AppState>>,
    Extension(table): Extension<RecordTable>,
    Json(new_record): Json<NewRecord>,
) -> Result<(StatusCode, Json<QualificationRecord>), AppError> {
    tracing::info!("POST /{} - {}", table.table_name(), new_record.name);

    let record = QualificationStore::new(state.db.clone())
        .create(table, new_record)
        .await
        .with_context(|| format!("Failed to create {} record", table.table_name()))?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/v1/{companies|leads}
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    Extension(table): Extension<RecordTable>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("GET /{} - filter: {:?}", table.table_name(), filter);

    let records = QualificationStore::new(state.db.clone())
        .list(table, &filter)
        .await?;

    Ok(Json(json!({
        "data": records,
        "count": records.len(),
    })))
}

/// GET /api/v1/{companies|leads}/:id
pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Extension(table): Extension<RecordTable>,
    Path(id): Path<Uuid>,
) -> Result<Json<QualificationRecord>, AppError> {
    tracing::info!("GET /{}/{}", table.table_name(), id);

    let record = QualificationStore::new(state.db.clone())
        .get(table, id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("{} record {} not found", table.table_name(), id))
        })?;

    Ok(Json(record))
}

/// PATCH /api/v1/{companies|leads}/:id
///
/// Any change to the qualification inputs is rescored before the write.
pub async fn update_record(
    State(state): State<Arc<AppState>>,
    Extension(table): Extension<RecordTable>,
    Path(id): Path<Uuid>,
    Json(patch): Json<RecordPatch>,
) -> Result<Json<QualificationRecord>, AppError> {
    tracing::info!("PATCH /{}/{}", table.table_name(), id);

    let record = QualificationStore::new(state.db.clone())
        .update(table, id, patch)
        .await
        .with_context(|| format!("Failed to update {} record {}", table.table_name(), id))?;

    Ok(Json(record))
}

/// POST /api/v1/{companies|leads}/:id/qualify
///
/// Forces a recalculation from the stored inputs.
pub async fn qualify_record(
    State(state): State<Arc<AppState>>,
    Extension(table): Extension<RecordTable>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("POST /{}/{}/qualify", table.table_name(), id);

    let (record, result) = QualificationStore::new(state.db.clone())
        .requalify(table, id)
        .await
        .with_context(|| format!("Failed to requalify {} record {}", table.table_name(), id))?;

    Ok(Json(json!({
        "record": record,
        "qualification": result,
    })))
}

/// POST /api/v1/email/personalize
pub async fn personalize_email(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PersonalizationRequest>,
) -> Result<Json<Value>, AppError> {
    let body = personalization::personalize(
        &state.personalization_cache,
        &state.automation,
        &request,
        state.config.personalization_cache_ttl(),
    )
    .await?;

    Ok(Json(body))
}

/// POST /api/v1/email/send
pub async fn send_email(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendEmailRequest>,
) -> Result<Json<Value>, AppError> {
    let body = state.automation.send_email(&request).await?;
    Ok(Json(body))
}

/// POST /api/v1/domains/check-dns
pub async fn check_dns(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DnsCheckRequest>,
) -> Result<Json<Value>, AppError> {
    let body = state.automation.check_dns(&request.domain).await?;
    Ok(Json(body))
}

/// POST /api/v1/oauth/connect
pub async fn oauth_connect(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OAuthConnectRequest>,
) -> Result<Json<Value>, AppError> {
    let body = state.automation.start_oauth(&request).await?;
    Ok(Json(body))
}
