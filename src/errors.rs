use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// Record store errors.
    DatabaseError(sqlx::Error),
    /// Record not found.
    NotFound(String),
    /// Invalid input.
    BadRequest(String),
    /// Automation engine unreachable, timed out, or returned non-2xx.
    ExternalApiError(String),
    InternalError(String),
    /// Error with a context message prepended.
    WithContext {
        source: Box<AppError>,
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ExternalApiError(msg) => write!(f, "Automation engine error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// HTTP status this error maps to, looking through context wrappers.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ExternalApiError(_) => StatusCode::BAD_GATEWAY,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::WithContext { source, .. } => source.status_code(),
        }
    }

    /// Message safe to return to clients. Internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::DatabaseError(sqlx::Error::RowNotFound) => "Record not found".to_string(),
            AppError::DatabaseError(_) => "Database error".to_string(),
            AppError::NotFound(msg) | AppError::BadRequest(msg) => msg.clone(),
            AppError::ExternalApiError(_) => "External service error".to_string(),
            AppError::InternalError(_) => "Internal server error".to_string(),
            AppError::WithContext { source, .. } => source.public_message(),
        }
    }
}

impl IntoResponse for AppError {
    /// Maps the error to a status code and a `{"error": ...}` JSON body.
    fn into_response(self) -> Response {
        match &self {
            AppError::DatabaseError(e) => tracing::error!("Database error: {:?}", e),
            AppError::ExternalApiError(msg) => tracing::error!("Automation engine error: {}", msg),
            AppError::InternalError(msg) => tracing::error!("Internal error: {}", msg),
            AppError::WithContext { .. } => tracing::error!("Error with context: {}", self),
            AppError::NotFound(_) | AppError::BadRequest(_) => {
                tracing::debug!("Request rejected: {}", self)
            }
        }

        let body = Json(json!({
            "error": self.public_message(),
        }));

        (self.status_code(), body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::ExternalApiError(format!("request timed out: {}", err))
        } else {
            AppError::ExternalApiError(err.to_string())
        }
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Lazy variant of `context`.
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<AppError>,
{
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e.into()),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e.into()),
            context: f(),
        })
    }
}
