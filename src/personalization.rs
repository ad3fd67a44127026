use crate::automation_client::AutomationClient;
use crate::cache::{CacheKey, ResponseCache};
use crate::errors::AppError;
use crate::models::PersonalizationRequest;
use serde_json::{json, Value};
use std::time::Duration;

impl From<&PersonalizationRequest> for CacheKey {
    fn from(request: &PersonalizationRequest) -> Self {
        CacheKey::new(
            &request.subject_id,
            &request.template_id,
            &request.strategy,
            request.variant.as_deref(),
            request.sequence_id.as_deref(),
            request.step_index,
        )
    }
}

/// Personalizes an email through the automation engine, serving a cached
/// response when one younger than `ttl` exists for the same key.
///
/// Returns the engine payload with a `cached` flag. Upstream failures are
/// returned unchanged and leave the cache untouched.
pub async fn personalize(
    cache: &ResponseCache,
    client: &AutomationClient,
    request: &PersonalizationRequest,
    ttl: Duration,
) -> Result<Value, AppError> {
    for (field, value) in [
        ("subjectId", &request.subject_id),
        ("templateId", &request.template_id),
        ("strategy", &request.strategy),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::BadRequest(format!("{} is required", field)));
        }
    }

    let lookup = cache
        .get_or_compute(CacheKey::from(request), ttl, || {
            client.personalize_email(request)
        })
        .await?;

    if lookup.cached {
        tracing::info!(
            "Serving cached personalization for subject {}",
            request.subject_id
        );
    }

    Ok(with_cached_flag(lookup.value, lookup.cached))
}

/// Adds `cached` to an object payload, or wraps any other payload.
fn with_cached_flag(payload: Value, cached: bool) -> Value {
    match payload {
        Value::Object(mut map) => {
            map.insert("cached".to_string(), Value::Bool(cached));
            Value::Object(map)
        }
        other => json!({ "data": other, "cached": cached }),
    }
}
