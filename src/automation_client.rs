use crate::errors::AppError;
use crate::models::{OAuthConnectRequest, PersonalizationRequest, SendEmailRequest};
use crate::validation::{is_valid_email, normalize_domain};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

const PERSONALIZE_PATH: &str = "webhook/personalize-email";
const SEND_EMAIL_PATH: &str = "webhook/send-email";
const CHECK_DNS_PATH: &str = "webhook/check-dns";
const OAUTH_CONNECT_PATH: &str = "webhook/oauth-connect";

/// Client for the n8n automation engine.
///
/// Every operation is a JSON POST to a webhook path under `base_url`. Calls
/// are never retried; transport errors, timeouts and non-2xx responses all
/// surface as `AppError::ExternalApiError`.
#[derive(Clone)]
pub struct AutomationClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl AutomationClient {
    /// Creates a new `AutomationClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the n8n instance.
    /// * `api_key` - Optional key sent as `X-N8N-API-KEY`.
    /// * `timeout` - Per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create n8n client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Asks the engine to personalize an outreach email.
    pub async fn personalize_email(
        &self,
        request: &PersonalizationRequest,
    ) -> Result<Value, AppError> {
        tracing::info!(
            "Requesting personalization for subject {} (template {}, strategy {})",
            request.subject_id,
            request.template_id,
            request.strategy
        );
        self.post_webhook(PERSONALIZE_PATH, request).await
    }

    /// Hands an email to the engine for delivery.
    ///
    /// The recipient is validated first; an invalid address never leaves
    /// the service.
    pub async fn send_email(&self, request: &SendEmailRequest) -> Result<Value, AppError> {
        if !is_valid_email(&request.to) {
            return Err(AppError::BadRequest(format!(
                "Invalid recipient email: {}",
                request.to
            )));
        }
        if request.subject.trim().is_empty() {
            return Err(AppError::BadRequest("Email subject is required".to_string()));
        }

        tracing::info!("Dispatching email to {}", request.to);
        self.post_webhook(SEND_EMAIL_PATH, request).await
    }

    /// Runs the engine's DNS (SPF/DKIM/DMARC) check for a sending domain.
    pub async fn check_dns(&self, domain: &str) -> Result<Value, AppError> {
        let domain = normalize_domain(domain)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid domain: {}", domain)))?;

        tracing::info!("Checking DNS records for {}", domain);
        self.post_webhook(CHECK_DNS_PATH, &json!({ "domain": domain }))
            .await
    }

    /// Starts a mailbox OAuth flow; the engine returns the authorization URL.
    pub async fn start_oauth(&self, request: &OAuthConnectRequest) -> Result<Value, AppError> {
        if request.provider.trim().is_empty() {
            return Err(AppError::BadRequest("OAuth provider is required".to_string()));
        }

        tracing::info!("Starting OAuth flow for provider {}", request.provider);
        self.post_webhook(OAUTH_CONNECT_PATH, request).await
    }

    async fn post_webhook<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, AppError> {
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!("POST {}", url);

        let mut request = self.client.post(&url).json(body);
        if let Some(ref key) = self.api_key {
            request = request.header("X-N8N-API-KEY", key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::ExternalApiError(format!("n8n request to {} timed out", path))
            } else {
                AppError::ExternalApiError(format!("n8n request to {} failed: {}", path, e))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("n8n webhook {} returned {}: {}", path, status, error_text);
            return Err(AppError::ExternalApiError(format!(
                "n8n webhook {} returned {}: {}",
                path, status, error_text
            )));
        }

        // Some workflows answer with an empty body
        let text = response.text().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to read n8n response: {}", e))
        })?;
        if text.trim().is_empty() {
            return Ok(json!({ "success": true }));
        }

        serde_json::from_str(&text).map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse n8n response: {}", e))
        })
    }
}
