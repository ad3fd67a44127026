use serde::Deserialize;
use std::time::Duration;

/// Default timeout for automation engine calls.
pub const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 10;
/// Default freshness window of cached personalization responses.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Base URL of the n8n instance; webhook paths are appended to it.
    pub n8n_webhook_url: String,
    pub n8n_api_key: Option<String>,
    pub webhook_timeout_secs: u64,
    pub personalization_cache_ttl_secs: u64,
    pub personalization_cache_capacity: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            n8n_webhook_url: std::env::var("N8N_WEBHOOK_URL")
                .map_err(|_| anyhow::anyhow!("N8N_WEBHOOK_URL environment variable required"))
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("N8N_WEBHOOK_URL cannot be empty");
                    }
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("N8N_WEBHOOK_URL must start with http:// or https://");
                    }
                    Ok(url.trim_end_matches('/').to_string())
                })?,
            n8n_api_key: std::env::var("N8N_API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            webhook_timeout_secs: parse_positive("WEBHOOK_TIMEOUT_SECS", DEFAULT_WEBHOOK_TIMEOUT_SECS)?,
            personalization_cache_ttl_secs: parse_positive(
                "PERSONALIZATION_CACHE_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
            )?,
            personalization_cache_capacity: parse_positive(
                "PERSONALIZATION_CACHE_CAPACITY",
                DEFAULT_CACHE_CAPACITY,
            )?,
        };

        // Never log the API key
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("n8n webhook URL: {}", config.n8n_webhook_url);
        if config.n8n_api_key.is_none() {
            tracing::warn!("N8N_API_KEY not set - webhook calls will be unauthenticated");
        }
        tracing::debug!(
            "Webhook timeout: {}s, personalization cache: {}s TTL / {} entries",
            config.webhook_timeout_secs,
            config.personalization_cache_ttl_secs,
            config.personalization_cache_capacity
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }

    pub fn personalization_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.personalization_cache_ttl_secs)
    }
}

/// Reads an optional positive integer, falling back to `default` when unset.
fn parse_positive(name: &str, default: u64) -> anyhow::Result<u64> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(default);
    };

    match raw.trim().parse::<u64>() {
        Ok(0) => anyhow::bail!("{} must be greater than zero", name),
        Ok(value) => Ok(value),
        Err(_) => anyhow::bail!("{} must be a positive integer, got '{}'", name, raw),
    }
}
