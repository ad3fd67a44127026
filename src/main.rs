use axum::{
    routing::{get, post},
    Router,
};
use rust_crm_api::automation_client::AutomationClient;
use rust_crm_api::cache::ResponseCache;
use rust_crm_api::config::Config;
use rust_crm_api::db::{Database, SERVICE_MAX_CONNECTIONS};
use rust_crm_api::handlers::{self, AppState};
use rust_crm_api::models::RecordTable;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// Initializes tracing, configuration, the record store pool, the n8n client
/// and the personalization cache, then serves the HTTP routes.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_crm_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db = Database::connect(&config.database_url, SERVICE_MAX_CONNECTIONS).await?;
    tracing::info!("Database connection pool established");

    let automation = AutomationClient::new(
        config.n8n_webhook_url.clone(),
        config.n8n_api_key.clone(),
        config.webhook_timeout(),
    )?;
    tracing::info!(
        "n8n client initialized: {} ({}s timeout)",
        config.n8n_webhook_url,
        config.webhook_timeout_secs
    );

    let personalization_cache = ResponseCache::new(config.personalization_cache_capacity);
    tracing::info!(
        "Personalization cache initialized ({}s TTL, {} capacity)",
        config.personalization_cache_ttl_secs,
        config.personalization_cache_capacity
    );

    let app_state = Arc::new(AppState {
        db: db.pool.clone(),
        config: config.clone(),
        automation,
        personalization_cache,
    });

    // 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let protected_routes = Router::new()
        .route(
            "/api/v1/qualification/score",
            post(handlers::score_preview),
        )
        .nest(
            "/api/v1/companies",
            handlers::record_routes(RecordTable::Companies),
        )
        .nest("/api/v1/leads", handlers::record_routes(RecordTable::Leads))
        .route("/api/v1/email/personalize", post(handlers::personalize_email))
        .route("/api/v1/email/send", post(handlers::send_email))
        .route("/api/v1/domains/check-dns", post(handlers::check_dns))
        .route("/api/v1/oauth/connect", post(handlers::oauth_connect))
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
