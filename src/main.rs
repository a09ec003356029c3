use axum::{
    routing::{get, post, put},
    Router,
};
use moka::future::Cache;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use solar_advisor_api::ai_client::GeminiClient;
use solar_advisor_api::circuit_breaker::create_ai_circuit_breaker;
use solar_advisor_api::config::Config;
use solar_advisor_api::db::Database;
use solar_advisor_api::handlers::{self, AppState};
use solar_advisor_api::services::{GeocodingService, IpLookupService, WeatherService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "solar_advisor_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    // Reverse-geocode cache (24h TTL): coordinates rarely change meaning
    let reverse_geocode_cache = Cache::builder()
        .time_to_live(Duration::from_secs(86_400))
        .max_capacity(50_000)
        .build();
    tracing::info!("Reverse-geocode cache initialized");

    // IP geolocation cache (24h TTL)
    let ip_location_cache = Cache::builder()
        .time_to_live(Duration::from_secs(86_400))
        .max_capacity(50_000)
        .build();
    tracing::info!("IP geolocation cache initialized");

    // Weather cache (1h TTL): conditions drift slowly enough for sizing
    let weather_cache = Cache::builder()
        .time_to_live(Duration::from_secs(3_600))
        .max_capacity(10_000)
        .build();
    tracing::info!("Weather cache initialized (1h TTL)");

    // External clients, constructed once and reused across requests
    let gemini = GeminiClient::new(&config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize Gemini client: {}", e))?;
    tracing::info!("Gemini client initialized: model {}", config.gemini_model);

    let geocoder = GeocodingService::new(&config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize geocoding client: {}", e))?;
    let ip_lookup = IpLookupService::new(&config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize IP lookup client: {}", e))?;

    let weather = match config.openweather_api_key.clone() {
        Some(key) => match WeatherService::new(&config, key) {
            Ok(client) => {
                tracing::info!("✓ Live weather client initialized");
                Some(client)
            }
            Err(e) => {
                tracing::error!("Failed to initialize weather client: {}", e);
                None
            }
        },
        None => None,
    };

    // Build application state
    let app_state = Arc::new(AppState {
        db: db.pool.clone(),
        gemini,
        geocoder,
        ip_lookup,
        weather,
        reverse_geocode_cache,
        ip_location_cache,
        weather_cache,
        ai_breaker: create_ai_circuit_breaker(),
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        .route("/api/v1/recommendations", post(handlers::recommend))
        .route("/api/v1/user/address", put(handlers::put_address))
        .route("/api/v1/user/address", get(handlers::get_address))
        .route("/api/v1/history", get(handlers::get_history))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload (appliance lists are small)
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health check bypasses rate limiting for platform probes
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
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
