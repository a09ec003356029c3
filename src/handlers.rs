use crate::ai_client::GeminiClient;
use crate::circuit_breaker::AiCircuitBreaker;
use crate::errors::AppError;
use crate::history::HistoryStorage;
use crate::models::*;
use crate::services::{GeocodingService, IpLookupService, WeatherService};
use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use moka::future::Cache;
use serde_json::json;
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
///
/// External-service clients are constructed once at startup and reused
/// across requests; nothing here is mutated after initialization.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Generative-AI client for recommendation generation.
    pub gemini: GeminiClient,
    /// Nominatim client for reverse/forward geocoding.
    pub geocoder: GeocodingService,
    /// IP geolocation client.
    pub ip_lookup: IpLookupService,
    /// Live weather client; None when no API key is configured.
    pub weather: Option<WeatherService>,
    /// Reverse-geocode cache (24h TTL). Key: "rev:{lat}:{lon}".
    pub reverse_geocode_cache: Cache<String, String>,
    /// IP geolocation cache (24h TTL). Key: IP address.
    pub ip_location_cache: Cache<String, String>,
    /// Weather cache (1h TTL), checksummed envelope. Key: "wx:{lat}:{lon}".
    pub weather_cache: Cache<String, String>,
    /// Circuit breaker guarding the AI upstream.
    pub ai_breaker: AiCircuitBreaker,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "solar-advisor-api",
            "version": "0.1.0"
        })),
    )
}

/// Resolves the caller's identity from an optional bearer token.
///
/// No Authorization header means an anonymous request. A present but
/// unknown token is rejected rather than silently downgraded.
pub async fn resolve_identity(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<Identity>, AppError> {
    let Some(value) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Malformed Authorization header".to_string()))?;

    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE api_token = $1")
        .bind(token)
        .fetch_optional(&state.db)
        .await?;

    match row {
        Some((user_id,)) => Ok(Some(Identity { user_id })),
        None => Err(AppError::Unauthorized("Unknown bearer token".to_string())),
    }
}

/// POST /api/v1/recommendations
///
/// The full pipeline: location -> solar conditions -> load -> AI call ->
/// validation -> response assembly, with best-effort history recording in
/// the background for authenticated callers.
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<RecommendationRequest>,
) -> Result<Json<RecommendationResponse>, AppError> {
    let started = std::time::Instant::now();

    let identity = resolve_identity(&state, &headers).await?;
    tracing::info!(
        "POST /recommendations - {} items, authenticated: {}",
        request.items.len(),
        identity.is_some()
    );

    // Load first: cheap, and invalid input should fail before any I/O
    let profile = crate::load::compute_load(&request.items)?;

    let location = crate::location::resolve_location(
        &state,
        request.location.as_ref(),
        identity.map(|i| i.user_id),
        Some(peer.ip()),
    )
    .await;
    let location = crate::location::enrich_address(&state, location).await;

    let conditions = crate::weather::get_solar_conditions(&state, &location).await;

    let recommendation = crate::recommendation::generate_recommendation(
        &state,
        &profile,
        &location,
        &conditions,
        &request.items,
    )
    .await?;

    let report = crate::validator::validate(
        &recommendation,
        profile.total_wattage,
        profile.daily_consumption_kwh,
    );
    if !report.valid {
        return Err(AppError::RecommendationInvalid(report.issues));
    }

    let request_id = Uuid::new_v4();
    let processing_time_ms = started.elapsed().as_millis() as i64;
    let price_per_watt = if profile.total_wattage > 0.0 {
        recommendation.pricing.total_amount / profile.total_wattage
    } else {
        0.0
    };

    // History is auxiliary: recorded in the background, never blocks or
    // fails the response. Anonymous requests are a no-op.
    if let Some(identity) = identity {
        let entry = HistoryEntry {
            request_id,
            total_wattage: profile.total_wattage,
            daily_consumption: profile.daily_consumption_kwh,
            appliances: serde_json::to_value(&request.items).unwrap_or(json!([])),
            location: serde_json::to_value(&location).unwrap_or(json!(null)),
            solar_conditions: serde_json::to_value(&conditions).unwrap_or(json!(null)),
            recommended_system: serde_json::to_value(&recommendation).unwrap_or(json!(null)),
            ai_model: state.gemini.model_name().to_string(),
            processing_time_ms,
            price_per_watt,
            requested_at: Utc::now(),
        };
        let storage = HistoryStorage::new(state.db.clone());
        tokio::spawn(async move {
            storage.record_best_effort(identity.user_id, entry).await;
        });
    }

    let response = RecommendationResponse {
        success: true,
        customer_info: CustomerInfo {
            authenticated: identity.is_some(),
            user_id: identity.map(|i| i.user_id),
        },
        location_profile: location,
        power_requirements: PowerRequirements::from(&profile),
        recommendation,
        metadata: ResponseMetadata {
            request_id,
            ai_model: state.gemini.model_name().to_string(),
            processing_time_ms,
            price_per_watt,
            solar_conditions: conditions,
            timestamp: Utc::now().to_rfc3339(),
        },
    };

    tracing::info!(
        "Recommendation {} generated in {}ms ({:.0} NGN/W)",
        request_id,
        processing_time_ms,
        price_per_watt
    );

    Ok(Json(response))
}

/// PUT /api/v1/user/address
///
/// Persists the caller's address, forward-geocoding when coordinates are
/// absent. Geocoding failure is not fatal: the address is stored without
/// coordinates and the resolver falls back to other sources later.
pub async fn put_address(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<UpdateAddressRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let identity = resolve_identity(&state, &headers)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    let mut address = request.address;
    if address.city.trim().is_empty() {
        return Err(AppError::Validation {
            message: "Address must include a city".to_string(),
            fields: vec!["address.city".to_string()],
        });
    }

    if let Some(coords) = request.coordinates {
        address.lat = Some(coords.lat);
        address.lon = Some(coords.lon);
    } else if address.lat.is_none() || address.lon.is_none() {
        match state.geocoder.forward(&address.display_line()).await {
            Ok(Some((lat, lon))) => {
                address.lat = Some(lat);
                address.lon = Some(lon);
            }
            Ok(None) => {
                tracing::warn!(
                    "Forward geocoding found no match for user {}",
                    identity.user_id
                );
            }
            Err(e) => {
                tracing::warn!("Forward geocoding failed, storing without coordinates: {}", e);
            }
        }
    }

    let stored = serde_json::to_value(&address)
        .map_err(|e| AppError::InternalError(format!("Failed to serialize address: {}", e)))?;

    sqlx::query("UPDATE users SET stored_address = $2, address_updated_at = now() WHERE id = $1")
        .bind(identity.user_id)
        .bind(&stored)
        .execute(&state.db)
        .await?;

    tracing::info!("Stored address updated for user {}", identity.user_id);

    Ok(Json(json!({
        "success": true,
        "address": stored,
        "geocoded": address.lat.is_some() && address.lon.is_some(),
    })))
}

/// GET /api/v1/user/address
pub async fn get_address(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let identity = resolve_identity(&state, &headers)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    let row: Option<(Option<serde_json::Value>,)> =
        sqlx::query_as("SELECT stored_address FROM users WHERE id = $1")
            .bind(identity.user_id)
            .fetch_optional(&state.db)
            .await?;

    match row {
        Some((Some(address),)) => Ok(Json(json!({
            "success": true,
            "hasAddress": true,
            "address": address,
        }))),
        _ => Ok(Json(json!({
            "success": true,
            "hasAddress": false,
        }))),
    }
}

/// GET /api/v1/history
///
/// The caller's bounded recommendation history, newest first.
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let identity = resolve_identity(&state, &headers)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    let storage = HistoryStorage::new(state.db.clone());
    let entries = storage.fetch(identity.user_id).await?;

    Ok(Json(json!({
        "success": true,
        "count": entries.len(),
        "history": entries,
    })))
}
