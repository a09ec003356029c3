//! Location resolution with multi-level fallback.
//!
//! Resolution order, first satisfied source wins:
//! 1. Explicit location in the request body (trusted, enriched but never
//!    overridden)
//! 2. The authenticated user's stored address, when it has coordinates
//! 3. IP-based geolocation (loopback short-circuits to the default city)
//! 4. Hardcoded default location
//!
//! Address enrichment never fails a request: reverse-geocode failures
//! degrade to a synthesized city-level address.

use crate::handlers::AppState;
use crate::models::{
    AddressAccuracy, AddressSource, LocationProfile, RequestLocation, StoredAddress,
};
use crate::services::{IpLocation, ReverseGeocodeResult};
use std::net::IpAddr;
use uuid::Uuid;

pub const DEFAULT_COUNTRY: &str = "Nigeria";
pub const DEFAULT_REGION: &str = "Lagos";
pub const DEFAULT_CITY: &str = "Lagos";
pub const DEFAULT_LAT: f64 = 6.5244;
pub const DEFAULT_LON: f64 = 3.3792;
pub const DEFAULT_TIMEZONE: &str = "Africa/Lagos";

/// The hardcoded fallback location (Lagos).
pub fn default_location() -> LocationProfile {
    LocationProfile {
        country: DEFAULT_COUNTRY.to_string(),
        region: DEFAULT_REGION.to_string(),
        city: DEFAULT_CITY.to_string(),
        lat: Some(DEFAULT_LAT),
        lon: Some(DEFAULT_LON),
        timezone: DEFAULT_TIMEZONE.to_string(),
        full_address: None,
        address_components: None,
        address_source: AddressSource::Estimated,
        address_accuracy: AddressAccuracy::CityLevel,
    }
}

/// Resolves the requester's location. Infallible: every failure path
/// degrades to the next source and ultimately to the default location.
pub async fn resolve_location(
    state: &AppState,
    body_location: Option<&RequestLocation>,
    user_id: Option<Uuid>,
    peer_ip: Option<IpAddr>,
) -> LocationProfile {
    // 1. Caller-supplied location wins outright
    if let Some(requested) = body_location {
        if requested.city.is_some() || (requested.lat.is_some() && requested.lon.is_some()) {
            tracing::debug!("Location resolved from request body");
            return profile_from_request(requested);
        }
    }

    // 2. Stored user address with coordinates, used verbatim
    if let Some(uid) = user_id {
        match load_stored_address(state, uid).await {
            Ok(Some(profile)) => {
                tracing::debug!("Location resolved from stored address for user {}", uid);
                return profile;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Stored address lookup failed for user {}: {}", uid, e);
            }
        }
    }

    // 3. IP-derived geolocation; loopback/private addresses short-circuit
    if let Some(ip) = peer_ip {
        if !is_local_address(&ip) {
            if let Some(profile) = resolve_from_ip(state, &ip).await {
                return profile;
            }
        } else {
            tracing::debug!("Loopback/private peer {}, using default location", ip);
        }
    }

    // 4. Hardcoded default
    default_location()
}

fn profile_from_request(requested: &RequestLocation) -> LocationProfile {
    LocationProfile {
        country: requested
            .country
            .clone()
            .unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
        region: requested
            .region
            .clone()
            .or_else(|| requested.city.clone())
            .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        city: requested
            .city
            .clone()
            .unwrap_or_else(|| DEFAULT_CITY.to_string()),
        lat: requested.lat,
        lon: requested.lon,
        timezone: requested
            .timezone
            .clone()
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
        full_address: None,
        address_components: None,
        address_source: AddressSource::Estimated,
        address_accuracy: AddressAccuracy::Approximate,
    }
}

fn is_local_address(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_unspecified(),
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

async fn load_stored_address(
    state: &AppState,
    user_id: Uuid,
) -> Result<Option<LocationProfile>, crate::errors::AppError> {
    let row: Option<(Option<serde_json::Value>,)> =
        sqlx::query_as("SELECT stored_address FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&state.db)
            .await?;

    let Some((Some(raw),)) = row else {
        return Ok(None);
    };

    let address: StoredAddress = match serde_json::from_value(raw) {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!("Stored address for user {} is malformed: {}", user_id, e);
            return Ok(None);
        }
    };

    // Only usable when it carries coordinates
    let (Some(lat), Some(lon)) = (address.lat, address.lon) else {
        return Ok(None);
    };

    let full_address = address.display_line();
    Ok(Some(LocationProfile {
        country: address
            .country
            .clone()
            .unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
        region: address
            .state
            .clone()
            .unwrap_or_else(|| address.city.clone()),
        city: address.city.clone(),
        lat: Some(lat),
        lon: Some(lon),
        timezone: DEFAULT_TIMEZONE.to_string(),
        full_address: Some(full_address),
        address_components: serde_json::to_value(&address).ok(),
        address_source: AddressSource::UserStored,
        address_accuracy: AddressAccuracy::Exact,
    }))
}

async fn resolve_from_ip(state: &AppState, ip: &IpAddr) -> Option<LocationProfile> {
    let key = ip.to_string();

    let location: IpLocation = if let Some(cached) = state.ip_location_cache.get(&key).await {
        match serde_json::from_str(&cached) {
            Ok(loc) => {
                tracing::debug!("IP location cache HIT for {}", key);
                loc
            }
            Err(_) => return None,
        }
    } else {
        match state.ip_lookup.lookup(&key).await {
            Ok(loc) => {
                if let Ok(json_str) = serde_json::to_string(&loc) {
                    state.ip_location_cache.insert(key.clone(), json_str).await;
                }
                loc
            }
            Err(e) => {
                tracing::warn!("IP geolocation failed for {}: {}", key, e);
                return None;
            }
        }
    };

    let city = location.city?;
    Some(LocationProfile {
        country: location
            .country
            .unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
        region: location.region_name.unwrap_or_else(|| city.clone()),
        city,
        lat: location.lat,
        lon: location.lon,
        timezone: location
            .timezone
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
        full_address: None,
        address_components: None,
        address_source: AddressSource::Ip,
        address_accuracy: AddressAccuracy::CityLevel,
    })
}

/// Enriches a resolved location with a human-readable address.
///
/// Locations already carrying a full address (stored user addresses) pass
/// through untouched. Reverse geocoding goes through the 24h cache; on any
/// failure the address is synthesized from known fields at city-level
/// accuracy. This function must never fail the request.
pub async fn enrich_address(state: &AppState, mut profile: LocationProfile) -> LocationProfile {
    if profile.full_address.is_some() {
        return profile;
    }

    if let (Some(lat), Some(lon)) = (profile.lat, profile.lon) {
        match reverse_geocode_cached(state, lat, lon).await {
            Some(result) => {
                profile.full_address = Some(result.display_name);
                profile.address_components = result.address;
                profile.address_source = AddressSource::Nominatim;
                profile.address_accuracy = AddressAccuracy::Approximate;
                return profile;
            }
            None => {
                tracing::warn!(
                    "Reverse geocoding unavailable for ({}, {}), synthesizing address",
                    lat,
                    lon
                );
            }
        }
    }

    profile.full_address = Some(synthesize_address(&profile));
    profile.address_source = AddressSource::Estimated;
    profile.address_accuracy = AddressAccuracy::CityLevel;
    profile
}

async fn reverse_geocode_cached(
    state: &AppState,
    lat: f64,
    lon: f64,
) -> Option<ReverseGeocodeResult> {
    let cache_key = format!("rev:{:.4}:{:.4}", lat, lon);

    if let Some(cached) = state.reverse_geocode_cache.get(&cache_key).await {
        if let Ok(result) = serde_json::from_str::<ReverseGeocodeResult>(&cached) {
            tracing::debug!("Reverse geocode cache HIT for {}", cache_key);
            return Some(result);
        }
    }

    match state.geocoder.reverse(lat, lon).await {
        Ok(result) => {
            if let Ok(json_str) = serde_json::to_string(&result) {
                state
                    .reverse_geocode_cache
                    .insert(cache_key, json_str)
                    .await;
            }
            Some(result)
        }
        Err(e) => {
            tracing::warn!("Reverse geocoding failed: {}", e);
            None
        }
    }
}

/// Builds an approximate address by concatenating known fields.
pub fn synthesize_address(profile: &LocationProfile) -> String {
    let district = profile
        .address_components
        .as_ref()
        .and_then(|c| c.get("district"))
        .and_then(|d| d.as_str())
        .map(String::from);

    let mut parts: Vec<String> = Vec::new();
    if let Some(d) = district {
        parts.push(d);
    }
    parts.push(profile.city.clone());
    if profile.region != profile.city {
        parts.push(profile.region.clone());
    }
    parts.push(profile.country.clone());
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_location_is_lagos() {
        let loc = default_location();
        assert_eq!(loc.city, "Lagos");
        assert_eq!(loc.lat, Some(6.5244));
        assert_eq!(loc.lon, Some(3.3792));
        assert_eq!(loc.timezone, "Africa/Lagos");
    }

    #[test]
    fn loopback_and_private_addresses_are_local() {
        assert!(is_local_address(&"127.0.0.1".parse().unwrap()));
        assert!(is_local_address(&"::1".parse().unwrap()));
        assert!(is_local_address(&"192.168.1.10".parse().unwrap()));
        assert!(is_local_address(&"10.0.0.1".parse().unwrap()));
        assert!(!is_local_address(&"102.89.23.4".parse().unwrap()));
    }

    #[test]
    fn body_location_is_trusted() {
        let requested = RequestLocation {
            city: Some("Abuja".to_string()),
            region: None,
            country: None,
            lat: Some(9.0765),
            lon: Some(7.3986),
            timezone: None,
        };
        let profile = profile_from_request(&requested);
        assert_eq!(profile.city, "Abuja");
        assert_eq!(profile.country, "Nigeria");
        assert_eq!(profile.region, "Abuja");
        assert_eq!(profile.lat, Some(9.0765));
    }

    #[test]
    fn synthesized_address_concatenates_known_fields() {
        let profile = default_location();
        assert_eq!(synthesize_address(&profile), "Lagos, Nigeria");

        let mut abuja = default_location();
        abuja.city = "Garki".to_string();
        abuja.region = "FCT".to_string();
        assert_eq!(synthesize_address(&abuja), "Garki, FCT, Nigeria");
    }
}
