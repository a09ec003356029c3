//! Environmental data acquisition: live weather when configured, static
//! per-city lookup otherwise. No failure escapes this module.

use crate::cache_validator::ValidatedCacheEntry;
use crate::handlers::AppState;
use crate::models::{LocationProfile, SolarConditions};

/// Fallback metrics when even the static table has nothing better.
/// Lagos reference values.
pub fn default_conditions() -> SolarConditions {
    SolarConditions {
        average_sunlight_hours: 6.5,
        cloud_cover: 40.0,
        humidity: 80.0,
        temperature: None,
    }
}

/// Latitude-based approximation of average daily sunlight hours.
///
/// Anchored at 6.5h around latitude 9 and clamped to [5.0, 8.0], which
/// covers the service's Nigerian deployment envelope.
pub fn sunlight_hours_for_latitude(lat: f64) -> f64 {
    (6.5 + (lat - 9.0) * 0.1).clamp(5.0, 8.0)
}

/// Static solar conditions for major Nigerian cities. Unmatched cities get
/// the Lagos reference entry.
pub fn static_conditions_for_city(city: &str) -> SolarConditions {
    let (sunlight, cloud, humidity) = match city.trim().to_lowercase().as_str() {
        "lagos" => (6.5, 40.0, 80.0),
        "abuja" => (7.0, 30.0, 60.0),
        "kano" => (8.0, 15.0, 35.0),
        "port harcourt" => (5.5, 55.0, 85.0),
        "ibadan" => (6.5, 40.0, 75.0),
        "kaduna" => (7.5, 20.0, 45.0),
        "enugu" => (6.0, 45.0, 75.0),
        "benin city" => (5.8, 50.0, 82.0),
        "maiduguri" => (8.0, 10.0, 30.0),
        "jos" => (7.2, 25.0, 50.0),
        _ => return default_conditions(),
    };
    SolarConditions {
        average_sunlight_hours: sunlight,
        cloud_cover: cloud,
        humidity,
        temperature: None,
    }
}

/// Returns solar conditions for the resolved location.
///
/// Priority: live weather API (key configured and coordinates present),
/// then the static city table. Live cloud cover, humidity and temperature
/// are combined with the latitude sunlight approximation. Upstream failures
/// degrade silently to the static path.
pub async fn get_solar_conditions(state: &AppState, location: &LocationProfile) -> SolarConditions {
    if let (Some(weather), Some(lat), Some(lon)) = (&state.weather, location.lat, location.lon) {
        let cache_key = format!("wx:{:.2}:{:.2}", lat, lon);

        if let Some(cached) = state.weather_cache.get(&cache_key).await {
            if let Some(valid) = ValidatedCacheEntry::deserialize_and_validate(&cached) {
                if let Ok(conditions) = serde_json::from_str::<SolarConditions>(&valid) {
                    tracing::debug!("Weather cache HIT for {}", cache_key);
                    return conditions;
                }
            } else {
                tracing::warn!("Weather cache entry failed validation, refetching");
            }
        }

        match weather.current(lat, lon).await {
            Ok(current) => {
                let conditions = SolarConditions {
                    average_sunlight_hours: sunlight_hours_for_latitude(lat),
                    cloud_cover: current.clouds.all,
                    humidity: current.main.humidity,
                    temperature: Some(current.main.temp),
                };

                if let Ok(json_str) = serde_json::to_string(&conditions) {
                    let entry = ValidatedCacheEntry::new(json_str);
                    state.weather_cache.insert(cache_key, entry.serialize()).await;
                }

                return conditions;
            }
            Err(e) => {
                tracing::warn!(
                    "Live weather lookup failed for {}, falling back to static table: {}",
                    location.city,
                    e
                );
            }
        }
    }

    static_conditions_for_city(&location.city)
}
