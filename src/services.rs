use crate::config::Config;
use crate::errors::AppError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Client for the Nominatim geocoding service (reverse and forward).
#[derive(Clone)]
pub struct GeocodingService {
    client: Client,
    base_url: String,
}

/// Reverse-geocode result: a display line plus the raw component map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverseGeocodeResult {
    pub display_name: String,
    #[serde(default)]
    pub address: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct ForwardGeocodeRow {
    lat: String,
    lon: String,
    #[allow(dead_code)]
    display_name: String,
}

impl GeocodingService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            // Nominatim usage policy requires an identifying agent
            .user_agent("solar-advisor-api/0.1")
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create geocoding client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.nominatim_base_url.clone(),
        })
    }

    /// Reverse-geocodes coordinates into a human-readable address.
    pub async fn reverse(&self, lat: f64, lon: f64) -> Result<ReverseGeocodeResult, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/reverse", self.base_url),
            &[
                ("format", "jsonv2"),
                ("lat", &lat.to_string()),
                ("lon", &lon.to_string()),
            ],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        tracing::debug!("Reverse geocoding ({}, {})", lat, lon);

        let response = self.client.get(url).send().await.map_err(|e| {
            AppError::ExternalApiError(format!("Nominatim request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::ExternalApiError(format!(
                "Nominatim returned status {}",
                status
            )));
        }

        let result: ReverseGeocodeResult = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Nominatim response: {}", e))
        })?;

        Ok(result)
    }

    /// Forward-geocodes an address line into coordinates.
    pub async fn forward(&self, query: &str) -> Result<Option<(f64, f64)>, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/search", self.base_url),
            &[("format", "jsonv2"), ("q", query), ("limit", "1")],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        tracing::debug!("Forward geocoding '{}'", query);

        let response = self.client.get(url).send().await.map_err(|e| {
            AppError::ExternalApiError(format!("Nominatim request failed: {}", e))
        })?;

        if !response.status().is_success() {
            tracing::warn!(
                "Nominatim search returned non-success status for '{}'",
                query
            );
            return Ok(None);
        }

        let rows: Vec<ForwardGeocodeRow> = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Nominatim response: {}", e))
        })?;

        let coords = rows.first().and_then(|row| {
            let lat = row.lat.parse::<f64>().ok()?;
            let lon = row.lon.parse::<f64>().ok()?;
            Some((lat, lon))
        });

        Ok(coords)
    }
}

/// Client for IP-based geolocation (ip-api.com shape).
#[derive(Clone)]
pub struct IpLookupService {
    client: Client,
    base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpLocation {
    pub status: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(rename = "regionName", default)]
    pub region_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl IpLookupService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create IP lookup client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.ip_api_base_url.clone(),
        })
    }

    /// Looks up the geographic location of a public IP address.
    pub async fn lookup(&self, ip: &str) -> Result<IpLocation, AppError> {
        let url = format!(
            "{}/json/{}?fields=status,country,regionName,city,lat,lon,timezone",
            self.base_url, ip
        );

        tracing::debug!("IP geolocation lookup for {}", ip);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("IP lookup failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::ExternalApiError(format!(
                "IP lookup returned status {}",
                status
            )));
        }

        let location: IpLocation = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse IP lookup response: {}", e))
        })?;

        if location.status != "success" {
            return Err(AppError::ExternalApiError(format!(
                "IP lookup failed for {}: status '{}'",
                ip, location.status
            )));
        }

        Ok(location)
    }
}

/// Client for the OpenWeather current-conditions API.
#[derive(Clone)]
pub struct WeatherService {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub clouds: CloudInfo,
    pub main: MainWeather,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudInfo {
    /// Cloud cover percentage.
    pub all: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainWeather {
    pub humidity: f64,
    pub temp: f64,
}

impl WeatherService {
    pub fn new(config: &Config, api_key: String) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create weather client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.openweather_base_url.clone(),
            api_key,
        })
    }

    /// Fetches current weather for the given coordinates (metric units).
    pub async fn current(&self, lat: f64, lon: f64) -> Result<CurrentWeather, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/data/2.5/weather", self.base_url),
            &[
                ("lat", lat.to_string().as_str()),
                ("lon", lon.to_string().as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        tracing::debug!("Fetching current weather for ({}, {})", lat, lon);

        let response = self.client.get(url).send().await.map_err(|e| {
            AppError::ExternalApiError(format!("Weather request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Weather API returned status {}: {}",
                status, error_text
            )));
        }

        let weather: CurrentWeather = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse weather response: {}", e))
        })?;

        Ok(weather)
    }
}
