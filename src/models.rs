use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ============ Request payloads ============

/// One caller-submitted appliance. Immutable once submitted; supplied
/// wholly by the caller per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplianceEntry {
    pub name_of_item: String,
    pub quantity: u32,
    pub wattage: f64,
    pub day_hours: f64,
    pub night_hours: f64,
}

/// Optional location override in the request body. Trusted as-is and
/// enriched, never overridden.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RequestLocation {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationRequest {
    pub items: Vec<ApplianceEntry>,
    pub location: Option<RequestLocation>,
}

// ============ Location ============

/// Where the resolved address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressSource {
    UserStored,
    Nominatim,
    Estimated,
    Ip,
}

/// How precise the resolved address is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressAccuracy {
    #[serde(rename = "exact")]
    Exact,
    #[serde(rename = "approximate")]
    Approximate,
    #[serde(rename = "city-level")]
    CityLevel,
}

/// Geographic context built once per request. Never persisted on its own;
/// embedded into history records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationProfile {
    pub country: String,
    pub region: String,
    pub city: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub timezone: String,
    pub full_address: Option<String>,
    pub address_components: Option<Value>,
    pub address_source: AddressSource,
    pub address_accuracy: AddressAccuracy,
}

// ============ Environment ============

/// Solar-relevant weather metrics, derived per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolarConditions {
    pub average_sunlight_hours: f64,
    pub cloud_cover: f64,
    pub humidity: f64,
    pub temperature: Option<f64>,
}

// ============ Load ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsagePattern {
    #[serde(rename = "Day-heavy")]
    DayHeavy,
    #[serde(rename = "Night-heavy")]
    NightHeavy,
    #[serde(rename = "Balanced")]
    Balanced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageBreakdown {
    pub pattern: UsagePattern,
    pub day_usage_pct: f64,
    pub night_usage_pct: f64,
}

/// Aggregated load derived from the appliance list.
///
/// Invariant: `daily_consumption_kwh = total_wattage *
/// (total_day_hours + total_night_hours) / 1000`, rounded to 2 decimals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerProfile {
    pub total_wattage: f64,
    pub total_day_hours: f64,
    pub total_night_hours: f64,
    pub daily_consumption_kwh: f64,
    pub usage: UsageBreakdown,
}

// ============ Recommendation (AI output) ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    pub quantity: u32,
    #[serde(default)]
    pub warranty: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    pub inverter: Component,
    pub battery: Component,
    pub solar_panels: Component,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub subtotal: f64,
    pub vat: f64,
    pub total_amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "NGN".to_string()
}

/// A single "optimal" system recommendation parsed from the AI output.
/// Created transiently per request; either accepted (attached to the
/// response, optionally persisted) or discarded, never repaired.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub system_name: String,
    pub components: Components,
    pub pricing: Pricing,
    #[serde(default)]
    pub performance: Option<Value>,
    #[serde(default)]
    pub suitability: Option<Value>,
}

// ============ History ============

/// Append-only record of one recommendation request, owned by exactly one
/// user, stored in a bounded log (max 10, FIFO eviction).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub request_id: Uuid,
    pub total_wattage: f64,
    pub daily_consumption: f64,
    pub appliances: Value,
    pub location: Value,
    pub solar_conditions: Value,
    pub recommended_system: Value,
    pub ai_model: String,
    pub processing_time_ms: i64,
    pub price_per_watt: f64,
    pub requested_at: DateTime<Utc>,
}

// ============ User profile ============

/// The authenticated caller, resolved from a bearer token by the auth
/// collaborator. Anonymous requests carry no identity.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user_id: Uuid,
}

/// Address persisted to the user profile via PUT /user/address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAddress {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAddressRequest {
    pub address: StoredAddress,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl StoredAddress {
    /// Single-line rendering used for forward geocoding and as the stored
    /// full address.
    pub fn display_line(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(ref s) = self.street {
            parts.push(s);
        }
        if let Some(ref d) = self.district {
            parts.push(d);
        }
        parts.push(&self.city);
        if let Some(ref st) = self.state {
            parts.push(st);
        }
        if let Some(ref c) = self.country {
            parts.push(c);
        }
        parts.join(", ")
    }
}

// ============ Response envelopes ============

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerRequirements {
    pub total_wattage: f64,
    pub total_day_hours: f64,
    pub total_night_hours: f64,
    /// Human-readable rendering, e.g. "3.60 kWh".
    pub daily_consumption: String,
    pub daily_consumption_kwh: f64,
    pub usage_pattern: UsageBreakdown,
}

impl From<&PowerProfile> for PowerRequirements {
    fn from(p: &PowerProfile) -> Self {
        Self {
            total_wattage: p.total_wattage,
            total_day_hours: p.total_day_hours,
            total_night_hours: p.total_night_hours,
            daily_consumption: format!("{:.2} kWh", p.daily_consumption_kwh),
            daily_consumption_kwh: p.daily_consumption_kwh,
            usage_pattern: p.usage.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub request_id: Uuid,
    pub ai_model: String,
    pub processing_time_ms: i64,
    pub price_per_watt: f64,
    pub solar_conditions: SolarConditions,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse {
    pub success: bool,
    pub customer_info: CustomerInfo,
    pub location_profile: LocationProfile,
    pub power_requirements: PowerRequirements,
    pub recommendation: Recommendation,
    pub metadata: ResponseMetadata,
}
