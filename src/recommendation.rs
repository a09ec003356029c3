//! Recommendation engine: prompt construction, the single AI generation
//! call, and defensive parsing of the model's JSON output.

use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{ApplianceEntry, LocationProfile, PowerProfile, Recommendation, SolarConditions};
use failsafe::futures::CircuitBreaker;

/// Hard caps keeping the generative model's output inside a plausible
/// envelope.
pub const INVERTER_KW_HARD_MAX: f64 = 15.0;
pub const BATTERY_SUGGESTED_MAX: u32 = 16;
pub const BATTERY_HARD_MAX: u32 = 25;
pub const PANEL_SUGGESTED_MAX: u32 = 20;
pub const PANEL_HARD_MAX: u32 = 30;

/// Pre-computed sizing guidance embedded in the prompt so the model prices
/// a system of sane proportions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingGuidance {
    pub inverter_kw: f64,
    pub battery_count: u32,
    pub panel_count: u32,
}

pub fn compute_sizing_guidance(profile: &PowerProfile) -> SizingGuidance {
    let inverter_kw = ((profile.total_wattage * 1.3 / 1000.0).max(1.0) * 10.0).round() / 10.0;
    let battery_count = (profile.daily_consumption_kwh * 1.2 / 3.5).ceil() as u32;
    let panel_count = (profile.daily_consumption_kwh * 1.5 * 1000.0 / 450.0).ceil() as u32;

    SizingGuidance {
        inverter_kw: inverter_kw.min(INVERTER_KW_HARD_MAX),
        battery_count: battery_count.clamp(1, BATTERY_SUGGESTED_MAX),
        panel_count: panel_count.clamp(1, PANEL_SUGGESTED_MAX),
    }
}

/// Builds the generation prompt from load, environment and market guidance.
pub fn build_prompt(
    profile: &PowerProfile,
    location: &LocationProfile,
    conditions: &SolarConditions,
    items: &[ApplianceEntry],
) -> String {
    let guidance = compute_sizing_guidance(profile);

    let mut itemized = String::new();
    for item in items {
        itemized.push_str(&format!(
            "- {} x{} ({}W, {}h day / {}h night)\n",
            item.name_of_item, item.quantity, item.wattage, item.day_hours, item.night_hours
        ));
    }

    format!(
        r#"You are a solar energy system sizing expert for the Nigerian market.

CUSTOMER LOCATION: {city}, {region}, {country} (avg sunlight {sun:.1}h/day, cloud cover {cloud:.0}%, humidity {hum:.0}%)

POWER REQUIREMENTS:
- Total load: {watts:.0}W
- Daily consumption: {kwh:.2} kWh
- Usage pattern: day {day:.1}h / night {night:.1}h

APPLIANCES:
{itemized}
SIZING GUIDANCE (stay close to these numbers):
- Inverter: about {inv_kw:.1} kW, never above {inv_max:.0} kW
- Batteries: about {bat} units of 3.5kWh, never above {bat_max}
- Solar panels: about {pan} units of 450W, never above {pan_max}

PRICING GUIDANCE (Nigerian market, NGN):
- Total installed cost must land between 1,000 and 3,000 NGN per watt of load
- VAT is exactly 7.5% of the subtotal
- totalAmount = subtotal + vat

Respond with ONLY a JSON object, no prose, in this exact shape:
{{
  "recommendation": {{
    "systemName": "string",
    "components": {{
      "inverter": {{"name": "e.g. 5kVA Hybrid Inverter", "quantity": 1, "warranty": "string", "imageUrl": null}},
      "battery": {{"name": "string", "quantity": 0, "warranty": "string", "imageUrl": null}},
      "solarPanels": {{"name": "string", "quantity": 0, "warranty": "string", "imageUrl": null}}
    }},
    "pricing": {{"subtotal": 0, "vat": 0, "totalAmount": 0, "currency": "NGN"}},
    "performance": {{"dailyOutputKWh": 0, "backupHours": 0}},
    "suitability": {{"matchScore": 0, "notes": "string"}}
  }}
}}"#,
        city = location.city,
        region = location.region,
        country = location.country,
        sun = conditions.average_sunlight_hours,
        cloud = conditions.cloud_cover,
        hum = conditions.humidity,
        watts = profile.total_wattage,
        kwh = profile.daily_consumption_kwh,
        day = profile.total_day_hours,
        night = profile.total_night_hours,
        itemized = itemized,
        inv_kw = guidance.inverter_kw,
        inv_max = INVERTER_KW_HARD_MAX,
        bat = guidance.battery_count,
        bat_max = BATTERY_HARD_MAX,
        pan = guidance.panel_count,
        pan_max = PANEL_HARD_MAX,
    )
}

/// Extracts the first balanced brace-delimited JSON object from free-form
/// text, tolerating leading/trailing prose and code fences.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Tagged outcome of decoding the model's text.
#[derive(Debug)]
pub enum AiParse {
    /// Well-formed recommendation.
    Parsed(Recommendation),
    /// No valid JSON object could be extracted from the text.
    ParseFailed(String),
    /// JSON decoded but the required recommendation structure is absent.
    SchemaInvalid(String),
}

/// Decodes the model's free-form text into a [`Recommendation`].
pub fn parse_recommendation(text: &str) -> AiParse {
    let Some(json_str) = extract_json_object(text) else {
        return AiParse::ParseFailed("no JSON object found in model output".to_string());
    };

    let value: serde_json::Value = match serde_json::from_str(json_str) {
        Ok(v) => v,
        Err(e) => return AiParse::ParseFailed(format!("invalid JSON: {}", e)),
    };

    // Accept either {"recommendation": {...}} or the bare object
    let root = value.get("recommendation").cloned().unwrap_or(value);

    if root.get("components").is_none() {
        return AiParse::SchemaInvalid("missing recommendation.components".to_string());
    }

    match serde_json::from_value::<Recommendation>(root) {
        Ok(rec) => AiParse::Parsed(rec),
        Err(e) => AiParse::SchemaInvalid(format!("recommendation shape invalid: {}", e)),
    }
}

/// Maps a breaker-wrapped generation failure onto the error taxonomy.
///
/// Transport and HTTP failures against the AI upstream are retryable for
/// the caller (the model may answer on resubmit), so they surface as
/// `UpstreamUnavailable` rather than a generic gateway error. An open
/// breaker reads the same way.
fn map_breaker_error(e: failsafe::Error<AppError>) -> AppError {
    match e {
        failsafe::Error::Inner(AppError::ExternalApiError(msg)) => {
            AppError::UpstreamUnavailable(msg)
        }
        failsafe::Error::Inner(err) => err,
        failsafe::Error::Rejected => AppError::UpstreamUnavailable(
            "AI circuit breaker is open after repeated upstream failures".to_string(),
        ),
    }
}

/// Runs the single generation attempt through the circuit breaker and
/// decodes the result. Parse failures are retryable, never a crash.
pub async fn generate_recommendation(
    state: &AppState,
    profile: &PowerProfile,
    location: &LocationProfile,
    conditions: &SolarConditions,
    items: &[ApplianceEntry],
) -> Result<Recommendation, AppError> {
    let prompt = build_prompt(profile, location, conditions, items);

    let text = state
        .ai_breaker
        .call(state.gemini.generate(&prompt))
        .await
        .map_err(map_breaker_error)?;

    match parse_recommendation(&text) {
        AiParse::Parsed(rec) => Ok(rec),
        AiParse::ParseFailed(msg) => Err(AppError::ResponseParse(msg)),
        AiParse::SchemaInvalid(msg) => Err(AppError::ResponseParse(msg)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::compute_load;
    use crate::location::default_location;
    use crate::weather::default_conditions;

    fn sample_items() -> Vec<ApplianceEntry> {
        vec![ApplianceEntry {
            name_of_item: "Fridge".to_string(),
            quantity: 1,
            wattage: 150.0,
            day_hours: 12.0,
            night_hours: 12.0,
        }]
    }

    #[test]
    fn sizing_guidance_respects_caps() {
        let profile = compute_load(&sample_items()).unwrap();
        let guidance = compute_sizing_guidance(&profile);
        // 150W * 1.3 / 1000 = 0.195, floored to 1.0 kW minimum
        assert_eq!(guidance.inverter_kw, 1.0);
        // 3.6 * 1.2 / 3.5 = 1.234 -> 2
        assert_eq!(guidance.battery_count, 2);
        // 3.6 * 1500 / 450 = 12
        assert_eq!(guidance.panel_count, 12);
    }

    #[test]
    fn sizing_guidance_caps_large_loads() {
        let items = vec![ApplianceEntry {
            name_of_item: "Industrial chiller".to_string(),
            quantity: 4,
            wattage: 5000.0,
            day_hours: 12.0,
            night_hours: 12.0,
        }];
        let profile = compute_load(&items).unwrap();
        let guidance = compute_sizing_guidance(&profile);
        assert_eq!(guidance.inverter_kw, INVERTER_KW_HARD_MAX);
        assert_eq!(guidance.battery_count, BATTERY_SUGGESTED_MAX);
        assert_eq!(guidance.panel_count, PANEL_SUGGESTED_MAX);
    }

    #[test]
    fn prompt_embeds_load_and_location() {
        let profile = compute_load(&sample_items()).unwrap();
        let prompt = build_prompt(
            &profile,
            &default_location(),
            &default_conditions(),
            &sample_items(),
        );
        assert!(prompt.contains("Lagos"));
        assert!(prompt.contains("3.60 kWh"));
        assert!(prompt.contains("Fridge x1"));
        assert!(prompt.contains("ONLY a JSON object"));
    }

    #[test]
    fn extracts_json_from_prose() {
        let text = "Sure! Here is your system:\n```json\n{\"a\": {\"b\": 1}}\n``` hope it helps";
        assert_eq!(extract_json_object(text), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn extraction_handles_braces_inside_strings() {
        let text = r#"prefix {"note": "uses } inside", "n": 2} suffix"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"note": "uses } inside", "n": 2}"#)
        );
    }

    #[test]
    fn extraction_fails_without_json() {
        assert!(extract_json_object("no braces here").is_none());
        assert!(extract_json_object("unterminated { \"a\": 1").is_none());
    }

    #[test]
    fn parse_rejects_missing_components() {
        let text = r#"{"recommendation": {"systemName": "X", "pricing": {}}}"#;
        assert!(matches!(
            parse_recommendation(text),
            AiParse::SchemaInvalid(_)
        ));
    }

    #[test]
    fn gemini_http_failures_surface_as_retryable() {
        let err = map_breaker_error(failsafe::Error::Inner(AppError::ExternalApiError(
            "Gemini returned status 500: internal".to_string(),
        )));
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
    }

    #[test]
    fn open_breaker_surfaces_as_retryable() {
        let err = map_breaker_error(failsafe::Error::Rejected);
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
    }

    #[test]
    fn parse_failures_keep_their_variant() {
        let err = map_breaker_error(failsafe::Error::Inner(AppError::ResponseParse(
            "Model response contained no text".to_string(),
        )));
        assert!(matches!(err, AppError::ResponseParse(_)));
    }

    #[test]
    fn parse_accepts_wrapped_and_bare_objects() {
        let rec_body = r#"{
            "systemName": "3kVA Starter",
            "components": {
                "inverter": {"name": "3kVA Inverter", "quantity": 1},
                "battery": {"name": "3.5kWh LiFePO4", "quantity": 2},
                "solarPanels": {"name": "450W Mono", "quantity": 4}
            },
            "pricing": {"subtotal": 2000000, "vat": 150000, "totalAmount": 2150000, "currency": "NGN"}
        }"#;

        let wrapped = format!("{{\"recommendation\": {}}}", rec_body);
        assert!(matches!(parse_recommendation(&wrapped), AiParse::Parsed(_)));
        assert!(matches!(parse_recommendation(rec_body), AiParse::Parsed(_)));
    }
}
