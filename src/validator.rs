//! Rule-based sanity layer over AI-generated recommendations.
//!
//! Financial figures shown to the user are a hard correctness requirement:
//! anything outside tolerance rejects the whole recommendation and forces a
//! client retry, never a silent repair.

use crate::models::Recommendation;
use regex::Regex;
use std::sync::OnceLock;

pub const PRICE_PER_WATT_MIN: f64 = 1000.0;
pub const PRICE_PER_WATT_MIN_LARGE: f64 = 1200.0;
pub const PRICE_PER_WATT_MAX: f64 = 3000.0;
pub const TOTAL_COST_FLOOR: f64 = 1_500_000.0;
pub const TOTAL_COST_CEILING: f64 = 12_000_000.0;
pub const VAT_RATE: f64 = 0.075;
pub const ARITHMETIC_TOLERANCE: f64 = 1000.0;
pub const LARGE_LOAD_KWH: f64 = 30.0;
pub const BATTERY_ABSOLUTE_MAX: u32 = 25;
pub const PANEL_ABSOLUTE_MAX: u32 = 30;

/// Outcome of validating one recommendation. `issues` holds every
/// violation found; the checks never short-circuit.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<String>,
}

/// Validates an AI recommendation against pricing and component-sizing
/// heuristics. Any violation makes the whole recommendation invalid.
pub fn validate(
    recommendation: &Recommendation,
    total_wattage: f64,
    daily_consumption_kwh: f64,
) -> ValidationReport {
    let mut issues = Vec::new();
    check_pricing(recommendation, total_wattage, daily_consumption_kwh, &mut issues);
    check_component_sizing(recommendation, total_wattage, daily_consumption_kwh, &mut issues);

    ValidationReport {
        valid: issues.is_empty(),
        issues,
    }
}

fn check_pricing(
    recommendation: &Recommendation,
    total_wattage: f64,
    daily_consumption_kwh: f64,
    issues: &mut Vec<String>,
) {
    let pricing = &recommendation.pricing;

    if total_wattage > 0.0 {
        let price_per_watt = pricing.total_amount / total_wattage;
        let floor = if daily_consumption_kwh > LARGE_LOAD_KWH {
            PRICE_PER_WATT_MIN_LARGE
        } else {
            PRICE_PER_WATT_MIN
        };

        if price_per_watt > PRICE_PER_WATT_MAX {
            issues.push(format!(
                "Price per watt is too high: {:.0} NGN/W (ceiling {:.0})",
                price_per_watt, PRICE_PER_WATT_MAX
            ));
        }
        if price_per_watt < floor {
            issues.push(format!(
                "Price per watt is too low: {:.0} NGN/W (floor {:.0})",
                price_per_watt, floor
            ));
        }
    }

    let cost_floor = TOTAL_COST_FLOOR.max(total_wattage * 1000.0);
    if pricing.total_amount < cost_floor {
        issues.push(format!(
            "Total system cost {:.0} is below the plausible floor {:.0}",
            pricing.total_amount, cost_floor
        ));
    }
    if pricing.total_amount > TOTAL_COST_CEILING {
        issues.push(format!(
            "Total system cost {:.0} exceeds the ceiling {:.0}",
            pricing.total_amount, TOTAL_COST_CEILING
        ));
    }

    let expected_vat = (pricing.subtotal * VAT_RATE).round();
    if (pricing.vat - expected_vat).abs() > ARITHMETIC_TOLERANCE {
        issues.push(format!(
            "VAT {:.0} does not match 7.5% of subtotal (expected {:.0})",
            pricing.vat, expected_vat
        ));
    }

    let expected_total = pricing.subtotal + pricing.vat;
    if (pricing.total_amount - expected_total).abs() > ARITHMETIC_TOLERANCE {
        issues.push(format!(
            "Total amount {:.0} does not equal subtotal + VAT ({:.0})",
            pricing.total_amount, expected_total
        ));
    }
}

fn check_component_sizing(
    recommendation: &Recommendation,
    total_wattage: f64,
    daily_consumption_kwh: f64,
    issues: &mut Vec<String>,
) {
    let components = &recommendation.components;

    // Inverter capacity, parsed from its market name ("5kVA Hybrid", "7.5kW")
    match parse_capacity_kw(&components.inverter.name) {
        Some(capacity_kw) => {
            let capacity_w = capacity_kw * 1000.0;
            if total_wattage > 0.0 {
                let ratio = capacity_w / total_wattage;
                if ratio < 1.2 {
                    issues.push(format!(
                        "Inverter capacity {:.1}kW is undersized for a {:.0}W load (ratio {:.2}, minimum 1.2)",
                        capacity_kw, total_wattage, ratio
                    ));
                }
                if ratio > 2.0 {
                    issues.push(format!(
                        "Inverter capacity {:.1}kW is oversized for a {:.0}W load (ratio {:.2}, maximum 2.0)",
                        capacity_kw, total_wattage, ratio
                    ));
                }
            }
        }
        None => {
            issues.push(format!(
                "Inverter capacity could not be determined from name '{}'",
                components.inverter.name
            ));
        }
    }

    let battery_cap = ((daily_consumption_kwh * 1.5 / 2.5).ceil() as u32).min(BATTERY_ABSOLUTE_MAX);
    if components.battery.quantity > battery_cap {
        issues.push(format!(
            "Battery quantity {} exceeds the cap of {} for a {:.1} kWh/day load",
            components.battery.quantity, battery_cap, daily_consumption_kwh
        ));
    }

    let panel_cap =
        ((daily_consumption_kwh * 1.8 * 1000.0 / 400.0).ceil() as u32).min(PANEL_ABSOLUTE_MAX);
    if components.solar_panels.quantity > panel_cap {
        issues.push(format!(
            "Solar panel quantity {} exceeds the cap of {} for a {:.1} kWh/day load",
            components.solar_panels.quantity, panel_cap, daily_consumption_kwh
        ));
    }
}

/// Parses a kW rating from a component name. Accepts both kW and kVA since
/// market listings mix the units ("5kVA Hybrid Inverter", "7.5 kW").
pub fn parse_capacity_kw(name: &str) -> Option<f64> {
    static CAPACITY_RE: OnceLock<Regex> = OnceLock::new();
    let re = CAPACITY_RE
        .get_or_init(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(kw|kva)").expect("valid regex"));

    re.captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Component, Components, Pricing, Recommendation};

    fn component(name: &str, quantity: u32) -> Component {
        Component {
            name: name.to_string(),
            quantity,
            warranty: Some("12 months".to_string()),
            image_url: None,
        }
    }

    fn recommendation(
        inverter: &str,
        batteries: u32,
        panels: u32,
        subtotal: f64,
        vat: f64,
        total: f64,
    ) -> Recommendation {
        Recommendation {
            system_name: "Test system".to_string(),
            components: Components {
                inverter: component(inverter, 1),
                battery: component("3.5kWh LiFePO4 Battery", batteries),
                solar_panels: component("450W Mono Panel", panels),
            },
            pricing: Pricing {
                subtotal,
                vat,
                total_amount: total,
                currency: "NGN".to_string(),
            },
            performance: None,
            suitability: None,
        }
    }

    // A 3000W / 14.4 kWh/day setup priced at 2000 NGN/W with exact VAT.
    fn sane_recommendation() -> Recommendation {
        recommendation("5kVA Hybrid Inverter", 6, 12, 5_581_395.0, 418_605.0, 6_000_000.0)
    }

    #[test]
    fn sane_recommendation_passes() {
        let report = validate(&sane_recommendation(), 3000.0, 14.4);
        assert!(report.valid, "unexpected issues: {:?}", report.issues);
    }

    #[test]
    fn rejects_price_per_watt_too_high() {
        // 30M for a 3000W load = 10,000 NGN/W
        let rec = recommendation(
            "5kVA Hybrid Inverter",
            6,
            12,
            27_906_977.0,
            2_093_023.0,
            30_000_000.0,
        );
        let report = validate(&rec, 3000.0, 14.4);
        assert!(!report.valid);
        assert!(report.issues.iter().any(|i| i.contains("too high")));
    }

    #[test]
    fn rejects_vat_drift() {
        // subtotal 5,000,000 -> expected VAT 375,000
        let rec = recommendation("5kVA Hybrid Inverter", 6, 12, 5_000_000.0, 100_000.0, 5_100_000.0);
        let report = validate(&rec, 3000.0, 14.4);
        assert!(!report.valid);
        assert!(report.issues.iter().any(|i| i.contains("VAT")));
    }

    #[test]
    fn accepts_vat_within_tolerance() {
        // expected VAT 418,605; drift of 900 stays inside the +/-1000 band
        let rec = recommendation(
            "5kVA Hybrid Inverter",
            6,
            12,
            5_581_395.0,
            419_505.0,
            6_000_900.0,
        );
        let report = validate(&rec, 3000.0, 14.4);
        assert!(report.valid, "unexpected issues: {:?}", report.issues);
    }

    #[test]
    fn rejects_total_not_matching_subtotal_plus_vat() {
        let rec = recommendation(
            "5kVA Hybrid Inverter",
            6,
            12,
            5_581_395.0,
            418_605.0,
            6_500_000.0,
        );
        let report = validate(&rec, 3000.0, 14.4);
        assert!(!report.valid);
        assert!(report
            .issues
            .iter()
            .any(|i| i.contains("subtotal + VAT")));
    }

    #[test]
    fn rejects_forty_panels_for_small_load() {
        // 10 kWh/day caps panels at ceil(10*1.8*1000/400) = 45 -> absolute 30
        let rec = recommendation(
            "3kVA Hybrid Inverter",
            4,
            40,
            3_720_930.0,
            279_070.0,
            4_000_000.0,
        );
        let report = validate(&rec, 2000.0, 10.0);
        assert!(!report.valid);
        assert!(report
            .issues
            .iter()
            .any(|i| i.contains("panel quantity 40")
                || i.contains("Solar panel quantity 40")));
    }

    #[test]
    fn rejects_excess_batteries() {
        // 5 kWh/day caps batteries at ceil(5*1.5/2.5) = 3
        let rec = recommendation(
            "2kVA Inverter",
            10,
            6,
            1_860_465.0,
            139_535.0,
            2_000_000.0,
        );
        let report = validate(&rec, 1200.0, 5.0);
        assert!(!report.valid);
        assert!(report.issues.iter().any(|i| i.contains("Battery quantity")));
    }

    #[test]
    fn rejects_undersized_and_oversized_inverters() {
        // 1kVA for 3000W load: ratio 0.33
        let small = recommendation("1kVA Inverter", 6, 12, 5_581_395.0, 418_605.0, 6_000_000.0);
        let report = validate(&small, 3000.0, 14.4);
        assert!(report.issues.iter().any(|i| i.contains("undersized")));

        // 10kW for 3000W load: ratio 3.33
        let big = recommendation("10kW Inverter", 6, 12, 5_581_395.0, 418_605.0, 6_000_000.0);
        let report = validate(&big, 3000.0, 14.4);
        assert!(report.issues.iter().any(|i| i.contains("oversized")));
    }

    #[test]
    fn rejects_unparsable_inverter_name() {
        let rec = recommendation("Premium Inverter", 6, 12, 5_581_395.0, 418_605.0, 6_000_000.0);
        let report = validate(&rec, 3000.0, 14.4);
        assert!(!report.valid);
        assert!(report
            .issues
            .iter()
            .any(|i| i.contains("could not be determined")));
    }

    #[test]
    fn tightened_floor_for_large_consumption() {
        // 1100 NGN/W passes a normal load but fails above 30 kWh/day.
        // 5000W load, 6.5kW inverter (ratio 1.3), exact VAT arithmetic.
        let rec = recommendation(
            "6.5kW Hybrid Inverter",
            16,
            25,
            5_116_279.0,
            383_721.0,
            5_500_000.0,
        );
        let normal = validate(&rec, 5000.0, 28.0);
        assert!(normal.valid, "unexpected issues: {:?}", normal.issues);

        let large = validate(&rec, 5000.0, 35.0);
        assert!(!large.valid);
        assert!(large.issues.iter().any(|i| i.contains("too low")));
    }

    #[test]
    fn collects_multiple_issues() {
        let rec = recommendation("Mystery Box", 40, 40, 1.0, 2.0, 30_000_000.0);
        let report = validate(&rec, 3000.0, 10.0);
        assert!(report.issues.len() >= 4);
    }

    #[test]
    fn capacity_parsing_handles_market_names() {
        assert_eq!(parse_capacity_kw("5kVA Hybrid Inverter"), Some(5.0));
        assert_eq!(parse_capacity_kw("7.5 kW Growatt"), Some(7.5));
        assert_eq!(parse_capacity_kw("Inverter 3.5KVA pure sine"), Some(3.5));
        assert_eq!(parse_capacity_kw("Premium Inverter"), None);
    }
}
