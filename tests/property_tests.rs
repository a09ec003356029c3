//! Property-based tests over the load math, JSON extraction and the
//! recommendation validator.
use proptest::prelude::*;
use solar_advisor_api::load::{classify_usage, compute_load, round2};
use solar_advisor_api::models::{
    ApplianceEntry, Component, Components, Pricing, Recommendation, UsagePattern,
};
use solar_advisor_api::recommendation::extract_json_object;
use solar_advisor_api::validator::{parse_capacity_kw, validate};
use solar_advisor_api::weather::sunlight_hours_for_latitude;

fn entry(quantity: u32, wattage: f64, day: f64, night: f64) -> ApplianceEntry {
    ApplianceEntry {
        name_of_item: "Appliance".to_string(),
        quantity,
        wattage,
        day_hours: day,
        night_hours: night,
    }
}

proptest! {
    #[test]
    fn round2_is_idempotent(value in -1_000_000.0f64..1_000_000.0) {
        let once = round2(value);
        prop_assert_eq!(once, round2(once));
    }

    #[test]
    fn round2_within_half_a_cent(value in -1_000_000.0f64..1_000_000.0) {
        prop_assert!((round2(value) - value).abs() <= 0.005 + f64::EPSILON * value.abs());
    }

    #[test]
    fn classification_matches_definition(day in 0.0f64..24.0, night in 0.0f64..24.0) {
        let expected = if day > night * 1.5 {
            UsagePattern::DayHeavy
        } else if night > day * 1.5 {
            UsagePattern::NightHeavy
        } else {
            UsagePattern::Balanced
        };
        prop_assert_eq!(classify_usage(day, night), expected);
    }

    #[test]
    fn load_sums_wattage_times_quantity(
        entries in prop::collection::vec(
            (1u32..20, 1.0f64..3000.0, 0.0f64..24.0, 0.0f64..24.0),
            1..10,
        )
    ) {
        let appliances: Vec<ApplianceEntry> = entries
            .iter()
            .map(|&(q, w, d, n)| entry(q, w, d, n))
            .collect();

        let expected_wattage: f64 = entries.iter().map(|&(q, w, _, _)| w * q as f64).sum();
        let expected_day: f64 = entries.iter().map(|&(_, _, d, _)| d).sum();
        let expected_night: f64 = entries.iter().map(|&(_, _, _, n)| n).sum();

        let profile = compute_load(&appliances).unwrap();
        prop_assert!((profile.total_wattage - expected_wattage).abs() < 1e-6);
        prop_assert!((profile.total_day_hours - expected_day).abs() < 1e-6);
        prop_assert!((profile.total_night_hours - expected_night).abs() < 1e-6);

        let expected_kwh =
            round2(expected_wattage * (expected_day + expected_night) / 1000.0);
        prop_assert!((profile.daily_consumption_kwh - expected_kwh).abs() < 1e-9);
    }

    #[test]
    fn load_rejects_zero_quantity(wattage in 1.0f64..3000.0) {
        let appliances = vec![entry(0, wattage, 4.0, 4.0)];
        prop_assert!(compute_load(&appliances).is_err());
    }

    #[test]
    fn extraction_never_panics(text in ".{0,200}") {
        // Only interested in "does not panic / does not slice mid-char"
        let _ = extract_json_object(&text);
    }

    #[test]
    fn extraction_finds_object_in_prose(
        prefix in "[^{}]{0,40}",
        suffix in "[^{}]{0,40}",
        key in "[a-z]{1,10}",
        value in 0u32..10_000,
    ) {
        let embedded = format!("{}{{\"{}\": {}}}{}", prefix, key, value, suffix);
        let extracted = extract_json_object(&embedded).unwrap();
        prop_assert!(extracted.starts_with('{'), "extracted does not start with opening brace");
        prop_assert!(extracted.ends_with('}'), "extracted does not end with closing brace");
        let parsed: serde_json::Value = serde_json::from_str(extracted).unwrap();
        prop_assert_eq!(&parsed[&key], &serde_json::json!(value));
    }

    #[test]
    fn sunlight_hours_always_in_range(lat in -90.0f64..90.0) {
        let hours = sunlight_hours_for_latitude(lat);
        prop_assert!((5.0..=8.0).contains(&hours));
    }

    #[test]
    fn capacity_parses_numeric_kw_names(kw in 1u32..50, unit in prop::sample::select(vec!["kW", "KVA", "kva"])) {
        let name = format!("{}{} Hybrid Inverter", kw, unit);
        prop_assert_eq!(parse_capacity_kw(&name), Some(kw as f64));
    }

    #[test]
    fn overpriced_recommendations_always_rejected(
        wattage in 500.0f64..5000.0,
        price_per_watt in 3100.0f64..10_000.0,
    ) {
        let total = wattage * price_per_watt;
        let subtotal = total / 1.075;
        let rec = Recommendation {
            system_name: "Test System".to_string(),
            components: Components {
                inverter: Component {
                    name: "5kW Hybrid Inverter".to_string(),
                    quantity: 1,
                    warranty: None,
                    image_url: None,
                },
                battery: Component {
                    name: "3.5kWh LiFePO4".to_string(),
                    quantity: 2,
                    warranty: None,
                    image_url: None,
                },
                solar_panels: Component {
                    name: "450W Mono".to_string(),
                    quantity: 6,
                    warranty: None,
                    image_url: None,
                },
            },
            pricing: Pricing {
                subtotal,
                vat: total - subtotal,
                total_amount: total,
                currency: "NGN".to_string(),
            },
            performance: None,
            suitability: None,
        };

        let report = validate(&rec, wattage, 10.0);
        prop_assert!(!report.valid);
        prop_assert!(report.issues.iter().any(|i| i.contains("too high")));
    }
}
