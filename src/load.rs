//! Load aggregation over the caller's appliance list.

use crate::errors::AppError;
use crate::models::{ApplianceEntry, PowerProfile, UsageBreakdown, UsagePattern};

/// Rounds to 2 decimal places. Repeated application is idempotent.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Classifies the usage pattern from total day/night hours.
///
/// Day-heavy when day hours exceed 1.5x night hours, Night-heavy for the
/// inverse, Balanced otherwise.
pub fn classify_usage(total_day_hours: f64, total_night_hours: f64) -> UsagePattern {
    if total_day_hours > total_night_hours * 1.5 {
        UsagePattern::DayHeavy
    } else if total_night_hours > total_day_hours * 1.5 {
        UsagePattern::NightHeavy
    } else {
        UsagePattern::Balanced
    }
}

/// Aggregates appliance entries into a power profile.
///
/// `totalWattage = Σ wattage * quantity`, hours are summed per bucket, and
/// `dailyConsumptionKWh = totalWattage * (day + night) / 1000` rounded to
/// 2 decimals.
pub fn compute_load(appliances: &[ApplianceEntry]) -> Result<PowerProfile, AppError> {
    if appliances.is_empty() {
        return Err(AppError::Validation {
            message: "At least one appliance is required".to_string(),
            fields: vec!["items".to_string()],
        });
    }

    let mut bad_fields = Vec::new();
    for (i, item) in appliances.iter().enumerate() {
        if item.name_of_item.trim().is_empty() {
            bad_fields.push(format!("items[{}].nameOfItem", i));
        }
        if item.quantity == 0 {
            bad_fields.push(format!("items[{}].quantity", i));
        }
        if !(item.wattage > 0.0) || !item.wattage.is_finite() {
            bad_fields.push(format!("items[{}].wattage", i));
        }
        if !(0.0..=24.0).contains(&item.day_hours) || !item.day_hours.is_finite() {
            bad_fields.push(format!("items[{}].dayHours", i));
        }
        if !(0.0..=24.0).contains(&item.night_hours) || !item.night_hours.is_finite() {
            bad_fields.push(format!("items[{}].nightHours", i));
        }
    }
    if !bad_fields.is_empty() {
        return Err(AppError::Validation {
            message: "One or more appliance entries are invalid".to_string(),
            fields: bad_fields,
        });
    }

    let total_wattage: f64 = appliances
        .iter()
        .map(|a| a.wattage * a.quantity as f64)
        .sum();
    let total_day_hours: f64 = appliances.iter().map(|a| a.day_hours).sum();
    let total_night_hours: f64 = appliances.iter().map(|a| a.night_hours).sum();

    let daily_consumption_kwh =
        round2(total_wattage * (total_day_hours + total_night_hours) / 1000.0);

    let total_hours = total_day_hours + total_night_hours;
    let (day_pct, night_pct) = if total_hours > 0.0 {
        (
            round2(total_day_hours / total_hours * 100.0),
            round2(total_night_hours / total_hours * 100.0),
        )
    } else {
        (0.0, 0.0)
    };

    Ok(PowerProfile {
        total_wattage,
        total_day_hours,
        total_night_hours,
        daily_consumption_kwh,
        usage: UsageBreakdown {
            pattern: classify_usage(total_day_hours, total_night_hours),
            day_usage_pct: day_pct,
            night_usage_pct: night_pct,
        },
    })
}
