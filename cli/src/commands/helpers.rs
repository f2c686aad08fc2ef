use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};

use weightline_core::models::{WeightUnit, validate_weight};
use weightline_core::service::TrackerService;

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate> {
    let today = Local::now().date_naive();
    match s {
        "today" => Ok(today),
        "tomorrow" => Ok(today + chrono::Duration::days(1)),
        _ => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{s}'. Use YYYY-MM-DD, today or tomorrow")),
    }
}

/// Unit given on the command line, else the profile's preferred unit, else kg.
pub(crate) fn resolve_unit(service: &TrackerService, unit: Option<&str>) -> Result<WeightUnit> {
    match unit {
        Some(u) => Ok(u.parse()?),
        None => Ok(service
            .user_profile()
            .with(|p| p.as_ref().map(|p| p.preferred_unit))
            .unwrap_or_default()),
    }
}

/// Validate a weight typed in `unit` and convert it to kilograms.
pub(crate) fn parse_weight(value: f64, unit: WeightUnit) -> Result<f64> {
    validate_weight(value)?;
    Ok(unit.to_kg(value))
}

pub(crate) fn fmt_weight(kg: f64, unit: WeightUnit) -> String {
    format!("{:.1} {unit}", no_neg_zero(unit.from_kg(kg)))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
