//! Pure computations over entries, goals and the profile. Nothing here
//! touches storage.

use std::fmt;

use chrono::{Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::models::{Goal, UserProfile, WeightEntry};

pub const LBS_PER_KG: f64 = 2.20462;

#[must_use]
pub fn bmi(weight_kg: f64, height_cm: f64) -> f64 {
    let height_m = height_cm / 100.0;
    weight_kg / (height_m * height_m)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl BmiCategory {
    /// Each band includes its lower bound.
    #[must_use]
    pub fn from_bmi(bmi: f64) -> Self {
        if bmi < 18.5 {
            Self::Underweight
        } else if bmi < 25.0 {
            Self::Normal
        } else if bmi < 30.0 {
            Self::Overweight
        } else {
            Self::Obese
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Underweight => "Underweight",
            Self::Normal => "Normal",
            Self::Overweight => "Overweight",
            Self::Obese => "Obese",
        }
    }
}

impl fmt::Display for BmiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[must_use]
pub fn bmi_category(bmi: f64) -> BmiCategory {
    BmiCategory::from_bmi(bmi)
}

#[must_use]
pub fn kg_to_lbs(kg: f64) -> f64 {
    kg * LBS_PER_KG
}

#[must_use]
pub fn lbs_to_kg(lbs: f64) -> f64 {
    lbs / LBS_PER_KG
}

/// Percentage of the way from `start` to `target`, clamped to `0..=100`.
///
/// Moving away from the target reports 0, never a negative value. A goal
/// whose start equals its target always reports 0.
#[must_use]
pub fn goal_progress(current_kg: f64, start_kg: f64, target_kg: f64) -> f64 {
    let total_change = target_kg - start_kg;
    if total_change == 0.0 {
        return 0.0;
    }
    let current_change = current_kg - start_kg;
    (current_change / total_change * 100.0).clamp(0.0, 100.0)
}

/// BMI at the latest entry, or `None` if either side is missing.
#[must_use]
pub fn current_bmi(latest: Option<&WeightEntry>, profile: Option<&UserProfile>) -> Option<f64> {
    match (latest, profile) {
        (Some(entry), Some(profile)) => Some(bmi(entry.weight_kg, profile.height_cm)),
        _ => None,
    }
}

/// Progress toward the active goal, or 0 if either side is missing.
#[must_use]
pub fn progress_toward(latest: Option<&WeightEntry>, goal: Option<&Goal>) -> f64 {
    match (latest, goal) {
        (Some(entry), Some(goal)) => {
            goal_progress(entry.weight_kg, goal.start_weight_kg, goal.target_weight_kg)
        }
        _ => 0.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodStats {
    pub start: f64,
    pub current: f64,
    pub change: f64,
    pub min: f64,
    pub max: f64,
    pub average: f64,
    pub count: usize,
}

/// Summary over a set of entries. `start` and `current` are picked by
/// timestamp, so the slice may come in either order. Returns `None` for an
/// empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn period_statistics(entries: &[WeightEntry]) -> Option<PeriodStats> {
    let first = entries.iter().min_by_key(|e| e.timestamp)?;
    let last = entries.iter().max_by_key(|e| e.timestamp)?;

    let (min, max, sum) = entries.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY, 0.0),
        |(min, max, sum), e| (min.min(e.weight_kg), max.max(e.weight_kg), sum + e.weight_kg),
    );

    Some(PeriodStats {
        start: first.weight_kg,
        current: last.weight_kg,
        change: last.weight_kg - first.weight_kg,
        min,
        max,
        average: sum / entries.len() as f64,
        count: entries.len(),
    })
}

/// Signed number of calendar days from `start` to `end`.
#[must_use]
pub fn days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// Chart windows offered by the statistics view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartPeriod {
    Week,
    Month,
    Year,
}

impl ChartPeriod {
    /// Midnight at the start of the window ending at `now`.
    #[must_use]
    pub fn window_start(self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date();
        let start = match self {
            Self::Week => today - chrono::Duration::days(7),
            Self::Month => today.checked_sub_months(Months::new(1)).unwrap_or(today),
            Self::Year => today.checked_sub_months(Months::new(12)).unwrap_or(today),
        };
        start.and_time(NaiveTime::MIN)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl std::str::FromStr for ChartPeriod {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "week" | "w" => Ok(Self::Week),
            "month" | "m" => Ok(Self::Month),
            "year" | "y" => Ok(Self::Year),
            _ => Err(crate::CoreError::Validation(format!(
                "Invalid period '{s}'. Use week, month or year"
            ))),
        }
    }
}
