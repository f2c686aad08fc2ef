use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::metrics::{kg_to_lbs, lbs_to_kg};

/// Storage format for entry timestamps. Fixed-width so text order is time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// The profile table only ever holds this row.
pub const PROFILE_ID: i64 = 1;

// --- Weight entries ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub id: i64,
    pub weight_kg: f64,
    pub timestamp: NaiveDateTime,
    #[serde(default)]
    pub note: String,
    /// BMI at the time the entry was recorded. Never recomputed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bmi: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NewWeightEntry {
    pub weight_kg: f64,
    pub timestamp: NaiveDateTime,
    pub note: String,
    pub bmi: Option<f64>,
}

impl NewWeightEntry {
    /// An entry stamped with the current local time and an empty note.
    #[must_use]
    pub fn now(weight_kg: f64) -> Self {
        Self {
            weight_kg,
            timestamp: chrono::Local::now().naive_local(),
            note: String::new(),
            bmi: None,
        }
    }
}

// --- Goals ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub target_weight_kg: f64,
    pub start_weight_kg: f64,
    pub start_date: NaiveDate,
    pub target_date: NaiveDate,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct NewGoal {
    pub target_weight_kg: f64,
    pub start_weight_kg: f64,
    pub start_date: NaiveDate,
    pub target_date: NaiveDate,
}

// --- Profile ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "male" | "m" => Ok(Self::Male),
            "female" | "f" => Ok(Self::Female),
            _ => Err(CoreError::validation(format!(
                "Invalid gender '{s}'. Must be one of: male, female"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    #[default]
    Kg,
    Lbs,
}

impl WeightUnit {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kg => "kg",
            Self::Lbs => "lbs",
        }
    }

    /// Express a stored kilogram value in this unit.
    #[must_use]
    pub fn from_kg(self, kg: f64) -> f64 {
        match self {
            Self::Kg => kg,
            Self::Lbs => kg_to_lbs(kg),
        }
    }

    /// Convert a value given in this unit to kilograms for storage.
    #[must_use]
    pub fn to_kg(self, value: f64) -> f64 {
        match self {
            Self::Kg => value,
            Self::Lbs => lbs_to_kg(value),
        }
    }
}

impl fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeightUnit {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "kg" | "kgs" => Ok(Self::Kg),
            "lb" | "lbs" => Ok(Self::Lbs),
            _ => Err(CoreError::validation(format!(
                "Invalid unit '{s}'. Use 'kg' or 'lbs'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub height_cm: f64,
    pub age: u32,
    pub gender: Gender,
    #[serde(default)]
    pub preferred_unit: WeightUnit,
}

// --- Caller-side validation ---
//
// Core actions assume their input already passed these checks.

pub fn validate_weight(weight_kg: f64) -> Result<f64> {
    if !weight_kg.is_finite() || weight_kg <= 0.0 {
        return Err(CoreError::validation("Weight must be greater than 0"));
    }
    Ok(weight_kg)
}

pub fn validate_height(height_cm: f64) -> Result<f64> {
    if !height_cm.is_finite() || height_cm <= 0.0 {
        return Err(CoreError::validation("Height must be greater than 0"));
    }
    Ok(height_cm)
}

pub fn validate_age(age: i64) -> Result<u32> {
    if age <= 0 {
        return Err(CoreError::validation("Age must be greater than 0"));
    }
    u32::try_from(age).map_err(|_| CoreError::validation(format!("Age {age} is out of range")))
}

/// A goal's target date may be today or later.
pub fn validate_target_date(target: NaiveDate, today: NaiveDate) -> Result<NaiveDate> {
    if target < today {
        return Err(CoreError::validation(format!(
            "Target date {} is in the past",
            target.format(DATE_FORMAT)
        )));
    }
    Ok(target)
}

pub fn validate_profile(profile: &UserProfile) -> Result<()> {
    validate_height(profile.height_cm)?;
    validate_age(i64::from(profile.age))?;
    Ok(())
}

pub fn validate_goal(goal: &Goal) -> Result<()> {
    if validate_weight(goal.target_weight_kg).is_err() {
        return Err(CoreError::validation(format!(
            "Goal {} has a non-positive target weight",
            goal.id
        )));
    }
    if validate_weight(goal.start_weight_kg).is_err() {
        return Err(CoreError::validation(format!(
            "Goal {} has a non-positive start weight",
            goal.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_parse() {
        assert_eq!("male".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!("Female".parse::<Gender>().unwrap(), Gender::Female);
        assert_eq!("F".parse::<Gender>().unwrap(), Gender::Female);
        assert!("other".parse::<Gender>().is_err());
    }

    #[test]
    fn test_weight_unit_parse_and_default() {
        assert_eq!(WeightUnit::default(), WeightUnit::Kg);
        assert_eq!("LBS".parse::<WeightUnit>().unwrap(), WeightUnit::Lbs);
        assert_eq!("lb".parse::<WeightUnit>().unwrap(), WeightUnit::Lbs);
        assert!("stone".parse::<WeightUnit>().is_err());
    }

    #[test]
    fn test_weight_unit_conversion() {
        assert!((WeightUnit::Kg.from_kg(80.0) - 80.0).abs() < f64::EPSILON);
        assert!((WeightUnit::Lbs.from_kg(100.0) - 220.462).abs() < 1e-9);
        let kg = WeightUnit::Lbs.to_kg(WeightUnit::Lbs.from_kg(72.3));
        assert!((kg - 72.3).abs() / 72.3 < 1e-3);
    }

    #[test]
    fn test_validate_weight() {
        assert!(validate_weight(70.0).is_ok());
        assert!(validate_weight(0.0).is_err());
        assert!(validate_weight(-1.0).is_err());
        assert!(validate_weight(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_height_and_age() {
        assert!(validate_height(175.0).is_ok());
        assert!(validate_height(0.0).is_err());
        assert_eq!(validate_age(30).unwrap(), 30);
        assert!(validate_age(0).is_err());
        assert!(validate_age(-5).is_err());
    }

    #[test]
    fn test_validate_target_date() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert!(validate_target_date(today, today).is_ok());
        assert!(validate_target_date(today + chrono::Duration::days(30), today).is_ok());
        let err = validate_target_date(today - chrono::Duration::days(1), today).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_serde_lowercase_enums() {
        let profile = UserProfile {
            height_cm: 180.0,
            age: 40,
            gender: Gender::Male,
            preferred_unit: WeightUnit::Lbs,
        };
        let json = serde_json::to_string(&profile).unwrap();
        assert!(json.contains("\"male\""));
        assert!(json.contains("\"lbs\""));

        let parsed: UserProfile =
            serde_json::from_str(r#"{"height_cm":165.0,"age":28,"gender":"female"}"#).unwrap();
        assert_eq!(parsed.preferred_unit, WeightUnit::Kg);
    }
}
