use anyhow::Result;

use weightline_core::metrics::bmi_category;
use weightline_core::models::{Gender, WeightUnit, validate_age, validate_height};
use weightline_core::service::TrackerService;

pub(crate) async fn cmd_profile_set(
    service: &TrackerService,
    height_cm: f64,
    age: i64,
    gender: &str,
    unit: &str,
    json: bool,
) -> Result<()> {
    let height_cm = validate_height(height_cm)?;
    let age = validate_age(age)?;
    let gender: Gender = gender.parse()?;
    let unit: WeightUnit = unit.parse()?;

    service.save_profile(height_cm, age, gender, unit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&service.user_profile().get())?);
    } else {
        println!("Saved profile: {height_cm:.0} cm, {age} years, {gender}, weights in {unit}");
    }

    Ok(())
}

pub(crate) fn cmd_profile_show(service: &TrackerService, json: bool) -> Result<()> {
    let Some(profile) = service.user_profile().get() else {
        if json {
            println!("{}", serde_json::json!({ "error": "No profile set" }));
        } else {
            eprintln!("No profile set. Use `weightline profile set` to create one.");
        }
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!("Height: {:.0} cm", profile.height_cm);
        println!("Age:    {}", profile.age);
        println!("Gender: {}", profile.gender);
        println!("Unit:   {}", profile.preferred_unit);
        if let Some(bmi) = service.current_bmi().get() {
            println!("BMI:    {bmi:.1} ({})", bmi_category(bmi));
        }
    }

    Ok(())
}

pub(crate) async fn cmd_profile_clear(service: &TrackerService, json: bool) -> Result<()> {
    let cleared = service.repository().delete_profile().await?;

    if json {
        println!("{}", serde_json::json!({ "cleared": cleared }));
    } else if cleared {
        println!("Profile cleared");
    } else {
        println!("No profile to clear");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_profile_set_validates() {
        let service = TrackerService::open_in_memory().await.unwrap();
        assert!(cmd_profile_set(&service, 0.0, 30, "male", "kg", true).await.is_err());
        assert!(cmd_profile_set(&service, 180.0, 0, "male", "kg", true).await.is_err());
        assert!(cmd_profile_set(&service, 180.0, 30, "x", "kg", true).await.is_err());
        assert!(cmd_profile_set(&service, 180.0, 30, "male", "st", true).await.is_err());
        assert!(service.user_profile().get().is_none());
    }

    #[tokio::test]
    async fn test_profile_set_and_clear() {
        let service = TrackerService::open_in_memory().await.unwrap();
        cmd_profile_set(&service, 168.0, 52, "f", "lbs", true)
            .await
            .unwrap();
        let profile = service.user_profile().get().unwrap();
        assert_eq!(profile.gender, Gender::Female);
        assert_eq!(profile.preferred_unit, WeightUnit::Lbs);
        assert_eq!(profile.age, 52);

        cmd_profile_clear(&service, true).await.unwrap();
        assert!(service.user_profile().get().is_none());
    }
}
