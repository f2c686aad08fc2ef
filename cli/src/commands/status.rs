use anyhow::Result;
use chrono::Local;
use serde::Serialize;

use weightline_core::metrics::{bmi_category, days_between};
use weightline_core::models::{DATE_FORMAT, Goal, WeightEntry, WeightUnit};
use weightline_core::service::TrackerService;

use super::helpers::{fmt_weight, no_neg_zero, resolve_unit};

#[derive(Serialize)]
struct Status {
    unit: WeightUnit,
    latest: Option<WeightEntry>,
    bmi: Option<f64>,
    bmi_category: Option<&'static str>,
    goal: Option<Goal>,
    goal_progress_pct: f64,
    days_remaining: Option<i64>,
    recent: Vec<WeightEntry>,
}

pub(crate) fn cmd_status(service: &TrackerService, json: bool) -> Result<()> {
    let today = Local::now().date_naive();
    let bmi = service.current_bmi().get();
    let goal = service.active_goal().get();
    let status = Status {
        unit: resolve_unit(service, None)?,
        latest: service.latest_entry().get(),
        bmi,
        bmi_category: bmi.map(|b| bmi_category(b).label()),
        days_remaining: goal.as_ref().map(|g| days_between(today, g.target_date)),
        goal,
        goal_progress_pct: service.goal_progress().get(),
        recent: service.recent_entries().get(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let unit = status.unit;
    let Some(latest) = &status.latest else {
        println!("No weight recorded yet. Use `weightline weight log` to get started.");
        return Ok(());
    };

    println!(
        "Current: {} ({})",
        fmt_weight(latest.weight_kg, unit),
        latest.timestamp.format("%Y-%m-%d %H:%M")
    );
    match (status.bmi, status.bmi_category) {
        (Some(bmi), Some(category)) => println!("BMI:     {bmi:.1} ({category})"),
        _ => println!("BMI:     set a profile with `weightline profile set`"),
    }

    if let Some(goal) = &status.goal {
        let to_go = no_neg_zero((latest.weight_kg - goal.target_weight_kg).abs());
        println!(
            "Goal:    {} by {} ({:.0}% there, {} to go)",
            fmt_weight(goal.target_weight_kg, unit),
            goal.target_date.format(DATE_FORMAT),
            status.goal_progress_pct,
            fmt_weight(to_go, unit)
        );
        if let Some(days) = status.days_remaining {
            if days >= 0 {
                println!("         {days} days remaining");
            }
        }
    }

    if status.recent.len() > 1 {
        println!("\nRecent:");
        for e in &status.recent {
            println!(
                "  {}  {}",
                e.timestamp.format("%Y-%m-%d"),
                fmt_weight(e.weight_kg, unit)
            );
        }
    }

    Ok(())
}
