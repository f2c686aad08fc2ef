use anyhow::{Result, bail};
use chrono::Local;
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use weightline_core::metrics::days_between;
use weightline_core::models::{DATE_FORMAT, Goal, WeightUnit, validate_target_date};
use weightline_core::service::TrackerService;

use super::helpers::{fmt_weight, parse_date, parse_weight, resolve_unit};

#[derive(Serialize)]
struct GoalStatus {
    goal: Goal,
    progress_pct: f64,
    days_remaining: i64,
}

fn print_goal(goal: &Goal, progress: f64, unit: WeightUnit) {
    let days_left = days_between(Local::now().date_naive(), goal.target_date);
    println!(
        "Goal: {} → {} by {}",
        fmt_weight(goal.start_weight_kg, unit),
        fmt_weight(goal.target_weight_kg, unit),
        goal.target_date.format(DATE_FORMAT)
    );
    println!("  Progress: {progress:.0}%");
    if days_left >= 0 {
        println!("  Days remaining: {days_left}");
    } else {
        println!("  Target date passed {} days ago", -days_left);
    }
}

pub(crate) async fn cmd_goal_set(
    service: &TrackerService,
    target: f64,
    unit: Option<&str>,
    by: &str,
    json: bool,
) -> Result<()> {
    let unit = resolve_unit(service, unit)?;
    let target_kg = parse_weight(target, unit)?;
    let target_date = validate_target_date(parse_date(by)?, Local::now().date_naive())?;

    if service.latest_entry().get().is_none() {
        bail!("No weight recorded yet. Use `weightline weight log` before setting a goal");
    }
    let Some(id) = service.set_goal(target_kg, target_date).await? else {
        bail!("No weight recorded yet, goal not set");
    };
    let goal = service.repository().get_goal(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&goal)?);
    } else {
        print_goal(&goal, service.goal_progress().get(), unit);
    }

    Ok(())
}

pub(crate) fn cmd_goal_show(service: &TrackerService, json: bool) -> Result<()> {
    let Some(goal) = service.active_goal().get() else {
        if json {
            println!("{}", serde_json::json!({ "error": "No active goal" }));
        } else {
            eprintln!("No active goal. Use `weightline goal set` to create one.");
        }
        return Ok(());
    };
    let progress = service.goal_progress().get();

    if json {
        let status = GoalStatus {
            days_remaining: days_between(Local::now().date_naive(), goal.target_date),
            progress_pct: progress,
            goal,
        };
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_goal(&goal, progress, resolve_unit(service, None)?);
    }

    Ok(())
}

pub(crate) async fn cmd_goal_history(service: &TrackerService, json: bool) -> Result<()> {
    let goals = service.repository().all_goals().await?.get();

    if json {
        println!("{}", serde_json::to_string_pretty(&goals)?);
    } else if goals.is_empty() {
        eprintln!("No goals yet. Use `weightline goal set` to create one.");
    } else {
        #[derive(Tabled)]
        struct GoalRow {
            #[tabled(rename = "ID")]
            id: i64,
            #[tabled(rename = "Started")]
            start_date: String,
            #[tabled(rename = "Target date")]
            target_date: String,
            #[tabled(rename = "Start")]
            start: String,
            #[tabled(rename = "Target")]
            target: String,
            #[tabled(rename = "Active")]
            active: &'static str,
        }

        let unit = resolve_unit(service, None)?;
        let rows: Vec<GoalRow> = goals
            .iter()
            .map(|g| GoalRow {
                id: g.id,
                start_date: g.start_date.format(DATE_FORMAT).to_string(),
                target_date: g.target_date.format(DATE_FORMAT).to_string(),
                start: fmt_weight(g.start_weight_kg, unit),
                target: fmt_weight(g.target_weight_kg, unit),
                active: if g.is_active { "*" } else { "" },
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(3..5)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    Ok(())
}

pub(crate) async fn cmd_goal_delete(service: &TrackerService, id: i64, json: bool) -> Result<()> {
    let goal = service.repository().get_goal(id).await?;
    service.delete_goal(&goal).await?;

    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted goal {id}");
    }

    Ok(())
}
