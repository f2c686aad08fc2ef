use anyhow::{Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use weightline_core::metrics::{bmi_category, kg_to_lbs};
use weightline_core::models::{WeightEntry, WeightUnit};
use weightline_core::service::TrackerService;

use super::helpers::{fmt_weight, parse_weight, resolve_unit, truncate};

fn print_entry(entry: &WeightEntry, unit: WeightUnit) {
    println!(
        "{}: {}",
        entry.timestamp.format("%Y-%m-%d %H:%M"),
        fmt_weight(entry.weight_kg, unit)
    );
    if let Some(bmi) = entry.bmi {
        println!("  BMI: {bmi:.1} ({})", bmi_category(bmi));
    }
    if !entry.note.is_empty() {
        println!("  Note: {}", entry.note);
    }
}

pub(crate) async fn cmd_weight_log(
    service: &TrackerService,
    value: f64,
    unit: Option<&str>,
    note: Option<String>,
    json: bool,
) -> Result<()> {
    let unit = resolve_unit(service, unit)?;
    let weight_kg = parse_weight(value, unit)?;
    if unit == WeightUnit::Lbs {
        eprintln!("Converting {value:.1} lbs → {weight_kg:.2} kg");
    }

    let id = service
        .record_weight(weight_kg, note.unwrap_or_default())
        .await?;
    let entry = service.repository().get_entry(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print!("Logged ");
        print_entry(&entry, unit);
    }

    Ok(())
}

pub(crate) async fn cmd_weight_history(
    service: &TrackerService,
    days: Option<u32>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let mut entries = match days {
        Some(d) => {
            let since = chrono::Local::now().naive_local() - chrono::Duration::days(i64::from(d));
            service.repository().entries_since(since).await?.get()
        }
        None => service.all_entries().get(),
    };
    if let Some(n) = limit {
        entries.truncate(n);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        eprintln!("No weight entries found. Use `weightline weight log` to record your weight.");
    } else {
        #[derive(Tabled)]
        struct WeightRow {
            #[tabled(rename = "ID")]
            id: i64,
            #[tabled(rename = "Date")]
            date: String,
            #[tabled(rename = "Weight (kg)")]
            kg: String,
            #[tabled(rename = "Weight (lbs)")]
            lbs: String,
            #[tabled(rename = "BMI")]
            bmi: String,
            #[tabled(rename = "Note")]
            note: String,
        }

        let rows: Vec<WeightRow> = entries
            .iter()
            .map(|e| WeightRow {
                id: e.id,
                date: e.timestamp.format("%Y-%m-%d %H:%M").to_string(),
                kg: format!("{:.1}", e.weight_kg),
                lbs: format!("{:.1}", kg_to_lbs(e.weight_kg)),
                bmi: e.bmi.map_or("-".into(), |b| format!("{b:.1}")),
                note: truncate(&e.note, 30),
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(2..5)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    Ok(())
}

pub(crate) async fn cmd_weight_edit(
    service: &TrackerService,
    id: i64,
    weight: Option<f64>,
    unit: Option<&str>,
    note: Option<String>,
    json: bool,
) -> Result<()> {
    if weight.is_none() && note.is_none() {
        bail!("Nothing to change. Pass --weight and/or --note");
    }

    let unit = resolve_unit(service, unit)?;
    let mut entry = service.repository().get_entry(id).await?;
    if let Some(value) = weight {
        entry.weight_kg = parse_weight(value, unit)?;
    }
    if let Some(note) = note {
        entry.note = note;
    }
    service.update_entry(entry.clone()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print!("Updated ");
        print_entry(&entry, unit);
    }

    Ok(())
}

pub(crate) async fn cmd_weight_delete(service: &TrackerService, id: i64, json: bool) -> Result<()> {
    let entry = service.repository().get_entry(id).await?;
    service.delete_entry(&entry).await?;

    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted weight entry {id}");
    }

    Ok(())
}

pub(crate) async fn cmd_weight_clear(service: &TrackerService, yes: bool, json: bool) -> Result<()> {
    if !yes {
        bail!("This deletes every weight entry. Re-run with --yes to confirm");
    }
    let deleted = service.repository().delete_all_entries().await?;

    if json {
        println!("{}", serde_json::json!({ "deleted": deleted }));
    } else {
        println!("Deleted {deleted} weight entries");
    }

    Ok(())
}
