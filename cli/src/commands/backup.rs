use std::path::Path;

use anyhow::{Context, Result};

use weightline_core::export::ExportData;
use weightline_core::service::TrackerService;

pub(crate) async fn cmd_export(service: &TrackerService, path: &Path, json: bool) -> Result<()> {
    let data = service
        .repository()
        .export_all()
        .await
        .context("Failed to export data")?;
    std::fs::write(path, data.to_json()?)
        .with_context(|| format!("Failed to write file: {}", path.display()))?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "file": path.display().to_string(),
                "weight_entries": data.weight_entries.len(),
                "goals": data.goals.len(),
                "profile": data.profile.is_some(),
            })
        );
    } else {
        println!("Exported to {}\n", path.display());
        println!("  Weight entries: {}", data.weight_entries.len());
        println!("  Goals:          {}", data.goals.len());
        println!(
            "  Profile:        {}",
            if data.profile.is_some() { "yes" } else { "no" }
        );
    }

    Ok(())
}

pub(crate) async fn cmd_import(service: &TrackerService, path: &Path, json: bool) -> Result<()> {
    let input = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    let data = ExportData::from_json(&input)
        .with_context(|| format!("Not a weightline backup: {}", path.display()))?;

    let summary = service
        .repository()
        .import_all(data)
        .await
        .context("Failed to import data")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Import complete. Existing data was replaced.\n");
        println!("  Weight entries: {}", summary.weight_entries);
        println!("  Goals:          {}", summary.goals);
        println!(
            "  Profile:        {}",
            if summary.profile { "yes" } else { "no" }
        );
    }

    Ok(())
}
