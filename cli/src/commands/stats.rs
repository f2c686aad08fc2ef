use anyhow::Result;
use serde::Serialize;

use weightline_core::metrics::{ChartPeriod, PeriodStats};
use weightline_core::service::TrackerService;

use super::helpers::{fmt_weight, no_neg_zero, resolve_unit};

#[derive(Serialize)]
struct StatsOutput {
    period: ChartPeriod,
    stats: Option<PeriodStats>,
}

pub(crate) async fn cmd_stats(service: &TrackerService, period: &str, json: bool) -> Result<()> {
    let period: ChartPeriod = period.parse()?;
    let stats = service.period_statistics(period).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&StatsOutput { period, stats })?
        );
        return Ok(());
    }

    let Some(stats) = stats else {
        eprintln!("No weight entries in the last {}.", period.as_str());
        return Ok(());
    };

    let unit = resolve_unit(service, None)?;
    let change = no_neg_zero(unit.from_kg(stats.change));
    println!("Last {} ({} entries)", period.as_str(), stats.count);
    println!("  Start:   {}", fmt_weight(stats.start, unit));
    println!("  Current: {}", fmt_weight(stats.current, unit));
    println!("  Change:  {change:+.1} {unit}");
    println!("  Min:     {}", fmt_weight(stats.min, unit));
    println!("  Max:     {}", fmt_weight(stats.max, unit));
    println!("  Average: {}", fmt_weight(stats.average, unit));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stats_period_parsing() {
        let service = TrackerService::open_in_memory().await.unwrap();
        cmd_stats(&service, "week", true).await.unwrap();
        cmd_stats(&service, "Year", false).await.unwrap();
        assert!(cmd_stats(&service, "decade", true).await.is_err());
    }
}
