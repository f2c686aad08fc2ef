mod commands;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_export, cmd_goal_delete, cmd_goal_history, cmd_goal_set, cmd_goal_show, cmd_import,
    cmd_profile_clear, cmd_profile_set, cmd_profile_show, cmd_stats, cmd_status, cmd_weight_clear,
    cmd_weight_delete, cmd_weight_edit, cmd_weight_history, cmd_weight_log,
};
use crate::config::Config;
use weightline_core::service::TrackerService;

#[derive(Parser)]
#[command(
    name = "weightline",
    version,
    about = "A simple body-weight tracker CLI",
    long_about = "A simple body-weight tracker CLI.\n\n\
        Log your weight, set a goal and watch your BMI and progress over time.\n\
        Weights are stored in kilograms; pass --unit lbs or set a preferred unit\n\
        in your profile to work in pounds."
)]
struct Cli {
    /// Database file (default: weightline.db in the platform data directory)
    #[arg(long, global = true, env = "WEIGHTLINE_DB", value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track body weight
    Weight {
        #[command(subcommand)]
        command: WeightCommands,
    },
    /// Manage your weight goal
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Manage your profile (height, age, gender, preferred unit)
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Show current weight, BMI and goal progress
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show statistics for a period
    Stats {
        /// Period: week, month, year
        #[arg(short, long, default_value = "month")]
        period: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export all data to a JSON backup file
    Export {
        /// Destination file
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace all data with the contents of a JSON backup file
    Import {
        /// Backup file created by `weightline export`
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum WeightCommands {
    /// Log a weight entry (timestamped now)
    Log {
        /// Weight value (number)
        value: f64,
        /// Unit: kg or lbs (default: profile's preferred unit, else kg)
        #[arg(short, long)]
        unit: Option<String>,
        /// Optional note
        #[arg(short, long)]
        note: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List weight entries, newest first
    History {
        /// Only entries from the last N days
        #[arg(short, long)]
        days: Option<u32>,
        /// Show at most N entries
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change the weight or note of an entry
    Edit {
        /// Entry ID
        id: i64,
        /// New weight value
        #[arg(short, long)]
        weight: Option<f64>,
        /// Unit for --weight: kg or lbs
        #[arg(short, long)]
        unit: Option<String>,
        /// New note
        #[arg(short, long)]
        note: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a weight entry by ID
    Delete {
        /// Entry ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every weight entry
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GoalCommands {
    /// Set a new goal, starting from your latest weight
    Set {
        /// Target weight
        target: f64,
        /// Target date (YYYY-MM-DD or today/tomorrow)
        #[arg(long)]
        by: String,
        /// Unit: kg or lbs (default: profile's preferred unit, else kg)
        #[arg(short, long)]
        unit: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the active goal and progress
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all goals, newest first
    History {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a goal by ID
    Delete {
        /// Goal ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Set your profile (replaces any existing one)
    Set {
        /// Height in centimetres
        #[arg(long)]
        height: f64,
        /// Age in years
        #[arg(long)]
        age: i64,
        /// Gender: male, female
        #[arg(long)]
        gender: String,
        /// Preferred display unit: kg or lbs
        #[arg(short, long, default_value = "kg")]
        unit: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show your profile and current BMI
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove your profile
    Clear {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.db)?;
    let service = TrackerService::open(&config.db_path)
        .await
        .with_context(|| format!("Failed to open database: {}", config.db_path.display()))?;
    tracing::debug!(path = %config.db_path.display(), "database ready");

    match cli.command {
        Commands::Weight { command } => match command {
            WeightCommands::Log {
                value,
                unit,
                note,
                json,
            } => cmd_weight_log(&service, value, unit.as_deref(), note, json).await,
            WeightCommands::History { days, limit, json } => {
                cmd_weight_history(&service, days, limit, json).await
            }
            WeightCommands::Edit {
                id,
                weight,
                unit,
                note,
                json,
            } => cmd_weight_edit(&service, id, weight, unit.as_deref(), note, json).await,
            WeightCommands::Delete { id, json } => cmd_weight_delete(&service, id, json).await,
            WeightCommands::Clear { yes, json } => cmd_weight_clear(&service, yes, json).await,
        },
        Commands::Goal { command } => match command {
            GoalCommands::Set {
                target,
                by,
                unit,
                json,
            } => cmd_goal_set(&service, target, unit.as_deref(), &by, json).await,
            GoalCommands::Show { json } => cmd_goal_show(&service, json),
            GoalCommands::History { json } => cmd_goal_history(&service, json).await,
            GoalCommands::Delete { id, json } => cmd_goal_delete(&service, id, json).await,
        },
        Commands::Profile { command } => match command {
            ProfileCommands::Set {
                height,
                age,
                gender,
                unit,
                json,
            } => cmd_profile_set(&service, height, age, &gender, &unit, json).await,
            ProfileCommands::Show { json } => cmd_profile_show(&service, json),
            ProfileCommands::Clear { json } => cmd_profile_clear(&service, json).await,
        },
        Commands::Status { json } => cmd_status(&service, json),
        Commands::Stats { period, json } => cmd_stats(&service, &period, json).await,
        Commands::Export { file, json } => cmd_export(&service, &file, json).await,
        Commands::Import { file, json } => cmd_import(&service, &file, json).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_weight_log_with_global_db() {
        let cli = Cli::try_parse_from([
            "weightline", "weight", "log", "72.5", "--unit", "kg", "--db", "/tmp/w.db",
        ])
        .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/w.db")));
        assert!(matches!(
            cli.command,
            Commands::Weight {
                command: WeightCommands::Log { .. }
            }
        ));
    }

    #[test]
    fn test_goal_set_requires_date() {
        assert!(Cli::try_parse_from(["weightline", "goal", "set", "70"]).is_err());
    }
}
