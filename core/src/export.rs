//! Whole-database backup and restore.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::ops;
use crate::error::{CoreError, Result};
use crate::models::{Goal, UserProfile, WeightEntry, validate_goal, validate_profile};

pub const EXPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportData {
    pub version: u32,
    pub exported_at: NaiveDateTime,
    pub weight_entries: Vec<WeightEntry>,
    pub goals: Vec<Goal>,
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub weight_entries: usize,
    pub goals: usize,
    pub profile: bool,
}

impl ExportData {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reject anything the store would refuse or the UI could not display.
    pub fn validate(&self) -> Result<()> {
        if self.version > EXPORT_VERSION {
            return Err(CoreError::validation(format!(
                "Backup version {} is newer than supported version {EXPORT_VERSION}",
                self.version
            )));
        }
        let mut entry_ids = HashSet::new();
        for entry in &self.weight_entries {
            if !entry_ids.insert(entry.id) {
                return Err(CoreError::validation(format!(
                    "Backup has more than one weight entry with id {}",
                    entry.id
                )));
            }
            if !entry.weight_kg.is_finite() || entry.weight_kg <= 0.0 {
                return Err(CoreError::validation(format!(
                    "Weight entry {} has a non-positive weight",
                    entry.id
                )));
            }
        }
        let mut goal_ids = HashSet::new();
        for goal in &self.goals {
            if !goal_ids.insert(goal.id) {
                return Err(CoreError::validation(format!(
                    "Backup has more than one goal with id {}",
                    goal.id
                )));
            }
            validate_goal(goal)?;
        }
        let active = self.goals.iter().filter(|g| g.is_active).count();
        if active > 1 {
            return Err(CoreError::validation(format!(
                "Backup has {active} active goals, at most one is allowed"
            )));
        }
        if let Some(profile) = &self.profile {
            validate_profile(profile)?;
        }
        Ok(())
    }
}

pub(crate) fn snapshot(conn: &Connection, exported_at: NaiveDateTime) -> Result<ExportData> {
    Ok(ExportData {
        version: EXPORT_VERSION,
        exported_at,
        weight_entries: ops::all_entries(conn)?,
        goals: ops::all_goals(conn)?,
        profile: ops::user_profile(conn)?,
    })
}

/// Replace every table with the backup's contents, keeping ids.
/// Must run inside a transaction.
pub(crate) fn restore(conn: &Connection, data: &ExportData) -> Result<ImportSummary> {
    ops::delete_all_entries(conn)?;
    ops::delete_all_goals(conn)?;
    ops::delete_profile(conn)?;

    for entry in &data.weight_entries {
        ops::replace_entry(conn, entry)?;
    }
    for goal in &data.goals {
        ops::replace_goal(conn, goal)?;
    }
    if let Some(profile) = &data.profile {
        ops::upsert_profile(conn, profile)?;
    }

    Ok(ImportSummary {
        weight_entries: data.weight_entries.len(),
        goals: data.goals.len(),
        profile: data.profile.is_some(),
    })
}
