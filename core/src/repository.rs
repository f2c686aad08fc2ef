use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::db::{Database, Table, ops};
use crate::error::{CoreError, Result};
use crate::export::{self, ExportData, ImportSummary};
use crate::live::LiveView;
use crate::models::{Goal, NewGoal, NewWeightEntry, UserProfile, WeightEntry};

const ALL_TABLES: [Table; 3] = [Table::WeightEntries, Table::Goals, Table::UserProfile];

/// Async front door to the store.
///
/// SQLite work runs on the blocking pool. Goal writes go through here so that
/// at most one goal is ever active.
#[derive(Clone)]
pub struct WeightRepository {
    db: Arc<Database>,
}

impl WeightRepository {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db: Arc::new(db) }
    }

    async fn run<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&Database) -> Result<R> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| CoreError::Internal(format!("storage task failed: {e}")))?
    }

    // --- Weight entries ---

    pub async fn insert_entry(&self, entry: NewWeightEntry) -> Result<i64> {
        self.run(move |db| db.insert_weight_entry(&entry)).await
    }

    pub async fn save_entry(&self, entry: WeightEntry) -> Result<i64> {
        self.run(move |db| db.save_weight_entry(&entry)).await
    }

    pub async fn update_entry(&self, entry: WeightEntry) -> Result<()> {
        self.run(move |db| db.update_weight_entry(&entry)).await
    }

    pub async fn delete_entry(&self, id: i64) -> Result<()> {
        self.run(move |db| db.delete_weight_entry(id)).await
    }

    pub async fn delete_all_entries(&self) -> Result<usize> {
        self.run(Database::delete_all_weight_entries).await
    }

    pub async fn get_entry(&self, id: i64) -> Result<WeightEntry> {
        self.run(move |db| db.get_weight_entry(id)).await
    }

    pub async fn all_entries(&self) -> Result<LiveView<Vec<WeightEntry>>> {
        self.run(Database::watch_all_entries).await
    }

    pub async fn entries_since(&self, since: NaiveDateTime) -> Result<LiveView<Vec<WeightEntry>>> {
        self.run(move |db| db.watch_entries_since(since)).await
    }

    pub async fn entries_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<LiveView<Vec<WeightEntry>>> {
        self.run(move |db| db.watch_entries_between(start, end))
            .await
    }

    pub async fn list_entries_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<WeightEntry>> {
        self.run(move |db| db.list_entries_between(start, end)).await
    }

    pub async fn latest_entry(&self) -> Result<LiveView<Option<WeightEntry>>> {
        self.run(Database::watch_latest_entry).await
    }

    pub async fn recent_entries(&self, limit: usize) -> Result<LiveView<Vec<WeightEntry>>> {
        self.run(move |db| db.watch_recent_entries(limit)).await
    }

    // --- Goals ---

    /// Deactivate every goal, then insert `goal` as the active one. Both
    /// steps commit together; readers never see zero or two active goals.
    pub async fn insert_goal(&self, goal: NewGoal) -> Result<i64> {
        let id = self
            .run(move |db| {
                db.write(&[Table::Goals], |tx| {
                    ops::deactivate_goals(tx)?;
                    ops::insert_goal(tx, &goal, true)
                })
            })
            .await?;
        tracing::debug!(id, "activated new goal");
        Ok(id)
    }

    pub async fn update_goal(&self, goal: Goal) -> Result<()> {
        self.run(move |db| {
            db.write(&[Table::Goals], |tx| {
                if goal.is_active {
                    ops::deactivate_goals_except(tx, goal.id)?;
                }
                ops::update_goal(tx, &goal)
            })
        })
        .await
    }

    pub async fn delete_goal(&self, id: i64) -> Result<()> {
        self.run(move |db| db.delete_goal(id)).await
    }

    pub async fn delete_all_goals(&self) -> Result<usize> {
        self.run(Database::delete_all_goals).await
    }

    pub async fn get_goal(&self, id: i64) -> Result<Goal> {
        self.run(move |db| db.get_goal(id)).await
    }

    pub async fn all_goals(&self) -> Result<LiveView<Vec<Goal>>> {
        self.run(Database::watch_all_goals).await
    }

    pub async fn active_goal(&self) -> Result<LiveView<Option<Goal>>> {
        self.run(Database::watch_active_goal).await
    }

    // --- Profile ---

    pub async fn upsert_profile(&self, profile: UserProfile) -> Result<()> {
        self.run(move |db| db.upsert_user_profile(&profile)).await
    }

    pub async fn update_profile(&self, profile: UserProfile) -> Result<()> {
        self.run(move |db| db.update_user_profile(&profile)).await
    }

    pub async fn delete_profile(&self) -> Result<bool> {
        self.run(Database::delete_user_profile).await
    }

    pub async fn user_profile(&self) -> Result<LiveView<Option<UserProfile>>> {
        self.run(Database::watch_user_profile).await
    }

    // --- Backup ---

    pub async fn export_all(&self) -> Result<ExportData> {
        let now = chrono::Local::now().naive_local();
        self.run(move |db| db.read(|conn| export::snapshot(conn, now)))
            .await
    }

    /// Validate `data`, then replace everything in one transaction. On any
    /// failure the store is left as it was.
    pub async fn import_all(&self, data: ExportData) -> Result<ImportSummary> {
        data.validate()?;
        let summary = self
            .run(move |db| db.write(&ALL_TABLES, |tx| export::restore(tx, &data)))
            .await?;
        tracing::debug!(
            entries = summary.weight_entries,
            goals = summary.goals,
            "imported backup"
        );
        Ok(summary)
    }
}
