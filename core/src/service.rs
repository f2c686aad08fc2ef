use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use tokio::task::JoinHandle;

use crate::db::Database;
use crate::error::Result;
use crate::health::{self, HealthDataSource};
use crate::live::{self, LiveView};
use crate::metrics::{self, ChartPeriod, PeriodStats};
use crate::models::{Gender, Goal, NewGoal, NewWeightEntry, UserProfile, WeightEntry, WeightUnit};
use crate::repository::WeightRepository;

/// How many entries the recent-entries view holds.
pub const RECENT_ENTRIES_LIMIT: usize = 10;

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// View state for a UI: live views over the store plus the actions that
/// change it.
///
/// Inputs are assumed valid; run the `models::validate_*` checks first.
/// Dropping the service stops its derived views.
pub struct TrackerService {
    repo: WeightRepository,
    latest_entry: LiveView<Option<WeightEntry>>,
    recent_entries: LiveView<Vec<WeightEntry>>,
    all_entries: LiveView<Vec<WeightEntry>>,
    active_goal: LiveView<Option<Goal>>,
    user_profile: LiveView<Option<UserProfile>>,
    current_bmi: LiveView<Option<f64>>,
    goal_progress: LiveView<f64>,
    tasks: Vec<JoinHandle<()>>,
}

impl TrackerService {
    pub async fn open(path: &Path) -> Result<Self> {
        Self::start(WeightRepository::new(Database::open(path)?)).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        Self::start(WeightRepository::new(Database::open_in_memory()?)).await
    }

    /// Subscribe to the repository and wire up the derived views. Must be
    /// called from within a Tokio runtime.
    pub async fn start(repo: WeightRepository) -> Result<Self> {
        let latest_entry = repo.latest_entry().await?;
        let recent_entries = repo.recent_entries(RECENT_ENTRIES_LIMIT).await?;
        let all_entries = repo.all_entries().await?;
        let active_goal = repo.active_goal().await?;
        let user_profile = repo.user_profile().await?;

        let (current_bmi, bmi_task) = live::combine(&latest_entry, &user_profile, |entry, profile| {
            metrics::current_bmi(entry.as_ref(), profile.as_ref())
        });
        let (goal_progress, progress_task) = live::combine(&latest_entry, &active_goal, |entry, goal| {
            metrics::progress_toward(entry.as_ref(), goal.as_ref())
        });

        Ok(Self {
            repo,
            latest_entry,
            recent_entries,
            all_entries,
            active_goal,
            user_profile,
            current_bmi,
            goal_progress,
            tasks: vec![bmi_task, progress_task],
        })
    }

    #[must_use]
    pub fn repository(&self) -> &WeightRepository {
        &self.repo
    }

    // --- Views ---

    #[must_use]
    pub fn latest_entry(&self) -> LiveView<Option<WeightEntry>> {
        self.latest_entry.clone()
    }

    /// The newest [`RECENT_ENTRIES_LIMIT`] entries, newest first.
    #[must_use]
    pub fn recent_entries(&self) -> LiveView<Vec<WeightEntry>> {
        self.recent_entries.clone()
    }

    #[must_use]
    pub fn all_entries(&self) -> LiveView<Vec<WeightEntry>> {
        self.all_entries.clone()
    }

    #[must_use]
    pub fn active_goal(&self) -> LiveView<Option<Goal>> {
        self.active_goal.clone()
    }

    #[must_use]
    pub fn user_profile(&self) -> LiveView<Option<UserProfile>> {
        self.user_profile.clone()
    }

    /// `None` until there is both an entry and a profile.
    #[must_use]
    pub fn current_bmi(&self) -> LiveView<Option<f64>> {
        self.current_bmi.clone()
    }

    /// Percentage toward the active goal; 0 without an entry or a goal.
    #[must_use]
    pub fn goal_progress(&self) -> LiveView<f64> {
        self.goal_progress.clone()
    }

    /// Entries in `[start, end]`, oldest first.
    pub async fn entries_for_period(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<LiveView<Vec<WeightEntry>>> {
        self.repo.entries_between(start, end).await
    }

    pub async fn period_statistics(&self, period: ChartPeriod) -> Result<Option<PeriodStats>> {
        let now = now();
        let entries = self
            .repo
            .list_entries_between(period.window_start(now), now)
            .await?;
        Ok(metrics::period_statistics(&entries))
    }

    // --- Actions ---

    /// Record a weight stamped now. The entry's BMI comes from the profile
    /// as it is at this moment and is never recomputed.
    pub async fn record_weight(&self, weight_kg: f64, note: impl Into<String>) -> Result<i64> {
        let bmi = self
            .user_profile
            .with(|p| p.as_ref().map(|p| metrics::bmi(weight_kg, p.height_cm)));
        self.repo
            .insert_entry(NewWeightEntry {
                note: note.into(),
                bmi,
                ..NewWeightEntry::now(weight_kg)
            })
            .await
    }

    pub async fn update_entry(&self, entry: WeightEntry) -> Result<()> {
        self.repo.update_entry(entry).await
    }

    pub async fn delete_entry(&self, entry: &WeightEntry) -> Result<()> {
        self.repo.delete_entry(entry.id).await
    }

    /// Start a new goal from the latest weight, replacing any active goal.
    ///
    /// Without any recorded weight there is nothing to start from; nothing is
    /// written and `Ok(None)` is returned.
    pub async fn set_goal(&self, target_weight_kg: f64, target_date: NaiveDate) -> Result<Option<i64>> {
        let Some(start_weight_kg) = self
            .latest_entry
            .with(|e| e.as_ref().map(|e| e.weight_kg))
        else {
            tracing::warn!(target_weight_kg, "no weight recorded yet, goal not set");
            return Ok(None);
        };

        let id = self
            .repo
            .insert_goal(NewGoal {
                target_weight_kg,
                start_weight_kg,
                start_date: now().date(),
                target_date,
            })
            .await?;
        Ok(Some(id))
    }

    pub async fn update_goal(&self, goal: Goal) -> Result<()> {
        self.repo.update_goal(goal).await
    }

    pub async fn delete_goal(&self, goal: &Goal) -> Result<()> {
        self.repo.delete_goal(goal.id).await
    }

    pub async fn save_profile(
        &self,
        height_cm: f64,
        age: u32,
        gender: Gender,
        preferred_unit: WeightUnit,
    ) -> Result<()> {
        self.repo
            .upsert_profile(UserProfile {
                height_cm,
                age,
                gender,
                preferred_unit,
            })
            .await
    }

    // --- Health data ---

    pub fn steps_today(&self, source: &dyn HealthDataSource) -> Result<u64> {
        health::read_today_steps(source).map_err(|e| {
            tracing::warn!(error = %e, "could not read today's steps");
            e.into()
        })
    }

    pub fn steps_for_range(
        &self,
        source: &dyn HealthDataSource,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<u64> {
        health::read_steps_for_range(source, start, end).map_err(|e| {
            tracing::warn!(error = %e, "could not read steps for range");
            e.into()
        })
    }
}

impl Drop for TrackerService {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
