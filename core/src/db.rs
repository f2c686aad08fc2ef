use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDateTime;
use rusqlite::{Connection, Transaction};

use crate::error::{CoreError, Result};
use crate::live::{self, LiveView};
use crate::models::{Goal, NewWeightEntry, UserProfile, WeightEntry};

/// Tables a write can touch. Live queries are keyed by the table they read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    WeightEntries,
    Goals,
    UserProfile,
}

/// Re-runs one live query and pushes the result. Returns `false` once the
/// query has no subscribers left, so it can be dropped.
type Refresh = Box<dyn FnMut(&Connection) -> bool + Send>;

struct Watcher {
    table: Table,
    refresh: Refresh,
    closed: Box<dyn Fn() -> bool + Send>,
}

impl Watcher {
    fn is_closed(&self) -> bool {
        (self.closed)()
    }
}

/// The single owner of all persisted state.
///
/// Every write runs inside one transaction and, once committed, refreshes
/// the live queries over the tables it touched before the connection lock is
/// released. Writers are therefore totally ordered and subscribers observe
/// them in that order, one committed state at a time.
pub struct Database {
    conn: Mutex<Connection>,
    watchers: Mutex<Vec<Watcher>>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        migrate(&conn)?;
        tracing::debug!(path = %path.display(), "opened database");
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrate(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            watchers: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Internal("database mutex poisoned".to_string()))
    }

    // --- Primitives ---

    /// Run `f` against a consistent snapshot.
    pub fn read<R>(&self, f: impl FnOnce(&Connection) -> Result<R>) -> Result<R> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` inside one transaction, then refresh every live query over
    /// `tables`. If `f` fails the transaction rolls back and no subscriber
    /// is woken.
    pub fn write<R>(
        &self,
        tables: &[Table],
        f: impl FnOnce(&Transaction<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        self.refresh(&conn, tables);
        Ok(out)
    }

    /// Register a live query over `table`. The query runs once now and again
    /// after every write to `table`, for as long as the view has subscribers.
    pub fn live<T, Q>(&self, table: Table, query: Q) -> Result<LiveView<T>>
    where
        T: PartialEq + Send + Sync + 'static,
        Q: Fn(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        // Holding the connection lock while registering means no write can
        // land between the initial query and the first refresh.
        let conn = self.lock()?;
        let initial = query(&conn)?;
        let (tx, view) = live::channel(initial);
        let tx = Arc::new(tx);
        let closed: Box<dyn Fn() -> bool + Send> = {
            let tx = Arc::clone(&tx);
            Box::new(move || tx.is_closed())
        };

        let refresh: Refresh = Box::new(move |conn| {
            if tx.is_closed() {
                return false;
            }
            match query(conn) {
                Ok(value) => {
                    live::publish(&tx, value);
                }
                Err(e) => {
                    tracing::warn!(?table, error = %e, "live query refresh failed, keeping last value");
                }
            }
            true
        });

        let mut watchers = self
            .watchers
            .lock()
            .map_err(|_| CoreError::Internal("watcher registry poisoned".to_string()))?;
        // Views dropped since the last write to their table go now, so
        // one-shot views cannot pile up between writes.
        watchers.retain(|w| !w.is_closed());
        watchers.push(Watcher {
            table,
            refresh,
            closed,
        });
        drop(watchers);
        drop(conn);
        Ok(view)
    }

    fn refresh(&self, conn: &Connection, tables: &[Table]) {
        let Ok(mut watchers) = self.watchers.lock() else {
            tracing::error!("watcher registry poisoned, live views not refreshed");
            return;
        };
        watchers.retain_mut(|w| {
            !w.is_closed() && (!tables.contains(&w.table) || (w.refresh)(conn))
        });
    }

    // --- Weight entries ---

    pub fn insert_weight_entry(&self, entry: &NewWeightEntry) -> Result<i64> {
        let id = self.write(&[Table::WeightEntries], |tx| ops::insert_entry(tx, entry))?;
        tracing::debug!(id, weight_kg = entry.weight_kg, "inserted weight entry");
        Ok(id)
    }

    /// Insert, or replace the entry that already has this id.
    pub fn save_weight_entry(&self, entry: &WeightEntry) -> Result<i64> {
        self.write(&[Table::WeightEntries], |tx| ops::replace_entry(tx, entry))
    }

    pub fn update_weight_entry(&self, entry: &WeightEntry) -> Result<()> {
        self.write(&[Table::WeightEntries], |tx| ops::update_entry(tx, entry))
    }

    pub fn delete_weight_entry(&self, id: i64) -> Result<()> {
        self.write(&[Table::WeightEntries], |tx| ops::delete_entry(tx, id))?;
        tracing::debug!(id, "deleted weight entry");
        Ok(())
    }

    pub fn delete_all_weight_entries(&self) -> Result<usize> {
        self.write(&[Table::WeightEntries], |tx| ops::delete_all_entries(tx))
    }

    pub fn get_weight_entry(&self, id: i64) -> Result<WeightEntry> {
        self.read(|conn| ops::entry_by_id(conn, id))
    }

    /// Entries in `[start, end]`, oldest first, read once.
    pub fn list_entries_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<WeightEntry>> {
        self.read(|conn| Ok(ops::entries_between(conn, start, end)?))
    }

    pub fn watch_all_entries(&self) -> Result<LiveView<Vec<WeightEntry>>> {
        self.live(Table::WeightEntries, ops::all_entries)
    }

    pub fn watch_entries_since(&self, since: NaiveDateTime) -> Result<LiveView<Vec<WeightEntry>>> {
        self.live(Table::WeightEntries, move |conn| {
            ops::entries_since(conn, since)
        })
    }

    pub fn watch_entries_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<LiveView<Vec<WeightEntry>>> {
        self.live(Table::WeightEntries, move |conn| {
            ops::entries_between(conn, start, end)
        })
    }

    pub fn watch_latest_entry(&self) -> Result<LiveView<Option<WeightEntry>>> {
        self.live(Table::WeightEntries, ops::latest_entry)
    }

    pub fn watch_recent_entries(&self, limit: usize) -> Result<LiveView<Vec<WeightEntry>>> {
        self.live(Table::WeightEntries, move |conn| {
            ops::recent_entries(conn, limit)
        })
    }

    // --- Goals ---
    //
    // These write rows as given. Keeping a single active goal is the
    // repository's job; the partial unique index rejects a second one here.

    pub fn save_goal(&self, goal: &Goal) -> Result<i64> {
        self.write(&[Table::Goals], |tx| ops::replace_goal(tx, goal))
    }

    pub fn update_goal(&self, goal: &Goal) -> Result<()> {
        self.write(&[Table::Goals], |tx| ops::update_goal(tx, goal))
    }

    pub fn delete_goal(&self, id: i64) -> Result<()> {
        self.write(&[Table::Goals], |tx| ops::delete_goal(tx, id))
    }

    pub fn delete_all_goals(&self) -> Result<usize> {
        self.write(&[Table::Goals], |tx| ops::delete_all_goals(tx))
    }

    pub fn get_goal(&self, id: i64) -> Result<Goal> {
        self.read(|conn| ops::goal_by_id(conn, id))
    }

    pub fn watch_all_goals(&self) -> Result<LiveView<Vec<Goal>>> {
        self.live(Table::Goals, ops::all_goals)
    }

    pub fn watch_active_goal(&self) -> Result<LiveView<Option<Goal>>> {
        self.live(Table::Goals, ops::active_goal)
    }

    // --- Profile ---

    pub fn upsert_user_profile(&self, profile: &UserProfile) -> Result<()> {
        self.write(&[Table::UserProfile], |tx| ops::upsert_profile(tx, profile))
    }

    pub fn update_user_profile(&self, profile: &UserProfile) -> Result<()> {
        self.write(&[Table::UserProfile], |tx| ops::update_profile(tx, profile))
    }

    pub fn delete_user_profile(&self) -> Result<bool> {
        self.write(&[Table::UserProfile], |tx| ops::delete_profile(tx))
    }

    pub fn get_user_profile(&self) -> Result<Option<UserProfile>> {
        self.read(|conn| Ok(ops::user_profile(conn)?))
    }

    pub fn watch_user_profile(&self) -> Result<LiveView<Option<UserProfile>>> {
        self.live(Table::UserProfile, ops::user_profile)
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS weight_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                weight_kg REAL NOT NULL CHECK (weight_kg > 0),
                timestamp TEXT NOT NULL,
                note TEXT NOT NULL DEFAULT '',
                bmi REAL
            );
            CREATE INDEX IF NOT EXISTS idx_weight_entries_timestamp ON weight_entries(timestamp);

            CREATE TABLE IF NOT EXISTS goals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                target_weight_kg REAL NOT NULL,
                start_weight_kg REAL NOT NULL,
                start_date TEXT NOT NULL,
                target_date TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_goals_single_active
                ON goals(is_active) WHERE is_active = 1;

            CREATE TABLE IF NOT EXISTS user_profile (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                height_cm REAL NOT NULL,
                age INTEGER NOT NULL,
                gender TEXT NOT NULL,
                preferred_unit TEXT NOT NULL DEFAULT 'kg'
            );

            PRAGMA user_version = 1;",
        )?;
    }

    Ok(())
}

/// Parse a text column through `FromStr`, reporting failures as conversion errors.
fn text_column<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Row-level statements. They take a plain connection so callers can
/// compose several of them inside one [`Database::write`] transaction.
pub(crate) mod ops {
    use chrono::{NaiveDate, NaiveDateTime};
    use rusqlite::{Connection, OptionalExtension, Params, params};

    use super::text_column;
    use crate::error::{CoreError, Result};
    use crate::models::{
        DATE_FORMAT, Goal, NewGoal, NewWeightEntry, PROFILE_ID, TIMESTAMP_FORMAT, UserProfile,
        WeightEntry,
    };

    const ENTRY_COLUMNS: &str = "id, weight_kg, timestamp, note, bmi";
    const GOAL_COLUMNS: &str =
        "id, target_weight_kg, start_weight_kg, start_date, target_date, is_active";

    fn ts(t: NaiveDateTime) -> String {
        t.format(TIMESTAMP_FORMAT).to_string()
    }

    fn day(d: NaiveDate) -> String {
        d.format(DATE_FORMAT).to_string()
    }

    fn entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<WeightEntry> {
        Ok(WeightEntry {
            id: row.get(0)?,
            weight_kg: row.get(1)?,
            timestamp: text_column(row, 2)?,
            note: row.get(3)?,
            bmi: row.get(4)?,
        })
    }

    fn goal_from_row(row: &rusqlite::Row) -> rusqlite::Result<Goal> {
        Ok(Goal {
            id: row.get(0)?,
            target_weight_kg: row.get(1)?,
            start_weight_kg: row.get(2)?,
            start_date: text_column(row, 3)?,
            target_date: text_column(row, 4)?,
            is_active: row.get(5)?,
        })
    }

    fn profile_from_row(row: &rusqlite::Row) -> rusqlite::Result<UserProfile> {
        Ok(UserProfile {
            height_cm: row.get(0)?,
            age: row.get(1)?,
            gender: text_column(row, 2)?,
            preferred_unit: text_column(row, 3)?,
        })
    }

    fn query_entries(
        conn: &Connection,
        filter: &str,
        params: impl Params,
    ) -> rusqlite::Result<Vec<WeightEntry>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM weight_entries {filter}"
        ))?;
        stmt.query_map(params, entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
    }

    fn sql_limit(limit: usize) -> i64 {
        i64::try_from(limit).unwrap_or(i64::MAX)
    }

    // --- Weight entry queries ---

    pub(crate) fn all_entries(conn: &Connection) -> rusqlite::Result<Vec<WeightEntry>> {
        query_entries(conn, "ORDER BY timestamp DESC, id DESC", [])
    }

    pub(crate) fn entries_since(
        conn: &Connection,
        since: NaiveDateTime,
    ) -> rusqlite::Result<Vec<WeightEntry>> {
        query_entries(
            conn,
            "WHERE timestamp >= ?1 ORDER BY timestamp DESC, id DESC",
            params![ts(since)],
        )
    }

    /// Inclusive on both ends, oldest first.
    pub(crate) fn entries_between(
        conn: &Connection,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> rusqlite::Result<Vec<WeightEntry>> {
        query_entries(
            conn,
            "WHERE timestamp BETWEEN ?1 AND ?2 ORDER BY timestamp ASC, id ASC",
            params![ts(start), ts(end)],
        )
    }

    pub(crate) fn latest_entry(conn: &Connection) -> rusqlite::Result<Option<WeightEntry>> {
        Ok(recent_entries(conn, 1)?.into_iter().next())
    }

    pub(crate) fn recent_entries(
        conn: &Connection,
        limit: usize,
    ) -> rusqlite::Result<Vec<WeightEntry>> {
        query_entries(
            conn,
            "ORDER BY timestamp DESC, id DESC LIMIT ?1",
            params![sql_limit(limit)],
        )
    }

    pub(crate) fn entry_by_id(conn: &Connection, id: i64) -> Result<WeightEntry> {
        conn.query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM weight_entries WHERE id = ?1"),
            params![id],
            entry_from_row,
        )
        .optional()?
        .ok_or_else(|| CoreError::not_found(format!("Weight entry {id}")))
    }

    // --- Weight entry writes ---

    pub(crate) fn insert_entry(conn: &Connection, entry: &NewWeightEntry) -> Result<i64> {
        conn.execute(
            "INSERT INTO weight_entries (weight_kg, timestamp, note, bmi) VALUES (?1, ?2, ?3, ?4)",
            params![entry.weight_kg, ts(entry.timestamp), entry.note, entry.bmi],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub(crate) fn replace_entry(conn: &Connection, entry: &WeightEntry) -> Result<i64> {
        conn.execute(
            "INSERT INTO weight_entries (id, weight_kg, timestamp, note, bmi)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                weight_kg = excluded.weight_kg,
                timestamp = excluded.timestamp,
                note = excluded.note,
                bmi = excluded.bmi",
            params![
                entry.id,
                entry.weight_kg,
                ts(entry.timestamp),
                entry.note,
                entry.bmi
            ],
        )?;
        Ok(entry.id)
    }

    pub(crate) fn update_entry(conn: &Connection, entry: &WeightEntry) -> Result<()> {
        let rows = conn.execute(
            "UPDATE weight_entries SET weight_kg = ?1, timestamp = ?2, note = ?3, bmi = ?4
             WHERE id = ?5",
            params![
                entry.weight_kg,
                ts(entry.timestamp),
                entry.note,
                entry.bmi,
                entry.id
            ],
        )?;
        if rows == 0 {
            return Err(CoreError::not_found(format!("Weight entry {}", entry.id)));
        }
        Ok(())
    }

    pub(crate) fn delete_entry(conn: &Connection, id: i64) -> Result<()> {
        let rows = conn.execute("DELETE FROM weight_entries WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(CoreError::not_found(format!("Weight entry {id}")));
        }
        Ok(())
    }

    pub(crate) fn delete_all_entries(conn: &Connection) -> Result<usize> {
        Ok(conn.execute("DELETE FROM weight_entries", [])?)
    }

    // --- Goal queries ---

    pub(crate) fn all_goals(conn: &Connection) -> rusqlite::Result<Vec<Goal>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals ORDER BY start_date DESC, id DESC"
        ))?;
        stmt.query_map([], goal_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
    }

    pub(crate) fn active_goal(conn: &Connection) -> rusqlite::Result<Option<Goal>> {
        conn.query_row(
            &format!("SELECT {GOAL_COLUMNS} FROM goals WHERE is_active = 1 LIMIT 1"),
            [],
            goal_from_row,
        )
        .optional()
    }

    pub(crate) fn goal_by_id(conn: &Connection, id: i64) -> Result<Goal> {
        conn.query_row(
            &format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?1"),
            params![id],
            goal_from_row,
        )
        .optional()?
        .ok_or_else(|| CoreError::not_found(format!("Goal {id}")))
    }

    // --- Goal writes ---

    pub(crate) fn deactivate_goals(conn: &Connection) -> Result<usize> {
        Ok(conn.execute("UPDATE goals SET is_active = 0 WHERE is_active = 1", [])?)
    }

    pub(crate) fn deactivate_goals_except(conn: &Connection, keep_id: i64) -> Result<usize> {
        Ok(conn.execute(
            "UPDATE goals SET is_active = 0 WHERE is_active = 1 AND id != ?1",
            params![keep_id],
        )?)
    }

    pub(crate) fn insert_goal(conn: &Connection, goal: &NewGoal, active: bool) -> Result<i64> {
        conn.execute(
            "INSERT INTO goals (target_weight_kg, start_weight_kg, start_date, target_date, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                goal.target_weight_kg,
                goal.start_weight_kg,
                day(goal.start_date),
                day(goal.target_date),
                active
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub(crate) fn replace_goal(conn: &Connection, goal: &Goal) -> Result<i64> {
        // Only an id collision updates in place; a second active goal still
        // trips the partial unique index.
        conn.execute(
            &format!(
                "INSERT INTO goals ({GOAL_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    target_weight_kg = excluded.target_weight_kg,
                    start_weight_kg = excluded.start_weight_kg,
                    start_date = excluded.start_date,
                    target_date = excluded.target_date,
                    is_active = excluded.is_active"
            ),
            params![
                goal.id,
                goal.target_weight_kg,
                goal.start_weight_kg,
                day(goal.start_date),
                day(goal.target_date),
                goal.is_active
            ],
        )?;
        Ok(goal.id)
    }

    pub(crate) fn update_goal(conn: &Connection, goal: &Goal) -> Result<()> {
        let rows = conn.execute(
            "UPDATE goals SET target_weight_kg = ?1, start_weight_kg = ?2, start_date = ?3,
                    target_date = ?4, is_active = ?5
             WHERE id = ?6",
            params![
                goal.target_weight_kg,
                goal.start_weight_kg,
                day(goal.start_date),
                day(goal.target_date),
                goal.is_active,
                goal.id
            ],
        )?;
        if rows == 0 {
            return Err(CoreError::not_found(format!("Goal {}", goal.id)));
        }
        Ok(())
    }

    pub(crate) fn delete_goal(conn: &Connection, id: i64) -> Result<()> {
        let rows = conn.execute("DELETE FROM goals WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(CoreError::not_found(format!("Goal {id}")));
        }
        Ok(())
    }

    pub(crate) fn delete_all_goals(conn: &Connection) -> Result<usize> {
        Ok(conn.execute("DELETE FROM goals", [])?)
    }

    // --- Profile ---

    pub(crate) fn user_profile(conn: &Connection) -> rusqlite::Result<Option<UserProfile>> {
        conn.query_row(
            "SELECT height_cm, age, gender, preferred_unit FROM user_profile WHERE id = ?1",
            params![PROFILE_ID],
            profile_from_row,
        )
        .optional()
    }

    pub(crate) fn upsert_profile(conn: &Connection, profile: &UserProfile) -> Result<()> {
        conn.execute(
            "INSERT INTO user_profile (id, height_cm, age, gender, preferred_unit)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                height_cm = excluded.height_cm,
                age = excluded.age,
                gender = excluded.gender,
                preferred_unit = excluded.preferred_unit",
            params![
                PROFILE_ID,
                profile.height_cm,
                profile.age,
                profile.gender.as_str(),
                profile.preferred_unit.as_str()
            ],
        )?;
        Ok(())
    }

    pub(crate) fn update_profile(conn: &Connection, profile: &UserProfile) -> Result<()> {
        let rows = conn.execute(
            "UPDATE user_profile SET height_cm = ?1, age = ?2, gender = ?3, preferred_unit = ?4
             WHERE id = ?5",
            params![
                profile.height_cm,
                profile.age,
                profile.gender.as_str(),
                profile.preferred_unit.as_str(),
                PROFILE_ID
            ],
        )?;
        if rows == 0 {
            return Err(CoreError::not_found("User profile"));
        }
        Ok(())
    }

    pub(crate) fn delete_profile(conn: &Connection) -> Result<bool> {
        Ok(conn.execute("DELETE FROM user_profile", [])? > 0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::{Gender, NewGoal, WeightUnit};

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn sample_entry(day: u32, weight_kg: f64) -> NewWeightEntry {
        NewWeightEntry {
            weight_kg,
            timestamp: at(day, 7),
            note: String::new(),
            bmi: None,
        }
    }

    fn sample_profile(height_cm: f64) -> UserProfile {
        UserProfile {
            height_cm,
            age: 34,
            gender: Gender::Female,
            preferred_unit: WeightUnit::Kg,
        }
    }

    fn sample_goal(id: i64, active: bool) -> Goal {
        Goal {
            id,
            target_weight_kg: 65.0,
            start_weight_kg: 72.0,
            start_date: NaiveDate::from_ymd_opt(2025, 1, u32::try_from(id).unwrap()).unwrap(),
            target_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            is_active: active,
        }
    }

    fn count_active_goals(db: &Database) -> i64 {
        db.read(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM goals WHERE is_active = 1", [], |r| {
                r.get(0)
            })?)
        })
        .unwrap()
    }

    #[test]
    fn test_insert_and_get_weight_entry() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .insert_weight_entry(&NewWeightEntry {
                weight_kg: 72.4,
                timestamp: at(3, 8),
                note: "after run".to_string(),
                bmi: Some(23.6),
            })
            .unwrap();

        let entry = db.get_weight_entry(id).unwrap();
        assert_eq!(entry.id, id);
        assert!((entry.weight_kg - 72.4).abs() < f64::EPSILON);
        assert_eq!(entry.timestamp, at(3, 8));
        assert_eq!(entry.note, "after run");
        assert_eq!(entry.bmi, Some(23.6));
    }

    #[test]
    fn test_timestamp_keeps_milliseconds() {
        let db = Database::open_in_memory().unwrap();
        let ts = NaiveDate::from_ymd_opt(2025, 1, 3)
            .unwrap()
            .and_hms_milli_opt(8, 15, 30, 250)
            .unwrap();
        let id = db
            .insert_weight_entry(&NewWeightEntry {
                timestamp: ts,
                ..sample_entry(3, 70.0)
            })
            .unwrap();
        assert_eq!(db.get_weight_entry(id).unwrap().timestamp, ts);
    }

    #[test]
    fn test_get_weight_entry_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db.get_weight_entry(99).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_non_positive_weight_is_storage_error() {
        let db = Database::open_in_memory().unwrap();
        let err = db.insert_weight_entry(&sample_entry(1, 0.0)).unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
    }

    #[test]
    fn test_all_entries_descending() {
        let db = Database::open_in_memory().unwrap();
        for (day, w) in [(2, 71.0), (5, 70.0), (1, 72.0)] {
            db.insert_weight_entry(&sample_entry(day, w)).unwrap();
        }
        let all = db.watch_all_entries().unwrap().get();
        let days: Vec<_> = all.iter().map(|e| e.timestamp).collect();
        assert_eq!(days, vec![at(5, 7), at(2, 7), at(1, 7)]);
    }

    #[test]
    fn test_entries_since_and_between() {
        let db = Database::open_in_memory().unwrap();
        for day in 1..=6 {
            db.insert_weight_entry(&sample_entry(day, 70.0 + f64::from(day)))
                .unwrap();
        }

        let since = db.watch_entries_since(at(4, 7)).unwrap().get();
        assert_eq!(since.len(), 3);
        assert_eq!(since[0].timestamp, at(6, 7));

        // Both ends inclusive, oldest first
        let between = db.watch_entries_between(at(2, 7), at(4, 7)).unwrap().get();
        let days: Vec<_> = between.iter().map(|e| e.timestamp).collect();
        assert_eq!(days, vec![at(2, 7), at(3, 7), at(4, 7)]);
    }

    #[test]
    fn test_latest_and_recent_entries() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.watch_latest_entry().unwrap().get().is_none());

        for day in 1..=12 {
            db.insert_weight_entry(&sample_entry(day, 80.0)).unwrap();
        }
        let latest = db.watch_latest_entry().unwrap().get().unwrap();
        assert_eq!(latest.timestamp, at(12, 7));

        let recent = db.watch_recent_entries(10).unwrap().get();
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[9].timestamp, at(3, 7));
    }

    #[test]
    fn test_save_weight_entry_replaces_colliding_id() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_weight_entry(&sample_entry(1, 80.0)).unwrap();
        let mut entry = db.get_weight_entry(id).unwrap();
        entry.weight_kg = 79.1;
        entry.note = "corrected".to_string();

        assert_eq!(db.save_weight_entry(&entry).unwrap(), id);
        assert_eq!(db.watch_all_entries().unwrap().get(), vec![entry]);
    }

    #[test]
    fn test_update_weight_entry() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_weight_entry(&sample_entry(1, 80.0)).unwrap();
        let mut entry = db.get_weight_entry(id).unwrap();
        entry.note = "edited".to_string();
        db.update_weight_entry(&entry).unwrap();
        assert_eq!(db.get_weight_entry(id).unwrap().note, "edited");
    }

    #[test]
    fn test_update_weight_entry_not_found() {
        let db = Database::open_in_memory().unwrap();
        let ghost = WeightEntry {
            id: 42,
            weight_kg: 70.0,
            timestamp: at(1, 7),
            note: String::new(),
            bmi: None,
        };
        assert!(db.update_weight_entry(&ghost).unwrap_err().is_not_found());
        // Nothing was created as a side effect
        assert!(db.watch_all_entries().unwrap().get().is_empty());
    }

    #[test]
    fn test_delete_weight_entry() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_weight_entry(&sample_entry(1, 80.0)).unwrap();
        db.delete_weight_entry(id).unwrap();
        assert!(db.delete_weight_entry(id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_all_then_latest_is_none() {
        let db = Database::open_in_memory().unwrap();
        let latest = db.watch_latest_entry().unwrap();
        for day in 1..=3 {
            db.insert_weight_entry(&sample_entry(day, 75.0)).unwrap();
        }
        assert!(latest.get().is_some());

        assert_eq!(db.delete_all_weight_entries().unwrap(), 3);
        assert!(latest.get().is_none());
        assert!(db.watch_latest_entry().unwrap().get().is_none());
        // Empty table is not an error
        assert_eq!(db.delete_all_weight_entries().unwrap(), 0);
    }

    #[test]
    fn test_live_view_refreshes_on_write() {
        let db = Database::open_in_memory().unwrap();
        let all = db.watch_all_entries().unwrap();
        assert!(all.get().is_empty());

        db.insert_weight_entry(&sample_entry(1, 80.0)).unwrap();
        assert!(all.has_changed());
        assert_eq!(all.get().len(), 1);
    }

    #[test]
    fn test_live_view_ignores_other_tables() {
        let db = Database::open_in_memory().unwrap();
        let all = db.watch_all_entries().unwrap();
        db.upsert_user_profile(&sample_profile(170.0)).unwrap();
        assert!(!all.has_changed());
    }

    #[test]
    fn test_failed_write_does_not_wake_views() {
        let db = Database::open_in_memory().unwrap();
        db.insert_weight_entry(&sample_entry(1, 80.0)).unwrap();
        let all = db.watch_all_entries().unwrap();

        assert!(db.insert_weight_entry(&sample_entry(2, -3.0)).is_err());
        assert!(!all.has_changed());
        assert_eq!(all.get().len(), 1);
    }

    #[test]
    fn test_write_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        let result: Result<()> = db.write(&[Table::WeightEntries], |tx| {
            ops::insert_entry(tx, &sample_entry(1, 70.0))?;
            Err(CoreError::Internal("abort".to_string()))
        });
        assert!(result.is_err());
        assert!(db.watch_all_entries().unwrap().get().is_empty());
    }

    #[test]
    fn test_dropped_views_are_pruned() {
        let db = Database::open_in_memory().unwrap();
        let kept = db.watch_all_entries().unwrap();
        let dropped = db.watch_latest_entry().unwrap();
        assert_eq!(db.watchers.lock().unwrap().len(), 2);

        drop(dropped);
        db.insert_weight_entry(&sample_entry(1, 70.0)).unwrap();
        assert_eq!(db.watchers.lock().unwrap().len(), 1);
        assert_eq!(kept.get().len(), 1);
    }

    #[test]
    fn test_dropped_views_pruned_on_register() {
        let db = Database::open_in_memory().unwrap();
        let _kept = db.watch_all_entries().unwrap();
        for day in 1..=100 {
            drop(db.watch_entries_between(at(day % 28 + 1, 0), at(28, 23)).unwrap());
        }
        // No write to weight_entries has happened; registering alone prunes
        assert_eq!(db.watchers.lock().unwrap().len(), 2);

        let _profile = db.watch_user_profile().unwrap();
        assert_eq!(db.watchers.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_profile_upsert_keeps_single_row() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_user_profile(&sample_profile(170.0)).unwrap();
        db.upsert_user_profile(&UserProfile {
            height_cm: 182.0,
            age: 35,
            gender: Gender::Male,
            preferred_unit: WeightUnit::Lbs,
        })
        .unwrap();

        let rows: i64 = db
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM user_profile", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(rows, 1);

        let profile = db.get_user_profile().unwrap().unwrap();
        assert!((profile.height_cm - 182.0).abs() < f64::EPSILON);
        assert_eq!(profile.age, 35);
        assert_eq!(profile.gender, Gender::Male);
        assert_eq!(profile.preferred_unit, WeightUnit::Lbs);
    }

    #[test]
    fn test_profile_update_and_delete() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.update_user_profile(&sample_profile(170.0)).unwrap_err().is_not_found());
        assert!(!db.delete_user_profile().unwrap());

        let view = db.watch_user_profile().unwrap();
        db.upsert_user_profile(&sample_profile(170.0)).unwrap();
        db.update_user_profile(&sample_profile(171.5)).unwrap();
        assert!((view.get().unwrap().height_cm - 171.5).abs() < f64::EPSILON);

        assert!(db.delete_user_profile().unwrap());
        assert!(view.get().is_none());
    }

    #[test]
    fn test_second_active_goal_rejected_by_schema() {
        let db = Database::open_in_memory().unwrap();
        db.save_goal(&sample_goal(1, true)).unwrap();
        let err = db.save_goal(&sample_goal(2, true)).unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
        assert_eq!(count_active_goals(&db), 1);

        // Re-saving the active goal under its own id updates it in place
        let mut first = sample_goal(1, true);
        first.target_weight_kg = 62.0;
        db.save_goal(&first).unwrap();
        assert_eq!(db.get_goal(1).unwrap(), first);

        // Inactive goals are unrestricted
        db.save_goal(&sample_goal(2, false)).unwrap();
        db.save_goal(&sample_goal(3, false)).unwrap();
        assert_eq!(db.watch_all_goals().unwrap().get().len(), 3);
    }

    #[test]
    fn test_goals_ordered_by_start_date_desc() {
        let db = Database::open_in_memory().unwrap();
        for id in [2, 5, 1] {
            db.save_goal(&sample_goal(id, false)).unwrap();
        }
        let ids: Vec<_> = db
            .watch_all_goals()
            .unwrap()
            .get()
            .iter()
            .map(|g| g.id)
            .collect();
        assert_eq!(ids, vec![5, 2, 1]);
    }

    #[test]
    fn test_goal_update_delete_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.update_goal(&sample_goal(7, false)).unwrap_err().is_not_found());
        assert!(db.delete_goal(7).unwrap_err().is_not_found());
        assert!(db.get_goal(7).unwrap_err().is_not_found());
    }

    #[test]
    fn test_active_goal_view() {
        let db = Database::open_in_memory().unwrap();
        let active = db.watch_active_goal().unwrap();
        assert!(active.get().is_none());

        let id = db
            .write(&[Table::Goals], |tx| {
                ops::insert_goal(
                    tx,
                    &NewGoal {
                        target_weight_kg: 60.0,
                        start_weight_kg: 70.0,
                        start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                        target_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
                    },
                    true,
                )
            })
            .unwrap();
        assert_eq!(active.get().unwrap().id, id);

        assert_eq!(db.delete_all_goals().unwrap(), 1);
        assert!(active.get().is_none());
    }

    #[test]
    fn test_open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.db");
        {
            let db = Database::open(&path).unwrap();
            db.insert_weight_entry(&sample_entry(1, 68.0)).unwrap();
            db.upsert_user_profile(&sample_profile(165.0)).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.watch_all_entries().unwrap().get().len(), 1);
        assert!(db.get_user_profile().unwrap().is_some());
    }

    #[test]
    fn test_migration_sets_user_version() {
        let db = Database::open_in_memory().unwrap();
        let version: i64 = db
            .read(|conn| Ok(conn.pragma_query_value(None, "user_version", |r| r.get(0))?))
            .unwrap();
        assert_eq!(version, 1);
    }
}
