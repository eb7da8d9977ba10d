// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Durable local storage for progress records, the cached daily selection,
//! per-day usage time, resume positions, and the summary-counter cache.
//!
//! The local store is a cache, not a source of truth: rows that fail to
//! decode are logged and treated as absent, never raised to the caller. The
//! `dirty` column tracks rows the reconciler has not yet pushed.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use rusqlite::Connection;
use rusqlite::Row;
use rusqlite::Transaction;

use crate::error::Fallible;
use crate::types::category::Category;
use crate::types::counters::SummaryCounters;
use crate::types::date::Date;
use crate::types::item_key::ItemKey;
use crate::types::progress::ProgressRecord;
use crate::types::selection::DailySelection;
use crate::types::timestamp::Timestamp;

#[derive(Clone)]
pub struct ProgressStore {
    conn: Arc<Mutex<Connection>>,
}

/// A per-category resume position: the last item the learner saw.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ResumePosition {
    pub category: Category,
    pub item_key: ItemKey,
    pub seen_at: Timestamp,
}

impl ProgressStore {
    pub fn open(database_path: &str) -> Fallible<Self> {
        let conn = Connection::open(database_path)?;
        Self::bootstrap(conn)
    }

    /// An in-memory store, used in tests.
    #[cfg(test)]
    pub fn open_in_memory() -> Fallible<Self> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(conn)
    }

    fn bootstrap(mut conn: Connection) -> Fallible<Self> {
        {
            let tx = conn.transaction()?;
            if !probe_schema_exists(&tx)? {
                tx.execute_batch(include_str!("schema.sql"))?;
                tx.commit()?;
            }
        }
        let conn = Arc::new(Mutex::new(conn));
        Ok(Self { conn })
    }

    fn acquire(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    /// Get a single progress record. A corrupt row is treated as absent.
    pub fn get(&self, key: &ItemKey) -> Fallible<Option<ProgressRecord>> {
        let conn = self.acquire();
        let sql = "select item_key, status, is_learned_once, review_count, created_date, last_played_date, next_review_date, next_allowed_time, exposures_today, last_exposure_time, learned_date from progress where item_key = ?;";
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([key])?;
        if let Some(row) = rows.next()? {
            match decode_progress_row(row) {
                Ok(record) => Ok(Some(record)),
                Err(e) => {
                    log::warn!("Discarding corrupt progress row for {key}: {e}");
                    Ok(None)
                }
            }
        } else {
            Ok(None)
        }
    }

    /// Upsert a progress record and mark it dirty for the next push.
    pub fn put(&self, record: &ProgressRecord) -> Fallible<()> {
        let conn = self.acquire();
        let sql = "insert into progress (item_key, status, is_learned_once, review_count, created_date, last_played_date, next_review_date, next_allowed_time, exposures_today, last_exposure_time, learned_date, dirty) values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1) on conflict (item_key) do update set status = excluded.status, is_learned_once = excluded.is_learned_once, review_count = excluded.review_count, created_date = excluded.created_date, last_played_date = excluded.last_played_date, next_review_date = excluded.next_review_date, next_allowed_time = excluded.next_allowed_time, exposures_today = excluded.exposures_today, last_exposure_time = excluded.last_exposure_time, learned_date = excluded.learned_date, dirty = 1;";
        conn.execute(
            sql,
            (
                &record.item_key,
                record.status,
                record.is_learned_once,
                record.review_count,
                record.created_date,
                record.last_played_date,
                record.next_review_date,
                record.next_allowed_time,
                record.exposures_today,
                record.last_exposure_time,
                record.learned_date,
            ),
        )?;
        Ok(())
    }

    /// All decodable progress records, keyed by item. Corrupt rows are
    /// skipped with a warning.
    pub fn all_records(&self) -> Fallible<BTreeMap<ItemKey, ProgressRecord>> {
        let mut records = BTreeMap::new();
        let conn = self.acquire();
        let sql = "select item_key, status, is_learned_once, review_count, created_date, last_played_date, next_review_date, next_allowed_time, exposures_today, last_exposure_time, learned_date from progress;";
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            match decode_progress_row(row) {
                Ok(record) => {
                    records.insert(record.item_key.clone(), record);
                }
                Err(e) => {
                    log::warn!("Skipping corrupt progress row: {e}");
                }
            }
        }
        Ok(records)
    }

    /// Records awaiting a push to the remote store.
    pub fn dirty_records(&self) -> Fallible<Vec<ProgressRecord>> {
        let mut records = Vec::new();
        let conn = self.acquire();
        let sql = "select item_key, status, is_learned_once, review_count, created_date, last_played_date, next_review_date, next_allowed_time, exposures_today, last_exposure_time, learned_date from progress where dirty = 1;";
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            match decode_progress_row(row) {
                Ok(record) => records.push(record),
                Err(e) => {
                    log::warn!("Skipping corrupt progress row: {e}");
                }
            }
        }
        Ok(records)
    }

    pub fn mark_records_clean(&self, keys: &[ItemKey]) -> Fallible<()> {
        let mut conn = self.acquire();
        let tx = conn.transaction()?;
        for key in keys {
            tx.execute("update progress set dirty = 0 where item_key = ?;", [key])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// The cached selection for a date, if present and decodable.
    pub fn selection_for(&self, date: Date) -> Fallible<Option<DailySelection>> {
        let conn = self.acquire();
        let sql = "select payload from daily_selection where selection_date = ?;";
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([date])?;
        if let Some(row) = rows.next()? {
            let payload: String = row.get(0)?;
            match serde_json::from_str::<DailySelection>(&payload) {
                Ok(selection) => Ok(Some(selection)),
                Err(e) => {
                    log::warn!("Discarding corrupt daily selection for {date}: {e}");
                    Ok(None)
                }
            }
        } else {
            Ok(None)
        }
    }

    pub fn put_selection(&self, selection: &DailySelection) -> Fallible<()> {
        let payload = serde_json::to_string(selection)?;
        let conn = self.acquire();
        let sql = "insert into daily_selection (selection_date, payload, dirty) values (?, ?, 1) on conflict (selection_date) do update set payload = excluded.payload, dirty = 1;";
        conn.execute(sql, (selection.date, payload))?;
        Ok(())
    }

    pub fn dirty_selections(&self) -> Fallible<Vec<DailySelection>> {
        let mut selections = Vec::new();
        let conn = self.acquire();
        let sql = "select selection_date, payload from daily_selection where dirty = 1;";
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let date: Date = match row.get(0) {
                Ok(date) => date,
                Err(e) => {
                    log::warn!("Skipping corrupt daily selection row: {e}");
                    continue;
                }
            };
            let payload: String = row.get(1)?;
            match serde_json::from_str::<DailySelection>(&payload) {
                Ok(selection) => selections.push(selection),
                Err(e) => {
                    log::warn!("Skipping corrupt daily selection for {date}: {e}");
                }
            }
        }
        Ok(selections)
    }

    pub fn mark_selection_clean(&self, date: Date) -> Fallible<()> {
        let conn = self.acquire();
        conn.execute(
            "update daily_selection set dirty = 0 where selection_date = ?;",
            [date],
        )?;
        Ok(())
    }

    /// Add active time to a day's sample. Local accumulation is additive.
    /// Returns the day's new total.
    pub fn add_usage_time(&self, day: Date, duration_ms: i64) -> Fallible<i64> {
        let duration_ms = duration_ms.max(0);
        let conn = self.acquire();
        let sql = "insert into usage_time (day, duration_ms, dirty) values (?, ?, 1) on conflict (day) do update set duration_ms = duration_ms + excluded.duration_ms, dirty = 1;";
        conn.execute(sql, (day, duration_ms))?;
        let total: i64 = conn.query_row(
            "select duration_ms from usage_time where day = ?;",
            [day],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Merge a remote day sample into the local store. Two writers reconcile
    /// max-wins, so a retried or crossed write never double-counts.
    pub fn merge_usage_time(&self, day: Date, duration_ms: i64) -> Fallible<()> {
        let duration_ms = duration_ms.max(0);
        let conn = self.acquire();
        let sql = "insert into usage_time (day, duration_ms, dirty) values (?, ?, 0) on conflict (day) do update set duration_ms = max(duration_ms, excluded.duration_ms);";
        conn.execute(sql, (day, duration_ms))?;
        Ok(())
    }

    pub fn usage_times(&self) -> Fallible<BTreeMap<Date, i64>> {
        let mut samples = BTreeMap::new();
        let conn = self.acquire();
        let mut stmt = conn.prepare("select day, duration_ms from usage_time;")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let day: Date = match row.get(0) {
                Ok(day) => day,
                Err(e) => {
                    log::warn!("Skipping corrupt usage row: {e}");
                    continue;
                }
            };
            let duration_ms: i64 = row.get(1)?;
            samples.insert(day, duration_ms.max(0));
        }
        Ok(samples)
    }

    pub fn dirty_usage_times(&self) -> Fallible<BTreeMap<Date, i64>> {
        let mut samples = BTreeMap::new();
        let conn = self.acquire();
        let mut stmt = conn.prepare("select day, duration_ms from usage_time where dirty = 1;")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let day: Date = match row.get(0) {
                Ok(day) => day,
                Err(e) => {
                    log::warn!("Skipping corrupt usage row: {e}");
                    continue;
                }
            };
            let duration_ms: i64 = row.get(1)?;
            samples.insert(day, duration_ms.max(0));
        }
        Ok(samples)
    }

    pub fn mark_usage_clean(&self, days: &[Date]) -> Fallible<()> {
        let mut conn = self.acquire();
        let tx = conn.transaction()?;
        for day in days {
            tx.execute("update usage_time set dirty = 0 where day = ?;", [day])?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn put_resume_position(&self, position: &ResumePosition) -> Fallible<()> {
        let conn = self.acquire();
        let sql = "insert into resume_position (category, item_key, seen_at, dirty) values (?, ?, ?, 1) on conflict (category) do update set item_key = excluded.item_key, seen_at = excluded.seen_at, dirty = 1;";
        conn.execute(
            sql,
            (
                position.category.as_str(),
                &position.item_key,
                position.seen_at,
            ),
        )?;
        Ok(())
    }

    pub fn dirty_resume_positions(&self) -> Fallible<Vec<ResumePosition>> {
        let mut positions = Vec::new();
        let conn = self.acquire();
        let sql = "select category, item_key, seen_at from resume_position where dirty = 1;";
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            match decode_resume_row(row) {
                Ok(position) => positions.push(position),
                Err(e) => {
                    log::warn!("Skipping corrupt resume row: {e}");
                }
            }
        }
        Ok(positions)
    }

    pub fn mark_resume_clean(&self, categories: &[Category]) -> Fallible<()> {
        let mut conn = self.acquire();
        let tx = conn.transaction()?;
        for category in categories {
            tx.execute(
                "update resume_position set dirty = 0 where category = ?;",
                [category.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn summary_cache(&self) -> Fallible<Option<SummaryCounters>> {
        let conn = self.acquire();
        let mut stmt = conn.prepare("select payload from summary_cache where id = 1;")?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            let payload: String = row.get(0)?;
            match serde_json::from_str::<SummaryCounters>(&payload) {
                Ok(counters) => Ok(Some(counters)),
                Err(e) => {
                    log::warn!("Discarding corrupt summary cache: {e}");
                    Ok(None)
                }
            }
        } else {
            Ok(None)
        }
    }

    pub fn put_summary_cache(&self, counters: &SummaryCounters) -> Fallible<()> {
        let payload = serde_json::to_string(counters)?;
        let conn = self.acquire();
        let sql = "insert into summary_cache (id, payload) values (1, ?) on conflict (id) do update set payload = excluded.payload;";
        conn.execute(sql, [payload])?;
        Ok(())
    }

    pub fn user_key(&self) -> Fallible<Option<String>> {
        let conn = self.acquire();
        let mut stmt = conn.prepare("select user_key from identity where id = 1;")?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            Ok(Some(key))
        } else {
            Ok(None)
        }
    }

    pub fn put_user_key(&self, user_key: &str) -> Fallible<()> {
        let conn = self.acquire();
        let sql = "insert into identity (id, user_key) values (1, ?) on conflict (id) do update set user_key = excluded.user_key;";
        conn.execute(sql, [user_key])?;
        Ok(())
    }
}

fn decode_progress_row(row: &Row) -> Fallible<ProgressRecord> {
    Ok(ProgressRecord {
        item_key: row.get(0)?,
        status: row.get(1)?,
        is_learned_once: row.get(2)?,
        review_count: row.get(3)?,
        created_date: row.get(4)?,
        last_played_date: row.get(5)?,
        next_review_date: row.get(6)?,
        next_allowed_time: row.get(7)?,
        exposures_today: row.get(8)?,
        last_exposure_time: row.get(9)?,
        learned_date: row.get(10)?,
    })
}

fn decode_resume_row(row: &Row) -> Fallible<ResumePosition> {
    let category: String = row.get(0)?;
    Ok(ResumePosition {
        category: Category::new(category),
        item_key: row.get(1)?,
        seen_at: row.get(2)?,
    })
}

fn probe_schema_exists(tx: &Transaction) -> Fallible<bool> {
    let sql = "select count(*) from sqlite_master where type='table' AND name=?;";
    let count: i64 = tx.query_row(sql, ["progress"], |row| row.get(0))?;
    Ok(count > 0)
}
