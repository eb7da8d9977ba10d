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

//! Keeping local and remote state eventually consistent. Dirty rows in the
//! store are the retry queue: a row stays dirty until the remote
//! acknowledges it, so a failed push is simply re-sent on a later flush.
//! Push failures never surface to the caller.

use std::time::Duration;
use std::time::Instant;

use crate::error::Fallible;
use crate::store::ProgressStore;
use crate::sync::remote::ProgressRow;
use crate::sync::remote::RemoteStore;
use crate::sync::remote::ResumeRow;
use crate::sync::remote::UsageRow;
use crate::sync::remote::merge_remote_row;
use crate::types::category::Category;
use crate::types::counters::SummaryCounters;
use crate::types::date::Date;
use crate::types::item_key::ItemKey;
use crate::types::progress::ProgressRecord;
use crate::types::progress::Status;

const BACKOFF_BASE: Duration = Duration::from_secs(30);
const BACKOFF_MAX: Duration = Duration::from_secs(600);
const BACKOFF_MAX_FAILURES: u32 = 6;

/// Bounded exponential backoff for failed pushes.
struct Backoff {
    failures: u32,
    blocked_until: Option<Instant>,
}

impl Backoff {
    fn new() -> Self {
        Self {
            failures: 0,
            blocked_until: None,
        }
    }

    fn record_failure(&mut self, now: Instant) {
        self.failures = (self.failures + 1).min(BACKOFF_MAX_FAILURES);
        let delay = BACKOFF_BASE
            .saturating_mul(1 << (self.failures - 1))
            .min(BACKOFF_MAX);
        self.blocked_until = Some(now + delay);
    }

    fn record_success(&mut self) {
        self.failures = 0;
        self.blocked_until = None;
    }

    fn is_blocked(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }
}

pub struct Reconciler<R> {
    remote: Option<R>,
    user_key: Option<String>,
    min_flush_interval: Duration,
    last_flush: Option<Instant>,
    backoff: Backoff,
}

impl<R: RemoteStore> Reconciler<R> {
    pub fn new(remote: Option<R>, user_key: Option<String>, min_flush_interval: Duration) -> Self {
        Self {
            remote,
            user_key,
            min_flush_interval,
            last_flush: None,
            backoff: Backoff::new(),
        }
    }

    fn endpoint(&self) -> Option<(&R, &str)> {
        match (&self.remote, &self.user_key) {
            (Some(remote), Some(user_key)) => Some((remote, user_key.as_str())),
            _ => None,
        }
    }

    /// Session-start reconciliation: merge remote state into local records
    /// (never downgrading), merge remote usage samples max-wins, then push
    /// every local mutation the remote has not yet acknowledged. Safe to run
    /// repeatedly. Remote failures are logged and left for the next session.
    pub async fn bootstrap(&mut self, store: &ProgressStore, today: Date) -> Fallible<()> {
        let Some((remote, user_key)) = self.endpoint() else {
            log::debug!("No identity or remote configured; skipping bootstrap.");
            return Ok(());
        };

        match remote.fetch_learned_keys(user_key).await {
            Ok(keys) => {
                for key in keys {
                    upgrade_to_learned(store, &key, today)?;
                }
            }
            Err(e) => {
                log::warn!("Failed to fetch learned keys: {e}");
            }
        }

        match remote.fetch_progress(user_key).await {
            Ok(rows) => {
                for row in rows {
                    match store.get(&row.item_key)? {
                        Some(mut local) => {
                            if merge_remote_row(&mut local, &row) {
                                store.put(&local)?;
                            }
                        }
                        None => {
                            store.put(&row.into_record())?;
                        }
                    }
                }
            }
            Err(e) => {
                log::warn!("Failed to fetch remote progress: {e}");
            }
        }

        match remote.fetch_usage_times(user_key).await {
            Ok(rows) => {
                for row in rows {
                    store.merge_usage_time(row.day, row.duration_ms)?;
                }
            }
            Err(e) => {
                log::warn!("Failed to fetch remote usage samples: {e}");
            }
        }

        // Backfill: push everything still unacknowledged.
        self.flush_now(store).await
    }

    /// The debounced sweep. No-ops without an identity, within the minimum
    /// flush interval, or while the backoff window from a failed push is
    /// open.
    pub async fn tick(&mut self, store: &ProgressStore, now: Instant) -> Fallible<()> {
        if self.endpoint().is_none() {
            return Ok(());
        }
        if self.backoff.is_blocked(now) {
            log::debug!("Push backoff window open; deferring sweep.");
            return Ok(());
        }
        if let Some(last) = self.last_flush {
            if now.duration_since(last) < self.min_flush_interval {
                return Ok(());
            }
        }
        self.flush_at(store, now).await
    }

    /// Push all dirty rows immediately, ignoring the debounce and backoff
    /// windows. A remote failure is swallowed and scheduled for retry.
    pub async fn flush_now(&mut self, store: &ProgressStore) -> Fallible<()> {
        self.flush_at(store, Instant::now()).await
    }

    async fn flush_at(&mut self, store: &ProgressStore, now: Instant) -> Fallible<()> {
        if self.endpoint().is_none() {
            return Ok(());
        }
        match self.push_dirty(store).await {
            Ok(()) => {
                self.last_flush = Some(now);
                self.backoff.record_success();
            }
            Err(e) => {
                log::warn!("Push failed, will retry: {e}");
                self.backoff.record_failure(now);
            }
        }
        Ok(())
    }

    async fn push_dirty(&self, store: &ProgressStore) -> Fallible<()> {
        let Some((remote, user_key)) = self.endpoint() else {
            return Ok(());
        };

        let dirty = store.dirty_records()?;
        if !dirty.is_empty() {
            let rows: Vec<ProgressRow> = dirty.iter().map(ProgressRow::from_record).collect();
            remote.upsert_progress(user_key, &rows).await?;
            let keys: Vec<ItemKey> = dirty.into_iter().map(|record| record.item_key).collect();
            store.mark_records_clean(&keys)?;
            log::debug!("Pushed {} progress rows.", keys.len());
        }

        let usage = store.dirty_usage_times()?;
        if !usage.is_empty() {
            let rows: Vec<UsageRow> = usage
                .iter()
                .map(|(day, duration_ms)| UsageRow {
                    day: *day,
                    duration_ms: *duration_ms,
                })
                .collect();
            remote.upsert_usage_time(user_key, &rows).await?;
            let days: Vec<Date> = usage.into_keys().collect();
            store.mark_usage_clean(&days)?;
        }

        for selection in store.dirty_selections()? {
            remote.upsert_daily_selection(user_key, &selection).await?;
            store.mark_selection_clean(selection.date)?;
        }

        let positions = store.dirty_resume_positions()?;
        if !positions.is_empty() {
            let rows: Vec<ResumeRow> = positions
                .iter()
                .map(|position| ResumeRow {
                    category: position.category.as_str().to_string(),
                    item_key: position.item_key.clone(),
                    seen_at: position.seen_at,
                })
                .collect();
            remote.upsert_resume(user_key, &rows).await?;
            let categories: Vec<Category> = positions
                .into_iter()
                .map(|position| position.category)
                .collect();
            store.mark_resume_clean(&categories)?;
        }

        Ok(())
    }

    /// Immediate push for an explicit "mark learned", bypassing the
    /// debounce. On success the remote's fresh summary comes back; on
    /// failure the row stays dirty for the next sweep.
    pub async fn push_learned(
        &mut self,
        store: &ProgressStore,
        record: &ProgressRecord,
    ) -> Fallible<Option<SummaryCounters>> {
        let Some((remote, user_key)) = self.endpoint() else {
            return Ok(None);
        };
        let row = ProgressRow::from_record(record);
        match remote.mark_learned(user_key, &row).await {
            Ok(summary) => {
                store.mark_records_clean(std::slice::from_ref(&record.item_key))?;
                self.backoff.record_success();
                Ok(summary)
            }
            Err(e) => {
                log::warn!("Failed to push learned word, will retry: {e}");
                self.backoff.record_failure(Instant::now());
                Ok(None)
            }
        }
    }

    /// The remote summary row, if reachable.
    pub async fn fetch_summary(&self) -> Option<SummaryCounters> {
        let (remote, user_key) = self.endpoint()?;
        match remote.fetch_summary(user_key).await {
            Ok(summary) => summary,
            Err(e) => {
                log::warn!("Failed to fetch remote summary: {e}");
                None
            }
        }
    }
}

/// Upgrade a local record to at least `Learned`. Never downgrades: a
/// retired record stays retired.
fn upgrade_to_learned(store: &ProgressStore, key: &ItemKey, today: Date) -> Fallible<()> {
    match store.get(key)? {
        Some(mut local) => {
            if local.status.rank() < Status::Learned.rank() {
                local.status = Status::Learned;
                local.is_learned_once = true;
                if local.learned_date.is_none() {
                    local.learned_date = Some(today);
                }
                store.put(&local)?;
            }
        }
        None => {
            let mut record = ProgressRecord::new(key.clone(), today);
            record.status = Status::Learned;
            record.is_learned_once = true;
            record.learned_date = Some(today);
            store.put(&record)?;
        }
    }
    Ok(())
}
