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

//! The per-session context object. Constructed once and passed by handle;
//! there is no module-level state. All UI-facing operations go through here.

use std::time::Duration;
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::catalog::CatalogEntry;
use crate::config::Config;
use crate::error::Fallible;
use crate::error::fail;
use crate::scheduler::apply_correct_review;
use crate::scheduler::apply_incorrect_review;
use crate::scheduler::refresh_status;
use crate::scheduler::retire;
use crate::selector;
use crate::store::ProgressStore;
use crate::store::ResumePosition;
use crate::summary::compute_from_local;
use crate::summary::merge;
use crate::sync::reconciler::Reconciler;
use crate::sync::remote::RemoteStore;
use crate::types::counters::SummaryCounters;
use crate::types::item_key::ItemKey;
use crate::types::progress::ProgressRecord;
use crate::types::selection::DailySelection;
use crate::types::selection::Severity;
use crate::types::timestamp::Timestamp;

pub struct Session<R> {
    store: ProgressStore,
    catalog: Vec<CatalogEntry>,
    severity: Severity,
    reconciler: Reconciler<R>,
    rng: StdRng,
}

impl<R: RemoteStore> Session<R> {
    pub fn new(
        store: ProgressStore,
        catalog: Vec<CatalogEntry>,
        config: &Config,
        remote: Option<R>,
    ) -> Fallible<Self> {
        let user_key = ensure_user_key(&store, config)?;
        let reconciler = Reconciler::new(
            remote,
            user_key,
            Duration::from_secs(config.sync_interval_secs()),
        );
        Ok(Self {
            store,
            catalog,
            severity: config.severity(),
            reconciler,
            rng: StdRng::from_entropy(),
        })
    }

    /// Session-start reconciliation. Remote failures degrade to local mode.
    pub async fn start(&mut self) -> Fallible<()> {
        let today = Timestamp::now().local_date();
        self.reconciler.bootstrap(&self.store, today).await
    }

    pub fn store(&self) -> &ProgressStore {
        &self.store
    }

    /// Today's selection, cached per date.
    pub fn todays_selection(&mut self, severity: Option<Severity>) -> Fallible<DailySelection> {
        let today = Timestamp::now().local_date();
        let severity = severity.unwrap_or(self.severity);
        selector::select(&self.store, &self.catalog, severity, today, &mut self.rng)
    }

    /// Rebuild today's selection from current progress state.
    pub fn regenerate_selection(&mut self, severity: Option<Severity>) -> Fallible<DailySelection> {
        let today = Timestamp::now().local_date();
        let severity = severity.unwrap_or(self.severity);
        selector::regenerate(&self.store, &self.catalog, severity, today, &mut self.rng)
    }

    /// Record a review outcome. The update is visible to the next selection
    /// immediately; remote visibility is best-effort via the debounced sweep.
    pub async fn record_review(
        &mut self,
        key: &ItemKey,
        was_correct: bool,
    ) -> Fallible<ProgressRecord> {
        let now = Timestamp::now();
        let today = now.local_date();
        let mut record = match self.store.get(key)? {
            Some(record) => record,
            None => ProgressRecord::new(key.clone(), today),
        };
        if was_correct {
            apply_correct_review(&mut record, now, today);
        } else {
            apply_incorrect_review(&mut record, now, today);
        }
        self.store.put(&record)?;
        self.store.put_resume_position(&ResumePosition {
            category: key.category().clone(),
            item_key: key.clone(),
            seen_at: now,
        })?;
        self.reconciler.tick(&self.store, Instant::now()).await?;
        Ok(record)
    }

    /// Explicitly mark an item learned. Pushed immediately, not debounced.
    pub async fn mark_learned(&mut self, key: &ItemKey) -> Fallible<ProgressRecord> {
        let today = Timestamp::now().local_date();
        let mut record = match self.store.get(key)? {
            Some(record) => record,
            None => ProgressRecord::new(key.clone(), today),
        };
        retire(&mut record, today);
        self.store.put(&record)?;
        if let Some(summary) = self.reconciler.push_learned(&self.store, &record).await? {
            self.store.put_summary_cache(&summary)?;
        }
        Ok(record)
    }

    /// The summary counters: remote when reachable, else the last cached
    /// value, else computed from local records. Always yields a value.
    pub async fn summary(&mut self) -> Fallible<SummaryCounters> {
        let now = Timestamp::now();
        let records = self.store.all_records()?;
        let usage = self.store.usage_times()?;
        let local = compute_from_local(&records, &usage, self.catalog.len(), now);
        match self.reconciler.fetch_summary().await {
            Some(remote) => {
                let merged = merge(&local, &remote);
                self.store.put_summary_cache(&merged)?;
                Ok(merged)
            }
            None => match self.store.summary_cache()? {
                Some(cached) => Ok(cached),
                None => Ok(local),
            },
        }
    }

    /// Accumulate active learning time for today. Returns the day's total.
    pub async fn record_usage(&mut self, duration_ms: i64) -> Fallible<i64> {
        let today = Timestamp::now().local_date();
        let total = self.store.add_usage_time(today, duration_ms)?;
        self.reconciler.tick(&self.store, Instant::now()).await?;
        Ok(total)
    }

    /// Note that an item was shown to the learner just now.
    pub fn record_exposure(&mut self, key: &ItemKey) -> Fallible<ProgressRecord> {
        let now = Timestamp::now();
        let today = now.local_date();
        let mut record = match self.store.get(key)? {
            Some(record) => record,
            None => ProgressRecord::new(key.clone(), today),
        };
        refresh_status(&mut record, today);
        record.exposures_today = record.exposures_today.saturating_add(1);
        record.last_exposure_time = Some(now);
        self.store.put(&record)?;
        Ok(record)
    }

    /// Force a full reconciliation pass now.
    pub async fn sync_now(&mut self) -> Fallible<()> {
        let today = Timestamp::now().local_date();
        self.reconciler.bootstrap(&self.store, today).await?;
        self.reconciler.flush_now(&self.store).await
    }
}

/// Resolve the opaque user key: the cached one if present, otherwise derived
/// from the configured nickname. No nickname means no key, and the
/// reconciler stays local-only.
pub fn ensure_user_key(store: &ProgressStore, config: &Config) -> Fallible<Option<String>> {
    if let Some(cached) = store.user_key()? {
        return Ok(Some(cached));
    }
    match &config.nickname {
        Some(nickname) => {
            let canon = nickname.trim().to_lowercase();
            if canon.is_empty() {
                return fail("nickname must not be blank");
            }
            let key = blake3::hash(canon.as_bytes()).to_hex().to_string();
            store.put_user_key(&key)?;
            Ok(Some(key))
        }
        None => Ok(None),
    }
}
