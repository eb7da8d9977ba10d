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

//! An in-memory remote store for tests: upserts by natural key, max-wins
//! usage merge, and a failure switch for exercising the retry path.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::error::Fallible;
use crate::error::fail;
use crate::sync::remote::ProgressRow;
use crate::sync::remote::RemoteStore;
use crate::sync::remote::ResumeRow;
use crate::sync::remote::UsageRow;
use crate::types::counters::SummaryCounters;
use crate::types::date::Date;
use crate::types::item_key::ItemKey;
use crate::types::progress::Status;
use crate::types::selection::DailySelection;

#[derive(Default)]
pub struct MockState {
    pub progress: BTreeMap<(String, ItemKey), ProgressRow>,
    pub usage: BTreeMap<(String, Date), i64>,
    pub selections: BTreeMap<(String, Date), DailySelection>,
    pub resume: BTreeMap<(String, String), ResumeRow>,
    pub summary: Option<SummaryCounters>,
    pub learned: Vec<ItemKey>,
    pub fail_requests: bool,
    pub push_calls: u32,
}

#[derive(Clone, Default)]
pub struct MockRemote {
    state: Arc<Mutex<MockState>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn check_available(&self) -> Fallible<()> {
        if self.state().fail_requests {
            return fail("connection refused");
        }
        Ok(())
    }
}

impl RemoteStore for MockRemote {
    async fn upsert_progress(&self, user_key: &str, rows: &[ProgressRow]) -> Fallible<()> {
        self.check_available()?;
        let mut state = self.state();
        state.push_calls += 1;
        for row in rows {
            state
                .progress
                .insert((user_key.to_string(), row.item_key.clone()), row.clone());
        }
        Ok(())
    }

    async fn fetch_progress(&self, user_key: &str) -> Fallible<Vec<ProgressRow>> {
        self.check_available()?;
        let state = self.state();
        Ok(state
            .progress
            .iter()
            .filter(|((key, _), _)| key == user_key)
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn fetch_learned_keys(&self, _user_key: &str) -> Fallible<Vec<ItemKey>> {
        self.check_available()?;
        Ok(self.state().learned.clone())
    }

    async fn upsert_usage_time(&self, user_key: &str, rows: &[UsageRow]) -> Fallible<()> {
        self.check_available()?;
        let mut state = self.state();
        for row in rows {
            let entry = state
                .usage
                .entry((user_key.to_string(), row.day))
                .or_insert(0);
            *entry = (*entry).max(row.duration_ms);
        }
        Ok(())
    }

    async fn fetch_usage_times(&self, user_key: &str) -> Fallible<Vec<UsageRow>> {
        self.check_available()?;
        let state = self.state();
        Ok(state
            .usage
            .iter()
            .filter(|((key, _), _)| key == user_key)
            .map(|((_, day), duration_ms)| UsageRow {
                day: *day,
                duration_ms: *duration_ms,
            })
            .collect())
    }

    async fn upsert_daily_selection(
        &self,
        user_key: &str,
        selection: &DailySelection,
    ) -> Fallible<()> {
        self.check_available()?;
        self.state()
            .selections
            .insert((user_key.to_string(), selection.date), selection.clone());
        Ok(())
    }

    async fn upsert_resume(&self, user_key: &str, rows: &[ResumeRow]) -> Fallible<()> {
        self.check_available()?;
        let mut state = self.state();
        for row in rows {
            state
                .resume
                .insert((user_key.to_string(), row.category.clone()), row.clone());
        }
        Ok(())
    }

    async fn fetch_summary(&self, _user_key: &str) -> Fallible<Option<SummaryCounters>> {
        self.check_available()?;
        Ok(self.state().summary.clone())
    }

    async fn mark_learned(
        &self,
        user_key: &str,
        row: &ProgressRow,
    ) -> Fallible<Option<SummaryCounters>> {
        self.check_available()?;
        let mut state = self.state();
        state
            .progress
            .insert((user_key.to_string(), row.item_key.clone()), row.clone());
        if !state.learned.contains(&row.item_key) {
            state.learned.push(row.item_key.clone());
        }
        let learned_count = state
            .progress
            .values()
            .filter(|row| row.status.rank() >= Status::Learned.rank())
            .count() as u32;
        let mut summary = state.summary.clone().unwrap_or_else(SummaryCounters::empty);
        summary.learned_count = learned_count;
        state.summary = Some(summary.clone());
        Ok(Some(summary))
    }
}
