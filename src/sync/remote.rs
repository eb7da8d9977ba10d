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

//! The remote store contract. Every operation is an idempotent upsert keyed
//! by `(user_key, natural key)`: re-sending a row must neither duplicate nor
//! double-count.

use serde::Deserialize;
use serde::Serialize;

use crate::error::Fallible;
use crate::types::counters::SummaryCounters;
use crate::types::date::Date;
use crate::types::item_key::ItemKey;
use crate::types::progress::ProgressRecord;
use crate::types::progress::Status;
use crate::types::selection::DailySelection;
use crate::types::timestamp::Timestamp;

/// The wire shape of a progress record. Intra-day exposure throttling is
/// device-local and stays out of the remote row.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ProgressRow {
    pub item_key: ItemKey,
    pub status: Status,
    pub is_learned_once: bool,
    pub review_count: u32,
    pub created_date: Date,
    pub last_played_date: Option<Date>,
    pub next_review_date: Date,
    pub learned_date: Option<Date>,
}

impl ProgressRow {
    pub fn from_record(record: &ProgressRecord) -> Self {
        Self {
            item_key: record.item_key.clone(),
            status: record.status,
            is_learned_once: record.is_learned_once,
            review_count: record.review_count,
            created_date: record.created_date,
            last_played_date: record.last_played_date,
            next_review_date: record.next_review_date,
            learned_date: record.learned_date,
        }
    }

    pub fn into_record(self) -> ProgressRecord {
        ProgressRecord {
            item_key: self.item_key,
            status: self.status,
            is_learned_once: self.is_learned_once,
            review_count: self.review_count,
            created_date: self.created_date,
            last_played_date: self.last_played_date,
            next_review_date: self.next_review_date,
            next_allowed_time: None,
            exposures_today: 0,
            last_exposure_time: None,
            learned_date: self.learned_date,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct UsageRow {
    pub day: Date,
    pub duration_ms: i64,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ResumeRow {
    pub category: String,
    pub item_key: ItemKey,
    pub seen_at: Timestamp,
}

/// Merge a remote row into a local record. The record only moves towards a
/// stronger state: status by rank, review count by maximum. Scheduling
/// fields follow whichever side has seen more reviews.
pub fn merge_remote_row(local: &mut ProgressRecord, remote: &ProgressRow) -> bool {
    let before = local.clone();

    if remote.review_count > local.review_count {
        local.review_count = remote.review_count;
        local.next_review_date = remote.next_review_date;
        if remote.last_played_date.is_some() {
            local.last_played_date = local.last_played_date.max(remote.last_played_date);
        }
    }
    local.is_learned_once = local.is_learned_once || remote.is_learned_once;
    if remote.status.rank() > local.status.rank() {
        local.status = remote.status;
        if local.learned_date.is_none() {
            local.learned_date = remote.learned_date;
        }
    }
    local.created_date = local.created_date.min(remote.created_date);
    if local.next_review_date < local.created_date {
        local.next_review_date = local.created_date;
    }

    *local != before
}

#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    async fn upsert_progress(&self, user_key: &str, rows: &[ProgressRow]) -> Fallible<()>;
    async fn fetch_progress(&self, user_key: &str) -> Fallible<Vec<ProgressRow>>;
    async fn fetch_learned_keys(&self, user_key: &str) -> Fallible<Vec<ItemKey>>;
    async fn upsert_usage_time(&self, user_key: &str, rows: &[UsageRow]) -> Fallible<()>;
    async fn fetch_usage_times(&self, user_key: &str) -> Fallible<Vec<UsageRow>>;
    async fn upsert_daily_selection(
        &self,
        user_key: &str,
        selection: &DailySelection,
    ) -> Fallible<()>;
    async fn upsert_resume(&self, user_key: &str, rows: &[ResumeRow]) -> Fallible<()>;
    async fn fetch_summary(&self, user_key: &str) -> Fallible<Option<SummaryCounters>>;
    /// Atomically mark an item learned and return fresh summary counters.
    async fn mark_learned(
        &self,
        user_key: &str,
        row: &ProgressRow,
    ) -> Fallible<Option<SummaryCounters>>;
}
