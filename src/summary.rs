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

//! Deriving and merging the learner's summary counters.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::types::counters::SummaryCounters;
use crate::types::date::Date;
use crate::types::item_key::ItemKey;
use crate::types::progress::ProgressRecord;
use crate::types::progress::Status;
use crate::types::timestamp::Timestamp;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Compute counters from local records alone. Used when neither the remote
/// store nor a cached summary is available.
pub fn compute_from_local(
    records: &BTreeMap<ItemKey, ProgressRecord>,
    usage: &BTreeMap<Date, i64>,
    catalog_size: usize,
    now: Timestamp,
) -> SummaryCounters {
    let mut learning_count: u32 = 0;
    let mut learned_count: u32 = 0;
    let mut due_count: u32 = 0;
    let mut learned_days: BTreeSet<Date> = BTreeSet::new();

    for record in records.values() {
        if record.status.on_review_track() {
            learning_count += 1;
            if record.status == Status::Due {
                due_count += 1;
            }
        }
        if record.status.is_terminal() {
            learned_count += 1;
        }
        if let Some(day) = record.last_played_date {
            learned_days.insert(day);
        }
        if let Some(day) = record.learned_date {
            learned_days.insert(day);
        }
    }

    let mut total_ms: i64 = 0;
    for (day, ms) in usage {
        if *ms > 0 {
            learned_days.insert(*day);
            total_ms += ms;
        }
    }

    let remaining_count = (catalog_size as u32)
        .saturating_sub(learning_count)
        .saturating_sub(learned_count);

    SummaryCounters {
        learning_count,
        learned_count,
        due_count,
        remaining_count,
        learning_time_hours: total_ms as f64 / MS_PER_HOUR,
        learned_days,
        updated_at: Some(now),
    }
}

/// Merge a local summary with a remote one. The remote is authoritative for
/// scalar counters once reachable; `learned_days` is a set union so no day
/// is ever lost, and learning time is monotonic so the larger value wins.
pub fn merge(local: &SummaryCounters, remote: &SummaryCounters) -> SummaryCounters {
    let mut learned_days = local.learned_days.clone();
    learned_days.extend(remote.learned_days.iter().copied());
    SummaryCounters {
        learning_count: remote.learning_count,
        learned_count: remote.learned_count,
        due_count: remote.due_count,
        remaining_count: remote.remaining_count,
        learning_time_hours: local.learning_time_hours.max(remote.learning_time_hours),
        learned_days,
        updated_at: remote.updated_at.max(local.updated_at),
    }
}

/// The longest run of consecutive learned days.
pub fn highest_streak(learned_days: &BTreeSet<Date>) -> u32 {
    let mut best: u32 = 0;
    let mut current: u32 = 0;
    let mut previous: Option<Date> = None;
    for day in learned_days {
        current = match previous {
            Some(prev) if prev.days_until(*day) == 1 => current + 1,
            _ => 1,
        };
        best = best.max(current);
        previous = Some(*day);
    }
    best
}
