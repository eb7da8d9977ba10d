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

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::types::date::Date;
use crate::types::timestamp::Timestamp;

/// Aggregated progress counters shown to the learner.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SummaryCounters {
    pub learning_count: u32,
    pub learned_count: u32,
    pub due_count: u32,
    pub remaining_count: u32,
    pub learning_time_hours: f64,
    /// Days with any learning activity. Grows monotonically; merges are set
    /// unions so a day recorded on one device is never lost.
    pub learned_days: BTreeSet<Date>,
    pub updated_at: Option<Timestamp>,
}

impl SummaryCounters {
    pub fn empty() -> Self {
        Self {
            learning_count: 0,
            learned_count: 0,
            due_count: 0,
            remaining_count: 0,
            learning_time_hours: 0.0,
            learned_days: BTreeSet::new(),
            updated_at: None,
        }
    }
}
