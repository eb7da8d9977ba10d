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

use rusqlite::ToSql;
use rusqlite::types::FromSql;
use rusqlite::types::FromSqlError;
use rusqlite::types::FromSqlResult;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::types::date::Date;
use crate::types::item_key::ItemKey;
use crate::types::timestamp::Timestamp;

/// The lifecycle state of an item. Exactly one variant holds at any time.
///
/// `Due` and `NotDue` together form the review track. Dueness is transient:
/// it is recomputed against "today" by the status refresh pass before every
/// selection, never trusted from storage.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Never successfully reviewed.
    New,
    /// On the review track and due on or before today.
    Due,
    /// On the review track, scheduled for a later date.
    NotDue,
    /// Graduated from the review track.
    Learned,
    /// Explicitly marked learned; never resurfaces as due.
    Retired,
}

impl Status {
    pub fn on_review_track(self) -> bool {
        matches!(self, Status::Due | Status::NotDue)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Learned | Status::Retired)
    }

    /// Ordering used when merging device states: a merge may only move a
    /// record towards a stronger state, never back.
    pub fn rank(self) -> u8 {
        match self {
            Status::New => 0,
            Status::Due => 1,
            Status::NotDue => 1,
            Status::Learned => 2,
            Status::Retired => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::New => "new",
            Status::Due => "due",
            Status::NotDue => "not_due",
            Status::Learned => "learned",
            Status::Retired => "retired",
        }
    }

    pub fn from_str(s: &str) -> Fallible<Self> {
        match s {
            "new" => Ok(Status::New),
            "due" => Ok(Status::Due),
            "not_due" => Ok(Status::NotDue),
            "learned" => Ok(Status::Learned),
            "retired" => Ok(Status::Retired),
            _ => Err(ErrorReport::new("invalid status in progress store")),
        }
    }
}

impl ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let string: String = FromSql::column_result(value)?;
        Status::from_str(&string).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Per-item mastery state.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub item_key: ItemKey,
    pub status: Status,
    pub is_learned_once: bool,
    pub review_count: u32,
    pub created_date: Date,
    pub last_played_date: Option<Date>,
    /// Day-granular: the item becomes due on or after this date. Invariant:
    /// never earlier than `created_date`.
    pub next_review_date: Date,
    /// Fine-grained re-exposure throttle within a single day.
    pub next_allowed_time: Option<Timestamp>,
    pub exposures_today: u32,
    pub last_exposure_time: Option<Timestamp>,
    pub learned_date: Option<Date>,
}

impl ProgressRecord {
    /// A fresh record for an item seen for the first time today.
    pub fn new(item_key: ItemKey, today: Date) -> Self {
        Self {
            item_key,
            status: Status::New,
            is_learned_once: false,
            review_count: 0,
            created_date: today,
            last_played_date: None,
            next_review_date: today,
            next_allowed_time: None,
            exposures_today: 0,
            last_exposure_time: None,
            learned_date: None,
        }
    }
}
