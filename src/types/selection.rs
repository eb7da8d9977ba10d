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

use std::fmt::Display;
use std::fmt::Formatter;

use clap::ValueEnum;
use serde::Deserialize;
use serde::Serialize;

use crate::types::date::Date;
use crate::types::progress::ProgressRecord;

/// Target-size band for the daily selection.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Light,
    Moderate,
    Intense,
}

impl Severity {
    /// Inclusive bounds on the selection's target size.
    pub fn bounds(self) -> (usize, usize) {
        match self {
            Severity::Light => (15, 25),
            Severity::Moderate => (30, 50),
            Severity::Intense => (50, 100),
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Light => write!(f, "light"),
            Severity::Moderate => write!(f, "moderate"),
            Severity::Intense => write!(f, "intense"),
        }
    }
}

/// The learner's set for one calendar date. Rebuilt wholesale from the
/// current progress records, never patched in place.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct DailySelection {
    pub date: Date,
    pub new_words: Vec<ProgressRecord>,
    pub review_words: Vec<ProgressRecord>,
    pub total_count: u32,
    pub severity: Severity,
}

impl DailySelection {
    pub fn empty(date: Date, severity: Severity) -> Self {
        Self {
            date,
            new_words: Vec::new(),
            review_words: Vec::new(),
            total_count: 0,
            severity,
        }
    }
}
