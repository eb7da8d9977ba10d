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

use serde::Deserialize;
use serde::Serialize;

/// Selection weights for the categories that take part in weighted sampling.
/// Categories not listed here have weight zero and are only drawn on to fill
/// a shortfall.
const CATEGORY_WEIGHTS: &[(&str, f64)] = &[
    ("topic-vocabulary", 0.44),
    ("phrasal-verbs", 0.13),
    ("idioms", 0.07),
    ("grammar", 0.03),
    ("phrases-collocations", 0.05),
    ("word-formation", 0.06),
];

/// The category a catalog entry belongs to. Categories come from the catalog
/// as opaque strings; the engine only inspects them for selection weights.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn weight(&self) -> f64 {
        for (name, weight) in CATEGORY_WEIGHTS {
            if *name == self.0 {
                return *weight;
            }
        }
        0.0
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
