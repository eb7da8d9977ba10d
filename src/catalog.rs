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

//! Loading the vocabulary catalog. The engine treats the catalog as an
//! opaque, read-only list of `{word, category}` pairs; this module only
//! discovers and parses the files that hold it.

use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use walkdir::WalkDir;

use crate::config::CONFIG_FILE_NAME;
use crate::error::Fallible;
use crate::types::category::Category;
use crate::types::item_key::ItemKey;

#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct CatalogEntry {
    pub word: String,
    pub category: Category,
}

impl CatalogEntry {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.word.clone(), self.category.clone())
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    words: Vec<CatalogEntry>,
}

/// Load every `.toml` catalog file under the directory. Files are visited in
/// sorted path order so the catalog order is stable across runs; duplicate
/// keys keep their first occurrence.
pub fn load_catalog(directory: &Path) -> Fallible<Vec<CatalogEntry>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(directory) {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            if path.file_name().is_some_and(|name| name == CONFIG_FILE_NAME) {
                continue;
            }
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();

    let mut seen: HashSet<ItemKey> = HashSet::new();
    let mut catalog = Vec::new();
    for path in paths {
        let contents = std::fs::read_to_string(&path)?;
        let file: CatalogFile = toml::from_str(&contents)?;
        for entry in file.words {
            if seen.insert(entry.key()) {
                catalog.push(entry);
            }
        }
    }
    log::debug!("Loaded {} catalog entries.", catalog.len());
    Ok(catalog)
}
