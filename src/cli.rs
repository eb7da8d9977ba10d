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

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use serde::Serialize;

use crate::catalog::load_catalog;
use crate::config::load_config;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail;
use crate::session::Session;
use crate::store::ProgressStore;
use crate::summary::highest_streak;
use crate::sync::http::HttpRemote;
use crate::types::category::Category;
use crate::types::item_key::ItemKey;
use crate::types::selection::Severity;

#[derive(Parser)]
#[command(version, about, long_about = None)]
enum Command {
    /// Print today's selection.
    Today {
        /// Optional path to the collection directory.
        directory: Option<String>,
        #[arg(long)]
        severity: Option<Severity>,
        /// Rebuild the selection instead of returning the cached one.
        #[arg(long)]
        regenerate: bool,
    },
    /// Record a review outcome for a word.
    Review {
        word: String,
        category: String,
        directory: Option<String>,
        /// The learner got the word wrong.
        #[arg(long)]
        forgot: bool,
    },
    /// Mark a word as learned. Pushed to the remote store immediately.
    Learned {
        word: String,
        category: String,
        directory: Option<String>,
    },
    /// Print progress counters.
    Stats {
        directory: Option<String>,
    },
    /// Reconcile with the remote store now.
    Sync {
        directory: Option<String>,
    },
}

pub async fn entrypoint() -> Fallible<()> {
    let cli: Command = Command::parse();
    match cli {
        Command::Today {
            directory,
            severity,
            regenerate,
        } => {
            let mut session = open_session(directory).await?;
            let selection = if regenerate {
                session.regenerate_selection(severity)?
            } else {
                session.todays_selection(severity)?
            };
            println!(
                "{} words for {} ({} due, {} new):",
                selection.total_count,
                selection.date,
                selection.review_words.len(),
                selection.new_words.len()
            );
            for record in &selection.review_words {
                println!("  review  {}", record.item_key);
            }
            for record in &selection.new_words {
                println!("  new     {}", record.item_key);
            }
            // Listing the words counts as showing them.
            for record in selection.review_words.iter().chain(selection.new_words.iter()) {
                session.record_exposure(&record.item_key)?;
            }
            Ok(())
        }
        Command::Review {
            word,
            category,
            directory,
            forgot,
        } => {
            let started = Instant::now();
            let mut session = open_session(directory).await?;
            let key = ItemKey::new(word, Category::new(category));
            let record = session.record_review(&key, !forgot).await?;
            println!(
                "{}: review {} recorded, next review on {}.",
                record.item_key, record.review_count, record.next_review_date
            );
            session
                .record_usage(started.elapsed().as_millis() as i64)
                .await?;
            Ok(())
        }
        Command::Learned {
            word,
            category,
            directory,
        } => {
            let started = Instant::now();
            let mut session = open_session(directory).await?;
            let key = ItemKey::new(word, Category::new(category));
            let record = session.mark_learned(&key).await?;
            println!("{} marked as learned.", record.item_key);
            session
                .record_usage(started.elapsed().as_millis() as i64)
                .await?;
            Ok(())
        }
        Command::Stats { directory } => {
            let mut session = open_session(directory).await?;
            let summary = session.summary().await?;
            let stats = Stats {
                learning_count: summary.learning_count,
                learned_count: summary.learned_count,
                due_count: summary.due_count,
                remaining_count: summary.remaining_count,
                learning_time_hours: summary.learning_time_hours,
                learned_day_count: summary.learned_days.len(),
                highest_streak_days: highest_streak(&summary.learned_days),
            };
            let stats_json = serde_json::to_string_pretty(&stats)?;
            println!("{}", stats_json);
            Ok(())
        }
        Command::Sync { directory } => {
            let mut session = open_session(directory).await?;
            session.sync_now().await?;
            println!("Sync complete.");
            Ok(())
        }
    }
}

async fn open_session(directory: Option<String>) -> Fallible<Session<HttpRemote>> {
    let directory: PathBuf = match directory {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };
    if !directory.exists() {
        return fail("directory does not exist.");
    }

    let config = load_config(&directory)?;
    let catalog = load_catalog(&directory)?;

    let db_path = directory.join("vocadrill.db");
    let db_path = db_path
        .to_str()
        .ok_or_else(|| ErrorReport::new("invalid path"))?;
    let store = ProgressStore::open(db_path)?;

    let remote = config.remote_url.clone().map(HttpRemote::new);
    let mut session = Session::new(store, catalog, &config, remote)?;
    session.start().await?;
    Ok(session)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Stats {
    learning_count: u32,
    learned_count: u32,
    due_count: u32,
    remaining_count: u32,
    learning_time_hours: f64,
    learned_day_count: usize,
    highest_streak_days: u32,
}
