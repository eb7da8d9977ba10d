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

//! Building the learner's daily set: every due review, plus new items chosen
//! by category-weighted sampling up to the severity's target size.

use std::collections::BTreeMap;
use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::catalog::CatalogEntry;
use crate::error::Fallible;
use crate::scheduler::refresh_status;
use crate::store::ProgressStore;
use crate::types::category::Category;
use crate::types::date::Date;
use crate::types::progress::ProgressRecord;
use crate::types::progress::Status;
use crate::types::selection::DailySelection;
use crate::types::selection::Severity;

/// The selection for `today`. Cached: a second call on the same date returns
/// the stored selection unchanged.
pub fn select(
    store: &ProgressStore,
    catalog: &[CatalogEntry],
    severity: Severity,
    today: Date,
    rng: &mut impl Rng,
) -> Fallible<DailySelection> {
    if let Some(cached) = store.selection_for(today)? {
        log::debug!("Returning cached selection for {today}.");
        return Ok(cached);
    }
    build_selection(store, catalog, severity, today, rng)
}

/// Rebuild today's selection from current progress state, replacing the
/// cached one.
pub fn regenerate(
    store: &ProgressStore,
    catalog: &[CatalogEntry],
    severity: Severity,
    today: Date,
    rng: &mut impl Rng,
) -> Fallible<DailySelection> {
    build_selection(store, catalog, severity, today, rng)
}

fn build_selection(
    store: &ProgressStore,
    catalog: &[CatalogEntry],
    severity: Severity,
    today: Date,
    rng: &mut impl Rng,
) -> Fallible<DailySelection> {
    if catalog.is_empty() {
        let selection = DailySelection::empty(today, severity);
        store.put_selection(&selection)?;
        return Ok(selection);
    }

    // Every catalog item gets a record, and every record's dueness is
    // recomputed against today before it is used.
    let mut records: Vec<ProgressRecord> = Vec::with_capacity(catalog.len());
    for entry in catalog {
        let key = entry.key();
        let stored = store.get(&key)?;
        let mut record = match stored.clone() {
            Some(record) => record,
            None => ProgressRecord::new(key, today),
        };
        refresh_status(&mut record, today);
        if stored.as_ref() != Some(&record) {
            store.put(&record)?;
        }
        records.push(record);
    }

    // All due items, earliest due date first, ties broken by catalog order.
    // The due set is never truncated.
    let mut due: Vec<(usize, &ProgressRecord)> = records
        .iter()
        .enumerate()
        .filter(|(_, record)| record.status == Status::Due)
        .collect();
    due.sort_by(|(ia, a), (ib, b)| a.next_review_date.cmp(&b.next_review_date).then(ia.cmp(ib)));
    let review_words: Vec<ProgressRecord> = due
        .into_iter()
        .map(|(_, record)| record.clone())
        .collect();

    let (lo, hi) = severity.bounds();
    let target_total = rng.gen_range(lo..=hi).min(catalog.len());
    let remaining_slots = target_total.saturating_sub(review_words.len());

    let candidates: Vec<ProgressRecord> = records
        .iter()
        .filter(|record| record.status == Status::New)
        .cloned()
        .collect();
    let new_words = sample_new_words(&candidates, remaining_slots, rng);

    let total_count = (review_words.len() + new_words.len()) as u32;
    log::debug!(
        "Built selection for {today}: {} due, {} new (target {target_total}).",
        review_words.len(),
        new_words.len()
    );
    let selection = DailySelection {
        date: today,
        new_words,
        review_words,
        total_count,
        severity,
    };
    store.put_selection(&selection)?;
    Ok(selection)
}

/// Category-weighted sampling of new items. Each weighted category gets a
/// quota of `round(slots × weight)`, filled from a shuffle of its items;
/// any shortfall is filled uniformly at random from the unused remainder.
fn sample_new_words(
    candidates: &[ProgressRecord],
    remaining_slots: usize,
    rng: &mut impl Rng,
) -> Vec<ProgressRecord> {
    if remaining_slots == 0 || candidates.is_empty() {
        return Vec::new();
    }

    let mut by_category: BTreeMap<Category, Vec<usize>> = BTreeMap::new();
    for (index, record) in candidates.iter().enumerate() {
        by_category
            .entry(record.item_key.category().clone())
            .or_default()
            .push(index);
    }

    let mut taken: Vec<usize> = Vec::new();
    let mut used: HashSet<usize> = HashSet::new();
    for (category, mut indices) in by_category {
        let weight = category.weight();
        if weight == 0.0 {
            continue;
        }
        let quota = ((remaining_slots as f64) * weight).round() as usize;
        indices.shuffle(rng);
        for index in indices.into_iter().take(quota) {
            if taken.len() >= remaining_slots {
                break;
            }
            if used.insert(index) {
                taken.push(index);
            }
        }
    }

    if taken.len() < remaining_slots {
        let mut rest: Vec<usize> = (0..candidates.len())
            .filter(|index| !used.contains(index))
            .collect();
        rest.shuffle(rng);
        for index in rest {
            if taken.len() >= remaining_slots {
                break;
            }
            taken.push(index);
        }
    }

    taken
        .into_iter()
        .map(|index| candidates[index].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::scheduler::apply_correct_review;
    use crate::types::item_key::ItemKey;
    use crate::types::timestamp::Timestamp;

    use super::*;

    fn entry(word: &str, category: &str) -> CatalogEntry {
        CatalogEntry {
            word: word.to_string(),
            category: Category::new(category),
        }
    }

    fn small_catalog() -> Vec<CatalogEntry> {
        vec![
            entry("environment", "topic-vocabulary"),
            entry("technology", "topic-vocabulary"),
            entry("take off", "phrasal-verbs"),
            entry("break the ice", "idioms"),
            entry("happiness", "word-formation"),
        ]
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_empty_catalog_is_empty_selection() -> Fallible<()> {
        let store = ProgressStore::open_in_memory()?;
        let today = Date::from_ymd(2026, 3, 1);
        let selection = select(&store, &[], Severity::Light, today, &mut rng())?;
        assert_eq!(selection.total_count, 0);
        Ok(())
    }

    #[test]
    fn test_small_catalog_clamps_target() -> Fallible<()> {
        let store = ProgressStore::open_in_memory()?;
        let today = Date::from_ymd(2026, 3, 1);
        let catalog = small_catalog();
        let selection = select(&store, &catalog, Severity::Light, today, &mut rng())?;
        // Five items, empty progress store: all five are new, none due.
        assert_eq!(selection.new_words.len(), 5);
        assert!(selection.review_words.is_empty());
        assert_eq!(selection.total_count, 5);
        Ok(())
    }

    #[test]
    fn test_selection_creates_records() -> Fallible<()> {
        let store = ProgressStore::open_in_memory()?;
        let today = Date::from_ymd(2026, 3, 1);
        let catalog = small_catalog();
        select(&store, &catalog, Severity::Light, today, &mut rng())?;
        let records = store.all_records()?;
        assert_eq!(records.len(), 5);
        for entry in &catalog {
            assert_eq!(records.get(&entry.key()).unwrap().status, Status::New);
        }
        Ok(())
    }

    #[test]
    fn test_cached_selection_is_returned_unchanged() -> Fallible<()> {
        let store = ProgressStore::open_in_memory()?;
        let today = Date::from_ymd(2026, 3, 1);
        let catalog = small_catalog();
        let first = select(&store, &catalog, Severity::Light, today, &mut rng())?;
        // A different seed, and even a different severity: same day, same set.
        let mut other = StdRng::seed_from_u64(99);
        let second = select(&store, &catalog, Severity::Intense, today, &mut other)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_regenerate_rebuilds_from_current_state() -> Fallible<()> {
        let store = ProgressStore::open_in_memory()?;
        let today = Date::from_ymd(2026, 3, 1);
        let catalog = small_catalog();
        let first = select(&store, &catalog, Severity::Light, today, &mut rng())?;
        assert_eq!(first.new_words.len(), 5);

        // Review one item; regeneration sees the updated record.
        let key = catalog[0].key();
        let mut record = store.get(&key)?.unwrap();
        apply_correct_review(&mut record, Timestamp::now(), today);
        store.put(&record)?;

        let second = regenerate(&store, &catalog, Severity::Light, today, &mut rng())?;
        assert_eq!(second.new_words.len(), 4);
        assert!(!second.new_words.iter().any(|r| r.item_key == key));
        Ok(())
    }

    #[test]
    fn test_due_items_are_never_dropped() -> Fallible<()> {
        let store = ProgressStore::open_in_memory()?;
        let today = Date::from_ymd(2026, 3, 10);
        let catalog = small_catalog();

        // One overdue item.
        let key = catalog[2].key();
        let mut record = ProgressRecord::new(key.clone(), today.plus_days(-5));
        apply_correct_review(&mut record, Timestamp::now(), today.plus_days(-5));
        store.put(&record)?;

        let selection = select(&store, &catalog, Severity::Light, today, &mut rng())?;
        assert_eq!(selection.review_words.len(), 1);
        assert_eq!(selection.review_words[0].item_key, key);
        assert_eq!(selection.review_words[0].status, Status::Due);
        Ok(())
    }

    #[test]
    fn test_due_set_is_complete_and_ordered() -> Fallible<()> {
        let store = ProgressStore::open_in_memory()?;
        let today = Date::from_ymd(2026, 3, 20);
        let catalog = small_catalog();

        // Three overdue items with different review dates.
        for (index, offset) in [(0usize, -1i64), (2, -10), (3, -4)] {
            let start = today.plus_days(offset - 1);
            let mut record = ProgressRecord::new(catalog[index].key(), start);
            apply_correct_review(&mut record, Timestamp::now(), start);
            store.put(&record)?;
        }

        let selection = select(&store, &catalog, Severity::Light, today, &mut rng())?;
        let due_keys: Vec<ItemKey> = selection
            .review_words
            .iter()
            .map(|record| record.item_key.clone())
            .collect();
        // Earliest due date first.
        assert_eq!(
            due_keys,
            vec![catalog[2].key(), catalog[3].key(), catalog[0].key()]
        );
        Ok(())
    }

    #[test]
    fn test_weighted_quotas_fill_exactly() {
        let today = Date::from_ymd(2026, 3, 1);
        let categories = [
            "topic-vocabulary",
            "phrasal-verbs",
            "idioms",
            "grammar",
            "phrases-collocations",
            "word-formation",
        ];
        let mut candidates = Vec::new();
        for category in categories {
            for n in 0..10 {
                let key = ItemKey::new(format!("{category}-{n}"), Category::new(category));
                candidates.push(ProgressRecord::new(key, today));
            }
        }
        // Weights sum below 1.0, so the weighted pass underfills and the
        // shortfall fill tops the set up to exactly the slot count.
        let selected = sample_new_words(&candidates, 5, &mut rng());
        assert_eq!(selected.len(), 5);
        let distinct: HashSet<ItemKey> =
            selected.iter().map(|record| record.item_key.clone()).collect();
        assert_eq!(distinct.len(), 5);
    }

    #[test]
    fn test_unweighted_categories_fill_shortfall_only() {
        let today = Date::from_ymd(2026, 3, 1);
        let mut candidates = Vec::new();
        for n in 0..20 {
            let key = ItemKey::new(format!("word-{n}"), Category::new("slang"));
            candidates.push(ProgressRecord::new(key, today));
        }
        let selected = sample_new_words(&candidates, 8, &mut rng());
        // No weighted candidates at all: the whole set comes from the fill.
        assert_eq!(selected.len(), 8);
    }

    #[test]
    fn test_scarce_catalog_takes_everything() {
        let today = Date::from_ymd(2026, 3, 1);
        let candidates = vec![
            ProgressRecord::new(
                ItemKey::new("environment", Category::new("topic-vocabulary")),
                today,
            ),
            ProgressRecord::new(ItemKey::new("take off", Category::new("phrasal-verbs")), today),
        ];
        let selected = sample_new_words(&candidates, 10, &mut rng());
        assert_eq!(selected.len(), 2);
    }
}
