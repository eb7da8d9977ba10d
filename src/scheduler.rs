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

//! The review-interval state machine. Pure: "today" and "now" are always
//! explicit parameters, the clock is never read here.

use crate::types::date::Date;
use crate::types::progress::ProgressRecord;
use crate::types::progress::Status;
use crate::types::timestamp::Timestamp;

/// Review intervals, in days, indexed by review count. Saturates at the
/// final entry for every later review.
const REVIEW_INTERVALS_DAYS: &[i64] = &[1, 2, 4, 7];

/// Minutes a just-reviewed item is withheld from re-exposure, indexed by
/// review count. Saturates at `MAX_EXPOSURE_DELAY_MINUTES`.
const EXPOSURE_DELAYS_MINUTES: &[i64] = &[0, 5, 7, 10, 15, 30, 60, 90, 120];

const MAX_EXPOSURE_DELAY_MINUTES: i64 = 180;

/// Long-tail sentinel: retired items are pushed this far out so they never
/// resurface as due.
const RETIRED_INTERVAL_DAYS: i64 = 100;

/// Days until the next review after the `review_count`-th review. A count of
/// zero clamps to the first interval.
pub fn review_interval_days(review_count: u32) -> i64 {
    let index = (review_count.max(1) as usize - 1).min(REVIEW_INTERVALS_DAYS.len() - 1);
    REVIEW_INTERVALS_DAYS[index]
}

pub fn next_review_date(review_count: u32, today: Date) -> Date {
    today.plus_days(review_interval_days(review_count))
}

fn exposure_delay_minutes(review_count: u32) -> i64 {
    let index = review_count.max(1) as usize - 1;
    if index < EXPOSURE_DELAYS_MINUTES.len() {
        EXPOSURE_DELAYS_MINUTES[index]
    } else {
        MAX_EXPOSURE_DELAY_MINUTES
    }
}

/// Apply a successful review: the item joins the review track and is not due
/// again until its next review date.
pub fn apply_correct_review(record: &mut ProgressRecord, now: Timestamp, today: Date) {
    record.last_played_date = Some(today);
    record.is_learned_once = true;
    record.review_count = record.review_count.saturating_add(1);
    record.next_review_date = next_review_date(record.review_count, today);
    record.next_allowed_time = Some(now.plus_minutes(exposure_delay_minutes(record.review_count)));
    record.status = Status::NotDue;
}

/// Apply a failed review: the interval resets to one day. The review count is
/// monotonic and does not move backwards.
pub fn apply_incorrect_review(record: &mut ProgressRecord, now: Timestamp, today: Date) {
    record.last_played_date = Some(today);
    record.next_review_date = today.plus_days(1);
    record.next_allowed_time = Some(now.plus_minutes(exposure_delay_minutes(1)));
    if record.status.on_review_track() {
        record.status = Status::NotDue;
    }
}

/// Explicitly mark an item learned.
pub fn retire(record: &mut ProgressRecord, today: Date) {
    record.status = Status::Retired;
    record.learned_date = Some(today);
    record.next_review_date = today.plus_days(RETIRED_INTERVAL_DAYS);
}

/// Reclassify a record's dueness against `today`. Persisted dueness is never
/// authoritative; this pass runs over every record before each selection.
/// Also rolls the per-day exposure counters over at the day boundary.
pub fn refresh_status(record: &mut ProgressRecord, today: Date) {
    if record.status.on_review_track() {
        record.status = if record.next_review_date <= today {
            Status::Due
        } else {
            Status::NotDue
        };
    }
    let last_exposure_day = record.last_exposure_time.map(|ts| ts.local_date());
    if record.exposures_today > 0 && last_exposure_day != Some(today) {
        record.exposures_today = 0;
    }
}

#[cfg(test)]
mod tests {
    use crate::types::category::Category;
    use crate::types::item_key::ItemKey;

    use super::*;

    fn record(today: Date) -> ProgressRecord {
        let key = ItemKey::new("environment", Category::new("topic-vocabulary"));
        ProgressRecord::new(key, today)
    }

    #[test]
    fn test_interval_staircase() {
        assert_eq!(review_interval_days(1), 1);
        assert_eq!(review_interval_days(2), 2);
        assert_eq!(review_interval_days(3), 4);
        assert_eq!(review_interval_days(4), 7);
        assert_eq!(review_interval_days(5), 7);
        assert_eq!(review_interval_days(100), 7);
    }

    #[test]
    fn test_interval_clamps_at_zero() {
        assert_eq!(review_interval_days(0), 1);
    }

    #[test]
    fn test_interval_monotonicity() {
        let today = Date::from_ymd(2026, 3, 1);
        for n in 0..50u32 {
            assert!(next_review_date(n + 1, today) >= next_review_date(n, today));
        }
        // The staircase saturates at seven days.
        for n in 4..50u32 {
            assert_eq!(next_review_date(n, today), today.plus_days(7));
        }
    }

    #[test]
    fn test_first_correct_review() {
        let today = Date::from_ymd(2026, 3, 1);
        let mut r = record(today);
        apply_correct_review(&mut r, Timestamp::now(), today);
        assert_eq!(r.review_count, 1);
        assert_eq!(r.next_review_date, today.plus_days(1));
        assert!(r.is_learned_once);
        assert!(r.status.on_review_track());
        assert_eq!(r.last_played_date, Some(today));
    }

    #[test]
    fn test_review_track_progression() {
        let today = Date::from_ymd(2026, 3, 1);
        let mut r = record(today);
        for expected_days in [1, 2, 4, 7, 7] {
            apply_correct_review(&mut r, Timestamp::now(), today);
            assert_eq!(r.next_review_date, today.plus_days(expected_days));
        }
        assert_eq!(r.review_count, 5);
    }

    #[test]
    fn test_incorrect_review_resets_interval() {
        let today = Date::from_ymd(2026, 3, 1);
        let mut r = record(today);
        for _ in 0..4 {
            apply_correct_review(&mut r, Timestamp::now(), today);
        }
        assert_eq!(r.next_review_date, today.plus_days(7));
        apply_incorrect_review(&mut r, Timestamp::now(), today);
        assert_eq!(r.next_review_date, today.plus_days(1));
        // The count never moves backwards.
        assert_eq!(r.review_count, 4);
    }

    #[test]
    fn test_retire_sets_sentinel() {
        let today = Date::from_ymd(2026, 3, 1);
        let mut r = record(today);
        retire(&mut r, today);
        assert_eq!(r.status, Status::Retired);
        assert_eq!(r.learned_date, Some(today));
        assert_eq!(r.next_review_date, today.plus_days(100));
    }

    #[test]
    fn test_refresh_reclassifies_dueness() {
        let today = Date::from_ymd(2026, 3, 10);
        let mut r = record(today);
        apply_correct_review(&mut r, Timestamp::now(), today);
        refresh_status(&mut r, today);
        assert_eq!(r.status, Status::NotDue);
        refresh_status(&mut r, today.plus_days(1));
        assert_eq!(r.status, Status::Due);
        // Overdue stays due.
        refresh_status(&mut r, today.plus_days(30));
        assert_eq!(r.status, Status::Due);
    }

    #[test]
    fn test_refresh_leaves_new_and_terminal_alone() {
        let today = Date::from_ymd(2026, 3, 1);
        let mut r = record(today);
        refresh_status(&mut r, today.plus_days(5));
        assert_eq!(r.status, Status::New);
        retire(&mut r, today);
        refresh_status(&mut r, today.plus_days(365));
        assert_eq!(r.status, Status::Retired);
    }

    #[test]
    fn test_exposure_delay_saturates() {
        assert_eq!(exposure_delay_minutes(1), 0);
        assert_eq!(exposure_delay_minutes(2), 5);
        assert_eq!(exposure_delay_minutes(9), 120);
        assert_eq!(exposure_delay_minutes(10), 180);
        assert_eq!(exposure_delay_minutes(1000), 180);
    }
}
