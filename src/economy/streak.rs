// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Streak arithmetic over UTC days.

use chrono::NaiveDate;

/// Streak value after writing an entry on `today`.
///
/// Consecutive-day writing extends the streak by one; any gap resets it to
/// one. The day-uniqueness guard upstream means `today` can never equal the
/// last entry date, but a same-day call is still a no-op rather than a
/// double count.
pub fn advance(last_entry_date: Option<NaiveDate>, today: NaiveDate, current: u32) -> u32 {
    match last_entry_date {
        None => 1,
        Some(last) if last == today => current.max(1),
        Some(last) if today - last == chrono::Duration::days(1) => current + 1,
        Some(_) => 1,
    }
}

/// Longest streak never decreases.
pub fn longest(previous_longest: u32, current: u32) -> u32 {
    previous_longest.max(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, d).unwrap()
    }

    #[test]
    fn first_entry_starts_at_one() {
        assert_eq!(advance(None, day(10), 0), 1);
    }

    #[test]
    fn consecutive_day_extends() {
        assert_eq!(advance(Some(day(9)), day(10), 4), 5);
    }

    #[test]
    fn gap_resets_to_one() {
        assert_eq!(advance(Some(day(7)), day(10), 4), 1);
    }

    #[test]
    fn same_day_does_not_double_count() {
        assert_eq!(advance(Some(day(10)), day(10), 4), 4);
    }

    #[test]
    fn longest_is_monotonic() {
        assert_eq!(longest(10, 3), 10);
        assert_eq!(longest(3, 10), 10);
    }
}
