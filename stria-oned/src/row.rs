// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `row` module provides the run-length primitives every 1D symbology decoder is built on:
//! recording consecutive same-color runs and scoring them against expected module patterns.

use stria_core::errors::{not_found_error, Result};
use stria_core::io::BitArray;

/// Records consecutive same-color run lengths starting at `start`, beginning with the color at
/// `start`, until `counters` is filled or the row ends. Fails when the row ends before the
/// second-to-last counter.
pub fn record_pattern(row: &BitArray, start: usize, counters: &mut [usize]) -> Result<()> {
    let num_counters = counters.len();
    counters.fill(0);

    let end = row.len();
    if start >= end {
        return not_found_error();
    }

    let mut is_light = !row.get(start);
    let mut counter_position = 0;

    let mut i = start;
    while i < end {
        if row.get(i) != is_light {
            // Same color as the current run.
            counters[counter_position] += 1;
        }
        else {
            counter_position += 1;
            if counter_position == num_counters {
                break;
            }
            counters[counter_position] = 1;
            is_light = !is_light;
        }
        i += 1;
    }

    // The last run may be cut off by the row end; anything shorter is a failed read.
    if !(counter_position == num_counters
        || (counter_position == num_counters - 1 && i == end))
    {
        return not_found_error();
    }

    Ok(())
}

/// Records runs ending at `start`, walking leftward, then re-records them left to right.
pub fn record_pattern_in_reverse(
    row: &BitArray,
    start: usize,
    counters: &mut [usize],
) -> Result<()> {
    let mut num_transitions_left = counters.len() as isize;
    let mut last = row.get(start);
    let mut start = start;

    while start > 0 && num_transitions_left >= 0 {
        start -= 1;
        if row.get(start) != last {
            num_transitions_left -= 1;
            last = !last;
        }
    }

    if num_transitions_left >= 0 {
        return not_found_error();
    }

    record_pattern(row, start + 1, counters)
}

/// The average absolute deviation of `counters` from `pattern`, normalized to the total width.
/// Returns infinity when any single run deviates by more than `max_individual_variance` (a
/// fraction of the unit module width), or when there are fewer pixels than pattern modules.
///
/// `pattern` may be longer than `counters`; the extra trailing entries are ignored.
pub fn pattern_match_variance(
    counters: &[usize],
    pattern: &[usize],
    max_individual_variance: f32,
) -> f32 {
    let num_counters = counters.len();
    let mut total = 0;
    let mut pattern_length = 0;

    for i in 0..num_counters {
        total += counters[i];
        pattern_length += pattern[i];
    }

    if total < pattern_length {
        return f32::INFINITY;
    }

    let unit_bar_width = total as f32 / pattern_length as f32;
    let max_individual_variance = max_individual_variance * unit_bar_width;

    let mut total_variance = 0.0;
    for i in 0..num_counters {
        let scaled_pattern = pattern[i] as f32 * unit_bar_width;
        let variance = (counters[i] as f32 - scaled_pattern).abs();
        if variance > max_individual_variance {
            return f32::INFINITY;
        }
        total_variance += variance;
    }

    total_variance / total as f32
}

/// Builds a `BitArray` row from module run lengths, starting light. Test helper shared by the
/// per-symbology test modules.
#[cfg(test)]
pub fn row_of_runs(runs: &[usize], scale: usize) -> BitArray {
    let total: usize = runs.iter().sum();
    let mut row = BitArray::new(total * scale);

    let mut x = 0;
    let mut dark = false;
    for &run in runs {
        for _ in 0..run * scale {
            if dark {
                row.set(x);
            }
            x += 1;
        }
        dark = !dark;
    }

    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_record_pattern() {
        // light 4, dark 2, light 3, dark 5.
        let row = row_of_runs(&[4, 2, 3, 5], 1);

        let mut counters = [0usize; 3];
        record_pattern(&row, 4, &mut counters).unwrap();
        assert_eq!(counters, [2, 3, 5]);

        // Starting mid-run records the remainder of that run.
        record_pattern(&row, 5, &mut counters).unwrap();
        assert_eq!(counters, [1, 3, 5]);

        // More counters than transitions fails.
        let mut counters = [0usize; 5];
        assert!(record_pattern(&row, 4, &mut counters).is_err());
    }

    #[test]
    fn verify_record_pattern_in_reverse() {
        let row = row_of_runs(&[4, 2, 3, 5, 1], 1);

        // From inside the trailing light run, walk back over dark-5, light-3, dark-2.
        let mut counters = [0usize; 3];
        record_pattern_in_reverse(&row, 14, &mut counters).unwrap();
        assert_eq!(counters, [2, 3, 5]);
    }

    #[test]
    fn verify_pattern_match_variance() {
        // A perfect doubling of the pattern has zero variance.
        assert_eq!(pattern_match_variance(&[2, 2, 6], &[1, 1, 3], 0.7), 0.0);

        // A single wildly-off run is rejected outright.
        assert_eq!(pattern_match_variance(&[10, 2, 6], &[1, 1, 3], 0.7), f32::INFINITY);

        // Small deviations accumulate proportionally.
        let variance = pattern_match_variance(&[3, 2, 6], &[1, 1, 3], 0.9);
        assert!(variance > 0.0 && variance < 0.2);
    }
}
