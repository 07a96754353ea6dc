// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `finder` module locates the three finder patterns of a QR symbol by scanning rows for the
//! 1:1:3:1:1 dark-light-dark-light-dark run signature and cross-checking candidates vertically,
//! horizontally, and diagonally.

use log::trace;

use stria_core::errors::{not_found_error, Result};
use stria_core::matrix::BitMatrix;
use stria_core::reading::{order_corners, Point};

/// A confirmed sighting is within this many rows of a prior sighting of the same center.
const CENTER_QUORUM: usize = 2;
/// The fewest modules a symbol can span: version 1 with its quiet zone neighborhood.
const MIN_SKIP: usize = 3;
/// The most modules a symbol can span: version 40.
const MAX_MODULES: usize = 177;

/// A candidate finder pattern center, refined as more rows confirm it.
#[derive(Copy, Clone, Debug)]
pub struct FinderPattern {
    pub x: f32,
    pub y: f32,
    pub estimated_module_size: f32,
    count: usize,
}

impl FinderPattern {
    fn about_equals(&self, module_size: f32, y: f32, x: f32) -> bool {
        if (y - self.y).abs() <= module_size && (x - self.x).abs() <= module_size {
            let size_difference = (module_size - self.estimated_module_size).abs();
            return size_difference <= 1.0 || size_difference <= self.estimated_module_size;
        }
        false
    }

    fn combine_estimate(&self, y: f32, x: f32, new_module_size: f32) -> FinderPattern {
        let combined_count = (self.count + 1) as f32;
        FinderPattern {
            x: (self.count as f32 * self.x + x) / combined_count,
            y: (self.count as f32 * self.y + y) / combined_count,
            estimated_module_size: (self.count as f32 * self.estimated_module_size
                + new_module_size)
                / combined_count,
            count: self.count + 1,
        }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// The three ordered finder patterns: bottom-left, top-left, top-right.
pub struct FinderPatternInfo {
    pub bottom_left: FinderPattern,
    pub top_left: FinderPattern,
    pub top_right: FinderPattern,
}

pub struct FinderPatternFinder<'a> {
    image: &'a BitMatrix,
    possible_centers: Vec<FinderPattern>,
}

type StateCount = [usize; 5];

impl<'a> FinderPatternFinder<'a> {
    pub fn new(image: &'a BitMatrix) -> Self {
        FinderPatternFinder { image, possible_centers: Vec::new() }
    }

    /// Scans the image and returns the three best finder patterns, ordered.
    pub fn find(mut self, try_harder: bool) -> Result<FinderPatternInfo> {
        let max_y = self.image.height();
        let max_x = self.image.width();

        // Look at roughly three rows per module of the smallest expected symbol. Under
        // try-harder, look at every third row regardless of image size.
        let mut skip = (3 * max_y) / (4 * MAX_MODULES);
        if skip < MIN_SKIP || try_harder {
            skip = MIN_SKIP;
        }

        let mut y = skip - 1;
        while y < max_y {
            let mut state_count: StateCount = [0; 5];
            let mut current_state = 0;

            for x in 0..max_x {
                if self.image.get(x, y) {
                    // Dark module.
                    if current_state & 1 == 1 {
                        current_state += 1;
                    }
                    state_count[current_state] += 1;
                }
                else if current_state & 1 == 0 {
                    // Light module while counting a dark run.
                    if current_state == 4 {
                        if found_pattern_cross(&state_count) {
                            if self.handle_possible_center(&state_count, y, x) {
                                skip = 2;
                            }
                            state_count = [0; 5];
                            current_state = 0;
                        }
                        else {
                            shift_counts(&mut state_count);
                            current_state = 3;
                        }
                    }
                    else {
                        current_state += 1;
                        state_count[current_state] += 1;
                    }
                }
                else {
                    // Light module continuing a light run.
                    state_count[current_state] += 1;
                }
            }

            if found_pattern_cross(&state_count) {
                self.handle_possible_center(&state_count, y, max_x);
            }

            y += skip;
        }

        let patterns = self.select_best_patterns()?;
        let [bottom_left, top_left, top_right] =
            order_corners([patterns[0].point(), patterns[1].point(), patterns[2].point()]);

        // Map the ordered points back onto their patterns.
        let find =
            |p: Point| patterns.iter().find(|fp| fp.x == p.x && fp.y == p.y).copied();

        match (find(bottom_left), find(top_left), find(top_right)) {
            (Some(bottom_left), Some(top_left), Some(top_right)) => {
                Ok(FinderPatternInfo { bottom_left, top_left, top_right })
            }
            _ => not_found_error(),
        }
    }

    /// Cross-checks a horizontal 1:1:3:1:1 sighting vertically, horizontally, and diagonally,
    /// then records or reinforces the candidate center.
    fn handle_possible_center(&mut self, state_count: &StateCount, y: usize, end_x: usize) -> bool {
        let state_count_total: usize = state_count.iter().sum();
        let center_x = center_from_end(state_count, end_x);

        let center_y = match self.cross_check_vertical(
            y,
            center_x as usize,
            state_count[2],
            state_count_total,
        ) {
            Some(center_y) => center_y,
            None => return false,
        };

        // Re-cross-check horizontally at the refined row.
        let center_x = match self.cross_check_horizontal(
            center_x as usize,
            center_y as usize,
            state_count[2],
            state_count_total,
        ) {
            Some(center_x) => center_x,
            None => return false,
        };

        if !self.cross_check_diagonal(center_y as usize, center_x as usize) {
            return false;
        }

        let estimated_module_size = state_count_total as f32 / 7.0;

        for center in self.possible_centers.iter_mut() {
            if center.about_equals(estimated_module_size, center_y, center_x) {
                *center = center.combine_estimate(center_y, center_x, estimated_module_size);
                return true;
            }
        }

        trace!("finder candidate at ({:.1}, {:.1})", center_x, center_y);
        self.possible_centers.push(FinderPattern {
            x: center_x,
            y: center_y,
            estimated_module_size,
            count: 1,
        });

        false
    }

    fn cross_check_vertical(
        &self,
        start_y: usize,
        center_x: usize,
        max_count: usize,
        original_total: usize,
    ) -> Option<f32> {
        let image = self.image;
        let max_y = image.height();
        let mut state_count: StateCount = [0; 5];

        // Count up from the center.
        let mut y = start_y as isize;
        while y >= 0 && image.get(center_x, y as usize) {
            state_count[2] += 1;
            y -= 1;
        }
        if y < 0 {
            return None;
        }
        while y >= 0 && !image.get(center_x, y as usize) && state_count[1] <= max_count {
            state_count[1] += 1;
            y -= 1;
        }
        if y < 0 || state_count[1] > max_count {
            return None;
        }
        while y >= 0 && image.get(center_x, y as usize) && state_count[0] <= max_count {
            state_count[0] += 1;
            y -= 1;
        }
        if state_count[0] > max_count {
            return None;
        }

        // Count down from the center.
        let mut y = start_y + 1;
        while y < max_y && image.get(center_x, y) {
            state_count[2] += 1;
            y += 1;
        }
        if y == max_y {
            return None;
        }
        while y < max_y && !image.get(center_x, y) && state_count[3] < max_count {
            state_count[3] += 1;
            y += 1;
        }
        if y == max_y || state_count[3] >= max_count {
            return None;
        }
        while y < max_y && image.get(center_x, y) && state_count[4] < max_count {
            state_count[4] += 1;
            y += 1;
        }
        if state_count[4] >= max_count {
            return None;
        }

        // The vertical run must be commensurate with the horizontal one.
        let total: usize = state_count.iter().sum();
        if 5 * total.abs_diff(original_total) >= 2 * original_total {
            return None;
        }

        if found_pattern_cross(&state_count) {
            Some(center_from_end(&state_count, y))
        }
        else {
            None
        }
    }

    fn cross_check_horizontal(
        &self,
        start_x: usize,
        center_y: usize,
        max_count: usize,
        original_total: usize,
    ) -> Option<f32> {
        let image = self.image;
        let max_x = image.width();
        let mut state_count: StateCount = [0; 5];

        let mut x = start_x as isize;
        while x >= 0 && image.get(x as usize, center_y) {
            state_count[2] += 1;
            x -= 1;
        }
        if x < 0 {
            return None;
        }
        while x >= 0 && !image.get(x as usize, center_y) && state_count[1] <= max_count {
            state_count[1] += 1;
            x -= 1;
        }
        if x < 0 || state_count[1] > max_count {
            return None;
        }
        while x >= 0 && image.get(x as usize, center_y) && state_count[0] <= max_count {
            state_count[0] += 1;
            x -= 1;
        }
        if state_count[0] > max_count {
            return None;
        }

        let mut x = start_x + 1;
        while x < max_x && image.get(x, center_y) {
            state_count[2] += 1;
            x += 1;
        }
        if x == max_x {
            return None;
        }
        while x < max_x && !image.get(x, center_y) && state_count[3] < max_count {
            state_count[3] += 1;
            x += 1;
        }
        if x == max_x || state_count[3] >= max_count {
            return None;
        }
        while x < max_x && image.get(x, center_y) && state_count[4] < max_count {
            state_count[4] += 1;
            x += 1;
        }
        if state_count[4] >= max_count {
            return None;
        }

        let total: usize = state_count.iter().sum();
        if 5 * total.abs_diff(original_total) >= original_total {
            return None;
        }

        if found_pattern_cross(&state_count) {
            Some(center_from_end(&state_count, x))
        }
        else {
            None
        }
    }

    /// A cheap diagonal pass that rejects features that look right both horizontally and
    /// vertically but are not square.
    fn cross_check_diagonal(&self, center_y: usize, center_x: usize) -> bool {
        let image = self.image;
        let mut state_count: StateCount = [0; 5];

        // Up-left from the center.
        let mut i = 0;
        while center_x >= i && center_y >= i && image.get(center_x - i, center_y - i) {
            state_count[2] += 1;
            i += 1;
        }
        if state_count[2] == 0 {
            return false;
        }
        while center_x >= i && center_y >= i && !image.get(center_x - i, center_y - i) {
            state_count[1] += 1;
            i += 1;
        }
        if state_count[1] == 0 {
            return false;
        }
        while center_x >= i && center_y >= i && image.get(center_x - i, center_y - i) {
            state_count[0] += 1;
            i += 1;
        }
        if state_count[0] == 0 {
            return false;
        }

        let max_x = image.width();
        let max_y = image.height();

        // Down-right from the center.
        let mut i = 1;
        while center_x + i < max_x && center_y + i < max_y && image.get(center_x + i, center_y + i)
        {
            state_count[2] += 1;
            i += 1;
        }
        while center_x + i < max_x
            && center_y + i < max_y
            && !image.get(center_x + i, center_y + i)
        {
            state_count[3] += 1;
            i += 1;
        }
        if state_count[3] == 0 {
            return false;
        }
        while center_x + i < max_x && center_y + i < max_y && image.get(center_x + i, center_y + i)
        {
            state_count[4] += 1;
            i += 1;
        }
        if state_count[4] == 0 {
            return false;
        }

        found_pattern_cross(&state_count)
    }

    /// Keeps the three most-confirmed candidates after discarding module size outliers.
    fn select_best_patterns(&mut self) -> Result<[FinderPattern; 3]> {
        let start_size = self.possible_centers.len();
        if start_size < 3 {
            return not_found_error();
        }

        if start_size > 3 {
            // Discard centers whose module size strays furthest from the mean.
            let total: f32 =
                self.possible_centers.iter().map(|c| c.estimated_module_size).sum();
            let square: f32 = self
                .possible_centers
                .iter()
                .map(|c| c.estimated_module_size * c.estimated_module_size)
                .sum();
            let average = total / start_size as f32;
            let std_dev = (square / start_size as f32 - average * average).sqrt();
            let limit = (0.2 * average).max(std_dev);

            self.possible_centers.sort_by(|a, b| {
                let da = (a.estimated_module_size - average).abs();
                let db = (b.estimated_module_size - average).abs();
                db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut i = 0;
            while i < self.possible_centers.len() && self.possible_centers.len() > 3 {
                if (self.possible_centers[i].estimated_module_size - average).abs() > limit {
                    self.possible_centers.remove(i);
                }
                else {
                    i += 1;
                }
            }
        }

        if self.possible_centers.len() > 3 {
            let total: f32 =
                self.possible_centers.iter().map(|c| c.estimated_module_size).sum();
            let average = total / self.possible_centers.len() as f32;

            // Most confirmations first, then the most typical module size.
            self.possible_centers.sort_by(|a, b| {
                b.count.cmp(&a.count).then_with(|| {
                    let da = (a.estimated_module_size - average).abs();
                    let db = (b.estimated_module_size - average).abs();
                    da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
                })
            });
            self.possible_centers.truncate(3);
        }

        // A center seen on only one scan row is noise more often than signal.
        if self.possible_centers.iter().filter(|c| c.count >= CENTER_QUORUM).count() < 3 {
            return not_found_error();
        }

        Ok([self.possible_centers[0], self.possible_centers[1], self.possible_centers[2]])
    }
}

/// The center of the run ending at `end`: step back over the two trailing runs and half the
/// middle one.
fn center_from_end(state_count: &StateCount, end: usize) -> f32 {
    (end - state_count[4] - state_count[3]) as f32 - state_count[2] as f32 / 2.0
}

/// Checks the 1:1:3:1:1 ratio, allowing each run to deviate by up to half a module.
fn found_pattern_cross(state_count: &StateCount) -> bool {
    let total: usize = state_count.iter().sum();
    if total < 7 {
        return false;
    }

    let module_size = total as f32 / 7.0;
    let max_variance = module_size / 2.0;

    (module_size - state_count[0] as f32).abs() < max_variance
        && (module_size - state_count[1] as f32).abs() < max_variance
        && (3.0 * module_size - state_count[2] as f32).abs() < 3.0 * max_variance
        && (module_size - state_count[3] as f32).abs() < max_variance
        && (module_size - state_count[4] as f32).abs() < max_variance
}

/// Drops the first two runs: the tail of a failed match may be the head of the next.
fn shift_counts(state_count: &mut StateCount) {
    state_count[0] = state_count[2];
    state_count[1] = state_count[3];
    state_count[2] = state_count[4];
    state_count[3] = 1;
    state_count[4] = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Draws a 7x7 finder pattern with its top-left module corner at (left, top), scaled.
    fn draw_finder(image: &mut BitMatrix, left: usize, top: usize, scale: usize) {
        const PATTERN: [[u8; 7]; 7] = [
            [1, 1, 1, 1, 1, 1, 1],
            [1, 0, 0, 0, 0, 0, 1],
            [1, 0, 1, 1, 1, 0, 1],
            [1, 0, 1, 1, 1, 0, 1],
            [1, 0, 1, 1, 1, 0, 1],
            [1, 0, 0, 0, 0, 0, 1],
            [1, 1, 1, 1, 1, 1, 1],
        ];

        for (dy, row) in PATTERN.iter().enumerate() {
            for (dx, &v) in row.iter().enumerate() {
                if v == 1 {
                    for sy in 0..scale {
                        for sx in 0..scale {
                            image.set(left + dx * scale + sx, top + dy * scale + sy);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn verify_finds_three_patterns() {
        let mut image = BitMatrix::new(200, 200);
        // Version-1-like layout at 4 pixels per module.
        draw_finder(&mut image, 20, 20, 4);
        draw_finder(&mut image, 120, 20, 4);
        draw_finder(&mut image, 20, 120, 4);

        let info = FinderPatternFinder::new(&image).find(true).unwrap();

        // Centers are mid-pattern: corner + 3.5 modules * 4 px.
        assert!((info.top_left.x - 34.0).abs() < 2.0);
        assert!((info.top_left.y - 34.0).abs() < 2.0);
        assert!((info.top_right.x - 134.0).abs() < 2.0);
        assert!((info.top_right.y - 34.0).abs() < 2.0);
        assert!((info.bottom_left.x - 34.0).abs() < 2.0);
        assert!((info.bottom_left.y - 134.0).abs() < 2.0);
    }

    #[test]
    fn verify_blank_image_not_found() {
        let image = BitMatrix::new(100, 100);
        assert!(FinderPatternFinder::new(&image).find(true).is_err());
    }
}
