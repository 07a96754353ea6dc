// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `alignment` module locates an alignment pattern near an extrapolated position.
//!
//! The scan matches the light-dark-light 1:1:1 cross-section through the pattern's center
//! module; the outer dark ring merges with neighboring data modules too often for a five-run
//! match to be reliable.

use stria_core::errors::{not_found_error, Result};
use stria_core::matrix::BitMatrix;
use stria_core::reading::Point;

pub struct AlignmentPatternFinder<'a> {
    image: &'a BitMatrix,
    start_x: usize,
    start_y: usize,
    width: usize,
    height: usize,
    module_size: f32,
    possible_centers: Vec<(f32, f32, f32)>,
}

type StateCount = [usize; 3];

impl<'a> AlignmentPatternFinder<'a> {
    pub fn new(
        image: &'a BitMatrix,
        start_x: usize,
        start_y: usize,
        width: usize,
        height: usize,
        module_size: f32,
    ) -> Self {
        AlignmentPatternFinder {
            image,
            start_x,
            start_y,
            width,
            height,
            module_size,
            possible_centers: Vec::new(),
        }
    }

    /// Scans the region rows middle-out, since the extrapolated position is likeliest to be
    /// right. Returns the first center sighted twice, or the best single sighting when nothing
    /// is confirmed.
    pub fn find(mut self) -> Result<Point> {
        let middle_y = self.start_y + self.height / 2;

        for offset in 0..self.height {
            let y = if offset & 1 == 0 {
                middle_y + (offset + 1) / 2
            }
            else {
                match middle_y.checked_sub((offset + 1) / 2) {
                    Some(y) => y,
                    None => continue,
                }
            };
            if y >= self.image.height() {
                continue;
            }

            if let Some(point) = self.scan_row(y) {
                return Ok(point);
            }
        }

        if let Some(&(x, y, _)) = self.possible_centers.first() {
            return Ok(Point::new(x, y));
        }

        not_found_error()
    }

    /// Walks one row's runs looking for light-dark-light in 1:1:1 module proportions.
    fn scan_row(&mut self, y: usize) -> Option<Point> {
        let max_x = (self.start_x + self.width).min(self.image.width());
        let mut x = self.start_x;

        // Burn off a leading dark run; its start is outside the window and cannot be measured.
        while x < max_x && self.image.get(x, y) {
            x += 1;
        }

        while x < max_x {
            let light1_start = x;
            while x < max_x && !self.image.get(x, y) {
                x += 1;
            }
            let light1 = x - light1_start;
            if x == max_x {
                return None;
            }

            let dark_start = x;
            while x < max_x && self.image.get(x, y) {
                x += 1;
            }
            let dark = x - dark_start;
            if x == max_x {
                return None;
            }

            let light2_start = x;
            while x < max_x && !self.image.get(x, y) {
                x += 1;
            }
            let light2 = x - light2_start;

            let state_count = [light1, dark, light2];
            if self.found_pattern_cross(&state_count) {
                if let Some(point) = self.handle_possible_center(&state_count, y, x) {
                    return Some(point);
                }
            }

            // The trailing light run may lead the next candidate.
            if x < max_x {
                x = light2_start;
            }
        }

        None
    }

    fn found_pattern_cross(&self, state_count: &StateCount) -> bool {
        let module_size = self.module_size;
        let max_variance = module_size / 2.0;

        for &count in state_count {
            if (module_size - count as f32).abs() >= max_variance {
                return false;
            }
        }
        true
    }

    fn handle_possible_center(
        &mut self,
        state_count: &StateCount,
        y: usize,
        end_x: usize,
    ) -> Option<Point> {
        let total: usize = state_count.iter().sum();
        let center_x = (end_x - state_count[2]) as f32 - state_count[1] as f32 / 2.0;

        let center_y = self.cross_check_vertical(y, center_x as usize, 2 * state_count[1])?;

        let estimated_module_size = total as f32 / 3.0;

        for &(px, py, psize) in &self.possible_centers {
            if (py - center_y).abs() <= psize && (px - center_x).abs() <= psize {
                return Some(Point::new((px + center_x) / 2.0, (py + center_y) / 2.0));
            }
        }

        self.possible_centers.push((center_x, center_y, estimated_module_size));
        None
    }

    /// Checks the same light-dark-light signature vertically through the candidate center.
    fn cross_check_vertical(
        &self,
        start_y: usize,
        center_x: usize,
        max_count: usize,
    ) -> Option<f32> {
        if center_x >= self.image.width() {
            return None;
        }

        let image = self.image;
        let max_y = image.height();
        let mut state_count: StateCount = [0; 3];

        // Dark center run, upward then downward.
        let mut y = start_y as isize;
        while y >= 0 && image.get(center_x, y as usize) && state_count[1] <= max_count {
            state_count[1] += 1;
            y -= 1;
        }
        if y < 0 || state_count[1] > max_count {
            return None;
        }
        while y >= 0 && !image.get(center_x, y as usize) && state_count[0] <= max_count {
            state_count[0] += 1;
            y -= 1;
        }
        if state_count[0] > max_count {
            return None;
        }

        let mut y = start_y + 1;
        while y < max_y && image.get(center_x, y) && state_count[1] <= max_count {
            state_count[1] += 1;
            y += 1;
        }
        if state_count[1] > max_count {
            return None;
        }
        while y < max_y && !image.get(center_x, y) && state_count[2] <= max_count {
            state_count[2] += 1;
            y += 1;
        }
        if state_count[2] > max_count {
            return None;
        }

        if self.found_pattern_cross(&state_count) {
            Some((y - state_count[2]) as f32 - state_count[1] as f32 / 2.0)
        }
        else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Draws a 5x5 alignment pattern centered at (cx, cy), scaled.
    fn draw_alignment(image: &mut BitMatrix, cx: usize, cy: usize, scale: usize) {
        const PATTERN: [[u8; 5]; 5] = [
            [1, 1, 1, 1, 1],
            [1, 0, 0, 0, 1],
            [1, 0, 1, 0, 1],
            [1, 0, 0, 0, 1],
            [1, 1, 1, 1, 1],
        ];

        let left = cx - 5 * scale / 2;
        let top = cy - 5 * scale / 2;
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
    fn verify_finds_alignment_pattern() {
        let mut image = BitMatrix::new(60, 60);
        draw_alignment(&mut image, 30, 30, 4);

        let finder = AlignmentPatternFinder::new(&image, 10, 10, 40, 40, 4.0);
        let point = finder.find().unwrap();

        assert!((point.x - 30.0).abs() < 2.5);
        assert!((point.y - 30.0).abs() < 2.5);
    }

    #[test]
    fn verify_empty_region_not_found() {
        let image = BitMatrix::new(60, 60);
        let finder = AlignmentPatternFinder::new(&image, 10, 10, 40, 40, 4.0);
        assert!(finder.find().is_err());
    }
}
