// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `mask` module implements the eight data mask predicates of ISO/IEC 18004 section 8.8 and
//! the four penalty rules used to select among them.

use stria_core::errors::{invalid_argument_error, Result};
use stria_core::matrix::{ByteMatrix, Cell};

// Penalty weights, in rule order.
const N1: u32 = 3;
const N2: u32 = 3;
const N3: u32 = 40;
const N4: u32 = 10;

/// The total penalty score of a fully assembled matrix. Lower is better.
pub fn calculate_mask_penalty(matrix: &ByteMatrix) -> u32 {
    apply_mask_penalty_rule_1(matrix)
        + apply_mask_penalty_rule_2(matrix)
        + apply_mask_penalty_rule_3(matrix)
        + apply_mask_penalty_rule_4(matrix)
}

/// The mask predicate: true means the module at `(x, y)` is inverted.
pub fn get_data_mask_bit(mask_pattern: u32, x: usize, y: usize) -> Result<bool> {
    let intermediate = match mask_pattern {
        0 => (y + x) & 0x1,
        1 => y & 0x1,
        2 => x % 3,
        3 => (y + x) % 3,
        4 => ((y / 2) + (x / 3)) & 0x1,
        5 => {
            let temp = y * x;
            (temp & 0x1) + (temp % 3)
        }
        6 => {
            let temp = y * x;
            ((temp & 0x1) + (temp % 3)) & 0x1
        }
        7 => {
            let temp = y * x;
            ((temp % 3) + ((y + x) & 0x1)) & 0x1
        }
        _ => return invalid_argument_error("mask pattern out of range"),
    };

    Ok(intermediate == 0)
}

fn is_dark(cell: Cell) -> bool {
    cell == Cell::Dark
}

/// Rule 1: adjacent modules of the same color in runs of 5 or more, row and column wise.
pub fn apply_mask_penalty_rule_1(matrix: &ByteMatrix) -> u32 {
    apply_mask_penalty_rule_1_internal(matrix, true)
        + apply_mask_penalty_rule_1_internal(matrix, false)
}

fn apply_mask_penalty_rule_1_internal(matrix: &ByteMatrix, horizontal: bool) -> u32 {
    let (i_limit, j_limit) =
        if horizontal { (matrix.height(), matrix.width()) } else { (matrix.width(), matrix.height()) };

    let mut penalty = 0;

    for i in 0..i_limit {
        let mut num_same_cells = 0;
        let mut prev_dark = None;

        for j in 0..j_limit {
            let dark = if horizontal { is_dark(matrix.get(j, i)) } else { is_dark(matrix.get(i, j)) };

            if Some(dark) == prev_dark {
                num_same_cells += 1;
            }
            else {
                if num_same_cells >= 5 {
                    penalty += N1 + (num_same_cells - 5);
                }
                num_same_cells = 1;
                prev_dark = Some(dark);
            }
        }

        if num_same_cells >= 5 {
            penalty += N1 + (num_same_cells - 5);
        }
    }

    penalty
}

/// Rule 2: every 2x2 block of a single color.
pub fn apply_mask_penalty_rule_2(matrix: &ByteMatrix) -> u32 {
    let mut penalty = 0;

    for y in 0..matrix.height() - 1 {
        for x in 0..matrix.width() - 1 {
            let value = is_dark(matrix.get(x, y));
            if value == is_dark(matrix.get(x + 1, y))
                && value == is_dark(matrix.get(x, y + 1))
                && value == is_dark(matrix.get(x + 1, y + 1))
            {
                penalty += N2;
            }
        }
    }

    penalty
}

/// Rule 3: a finder-like 1:1:3:1:1 run with 4 light modules wholly in bounds on at least one
/// side, row and column wise.
pub fn apply_mask_penalty_rule_3(matrix: &ByteMatrix) -> u32 {
    let width = matrix.width();
    let height = matrix.height();
    let mut num_penalties = 0;

    let dark = |x: usize, y: usize| is_dark(matrix.get(x, y));

    for y in 0..height {
        for x in 0..width {
            let core_horizontal = x + 6 < width
                && dark(x, y)
                && !dark(x + 1, y)
                && dark(x + 2, y)
                && dark(x + 3, y)
                && dark(x + 4, y)
                && !dark(x + 5, y)
                && dark(x + 6, y);

            if core_horizontal {
                let light_after =
                    x + 10 < width && (x + 7..x + 11).all(|k| !dark(k, y));
                let light_before = x >= 4 && (x - 4..x).all(|k| !dark(k, y));
                if light_after || light_before {
                    num_penalties += 1;
                }
            }

            let core_vertical = y + 6 < height
                && dark(x, y)
                && !dark(x, y + 1)
                && dark(x, y + 2)
                && dark(x, y + 3)
                && dark(x, y + 4)
                && !dark(x, y + 5)
                && dark(x, y + 6);

            if core_vertical {
                let light_after =
                    y + 10 < height && (y + 7..y + 11).all(|k| !dark(x, k));
                let light_before = y >= 4 && (y - 4..y).all(|k| !dark(x, k));
                if light_after || light_before {
                    num_penalties += 1;
                }
            }
        }
    }

    num_penalties * N3
}

/// Rule 4: deviation of the dark module ratio from 50%, in steps of 5%.
pub fn apply_mask_penalty_rule_4(matrix: &ByteMatrix) -> u32 {
    let mut num_dark = 0i64;
    for y in 0..matrix.height() {
        for x in 0..matrix.width() {
            if is_dark(matrix.get(x, y)) {
                num_dark += 1;
            }
        }
    }

    let total = (matrix.width() * matrix.height()) as i64;
    let five_percent_variances = (num_dark * 2 - total).abs() * 10 / total;

    five_percent_variances as u32 * N4
}
