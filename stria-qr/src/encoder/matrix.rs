// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `matrix` module assembles a QR symbol: function patterns first, then format and version
//! information, then the masked data bits in the zig-zag placement order.

use stria_core::errors::{writer_error, Result};
use stria_core::io::BitBuffer;
use stria_core::matrix::ByteMatrix;

use crate::ecl::EcLevel;
use crate::encoder::mask::get_data_mask_bit;
use crate::version::Version;

/// Format information BCH generator: x^10 + x^8 + x^5 + x^4 + x^2 + x + 1.
const TYPE_INFO_POLY: u32 = 0x537;
/// Version information BCH generator: x^12 + x^11 + x^10 + x^9 + x^8 + x^5 + x^2 + 1.
const VERSION_INFO_POLY: u32 = 0x1f25;
/// The mask XORed onto format information so it is never all zero.
const TYPE_INFO_MASK_PATTERN: u32 = 0x5412;

const POSITION_DETECTION_PATTERN: [[u8; 7]; 7] = [
    [1, 1, 1, 1, 1, 1, 1],
    [1, 0, 0, 0, 0, 0, 1],
    [1, 0, 1, 1, 1, 0, 1],
    [1, 0, 1, 1, 1, 0, 1],
    [1, 0, 1, 1, 1, 0, 1],
    [1, 0, 0, 0, 0, 0, 1],
    [1, 1, 1, 1, 1, 1, 1],
];

const POSITION_ADJUSTMENT_PATTERN: [[u8; 5]; 5] = [
    [1, 1, 1, 1, 1],
    [1, 0, 0, 0, 1],
    [1, 0, 1, 0, 1],
    [1, 0, 0, 0, 1],
    [1, 1, 1, 1, 1],
];

/// Where the first copy of the 15 format information bits lives, around the top-left finder.
const TYPE_INFO_COORDINATES: [(usize, usize); 15] = [
    (8, 0),
    (8, 1),
    (8, 2),
    (8, 3),
    (8, 4),
    (8, 5),
    (8, 7),
    (8, 8),
    (7, 8),
    (5, 8),
    (4, 8),
    (3, 8),
    (2, 8),
    (1, 8),
    (0, 8),
];

/// Builds the complete symbol matrix for the given interleaved codeword bits.
pub fn build_matrix(
    data_bits: &BitBuffer,
    ec_level: EcLevel,
    version: &Version,
    mask_pattern: u32,
    matrix: &mut ByteMatrix,
) -> Result<()> {
    matrix.clear();
    embed_basic_patterns(version, matrix)?;
    embed_type_info(ec_level, mask_pattern, matrix)?;
    maybe_embed_version_info(version, matrix)?;
    embed_data_bits(data_bits, mask_pattern, matrix)?;
    Ok(())
}

/// Embeds the patterns every symbol carries: finder patterns with separators, the dark module,
/// alignment patterns, and timing patterns.
pub fn embed_basic_patterns(version: &Version, matrix: &mut ByteMatrix) -> Result<()> {
    embed_position_detection_patterns_and_separators(matrix);

    // The dark module above the bottom-left finder's format area.
    matrix.set(8, matrix.height() - 8, true);

    maybe_embed_position_adjustment_patterns(version, matrix);
    embed_timing_patterns(matrix);
    Ok(())
}

fn embed_position_detection_patterns_and_separators(matrix: &mut ByteMatrix) {
    let pdp = POSITION_DETECTION_PATTERN.len();
    embed_position_detection_pattern(0, 0, matrix);
    embed_position_detection_pattern(matrix.width() - pdp, 0, matrix);
    embed_position_detection_pattern(0, matrix.height() - pdp, matrix);

    // Horizontal separators: 8 light modules under or over each finder.
    embed_horizontal_separator(0, 7, matrix);
    embed_horizontal_separator(matrix.width() - 8, 7, matrix);
    embed_horizontal_separator(0, matrix.height() - 8, matrix);

    // Vertical separators: 7 light modules beside each finder.
    embed_vertical_separator(7, 0, matrix);
    embed_vertical_separator(matrix.width() - 8, 0, matrix);
    embed_vertical_separator(7, matrix.height() - 7, matrix);
}

fn embed_position_detection_pattern(x_start: usize, y_start: usize, matrix: &mut ByteMatrix) {
    for (dy, row) in POSITION_DETECTION_PATTERN.iter().enumerate() {
        for (dx, &value) in row.iter().enumerate() {
            matrix.set(x_start + dx, y_start + dy, value == 1);
        }
    }
}

fn embed_horizontal_separator(x_start: usize, y: usize, matrix: &mut ByteMatrix) {
    for dx in 0..8 {
        matrix.set(x_start + dx, y, false);
    }
}

fn embed_vertical_separator(x: usize, y_start: usize, matrix: &mut ByteMatrix) {
    for dy in 0..7 {
        matrix.set(x, y_start + dy, false);
    }
}

fn maybe_embed_position_adjustment_patterns(version: &Version, matrix: &mut ByteMatrix) {
    if version.number() < 2 {
        return;
    }

    let centers = version.alignment_centers();
    for &y in centers {
        for &x in centers {
            // Centers overlapping a finder pattern are already occupied.
            if matrix.is_empty(x, y) {
                for (dy, row) in POSITION_ADJUSTMENT_PATTERN.iter().enumerate() {
                    for (dx, &value) in row.iter().enumerate() {
                        matrix.set(x - 2 + dx, y - 2 + dy, value == 1);
                    }
                }
            }
        }
    }
}

fn embed_timing_patterns(matrix: &mut ByteMatrix) {
    // Row 6 and column 6 between the separators, alternating starting dark.
    for i in 8..matrix.width() - 8 {
        let dark = (i + 1) % 2 == 1;
        if matrix.is_empty(i, 6) {
            matrix.set(i, 6, dark);
        }
        if matrix.is_empty(6, i) {
            matrix.set(6, i, dark);
        }
    }
}

/// The BCH remainder of `value` against generator `poly`, both in natural binary form.
pub fn calculate_bch_code(value: u32, poly: u32) -> u32 {
    debug_assert!(poly != 0);

    let msb_set_in_poly = 32 - poly.leading_zeros();
    let mut value = value << (msb_set_in_poly - 1);

    while 32 - value.leading_zeros() >= msb_set_in_poly {
        value ^= poly << (32 - value.leading_zeros() - msb_set_in_poly);
    }

    value
}

/// The 15 format information bits: 2 EC level bits, 3 mask bits, 10 BCH bits, XORed with the
/// standard mask word.
pub fn make_type_info_bits(
    ec_level: EcLevel,
    mask_pattern: u32,
    bits: &mut BitBuffer,
) -> Result<()> {
    let type_info = (ec_level.bits() << 3) | mask_pattern;
    bits.append_bits(type_info, 5)?;

    let bch_code = calculate_bch_code(type_info, TYPE_INFO_POLY);
    bits.append_bits(bch_code, 10)?;

    let mut mask_bits = BitBuffer::new();
    mask_bits.append_bits(TYPE_INFO_MASK_PATTERN, 15)?;
    bits.xor(&mask_bits)?;

    debug_assert_eq!(bits.len(), 15);
    Ok(())
}

/// The 18 version information bits: 6 version bits and 12 BCH bits.
pub fn make_version_info_bits(version: &Version, bits: &mut BitBuffer) -> Result<()> {
    bits.append_bits(version.number(), 6)?;
    let bch_code = calculate_bch_code(version.number(), VERSION_INFO_POLY);
    bits.append_bits(bch_code, 12)?;

    debug_assert_eq!(bits.len(), 18);
    Ok(())
}

/// Embeds both copies of the format information.
pub fn embed_type_info(
    ec_level: EcLevel,
    mask_pattern: u32,
    matrix: &mut ByteMatrix,
) -> Result<()> {
    let mut type_info_bits = BitBuffer::new();
    make_type_info_bits(ec_level, mask_pattern, &mut type_info_bits)?;

    for i in 0..type_info_bits.len() {
        // Place in LSB-first order.
        let bit = type_info_bits.at(type_info_bits.len() - 1 - i) != 0;

        let (x1, y1) = TYPE_INFO_COORDINATES[i];
        matrix.set(x1, y1, bit);

        // The second copy is split between the top-right and bottom-left finders.
        if i < 8 {
            let x2 = matrix.width() - i - 1;
            matrix.set(x2, 8, bit);
        }
        else {
            let y2 = matrix.height() - 7 + (i - 8);
            matrix.set(8, y2, bit);
        }
    }

    Ok(())
}

/// Embeds both copies of the version information for versions 7 and up.
pub fn maybe_embed_version_info(version: &Version, matrix: &mut ByteMatrix) -> Result<()> {
    if version.number() < 7 {
        return Ok(());
    }

    let mut version_info_bits = BitBuffer::new();
    make_version_info_bits(version, &mut version_info_bits)?;

    let mut bit_index = 6 * 3;
    for i in 0..6 {
        for j in 0..3 {
            bit_index -= 1;
            let bit = version_info_bits.at(bit_index) != 0;

            // Bottom-left: 6 wide, 3 tall.
            matrix.set(i, matrix.height() - 11 + j, bit);
            // Top-right: 3 wide, 6 tall.
            matrix.set(matrix.height() - 11 + j, i, bit);
        }
    }

    Ok(())
}

/// Places the data bits into empty cells in the zig-zag order: two-module columns walked
/// alternately upward and downward from the bottom-right corner, skipping the vertical timing
/// column. Each placed bit is XORed with the mask predicate.
pub fn embed_data_bits(
    data_bits: &BitBuffer,
    mask_pattern: u32,
    matrix: &mut ByteMatrix,
) -> Result<()> {
    let mut bit_index = 0;
    let mut direction: i32 = -1;
    let mut x = matrix.width() as i32 - 1;
    let mut y = matrix.height() as i32 - 1;

    while x > 0 {
        // Skip the vertical timing pattern column.
        if x == 6 {
            x -= 1;
        }

        while y >= 0 && y < matrix.height() as i32 {
            for i in 0..2 {
                let xx = (x - i) as usize;
                let yy = y as usize;

                if !matrix.is_empty(xx, yy) {
                    continue;
                }

                // Remainder bits beyond the data stream are zero.
                let mut bit = if bit_index < data_bits.len() {
                    let value = data_bits.at(bit_index) != 0;
                    bit_index += 1;
                    value
                }
                else {
                    false
                };

                if get_data_mask_bit(mask_pattern, xx, yy)? {
                    bit = !bit;
                }

                matrix.set(xx, yy, bit);
            }

            y += direction;
        }

        direction = -direction;
        y += direction;
        x -= 2;
    }

    if bit_index != data_bits.len() {
        return writer_error("data bits did not fit the symbol");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_bch_fixtures() {
        assert_eq!(calculate_bch_code(5, TYPE_INFO_POLY), 0xdc);
        assert_eq!(calculate_bch_code(7, VERSION_INFO_POLY), 0xc94);
        assert_eq!(calculate_bch_code(8, VERSION_INFO_POLY), 0x5bc);
        assert_eq!(calculate_bch_code(9, VERSION_INFO_POLY), 0xa99);
        assert_eq!(calculate_bch_code(40, VERSION_INFO_POLY), 0xc69);
    }

    #[test]
    fn verify_type_info_bits() {
        // EC level M (00), mask 5: type info 0b00101, full masked word per the standard.
        let mut bits = BitBuffer::new();
        make_type_info_bits(EcLevel::M, 5, &mut bits).unwrap();
        assert_eq!(bits.to_string(), "100000011001110");
    }

    #[test]
    fn verify_version_info_bits() {
        let mut bits = BitBuffer::new();
        make_version_info_bits(Version::get(7).unwrap(), &mut bits).unwrap();
        assert_eq!(bits.to_string(), "000111110010010100");
    }

    #[test]
    fn verify_basic_patterns_version_1() {
        let version = Version::get(1).unwrap();
        let mut matrix = ByteMatrix::new(21, 21);
        embed_basic_patterns(version, &mut matrix).unwrap();

        // Finder corners.
        assert_eq!(matrix.get(0, 0), stria_core::matrix::Cell::Dark);
        assert_eq!(matrix.get(20, 0), stria_core::matrix::Cell::Dark);
        assert_eq!(matrix.get(0, 20), stria_core::matrix::Cell::Dark);
        // Separator.
        assert_eq!(matrix.get(7, 7), stria_core::matrix::Cell::Light);
        // Dark module.
        assert_eq!(matrix.get(8, 13), stria_core::matrix::Cell::Dark);
        // Timing alternates starting dark at 8.
        assert_eq!(matrix.get(8, 6), stria_core::matrix::Cell::Dark);
        assert_eq!(matrix.get(9, 6), stria_core::matrix::Cell::Light);
        assert_eq!(matrix.get(6, 8), stria_core::matrix::Cell::Dark);
        // Data area untouched.
        assert!(matrix.is_empty(10, 10));
    }
}
