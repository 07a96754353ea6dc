// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `version` module carries the per-version structure tables of ISO/IEC 18004: symbol
//! dimensions, alignment pattern positions, and the Reed-Solomon block layout for each error
//! correction level.

use once_cell::sync::Lazy;

use stria_core::errors::{format_error, Result};
use stria_core::matrix::BitMatrix;

use crate::ecl::EcLevel;

/// A run of equally sized Reed-Solomon blocks.
#[derive(Copy, Clone, Debug)]
pub struct BlockGroup {
    /// The number of blocks in this group.
    pub count: usize,
    /// The number of data codewords in each block of this group.
    pub data_codewords: usize,
}

/// The Reed-Solomon block structure of one version at one error correction level.
#[derive(Clone, Debug)]
pub struct EcBlocks {
    /// EC codewords appended to every block.
    pub ec_codewords_per_block: usize,
    /// One or two groups of blocks. When two, the second group's blocks hold one extra data
    /// codeword.
    pub groups: Vec<BlockGroup>,
}

impl EcBlocks {
    pub fn num_blocks(&self) -> usize {
        self.groups.iter().map(|g| g.count).sum()
    }

    pub fn num_data_codewords(&self) -> usize {
        self.groups.iter().map(|g| g.count * g.data_codewords).sum()
    }

    pub fn num_ec_codewords(&self) -> usize {
        self.num_blocks() * self.ec_codewords_per_block
    }
}

/// One QR Code version (1 to 40).
pub struct Version {
    number: u32,
    alignment_centers: Vec<usize>,
    ec_blocks: [EcBlocks; 4],
}

impl Version {
    pub fn number(&self) -> u32 {
        self.number
    }

    /// The symbol side length in modules: 17 + 4 * version.
    pub fn dimension(&self) -> usize {
        17 + 4 * self.number as usize
    }

    /// Row/column coordinates of alignment pattern centers. Empty for version 1.
    pub fn alignment_centers(&self) -> &[usize] {
        &self.alignment_centers
    }

    /// The block structure at `level`.
    pub fn ec_blocks(&self, level: EcLevel) -> &EcBlocks {
        &self.ec_blocks[level.table_index()]
    }

    /// Total codewords in the symbol, independent of the error correction level.
    pub fn total_codewords(&self) -> usize {
        self.ec_blocks[0].num_data_codewords() + self.ec_blocks[0].num_ec_codewords()
    }

    /// Looks up a version by number.
    pub fn get(number: u32) -> Result<&'static Version> {
        if number < 1 || number > 40 {
            return format_error("version out of range");
        }
        Ok(&VERSIONS[number as usize - 1])
    }

    /// The version implied by a symbol dimension, before version information is read.
    pub fn for_dimension(dimension: usize) -> Result<&'static Version> {
        if dimension % 4 != 1 {
            return format_error("symbol dimension is not 4k + 1");
        }
        Version::get(((dimension - 17) / 4) as u32)
    }

    /// Decodes an 18-bit version information word, correcting up to 3 bit errors against the
    /// Golay-protected table. Returns an error when no table entry is close enough.
    pub fn decode_version_information(version_bits: u32) -> Result<&'static Version> {
        let mut best_difference = u32::MAX;
        let mut best_version = 0;

        for (i, &word) in VERSION_DECODE_INFO.iter().enumerate() {
            if word == version_bits {
                return Version::get(i as u32 + 7);
            }

            let difference = (version_bits ^ word).count_ones();
            if difference < best_difference {
                best_difference = difference;
                best_version = i as u32 + 7;
            }
        }

        if best_difference <= 3 {
            return Version::get(best_version);
        }

        format_error("version information unreadable")
    }

    /// A matrix marking every function-pattern module of this version: finder patterns with
    /// their separators and format areas, alignment patterns, timing patterns, and version
    /// information. Data modules are the unset cells.
    pub fn build_function_pattern(&self) -> BitMatrix {
        let dimension = self.dimension();
        let mut matrix = BitMatrix::square(dimension);

        // Finder patterns, separators, and format information areas.
        let _ = matrix.set_region(0, 0, 9, 9);
        let _ = matrix.set_region(dimension - 8, 0, 8, 9);
        let _ = matrix.set_region(0, dimension - 8, 9, 8);

        // Alignment patterns, except the three positions covered by finder patterns.
        let centers = &self.alignment_centers;
        let max = centers.len();
        for row in 0..max {
            let top = centers[row] - 2;
            for col in 0..max {
                let in_finder = (row == 0 && (col == 0 || col == max - 1))
                    || (row == max - 1 && col == 0);
                if !in_finder {
                    let _ = matrix.set_region(centers[col] - 2, top, 5, 5);
                }
            }
        }

        // Timing patterns, between the separators.
        let _ = matrix.set_region(6, 9, 1, dimension - 17);
        let _ = matrix.set_region(9, 6, dimension - 17, 1);

        if self.number > 6 {
            let _ = matrix.set_region(dimension - 11, 0, 3, 6);
            let _ = matrix.set_region(0, dimension - 11, 6, 3);
        }

        matrix
    }
}

/// The 18-bit version information words for versions 7 to 40: 6 version bits followed by 12 BCH
/// bits over the generator 0x1f25.
const VERSION_DECODE_INFO: [u32; 34] = [
    0x07c94, 0x085bc, 0x09a99, 0x0a4d3, 0x0bbf6, 0x0c762, 0x0d847, 0x0e60d,
    0x0f928, 0x10b78, 0x1145d, 0x12a17, 0x13532, 0x149a6, 0x15683, 0x168c9,
    0x177ec, 0x18ec4, 0x191e1, 0x1afab, 0x1b08e, 0x1cc1a, 0x1d33f, 0x1ed75,
    0x1f250, 0x209d5, 0x216f0, 0x228ba, 0x2379f, 0x24b0b, 0x2542e, 0x26a64,
    0x27541, 0x28c69,
];

fn ecb(ec_codewords_per_block: usize, groups: &[(usize, usize)]) -> EcBlocks {
    EcBlocks {
        ec_codewords_per_block,
        groups: groups
            .iter()
            .map(|&(count, data_codewords)| BlockGroup { count, data_codewords })
            .collect(),
    }
}

fn version(number: u32, alignment_centers: &[usize], ec_blocks: [EcBlocks; 4]) -> Version {
    Version { number, alignment_centers: alignment_centers.to_vec(), ec_blocks }
}

/// The version table of ISO/IEC 18004 (Table 9 and Annex E), levels in order L, M, Q, H.
static VERSIONS: Lazy<Vec<Version>> = Lazy::new(|| {
    vec![
        version(1, &[], [
            ecb(7, &[(1, 19)]),
            ecb(10, &[(1, 16)]),
            ecb(13, &[(1, 13)]),
            ecb(17, &[(1, 9)]),
        ]),
        version(2, &[6, 18], [
            ecb(10, &[(1, 34)]),
            ecb(16, &[(1, 28)]),
            ecb(22, &[(1, 22)]),
            ecb(28, &[(1, 16)]),
        ]),
        version(3, &[6, 22], [
            ecb(15, &[(1, 55)]),
            ecb(26, &[(1, 44)]),
            ecb(18, &[(2, 17)]),
            ecb(22, &[(2, 13)]),
        ]),
        version(4, &[6, 26], [
            ecb(20, &[(1, 80)]),
            ecb(18, &[(2, 32)]),
            ecb(26, &[(2, 24)]),
            ecb(16, &[(4, 9)]),
        ]),
        version(5, &[6, 30], [
            ecb(26, &[(1, 108)]),
            ecb(24, &[(2, 43)]),
            ecb(18, &[(2, 15), (2, 16)]),
            ecb(22, &[(2, 11), (2, 12)]),
        ]),
        version(6, &[6, 34], [
            ecb(18, &[(2, 68)]),
            ecb(16, &[(4, 27)]),
            ecb(24, &[(4, 19)]),
            ecb(28, &[(4, 15)]),
        ]),
        version(7, &[6, 22, 38], [
            ecb(20, &[(2, 78)]),
            ecb(18, &[(4, 31)]),
            ecb(18, &[(2, 14), (4, 15)]),
            ecb(26, &[(4, 13), (1, 14)]),
        ]),
        version(8, &[6, 24, 42], [
            ecb(24, &[(2, 97)]),
            ecb(22, &[(2, 38), (2, 39)]),
            ecb(22, &[(4, 18), (2, 19)]),
            ecb(26, &[(4, 14), (2, 15)]),
        ]),
        version(9, &[6, 26, 46], [
            ecb(30, &[(2, 116)]),
            ecb(22, &[(3, 36), (2, 37)]),
            ecb(20, &[(4, 16), (4, 17)]),
            ecb(24, &[(4, 12), (4, 13)]),
        ]),
        version(10, &[6, 28, 50], [
            ecb(18, &[(2, 68), (2, 69)]),
            ecb(26, &[(4, 43), (1, 44)]),
            ecb(24, &[(6, 19), (2, 20)]),
            ecb(28, &[(6, 15), (2, 16)]),
        ]),
        version(11, &[6, 30, 54], [
            ecb(20, &[(4, 81)]),
            ecb(30, &[(1, 50), (4, 51)]),
            ecb(28, &[(4, 22), (4, 23)]),
            ecb(24, &[(3, 12), (8, 13)]),
        ]),
        version(12, &[6, 32, 58], [
            ecb(24, &[(2, 92), (2, 93)]),
            ecb(22, &[(6, 36), (2, 37)]),
            ecb(26, &[(4, 20), (6, 21)]),
            ecb(28, &[(7, 14), (4, 15)]),
        ]),
        version(13, &[6, 34, 62], [
            ecb(26, &[(4, 107)]),
            ecb(22, &[(8, 37), (1, 38)]),
            ecb(24, &[(8, 20), (4, 21)]),
            ecb(22, &[(12, 11), (4, 12)]),
        ]),
        version(14, &[6, 26, 46, 66], [
            ecb(30, &[(3, 115), (1, 116)]),
            ecb(24, &[(4, 40), (5, 41)]),
            ecb(20, &[(11, 16), (5, 17)]),
            ecb(24, &[(11, 12), (5, 13)]),
        ]),
        version(15, &[6, 26, 48, 70], [
            ecb(22, &[(5, 87), (1, 88)]),
            ecb(24, &[(5, 41), (5, 42)]),
            ecb(30, &[(5, 24), (7, 25)]),
            ecb(24, &[(11, 12), (7, 13)]),
        ]),
        version(16, &[6, 26, 50, 74], [
            ecb(24, &[(5, 98), (1, 99)]),
            ecb(28, &[(7, 45), (3, 46)]),
            ecb(24, &[(15, 19), (2, 20)]),
            ecb(30, &[(3, 15), (13, 16)]),
        ]),
        version(17, &[6, 30, 54, 78], [
            ecb(28, &[(1, 107), (5, 108)]),
            ecb(28, &[(10, 46), (1, 47)]),
            ecb(28, &[(1, 22), (15, 23)]),
            ecb(28, &[(2, 14), (17, 15)]),
        ]),
        version(18, &[6, 30, 56, 82], [
            ecb(30, &[(5, 120), (1, 121)]),
            ecb(26, &[(9, 43), (4, 44)]),
            ecb(28, &[(17, 22), (1, 23)]),
            ecb(28, &[(2, 14), (19, 15)]),
        ]),
        version(19, &[6, 30, 58, 86], [
            ecb(28, &[(3, 113), (4, 114)]),
            ecb(26, &[(3, 44), (11, 45)]),
            ecb(26, &[(17, 21), (4, 22)]),
            ecb(26, &[(9, 13), (16, 14)]),
        ]),
        version(20, &[6, 34, 62, 90], [
            ecb(28, &[(3, 107), (5, 108)]),
            ecb(26, &[(3, 41), (13, 42)]),
            ecb(30, &[(15, 24), (5, 25)]),
            ecb(28, &[(15, 15), (10, 16)]),
        ]),
        version(21, &[6, 28, 50, 72, 94], [
            ecb(28, &[(4, 116), (4, 117)]),
            ecb(26, &[(17, 42)]),
            ecb(28, &[(17, 22), (6, 23)]),
            ecb(30, &[(19, 16), (6, 17)]),
        ]),
        version(22, &[6, 26, 50, 74, 98], [
            ecb(28, &[(2, 111), (7, 112)]),
            ecb(28, &[(17, 46)]),
            ecb(30, &[(7, 24), (16, 25)]),
            ecb(24, &[(34, 13)]),
        ]),
        version(23, &[6, 30, 54, 78, 102], [
            ecb(30, &[(4, 121), (5, 122)]),
            ecb(28, &[(4, 47), (14, 48)]),
            ecb(30, &[(11, 24), (14, 25)]),
            ecb(30, &[(16, 15), (14, 16)]),
        ]),
        version(24, &[6, 28, 54, 80, 106], [
            ecb(30, &[(6, 117), (4, 118)]),
            ecb(28, &[(6, 45), (14, 46)]),
            ecb(30, &[(11, 24), (16, 25)]),
            ecb(30, &[(30, 16), (2, 17)]),
        ]),
        version(25, &[6, 32, 58, 84, 110], [
            ecb(26, &[(8, 106), (4, 107)]),
            ecb(28, &[(8, 47), (13, 48)]),
            ecb(30, &[(7, 24), (22, 25)]),
            ecb(30, &[(22, 15), (13, 16)]),
        ]),
        version(26, &[6, 30, 58, 86, 114], [
            ecb(28, &[(10, 114), (2, 115)]),
            ecb(28, &[(19, 46), (4, 47)]),
            ecb(28, &[(28, 22), (6, 23)]),
            ecb(30, &[(33, 16), (4, 17)]),
        ]),
        version(27, &[6, 34, 62, 90, 118], [
            ecb(30, &[(8, 122), (4, 123)]),
            ecb(28, &[(22, 45), (3, 46)]),
            ecb(30, &[(8, 23), (26, 24)]),
            ecb(30, &[(12, 15), (28, 16)]),
        ]),
        version(28, &[6, 26, 50, 74, 98, 122], [
            ecb(30, &[(3, 117), (10, 118)]),
            ecb(28, &[(3, 45), (23, 46)]),
            ecb(30, &[(4, 24), (31, 25)]),
            ecb(30, &[(11, 15), (31, 16)]),
        ]),
        version(29, &[6, 30, 54, 78, 102, 126], [
            ecb(30, &[(7, 116), (7, 117)]),
            ecb(28, &[(21, 45), (7, 46)]),
            ecb(30, &[(1, 23), (37, 24)]),
            ecb(30, &[(19, 15), (26, 16)]),
        ]),
        version(30, &[6, 26, 52, 78, 104, 130], [
            ecb(30, &[(5, 115), (10, 116)]),
            ecb(28, &[(19, 47), (10, 48)]),
            ecb(30, &[(15, 24), (25, 25)]),
            ecb(30, &[(23, 15), (25, 16)]),
        ]),
        version(31, &[6, 30, 56, 82, 108, 134], [
            ecb(30, &[(13, 115), (3, 116)]),
            ecb(28, &[(2, 46), (29, 47)]),
            ecb(30, &[(42, 24), (1, 25)]),
            ecb(30, &[(23, 15), (28, 16)]),
        ]),
        version(32, &[6, 34, 60, 86, 112, 138], [
            ecb(30, &[(17, 115)]),
            ecb(28, &[(10, 46), (23, 47)]),
            ecb(30, &[(10, 24), (35, 25)]),
            ecb(30, &[(19, 15), (35, 16)]),
        ]),
        version(33, &[6, 30, 58, 86, 114, 142], [
            ecb(30, &[(17, 115), (1, 116)]),
            ecb(28, &[(14, 46), (21, 47)]),
            ecb(30, &[(29, 24), (19, 25)]),
            ecb(30, &[(11, 15), (46, 16)]),
        ]),
        version(34, &[6, 34, 62, 90, 118, 146], [
            ecb(30, &[(13, 115), (6, 116)]),
            ecb(28, &[(14, 46), (23, 47)]),
            ecb(30, &[(44, 24), (7, 25)]),
            ecb(30, &[(59, 16), (1, 17)]),
        ]),
        version(35, &[6, 30, 54, 78, 102, 126, 150], [
            ecb(30, &[(12, 121), (7, 122)]),
            ecb(28, &[(12, 47), (26, 48)]),
            ecb(30, &[(39, 24), (14, 25)]),
            ecb(30, &[(22, 15), (41, 16)]),
        ]),
        version(36, &[6, 24, 50, 76, 102, 128, 154], [
            ecb(30, &[(6, 121), (14, 122)]),
            ecb(28, &[(6, 47), (34, 48)]),
            ecb(30, &[(46, 24), (10, 25)]),
            ecb(30, &[(2, 15), (64, 16)]),
        ]),
        version(37, &[6, 28, 54, 80, 106, 132, 158], [
            ecb(30, &[(17, 122), (4, 123)]),
            ecb(28, &[(29, 46), (14, 47)]),
            ecb(30, &[(49, 24), (10, 25)]),
            ecb(30, &[(24, 15), (46, 16)]),
        ]),
        version(38, &[6, 32, 58, 84, 110, 136, 162], [
            ecb(30, &[(4, 122), (18, 123)]),
            ecb(28, &[(13, 46), (32, 47)]),
            ecb(30, &[(48, 24), (14, 25)]),
            ecb(30, &[(42, 15), (32, 16)]),
        ]),
        version(39, &[6, 26, 54, 82, 110, 138, 166], [
            ecb(30, &[(20, 117), (4, 118)]),
            ecb(28, &[(40, 47), (7, 48)]),
            ecb(30, &[(43, 24), (22, 25)]),
            ecb(30, &[(10, 15), (67, 16)]),
        ]),
        version(40, &[6, 30, 58, 86, 114, 142, 170], [
            ecb(30, &[(19, 118), (6, 119)]),
            ecb(28, &[(18, 47), (31, 48)]),
            ecb(30, &[(34, 24), (34, 25)]),
            ecb(30, &[(20, 15), (61, 16)]),
        ]),
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    /// Known total codeword counts, one per version.
    const TOTALS: [usize; 40] = [
        26, 44, 70, 100, 134, 172, 196, 242, 292, 346, 404, 466, 532, 581, 655, 733, 815, 901,
        991, 1085, 1156, 1258, 1364, 1474, 1588, 1706, 1828, 1921, 2051, 2185, 2323, 2465, 2611,
        2761, 2876, 3034, 3196, 3362, 3532, 3706,
    ];

    #[test]
    fn verify_table_consistency() {
        for number in 1..=40 {
            let version = Version::get(number).unwrap();

            assert_eq!(version.dimension(), 17 + 4 * number as usize);
            assert_eq!(version.total_codewords(), TOTALS[number as usize - 1]);

            // Every level must account for the same total number of codewords.
            for level in [EcLevel::L, EcLevel::M, EcLevel::Q, EcLevel::H] {
                let blocks = version.ec_blocks(level);
                assert_eq!(
                    blocks.num_data_codewords() + blocks.num_ec_codewords(),
                    version.total_codewords(),
                    "version {} level {}",
                    number,
                    level
                );
            }

            // Alignment centers span from 6 to dimension - 7.
            let centers = version.alignment_centers();
            if number == 1 {
                assert!(centers.is_empty());
            }
            else {
                assert_eq!(centers[0], 6);
                assert_eq!(*centers.last().unwrap(), version.dimension() - 7);
            }
        }
    }

    #[test]
    fn verify_for_dimension() {
        assert_eq!(Version::for_dimension(21).unwrap().number(), 1);
        assert_eq!(Version::for_dimension(177).unwrap().number(), 40);
        assert!(Version::for_dimension(20).is_err());
        assert!(Version::for_dimension(181).is_err());
    }

    #[test]
    fn verify_decode_version_information() {
        assert_eq!(Version::decode_version_information(0x07c94).unwrap().number(), 7);
        assert_eq!(Version::decode_version_information(0x28c69).unwrap().number(), 40);
        // Three flipped bits still decode.
        assert_eq!(Version::decode_version_information(0x07c94 ^ 0x10101).unwrap().number(), 7);
        // An all-ones word is beyond correction.
        assert!(Version::decode_version_information(0x3ffff).is_err());
    }

    #[test]
    fn verify_function_pattern_counts() {
        // Version 1: 21x21 with 3 finders + separators + format (9x9 + 8x9 + 9x8) and two timing
        // runs of dimension - 17 = 4 modules each.
        let pattern = Version::get(1).unwrap().build_function_pattern();
        let mut set = 0;
        for y in 0..21 {
            for x in 0..21 {
                if pattern.get(x, y) {
                    set += 1;
                }
            }
        }
        assert_eq!(set, 9 * 9 + 8 * 9 + 9 * 8 + 4 + 4);

        // Version 7 gains one alignment pattern (the other overlaps no finder here: centers are
        // 6, 22, 38 and the (22, 22)-centered and edge-adjacent ones count) and version info.
        let pattern = Version::get(7).unwrap().build_function_pattern();
        assert!(pattern.get(22, 22));
        assert!(pattern.get(38, 22));
        assert!(pattern.get(36, 0));
        assert!(pattern.get(0, 36));
    }
}
