// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `blocks` module undoes codeword interleaving: the raw codeword stream is redistributed
//! into the per-block layout so each block can be error corrected independently.

use stria_core::errors::{format_error, Result};

use crate::ecl::EcLevel;
use crate::version::Version;

/// One de-interleaved Reed-Solomon block: data codewords followed by EC codewords.
pub struct DataBlock {
    pub num_data_codewords: usize,
    pub codewords: Vec<u8>,
}

impl DataBlock {
    /// Splits `raw_codewords` into the blocks of `version` at `ec_level`, reversing the
    /// column-wise interleave. Blocks in the second group carry one extra data codeword; the
    /// interleave skips exhausted shorter blocks in the data region and realigns in the EC
    /// region.
    pub fn build(
        raw_codewords: &[u8],
        version: &Version,
        ec_level: EcLevel,
    ) -> Result<Vec<DataBlock>> {
        if raw_codewords.len() != version.total_codewords() {
            return format_error("codeword count does not match the version");
        }

        let ec_blocks = version.ec_blocks(ec_level);
        let ec_per_block = ec_blocks.ec_codewords_per_block;

        let mut blocks: Vec<DataBlock> = Vec::with_capacity(ec_blocks.num_blocks());
        for group in &ec_blocks.groups {
            for _ in 0..group.count {
                blocks.push(DataBlock {
                    num_data_codewords: group.data_codewords,
                    codewords: vec![0; group.data_codewords + ec_per_block],
                });
            }
        }

        // Blocks are ordered shorter first; find where the longer ones start.
        let shorter_total = blocks[0].codewords.len();
        let longer_start = blocks
            .iter()
            .position(|b| b.codewords.len() != shorter_total)
            .unwrap_or(blocks.len());

        let shorter_data = shorter_total - ec_per_block;
        let num_blocks = blocks.len();
        let mut offset = 0;

        // Data codewords common to all blocks.
        for i in 0..shorter_data {
            for block in blocks.iter_mut() {
                block.codewords[i] = raw_codewords[offset];
                offset += 1;
            }
        }

        // The longer blocks' extra data codeword.
        for block in blocks.iter_mut().skip(longer_start) {
            block.codewords[shorter_data] = raw_codewords[offset];
            offset += 1;
        }

        // EC codewords; longer blocks are shifted by their extra data byte.
        for i in shorter_data..shorter_total {
            for (j, block) in blocks.iter_mut().enumerate() {
                let index = if j < longer_start { i } else { i + 1 };
                block.codewords[index] = raw_codewords[offset];
                offset += 1;
            }
        }

        debug_assert_eq!(offset, raw_codewords.len());
        debug_assert_eq!(num_blocks, ec_blocks.num_blocks());

        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_single_block() {
        let version = Version::get(1).unwrap();
        let raw: Vec<u8> = (0..26).collect();

        let blocks = DataBlock::build(&raw, version, EcLevel::H).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].num_data_codewords, 9);
        assert_eq!(blocks[0].codewords, raw);
    }

    #[test]
    fn verify_uneven_blocks() {
        // Version 5-Q: blocks of (15 + 18) x2 and (16 + 18) x2.
        let version = Version::get(5).unwrap();
        let raw: Vec<u8> = (0..134).collect();

        let blocks = DataBlock::build(&raw, version, EcLevel::Q).unwrap();
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0].num_data_codewords, 15);
        assert_eq!(blocks[3].num_data_codewords, 16);

        // Data interleave: raw[0..4] are the first codeword of each block.
        assert_eq!(blocks[0].codewords[0], 0);
        assert_eq!(blocks[1].codewords[0], 1);
        assert_eq!(blocks[2].codewords[0], 2);
        assert_eq!(blocks[3].codewords[0], 3);

        // The 16th data codeword exists only in the longer blocks.
        assert_eq!(blocks[2].codewords[15], 60);
        assert_eq!(blocks[3].codewords[15], 61);

        // First EC codeword of each block follows the 62 data codewords.
        assert_eq!(blocks[0].codewords[15], 62);
        assert_eq!(blocks[1].codewords[15], 63);
        assert_eq!(blocks[2].codewords[16], 64);
        assert_eq!(blocks[3].codewords[16], 65);
    }
}
