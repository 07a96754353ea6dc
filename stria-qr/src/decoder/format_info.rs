// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `format_info` module decodes the 15-bit format information word: error correction level
//! and data mask, BCH protected and XOR masked.

use once_cell::sync::Lazy;

use stria_core::errors::{format_error, Result};

use crate::ecl::EcLevel;
use crate::encoder::matrix::calculate_bch_code;

const FORMAT_INFO_MASK: u32 = 0x5412;

/// All 32 valid masked format words, paired with their 5 information bits.
static FORMAT_INFO_DECODE_LOOKUP: Lazy<[(u32, u32); 32]> = Lazy::new(|| {
    let mut table = [(0u32, 0u32); 32];
    for (info, entry) in table.iter_mut().enumerate() {
        let info = info as u32;
        let masked = ((info << 10) | calculate_bch_code(info, 0x537)) ^ FORMAT_INFO_MASK;
        *entry = (masked, info);
    }
    table
});

/// Decoded format information.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FormatInformation {
    pub ec_level: EcLevel,
    pub data_mask: u32,
}

impl FormatInformation {
    fn from_info_bits(info: u32) -> Result<FormatInformation> {
        Ok(FormatInformation {
            ec_level: EcLevel::from_bits((info >> 3) & 0x03)?,
            data_mask: info & 0x07,
        })
    }

    /// Decodes the two raw 15-bit copies read from a symbol, correcting up to 3 bit errors.
    ///
    /// Some symbols in the wild forget to XOR the mask word onto the format bits, so when the
    /// masked interpretation fails the unmasked one is tried as well.
    pub fn decode(masked_copy_1: u32, masked_copy_2: u32) -> Result<FormatInformation> {
        if let Some(info) = do_decode(masked_copy_1, masked_copy_2) {
            return FormatInformation::from_info_bits(info);
        }

        if let Some(info) =
            do_decode(masked_copy_1 ^ FORMAT_INFO_MASK, masked_copy_2 ^ FORMAT_INFO_MASK)
        {
            return FormatInformation::from_info_bits(info);
        }

        format_error("format information unreadable")
    }
}

fn do_decode(copy_1: u32, copy_2: u32) -> Option<u32> {
    let mut best_difference = u32::MAX;
    let mut best_info = 0;

    for &(word, info) in FORMAT_INFO_DECODE_LOOKUP.iter() {
        if word == copy_1 || word == copy_2 {
            return Some(info);
        }

        let difference = (copy_1 ^ word).count_ones();
        if difference < best_difference {
            best_difference = difference;
            best_info = info;
        }

        if copy_1 != copy_2 {
            let difference = (copy_2 ^ word).count_ones();
            if difference < best_difference {
                best_difference = difference;
                best_info = info;
            }
        }
    }

    if best_difference <= 3 {
        Some(best_info)
    }
    else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Level M (00), mask 5: the masked word from the standard.
    const MASKED_TEST_FORMAT_INFO: u32 = 0x40ce;

    #[test]
    fn verify_exact_decode() {
        let info =
            FormatInformation::decode(MASKED_TEST_FORMAT_INFO, MASKED_TEST_FORMAT_INFO).unwrap();
        assert_eq!(info.ec_level, EcLevel::M);
        assert_eq!(info.data_mask, 5);
    }

    #[test]
    fn verify_decode_with_bit_errors() {
        // Three flipped bits correct back to the same word.
        let damaged = MASKED_TEST_FORMAT_INFO ^ 0x07;
        let info = FormatInformation::decode(damaged, MASKED_TEST_FORMAT_INFO).unwrap();
        assert_eq!(info.ec_level, EcLevel::M);
        assert_eq!(info.data_mask, 5);
    }

    #[test]
    fn verify_unmasked_fallback() {
        // A symbol that forgot to apply the mask word.
        let unmasked = MASKED_TEST_FORMAT_INFO ^ FORMAT_INFO_MASK;
        let info = FormatInformation::decode(unmasked, unmasked).unwrap();
        assert_eq!(info.ec_level, EcLevel::M);
        assert_eq!(info.data_mask, 5);
    }
}
