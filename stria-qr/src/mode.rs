// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use stria_core::errors::{format_error, Result};

/// A QR data segment mode. The four-bit mode indicator opens every segment of the bit stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Ends the bit stream.
    Terminator,
    /// Digits packed three to ten bits.
    Numeric,
    /// The 45-character alphanumeric set packed two to eleven bits.
    Alphanumeric,
    /// Symbol sequence marker for multi-symbol payloads.
    StructuredAppend,
    /// Eight bits per byte in a character set established by ECI (default ISO-8859-1).
    Byte,
    /// Switches the character set for subsequent byte segments.
    Eci,
    /// Shift JIS double-byte characters packed thirteen bits each.
    Kanji,
    /// GS1 FNC1 in first position.
    Fnc1First,
    /// AIM FNC1 in second position.
    Fnc1Second,
}

impl Mode {
    /// The four-bit mode indicator.
    pub fn bits(&self) -> u32 {
        match *self {
            Mode::Terminator => 0x0,
            Mode::Numeric => 0x1,
            Mode::Alphanumeric => 0x2,
            Mode::StructuredAppend => 0x3,
            Mode::Byte => 0x4,
            Mode::Fnc1First => 0x5,
            Mode::Eci => 0x7,
            Mode::Kanji => 0x8,
            Mode::Fnc1Second => 0x9,
        }
    }

    /// The mode for a four-bit indicator.
    pub fn from_bits(bits: u32) -> Result<Mode> {
        match bits {
            0x0 => Ok(Mode::Terminator),
            0x1 => Ok(Mode::Numeric),
            0x2 => Ok(Mode::Alphanumeric),
            0x3 => Ok(Mode::StructuredAppend),
            0x4 => Ok(Mode::Byte),
            0x5 => Ok(Mode::Fnc1First),
            0x7 => Ok(Mode::Eci),
            0x8 => Ok(Mode::Kanji),
            0x9 => Ok(Mode::Fnc1Second),
            _ => format_error("unknown segment mode"),
        }
    }

    /// The width in bits of the character count indicator following this mode's indicator. The
    /// width grows with the version band: 1-9, 10-26, 27-40.
    pub fn character_count_bits(&self, version: u32) -> usize {
        let band = if version <= 9 {
            0
        }
        else if version <= 26 {
            1
        }
        else {
            2
        };

        match *self {
            Mode::Numeric => [10, 12, 14][band],
            Mode::Alphanumeric => [9, 11, 13][band],
            Mode::Byte => [8, 16, 16][band],
            Mode::Kanji => [8, 10, 12][band],
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_character_count_bits() {
        assert_eq!(Mode::Numeric.character_count_bits(1), 10);
        assert_eq!(Mode::Numeric.character_count_bits(9), 10);
        assert_eq!(Mode::Numeric.character_count_bits(10), 12);
        assert_eq!(Mode::Numeric.character_count_bits(27), 14);
        assert_eq!(Mode::Alphanumeric.character_count_bits(1), 9);
        assert_eq!(Mode::Alphanumeric.character_count_bits(26), 11);
        assert_eq!(Mode::Alphanumeric.character_count_bits(40), 13);
        assert_eq!(Mode::Byte.character_count_bits(1), 8);
        assert_eq!(Mode::Byte.character_count_bits(40), 16);
        assert_eq!(Mode::Kanji.character_count_bits(1), 8);
        assert_eq!(Mode::Kanji.character_count_bits(20), 10);
        assert_eq!(Mode::Kanji.character_count_bits(30), 12);
        assert_eq!(Mode::Eci.character_count_bits(1), 0);
    }

    #[test]
    fn verify_bits_round_trip() {
        for mode in [
            Mode::Terminator,
            Mode::Numeric,
            Mode::Alphanumeric,
            Mode::StructuredAppend,
            Mode::Byte,
            Mode::Eci,
            Mode::Kanji,
            Mode::Fnc1First,
            Mode::Fnc1Second,
        ] {
            assert_eq!(Mode::from_bits(mode.bits()).unwrap(), mode);
        }
        assert!(Mode::from_bits(0x6).is_err());
    }
}
