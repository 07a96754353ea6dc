// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `parser` module reads the structural fields out of a sampled symbol matrix: format
//! information, version information, and the raw codewords in placement order.

use log::debug;

use stria_core::errors::{format_error, Result};
use stria_core::matrix::BitMatrix;

use crate::decoder::format_info::FormatInformation;
use crate::encoder::mask::get_data_mask_bit;
use crate::version::Version;

pub struct BitMatrixParser {
    matrix: BitMatrix,
}

impl BitMatrixParser {
    pub fn new(matrix: BitMatrix) -> Result<Self> {
        let dimension = matrix.height();
        if dimension < 21 || dimension % 4 != 1 || matrix.width() != dimension {
            return format_error("matrix is not a QR symbol");
        }
        Ok(BitMatrixParser { matrix })
    }

    fn copy_bit(&self, x: usize, y: usize, bits: u32) -> u32 {
        if self.matrix.get(x, y) {
            (bits << 1) | 0x1
        }
        else {
            bits << 1
        }
    }

    /// Reads both copies of the format information and decodes them.
    pub fn read_format_information(&self) -> Result<FormatInformation> {
        // First copy, around the top-left finder.
        let mut format_info_bits_1 = 0;
        for x in 0..6 {
            format_info_bits_1 = self.copy_bit(x, 8, format_info_bits_1);
        }
        format_info_bits_1 = self.copy_bit(7, 8, format_info_bits_1);
        format_info_bits_1 = self.copy_bit(8, 8, format_info_bits_1);
        format_info_bits_1 = self.copy_bit(8, 7, format_info_bits_1);
        for y in (0..6).rev() {
            format_info_bits_1 = self.copy_bit(8, y, format_info_bits_1);
        }

        // Second copy, split between the bottom-left and top-right finders.
        let dimension = self.matrix.height();
        let mut format_info_bits_2 = 0;
        for y in (dimension - 7..dimension).rev() {
            format_info_bits_2 = self.copy_bit(8, y, format_info_bits_2);
        }
        for x in dimension - 8..dimension {
            format_info_bits_2 = self.copy_bit(x, 8, format_info_bits_2);
        }

        FormatInformation::decode(format_info_bits_1, format_info_bits_2)
    }

    /// Determines the symbol version: from the dimension for small symbols, from the version
    /// information blocks for dimensions 45 and up. When neither information copy decodes to a
    /// version consistent with the dimension, the dimension-derived version is used.
    pub fn read_version(&self) -> Result<&'static Version> {
        let dimension = self.matrix.height();

        let provisional = Version::for_dimension(dimension)?;
        if provisional.number() <= 6 {
            return Ok(provisional);
        }

        // Top-right block: 3 wide, 6 tall, read bottom-up right-to-left.
        let mut version_bits = 0;
        let ij_min = dimension - 11;
        for y in (0..6).rev() {
            for x in (ij_min..dimension - 8).rev() {
                version_bits = self.copy_bit(x, y, version_bits);
            }
        }
        if let Ok(version) = Version::decode_version_information(version_bits) {
            if version.dimension() == dimension {
                return Ok(version);
            }
        }

        // Bottom-left block: 6 wide, 3 tall.
        let mut version_bits = 0;
        for x in (0..6).rev() {
            for y in (ij_min..dimension - 8).rev() {
                version_bits = self.copy_bit(x, y, version_bits);
            }
        }
        if let Ok(version) = Version::decode_version_information(version_bits) {
            if version.dimension() == dimension {
                return Ok(version);
            }
        }

        debug!("version information unreadable, falling back to dimension");
        Ok(provisional)
    }

    /// Reverses the data mask over the non-function modules.
    pub fn unmask(&mut self, data_mask: u32) -> Result<()> {
        let dimension = self.matrix.height();
        for y in 0..dimension {
            for x in 0..dimension {
                if get_data_mask_bit(data_mask, x, y)? {
                    self.matrix.flip(x, y);
                }
            }
        }
        Ok(())
    }

    /// Walks the zig-zag placement order, skipping function modules, and packs the data region
    /// into codewords. `unmask` must have been applied first. `unmask` flips function modules
    /// too, but those are never read here, so exempting them would be wasted work.
    pub fn read_codewords(&mut self, version: &Version) -> Result<Vec<u8>> {
        let dimension = self.matrix.height();
        if version.dimension() != dimension {
            return format_error("version does not match matrix dimension");
        }

        let function_pattern = version.build_function_pattern();

        let mut result = Vec::with_capacity(version.total_codewords());
        let mut bits_read = 0;
        let mut current_byte: u32 = 0;
        let mut reading_up = true;

        let mut x = dimension as i32 - 1;
        while x > 0 {
            if x == 6 {
                // Skip the vertical timing column.
                x -= 1;
            }

            for count in 0..dimension {
                let y = if reading_up { dimension - 1 - count } else { count };

                for col in 0..2 {
                    let xx = (x as usize) - col;
                    if function_pattern.get(xx, y) {
                        continue;
                    }

                    bits_read += 1;
                    current_byte <<= 1;
                    if self.matrix.get(xx, y) {
                        current_byte |= 1;
                    }

                    if bits_read == 8 {
                        result.push(current_byte as u8);
                        bits_read = 0;
                        current_byte = 0;
                    }
                }
            }

            reading_up = !reading_up;
            x -= 2;
        }

        if result.len() != version.total_codewords() {
            return format_error("codeword count does not match the version");
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecl::EcLevel;
    use crate::encoder;
    use stria_core::options::EncodeOptions;

    #[test]
    fn verify_parse_round_trip() {
        // Encode a symbol, then read its structure back.
        let qr = encoder::encode("HELLO WORLD", EcLevel::Q, &EncodeOptions::default()).unwrap();
        let bits = qr.render().unwrap();

        let mut parser = BitMatrixParser::new(bits).unwrap();

        let format_info = parser.read_format_information().unwrap();
        assert_eq!(format_info.ec_level, EcLevel::Q);
        assert_eq!(format_info.data_mask, qr.mask_pattern);

        let version = parser.read_version().unwrap();
        assert_eq!(version.number(), qr.version);

        parser.unmask(format_info.data_mask).unwrap();
        let codewords = parser.read_codewords(version).unwrap();
        assert_eq!(codewords.len(), qr.num_total_bytes);
    }

    #[test]
    fn verify_rejects_non_symbol() {
        assert!(BitMatrixParser::new(BitMatrix::square(20)).is_err());
        assert!(BitMatrixParser::new(BitMatrix::new(21, 25)).is_err());
    }
}
