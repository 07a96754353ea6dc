// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `decoder` module turns a sampled symbol matrix into text: structural field extraction,
//! de-masking, de-interleaving, Reed-Solomon correction, and bit stream parsing.

pub mod bitstream;
pub mod blocks;
pub mod format_info;
pub mod parser;

use log::debug;

use stria_core::ecc::ReedSolomonDecoder;
use stria_core::errors::Result;
use stria_core::matrix::BitMatrix;
use stria_core::options::DecodeOptions;

use crate::ecl::EcLevel;

use blocks::DataBlock;
use parser::BitMatrixParser;

/// The decoded payload of one symbol.
pub struct DecoderResult {
    pub text: String,
    /// The corrected data codewords, before bit stream parsing.
    pub raw_bytes: Vec<u8>,
    pub byte_segments: Vec<Vec<u8>>,
    pub ec_level: EcLevel,
    pub version: u32,
    /// Total byte errors corrected across all blocks.
    pub errors_corrected: usize,
}

/// Decodes a sampled, de-skewed symbol matrix.
pub fn decode_matrix(matrix: &BitMatrix, options: &DecodeOptions) -> Result<DecoderResult> {
    let mut parser = BitMatrixParser::new(matrix.clone())?;

    let version = parser.read_version()?;
    let format_info = parser.read_format_information()?;

    parser.unmask(format_info.data_mask)?;
    let raw_codewords = parser.read_codewords(version)?;

    let data_blocks = DataBlock::build(&raw_codewords, version, format_info.ec_level)?;

    let total_data: usize = data_blocks.iter().map(|b| b.num_data_codewords).sum();
    let mut data_bytes = Vec::with_capacity(total_data);
    let mut errors_corrected = 0;

    for mut block in data_blocks {
        let num_ec = block.codewords.len() - block.num_data_codewords;
        errors_corrected += ReedSolomonDecoder::decode(&mut block.codewords, num_ec)?;
        data_bytes.extend_from_slice(&block.codewords[..block.num_data_codewords]);
    }

    if errors_corrected > 0 {
        debug!("corrected {} byte errors", errors_corrected);
    }

    let stream = bitstream::decode(&data_bytes, version, options)?;

    Ok(DecoderResult {
        text: stream.text,
        raw_bytes: data_bytes,
        byte_segments: stream.byte_segments,
        ec_level: format_info.ec_level,
        version: version.number(),
        errors_corrected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder;
    use stria_core::options::EncodeOptions;

    #[test]
    fn verify_decode_rendered_symbol() {
        for (content, level) in [
            ("ABCDEF", EcLevel::H),
            ("0123456789", EcLevel::L),
            ("http://example.com/path?q=1", EcLevel::M),
            ("caf\u{e9} au lait", EcLevel::Q),
        ] {
            let qr = encoder::encode(content, level, &EncodeOptions::default()).unwrap();
            let bits = qr.render().unwrap();

            let decoded = decode_matrix(&bits, &DecodeOptions::default()).unwrap();
            assert_eq!(decoded.text, content, "content {:?} level {}", content, level);
            assert_eq!(decoded.ec_level, level);
            assert_eq!(decoded.version, qr.version);
            assert_eq!(decoded.errors_corrected, 0);
        }
    }

    #[test]
    fn verify_decode_with_damage() {
        let qr = encoder::encode("DAMAGE TEST", EcLevel::H, &EncodeOptions::default()).unwrap();
        let mut bits = qr.render().unwrap();

        // Flip a clump of data modules, well inside correction capacity at level H.
        for x in 9..12 {
            bits.flip(x, 10);
            bits.flip(x, 11);
        }

        let decoded = decode_matrix(&bits, &DecodeOptions::default()).unwrap();
        assert_eq!(decoded.text, "DAMAGE TEST");
        assert!(decoded.errors_corrected > 0);
    }

    #[test]
    fn verify_decode_beyond_capacity_fails() {
        let qr = encoder::encode("TOO FAR GONE", EcLevel::L, &EncodeOptions::default()).unwrap();
        let mut bits = qr.render().unwrap();

        // Mangle several full data rows, far past level L's correction capacity. These rows
        // avoid the finder, format, and dark-module cells on a version 1 symbol.
        for y in 9..13 {
            for x in 0..bits.width() {
                if (x + y) % 2 == 0 {
                    bits.flip(x, y);
                }
            }
        }

        assert!(decode_matrix(&bits, &DecodeOptions::default()).is_err());
    }
}
