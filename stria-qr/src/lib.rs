// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! QR Code support for Project Stria: an encoder producing ISO/IEC 18004 symbols and a reader
//! that locates and decodes them in binarized images.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
#![allow(clippy::manual_range_contains)]
#![allow(clippy::identity_op)]

pub mod decoder;
pub mod detector;
pub mod eci;
pub mod ecl;
pub mod encoder;
pub mod mode;
pub mod version;

use stria_core::binarize::BinaryImage;
use stria_core::errors::Result;
use stria_core::format::{BarcodeFormat, FormatSet};
use stria_core::matrix::BitMatrix;
use stria_core::options::{DecodeOptions, EncodeOptions};
use stria_core::reader::{Reader, ReaderDescriptor};
use stria_core::reading::{MetadataKey, MetadataValue, Reading};
use stria_core::support_reader;

pub use ecl::EcLevel;
pub use encoder::QrCode;

/// Encodes `content` into a QR symbol at the requested error correction level.
pub fn encode(content: &str, ec_level: EcLevel, options: &EncodeOptions) -> Result<QrCode> {
    encoder::encode(content, ec_level, options)
}

/// Decodes a clean, de-skewed module matrix, bypassing detection. Useful when the caller already
/// has the symbol grid, and for encoder round-trip verification.
pub fn decode_matrix(matrix: &BitMatrix, options: &DecodeOptions) -> Result<Reading> {
    let decoded = decoder::decode_matrix(matrix, options)?;
    Ok(build_reading(decoded, Vec::new()))
}

fn build_reading(
    decoded: decoder::DecoderResult,
    points: Vec<stria_core::reading::Point>,
) -> Reading {
    let mut reading = Reading::new(
        decoded.text,
        decoded.raw_bytes.into_boxed_slice(),
        points,
        BarcodeFormat::QrCode,
    );

    reading.put_metadata(
        MetadataKey::ErrorCorrectionLevel,
        MetadataValue::Str(decoded.ec_level.to_string()),
    );
    // ]Q1: QR Code, ECI protocol not transmitted.
    reading.put_metadata(
        MetadataKey::SymbologyIdentifier,
        MetadataValue::Str("]Q1".to_string()),
    );
    if !decoded.byte_segments.is_empty() {
        reading.put_metadata(
            MetadataKey::ByteSegments,
            MetadataValue::Bytes(decoded.byte_segments),
        );
    }

    reading
}

/// The QR Code reader: locates a symbol in a binarized image and decodes it.
pub struct QrReader;

impl QrReader {
    pub fn new(_options: &DecodeOptions) -> Self {
        QrReader
    }

    /// The descriptor to register with a `ReaderRegistry`.
    pub fn descriptor() -> ReaderDescriptor {
        support_reader!(FormatSet::QR_CODE, "qr", "QR Code")
    }
}

impl Reader for QrReader {
    fn decode(&mut self, image: &mut BinaryImage, options: &DecodeOptions) -> Result<Reading> {
        let matrix = image.black_matrix()?;

        let detected = detector::Detector::new(matrix).detect(options.try_harder)?;
        let decoded = decoder::decode_matrix(&detected.bits, options)?;

        Ok(build_reading(decoded, detected.points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stria_core::binarize::BinarizeStrategy;
    use stria_core::luma::GreyImage;

    #[test]
    fn verify_reader_end_to_end() {
        let qr = encode("END TO END", EcLevel::Q, &EncodeOptions::default()).unwrap();
        let modules = qr.render().unwrap();

        // Rasterize at 4 pixels per module with a 4-module quiet zone.
        let scale = 4;
        let quiet = 4 * scale;
        let size = modules.width() * scale + 2 * quiet;
        let mut image = GreyImage::blank(size, size);
        for y in 0..modules.height() {
            for x in 0..modules.width() {
                if modules.get(x, y) {
                    for sy in 0..scale {
                        for sx in 0..scale {
                            image.put(quiet + x * scale + sx, quiet + y * scale + sy, 0x10);
                        }
                    }
                }
            }
        }

        let mut binary =
            BinaryImage::new(Box::new(image), BinarizeStrategy::Hybrid);
        let mut reader = QrReader::new(&DecodeOptions::default());
        let reading = reader.decode(&mut binary, &DecodeOptions::default()).unwrap();

        assert_eq!(reading.text(), "END TO END");
        assert_eq!(reading.format, BarcodeFormat::QrCode);
        assert_eq!(reading.points.len(), 3);
        assert!(reading.metadata(MetadataKey::ErrorCorrectionLevel).is_some());
    }

    #[test]
    fn verify_matrix_round_trip_kanji() {
        // Kanji mode is only entered on an explicit Shift JIS request.
        let options = EncodeOptions { character_set: Some("Shift_JIS".to_string()) };
        let qr = encode("\u{65e5}\u{672c}\u{8a9e}", EcLevel::Q, &options).unwrap();
        assert_eq!(qr.mode, crate::mode::Mode::Kanji);

        let reading =
            decode_matrix(&qr.render().unwrap(), &DecodeOptions::default()).unwrap();
        assert_eq!(reading.text(), "\u{65e5}\u{672c}\u{8a9e}");
    }

    #[test]
    fn verify_matrix_round_trip_utf8() {
        let options = EncodeOptions { character_set: Some("UTF-8".to_string()) };
        let qr = encode("snowman \u{2603}", EcLevel::M, &options).unwrap();

        // Without an ECI segment the character set does not travel with the symbol, so the
        // decode side needs the same hint; the guessing heuristic reads these bytes as Shift JIS.
        let decode_options =
            DecodeOptions { character_set: Some("UTF-8".to_string()), ..DecodeOptions::default() };
        let reading = decode_matrix(&qr.render().unwrap(), &decode_options).unwrap();
        assert_eq!(reading.text(), "snowman \u{2603}");
    }
}
