// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One-dimensional barcode support for Project Stria: row decoders for the UPC/EAN family,
//! Code 39, and Code 128, and the scanning dispatcher that drives them across image rows.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
#![allow(clippy::manual_range_contains)]
#![allow(clippy::identity_op)]

pub mod code128;
pub mod code39;
pub mod row;
pub mod upc_ean;

use log::trace;

use stria_core::binarize::BinaryImage;
use stria_core::errors::{not_found_error, Error, Result};
use stria_core::format::FormatSet;
use stria_core::io::BitArray;
use stria_core::options::DecodeOptions;
use stria_core::reader::{Reader, ReaderDescriptor};
use stria_core::reading::{MetadataKey, MetadataValue, Reading};
use stria_core::support_reader;

pub use code128::Code128Reader;
pub use code39::Code39Reader;
pub use upc_ean::UpcEanReader;

/// A `RowReader` decodes one symbology family from a single binarized row.
pub trait RowReader {
    /// The formats this reader may return.
    fn formats(&self) -> FormatSet;

    /// Attempts to decode one symbol from the row.
    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        options: &DecodeOptions,
    ) -> Result<Reading>;
}

/// The 1D scanning dispatcher.
///
/// Rows are visited middle-out, on the theory that the symbol is centered in a deliberately
/// taken image. Each visited row is offered to every admissible row reader in order; a reader's
/// `NotFound` passes the row to the next reader, while a checksum or format error means a symbol
/// was found but is bad, which ends the scan. Under try-harder every row is visited and each is
/// also retried right-to-left.
pub struct OneDReader {
    readers: Vec<Box<dyn RowReader>>,
}

impl OneDReader {
    /// A dispatcher over all built-in row readers.
    pub fn new(options: &DecodeOptions) -> Self {
        OneDReader {
            readers: vec![
                Box::new(UpcEanReader::new(options)),
                Box::new(Code39Reader::new(options)),
                Box::new(Code128Reader::new(options)),
            ],
        }
    }

    pub fn with_readers(readers: Vec<Box<dyn RowReader>>) -> Self {
        OneDReader { readers }
    }

    /// The descriptor to register with a `ReaderRegistry`.
    pub fn descriptor() -> ReaderDescriptor {
        support_reader!(
            FormatSet::PRODUCT_1D.union(FormatSet::INDUSTRIAL_1D),
            "oned",
            "1D symbology family"
        )
    }

    fn decode_one_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        options: &DecodeOptions,
    ) -> Result<Reading> {
        let allowed = options.formats.unwrap_or(FormatSet::all());

        for reader in self.readers.iter_mut() {
            if !allowed.intersects(reader.formats()) {
                continue;
            }

            match reader.decode_row(row_number, row, options) {
                Ok(reading) => return Ok(reading),
                Err(Error::NotFound) => (),
                Err(err) => return Err(err),
            }
        }

        not_found_error()
    }
}

impl Reader for OneDReader {
    fn decode(&mut self, image: &mut BinaryImage, options: &DecodeOptions) -> Result<Reading> {
        let width = image.width();
        let height = image.height();

        let middle = height >> 1;
        let row_step = std::cmp::max(1, height >> if options.try_harder { 8 } else { 5 });
        let max_lines = if options.try_harder { height } else { 15 };

        let mut row = BitArray::new(width);

        for line in 0..max_lines {
            // Scan rows outward from the middle: middle, above, below, further above, ...
            let row_steps = (line + 1) / 2;
            let offset = row_step * row_steps;
            let row_number = if line & 1 == 0 {
                middle.checked_add(offset).filter(|&n| n < height)
            }
            else {
                middle.checked_sub(offset)
            };
            let row_number = match row_number {
                Some(n) => n,
                None => break,
            };

            if image.black_row(row_number, &mut row).is_err() {
                continue;
            }

            trace!("scanning row {}", row_number);

            match self.decode_one_row(row_number, &row, options) {
                Ok(reading) => return Ok(reading),
                Err(Error::NotFound) => (),
                Err(err) => return Err(err),
            }

            if options.try_harder {
                // Retry the row right-to-left; mirror the anchor points back afterward.
                let mut reversed = row.clone();
                reversed.reverse();

                match self.decode_one_row(row_number, &reversed, options) {
                    Ok(mut reading) => {
                        reading.put_metadata(MetadataKey::Orientation, MetadataValue::UInt(180));
                        for point in reading.points.iter_mut() {
                            point.x = width as f32 - point.x - 1.0;
                        }
                        return Ok(reading);
                    }
                    Err(Error::NotFound) => (),
                    Err(err) => return Err(err),
                }
            }
        }

        not_found_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stria_core::format::BarcodeFormat;
    use stria_core::luma::GreyImage;

    /// Paints a module-run row pattern across the middle band of a grey image.
    fn image_of_runs(runs: &[usize], scale: usize) -> BinaryImage {
        let width: usize = runs.iter().sum::<usize>() * scale;
        let height = 60;
        let mut image = GreyImage::blank(width, height);

        for y in 20..40 {
            let mut x = 0;
            let mut dark = false;
            for &run in runs {
                for _ in 0..run * scale {
                    if dark {
                        image.put(x, y, 0x10);
                    }
                    x += 1;
                }
                dark = !dark;
            }
        }

        BinaryImage::from_source(Box::new(image))
    }

    // Code 128: "HI" (start B, 40, 41, check 20, stop).
    fn code128_hi_runs() -> Vec<usize> {
        let mut runs = vec![12];
        for code in [104usize, 40, 41, 20, 106] {
            runs.extend_from_slice(code128::CODE_PATTERNS[code]);
        }
        runs.push(12);
        runs
    }

    #[test]
    fn verify_dispatch_decodes_code128() {
        let mut image = image_of_runs(&code128_hi_runs(), 3);
        let mut reader = OneDReader::new(&DecodeOptions::default());

        let reading = reader.decode(&mut image, &DecodeOptions::default()).unwrap();
        assert_eq!(reading.text(), "HI");
        assert_eq!(reading.format, BarcodeFormat::Code128);
    }

    #[test]
    fn verify_try_harder_reversed_row() {
        let mut runs = code128_hi_runs();
        runs.reverse();

        let mut image = image_of_runs(&runs, 3);
        let mut reader = OneDReader::new(&DecodeOptions::default());

        let normal = DecodeOptions::default();
        assert_eq!(reader.decode(&mut image, &normal).unwrap_err(), Error::NotFound);

        let harder = DecodeOptions { try_harder: true, ..DecodeOptions::default() };
        let reading = reader.decode(&mut image, &harder).unwrap();
        assert_eq!(reading.text(), "HI");
        assert_eq!(
            reading.metadata(MetadataKey::Orientation),
            Some(&MetadataValue::UInt(180))
        );
    }

    #[test]
    fn verify_blank_image_not_found() {
        let mut image =
            BinaryImage::from_source(Box::new(GreyImage::blank(120, 60)));
        let mut reader = OneDReader::new(&DecodeOptions::default());

        assert_eq!(
            reader.decode(&mut image, &DecodeOptions::default()).unwrap_err(),
            Error::NotFound
        );
    }
}
