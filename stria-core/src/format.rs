// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `format` module enumerates the barcode symbologies known to Stria.

use std::fmt;

use bitflags::bitflags;

/// A `BarcodeFormat` identifies the symbology a `Reading` was decoded from, or that a writer
/// produced. It is an immutable tag; it carries no decoding state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BarcodeFormat {
    /// QR Code (ISO/IEC 18004).
    QrCode,
    /// Data Matrix (ISO/IEC 16022).
    DataMatrix,
    /// UPC-A (GS1).
    UpcA,
    /// UPC-E (GS1).
    UpcE,
    /// EAN-8 (GS1).
    Ean8,
    /// EAN-13 (GS1).
    Ean13,
    /// Code 39 (ISO/IEC 16388).
    Code39,
    /// Code 128 (ISO/IEC 15417).
    Code128,
    /// Interleaved 2 of 5.
    Itf,
    /// PDF417 (ISO/IEC 15438).
    Pdf417,
    /// RSS-14 (GS1 DataBar).
    Rss14,
}

impl BarcodeFormat {
    /// Returns the `FormatSet` flag corresponding to this format.
    pub fn as_set(&self) -> FormatSet {
        match *self {
            BarcodeFormat::QrCode => FormatSet::QR_CODE,
            BarcodeFormat::DataMatrix => FormatSet::DATA_MATRIX,
            BarcodeFormat::UpcA => FormatSet::UPC_A,
            BarcodeFormat::UpcE => FormatSet::UPC_E,
            BarcodeFormat::Ean8 => FormatSet::EAN_8,
            BarcodeFormat::Ean13 => FormatSet::EAN_13,
            BarcodeFormat::Code39 => FormatSet::CODE_39,
            BarcodeFormat::Code128 => FormatSet::CODE_128,
            BarcodeFormat::Itf => FormatSet::ITF,
            BarcodeFormat::Pdf417 => FormatSet::PDF_417,
            BarcodeFormat::Rss14 => FormatSet::RSS_14,
        }
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            BarcodeFormat::QrCode => "QR Code",
            BarcodeFormat::DataMatrix => "Data Matrix",
            BarcodeFormat::UpcA => "UPC-A",
            BarcodeFormat::UpcE => "UPC-E",
            BarcodeFormat::Ean8 => "EAN-8",
            BarcodeFormat::Ean13 => "EAN-13",
            BarcodeFormat::Code39 => "Code 39",
            BarcodeFormat::Code128 => "Code 128",
            BarcodeFormat::Itf => "ITF",
            BarcodeFormat::Pdf417 => "PDF417",
            BarcodeFormat::Rss14 => "RSS-14",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// A `FormatSet` is a set of `BarcodeFormat`s. It is used by `DecodeOptions` to restrict
    /// which readers the dispatcher will try.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct FormatSet: u32 {
        const QR_CODE     = 1 << 0;
        const DATA_MATRIX = 1 << 1;
        const UPC_A       = 1 << 2;
        const UPC_E       = 1 << 3;
        const EAN_8       = 1 << 4;
        const EAN_13      = 1 << 5;
        const CODE_39     = 1 << 6;
        const CODE_128    = 1 << 7;
        const ITF         = 1 << 8;
        const PDF_417     = 1 << 9;
        const RSS_14      = 1 << 10;

        /// All one-dimensional product symbologies.
        const PRODUCT_1D = Self::UPC_A.bits()
                         | Self::UPC_E.bits()
                         | Self::EAN_8.bits()
                         | Self::EAN_13.bits()
                         | Self::RSS_14.bits();

        /// All one-dimensional industrial symbologies.
        const INDUSTRIAL_1D = Self::CODE_39.bits()
                            | Self::CODE_128.bits()
                            | Self::ITF.bits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_format_set_round_trip() {
        let formats = [
            BarcodeFormat::QrCode,
            BarcodeFormat::DataMatrix,
            BarcodeFormat::UpcA,
            BarcodeFormat::UpcE,
            BarcodeFormat::Ean8,
            BarcodeFormat::Ean13,
            BarcodeFormat::Code39,
            BarcodeFormat::Code128,
            BarcodeFormat::Itf,
            BarcodeFormat::Pdf417,
            BarcodeFormat::Rss14,
        ];

        let mut all = FormatSet::empty();

        for format in formats {
            assert_eq!(format.as_set().bits().count_ones(), 1);
            all |= format.as_set();
        }

        assert_eq!(all.bits().count_ones(), formats.len() as u32);
    }
}
