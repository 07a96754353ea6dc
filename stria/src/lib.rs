// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! # Project Stria
//!
//! Stria is a pure Rust barcode decoding and encoding framework.
//!
//! # Support
//!
//! Symbology families are enabled via feature flags, all on by default.
//!
//! | Family                              | Feature Flag | Default |
//! |-------------------------------------|--------------|---------|
//! | QR Code (read + write)              | `qr`         | Yes     |
//! | UPC/EAN, Code 39, Code 128 (read)   | `oned`       | Yes     |
//! | Result post-parsers (MECARD, ...)   | `parsers`    | Yes     |
//!
//! # Usage
//!
//! Decoding starts from a [`LuminanceSource`][core::luma::LuminanceSource]: adapt whatever
//! raster you have (or use [`GreyImage`][core::luma::GreyImage]), then call [`decode`] with
//! [`DecodeOptions`][core::options::DecodeOptions]. The result is a
//! [`Reading`][core::reading::Reading]: text, raw bytes, anchor points, and the format that
//! matched. Pass the reading to [`parse`] for a typed interpretation of the payload.
//!
//! Encoding is the reverse: [`encode`] builds a QR symbol, and its
//! [`render`][::stria_qr::QrCode::render] method produces the module matrix to paint.
//!
//! Readers for each enabled family are registered in a
//! [`ReaderRegistry`][core::reader::ReaderRegistry]; [`default::get_readers`] returns the
//! registry for the enabled features, and [`decode_with_registry`][core::reader] drives it.

pub use stria_core as core;

#[cfg(feature = "oned")]
pub use stria_oned as oned;

#[cfg(feature = "parsers")]
pub use stria_parsers as parsers;

#[cfg(feature = "qr")]
pub use stria_qr as qr;

use stria_core::binarize::BinaryImage;
use stria_core::errors::Result;
use stria_core::luma::LuminanceSource;
use stria_core::options::DecodeOptions;
use stria_core::reader::decode_with_registry;
use stria_core::reading::Reading;

pub mod default {
    //! Default reader registry for the enabled features.

    use stria_core::reader::ReaderRegistry;

    /// Gets the default `ReaderRegistry`, with a reader registered per enabled symbology
    /// family, in decode priority order.
    pub fn get_readers() -> ReaderRegistry {
        let mut registry = ReaderRegistry::new();

        #[cfg(feature = "oned")]
        registry.register(&stria_oned::OneDReader::descriptor());

        #[cfg(feature = "qr")]
        registry.register(&stria_qr::QrReader::descriptor());

        registry
    }
}

/// Decodes the first barcode found in `source`, trying every enabled symbology family.
pub fn decode(source: Box<dyn LuminanceSource>, options: &DecodeOptions) -> Result<Reading> {
    let mut image = BinaryImage::from_source(source);
    decode_with_registry(&mut image, &default::get_readers(), options)
}

/// Decodes from an already-binarized image, sharing the cached black matrix across readers.
pub fn decode_binary(image: &mut BinaryImage, options: &DecodeOptions) -> Result<Reading> {
    decode_with_registry(image, &default::get_readers(), options)
}

/// Decodes a clean QR module matrix directly, bypassing detection.
#[cfg(feature = "qr")]
pub fn decode_matrix(
    matrix: &stria_core::matrix::BitMatrix,
    options: &DecodeOptions,
) -> Result<Reading> {
    stria_qr::decode_matrix(matrix, options)
}

/// Encodes `content` as a QR symbol.
#[cfg(feature = "qr")]
pub fn encode(
    content: &str,
    ec_level: stria_qr::EcLevel,
    options: &stria_core::options::EncodeOptions,
) -> Result<stria_qr::QrCode> {
    stria_qr::encode(content, ec_level, options)
}

/// Interprets a decoded payload as a typed result.
#[cfg(feature = "parsers")]
pub fn parse(reading: &Reading) -> stria_parsers::ParsedReading {
    stria_parsers::parse_reading(reading)
}
