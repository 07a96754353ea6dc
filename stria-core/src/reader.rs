// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `reader` module provides the traits and support structures necessary to implement barcode
//! readers, and the dispatcher that tries registered readers in turn.

use log::{debug, trace};

use crate::binarize::BinaryImage;
use crate::errors::{not_found_error, Error, Result};
use crate::format::FormatSet;
use crate::options::DecodeOptions;
use crate::reading::Reading;

/// A `Reader` attempts to locate and decode every symbology of one family within an image.
pub trait Reader {
    /// Attempts to decode one symbol. Returns `NotFound` when no symbol of this reader's
    /// formats is present.
    fn decode(&mut self, image: &mut BinaryImage, options: &DecodeOptions) -> Result<Reading>;
}

/// A `ReaderDescriptor` stores a description of a reader for one symbology family: the formats it
/// can produce, short and long names, and an instantiation function.
#[derive(Copy, Clone)]
pub struct ReaderDescriptor {
    /// The set of formats this reader may return.
    pub formats: FormatSet,
    /// A short ASCII-only string identifying the reader.
    pub short_name: &'static str,
    /// A longer, more descriptive, string identifying the reader.
    pub long_name: &'static str,
    /// An instantiation function for the reader.
    pub inst_func: fn(&DecodeOptions) -> Box<dyn Reader>,
}

/// Convenience macro for declaring a `ReaderDescriptor`.
#[macro_export]
macro_rules! support_reader {
    ($formats:expr, $short_name:expr, $long_name:expr) => {
        $crate::reader::ReaderDescriptor {
            formats: $formats,
            short_name: $short_name,
            long_name: $long_name,
            inst_func: |options| Box::new(Self::new(options)),
        }
    };
}

/// A `ReaderRegistry` holds the readers the dispatcher will try, in registration order.
#[derive(Default)]
pub struct ReaderRegistry {
    readers: Vec<ReaderDescriptor>,
}

impl ReaderRegistry {
    pub fn new() -> Self {
        ReaderRegistry { readers: Vec::new() }
    }

    /// Registers a reader. Readers are tried in registration order.
    pub fn register(&mut self, descriptor: &ReaderDescriptor) {
        self.readers.push(*descriptor);
    }

    /// The registered descriptors.
    pub fn readers(&self) -> &[ReaderDescriptor] {
        &self.readers
    }
}

/// Tries every registered reader against the image, honoring the possible-formats restriction.
///
/// `NotFound` from a reader means "keep looking" and the next reader is tried. A checksum or
/// format error means a symbol was present but undecodable; the remaining readers are still
/// tried, but if none succeeds that error is reported in preference to `NotFound`.
pub fn decode_with_registry(
    image: &mut BinaryImage,
    registry: &ReaderRegistry,
    options: &DecodeOptions,
) -> Result<Reading> {
    let mut sticky: Option<Error> = None;

    for descriptor in registry.readers() {
        if let Some(formats) = options.formats {
            if !formats.intersects(descriptor.formats) {
                continue;
            }
        }

        trace!("trying reader '{}'", descriptor.short_name);

        let mut reader = (descriptor.inst_func)(options);
        match reader.decode(image, options) {
            Ok(reading) => {
                debug!("reader '{}' decoded {}", descriptor.short_name, reading.format);
                return Ok(reading);
            }
            Err(Error::NotFound) => (),
            Err(err @ (Error::ChecksumError(_) | Error::FormatError(_))) => {
                debug!("reader '{}' failed: {}", descriptor.short_name, err);
                sticky = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    match sticky {
        Some(err) => Err(err),
        None => not_found_error(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binarize::BinaryImage;
    use crate::errors::{checksum_error, format_error};
    use crate::format::BarcodeFormat;
    use crate::luma::GreyImage;

    struct StubReader {
        outcome: fn() -> Result<Reading>,
    }

    impl Reader for StubReader {
        fn decode(&mut self, _: &mut BinaryImage, _: &DecodeOptions) -> Result<Reading> {
            (self.outcome)()
        }
    }

    fn image() -> BinaryImage {
        BinaryImage::from_source(Box::new(GreyImage::blank(8, 8)))
    }

    #[test]
    fn verify_format_filter_skips_readers() {
        fn ok_reader(_: &DecodeOptions) -> Box<dyn Reader> {
            Box::new(StubReader {
                outcome: || Ok(Reading::from_text("x".into(), vec![], BarcodeFormat::QrCode)),
            })
        }

        let mut registry = ReaderRegistry::new();
        registry.register(&ReaderDescriptor {
            formats: FormatSet::QR_CODE,
            short_name: "qr",
            long_name: "QR Stub",
            inst_func: ok_reader,
        });

        let options =
            DecodeOptions { formats: Some(FormatSet::EAN_13), ..DecodeOptions::default() };

        // The only registered reader is filtered out, so the dispatch reports not-found.
        assert_eq!(
            decode_with_registry(&mut image(), &registry, &options).unwrap_err(),
            Error::NotFound
        );
    }

    #[test]
    fn verify_sticky_error_policy() {
        fn checksum_reader(_: &DecodeOptions) -> Box<dyn Reader> {
            Box::new(StubReader { outcome: || checksum_error("test") })
        }
        fn not_found_reader(_: &DecodeOptions) -> Box<dyn Reader> {
            Box::new(StubReader { outcome: || not_found_error() })
        }
        fn format_reader(_: &DecodeOptions) -> Box<dyn Reader> {
            Box::new(StubReader { outcome: || format_error("test") })
        }

        let mut registry = ReaderRegistry::new();
        registry.register(&ReaderDescriptor {
            formats: FormatSet::QR_CODE,
            short_name: "checksum",
            long_name: "Checksum Stub",
            inst_func: checksum_reader,
        });
        registry.register(&ReaderDescriptor {
            formats: FormatSet::EAN_13,
            short_name: "notfound",
            long_name: "NotFound Stub",
            inst_func: not_found_reader,
        });

        // A checksum error beats not-found in the final report.
        let options = DecodeOptions::default();
        assert_eq!(
            decode_with_registry(&mut image(), &registry, &options).unwrap_err(),
            Error::ChecksumError("test")
        );

        // A later structural error replaces the earlier sticky one.
        registry.register(&ReaderDescriptor {
            formats: FormatSet::CODE_39,
            short_name: "format",
            long_name: "Format Stub",
            inst_func: format_reader,
        });
        assert_eq!(
            decode_with_registry(&mut image(), &registry, &options).unwrap_err(),
            Error::FormatError("test")
        );
    }
}
