// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Stria.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// No barcode symbol was located in the image or on the scanned row. This error is raised and
    /// discarded on every rejected candidate while hunting for a symbol, so it carries no payload.
    NotFound,
    /// A symbol was located, but its structural bits (format information, version information, or
    /// segment modes) are invalid and could not be corrected.
    FormatError(&'static str),
    /// Error correction exhausted its capacity, or a symbology check digit did not verify.
    ChecksumError(&'static str),
    /// A required character set or feature is not available.
    Unsupported(&'static str),
    /// The content cannot be encoded: it does not fit any version at the requested error
    /// correction level, or contains characters invalid for the requested mode.
    WriterError(&'static str),
    /// A caller contract was violated. Propagated, never retried.
    InvalidArgument(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::NotFound => {
                write!(f, "no barcode found")
            }
            Error::FormatError(msg) => {
                write!(f, "malformed symbol: {}", msg)
            }
            Error::ChecksumError(msg) => {
                write!(f, "checksum failure: {}", msg)
            }
            Error::Unsupported(feature) => {
                write!(f, "unsupported feature: {}", feature)
            }
            Error::WriterError(msg) => {
                write!(f, "cannot encode: {}", msg)
            }
            Error::InvalidArgument(msg) => {
                write!(f, "invalid argument: {}", msg)
            }
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a not-found error.
///
/// Rejected candidates are a hot path during detection, therefore this constructor must stay
/// allocation-free.
#[inline]
pub fn not_found_error<T>() -> Result<T> {
    Err(Error::NotFound)
}

/// Convenience function to create a format error.
pub fn format_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::FormatError(desc))
}

/// Convenience function to create a checksum error.
pub fn checksum_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::ChecksumError(desc))
}

/// Convenience function to create an unsupported feature error.
pub fn unsupported_error<T>(feature: &'static str) -> Result<T> {
    Err(Error::Unsupported(feature))
}

/// Convenience function to create a writer error.
pub fn writer_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::WriterError(desc))
}

/// Convenience function to create an invalid argument error.
pub fn invalid_argument_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::InvalidArgument(desc))
}
