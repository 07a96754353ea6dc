// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `options` module defines the advisory options consumed by readers and writers.

use crate::format::FormatSet;

/// `DecodeOptions` is a common set of options that all readers use. All options are advisory: a
/// reader may ignore an option it has no use for.
#[derive(Clone, Debug)]
pub struct DecodeOptions {
    /// Spend more time to find a symbol: scan every image row, and retry each row right-to-left.
    /// Default: `false`.
    pub try_harder: bool,
    /// If `Some`, only readers for the listed formats are tried. If `None`, every registered
    /// reader is tried. Default: `None`.
    pub formats: Option<FormatSet>,
    /// The name of the character set to assume when a byte segment does not declare one.
    /// Default: `None` (readers guess).
    pub character_set: Option<String>,
    /// Reject a QR bit stream that carries nonzero bits after the terminator. Real-world symbols
    /// violate the standard here often enough that the check is off by default.
    pub strict_terminator: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            try_harder: false,
            formats: None,
            character_set: None,
            strict_terminator: false,
        }
    }
}

/// `EncodeOptions` is a common set of options that writers use.
#[derive(Clone, Debug, Default)]
pub struct EncodeOptions {
    /// The character set used to encode byte segments. Default: `None` (ISO-8859-1).
    pub character_set: Option<String>,
}
