// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `eci` module maps Extended Channel Interpretation values to character sets.
//!
//! An ECI segment switches the character set for the byte segments that follow it. ISO-8859-1 is
//! special-cased: its 256 code points are exactly the first 256 of Unicode, and the general
//! purpose web encodings conflate the label with windows-1252, which differs in 0x80..0x9f.

use encoding_rs::Encoding;

use stria_core::errors::{format_error, unsupported_error, Result};

/// A character set a byte segment may be decoded with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CharacterSet {
    /// ISO-8859-1, decoded as a direct map onto U+0000..U+00FF.
    Latin1,
    /// A character set decoded by `encoding_rs`.
    Encoding(&'static Encoding),
}

impl CharacterSet {
    pub fn utf8() -> CharacterSet {
        CharacterSet::Encoding(encoding_rs::UTF_8)
    }

    pub fn shift_jis() -> CharacterSet {
        CharacterSet::Encoding(encoding_rs::SHIFT_JIS)
    }

    /// The character set assigned to an ECI value.
    pub fn from_eci(value: u32) -> Result<CharacterSet> {
        let label: &str = match value {
            1 | 3 => return Ok(CharacterSet::Latin1),
            4 => "ISO-8859-2",
            5 => "ISO-8859-3",
            6 => "ISO-8859-4",
            7 => "ISO-8859-5",
            8 => "ISO-8859-6",
            9 => "ISO-8859-7",
            10 => "ISO-8859-8",
            11 => "ISO-8859-9",
            12 => "ISO-8859-10",
            13 => "ISO-8859-11",
            15 => "ISO-8859-13",
            16 => "ISO-8859-14",
            17 => "ISO-8859-15",
            18 => "ISO-8859-16",
            20 => "Shift_JIS",
            21 => "windows-1250",
            22 => "windows-1251",
            23 => "windows-1252",
            24 => "windows-1256",
            25 => "UTF-16BE",
            // US-ASCII is a strict subset of the Latin-1 mapping.
            27 | 170 => return Ok(CharacterSet::Latin1),
            26 => "UTF-8",
            28 => "Big5",
            29 => "GB2312",
            30 => "EUC-KR",
            _ => return unsupported_error("unassigned or unsupported ECI value"),
        };

        match Encoding::for_label(label.as_bytes()) {
            Some(encoding) => Ok(CharacterSet::Encoding(encoding)),
            None => unsupported_error("character set unavailable"),
        }
    }

    /// The character set for a caller-supplied name such as `"UTF-8"` or `"Shift_JIS"`.
    pub fn from_name(name: &str) -> Result<CharacterSet> {
        if name.eq_ignore_ascii_case("ISO-8859-1")
            || name.eq_ignore_ascii_case("ISO8859_1")
            || name.eq_ignore_ascii_case("Latin-1")
            || name.eq_ignore_ascii_case("US-ASCII")
        {
            return Ok(CharacterSet::Latin1);
        }

        match Encoding::for_label(name.as_bytes()) {
            Some(encoding) => Ok(CharacterSet::Encoding(encoding)),
            None => unsupported_error("character set unavailable"),
        }
    }

    /// Decodes `bytes` into a string. Malformed input for the declared character set is a format
    /// error.
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match *self {
            CharacterSet::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            CharacterSet::Encoding(encoding) => {
                let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
                if had_errors {
                    return format_error("byte segment malformed for its character set");
                }
                Ok(text.into_owned())
            }
        }
    }

    /// Encodes `text`, failing when the text has no representation in this character set.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        match *self {
            CharacterSet::Latin1 => {
                let mut bytes = Vec::with_capacity(text.len());
                for c in text.chars() {
                    let value = u32::from(c);
                    if value > 0xff {
                        return unsupported_error("character outside ISO-8859-1");
                    }
                    bytes.push(value as u8);
                }
                Ok(bytes)
            }
            CharacterSet::Encoding(encoding) => {
                let (bytes, _, had_errors) = encoding.encode(text);
                if had_errors {
                    return unsupported_error("character outside the requested character set");
                }
                Ok(bytes.into_owned())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_latin1_round_trip() {
        let charset = CharacterSet::from_eci(3).unwrap();
        assert_eq!(charset, CharacterSet::Latin1);

        let text = "caf\u{e9} \u{80}\u{9f}\u{ff}";
        let bytes = charset.encode(text).unwrap();
        assert_eq!(bytes, vec![0x63, 0x61, 0x66, 0xe9, 0x20, 0x80, 0x9f, 0xff]);
        assert_eq!(charset.decode(&bytes).unwrap(), text);

        assert!(charset.encode("\u{100}").is_err());
    }

    #[test]
    fn verify_shift_jis() {
        let charset = CharacterSet::from_eci(20).unwrap();

        // KATAKANA LETTER A in Shift JIS.
        assert_eq!(charset.decode(&[0x83, 0x41]).unwrap(), "\u{30a2}");
        assert_eq!(charset.encode("\u{30a2}").unwrap(), vec![0x83, 0x41]);
    }

    #[test]
    fn verify_unknown_eci_is_unsupported() {
        assert!(CharacterSet::from_eci(99).is_err());
        assert!(CharacterSet::from_name("no-such-charset").is_err());
    }
}
