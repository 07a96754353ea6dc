// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `code39` module decodes Code 39: nine elements per character, three of them wide, framed
//! by asterisk start and stop characters.

use stria_core::errors::{checksum_error, format_error, not_found_error, Result};
use stria_core::format::{BarcodeFormat, FormatSet};
use stria_core::io::BitArray;
use stria_core::options::DecodeOptions;
use stria_core::reading::{Point, Reading};

use crate::row::record_pattern;
use crate::RowReader;

const ALPHABET: &[u8; 44] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-. *$/+%";

/// Element encodings in alphabet order: bit 8 is the first bar, a set bit is a wide element.
const CHARACTER_ENCODINGS: [u16; 44] = [
    0x034, 0x121, 0x061, 0x160, 0x031, 0x130, 0x070, 0x025, 0x124, 0x064, // 0-9
    0x109, 0x049, 0x148, 0x019, 0x118, 0x058, 0x00d, 0x10c, 0x04c, 0x01c, // A-J
    0x103, 0x043, 0x142, 0x013, 0x112, 0x052, 0x007, 0x106, 0x046, 0x016, // K-T
    0x181, 0x0c1, 0x1c0, 0x091, 0x190, 0x0d0, 0x085, 0x184, 0x0c4, 0x094, // U-*
    0x0a8, 0x0a2, 0x08a, 0x02a, // $-%
];

const ASTERISK_ENCODING: u16 = 0x094;

/// A Code 39 reader.
///
/// The check digit is optional in the symbology, so verification is opt-in; extended mode maps
/// the +/$/%// shift pairs onto full ASCII.
pub struct Code39Reader {
    using_check_digit: bool,
    extended_mode: bool,
}

impl Code39Reader {
    pub fn new(_options: &DecodeOptions) -> Self {
        Code39Reader { using_check_digit: false, extended_mode: false }
    }

    pub fn with_check_digit(using_check_digit: bool, extended_mode: bool) -> Self {
        Code39Reader { using_check_digit, extended_mode }
    }
}

impl RowReader for Code39Reader {
    fn formats(&self) -> FormatSet {
        FormatSet::CODE_39
    }

    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        _options: &DecodeOptions,
    ) -> Result<Reading> {
        let mut counters = [0usize; 9];
        let (asterisk_start, asterisk_end) = find_asterisk_pattern(row, &mut counters)?;

        let mut next_start = row.next_set(asterisk_end);
        let end = row.len();

        let mut result = String::new();
        let mut last_start;
        loop {
            record_pattern(row, next_start, &mut counters)?;
            let pattern = match to_narrow_wide_pattern(&counters) {
                Some(pattern) => pattern,
                None => return not_found_error(),
            };
            let decoded_char = pattern_to_char(pattern)?;
            result.push(decoded_char);

            last_start = next_start;
            next_start += counters.iter().sum::<usize>();
            // Skip the inter-character gap.
            next_start = row.next_set(next_start);

            if decoded_char == '*' {
                break;
            }
        }

        // Drop the stop asterisk.
        result.pop();

        // There must be a clear margin after the stop character.
        let last_pattern_size: usize = counters.iter().sum();
        let white_space_after_end = next_start - last_start - last_pattern_size;
        if next_start != end && white_space_after_end * 2 < last_pattern_size {
            return not_found_error();
        }

        if self.using_check_digit {
            let chars: Vec<char> = result.chars().collect();
            if chars.is_empty() {
                return not_found_error();
            }
            let max = chars.len() - 1;
            let mut total = 0;
            for &c in &chars[..max] {
                total += alphabet_index(c)?;
            }
            if chars[max] != char::from(ALPHABET[total % 43]) {
                return checksum_error("mod-43 check character mismatch");
            }
            result.truncate(result.len() - 1);
        }

        if result.is_empty() {
            // An asterisk pair with nothing between them is a false positive.
            return not_found_error();
        }

        let text = if self.extended_mode { decode_extended(&result)? } else { result };

        let left = (asterisk_start + asterisk_end) as f32 / 2.0;
        let right = last_start as f32 + last_pattern_size as f32 / 2.0;
        let y = row_number as f32;

        Ok(Reading::from_text(
            text,
            vec![Point::new(left, y), Point::new(right, y)],
            BarcodeFormat::Code39,
        ))
    }
}

fn alphabet_index(c: char) -> Result<usize> {
    match ALPHABET.iter().position(|&a| char::from(a) == c) {
        Some(index) => Ok(index),
        None => format_error("character outside the code 39 alphabet"),
    }
}

/// Finds the start asterisk, requiring a half-width quiet zone before it.
fn find_asterisk_pattern(row: &BitArray, counters: &mut [usize; 9]) -> Result<(usize, usize)> {
    let width = row.len();
    let row_offset = row.next_set(0);

    let mut counter_position = 0;
    let mut pattern_start = row_offset;
    let mut is_light = false;
    counters.fill(0);

    for i in row_offset..width {
        if row.get(i) != is_light {
            counters[counter_position] += 1;
        }
        else {
            if counter_position == 8 {
                if to_narrow_wide_pattern(counters) == Some(ASTERISK_ENCODING)
                    && row.is_range(
                        pattern_start.saturating_sub((i - pattern_start) / 2),
                        pattern_start,
                        false,
                    )?
                {
                    return Ok((pattern_start, i));
                }
                pattern_start += counters[0] + counters[1];
                counters.copy_within(2.., 0);
                counters[7] = 0;
                counters[8] = 0;
                counter_position -= 1;
            }
            else {
                counter_position += 1;
            }
            counters[counter_position] = 1;
            is_light = !is_light;
        }
    }

    not_found_error()
}

/// Classifies the nine runs as narrow or wide. Exactly three must be wide, and no single wide
/// run may dominate the wide runs' total width.
fn to_narrow_wide_pattern(counters: &[usize; 9]) -> Option<u16> {
    let mut max_narrow_counter = 0;

    loop {
        let mut min_counter = usize::MAX;
        for &counter in counters.iter() {
            if counter < min_counter && counter > max_narrow_counter {
                min_counter = counter;
            }
        }
        max_narrow_counter = min_counter;

        let mut wide_counters = 0;
        let mut total_wide_width = 0;
        let mut pattern: u16 = 0;

        for (i, &counter) in counters.iter().enumerate() {
            if counter > max_narrow_counter {
                pattern |= 1 << (8 - i);
                wide_counters += 1;
                total_wide_width += counter;
            }
        }

        if wide_counters == 3 {
            // Sanity check the wide runs against each other.
            for &counter in counters.iter() {
                if counter > max_narrow_counter && counter * 2 >= total_wide_width {
                    return None;
                }
            }
            return Some(pattern);
        }

        if wide_counters <= 3 {
            return None;
        }
    }
}

fn pattern_to_char(pattern: u16) -> Result<char> {
    for (i, &encoding) in CHARACTER_ENCODINGS.iter().enumerate() {
        if encoding == pattern {
            return Ok(char::from(ALPHABET[i]));
        }
    }
    not_found_error()
}

/// Expands the extended-mode shift pairs (+A -> a, $A -> SOH, %V -> @, /A -> !) to ASCII.
fn decode_extended(encoded: &str) -> Result<String> {
    let chars: Vec<char> = encoded.chars().collect();
    let mut decoded = String::with_capacity(chars.len());

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '+' || c == '$' || c == '%' || c == '/' {
            let next = match chars.get(i + 1) {
                Some(&next) => next,
                None => return format_error("dangling extended mode shift"),
            };

            let decoded_char = match c {
                '+' if next >= 'A' && next <= 'Z' => char::from(next as u8 + 32),
                '$' if next >= 'A' && next <= 'Z' => char::from(next as u8 - 64),
                '%' => match next {
                    'A'..='E' => char::from(next as u8 - 38),
                    'F'..='J' => char::from(next as u8 - 11),
                    'K'..='O' => char::from(next as u8 + 16),
                    'P'..='T' => char::from(next as u8 + 43),
                    'U' => '\0',
                    'V' => '@',
                    'W' => '`',
                    'X' | 'Y' | 'Z' => char::from(127),
                    _ => return format_error("invalid %-shift pair"),
                },
                '/' => match next {
                    'A'..='O' => char::from(next as u8 - 32),
                    'Z' => ':',
                    _ => return format_error("invalid /-shift pair"),
                },
                _ => return format_error("invalid extended mode shift"),
            };

            decoded.push(decoded_char);
            i += 2;
        }
        else {
            decoded.push(c);
            i += 1;
        }
    }

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::row_of_runs;

    /// Builds the run sequence of a Code 39 row from its characters (including asterisks),
    /// 2 modules per wide element, 1 per narrow, 1-module gaps.
    fn code39_runs(text: &str) -> Vec<usize> {
        let mut runs = vec![10];

        for (n, c) in text.chars().enumerate() {
            if n > 0 {
                // Inter-character gap is light; merge is avoided since chars end with a bar.
                runs.push(1);
            }
            let index = ALPHABET.iter().position(|&a| char::from(a) == c).unwrap();
            let encoding = CHARACTER_ENCODINGS[index];
            for element in 0..9 {
                let wide = encoding & (1 << (8 - element)) != 0;
                runs.push(if wide { 2 } else { 1 });
            }
        }

        runs.push(10);
        runs
    }

    fn reader() -> Code39Reader {
        Code39Reader::new(&DecodeOptions::default())
    }

    #[test]
    fn verify_decode() {
        let row = row_of_runs(&code39_runs("*HELLO-99*"), 2);
        let reading = reader().decode_row(0, &row, &DecodeOptions::default()).unwrap();

        assert_eq!(reading.text(), "HELLO-99");
        assert_eq!(reading.format, BarcodeFormat::Code39);
    }

    #[test]
    fn verify_check_digit() {
        // "CODE39" -> sum of values 12+24+13+14+3+9 = 75, 75 % 43 = 32 -> 'W'.
        let row = row_of_runs(&code39_runs("*CODE39W*"), 2);

        let mut reader = Code39Reader::with_check_digit(true, false);
        let reading = reader.decode_row(0, &row, &DecodeOptions::default()).unwrap();
        assert_eq!(reading.text(), "CODE39");

        let row = row_of_runs(&code39_runs("*CODE39X*"), 2);
        let err = reader.decode_row(0, &row, &DecodeOptions::default()).unwrap_err();
        assert!(matches!(err, stria_core::errors::Error::ChecksumError(_)));
    }

    #[test]
    fn verify_extended_mode() {
        let row = row_of_runs(&code39_runs("*+H+I/A*"), 2);

        let mut reader = Code39Reader::with_check_digit(false, true);
        let reading = reader.decode_row(0, &row, &DecodeOptions::default()).unwrap();
        assert_eq!(reading.text(), "hi!");
    }

    #[test]
    fn verify_empty_row_not_found() {
        let row = BitArray::new(100);
        assert_eq!(
            reader().decode_row(0, &row, &DecodeOptions::default()).unwrap_err(),
            stria_core::errors::Error::NotFound
        );
    }
}
