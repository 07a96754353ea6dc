// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `upc_ean` module decodes the UPC/EAN product symbologies: EAN-13 (with UPC-A as its
//! leading-zero special case), EAN-8, and UPC-E.

use stria_core::errors::{checksum_error, format_error, not_found_error, Result};
use stria_core::format::{BarcodeFormat, FormatSet};
use stria_core::io::BitArray;
use stria_core::options::DecodeOptions;
use stria_core::reading::{Point, Reading};

use crate::row::{pattern_match_variance, record_pattern};
use crate::RowReader;

const MAX_AVG_VARIANCE: f32 = 0.48;
const MAX_INDIVIDUAL_VARIANCE: f32 = 0.7;

/// The start and end guard: bar-space-bar.
const START_END_PATTERN: [usize; 3] = [1, 1, 1];
/// The middle guard: space-bar-space-bar-space.
const MIDDLE_PATTERN: [usize; 5] = [1, 1, 1, 1, 1];
/// The UPC-E end pattern: space-bar-space-bar-space-bar.
const UPCE_END_PATTERN: [usize; 6] = [1, 1, 1, 1, 1, 1];

/// Run lengths of the left-hand (odd parity, L) digit patterns.
const L_PATTERNS: [[usize; 4]; 10] = [
    [3, 2, 1, 1],
    [2, 2, 2, 1],
    [2, 1, 2, 2],
    [1, 4, 1, 1],
    [1, 1, 3, 2],
    [1, 2, 3, 1],
    [1, 1, 1, 4],
    [1, 3, 1, 2],
    [1, 2, 1, 3],
    [3, 1, 1, 2],
];

/// L patterns followed by their reversals, the even-parity G patterns. A match at index 10 + d
/// is digit d in G parity.
const L_AND_G_PATTERNS: [[usize; 4]; 20] = [
    [3, 2, 1, 1],
    [2, 2, 2, 1],
    [2, 1, 2, 2],
    [1, 4, 1, 1],
    [1, 1, 3, 2],
    [1, 2, 3, 1],
    [1, 1, 1, 4],
    [1, 3, 1, 2],
    [1, 2, 1, 3],
    [3, 1, 1, 2],
    [1, 1, 2, 3],
    [1, 2, 2, 2],
    [2, 2, 1, 2],
    [1, 1, 4, 1],
    [2, 3, 1, 1],
    [1, 3, 2, 1],
    [4, 1, 1, 1],
    [2, 1, 3, 1],
    [3, 1, 2, 1],
    [2, 1, 1, 3],
];

/// EAN-13 parity encodings of the implicit first digit over the left six digits: a set bit means
/// G parity.
const FIRST_DIGIT_ENCODINGS: [u32; 10] =
    [0x00, 0x0b, 0x0d, 0x0e, 0x13, 0x19, 0x1c, 0x15, 0x16, 0x1a];

/// UPC-E number system and check digit parity encodings, indexed by number system then digit.
const NUMSYS_AND_CHECK_DIGIT_PATTERNS: [[u32; 10]; 2] = [
    [0x38, 0x34, 0x32, 0x31, 0x2c, 0x26, 0x23, 0x2a, 0x29, 0x25],
    [0x07, 0x0b, 0x0d, 0x0e, 0x13, 0x19, 0x1c, 0x15, 0x16, 0x1a],
];

/// One member of the UPC/EAN family.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Symbology {
    Ean13,
    Ean8,
    UpcE,
}

/// Finds a guard pattern. `white_first` skips to the next light pixel first and expects the
/// pattern to start with a light run. Returns the pattern's [start, end) pixel range.
fn find_guard_pattern(
    row: &BitArray,
    row_offset: usize,
    white_first: bool,
    pattern: &[usize],
) -> Result<(usize, usize)> {
    let width = row.len();
    let pattern_length = pattern.len();
    let mut counters = vec![0usize; pattern_length];

    let mut row_offset =
        if white_first { row.next_unset(row_offset) } else { row.next_set(row_offset) };
    let mut counter_position = 0;
    let mut pattern_start = row_offset;
    let mut is_light = white_first;

    while row_offset < width {
        if row.get(row_offset) != is_light {
            counters[counter_position] += 1;
        }
        else {
            if counter_position == pattern_length - 1 {
                if pattern_match_variance(&counters, pattern, MAX_INDIVIDUAL_VARIANCE)
                    < MAX_AVG_VARIANCE
                {
                    return Ok((pattern_start, row_offset));
                }
                pattern_start += counters[0] + counters[1];
                counters.copy_within(2.., 0);
                counters[pattern_length - 2] = 0;
                counters[pattern_length - 1] = 0;
                counter_position -= 1;
            }
            else {
                counter_position += 1;
            }
            counters[counter_position] = 1;
            is_light = !is_light;
        }
        row_offset += 1;
    }

    not_found_error()
}

/// Finds the start guard, requiring a quiet zone at least as wide as the guard before it.
fn find_start_guard_pattern(row: &BitArray) -> Result<(usize, usize)> {
    let mut next_start = 0;

    loop {
        let (start, end) = find_guard_pattern(row, next_start, false, &START_END_PATTERN)?;
        next_start = end;

        let guard_width = end - start;
        if start >= guard_width {
            let quiet_start = start - guard_width;
            if row.is_range(quiet_start, start, false)? {
                return Ok((start, end));
            }
        }
    }
}

/// Decodes one digit's four runs against `patterns`, returning the best match index.
fn decode_digit(
    row: &BitArray,
    counters: &mut [usize; 4],
    row_offset: usize,
    patterns: &[[usize; 4]],
) -> Result<usize> {
    record_pattern(row, row_offset, counters)?;

    let mut best_variance = MAX_AVG_VARIANCE;
    let mut best_match: Option<usize> = None;

    for (i, pattern) in patterns.iter().enumerate() {
        let variance = pattern_match_variance(counters, pattern, MAX_INDIVIDUAL_VARIANCE);
        if variance < best_variance {
            best_variance = variance;
            best_match = Some(i);
        }
    }

    match best_match {
        Some(digit) => Ok(digit),
        None => not_found_error(),
    }
}

/// The standard UPC/EAN mod-10 checksum over all digits including the check digit.
fn check_standard_checksum(digits: &str) -> Result<bool> {
    let bytes = digits.as_bytes();
    let length = bytes.len();
    let mut sum: u32 = 0;

    let digit_at = |i: usize| -> Result<u32> {
        let value = bytes[i].wrapping_sub(b'0');
        if value > 9 {
            return format_error("non-digit in checksum computation");
        }
        Ok(u32::from(value))
    };

    let mut i = length as isize - 2;
    while i >= 0 {
        sum += digit_at(i as usize)?;
        i -= 2;
    }
    sum *= 3;

    let mut i = length as isize - 1;
    while i >= 0 {
        sum += digit_at(i as usize)?;
        i -= 2;
    }

    Ok(sum % 10 == 0)
}

/// Expands an 8-character UPC-E string to its 12-digit UPC-A equivalent.
fn convert_upce_to_upca(upce: &str) -> String {
    let chars: Vec<char> = upce.chars().collect();
    let digits = &chars[1..7];

    let mut result = String::with_capacity(12);
    result.push(chars[0]);

    let last = digits[5];
    match last {
        '0' | '1' | '2' => {
            result.extend(&digits[0..2]);
            result.push(last);
            result.push_str("0000");
            result.extend(&digits[2..5]);
        }
        '3' => {
            result.extend(&digits[0..3]);
            result.push_str("00000");
            result.extend(&digits[3..5]);
        }
        '4' => {
            result.extend(&digits[0..4]);
            result.push_str("00000");
            result.push(digits[4]);
        }
        _ => {
            result.extend(&digits[0..5]);
            result.push_str("0000");
            result.push(last);
        }
    }

    result.push(chars[7]);
    result
}

/// Decodes the digit region between the guards. Returns the text and the offset past the last
/// digit.
fn decode_middle(
    symbology: Symbology,
    row: &BitArray,
    start_guard_end: usize,
) -> Result<(String, usize)> {
    let mut counters = [0usize; 4];
    let mut result = String::new();
    let mut row_offset = start_guard_end;

    match symbology {
        Symbology::Ean13 => {
            let mut lg_pattern_found: u32 = 0;

            for x in 0..6 {
                let best = decode_digit(row, &mut counters, row_offset, &L_AND_G_PATTERNS)?;
                result.push(char::from(b'0' + (best % 10) as u8));
                row_offset += counters.iter().sum::<usize>();
                if best >= 10 {
                    lg_pattern_found |= 1 << (5 - x);
                }
            }

            let first = determine_first_digit(lg_pattern_found)?;
            result.insert(0, char::from(b'0' + first as u8));

            let (_, middle_end) =
                find_guard_pattern(row, row_offset, true, &MIDDLE_PATTERN)?;
            row_offset = middle_end;

            for _ in 0..6 {
                let best = decode_digit(row, &mut counters, row_offset, &L_PATTERNS)?;
                result.push(char::from(b'0' + best as u8));
                row_offset += counters.iter().sum::<usize>();
            }
        }
        Symbology::Ean8 => {
            for _ in 0..4 {
                let best = decode_digit(row, &mut counters, row_offset, &L_PATTERNS)?;
                result.push(char::from(b'0' + best as u8));
                row_offset += counters.iter().sum::<usize>();
            }

            let (_, middle_end) =
                find_guard_pattern(row, row_offset, true, &MIDDLE_PATTERN)?;
            row_offset = middle_end;

            for _ in 0..4 {
                let best = decode_digit(row, &mut counters, row_offset, &L_PATTERNS)?;
                result.push(char::from(b'0' + best as u8));
                row_offset += counters.iter().sum::<usize>();
            }
        }
        Symbology::UpcE => {
            let mut lg_pattern_found: u32 = 0;

            for x in 0..6 {
                let best = decode_digit(row, &mut counters, row_offset, &L_AND_G_PATTERNS)?;
                result.push(char::from(b'0' + (best % 10) as u8));
                row_offset += counters.iter().sum::<usize>();
                if best >= 10 {
                    lg_pattern_found |= 1 << (5 - x);
                }
            }

            determine_num_sys_and_check_digit(&mut result, lg_pattern_found)?;
        }
    }

    Ok((result, row_offset))
}

fn determine_first_digit(lg_pattern_found: u32) -> Result<usize> {
    for (digit, &encoding) in FIRST_DIGIT_ENCODINGS.iter().enumerate() {
        if lg_pattern_found == encoding {
            return Ok(digit);
        }
    }
    not_found_error()
}

fn determine_num_sys_and_check_digit(result: &mut String, lg_pattern_found: u32) -> Result<()> {
    for (num_sys, patterns) in NUMSYS_AND_CHECK_DIGIT_PATTERNS.iter().enumerate() {
        for (digit, &encoding) in patterns.iter().enumerate() {
            if lg_pattern_found == encoding {
                result.insert(0, char::from(b'0' + num_sys as u8));
                result.push(char::from(b'0' + digit as u8));
                return Ok(());
            }
        }
    }
    not_found_error()
}

fn decode_end(symbology: Symbology, row: &BitArray, end_start: usize) -> Result<(usize, usize)> {
    match symbology {
        Symbology::UpcE => find_guard_pattern(row, end_start, true, &UPCE_END_PATTERN),
        _ => find_guard_pattern(row, end_start, false, &START_END_PATTERN),
    }
}

fn check_checksum(symbology: Symbology, text: &str) -> Result<bool> {
    match symbology {
        Symbology::UpcE => check_standard_checksum(&convert_upce_to_upca(text)),
        _ => check_standard_checksum(text),
    }
}

fn decode_one(
    symbology: Symbology,
    row_number: usize,
    row: &BitArray,
    start_guard: (usize, usize),
) -> Result<Reading> {
    let (text, row_offset) = decode_middle(symbology, row, start_guard.1)?;
    let end_range = decode_end(symbology, row, row_offset)?;

    // The quiet zone after the symbol must be at least as wide as the end guard.
    let end = end_range.1;
    let quiet_end = end + (end - end_range.0);
    if quiet_end > row.len() || !row.is_range(end, quiet_end, false)? {
        return not_found_error();
    }

    let expected_length = match symbology {
        Symbology::Ean13 => 13,
        Symbology::Ean8 | Symbology::UpcE => 8,
    };
    if text.len() != expected_length {
        return format_error("wrong digit count for symbology");
    }

    if !check_checksum(symbology, &text)? {
        return checksum_error("check digit mismatch");
    }

    let format = match symbology {
        Symbology::Ean13 => BarcodeFormat::Ean13,
        Symbology::Ean8 => BarcodeFormat::Ean8,
        Symbology::UpcE => BarcodeFormat::UpcE,
    };

    let left = (start_guard.0 + start_guard.1) as f32 / 2.0;
    let right = (end_range.0 + end_range.1) as f32 / 2.0;
    let y = row_number as f32;

    Ok(Reading::from_text(
        text,
        vec![Point::new(left, y), Point::new(right, y)],
        format,
    ))
}

/// The UPC/EAN family reader. Tries EAN-13 (re-tagging UPC-A), EAN-8, and UPC-E against each
/// row, honoring the possible-formats restriction.
pub struct UpcEanReader;

impl UpcEanReader {
    pub fn new(_options: &DecodeOptions) -> Self {
        UpcEanReader
    }

    pub const FORMATS: FormatSet = FormatSet::UPC_A
        .union(FormatSet::UPC_E)
        .union(FormatSet::EAN_8)
        .union(FormatSet::EAN_13);
}

impl RowReader for UpcEanReader {
    fn formats(&self) -> FormatSet {
        Self::FORMATS
    }

    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        options: &DecodeOptions,
    ) -> Result<Reading> {
        let allowed = options.formats.unwrap_or(FormatSet::all());
        let start_guard = find_start_guard_pattern(row)?;

        if allowed.intersects(FormatSet::EAN_13.union(FormatSet::UPC_A)) {
            match decode_one(Symbology::Ean13, row_number, row, start_guard) {
                Ok(mut reading) => {
                    // A UPC-A symbol is an EAN-13 with number system 0; prefer the UPC-A
                    // identity when the caller admits it.
                    let is_upca = reading.text().starts_with('0');
                    if is_upca && allowed.contains(FormatSet::UPC_A) {
                        reading.text = reading.text.map(|t| t[1..].to_string());
                        reading.format = BarcodeFormat::UpcA;
                        return Ok(reading);
                    }
                    if allowed.contains(FormatSet::EAN_13) {
                        return Ok(reading);
                    }
                }
                Err(err @ stria_core::errors::Error::ChecksumError(_)) => return Err(err),
                Err(_) => (),
            }
        }

        if allowed.contains(FormatSet::EAN_8) {
            match decode_one(Symbology::Ean8, row_number, row, start_guard) {
                Ok(reading) => return Ok(reading),
                Err(err @ stria_core::errors::Error::ChecksumError(_)) => return Err(err),
                Err(_) => (),
            }
        }

        if allowed.contains(FormatSet::UPC_E) {
            match decode_one(Symbology::UpcE, row_number, row, start_guard) {
                Ok(reading) => return Ok(reading),
                Err(err @ stria_core::errors::Error::ChecksumError(_)) => return Err(err),
                Err(_) => (),
            }
        }

        not_found_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::row_of_runs;

    /// Builds the run-length sequence of an EAN-13 row, starting with a light quiet zone.
    fn ean13_runs(digits: &str) -> Vec<usize> {
        let d: Vec<usize> =
            digits.bytes().map(|b| usize::from(b - b'0')).collect();
        assert_eq!(d.len(), 13);

        let mut runs = vec![10]; // quiet zone
        runs.extend_from_slice(&START_END_PATTERN);

        let parities = FIRST_DIGIT_ENCODINGS[d[0]];
        for (i, &digit) in d[1..7].iter().enumerate() {
            let l = L_PATTERNS[digit];
            if parities & (1 << (5 - i)) != 0 {
                // G parity: reversed runs.
                runs.extend(l.iter().rev());
            }
            else {
                runs.extend_from_slice(&l);
            }
        }

        runs.extend_from_slice(&MIDDLE_PATTERN);

        for &digit in &d[7..13] {
            runs.extend_from_slice(&L_PATTERNS[digit]);
        }

        runs.extend_from_slice(&START_END_PATTERN);
        runs.push(10); // quiet zone
        runs
    }

    fn decode_runs(runs: &[usize]) -> Result<Reading> {
        let row = row_of_runs(runs, 2);
        UpcEanReader::new(&DecodeOptions::default()).decode_row(
            0,
            &row,
            &DecodeOptions::default(),
        )
    }

    #[test]
    fn verify_ean13() {
        let options = DecodeOptions {
            formats: Some(FormatSet::EAN_13),
            ..DecodeOptions::default()
        };
        let row = row_of_runs(&ean13_runs("5901234123457"), 2);
        let reading = UpcEanReader::new(&options).decode_row(0, &row, &options).unwrap();

        assert_eq!(reading.text(), "5901234123457");
        assert_eq!(reading.format, BarcodeFormat::Ean13);
        assert_eq!(reading.points.len(), 2);
    }

    #[test]
    fn verify_upca_re_tag() {
        // EAN-13 starting with 0 decodes as UPC-A when UPC-A is admissible.
        let reading = decode_runs(&ean13_runs("0036000291452")).unwrap();
        assert_eq!(reading.format, BarcodeFormat::UpcA);
        assert_eq!(reading.text(), "036000291452");
    }

    #[test]
    fn verify_checksum_failure() {
        // Same digits with a corrupted check digit.
        let err = decode_runs(&ean13_runs("5901234123450")).unwrap_err();
        assert!(matches!(err, stria_core::errors::Error::ChecksumError(_)));
    }

    #[test]
    fn verify_blank_row_not_found() {
        let row = BitArray::new(200);
        let err = UpcEanReader::new(&DecodeOptions::default())
            .decode_row(0, &row, &DecodeOptions::default())
            .unwrap_err();
        assert_eq!(err, stria_core::errors::Error::NotFound);
    }

    #[test]
    fn verify_upce_conversion() {
        assert_eq!(convert_upce_to_upca("01245714"), "012100004574");
        assert_eq!(convert_upce_to_upca("04252614"), "042100005264");
    }

    #[test]
    fn verify_standard_checksum() {
        assert!(check_standard_checksum("5901234123457").unwrap());
        assert!(!check_standard_checksum("5901234123456").unwrap());
        assert!(check_standard_checksum("036000291452").unwrap());
    }
}
