// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `code128` module decodes Code 128: 11-module symbols of six elements, three code sets
//! with shift and switch codes, and a mod-103 check symbol.

use stria_core::errors::{checksum_error, format_error, not_found_error, Result};
use stria_core::format::{BarcodeFormat, FormatSet};
use stria_core::io::BitArray;
use stria_core::options::DecodeOptions;
use stria_core::reading::{Point, Reading};

use crate::row::{pattern_match_variance, record_pattern};
use crate::RowReader;

const MAX_AVG_VARIANCE: f32 = 0.25;
const MAX_INDIVIDUAL_VARIANCE: f32 = 0.7;

const CODE_SHIFT: u32 = 98;
const CODE_CODE_C: u32 = 99;
const CODE_CODE_B: u32 = 100;
const CODE_CODE_A: u32 = 101;
const CODE_FNC_1: u32 = 102;
const CODE_FNC_2: u32 = 97;
const CODE_FNC_3: u32 = 96;
const CODE_FNC_4_A: u32 = 101;
const CODE_FNC_4_B: u32 = 100;

const CODE_START_A: u32 = 103;
const CODE_START_B: u32 = 104;
const CODE_START_C: u32 = 105;
const CODE_STOP: u32 = 106;

/// Element widths of every code word, bar first. The stop code carries a seventh element, its
/// terminating bar; matching ignores it and the decoder consumes it separately.
pub(crate) const CODE_PATTERNS: [&[usize]; 107] = [
    &[2, 1, 2, 2, 2, 2],
    &[2, 2, 2, 1, 2, 2],
    &[2, 2, 2, 2, 2, 1],
    &[1, 2, 1, 2, 2, 3],
    &[1, 2, 1, 3, 2, 2],
    &[1, 3, 1, 2, 2, 2],
    &[1, 2, 2, 2, 1, 3],
    &[1, 2, 2, 3, 1, 2],
    &[1, 3, 2, 2, 1, 2],
    &[2, 2, 1, 2, 1, 3],
    &[2, 2, 1, 3, 1, 2],
    &[2, 3, 1, 2, 1, 2],
    &[1, 1, 2, 2, 3, 2],
    &[1, 2, 2, 1, 3, 2],
    &[1, 2, 2, 2, 3, 1],
    &[1, 1, 3, 2, 2, 2],
    &[1, 2, 3, 1, 2, 2],
    &[1, 2, 3, 2, 2, 1],
    &[2, 2, 3, 2, 1, 1],
    &[2, 2, 1, 1, 3, 2],
    &[2, 2, 1, 2, 3, 1],
    &[2, 1, 3, 2, 1, 2],
    &[2, 2, 3, 1, 1, 2],
    &[3, 1, 2, 1, 3, 1],
    &[3, 1, 1, 2, 2, 2],
    &[3, 2, 1, 1, 2, 2],
    &[3, 2, 1, 2, 2, 1],
    &[3, 1, 2, 2, 1, 2],
    &[3, 2, 2, 1, 1, 2],
    &[3, 2, 2, 2, 1, 1],
    &[2, 1, 2, 1, 2, 3],
    &[2, 1, 2, 3, 2, 1],
    &[2, 3, 2, 1, 2, 1],
    &[1, 1, 1, 3, 2, 3],
    &[1, 3, 1, 1, 2, 3],
    &[1, 3, 1, 3, 2, 1],
    &[1, 1, 2, 3, 1, 3],
    &[1, 3, 2, 1, 1, 3],
    &[1, 3, 2, 3, 1, 1],
    &[2, 1, 1, 3, 1, 3],
    &[2, 3, 1, 1, 1, 3],
    &[2, 3, 1, 3, 1, 1],
    &[1, 1, 2, 1, 3, 3],
    &[1, 1, 2, 3, 3, 1],
    &[1, 3, 2, 1, 3, 1],
    &[1, 1, 3, 1, 2, 3],
    &[1, 1, 3, 3, 2, 1],
    &[1, 3, 3, 1, 2, 1],
    &[3, 1, 3, 1, 2, 1],
    &[2, 1, 1, 3, 3, 1],
    &[2, 3, 1, 1, 3, 1],
    &[2, 1, 3, 1, 1, 3],
    &[2, 1, 3, 3, 1, 1],
    &[2, 1, 3, 1, 3, 1],
    &[3, 1, 1, 1, 2, 3],
    &[3, 1, 1, 3, 2, 1],
    &[3, 3, 1, 1, 2, 1],
    &[3, 1, 2, 1, 1, 3],
    &[3, 1, 2, 3, 1, 1],
    &[3, 3, 2, 1, 1, 1],
    &[3, 1, 4, 1, 1, 1],
    &[2, 2, 1, 4, 1, 1],
    &[4, 3, 1, 1, 1, 1],
    &[1, 1, 1, 2, 2, 4],
    &[1, 1, 1, 4, 2, 2],
    &[1, 2, 1, 1, 2, 4],
    &[1, 2, 1, 4, 2, 1],
    &[1, 4, 1, 1, 2, 2],
    &[1, 4, 1, 2, 2, 1],
    &[1, 1, 2, 2, 1, 4],
    &[1, 1, 2, 4, 1, 2],
    &[1, 2, 2, 1, 1, 4],
    &[1, 2, 2, 4, 1, 1],
    &[1, 4, 2, 1, 1, 2],
    &[1, 4, 2, 2, 1, 1],
    &[2, 4, 1, 2, 1, 1],
    &[2, 2, 1, 1, 1, 4],
    &[4, 1, 3, 1, 1, 1],
    &[2, 4, 1, 1, 1, 2],
    &[1, 3, 4, 1, 1, 1],
    &[1, 1, 1, 2, 4, 2],
    &[1, 2, 1, 1, 4, 2],
    &[1, 2, 1, 2, 4, 1],
    &[1, 1, 4, 2, 1, 2],
    &[1, 2, 4, 1, 1, 2],
    &[1, 2, 4, 2, 1, 1],
    &[4, 1, 1, 2, 1, 2],
    &[4, 2, 1, 1, 1, 2],
    &[4, 2, 1, 2, 1, 1],
    &[2, 1, 2, 1, 4, 1],
    &[2, 1, 4, 1, 2, 1],
    &[4, 1, 2, 1, 2, 1],
    &[1, 1, 1, 1, 4, 3],
    &[1, 1, 1, 3, 4, 1],
    &[1, 3, 1, 1, 4, 1],
    &[1, 1, 4, 1, 1, 3],
    &[1, 1, 4, 3, 1, 1],
    &[4, 1, 1, 1, 1, 3],
    &[4, 1, 1, 3, 1, 1],
    &[1, 1, 3, 1, 4, 1],
    &[1, 1, 4, 1, 3, 1],
    &[3, 1, 1, 1, 4, 1],
    &[4, 1, 1, 1, 3, 1],
    &[2, 1, 1, 4, 1, 2],
    &[2, 1, 1, 2, 1, 4],
    &[2, 1, 1, 2, 3, 2],
    &[2, 3, 3, 1, 1, 1, 2],
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum CodeSet {
    A,
    B,
    C,
}

/// A Code 128 reader.
pub struct Code128Reader;

impl Code128Reader {
    pub fn new(_options: &DecodeOptions) -> Self {
        Code128Reader
    }
}

/// Finds a start code (103..=105), requiring a half-width quiet zone before it. Returns
/// (start, end, code).
fn find_start_pattern(row: &BitArray) -> Result<(usize, usize, u32)> {
    let width = row.len();
    let row_offset = row.next_set(0);

    let mut counters = [0usize; 6];
    let mut counter_position = 0;
    let mut pattern_start = row_offset;
    let mut is_light = false;

    for i in row_offset..width {
        if row.get(i) != is_light {
            counters[counter_position] += 1;
        }
        else {
            if counter_position == 5 {
                let mut best_variance = MAX_AVG_VARIANCE;
                let mut best_match: Option<u32> = None;

                for start_code in CODE_START_A..=CODE_START_C {
                    let variance = pattern_match_variance(
                        &counters,
                        CODE_PATTERNS[start_code as usize],
                        MAX_INDIVIDUAL_VARIANCE,
                    );
                    if variance < best_variance {
                        best_variance = variance;
                        best_match = Some(start_code);
                    }
                }

                if let Some(code) = best_match {
                    // Quiet zone of at least half the start pattern width.
                    let quiet_start = pattern_start.saturating_sub((i - pattern_start) / 2);
                    if row.is_range(quiet_start, pattern_start, false)? {
                        return Ok((pattern_start, i, code));
                    }
                }

                pattern_start += counters[0] + counters[1];
                counters.copy_within(2.., 0);
                counters[4] = 0;
                counters[5] = 0;
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

/// Decodes the six runs at `row_offset` to a code word.
fn decode_code(row: &BitArray, counters: &mut [usize; 6], row_offset: usize) -> Result<u32> {
    record_pattern(row, row_offset, counters)?;

    let mut best_variance = MAX_AVG_VARIANCE;
    let mut best_match: Option<u32> = None;

    for (code, pattern) in CODE_PATTERNS.iter().enumerate() {
        let variance = pattern_match_variance(counters, pattern, MAX_INDIVIDUAL_VARIANCE);
        if variance < best_variance {
            best_variance = variance;
            best_match = Some(code as u32);
        }
    }

    match best_match {
        Some(code) => Ok(code),
        None => not_found_error(),
    }
}

impl RowReader for Code128Reader {
    fn formats(&self) -> FormatSet {
        FormatSet::CODE_128
    }

    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        _options: &DecodeOptions,
    ) -> Result<Reading> {
        let (pattern_start, pattern_end, start_code) = find_start_pattern(row)?;

        let mut code_set = match start_code {
            CODE_START_A => CodeSet::A,
            CODE_START_B => CodeSet::B,
            CODE_START_C => CodeSet::C,
            _ => return format_error("invalid start code"),
        };

        let mut result = String::new();
        let mut counters = [0usize; 6];

        let mut last_start = pattern_start;
        let mut next_start = pattern_end;

        let mut checksum_total = start_code;
        let mut multiplier = 0;
        let mut last_character_was_printable = true;
        let mut is_next_shifted = false;
        let mut code = start_code;
        let mut done = false;

        while !done {
            let unshift = is_next_shifted;
            is_next_shifted = false;

            let last_code = code;
            code = decode_code(row, &mut counters, next_start)?;

            if code != CODE_STOP {
                last_character_was_printable = true;
                multiplier += 1;
                checksum_total += multiplier * code;
            }

            last_start = next_start;
            next_start += counters.iter().sum::<usize>();

            // A start code mid-stream is structurally impossible.
            if code == CODE_START_A || code == CODE_START_B || code == CODE_START_C {
                return format_error("start code inside symbol");
            }

            match code_set {
                CodeSet::A => {
                    if code < 64 {
                        result.push(char::from(b' ' + code as u8));
                    }
                    else if code < 96 {
                        result.push(char::from(code as u8 - 64));
                    }
                    else {
                        if code != CODE_STOP {
                            last_character_was_printable = false;
                        }
                        match code {
                            CODE_FNC_1 | CODE_FNC_2 | CODE_FNC_3 | CODE_FNC_4_A => (),
                            CODE_SHIFT => {
                                is_next_shifted = true;
                                code_set = CodeSet::B;
                            }
                            CODE_CODE_B => code_set = CodeSet::B,
                            CODE_CODE_C => code_set = CodeSet::C,
                            CODE_STOP => done = true,
                            _ => return format_error("invalid code in set A"),
                        }
                    }
                }
                CodeSet::B => {
                    if code < 96 {
                        result.push(char::from(b' ' + code as u8));
                    }
                    else {
                        if code != CODE_STOP {
                            last_character_was_printable = false;
                        }
                        match code {
                            CODE_FNC_1 | CODE_FNC_2 | CODE_FNC_3 | CODE_FNC_4_B => (),
                            CODE_SHIFT => {
                                is_next_shifted = true;
                                code_set = CodeSet::A;
                            }
                            CODE_CODE_A => code_set = CodeSet::A,
                            CODE_CODE_C => code_set = CodeSet::C,
                            CODE_STOP => done = true,
                            _ => return format_error("invalid code in set B"),
                        }
                    }
                }
                CodeSet::C => {
                    if code < 100 {
                        if code < 10 {
                            result.push('0');
                        }
                        result.push_str(&code.to_string());
                    }
                    else {
                        if code != CODE_STOP {
                            last_character_was_printable = false;
                        }
                        match code {
                            CODE_FNC_1 => (),
                            CODE_CODE_A => code_set = CodeSet::A,
                            CODE_CODE_B => code_set = CodeSet::B,
                            CODE_STOP => done = true,
                            _ => return format_error("invalid code in set C"),
                        }
                    }
                }
            }

            if unshift {
                code_set = if code_set == CodeSet::A { CodeSet::B } else { CodeSet::A };
            }

            if done {
                // The check symbol is the one before the stop code.
                checksum_total -= multiplier * last_code;
                if checksum_total % 103 != last_code {
                    return checksum_error("mod-103 check symbol mismatch");
                }
            }
        }

        // The stop pattern has a seventh element, its closing bar; consume it before checking
        // for the trailing quiet zone.
        let next_start = row.next_unset(next_start);
        let quiet_end = (next_start + (next_start - last_start) / 2).min(row.len());
        if !row.is_range(next_start, quiet_end, false)? {
            return not_found_error();
        }

        let result_length = result.len();
        if result_length == 0 {
            return not_found_error();
        }

        // Drop the check characters, unless they decoded as control codes.
        if last_character_was_printable {
            if code_set == CodeSet::C {
                result.truncate(result_length - 2);
            }
            else {
                result.truncate(result_length - 1);
            }
        }

        let left = (pattern_start + pattern_end) as f32 / 2.0;
        let right = last_start as f32 + (next_start - last_start) as f32 / 2.0;
        let y = row_number as f32;

        Ok(Reading::from_text(
            result,
            vec![Point::new(left, y), Point::new(right, y)],
            BarcodeFormat::Code128,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::row_of_runs;

    fn code128_runs(codes: &[u32]) -> Vec<usize> {
        let mut runs = vec![10];
        for &code in codes {
            runs.extend_from_slice(CODE_PATTERNS[code as usize]);
        }
        runs.push(10);
        runs
    }

    fn decode(codes: &[u32]) -> Result<Reading> {
        let row = row_of_runs(&code128_runs(codes), 2);
        Code128Reader::new(&DecodeOptions::default()).decode_row(
            0,
            &row,
            &DecodeOptions::default(),
        )
    }

    #[test]
    fn verify_code_b_text() {
        // "HI": start B (104), H (40), I (41), check (104 + 40 + 82) % 103 = 20, stop.
        let reading = decode(&[CODE_START_B, 40, 41, 20, CODE_STOP]).unwrap();
        assert_eq!(reading.text(), "HI");
        assert_eq!(reading.format, BarcodeFormat::Code128);
    }

    #[test]
    fn verify_code_c_digits() {
        // "123456": start C (105), 12, 34, 56, check, stop.
        let check = (105 + 1 * 12 + 2 * 34 + 3 * 56) % 103;
        let reading = decode(&[CODE_START_C, 12, 34, 56, check, CODE_STOP]).unwrap();
        assert_eq!(reading.text(), "123456");
    }

    #[test]
    fn verify_code_set_switch() {
        // Start C, digits 10, switch to B, "k" (75), check, stop.
        let check = (105 + 1 * 10 + 2 * CODE_CODE_B + 3 * 75) % 103;
        let reading = decode(&[CODE_START_C, 10, CODE_CODE_B, 75, check, CODE_STOP]).unwrap();
        assert_eq!(reading.text(), "10k");
    }

    #[test]
    fn verify_shift() {
        // Start A, "A" (33), shift, "a" (65 in set B), "B" (34), check, stop.
        let check =
            (103 + 1 * 33 + 2 * CODE_SHIFT + 3 * 65 + 4 * 34) % 103;
        let reading =
            decode(&[CODE_START_A, 33, CODE_SHIFT, 65, 34, check, CODE_STOP]).unwrap();
        assert_eq!(reading.text(), "AaB");
    }

    #[test]
    fn verify_checksum_failure() {
        let bad_check = (105 + 1 * 12 + 2 * 34 + 3 * 56 + 1) % 103;
        let err = decode(&[CODE_START_C, 12, 34, 56, bad_check, CODE_STOP]).unwrap_err();
        assert!(matches!(err, stria_core::errors::Error::ChecksumError(_)));
    }
}
