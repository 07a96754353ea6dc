// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `fields` module extracts prefixed fields from the compact card formats: `PREFIX:value`
//! terminated by a delimiter, with backslash escaping of the delimiter inside values.

/// All values of `prefix` fields in `text`, each running to the next unescaped `end` character.
/// Empty values are dropped.
pub fn match_prefixed_field(prefix: &str, text: &str, end: char, trim: bool) -> Vec<String> {
    let mut matches = Vec::new();
    let mut search_from = 0;

    while let Some(found) = text[search_from..].find(prefix) {
        let start = search_from + found + prefix.len();
        let mut i = start;

        loop {
            match text[i..].find(end) {
                None => {
                    push_value(&mut matches, &text[start..], trim);
                    i = text.len();
                    break;
                }
                Some(offset) => {
                    let end_index = i + offset;
                    if preceding_backslashes(text, end_index) % 2 != 0 {
                        // The delimiter is escaped; keep looking.
                        i = end_index + end.len_utf8();
                    }
                    else {
                        push_value(&mut matches, &text[start..end_index], trim);
                        i = end_index + end.len_utf8();
                        break;
                    }
                }
            }
        }

        search_from = i;
        if search_from >= text.len() {
            break;
        }
    }

    matches
}

/// The first value of `prefix`, if any.
pub fn match_single_prefixed_field(
    prefix: &str,
    text: &str,
    end: char,
    trim: bool,
) -> Option<String> {
    match_prefixed_field(prefix, text, end, trim).into_iter().next()
}

fn push_value(matches: &mut Vec<String>, raw: &str, trim: bool) {
    let unescaped = unescape_backslash(raw);
    let value = if trim { unescaped.trim().to_string() } else { unescaped };
    if !value.is_empty() {
        matches.push(value);
    }
}

fn preceding_backslashes(text: &str, index: usize) -> usize {
    text[..index].bytes().rev().take_while(|&b| b == b'\\').count()
}

/// Removes one level of backslash escaping.
pub fn unescape_backslash(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        }
        else {
            out.push(c);
        }
    }

    out
}

/// True when `value` is exactly `length` ASCII digits.
pub fn is_string_of_digits(value: &str, length: usize) -> bool {
    value.len() == length && value.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_simple_fields() {
        let text = "MECARD:N:Owen;TEL:555;TEL:556;;";
        assert_eq!(match_prefixed_field("TEL:", text, ';', true), vec!["555", "556"]);
        assert_eq!(
            match_single_prefixed_field("N:", text, ';', true),
            Some("Owen".to_string())
        );
        assert!(match_prefixed_field("ADR:", text, ';', true).is_empty());
    }

    #[test]
    fn verify_escaped_delimiter() {
        let text = "MECARD:NOTE:semi\\;colon;;";
        assert_eq!(
            match_single_prefixed_field("NOTE:", text, ';', false),
            Some("semi;colon".to_string())
        );
    }

    #[test]
    fn verify_digits_check() {
        assert!(is_string_of_digits("19800101", 8));
        assert!(!is_string_of_digits("1980010", 8));
        assert!(!is_string_of_digits("1980010a", 8));
    }
}
