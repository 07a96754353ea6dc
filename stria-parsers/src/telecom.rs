// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `telecom` module recognizes telephony payloads: `tel:` URIs and bare E.164 numbers,
//! `sms:`/`SMSTO:` messages, and `mailto:`/`MATMSG:` email payloads.

use crate::fields::match_single_prefixed_field;
use crate::{Email, Sms, Tel};

/// `tel:` and `TEL:` URIs, or a bare number in E.164-ish shape.
pub fn parse_tel(text: &str) -> Option<Tel> {
    if text.len() >= 4 && text[..4].eq_ignore_ascii_case("tel:") {
        let rest = &text[4..];
        let number = rest.split('?').next().unwrap_or(rest);
        if number.is_empty() {
            return None;
        }
        return Some(Tel {
            number: number.to_string(),
            tel_uri: Some(format!("tel:{}", rest)),
        });
    }

    // A bare international number: +, then at least 7 digits with optional separators.
    if let Some(digits) = text.strip_prefix('+') {
        let mut digit_count = 0;
        for c in digits.chars() {
            if c.is_ascii_digit() {
                digit_count += 1;
            }
            else if !matches!(c, ' ' | '-' | '.') {
                return None;
            }
        }
        if digit_count >= 7 {
            return Some(Tel { number: text.to_string(), tel_uri: None });
        }
    }

    None
}

/// `sms:number[,number...][?query]` and `SMSTO:number[:body]`.
pub fn parse_sms(text: &str) -> Option<Sms> {
    if text.len() >= 6 && text[..6].eq_ignore_ascii_case("smsto:") {
        let rest = &text[6..];
        let (number, body) = match rest.split_once(':') {
            Some((number, body)) => (number, Some(body.to_string())),
            None => (rest, None),
        };
        if number.is_empty() {
            return None;
        }
        return Some(Sms { numbers: vec![number.to_string()], subject: None, body });
    }

    if text.len() >= 4 && text[..4].eq_ignore_ascii_case("sms:") {
        let rest = &text[4..];
        let (numbers_part, query) = match rest.split_once('?') {
            Some((numbers, query)) => (numbers, Some(query)),
            None => (rest, None),
        };

        let numbers: Vec<String> = numbers_part
            .split(',')
            .filter(|n| !n.is_empty())
            .map(|n| n.to_string())
            .collect();
        if numbers.is_empty() {
            return None;
        }

        let mut subject = None;
        let mut body = None;
        if let Some(query) = query {
            for pair in query.split('&') {
                match pair.split_once('=') {
                    Some(("subject", value)) => subject = Some(value.to_string()),
                    Some(("body", value)) => body = Some(value.to_string()),
                    _ => (),
                }
            }
        }

        return Some(Sms { numbers, subject, body });
    }

    None
}

/// `mailto:` URIs and the DoCoMo `MATMSG:` mail format.
pub fn parse_email(text: &str) -> Option<Email> {
    if text.starts_with("MATMSG:") {
        let to = match_single_prefixed_field("TO:", text, ';', true)?;
        let subject = match_single_prefixed_field("SUB:", text, ';', false);
        let body = match_single_prefixed_field("BODY:", text, ';', false);
        return Some(Email { to: Some(to), subject, body });
    }

    if text.len() >= 7 && text[..7].eq_ignore_ascii_case("mailto:") {
        let rest = &text[7..];
        let (to, query) = match rest.split_once('?') {
            Some((to, query)) => (to, Some(query)),
            None => (rest, None),
        };

        let mut subject = None;
        let mut body = None;
        if let Some(query) = query {
            for pair in query.split('&') {
                match pair.split_once('=') {
                    Some(("subject", value)) => subject = Some(value.to_string()),
                    Some(("body", value)) => body = Some(value.to_string()),
                    _ => (),
                }
            }
        }

        let to = if to.is_empty() { None } else { Some(to.to_string()) };
        return Some(Email { to, subject, body });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_tel() {
        let tel = parse_tel("tel:+12125551212").unwrap();
        assert_eq!(tel.number, "+12125551212");
        assert_eq!(tel.tel_uri.as_deref(), Some("tel:+12125551212"));

        let tel = parse_tel("+1 212 555 1212").unwrap();
        assert_eq!(tel.number, "+1 212 555 1212");
        assert!(tel.tel_uri.is_none());

        assert!(parse_tel("+12x4").is_none());
        assert!(parse_tel("12125551212").is_none());
    }

    #[test]
    fn verify_sms() {
        let sms = parse_sms("SMSTO:5551212:See you at 6").unwrap();
        assert_eq!(sms.numbers, vec!["5551212"]);
        assert_eq!(sms.body.as_deref(), Some("See you at 6"));

        let sms = parse_sms("sms:5551212,5551313?body=hi&subject=yo").unwrap();
        assert_eq!(sms.numbers, vec!["5551212", "5551313"]);
        assert_eq!(sms.body.as_deref(), Some("hi"));
        assert_eq!(sms.subject.as_deref(), Some("yo"));
    }

    #[test]
    fn verify_email() {
        let email = parse_email("mailto:sean@example.com?subject=Hi").unwrap();
        assert_eq!(email.to.as_deref(), Some("sean@example.com"));
        assert_eq!(email.subject.as_deref(), Some("Hi"));

        let email = parse_email("MATMSG:TO:sean@example.com;SUB:Hi;BODY:Text;;").unwrap();
        assert_eq!(email.to.as_deref(), Some("sean@example.com"));
        assert_eq!(email.subject.as_deref(), Some("Hi"));
        assert_eq!(email.body.as_deref(), Some("Text"));
    }
}
