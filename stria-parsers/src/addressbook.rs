// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `addressbook` module recognizes the contact-card payloads: MECARD, the AU carrier
//! format, BIZCARD, and vCard.

use crate::fields::{
    is_string_of_digits, match_prefixed_field, match_single_prefixed_field, unescape_backslash,
};
use crate::AddressBook;

/// DoCoMo MECARD: `MECARD:N:name;TEL:...;;`.
pub fn parse_mecard(text: &str) -> Option<AddressBook> {
    if !text.starts_with("MECARD:") {
        return None;
    }

    let raw_names = match_prefixed_field("N:", text, ';', true);
    let raw_name = raw_names.first()?;
    let name = parse_name(raw_name);

    let pronunciation = match_single_prefixed_field("SOUND:", text, ';', true);
    let phone_numbers = match_prefixed_field("TEL:", text, ';', true);
    let emails = match_prefixed_field("EMAIL:", text, ';', true);
    let note = match_single_prefixed_field("NOTE:", text, ';', false);
    let addresses = match_prefixed_field("ADR:", text, ';', true);
    let birthday = match_single_prefixed_field("BDAY:", text, ';', true)
        .filter(|b| is_string_of_digits(b, 8));
    let urls = match_prefixed_field("URL:", text, ';', true);
    let org = match_single_prefixed_field("ORG:", text, ';', true);

    Some(AddressBook {
        names: vec![name],
        pronunciation,
        phone_numbers,
        emails,
        note,
        addresses,
        org,
        birthday,
        title: None,
        urls,
    })
}

/// A DoCoMo name may be `last,first`; reorder it for display.
fn parse_name(name: &str) -> String {
    match name.find(',') {
        Some(comma) => format!("{} {}", &name[comma + 1..], &name[..comma]),
        None => name.to_string(),
    }
}

/// The AU carrier format: `NAME1:`/`TEL1:`/`MAIL1:`/`MEMORY:`/`ADD:` fields, one per line.
pub fn parse_addressbook_au(text: &str) -> Option<AddressBook> {
    // MEMORY is the format's signature field.
    if !text.contains("MEMORY") || !text.contains("\r\n") {
        return None;
    }

    let name = match_single_prefixed_field("NAME1:", text, '\r', true)?;
    let pronunciation = match_single_prefixed_field("NAME2:", text, '\r', true);

    let phone_numbers = match_multiple_numbered("TEL", 3, text);
    let emails = match_multiple_numbered("MAIL", 3, text);
    let note = match_single_prefixed_field("MEMORY:", text, '\r', false);
    let addresses = match_prefixed_field("ADD:", text, '\r', true);

    Some(AddressBook {
        names: vec![name],
        pronunciation,
        phone_numbers,
        emails,
        note,
        addresses,
        org: None,
        birthday: None,
        title: None,
        urls: Vec::new(),
    })
}

fn match_multiple_numbered(prefix: &str, max: usize, text: &str) -> Vec<String> {
    let mut values = Vec::new();
    for i in 1..=max {
        if let Some(value) =
            match_single_prefixed_field(&format!("{}{}:", prefix, i), text, '\r', true)
        {
            values.push(value);
        }
    }
    values
}

/// BIZCARD: `BIZCARD:N:first;X:last;T:title;C:company;A:address;B:phone;;`.
pub fn parse_bizcard(text: &str) -> Option<AddressBook> {
    if !text.starts_with("BIZCARD:") {
        return None;
    }

    let first_name = match_single_prefixed_field("N:", text, ';', true);
    let last_name = match_single_prefixed_field("X:", text, ';', true);
    let full_name = build_name(first_name.as_deref(), last_name.as_deref())?;

    let title = match_single_prefixed_field("T:", text, ';', true);
    let org = match_single_prefixed_field("C:", text, ';', true);
    let addresses = match_prefixed_field("A:", text, ';', true);

    let mut phone_numbers = Vec::new();
    for prefix in ["B:", "M:", "F:"] {
        if let Some(number) = match_single_prefixed_field(prefix, text, ';', true) {
            phone_numbers.push(number);
        }
    }
    let emails = match_prefixed_field("E:", text, ';', true);

    Some(AddressBook {
        names: vec![full_name],
        pronunciation: None,
        phone_numbers,
        emails,
        note: None,
        addresses,
        org,
        birthday: None,
        title,
        urls: Vec::new(),
    })
}

fn build_name(first: Option<&str>, last: Option<&str>) -> Option<String> {
    match (first, last) {
        (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
        (Some(first), None) => Some(first.to_string()),
        (None, Some(last)) => Some(last.to_string()),
        (None, None) => None,
    }
}

/// vCard 2.1/3.0, reduced to the fields a contact card in a barcode actually carries.
pub fn parse_vcard(text: &str) -> Option<AddressBook> {
    if !text.starts_with("BEGIN:VCARD") {
        return None;
    }

    let mut names = Vec::new();
    let mut formatted_name = None;
    let mut phone_numbers = Vec::new();
    let mut emails = Vec::new();
    let mut addresses = Vec::new();
    let mut org = None;
    let mut title = None;
    let mut urls = Vec::new();
    let mut note = None;
    let mut birthday = None;

    for line in unfold_lines(text) {
        let (key, value) = match line.split_once(':') {
            Some(pair) => pair,
            None => continue,
        };

        // Type parameters (TEL;TYPE=CELL) qualify but do not change the field.
        let field = key.split(';').next().unwrap_or(key).to_ascii_uppercase();
        let value = unescape_vcard(value);
        if value.is_empty() {
            continue;
        }

        match field.as_str() {
            "FN" => formatted_name = Some(value),
            "N" => names.push(format_n_field(&value)),
            "TEL" => phone_numbers.push(value),
            "EMAIL" => emails.push(value),
            "ADR" => addresses.push(value.replace(';', " ").trim().to_string()),
            "ORG" => org = Some(value),
            "TITLE" => title = Some(value),
            "URL" => urls.push(value),
            "NOTE" => note = Some(value),
            "BDAY" => birthday = Some(value),
            _ => (),
        }
    }

    // FN is authoritative when present.
    let names = match formatted_name {
        Some(name) => vec![name],
        None if !names.is_empty() => names,
        None => return None,
    };

    Some(AddressBook {
        names,
        pronunciation: None,
        phone_numbers,
        emails,
        note,
        addresses,
        org,
        birthday,
        title,
        urls,
    })
}

/// Joins continuation lines (leading space or tab) onto their parent line.
fn unfold_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();

    for raw in text.lines() {
        if raw.starts_with(' ') || raw.starts_with('\t') {
            if let Some(last) = lines.last_mut() {
                last.push_str(&raw[1..]);
                continue;
            }
        }
        lines.push(raw.to_string());
    }

    lines
}

/// The N field is `family;given;additional;prefix;suffix`; show it given-first.
fn format_n_field(value: &str) -> String {
    let parts: Vec<&str> = value.split(';').filter(|p| !p.is_empty()).collect();
    match parts.as_slice() {
        [family, given, rest @ ..] => {
            let mut name = format!("{} {}", given, family);
            for part in rest {
                name.push(' ');
                name.push_str(part);
            }
            name
        }
        [only] => (*only).to_string(),
        [] => String::new(),
    }
}

fn unescape_vcard(value: &str) -> String {
    unescape_backslash(value.trim()).replace("\\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_mecard_minimal() {
        let card = parse_mecard("MECARD:N:Sean Owen;;").unwrap();

        assert_eq!(card.names, vec!["Sean Owen"]);
        assert!(card.pronunciation.is_none());
        assert!(card.phone_numbers.is_empty());
        assert!(card.emails.is_empty());
        assert!(card.note.is_none());
        assert!(card.addresses.is_empty());
        assert!(card.org.is_none());
        assert!(card.birthday.is_none());
        assert!(card.urls.is_empty());
    }

    #[test]
    fn verify_mecard_full() {
        let card = parse_mecard(
            "MECARD:N:Owen,Sean;TEL:+12125551212;EMAIL:sean@example.com;BDAY:19800101;\
             NOTE:escaped\\;semi;;",
        )
        .unwrap();

        assert_eq!(card.names, vec!["Sean Owen"]);
        assert_eq!(card.phone_numbers, vec!["+12125551212"]);
        assert_eq!(card.emails, vec!["sean@example.com"]);
        assert_eq!(card.birthday.as_deref(), Some("19800101"));
        assert_eq!(card.note.as_deref(), Some("escaped;semi"));
    }

    #[test]
    fn verify_mecard_invalid_birthday_dropped() {
        let card = parse_mecard("MECARD:N:A;BDAY:1980;;").unwrap();
        assert!(card.birthday.is_none());
    }

    #[test]
    fn verify_bizcard() {
        let card =
            parse_bizcard("BIZCARD:N:Jane;X:Doe;T:CEO;C:Acme;A:1 Main St;B:5551212;;").unwrap();

        assert_eq!(card.names, vec!["Jane Doe"]);
        assert_eq!(card.title.as_deref(), Some("CEO"));
        assert_eq!(card.org.as_deref(), Some("Acme"));
        assert_eq!(card.addresses, vec!["1 Main St"]);
        assert_eq!(card.phone_numbers, vec!["5551212"]);
    }

    #[test]
    fn verify_addressbook_au() {
        let text = "MEMORY:note text\r\nNAME1:Taro Yamada\r\nTEL1:0312345678\r\n";
        let card = parse_addressbook_au(text).unwrap();

        assert_eq!(card.names, vec!["Taro Yamada"]);
        assert_eq!(card.phone_numbers, vec!["0312345678"]);
        assert_eq!(card.note.as_deref(), Some("note text"));
    }

    #[test]
    fn verify_vcard() {
        let text = "BEGIN:VCARD\r\nVERSION:3.0\r\nN:Owen;Sean\r\nTEL;TYPE=CELL:+1212555\r\n\
                    EMAIL:sean@example.com\r\nEND:VCARD";
        let card = parse_vcard(text).unwrap();

        assert_eq!(card.names, vec!["Sean Owen"]);
        assert_eq!(card.phone_numbers, vec!["+1212555"]);
        assert_eq!(card.emails, vec!["sean@example.com"]);
    }

    #[test]
    fn verify_not_a_card() {
        assert!(parse_mecard("hello").is_none());
        assert!(parse_vcard("BEGIN:VEVENT").is_none());
        assert!(parse_bizcard("BIZCARD:T:CEO;;").is_none());
    }
}
