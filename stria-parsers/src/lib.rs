// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoded-text post-parsers for Project Stria.
//!
//! A barcode payload is usually more than a string: contact cards, URLs, geographic
//! coordinates, phone numbers, and calendar events all have compact conventions. Each parser
//! here inspects a `Reading`'s text and either produces a typed result or declines; the chain
//! is tried in a fixed order and the plain-text result is the terminal fallback, so parsing
//! never fails.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod addressbook;
pub mod calendar;
pub mod fields;
pub mod geo;
pub mod telecom;
pub mod uri;

use log::trace;

use stria_core::reading::Reading;

/// A structured contact card.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AddressBook {
    pub names: Vec<String>,
    pub pronunciation: Option<String>,
    pub phone_numbers: Vec<String>,
    pub emails: Vec<String>,
    pub note: Option<String>,
    pub addresses: Vec<String>,
    pub org: Option<String>,
    pub birthday: Option<String>,
    pub title: Option<String>,
    pub urls: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Bookmark {
    pub title: Option<String>,
    pub uri: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CalendarEvent {
    pub summary: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Email {
    pub to: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Geo {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub query: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Sms {
    pub numbers: Vec<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tel {
    pub number: String,
    pub tel_uri: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Uri {
    pub uri: String,
    pub title: Option<String>,
}

/// The typed interpretation of a decoded payload.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedReading {
    AddressBook(AddressBook),
    Bookmark(Bookmark),
    Calendar(CalendarEvent),
    Email(Email),
    Geo(Geo),
    Sms(Sms),
    Tel(Tel),
    Uri(Uri),
    Text(String),
}

/// Interprets a reading's text. Never fails; unrecognized payloads come back as `Text`.
pub fn parse_reading(reading: &Reading) -> ParsedReading {
    let text = reading.text();

    if let Some(bookmark) = uri::parse_bookmark(text) {
        trace!("parsed as bookmark");
        return ParsedReading::Bookmark(bookmark);
    }
    if let Some(card) = addressbook::parse_mecard(text) {
        return ParsedReading::AddressBook(card);
    }
    if let Some(card) = addressbook::parse_addressbook_au(text) {
        return ParsedReading::AddressBook(card);
    }
    if let Some(card) = addressbook::parse_bizcard(text) {
        return ParsedReading::AddressBook(card);
    }
    if let Some(card) = addressbook::parse_vcard(text) {
        return ParsedReading::AddressBook(card);
    }
    if let Some(event) = calendar::parse_calendar(text) {
        return ParsedReading::Calendar(event);
    }
    if let Some(geo) = geo::parse_geo(text) {
        return ParsedReading::Geo(geo);
    }
    if let Some(tel) = telecom::parse_tel(text) {
        return ParsedReading::Tel(tel);
    }
    if let Some(email) = telecom::parse_email(text) {
        return ParsedReading::Email(email);
    }
    if let Some(sms) = telecom::parse_sms(text) {
        return ParsedReading::Sms(sms);
    }
    if let Some(uri) = uri::parse_uri(text) {
        return ParsedReading::Uri(uri);
    }

    ParsedReading::Text(text.to_string())
}
