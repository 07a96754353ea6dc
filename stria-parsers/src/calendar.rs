// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `calendar` module recognizes embedded vEvent blocks.

use crate::CalendarEvent;

/// A `BEGIN:VEVENT` block, possibly wrapped in a vCalendar envelope.
pub fn parse_calendar(text: &str) -> Option<CalendarEvent> {
    let start = text.find("BEGIN:VEVENT")?;
    let body = &text[start..];

    let mut event = CalendarEvent {
        summary: None,
        start: None,
        end: None,
        location: None,
        description: None,
    };

    for line in body.lines() {
        if line.starts_with("END:VEVENT") {
            break;
        }

        let (key, value) = match line.split_once(':') {
            Some(pair) => pair,
            None => continue,
        };
        let field = key.split(';').next().unwrap_or(key).to_ascii_uppercase();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match field.as_str() {
            "SUMMARY" => event.summary = Some(value.to_string()),
            "DTSTART" => event.start = Some(value.to_string()),
            "DTEND" => event.end = Some(value.to_string()),
            "LOCATION" => event.location = Some(value.to_string()),
            "DESCRIPTION" => event.description = Some(value.to_string()),
            _ => (),
        }
    }

    // An event with no start is noise.
    event.start.as_ref()?;
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_event() {
        let text = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nSUMMARY:Launch\r\n\
                    DTSTART:20230401T100000Z\r\nDTEND:20230401T110000Z\r\n\
                    LOCATION:Pad 39A\r\nEND:VEVENT\r\nEND:VCALENDAR";
        let event = parse_calendar(text).unwrap();

        assert_eq!(event.summary.as_deref(), Some("Launch"));
        assert_eq!(event.start.as_deref(), Some("20230401T100000Z"));
        assert_eq!(event.end.as_deref(), Some("20230401T110000Z"));
        assert_eq!(event.location.as_deref(), Some("Pad 39A"));
    }

    #[test]
    fn verify_requires_start() {
        assert!(parse_calendar("BEGIN:VEVENT\r\nSUMMARY:No time\r\nEND:VEVENT").is_none());
        assert!(parse_calendar("BEGIN:VCARD").is_none());
    }
}
