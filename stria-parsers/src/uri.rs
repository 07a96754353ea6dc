// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `uri` module recognizes URL payloads and the DoCoMo MEBKM bookmark wrapper.

use crate::fields::match_single_prefixed_field;
use crate::{Bookmark, Uri};

/// DoCoMo bookmark: `MEBKM:TITLE:title;URL:url;;`.
pub fn parse_bookmark(text: &str) -> Option<Bookmark> {
    if !text.starts_with("MEBKM:") {
        return None;
    }

    let uri = match_single_prefixed_field("URL:", text, ';', true)?;
    if !is_basically_valid_uri(&uri) {
        return None;
    }

    let title = match_single_prefixed_field("TITLE:", text, ';', true);
    Some(Bookmark { title, uri })
}

/// A bare URL payload. `www.` shorthand is normalized to an explicit scheme.
pub fn parse_uri(text: &str) -> Option<Uri> {
    let trimmed = text.trim();

    if trimmed.starts_with("www.") && is_basically_valid_uri(trimmed) {
        return Some(Uri { uri: format!("http://{}", trimmed), title: None });
    }

    if !is_basically_valid_uri(trimmed) {
        return None;
    }

    // Require a real scheme so arbitrary text with a colon does not read as a URI.
    let (scheme, _) = trimmed.split_once(':')?;
    let known = ["http", "https", "ftp", "ftps", "file"];
    if !known.contains(&scheme.to_ascii_lowercase().as_str()) {
        return None;
    }

    Some(Uri { uri: trimmed.to_string(), title: None })
}

/// A cheap plausibility test: no whitespace, and either a scheme or a `www.` prefix with a dot
/// somewhere after it.
pub fn is_basically_valid_uri(uri: &str) -> bool {
    if uri.is_empty() || uri.chars().any(char::is_whitespace) {
        return false;
    }

    if let Some((scheme, rest)) = uri.split_once("://") {
        return !scheme.is_empty()
            && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-')
            && !rest.is_empty();
    }

    uri.starts_with("www.") && uri[4..].contains('.')
}
