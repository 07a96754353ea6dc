// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `geo` module recognizes `geo:` URIs.

use crate::Geo;

/// `geo:lat,lng[,alt][?query]`. Coordinates are reported as written; no range validation is
/// applied.
pub fn parse_geo(text: &str) -> Option<Geo> {
    let rest = strip_prefix_ignore_case(text, "geo:")?;

    let (coordinates, query) = match rest.split_once('?') {
        Some((coordinates, query)) => (coordinates, Some(query.to_string())),
        None => (rest, None),
    };

    let mut parts = coordinates.split(',');
    let latitude: f64 = parts.next()?.parse().ok()?;
    let longitude: f64 = parts.next()?.parse().ok()?;
    let altitude: f64 = match parts.next() {
        Some(value) => value.parse().ok()?,
        None => 0.0,
    };
    if parts.next().is_some() {
        return None;
    }

    Some(Geo { latitude, longitude, altitude, query })
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    }
    else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_two_coordinates() {
        let geo = parse_geo("geo:1,2").unwrap();
        assert_eq!(geo.latitude, 1.0);
        assert_eq!(geo.longitude, 2.0);
        assert_eq!(geo.altitude, 0.0);
        assert!(geo.query.is_none());
    }

    #[test]
    fn verify_three_coordinates() {
        let geo = parse_geo("geo:100.33,-32.3344,3.35").unwrap();
        assert_eq!(geo.latitude, 100.33);
        assert_eq!(geo.longitude, -32.3344);
        assert_eq!(geo.altitude, 3.35);
    }

    #[test]
    fn verify_query() {
        let geo = parse_geo("GEO:40.71,-74.0?q=nyc").unwrap();
        assert_eq!(geo.query.as_deref(), Some("q=nyc"));
    }

    #[test]
    fn verify_rejects_malformed() {
        assert!(parse_geo("geo:1").is_none());
        assert!(parse_geo("geo:a,b").is_none());
        assert!(parse_geo("geo:1,2,3,4").is_none());
        assert!(parse_geo("gel:1,2").is_none());
    }
}
