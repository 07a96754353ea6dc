// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `reading` module defines the envelope returned by a successful decode.

use crate::format::BarcodeFormat;

/// A `Point` is a position in image pixel coordinates. Points identify the anchors a reader used
/// to locate a symbol: the three finder patterns of a QR code, its alignment pattern when present,
/// or the two end points of a 1D barcode row.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }

    /// The Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Orders three pattern centers as (bottom-left, top-left, top-right).
///
/// The top-left center is the one opposite the longest side of the triangle, oriented so that the
/// z component of the cross product (bl - tl) x (tr - tl) is positive.
pub fn order_corners(patterns: [Point; 3]) -> [Point; 3] {
    let d01 = patterns[0].distance(&patterns[1]);
    let d12 = patterns[1].distance(&patterns[2]);
    let d02 = patterns[0].distance(&patterns[2]);

    // The two points joined by the longest side are the off-diagonal corners.
    let (mut a, top_left, mut c) = if d12 >= d01 && d12 >= d02 {
        (patterns[1], patterns[0], patterns[2])
    }
    else if d02 >= d12 && d02 >= d01 {
        (patterns[0], patterns[1], patterns[2])
    }
    else {
        (patterns[0], patterns[2], patterns[1])
    };

    if cross_product_z(a, top_left, c) < 0.0 {
        std::mem::swap(&mut a, &mut c);
    }

    [a, top_left, c]
}

/// The z component of the cross product of (a - b) and (c - b).
fn cross_product_z(a: Point, b: Point, c: Point) -> f32 {
    (c.x - b.x) * (a.y - b.y) - (c.y - b.y) * (a.x - b.x)
}

/// A `MetadataKey` identifies a piece of auxiliary information attached to a `Reading`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    /// The raw byte segments of a 2D symbol, before character set interpretation.
    ByteSegments,
    /// The symbology identifier string, e.g. `]Q1`.
    SymbologyIdentifier,
    /// The orientation, in degrees, the symbol was decoded at.
    Orientation,
    /// The QR error correction level the symbol was encoded with.
    ErrorCorrectionLevel,
}

/// A `MetadataValue` is the value attached under a `MetadataKey`.
#[derive(Clone, Debug, PartialEq)]
pub enum MetadataValue {
    Bytes(Vec<Vec<u8>>),
    Str(String),
    UInt(u32),
}

/// A `Reading` is the outcome of successfully decoding one barcode symbol.
///
/// At least one of `text` and `raw_bytes` is present: text-bearing symbologies populate both,
/// while a raw binary QR payload may carry bytes only.
#[derive(Clone, Debug)]
pub struct Reading {
    /// The decoded text.
    pub text: Option<String>,
    /// The raw bytes the symbol encoded, where the symbology distinguishes bytes from text.
    pub raw_bytes: Option<Box<[u8]>>,
    /// The anchor points the reader used, in image pixel coordinates.
    pub points: Vec<Point>,
    /// The symbology the symbol was decoded from.
    pub format: BarcodeFormat,
    /// Auxiliary key-value information.
    pub metadata: Vec<(MetadataKey, MetadataValue)>,
}

impl Reading {
    /// Creates a text-only `Reading`.
    pub fn from_text(text: String, points: Vec<Point>, format: BarcodeFormat) -> Self {
        Reading { text: Some(text), raw_bytes: None, points, format, metadata: Vec::new() }
    }

    /// Creates a `Reading` carrying both text and the raw symbol bytes.
    pub fn new(
        text: String,
        raw_bytes: Box<[u8]>,
        points: Vec<Point>,
        format: BarcodeFormat,
    ) -> Self {
        Reading {
            text: Some(text),
            raw_bytes: Some(raw_bytes),
            points,
            format,
            metadata: Vec::new(),
        }
    }

    /// The decoded text, or `""` for a byte-only reading.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Attaches a metadata value, replacing any previous value under the same key.
    pub fn put_metadata(&mut self, key: MetadataKey, value: MetadataValue) {
        self.metadata.retain(|(k, _)| *k != key);
        self.metadata.push((key, value));
    }

    /// Gets the metadata value under `key`.
    pub fn metadata(&self, key: MetadataKey) -> Option<&MetadataValue> {
        self.metadata.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_order_corners() {
        // An axis-aligned right angle: top-left at the origin.
        let tl = Point::new(0.0, 0.0);
        let tr = Point::new(10.0, 0.0);
        let bl = Point::new(0.0, 10.0);

        for perm in [[tl, tr, bl], [tr, tl, bl], [bl, tr, tl]] {
            let [b, t, r] = order_corners(perm);
            assert_eq!(t, tl);
            assert_eq!(b, bl);
            assert_eq!(r, tr);
        }
    }

    #[test]
    fn verify_metadata_replaces() {
        let mut reading = Reading::from_text("x".to_string(), vec![], BarcodeFormat::QrCode);

        reading.put_metadata(MetadataKey::Orientation, MetadataValue::UInt(90));
        reading.put_metadata(MetadataKey::Orientation, MetadataValue::UInt(180));

        assert_eq!(reading.metadata(MetadataKey::Orientation), Some(&MetadataValue::UInt(180)));
        assert_eq!(reading.metadata.len(), 1);
    }
}
