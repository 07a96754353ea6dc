// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `luma` module abstracts the greyscale image a decode operates on.
//!
//! The core never performs image acquisition or file I/O. Callers adapt whatever raster they have
//! to `LuminanceSource`, and the binarizer consumes luminance values from it. Value 0 is darkest,
//! row 0 is the top of the image.

use crate::errors::{invalid_argument_error, Result};

/// A `LuminanceSource` provides row-wise and whole-image access to 8-bit luminance values.
pub trait LuminanceSource {
    /// The width of the image in pixels.
    fn width(&self) -> usize;

    /// The height of the image in pixels.
    fn height(&self) -> usize;

    /// Copies row `y` into `buf`, resizing it as required.
    fn row(&self, y: usize, buf: &mut Vec<u8>);

    /// The whole image in row-major order.
    fn matrix(&self) -> Vec<u8>;

    /// Whether `crop` is supported.
    fn is_crop_supported(&self) -> bool {
        false
    }

    /// A new source covering only the given region of this one.
    fn crop(&self, _left: usize, _top: usize, _width: usize, _height: usize)
        -> Result<Box<dyn LuminanceSource>> {
        invalid_argument_error("crop is not supported by this luminance source")
    }

    /// Whether `rotate_ccw` is supported.
    fn is_rotate_supported(&self) -> bool {
        false
    }

    /// A new source with this one's image rotated 90 degrees counterclockwise.
    fn rotate_ccw(&self) -> Result<Box<dyn LuminanceSource>> {
        invalid_argument_error("rotation is not supported by this luminance source")
    }
}

/// A `GreyImage` is an owned 8-bit greyscale raster implementing `LuminanceSource` with support
/// for cropping and counterclockwise rotation.
#[derive(Clone, Debug)]
pub struct GreyImage {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl GreyImage {
    /// Creates a `GreyImage` from row-major luminance values. The pixel count must equal
    /// `width * height`.
    pub fn new(width: usize, height: usize, pixels: Vec<u8>) -> Result<Self> {
        if pixels.len() != width * height {
            return invalid_argument_error("pixel count does not match dimensions");
        }
        Ok(GreyImage { width, height, pixels })
    }

    /// Creates an all-white image. Useful for synthesizing test rasters.
    pub fn blank(width: usize, height: usize) -> Self {
        GreyImage { width, height, pixels: vec![0xff; width * height] }
    }

    /// Sets the pixel at `(x, y)`.
    pub fn put(&mut self, x: usize, y: usize, luminance: u8) {
        self.pixels[y * self.width + x] = luminance;
    }
}

impl LuminanceSource for GreyImage {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn row(&self, y: usize, buf: &mut Vec<u8>) {
        let start = y * self.width;
        buf.clear();
        buf.extend_from_slice(&self.pixels[start..start + self.width]);
    }

    fn matrix(&self) -> Vec<u8> {
        self.pixels.clone()
    }

    fn is_crop_supported(&self) -> bool {
        true
    }

    fn crop(&self, left: usize, top: usize, width: usize, height: usize)
        -> Result<Box<dyn LuminanceSource>> {
        if left + width > self.width || top + height > self.height {
            return invalid_argument_error("crop region exceeds image bounds");
        }

        let mut pixels = Vec::with_capacity(width * height);
        for y in top..top + height {
            let start = y * self.width + left;
            pixels.extend_from_slice(&self.pixels[start..start + width]);
        }

        Ok(Box::new(GreyImage { width, height, pixels }))
    }

    fn is_rotate_supported(&self) -> bool {
        true
    }

    fn rotate_ccw(&self) -> Result<Box<dyn LuminanceSource>> {
        // The new row 0 is the old rightmost column, top-to-bottom.
        let mut pixels = Vec::with_capacity(self.width * self.height);

        for x in (0..self.width).rev() {
            for y in 0..self.height {
                pixels.push(self.pixels[y * self.width + x]);
            }
        }

        Ok(Box::new(GreyImage { width: self.height, height: self.width, pixels }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_crop_and_rotate() {
        // 3x2 image:
        //   10 20 30
        //   40 50 60
        let image = GreyImage::new(3, 2, vec![10, 20, 30, 40, 50, 60]).unwrap();

        let cropped = image.crop(1, 0, 2, 2).unwrap();
        assert_eq!(cropped.width(), 2);
        let mut row = Vec::new();
        cropped.row(1, &mut row);
        assert_eq!(row, vec![50, 60]);

        // CCW: the right column becomes the top row.
        let rotated = image.rotate_ccw().unwrap();
        assert_eq!((rotated.width(), rotated.height()), (2, 3));
        assert_eq!(rotated.matrix(), vec![30, 60, 20, 50, 10, 40]);
    }

    #[test]
    fn verify_dimension_check() {
        assert!(GreyImage::new(2, 2, vec![0; 3]).is_err());
    }
}
