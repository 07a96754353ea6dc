// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `sample` module extracts a square grid of modules from a binarized image.
//!
//! A detector knows where a symbol's anchor points are in image space and what grid coordinates
//! they correspond to. `PerspectiveTransform` maps grid space back into image space, and a
//! `GridSampler` walks every module center through that mapping to produce the symbol's
//! `BitMatrix`.
//!
//! The active sampler is a process-wide choice so that platforms may install an optimized
//! resampler once at startup; it is not a mutable runtime knob.

use once_cell::sync::OnceCell;

use crate::errors::{invalid_argument_error, not_found_error, Result};
use crate::matrix::BitMatrix;

/// A `PerspectiveTransform` is a 3x3 homography mapping one plane to another.
#[derive(Copy, Clone, Debug)]
pub struct PerspectiveTransform {
    a11: f32,
    a21: f32,
    a31: f32,
    a12: f32,
    a22: f32,
    a32: f32,
    a13: f32,
    a23: f32,
    a33: f32,
}

impl PerspectiveTransform {
    /// The transform mapping the unit square corners (0,0) (1,0) (1,1) (0,1) onto the given
    /// quadrilateral.
    #[allow(clippy::too_many_arguments)]
    pub fn square_to_quadrilateral(
        x0: f32, y0: f32,
        x1: f32, y1: f32,
        x2: f32, y2: f32,
        x3: f32, y3: f32,
    ) -> Self {
        let dx3 = x0 - x1 + x2 - x3;
        let dy3 = y0 - y1 + y2 - y3;

        if dx3 == 0.0 && dy3 == 0.0 {
            // Affine case.
            PerspectiveTransform {
                a11: x1 - x0,
                a21: x2 - x1,
                a31: x0,
                a12: y1 - y0,
                a22: y2 - y1,
                a32: y0,
                a13: 0.0,
                a23: 0.0,
                a33: 1.0,
            }
        }
        else {
            let dx1 = x1 - x2;
            let dx2 = x3 - x2;
            let dy1 = y1 - y2;
            let dy2 = y3 - y2;
            let denominator = dx1 * dy2 - dx2 * dy1;
            let a13 = (dx3 * dy2 - dx2 * dy3) / denominator;
            let a23 = (dx1 * dy3 - dx3 * dy1) / denominator;

            PerspectiveTransform {
                a11: x1 - x0 + a13 * x1,
                a21: x3 - x0 + a23 * x3,
                a31: x0,
                a12: y1 - y0 + a13 * y1,
                a22: y3 - y0 + a23 * y3,
                a32: y0,
                a13,
                a23,
                a33: 1.0,
            }
        }
    }

    /// The transform mapping the given quadrilateral onto the unit square.
    #[allow(clippy::too_many_arguments)]
    pub fn quadrilateral_to_square(
        x0: f32, y0: f32,
        x1: f32, y1: f32,
        x2: f32, y2: f32,
        x3: f32, y3: f32,
    ) -> Self {
        Self::square_to_quadrilateral(x0, y0, x1, y1, x2, y2, x3, y3).adjoint()
    }

    /// The transform mapping quadrilateral (x0..y3) onto quadrilateral (x0p..y3p).
    #[allow(clippy::too_many_arguments)]
    pub fn quadrilateral_to_quadrilateral(
        x0: f32, y0: f32,
        x1: f32, y1: f32,
        x2: f32, y2: f32,
        x3: f32, y3: f32,
        x0p: f32, y0p: f32,
        x1p: f32, y1p: f32,
        x2p: f32, y2p: f32,
        x3p: f32, y3p: f32,
    ) -> Self {
        let q_to_s = Self::quadrilateral_to_square(x0, y0, x1, y1, x2, y2, x3, y3);
        let s_to_q = Self::square_to_quadrilateral(x0p, y0p, x1p, y1p, x2p, y2p, x3p, y3p);
        s_to_q.times(&q_to_s)
    }

    /// The adjoint, which inverts the transform up to a scale factor that division in
    /// `transform_points` cancels out.
    fn adjoint(&self) -> Self {
        PerspectiveTransform {
            a11: self.a22 * self.a33 - self.a23 * self.a32,
            a21: self.a23 * self.a31 - self.a21 * self.a33,
            a31: self.a21 * self.a32 - self.a22 * self.a31,
            a12: self.a13 * self.a32 - self.a12 * self.a33,
            a22: self.a11 * self.a33 - self.a13 * self.a31,
            a32: self.a12 * self.a31 - self.a11 * self.a32,
            a13: self.a12 * self.a23 - self.a13 * self.a22,
            a23: self.a13 * self.a21 - self.a11 * self.a23,
            a33: self.a11 * self.a22 - self.a12 * self.a21,
        }
    }

    fn times(&self, other: &PerspectiveTransform) -> Self {
        PerspectiveTransform {
            a11: self.a11 * other.a11 + self.a21 * other.a12 + self.a31 * other.a13,
            a21: self.a11 * other.a21 + self.a21 * other.a22 + self.a31 * other.a23,
            a31: self.a11 * other.a31 + self.a21 * other.a32 + self.a31 * other.a33,
            a12: self.a12 * other.a11 + self.a22 * other.a12 + self.a32 * other.a13,
            a22: self.a12 * other.a21 + self.a22 * other.a22 + self.a32 * other.a23,
            a32: self.a12 * other.a31 + self.a22 * other.a32 + self.a32 * other.a33,
            a13: self.a13 * other.a11 + self.a23 * other.a12 + self.a33 * other.a13,
            a23: self.a13 * other.a21 + self.a23 * other.a22 + self.a33 * other.a23,
            a33: self.a13 * other.a31 + self.a23 * other.a32 + self.a33 * other.a33,
        }
    }

    /// Transforms `(x, y)` interleaved point pairs in place.
    pub fn transform_points(&self, points: &mut [f32]) {
        debug_assert!(points.len() % 2 == 0);

        for pair in points.chunks_exact_mut(2) {
            let x = pair[0];
            let y = pair[1];
            let denominator = self.a13 * x + self.a23 * y + self.a33;
            pair[0] = (self.a11 * x + self.a21 * y + self.a31) / denominator;
            pair[1] = (self.a12 * x + self.a22 * y + self.a32) / denominator;
        }
    }
}

/// A `GridSampler` reads a dimension x dimension grid of modules out of a binarized image given
/// the transform from grid space to image space.
pub trait GridSampler {
    /// Samples `dimension` x `dimension` module centers. Fails with `NotFound` when the transform
    /// lands outside the image by more than one pixel.
    fn sample_grid(
        &self,
        image: &BitMatrix,
        dimension: usize,
        transform: &PerspectiveTransform,
    ) -> Result<BitMatrix>;
}

/// The portable software `GridSampler`.
#[derive(Default)]
pub struct DefaultGridSampler;

impl GridSampler for DefaultGridSampler {
    fn sample_grid(
        &self,
        image: &BitMatrix,
        dimension: usize,
        transform: &PerspectiveTransform,
    ) -> Result<BitMatrix> {
        if dimension == 0 {
            return invalid_argument_error("sample dimension must be positive");
        }

        let mut bits = BitMatrix::square(dimension);
        let mut points = vec![0f32; 2 * dimension];

        for y in 0..dimension {
            let row_value = y as f32 + 0.5;
            for x in 0..dimension {
                points[2 * x] = x as f32 + 0.5;
                points[2 * x + 1] = row_value;
            }

            transform.transform_points(&mut points);
            check_and_nudge_points(image.width(), image.height(), &mut points)?;

            for x in 0..dimension {
                if image.get(points[2 * x] as usize, points[2 * x + 1] as usize) {
                    bits.set(x, y);
                }
            }
        }

        Ok(bits)
    }
}

/// Moves points that fall at most one pixel outside the image back onto its border. A point any
/// further out means the transform is wrong and the sample fails.
fn check_and_nudge_points(width: usize, height: usize, points: &mut [f32]) -> Result<()> {
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;

    for pair in points.chunks_exact_mut(2) {
        if pair[0] < -1.0 || pair[0] > max_x + 1.0 || pair[1] < -1.0 || pair[1] > max_y + 1.0 {
            return not_found_error();
        }

        pair[0] = pair[0].clamp(0.0, max_x);
        pair[1] = pair[1].clamp(0.0, max_y);
    }

    Ok(())
}

static GRID_SAMPLER: OnceCell<Box<dyn GridSampler + Send + Sync>> = OnceCell::new();

/// Installs the process-wide `GridSampler`. May be called at most once, before any decode;
/// installing after a sampler has been used (or installed) fails.
pub fn install_grid_sampler(sampler: Box<dyn GridSampler + Send + Sync>) -> Result<()> {
    if GRID_SAMPLER.set(sampler).is_err() {
        return invalid_argument_error("a grid sampler is already installed");
    }
    Ok(())
}

/// The active `GridSampler`: the installed one, or the portable default.
pub fn grid_sampler() -> &'static (dyn GridSampler + Send + Sync) {
    GRID_SAMPLER.get_or_init(|| Box::new(DefaultGridSampler)).as_ref()
}
