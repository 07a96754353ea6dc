// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `detector` module locates a QR symbol in a binarized image and samples its module grid:
//! finder pattern search, module size estimation, dimension inference, alignment pattern search,
//! and perspective-correct sampling.

pub mod alignment;
pub mod finder;

use log::debug;

use stria_core::errors::{not_found_error, Result};
use stria_core::matrix::BitMatrix;
use stria_core::reading::Point;
use stria_core::sample::{grid_sampler, PerspectiveTransform};

use crate::version::Version;

use alignment::AlignmentPatternFinder;
use finder::{FinderPattern, FinderPatternFinder, FinderPatternInfo};

/// A located symbol: the sampled module grid and the anchor points that produced it.
pub struct DetectorResult {
    pub bits: BitMatrix,
    /// Bottom-left, top-left, top-right finder centers, then the alignment center when found.
    pub points: Vec<Point>,
}

pub struct Detector<'a> {
    image: &'a BitMatrix,
}

impl<'a> Detector<'a> {
    pub fn new(image: &'a BitMatrix) -> Self {
        Detector { image }
    }

    /// Finds and samples one QR symbol.
    pub fn detect(&self, try_harder: bool) -> Result<DetectorResult> {
        let info = FinderPatternFinder::new(self.image).find(try_harder)?;
        self.process_finder_pattern_info(info)
    }

    fn process_finder_pattern_info(&self, info: FinderPatternInfo) -> Result<DetectorResult> {
        let top_left = info.top_left;
        let top_right = info.top_right;
        let bottom_left = info.bottom_left;

        let module_size = self.calculate_module_size(&top_left, &top_right, &bottom_left);
        if module_size < 1.0 {
            return not_found_error();
        }

        let dimension = compute_dimension(
            &top_left.point(),
            &top_right.point(),
            &bottom_left.point(),
            module_size,
        )?;
        let provisional_version = Version::for_dimension(dimension)?;
        let modules_between_centers = provisional_version.dimension() - 7;

        debug!(
            "symbol candidate: module size {:.2}, dimension {}, provisional version {}",
            module_size,
            dimension,
            provisional_version.number()
        );

        let mut alignment_pattern = None;

        if !provisional_version.alignment_centers().is_empty() {
            // Extrapolate the bottom-right corner and walk back 3 modules toward the top-left to
            // land on the expected alignment center.
            let bottom_right_x = top_right.x - top_left.x + bottom_left.x;
            let bottom_right_y = top_right.y - top_left.y + bottom_left.y;

            let correction = 1.0 - 3.0 / modules_between_centers as f32;
            let est_x = top_left.x + correction * (bottom_right_x - top_left.x);
            let est_y = top_left.y + correction * (bottom_right_y - top_left.y);

            // Widen the search window until the pattern turns up, within reason.
            let mut allowance_factor = 4;
            while allowance_factor <= 16 {
                match self.find_alignment_in_region(module_size, est_x, est_y, allowance_factor as f32)
                {
                    Ok(point) => {
                        alignment_pattern = Some(point);
                        break;
                    }
                    Err(_) => allowance_factor <<= 1,
                }
            }
        }

        let transform = create_transform(
            &top_left.point(),
            &top_right.point(),
            &bottom_left.point(),
            alignment_pattern.as_ref(),
            dimension,
        );

        let bits = grid_sampler().sample_grid(self.image, dimension, &transform)?;

        let mut points =
            vec![bottom_left.point(), top_left.point(), top_right.point()];
        if let Some(point) = alignment_pattern {
            points.push(point);
        }

        Ok(DetectorResult { bits, points })
    }

    /// The average module size along both sides touching the top-left finder.
    fn calculate_module_size(
        &self,
        top_left: &FinderPattern,
        top_right: &FinderPattern,
        bottom_left: &FinderPattern,
    ) -> f32 {
        (self.calculate_module_size_one_way(top_left, top_right)
            + self.calculate_module_size_one_way(top_left, bottom_left))
            / 2.0
    }

    /// Estimates the module size from the dark-light-dark transit between two finder centers,
    /// measured from both ends. Each transit crosses 7 modules of finder pattern.
    fn calculate_module_size_one_way(&self, pattern: &FinderPattern, other: &FinderPattern) -> f32 {
        let est_1 = self.size_of_black_white_black_run_both_ways(
            pattern.x as i32,
            pattern.y as i32,
            other.x as i32,
            other.y as i32,
        );
        let est_2 = self.size_of_black_white_black_run_both_ways(
            other.x as i32,
            other.y as i32,
            pattern.x as i32,
            pattern.y as i32,
        );

        if est_1.is_nan() {
            return est_2 / 7.0;
        }
        if est_2.is_nan() {
            return est_1 / 7.0;
        }
        (est_1 + est_2) / 14.0
    }

    /// Measures a dark-light-dark run from `(from_x, from_y)` toward `(to_x, to_y)` and the same
    /// distance beyond in the opposite direction, scaling for image-edge truncation.
    fn size_of_black_white_black_run_both_ways(
        &self,
        from_x: i32,
        from_y: i32,
        to_x: i32,
        to_y: i32,
    ) -> f32 {
        let mut result = self.size_of_black_white_black_run(from_x, from_y, to_x, to_y);

        // Mirror the endpoint through the start, clamping at the image edge.
        let mut scale = 1.0f32;
        let width = self.image.width() as i32;
        let height = self.image.height() as i32;

        let mut other_to_x = from_x - (to_x - from_x);
        if other_to_x < 0 {
            scale = from_x as f32 / (from_x - other_to_x) as f32;
            other_to_x = 0;
        }
        else if other_to_x >= width {
            scale = (width - 1 - from_x) as f32 / (other_to_x - from_x) as f32;
            other_to_x = width - 1;
        }
        let mut other_to_y = (from_y as f32 - (to_y - from_y) as f32 * scale) as i32;

        scale = 1.0;
        if other_to_y < 0 {
            scale = from_y as f32 / (from_y - other_to_y) as f32;
            other_to_y = 0;
        }
        else if other_to_y >= height {
            scale = (height - 1 - from_y) as f32 / (other_to_y - from_y) as f32;
            other_to_y = height - 1;
        }
        let other_to_x = (from_x as f32 + (other_to_x - from_x) as f32 * scale) as i32;

        result += self.size_of_black_white_black_run(from_x, from_y, other_to_x, other_to_y);

        // The start module was counted twice.
        result - 1.0
    }

    /// Bresenham walk counting the distance covered by the first dark-light-dark transition
    /// sequence starting at the origin. NaN when the run is still open at the segment's end.
    fn size_of_black_white_black_run(
        &self,
        mut from_x: i32,
        mut from_y: i32,
        mut to_x: i32,
        mut to_y: i32,
    ) -> f32 {
        let steep = (to_y - from_y).abs() > (to_x - from_x).abs();
        if steep {
            std::mem::swap(&mut from_x, &mut from_y);
            std::mem::swap(&mut to_x, &mut to_y);
        }

        let dx = (to_x - from_x).abs();
        let dy = (to_y - from_y).abs();
        let mut error = -dx / 2;
        let x_step = if from_x < to_x { 1 } else { -1 };
        let y_step = if from_y < to_y { 1 } else { -1 };

        // 0 = in first dark run, 1 = in light run, 2 = in second dark run.
        let mut state = 0;
        let x_limit = to_x + x_step;
        let mut x = from_x;
        let mut y = from_y;

        while x != x_limit {
            let real_x = if steep { y } else { x };
            let real_y = if steep { x } else { y };

            if real_x < 0
                || real_x >= self.image.width() as i32
                || real_y < 0
                || real_y >= self.image.height() as i32
            {
                break;
            }

            // Advance the state at each color transition.
            let dark = self.image.get(real_x as usize, real_y as usize);
            if (state == 1) == dark {
                if state == 2 {
                    return distance(x, y, from_x, from_y);
                }
                state += 1;
            }

            error += dy;
            if error > 0 {
                if y == to_y {
                    break;
                }
                y += y_step;
                error -= dx;
            }
            x += x_step;
        }

        if state == 2 {
            return distance(to_x + x_step, to_y, from_x, from_y);
        }

        f32::NAN
    }

    fn find_alignment_in_region(
        &self,
        module_size: f32,
        est_x: f32,
        est_y: f32,
        allowance_factor: f32,
    ) -> Result<Point> {
        let allowance = (allowance_factor * module_size) as i32;
        let est_x = est_x as i32;
        let est_y = est_y as i32;

        let left = (est_x - allowance).max(0) as usize;
        let right = ((est_x + allowance) as usize).min(self.image.width() - 1);
        if ((right - left) as f32) < module_size * 3.0 {
            return not_found_error();
        }

        let top = (est_y - allowance).max(0) as usize;
        let bottom = ((est_y + allowance) as usize).min(self.image.height() - 1);
        if ((bottom - top) as f32) < module_size * 3.0 {
            return not_found_error();
        }

        AlignmentPatternFinder::new(
            self.image,
            left,
            top,
            right - left,
            bottom - top,
            module_size,
        )
        .find()
    }
}

fn distance(x1: i32, y1: i32, x2: i32, y2: i32) -> f32 {
    let dx = (x1 - x2) as f32;
    let dy = (y1 - y2) as f32;
    (dx * dx + dy * dy).sqrt()
}

/// The symbol dimension implied by the finder center spacing, snapped to 4k + 1.
fn compute_dimension(
    top_left: &Point,
    top_right: &Point,
    bottom_left: &Point,
    module_size: f32,
) -> Result<usize> {
    let tl_tr = (top_left.distance(top_right) / module_size).round() as usize;
    let tl_bl = (top_left.distance(bottom_left) / module_size).round() as usize;
    let mut dimension = (tl_tr + tl_bl) / 2 + 7;

    match dimension % 4 {
        0 => dimension += 1,
        2 => dimension -= 1,
        3 => return not_found_error(),
        _ => (),
    }

    Ok(dimension)
}

/// Maps grid coordinates to image coordinates. The finder centers sit at 3.5 modules from their
/// corners; the alignment center, when available, pins the fourth point at 6.5 modules in from
/// the bottom-right corner.
fn create_transform(
    top_left: &Point,
    top_right: &Point,
    bottom_left: &Point,
    alignment: Option<&Point>,
    dimension: usize,
) -> PerspectiveTransform {
    let dim_minus_three = dimension as f32 - 3.5;

    let (bottom_right_x, bottom_right_y, source_x, source_y) = match alignment {
        Some(alignment) => {
            (alignment.x, alignment.y, dim_minus_three - 3.0, dim_minus_three - 3.0)
        }
        None => (
            top_right.x - top_left.x + bottom_left.x,
            top_right.y - top_left.y + bottom_left.y,
            dim_minus_three,
            dim_minus_three,
        ),
    };

    PerspectiveTransform::quadrilateral_to_quadrilateral(
        3.5,
        3.5,
        dim_minus_three,
        3.5,
        source_x,
        source_y,
        3.5,
        dim_minus_three,
        top_left.x,
        top_left.y,
        top_right.x,
        top_right.y,
        bottom_right_x,
        bottom_right_y,
        bottom_left.x,
        bottom_left.y,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_compute_dimension() {
        // 14 modules between finder centers on each side of a version 1 symbol.
        let dimension = compute_dimension(
            &Point::new(3.5, 3.5),
            &Point::new(17.5, 3.5),
            &Point::new(3.5, 17.5),
            1.0,
        )
        .unwrap();
        assert_eq!(dimension, 21);

        // An off-by-one estimate snaps to the nearest valid dimension.
        let dimension = compute_dimension(
            &Point::new(3.5, 3.5),
            &Point::new(18.5, 3.5),
            &Point::new(3.5, 17.5),
            1.0,
        )
        .unwrap();
        assert_eq!(dimension, 21);
    }

    #[test]
    fn verify_detect_rendered_symbol() {
        use crate::ecl::EcLevel;
        use crate::encoder;
        use stria_core::options::{DecodeOptions, EncodeOptions};

        let qr = encoder::encode("DETECT ME", EcLevel::M, &EncodeOptions::default()).unwrap();
        let modules = qr.render().unwrap();

        // Paint the symbol into a larger image at 4 pixels per module with a quiet zone.
        let scale = 4;
        let quiet = 8 * scale;
        let size = modules.width() * scale + 2 * quiet;
        let mut image = BitMatrix::new(size, size);
        for y in 0..modules.height() {
            for x in 0..modules.width() {
                if modules.get(x, y) {
                    for sy in 0..scale {
                        for sx in 0..scale {
                            image.set(quiet + x * scale + sx, quiet + y * scale + sy);
                        }
                    }
                }
            }
        }

        let result = Detector::new(&image).detect(true).unwrap();
        assert_eq!(result.bits.width(), modules.width());

        let decoded =
            crate::decoder::decode_matrix(&result.bits, &DecodeOptions::default()).unwrap();
        assert_eq!(decoded.text, "DETECT ME");
    }
}
