// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `ecc` module implements GF(256) arithmetic and systematic Reed-Solomon coding.
//!
//! The field is generated by the QR Code primitive polynomial x^8 + x^4 + x^3 + x^2 + 1 (0x011d)
//! with generator roots starting at alpha^0. The decoder recovers the error locator and evaluator
//! with the extended Euclidean algorithm, locates errors by Chien search, and computes magnitudes
//! with Forney's formula.

use once_cell::sync::Lazy;

use crate::errors::{checksum_error, invalid_argument_error, Result};

const PRIMITIVE: u32 = 0x011d;
const FIELD_SIZE: usize = 256;

/// GF(256) with precomputed exponential and logarithm tables.
#[derive(Debug, PartialEq, Eq)]
pub struct GaloisField {
    // exp is doubled so that exp[log a + log b] never needs a modulo.
    exp: [u8; 2 * FIELD_SIZE],
    log: [u8; FIELD_SIZE],
}

static QR_CODE_FIELD: Lazy<GaloisField> = Lazy::new(GaloisField::new);

impl GaloisField {
    fn new() -> Self {
        let mut exp = [0u8; 2 * FIELD_SIZE];
        let mut log = [0u8; FIELD_SIZE];

        let mut x: u32 = 1;
        for i in 0..FIELD_SIZE - 1 {
            exp[i] = x as u8;
            log[x as usize] = i as u8;
            x <<= 1;
            if x >= FIELD_SIZE as u32 {
                x ^= PRIMITIVE;
            }
        }
        for i in FIELD_SIZE - 1..2 * FIELD_SIZE {
            exp[i] = exp[i - (FIELD_SIZE - 1)];
        }

        GaloisField { exp, log }
    }

    /// The field used by QR Code error correction.
    pub fn qr_code() -> &'static GaloisField {
        &QR_CODE_FIELD
    }

    /// alpha^power.
    #[inline]
    pub fn exp(&self, power: usize) -> u8 {
        self.exp[power % (FIELD_SIZE - 1)]
    }

    /// log_alpha(a). `a` must be nonzero.
    #[inline]
    pub fn log(&self, a: u8) -> usize {
        debug_assert!(a != 0);
        usize::from(self.log[usize::from(a)])
    }

    /// The product of `a` and `b`.
    #[inline]
    pub fn multiply(&self, a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        self.exp[self.log(a) + self.log(b)]
    }

    /// The multiplicative inverse of `a`. `a` must be nonzero.
    #[inline]
    pub fn inverse(&self, a: u8) -> u8 {
        self.exp[FIELD_SIZE - 1 - self.log(a)]
    }

    /// The monomial `coefficient * x^degree`.
    fn monomial(&'static self, degree: usize, coefficient: u8) -> GfPoly {
        if coefficient == 0 {
            return GfPoly::zero(self);
        }
        let mut coefficients = vec![0u8; degree + 1];
        coefficients[0] = coefficient;
        GfPoly { field: self, coefficients }
    }
}

/// A polynomial over GF(256), coefficients stored highest degree first with no leading zeros.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GfPoly {
    field: &'static GaloisField,
    coefficients: Vec<u8>,
}

impl GfPoly {
    /// Builds a polynomial from highest-degree-first coefficients, stripping leading zeros.
    pub fn new(field: &'static GaloisField, coefficients: &[u8]) -> Self {
        let first_nonzero = coefficients.iter().position(|&c| c != 0);
        match first_nonzero {
            Some(i) => GfPoly { field, coefficients: coefficients[i..].to_vec() },
            None => GfPoly::zero(field),
        }
    }

    fn zero(field: &'static GaloisField) -> Self {
        GfPoly { field, coefficients: vec![0] }
    }

    pub fn is_zero(&self) -> bool {
        self.coefficients[0] == 0
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn coefficients(&self) -> &[u8] {
        &self.coefficients
    }

    /// The coefficient of the x^degree term.
    pub fn coefficient(&self, degree: usize) -> u8 {
        self.coefficients[self.coefficients.len() - 1 - degree]
    }

    /// Evaluates the polynomial at `a` by Horner's method.
    pub fn evaluate_at(&self, a: u8) -> u8 {
        if a == 0 {
            return self.coefficient(0);
        }

        if a == 1 {
            return self.coefficients.iter().fold(0, |acc, &c| acc ^ c);
        }

        let mut result = self.coefficients[0];
        for &c in &self.coefficients[1..] {
            result = self.field.multiply(a, result) ^ c;
        }
        result
    }

    /// Addition and subtraction coincide in GF(2^8): both are coefficient-wise XOR.
    pub fn add(&self, other: &GfPoly) -> GfPoly {
        if self.is_zero() {
            return other.clone();
        }
        if other.is_zero() {
            return self.clone();
        }

        let (smaller, larger) = if self.coefficients.len() <= other.coefficients.len() {
            (&self.coefficients, &other.coefficients)
        }
        else {
            (&other.coefficients, &self.coefficients)
        };

        let diff = larger.len() - smaller.len();
        let mut sum = larger.clone();
        for (i, &c) in smaller.iter().enumerate() {
            sum[diff + i] ^= c;
        }

        GfPoly::new(self.field, &sum)
    }

    pub fn multiply(&self, other: &GfPoly) -> GfPoly {
        if self.is_zero() || other.is_zero() {
            return GfPoly::zero(self.field);
        }

        let mut product = vec![0u8; self.coefficients.len() + other.coefficients.len() - 1];
        for (i, &a) in self.coefficients.iter().enumerate() {
            for (j, &b) in other.coefficients.iter().enumerate() {
                product[i + j] ^= self.field.multiply(a, b);
            }
        }

        GfPoly::new(self.field, &product)
    }

    pub fn multiply_scalar(&self, scalar: u8) -> GfPoly {
        if scalar == 0 {
            return GfPoly::zero(self.field);
        }
        if scalar == 1 {
            return self.clone();
        }

        let coefficients: Vec<u8> =
            self.coefficients.iter().map(|&c| self.field.multiply(c, scalar)).collect();
        GfPoly::new(self.field, &coefficients)
    }

    pub fn multiply_by_monomial(&self, degree: usize, coefficient: u8) -> GfPoly {
        if coefficient == 0 {
            return GfPoly::zero(self.field);
        }

        let mut coefficients = Vec::with_capacity(self.coefficients.len() + degree);
        for &c in &self.coefficients {
            coefficients.push(self.field.multiply(c, coefficient));
        }
        coefficients.resize(self.coefficients.len() + degree, 0);

        GfPoly::new(self.field, &coefficients)
    }

    /// Polynomial long division. Returns (quotient, remainder).
    pub fn divide(&self, other: &GfPoly) -> Result<(GfPoly, GfPoly)> {
        if other.is_zero() {
            return invalid_argument_error("divide by zero polynomial");
        }

        let mut quotient = GfPoly::zero(self.field);
        let mut remainder = self.clone();

        let denominator_leading = other.coefficient(other.degree());
        let inverse_denominator = self.field.inverse(denominator_leading);

        while remainder.degree() >= other.degree() && !remainder.is_zero() {
            let degree_difference = remainder.degree() - other.degree();
            let scale = self
                .field
                .multiply(remainder.coefficient(remainder.degree()), inverse_denominator);
            let term = self.field.monomial(degree_difference, scale);

            quotient = quotient.add(&term);
            remainder = remainder.add(&other.multiply_by_monomial(degree_difference, scale));
        }

        Ok((quotient, remainder))
    }
}

/// A systematic Reed-Solomon encoder over the QR Code field.
///
/// Generator polynomials are cached so that encoding many blocks of the same EC length builds the
/// generator once.
pub struct ReedSolomonEncoder {
    generators: Vec<GfPoly>,
}

impl Default for ReedSolomonEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReedSolomonEncoder {
    pub fn new() -> Self {
        let field = GaloisField::qr_code();
        ReedSolomonEncoder { generators: vec![GfPoly::new(field, &[1])] }
    }

    fn generator(&mut self, degree: usize) -> &GfPoly {
        let field = GaloisField::qr_code();

        while self.generators.len() <= degree {
            let d = self.generators.len();
            let last = &self.generators[d - 1];
            let next = last.multiply(&GfPoly::new(field, &[1, field.exp(d - 1)]));
            self.generators.push(next);
        }

        &self.generators[degree]
    }

    /// Computes `num_ec` EC bytes for `data`: the remainder of data * x^num_ec mod g(x).
    pub fn encode(&mut self, data: &[u8], num_ec: usize) -> Result<Vec<u8>> {
        if num_ec == 0 {
            return invalid_argument_error("no error correction bytes requested");
        }
        if data.is_empty() {
            return invalid_argument_error("no data bytes to encode");
        }

        let field = GaloisField::qr_code();
        let generator = self.generator(num_ec).clone();

        let info = GfPoly::new(field, data).multiply_by_monomial(num_ec, 1);
        let (_, remainder) = info.divide(&generator)?;

        // The remainder may have fewer than num_ec coefficients; the high ones are zero.
        let coefficients = remainder.coefficients();
        let mut ec_bytes = vec![0u8; num_ec - coefficients.len()];
        if !remainder.is_zero() {
            ec_bytes.extend_from_slice(coefficients);
        }
        else {
            ec_bytes.resize(num_ec, 0);
        }

        Ok(ec_bytes)
    }
}

/// A Reed-Solomon decoder over the QR Code field.
pub struct ReedSolomonDecoder;

impl ReedSolomonDecoder {
    /// Corrects up to `two_s / 2` byte errors in `received` in place. Returns the number of
    /// errors corrected. Fails with a checksum error when correction capacity is exceeded.
    pub fn decode(received: &mut [u8], two_s: usize) -> Result<usize> {
        let field = GaloisField::qr_code();
        let poly = GfPoly::new(field, received);

        let mut syndrome_coefficients = vec![0u8; two_s];
        let mut no_error = true;

        for i in 0..two_s {
            let eval = poly.evaluate_at(field.exp(i));
            syndrome_coefficients[two_s - 1 - i] = eval;
            if eval != 0 {
                no_error = false;
            }
        }

        if no_error {
            return Ok(0);
        }

        let syndrome = GfPoly::new(field, &syndrome_coefficients);
        let (sigma, omega) =
            run_euclidean_algorithm(field.monomial(two_s, 1), syndrome, two_s)?;

        let error_locations = find_error_locations(&sigma)?;
        let error_magnitudes = find_error_magnitudes(&omega, &error_locations);

        for (&location, &magnitude) in error_locations.iter().zip(error_magnitudes.iter()) {
            let log_location = field.log(location);
            if log_location + 1 > received.len() {
                return checksum_error("bad error location");
            }
            let position = received.len() - 1 - log_location;
            received[position] ^= magnitude;
        }

        Ok(error_locations.len())
    }
}

/// Runs the extended Euclidean algorithm on a = x^two_s and b = S(x) until the remainder degree
/// drops below two_s / 2, yielding the error locator sigma and evaluator omega.
fn run_euclidean_algorithm(a: GfPoly, b: GfPoly, two_s: usize) -> Result<(GfPoly, GfPoly)> {
    let field = GaloisField::qr_code();

    let (mut r_last, mut r) = if a.degree() < b.degree() { (b, a) } else { (a, b) };
    let mut t_last = GfPoly::zero(field);
    let mut t = GfPoly::new(field, &[1]);

    while r.degree() >= two_s / 2 {
        let r_last_last = r_last;
        let t_last_last = t_last;
        r_last = r;
        t_last = t;

        if r_last.is_zero() {
            // The syndrome vanished early: more errors than the code can describe.
            return checksum_error("error locator degenerated");
        }

        r = r_last_last;
        let mut q = GfPoly::zero(field);
        let denominator_leading = r_last.coefficient(r_last.degree());
        let inverse_denominator = field.inverse(denominator_leading);

        while r.degree() >= r_last.degree() && !r.is_zero() {
            let degree_difference = r.degree() - r_last.degree();
            let scale = field.multiply(r.coefficient(r.degree()), inverse_denominator);
            q = q.add(&field.monomial(degree_difference, scale));
            r = r.add(&r_last.multiply_by_monomial(degree_difference, scale));
        }

        t = q.multiply(&t_last).add(&t_last_last);

        if r.degree() >= r_last.degree() {
            return checksum_error("division did not reduce remainder degree");
        }
    }

    let sigma_tilde_at_zero = t.coefficient(0);
    if sigma_tilde_at_zero == 0 {
        return checksum_error("sigma(0) was zero");
    }

    let inverse = field.inverse(sigma_tilde_at_zero);
    let sigma = t.multiply_scalar(inverse);
    let omega = r.multiply_scalar(inverse);

    Ok((sigma, omega))
}

/// Chien search: brute-force roots of the error locator. The inverses of the roots are the error
/// location field elements.
fn find_error_locations(error_locator: &GfPoly) -> Result<Vec<u8>> {
    let field = GaloisField::qr_code();
    let num_errors = error_locator.degree();

    if num_errors == 1 {
        return Ok(vec![error_locator.coefficient(1)]);
    }

    let mut locations = Vec::with_capacity(num_errors);
    for i in 1..FIELD_SIZE {
        if locations.len() >= num_errors {
            break;
        }
        if error_locator.evaluate_at(i as u8) == 0 {
            locations.push(field.inverse(i as u8));
        }
    }

    if locations.len() != num_errors {
        return checksum_error("error locator degree does not match its root count");
    }

    Ok(locations)
}

/// Forney's formula for the error magnitude at each located position.
fn find_error_magnitudes(error_evaluator: &GfPoly, error_locations: &[u8]) -> Vec<u8> {
    let field = GaloisField::qr_code();
    let s = error_locations.len();
    let mut magnitudes = Vec::with_capacity(s);

    for (i, &location) in error_locations.iter().enumerate() {
        let xi_inverse = field.inverse(location);
        let mut denominator: u8 = 1;

        for (j, &other) in error_locations.iter().enumerate() {
            if i != j {
                let term = field.multiply(other, xi_inverse);
                denominator = field.multiply(denominator, term ^ 1);
            }
        }

        let magnitude = field.multiply(
            error_evaluator.evaluate_at(xi_inverse),
            field.inverse(denominator),
        );
        magnitudes.push(magnitude);
    }

    magnitudes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    #[test]
    fn verify_field_identities() {
        let field = GaloisField::qr_code();

        assert_eq!(field.exp(0), 1);
        assert_eq!(field.exp(1), 2);
        assert_eq!(field.exp(8), 0x1d);

        for a in 1..=255u8 {
            assert_eq!(field.multiply(a, field.inverse(a)), 1);
            assert_eq!(field.exp(field.log(a)), a);
        }
        assert_eq!(field.multiply(0, 5), 0);
        assert_eq!(field.multiply(7, 0), 0);
    }

    #[test]
    fn verify_ec_bytes_fixture() {
        // Version 1-H data codewords and their known 17 EC bytes.
        let data = [32, 65, 205, 69, 41, 220, 46, 128, 236];

        let mut encoder = ReedSolomonEncoder::new();
        let ec = encoder.encode(&data, 17).unwrap();

        assert_eq!(
            ec,
            vec![42, 159, 74, 221, 244, 169, 239, 150, 138, 70, 237, 85, 224, 96, 74, 219, 61]
        );
    }

    #[test]
    fn verify_decode_corrects_errors() {
        let data = [32u8, 65, 205, 69, 41, 220, 46, 128, 236];
        let mut encoder = ReedSolomonEncoder::new();
        let ec = encoder.encode(&data, 17).unwrap();

        let mut block: Vec<u8> = data.iter().chain(ec.iter()).copied().collect();

        // No errors.
        let mut clean = block.clone();
        assert_eq!(ReedSolomonDecoder::decode(&mut clean, 17).unwrap(), 0);

        // Up to floor(17 / 2) = 8 byte errors must correct.
        for (i, position) in [0usize, 3, 7, 10, 14, 18, 21, 25].iter().enumerate() {
            block[*position] ^= 0x5a_u8.wrapping_add(i as u8);
        }
        assert_eq!(ReedSolomonDecoder::decode(&mut block, 17).unwrap(), 8);
        assert_eq!(&block[..9], &data);
    }

    #[test]
    fn verify_decode_random_corruption() {
        use rand::rngs::SmallRng;
        use rand::{Rng, SeedableRng};

        let mut rng = SmallRng::seed_from_u64(0x011d);
        let mut encoder = ReedSolomonEncoder::new();

        for _ in 0..50 {
            let data_len = rng.gen_range(4..64);
            let num_ec = rng.gen_range(4..32);

            let data: Vec<u8> = (0..data_len).map(|_| rng.gen()).collect();
            let ec = encoder.encode(&data, num_ec).unwrap();
            let mut block: Vec<u8> = data.iter().chain(ec.iter()).copied().collect();

            // Corrupt up to capacity at distinct positions.
            let num_errors = rng.gen_range(0..=num_ec / 2);
            let mut positions: Vec<usize> = (0..block.len()).collect();
            for i in 0..num_errors {
                let j = rng.gen_range(i..positions.len());
                positions.swap(i, j);
                block[positions[i]] ^= rng.gen_range(1..=255u8);
            }

            let corrected = ReedSolomonDecoder::decode(&mut block, num_ec).unwrap();
            assert_eq!(corrected, num_errors);
            assert_eq!(&block[..data_len], &data[..]);
        }
    }

    #[test]
    fn verify_decode_fails_beyond_capacity() {
        let data = [32u8, 65, 205, 69, 41, 220, 46, 128, 236];
        let mut encoder = ReedSolomonEncoder::new();
        let ec = encoder.encode(&data, 17).unwrap();

        let mut block: Vec<u8> = data.iter().chain(ec.iter()).copied().collect();
        for position in 0..12 {
            block[position] ^= 0xa5;
        }

        match ReedSolomonDecoder::decode(&mut block, 17) {
            Err(Error::ChecksumError(_)) => (),
            other => panic!("expected checksum error, got {:?}", other),
        }
    }
}
