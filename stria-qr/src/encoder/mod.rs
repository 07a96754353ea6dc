// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `encoder` module turns a string into a rendered QR symbol: mode selection, segment
//! encoding, version fitting, Reed-Solomon block interleaving, matrix assembly, and mask
//! selection.

pub mod mask;
pub mod matrix;

use log::debug;

use stria_core::ecc::ReedSolomonEncoder;
use stria_core::errors::{writer_error, Result};
use stria_core::io::BitBuffer;
use stria_core::matrix::{BitMatrix, ByteMatrix};
use stria_core::options::EncodeOptions;

use crate::eci::CharacterSet;
use crate::ecl::EcLevel;
use crate::mode::Mode;
use crate::version::Version;

/// Maps an ASCII code to its value in the 45-character alphanumeric set, or -1.
const ALPHANUMERIC_TABLE: [i8; 96] = [
    -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, // 0x00-0x0f
    -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, // 0x10-0x1f
    36, -1, -1, -1, 37, 38, -1, -1, -1, -1, 39, 40, -1, 41, 42, 43, // 0x20-0x2f
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 44, -1, -1, -1, -1, -1, // 0x30-0x3f
    -1, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, // 0x40-0x4f
    25, 26, 27, 28, 29, 30, 31, 32, 33, 34, 35, -1, -1, -1, -1, -1, // 0x50-0x5f
];

/// A fully encoded QR symbol and the parameters that shaped it.
pub struct QrCode {
    pub mode: Mode,
    pub ec_level: EcLevel,
    pub version: u32,
    pub matrix_width: usize,
    pub mask_pattern: u32,
    pub num_total_bytes: usize,
    pub num_data_bytes: usize,
    pub num_ec_bytes: usize,
    pub num_rs_blocks: usize,
    pub matrix: ByteMatrix,
}

impl QrCode {
    /// The symbol as a plain bit matrix, dark modules set.
    pub fn render(&self) -> Result<BitMatrix> {
        self.matrix.to_bit_matrix()
    }
}

/// The alphanumeric value of `c`, or -1 when `c` is outside the 45-character set.
pub fn get_alphanumeric_code(c: char) -> i8 {
    let code = u32::from(c);
    if code < ALPHANUMERIC_TABLE.len() as u32 {
        ALPHANUMERIC_TABLE[code as usize]
    }
    else {
        -1
    }
}

/// Selects the densest mode able to carry `content`.
///
/// Kanji is only chosen when the caller explicitly requested Shift JIS and the content is
/// entirely double-byte: Shift JIS cannot be detected reliably from an arbitrary string, so a
/// generic string never selects it.
pub fn choose_mode(content: &str, charset: Option<&CharacterSet>) -> Mode {
    if matches!(charset, Some(cs) if *cs == CharacterSet::shift_jis())
        && is_only_double_byte_kanji(content)
    {
        return Mode::Kanji;
    }

    let mut has_numeric = false;
    let mut has_alphanumeric = false;

    for c in content.chars() {
        if c.is_ascii_digit() {
            has_numeric = true;
        }
        else if get_alphanumeric_code(c) >= 0 {
            has_alphanumeric = true;
        }
        else {
            return Mode::Byte;
        }
    }

    if has_alphanumeric {
        return Mode::Alphanumeric;
    }
    if has_numeric {
        return Mode::Numeric;
    }

    Mode::Byte
}

fn is_only_double_byte_kanji(content: &str) -> bool {
    let bytes = match CharacterSet::shift_jis().encode(content) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    if content.is_empty() || bytes.len() % 2 != 0 {
        return false;
    }

    for pair in bytes.chunks_exact(2) {
        let lead = pair[0];
        if !(0x81..=0x9f).contains(&lead) && !(0xe0..=0xeb).contains(&lead) {
            return false;
        }
    }

    true
}

/// Encodes `content` at `ec_level` into a `QrCode`.
pub fn encode(content: &str, ec_level: EcLevel, options: &EncodeOptions) -> Result<QrCode> {
    let charset = match options.character_set.as_deref() {
        Some(name) => Some(CharacterSet::from_name(name)?),
        None => None,
    };

    let mode = choose_mode(content, charset.as_ref());

    // Encode the payload first: the header's width depends on the version, which in turn depends
    // on the payload size.
    let mut data_bits = BitBuffer::new();
    append_content(content, mode, charset.as_ref(), &mut data_bits)?;

    let num_letters =
        if mode == Mode::Byte { data_bits.len_bytes() } else { content.chars().count() };

    let version = choose_version(data_bits.len(), num_letters, mode, ec_level)?;
    let ec_blocks = version.ec_blocks(ec_level);

    let num_data_bytes = ec_blocks.num_data_codewords();
    let num_total_bytes = version.total_codewords();

    let mut header_and_data_bits = BitBuffer::new();
    header_and_data_bits.append_bits(mode.bits(), 4)?;
    append_length_info(num_letters, version, mode, &mut header_and_data_bits)?;
    header_and_data_bits.append_buffer(&data_bits);

    terminate_bits(num_data_bytes, &mut header_and_data_bits)?;

    let final_bits = interleave_with_ec_bytes(
        &header_and_data_bits,
        num_total_bytes,
        num_data_bytes,
        ec_blocks.num_blocks(),
    )?;

    let dimension = version.dimension();
    let mut matrix = ByteMatrix::new(dimension, dimension);
    let mask_pattern = choose_mask_pattern(&final_bits, ec_level, version, &mut matrix)?;

    matrix::build_matrix(&final_bits, ec_level, version, mask_pattern, &mut matrix)?;

    debug!(
        "encoded {} letters as {} v{}-{} mask {}",
        num_letters,
        mode.bits(),
        version.number(),
        ec_level,
        mask_pattern
    );

    Ok(QrCode {
        mode,
        ec_level,
        version: version.number(),
        matrix_width: dimension,
        mask_pattern,
        num_total_bytes,
        num_data_bytes,
        num_ec_bytes: num_total_bytes - num_data_bytes,
        num_rs_blocks: ec_blocks.num_blocks(),
        matrix,
    })
}

/// The smallest version whose data capacity at `ec_level` holds the header and payload. The
/// header width varies with the version band, so each candidate version is sized with its own
/// header.
fn choose_version(
    num_payload_bits: usize,
    num_letters: usize,
    mode: Mode,
    ec_level: EcLevel,
) -> Result<&'static Version> {
    for number in 1..=40 {
        let version = Version::get(number)?;

        let count_bits = mode.character_count_bits(number);
        if count_bits < usize::BITS as usize && num_letters >= (1 << count_bits) {
            continue;
        }

        let total_bits = 4 + count_bits + num_payload_bits;
        // Capacity is compared in whole bytes, and the bit count must round up.
        let num_bytes = (total_bits + 7) / 8;

        if num_bytes <= version.ec_blocks(ec_level).num_data_codewords() {
            return Ok(version);
        }
    }

    writer_error("content does not fit any version at this EC level")
}

/// Appends the character count indicator for the chosen version band.
fn append_length_info(
    num_letters: usize,
    version: &Version,
    mode: Mode,
    bits: &mut BitBuffer,
) -> Result<()> {
    let num_bits = mode.character_count_bits(version.number());

    if num_letters >= (1 << num_bits) {
        return writer_error("content length exceeds the count indicator range");
    }

    bits.append_bits(num_letters as u32, num_bits)
}

fn append_content(
    content: &str,
    mode: Mode,
    charset: Option<&CharacterSet>,
    bits: &mut BitBuffer,
) -> Result<()> {
    match mode {
        Mode::Numeric => append_numeric(content, bits),
        Mode::Alphanumeric => append_alphanumeric(content, bits),
        Mode::Byte => append_bytes(content, charset, bits),
        Mode::Kanji => append_kanji(content, bits),
        _ => writer_error("mode cannot carry content"),
    }
}

/// Digits in groups of three as 10 bits; a trailing pair as 7 bits; a trailing digit as 4.
fn append_numeric(content: &str, bits: &mut BitBuffer) -> Result<()> {
    let mut digits = Vec::with_capacity(content.len());
    for c in content.chars() {
        match c.to_digit(10) {
            Some(digit) => digits.push(digit),
            None => return writer_error("numeric mode requires digits"),
        }
    }

    let mut chunks = digits.chunks_exact(3);
    for chunk in &mut chunks {
        bits.append_bits(chunk[0] * 100 + chunk[1] * 10 + chunk[2], 10)?;
    }

    match chunks.remainder() {
        [a, b] => bits.append_bits(a * 10 + b, 7)?,
        [a] => bits.append_bits(*a, 4)?,
        _ => (),
    }

    Ok(())
}

/// Character pairs as 11 bits (45 * first + second); a trailing character as 6 bits.
fn append_alphanumeric(content: &str, bits: &mut BitBuffer) -> Result<()> {
    let mut codes = Vec::with_capacity(content.len());
    for c in content.chars() {
        let code = get_alphanumeric_code(c);
        if code < 0 {
            return writer_error("character outside the alphanumeric set");
        }
        codes.push(code as u32);
    }

    let mut chunks = codes.chunks_exact(2);
    for chunk in &mut chunks {
        bits.append_bits(chunk[0] * 45 + chunk[1], 11)?;
    }

    if let [last] = chunks.remainder() {
        bits.append_bits(*last, 6)?;
    }

    Ok(())
}

/// Bytes of the chosen character set, 8 bits each. ISO-8859-1 unless the caller asked otherwise.
fn append_bytes(
    content: &str,
    charset: Option<&CharacterSet>,
    bits: &mut BitBuffer,
) -> Result<()> {
    let charset = charset.copied().unwrap_or(CharacterSet::Latin1);
    let bytes = charset.encode(content)?;

    for byte in bytes {
        bits.append_bits(u32::from(byte), 8)?;
    }

    Ok(())
}

/// Shift JIS double-byte characters packed to 13 bits each.
fn append_kanji(content: &str, bits: &mut BitBuffer) -> Result<()> {
    let bytes = CharacterSet::shift_jis().encode(content)?;

    if bytes.is_empty() || bytes.len() % 2 != 0 {
        return writer_error("kanji mode requires double-byte content");
    }

    for pair in bytes.chunks_exact(2) {
        let code = (u32::from(pair[0]) << 8) | u32::from(pair[1]);
        let subtracted = if (0x8140..=0x9ffc).contains(&code) {
            code - 0x8140
        }
        else if (0xe040..=0xebbf).contains(&code) {
            code - 0xc140
        }
        else {
            return writer_error("byte pair outside the kanji ranges");
        };

        let encoded = (subtracted >> 8) * 0xc0 + (subtracted & 0xff);
        bits.append_bits(encoded, 13)?;
    }

    Ok(())
}

/// Appends the terminator and pad bytes to fill the symbol's data capacity: up to 4 zero bits,
/// zeros to the next byte boundary, then alternating 0xec and 0x11.
pub fn terminate_bits(num_data_bytes: usize, bits: &mut BitBuffer) -> Result<()> {
    let capacity = num_data_bytes * 8;

    if bits.len() > capacity {
        return writer_error("data bits exceed symbol capacity");
    }

    for _ in 0..4 {
        if bits.len() >= capacity {
            break;
        }
        bits.append_bit(0);
    }

    // Pad the final partial byte with zeros.
    let num_bits_in_last_byte = bits.len() & 7;
    if num_bits_in_last_byte > 0 {
        for _ in num_bits_in_last_byte..8 {
            bits.append_bit(0);
        }
    }

    let num_padding_bytes = num_data_bytes - bits.len_bytes();
    for i in 0..num_padding_bytes {
        bits.append_bits(if i % 2 == 0 { 0xec } else { 0x11 }, 8)?;
    }

    if bits.len() != capacity {
        return writer_error("bits do not fill symbol capacity");
    }

    Ok(())
}

/// Data and EC byte counts for block `block_id`. Blocks in the second group, when the division is
/// uneven, hold one extra data byte each.
fn block_layout(
    num_total_bytes: usize,
    num_data_bytes: usize,
    num_rs_blocks: usize,
    block_id: usize,
) -> Result<(usize, usize)> {
    let num_rs_blocks_in_group2 = num_total_bytes % num_rs_blocks;
    let num_rs_blocks_in_group1 = num_rs_blocks - num_rs_blocks_in_group2;

    let num_total_bytes_in_group1 = num_total_bytes / num_rs_blocks;
    let num_total_bytes_in_group2 = num_total_bytes_in_group1 + 1;

    let num_data_bytes_in_group1 = num_data_bytes / num_rs_blocks;
    let num_data_bytes_in_group2 = num_data_bytes_in_group1 + 1;

    let num_ec_bytes_in_group1 = num_total_bytes_in_group1 - num_data_bytes_in_group1;
    let num_ec_bytes_in_group2 = num_total_bytes_in_group2 - num_data_bytes_in_group2;

    if num_ec_bytes_in_group1 != num_ec_bytes_in_group2 {
        return writer_error("EC byte counts differ between block groups");
    }
    if num_rs_blocks
        != num_rs_blocks_in_group1 + num_rs_blocks_in_group2
    {
        return writer_error("RS block count mismatch");
    }
    if num_total_bytes
        != (num_data_bytes_in_group1 + num_ec_bytes_in_group1) * num_rs_blocks_in_group1
            + (num_data_bytes_in_group2 + num_ec_bytes_in_group2) * num_rs_blocks_in_group2
    {
        return writer_error("total byte count mismatch");
    }

    if block_id < num_rs_blocks_in_group1 {
        Ok((num_data_bytes_in_group1, num_ec_bytes_in_group1))
    }
    else {
        Ok((num_data_bytes_in_group2, num_ec_bytes_in_group2))
    }
}

/// Splits the data codewords into RS blocks, computes each block's EC bytes, and interleaves
/// both column-wise: byte 0 of every block, then byte 1 of every block, and so on, skipping
/// blocks whose data ran out early.
pub fn interleave_with_ec_bytes(
    bits: &BitBuffer,
    num_total_bytes: usize,
    num_data_bytes: usize,
    num_rs_blocks: usize,
) -> Result<BitBuffer> {
    if bits.len_bytes() != num_data_bytes {
        return writer_error("bit length does not match data byte count");
    }

    let bytes = bits.as_bytes();
    let mut rs_encoder = ReedSolomonEncoder::new();

    let mut data_bytes_offset = 0;
    let mut max_num_data_bytes = 0;
    let mut max_num_ec_bytes = 0;
    let mut blocks: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(num_rs_blocks);

    for block_id in 0..num_rs_blocks {
        let (num_data_bytes_in_block, num_ec_bytes_in_block) =
            block_layout(num_total_bytes, num_data_bytes, num_rs_blocks, block_id)?;

        let data = bytes[data_bytes_offset..data_bytes_offset + num_data_bytes_in_block].to_vec();
        let ec = rs_encoder.encode(&data, num_ec_bytes_in_block)?;

        max_num_data_bytes = max_num_data_bytes.max(data.len());
        max_num_ec_bytes = max_num_ec_bytes.max(ec.len());
        data_bytes_offset += num_data_bytes_in_block;

        blocks.push((data, ec));
    }

    if data_bytes_offset != num_data_bytes {
        return writer_error("data bytes not fully consumed");
    }

    let mut result = BitBuffer::new();

    for i in 0..max_num_data_bytes {
        for (data, _) in &blocks {
            if i < data.len() {
                result.append_bits(u32::from(data[i]), 8)?;
            }
        }
    }
    for i in 0..max_num_ec_bytes {
        for (_, ec) in &blocks {
            if i < ec.len() {
                result.append_bits(u32::from(ec[i]), 8)?;
            }
        }
    }

    if result.len_bytes() != num_total_bytes {
        return writer_error("interleaving produced the wrong byte count");
    }

    Ok(result)
}

/// Builds the symbol under each of the eight masks and keeps the one with the lowest penalty.
fn choose_mask_pattern(
    bits: &BitBuffer,
    ec_level: EcLevel,
    version: &Version,
    matrix: &mut ByteMatrix,
) -> Result<u32> {
    let mut min_penalty = u32::MAX;
    let mut best_pattern = 0;

    for pattern in 0..8 {
        matrix::build_matrix(bits, ec_level, version, pattern, matrix)?;
        let penalty = mask::calculate_mask_penalty(matrix);
        if penalty < min_penalty {
            min_penalty = penalty;
            best_pattern = pattern;
        }
    }

    Ok(best_pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_choose_mode() {
        assert_eq!(choose_mode("0123456789", None), Mode::Numeric);
        assert_eq!(choose_mode("ABC123", None), Mode::Alphanumeric);
        assert_eq!(choose_mode("HELLO WORLD $%*+-./:", None), Mode::Alphanumeric);
        assert_eq!(choose_mode("hello", None), Mode::Byte);
        assert_eq!(choose_mode("ABC#", None), Mode::Byte);
        assert_eq!(choose_mode("", None), Mode::Byte);
        // Kanji is never chosen without the explicit charset.
        assert_eq!(choose_mode("\u{6f22}\u{5b57}", None), Mode::Byte);
        let sjis = CharacterSet::shift_jis();
        assert_eq!(choose_mode("\u{6f22}\u{5b57}", Some(&sjis)), Mode::Kanji);
        assert_eq!(choose_mode("a\u{6f22}", Some(&sjis)), Mode::Byte);
    }

    #[test]
    fn verify_alphanumeric_table() {
        assert_eq!(get_alphanumeric_code('0'), 0);
        assert_eq!(get_alphanumeric_code('9'), 9);
        assert_eq!(get_alphanumeric_code('A'), 10);
        assert_eq!(get_alphanumeric_code('Z'), 35);
        assert_eq!(get_alphanumeric_code(' '), 36);
        assert_eq!(get_alphanumeric_code('$'), 37);
        assert_eq!(get_alphanumeric_code('%'), 38);
        assert_eq!(get_alphanumeric_code('*'), 39);
        assert_eq!(get_alphanumeric_code('+'), 40);
        assert_eq!(get_alphanumeric_code('-'), 41);
        assert_eq!(get_alphanumeric_code('.'), 42);
        assert_eq!(get_alphanumeric_code('/'), 43);
        assert_eq!(get_alphanumeric_code(':'), 44);
        assert_eq!(get_alphanumeric_code('a'), -1);
        assert_eq!(get_alphanumeric_code('#'), -1);
        assert_eq!(get_alphanumeric_code('\u{1f600}'), -1);
    }

    #[test]
    fn verify_numeric_bit_packing() {
        let mut bits = BitBuffer::new();
        append_numeric("0123", &mut bits).unwrap();
        // 012 as ten bits, then 3 as four bits.
        assert_eq!(bits.to_string(), "00000011000011");
    }

    #[test]
    fn verify_alphanumeric_bit_packing() {
        let mut bits = BitBuffer::new();
        append_alphanumeric("AC-42", &mut bits).unwrap();
        // AC = 10*45+12 = 462, -4 = 41*45+4 = 1849, 2 = 2.
        assert_eq!(bits.to_string(), "0011100111011100111001000010");
    }

    #[test]
    fn verify_terminate_bits() {
        let mut bits = BitBuffer::new();
        terminate_bits(0, &mut bits).unwrap();
        assert_eq!(bits.to_string(), "");

        let mut bits = BitBuffer::new();
        terminate_bits(1, &mut bits).unwrap();
        assert_eq!(bits.to_string(), "00000000");

        let mut bits = BitBuffer::new();
        terminate_bits(2, &mut bits).unwrap();
        assert_eq!(bits.to_string(), "0000000011101100");

        let mut bits = BitBuffer::new();
        bits.append_bit(0);
        terminate_bits(3, &mut bits).unwrap();
        assert_eq!(bits.to_string(), "000000001110110000010001");
    }

    #[test]
    fn verify_interleave_single_block() {
        // Version 1-H: 26 total, 9 data, 1 block. Interleaving a single block is data then EC.
        let data = [32u8, 65, 205, 69, 41, 220, 46, 128, 236];
        let mut bits = BitBuffer::new();
        for &byte in &data {
            bits.append_bits(u32::from(byte), 8).unwrap();
        }

        let out = interleave_with_ec_bytes(&bits, 26, 9, 1).unwrap();
        let expected: Vec<u8> = data
            .iter()
            .copied()
            .chain([42, 159, 74, 221, 244, 169, 239, 150, 138, 70, 237, 85, 224, 96, 74, 219, 61])
            .collect();
        assert_eq!(out.as_bytes(), &expected[..]);
    }

    #[test]
    fn verify_interleave_multiple_blocks() {
        // Version 3-H: 70 total, 26 data, 2 blocks of 13 + 22.
        let mut bits = BitBuffer::new();
        for i in 0..26u32 {
            bits.append_bits(i, 8).unwrap();
        }

        let out = interleave_with_ec_bytes(&bits, 70, 26, 2).unwrap();
        let bytes = out.as_bytes();

        assert_eq!(out.len_bytes(), 70);
        // Column-wise data interleave: block0[0], block1[0], block0[1], ...
        assert_eq!(bytes[0], 0);
        assert_eq!(bytes[1], 13);
        assert_eq!(bytes[2], 1);
        assert_eq!(bytes[3], 14);
        assert_eq!(bytes[24], 12);
        assert_eq!(bytes[25], 25);
    }

    #[test]
    fn verify_encode_fixture() {
        let qr = encode("ABCDEF", EcLevel::H, &EncodeOptions::default()).unwrap();

        assert_eq!(qr.mode, Mode::Alphanumeric);
        assert_eq!(qr.ec_level, EcLevel::H);
        assert_eq!(qr.version, 1);
        assert_eq!(qr.matrix_width, 21);
        assert_eq!(qr.mask_pattern, 0);
        assert_eq!(qr.num_total_bytes, 26);
        assert_eq!(qr.num_data_bytes, 9);
        assert_eq!(qr.num_ec_bytes, 17);
        assert_eq!(qr.num_rs_blocks, 1);

        let bits = qr.render().unwrap();
        assert_eq!(bits.width(), 21);
        // Finder corners are dark under every mask.
        assert!(bits.get(0, 0));
        assert!(bits.get(20, 0));
        assert!(bits.get(0, 20));
    }

    #[test]
    fn verify_encode_too_long_fails() {
        // 8000 digits exceed even version 40-L capacity.
        let content: String = std::iter::repeat('7').take(8000).collect();
        assert!(encode(&content, EcLevel::L, &EncodeOptions::default()).is_err());
    }

    #[test]
    fn verify_version_fitting_rounds_up() {
        // Version 1-H holds 9 data bytes = 72 bits. An alphanumeric payload needing 66 payload
        // bits plus the 13-bit header is 79 bits = 10 bytes after rounding up, so it must spill
        // to version 2 rather than truncate down to 9.
        let twelve = "AAAAAAAAAAAA";
        let qr = encode(twelve, EcLevel::H, &EncodeOptions::default()).unwrap();
        assert_eq!(qr.version, 2);
    }
}
