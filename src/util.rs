//! Bit and byte plumbing shared by every decoder.
//!
//! All bit offsets are big-endian: bit 0 is the most significant bit of byte 0, which is
//! how both the OV-chip layouts and the HSL/CEPAS field tables number them.
use byteorder::{BigEndian, ByteOrder};
use std::fmt;

use crate::Result;

/// Extracts `length` bits starting at `start_bit` as an unsigned integer.
///
/// # Panics
///
/// If the span runs past the end of `buffer`, or `length` is more than 64.
pub fn get_bits(buffer: &[u8], start_bit: usize, length: usize) -> u64 {
    assert!(length <= 64, "can't extract {} bits into a u64", length);
    if length == 0 {
        return 0;
    }

    let end_bit = start_bit + length - 1;
    let (start_byte, start_off) = (start_bit / 8, start_bit % 8);
    let (end_byte, end_off) = (end_bit / 8, end_bit % 8);

    if start_byte == end_byte {
        let v = u64::from(buffer[end_byte] >> (7 - end_off));
        return v & (0xFF >> (8 - length));
    }

    // Low bits of the first byte, whole middle bytes, then the top of the last byte.
    let mut value = u64::from(buffer[start_byte] & (0xFF >> start_off));
    for b in &buffer[start_byte + 1..end_byte] {
        value = (value << 8) | u64::from(*b);
    }
    (value << (end_off + 1)) | u64::from(buffer[end_byte] >> (7 - end_off))
}

/// Inverse of [`get_bits`]; overwrites `length` bits at `start_bit` with the low bits of `value`.
///
/// # Panics
///
/// Same conditions as [`get_bits`].
pub fn set_bits(buffer: &mut [u8], start_bit: usize, length: usize, value: u64) {
    assert!(length <= 64, "can't insert {} bits from a u64", length);
    for i in 0..length {
        let bit = start_bit + i;
        let mask = 0x80 >> (bit % 8);
        if (value >> (length - 1 - i)) & 1 == 1 {
            buffer[bit / 8] |= mask;
        } else {
            buffer[bit / 8] &= !mask;
        }
    }
}

/// Extracts `length` bits starting at bit `start` (counted from the LSB) of an integer.
pub fn get_bits_from_int(value: u64, start: u32, length: u32) -> u64 {
    (value >> start) & ((1u64 << length) - 1)
}

/// Recovers a signed value from a two's complement field whose sign bit is `highest_bit`.
pub fn to_signed_twos_complement(value: u64, highest_bit: u32) -> i64 {
    debug_assert!(highest_bit < 63);
    if (value >> highest_bit) & 1 == 0 {
        return value as i64;
    }
    let inverted = value ^ ((2u64 << highest_bit) - 1);
    -(1 + inverted as i64)
}

/// Decodes a single packed BCD byte, eg. 0x42 -> 42.
pub fn bcd_to_int(b: u8) -> u32 {
    u32::from((b >> 4) & 0x0F) * 10 + u32::from(b & 0x0F)
}

/// Reads a big-endian unsigned integer of 1-8 bytes. An empty slice reads as 0.
///
/// # Panics
///
/// If `data` is longer than 8 bytes.
pub fn be_uint(data: &[u8]) -> u64 {
    match data.len() {
        0 => 0,
        n => BigEndian::read_uint(data, n),
    }
}

/// Reads a big-endian signed integer of 1-8 bytes, sign-extended from its top bit.
pub fn be_int(data: &[u8]) -> i64 {
    match data.len() {
        0 => 0,
        n => BigEndian::read_int(data, n),
    }
}

/// Walks a bit-packed record field by field.
///
/// OV-chip records announce which fields are present in a leading bitmask; the cursor
/// lets decoders consume those fields in order without tracking offsets by hand.
#[derive(Debug, Clone)]
pub struct BitCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitCursor<'a> {
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn read(&mut self, length: usize) -> u64 {
        let v = get_bits(self.data, self.pos, length);
        self.pos += length;
        v
    }

    /// Reads the field only if its presence bit is set.
    pub fn read_if(&mut self, present: bool, length: usize) -> Option<u64> {
        present.then(|| self.read(length))
    }

    pub fn skip(&mut self, length: usize) {
        self.pos += length;
    }
}

/// An owned, immutable chunk of card data.
#[derive(Default, Clone, PartialEq, Eq, Hash)]
pub struct ByteArray(Vec<u8>);

impl ByteArray {
    pub fn from_hex(s: &str) -> Result<Self> {
        Ok(Self(hex::decode(s)?))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn get_bits(&self, start_bit: usize, length: usize) -> u64 {
        get_bits(&self.0, start_bit, length)
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl std::ops::Deref for ByteArray {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for ByteArray {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for ByteArray {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl From<&[u8]> for ByteArray {
    fn from(v: &[u8]) -> Self {
        Self(v.to_vec())
    }
}

impl fmt::Debug for ByteArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteArray({})", hex::encode_upper(&self.0))
    }
}

impl fmt::Display for ByteArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(&self.0))
    }
}
