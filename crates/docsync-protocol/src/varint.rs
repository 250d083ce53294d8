//! Unsigned LEB128 variable-length integers.
//!
//! Every integer on the sync wire is a varint: 7 data bits per byte,
//! least-significant group first, with the high bit set on every byte
//! except the last. Small numbers (message tags, short lengths) take a
//! single byte.
//!
//! ```text
//! 300 = 0b1_0010_1100
//!     → [0b1010_1100, 0b0000_0010]
//!         ^ more follows  ^ last byte
//! ```

use crate::ProtocolError;

/// The longest valid encoding of a `u64`: ceil(64 / 7) bytes.
pub const MAX_VARINT_LEN: usize = 10;

/// Appends the varint encoding of `value` to `buf`.
pub fn write_var_uint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Decodes a varint from the front of `data`.
///
/// Returns the value and the number of bytes consumed, so callers can
/// slice past it: `let (tag, n) = read_var_uint(buf)?; let rest = &buf[n..];`
///
/// # Errors
/// - [`ProtocolError::TruncatedVarint`] if `data` runs out before a byte
///   with the high bit clear.
/// - [`ProtocolError::VarintOverflow`] if the encoding needs more than
///   [`MAX_VARINT_LEN`] bytes or its 10th byte carries more than the one
///   remaining bit of a `u64`.
pub fn read_var_uint(data: &[u8]) -> Result<(u64, usize), ProtocolError> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;

    for (i, &byte) in data.iter().enumerate() {
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            return Err(ProtocolError::VarintOverflow);
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte < 0x80 {
            return Ok((value, i + 1));
        }
        shift += 7;
    }

    Err(ProtocolError::TruncatedVarint(data.len()))
}

/// Returns how many bytes [`write_var_uint`] emits for `value`.
pub fn var_uint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}
