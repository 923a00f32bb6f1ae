//! Low-level parsing primitives shared by the loaders and sub-container
//! decoders.
//!
//! Each reader function consumes exactly the bytes it promises or returns an
//! error - there is no partial-read ambiguity.

use std::io::Read;

use crate::{Error, Result};

/// Read a little-endian `u32`.
#[inline]
pub(crate) fn le_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

/// Read a little-endian `u64`.
#[inline]
pub(crate) fn le_u64<R: Read>(r: &mut R) -> Result<u64> {
    let mut b = [0u8; 8];
    r.read_exact(&mut b)?;
    Ok(u64::from_le_bytes(b))
}

/// Read exactly `N` bytes into a fixed-size array.
#[inline]
pub(crate) fn bytesa<const N: usize>(r: &mut impl Read) -> Result<[u8; N]> {
    let mut b = [0u8; N];
    r.read_exact(&mut b)?;
    Ok(b)
}

/// Decode a NUL-padded fixed-width name (ExeFS file names, titles).
///
/// Everything from the first NUL on is dropped.
#[inline]
pub(crate) fn padded_string(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// Round `value` up to a multiple of the power-of-two `align`.
///
/// Returns [`Error::Parse`] if the result does not fit a `u64`.
#[inline]
pub(crate) fn align_up(value: u64, align: u64) -> Result<u64> {
    debug_assert!(align.is_power_of_two());
    value
        .checked_add(align - 1)
        .map(|v| v & !(align - 1))
        .ok_or(Error::Parse("aligned offset overflows"))
}
