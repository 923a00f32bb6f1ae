//! The hardware AES key scrambler.
//!
//! The console never loads "normal" keys for NCCH content directly. It
//! combines a secret KeyX, a per-title KeyY and a fixed constant `C`:
//!
//! ```text
//! normal = ROL128((ROL128(KeyX, 2) XOR KeyY) + C, 87)
//! ```
//!
//! All three inputs and the output are 128-bit big-endian integers; the
//! addition wraps modulo 2^128.

/// Derive a normal key from `key_x`, `key_y` and the scrambler constant.
pub fn scramble(key_x: &[u8; 16], key_y: &[u8; 16], key_c: &[u8; 16]) -> [u8; 16] {
    let x = u128::from_be_bytes(*key_x);
    let y = u128::from_be_bytes(*key_y);
    let c = u128::from_be_bytes(*key_c);
    ((x.rotate_left(2) ^ y).wrapping_add(c))
        .rotate_left(87)
        .to_be_bytes()
}
