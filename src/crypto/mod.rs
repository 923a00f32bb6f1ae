//! Cryptographic building blocks for 3DS content.
//!
//! All functions take already-loaded key material; looking keys up by name is
//! the job of [`crate::keys`]. Block cipher, digest and RSA primitives come
//! from the RustCrypto crates (`aes` + `ctr`, `sha2`, `rsa`); this module only
//! arranges bytes the way the console does.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`scrambler`] | KeyX/KeyY/constant → normal key (hardware key scrambler) |
//! | [`ncch`] | AES-128-CTR keystream, per-region IVs, seed verifier and seeded KeyY |
//!
//! ## Key hierarchy (brief)
//!
//! ```text
//! secrets file
//!   ├── generator (scrambler constant C)
//!   ├── slot0x2CKeyX ───────────────┐
//!   └── slot0x25/18/1BKeyX ──┐      │
//!                            │      │  scramble(X, Y, C)
//! NCCH signature[0..16] = KeyY ─────┴──► primary normal key   (exheader, exefs icon/banner)
//!     └── SHA-256(KeyY ‖ seed)[..16] ──► secondary normal key (exefs code, romfs)
//! ```

pub mod ncch;
pub mod scrambler;

use sha2::{Digest, Sha256};

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}
