//! Crypto helpers for NCCH regions.
//!
//! ## AES-128-CTR
//!
//! The extended header, ExeFS and RomFS are each encrypted with AES-128-CTR.
//! The 128-bit counter is a big-endian integer: the region IV plus the
//! region-relative byte offset divided by 16. Any byte can be decrypted
//! without touching the bytes before it.
//!
//! ## Region IVs
//!
//! ```text
//! [0x0..0x8]  partition id, byte-reversed
//! [0x8]       region type (1 = exheader, 2 = exefs, 3 = romfs)
//! [0x9..0x10] zero
//! ```
//!
//! ## Seeds
//!
//! Seed-crypto titles mix a 16-byte per-title seed into KeyY. The header
//! stores the first four bytes of `SHA-256(seed ‖ program_id)` so a wrong
//! seed can be detected before any decryption is attempted.

use ctr::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

/// Region tag placed at byte 8 of the IV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RegionType {
    Exheader = 1,
    Exefs = 2,
    Romfs = 3,
}

/// Build the CTR IV for one region.
///
/// `partition_id` is the eight bytes exactly as stored in the header.
pub fn region_iv(partition_id: &[u8; 8], region: RegionType) -> [u8; 16] {
    let mut iv = [0u8; 16];
    for (dst, src) in iv[..8].iter_mut().zip(partition_id.iter().rev()) {
        *dst = *src;
    }
    iv[8] = region as u8;
    iv
}

/// XOR `data` with the AES-128-CTR keystream starting at byte `offset`.
///
/// The same call encrypts and decrypts.
pub fn apply_keystream(key: &[u8; 16], iv: &[u8; 16], offset: u64, data: &mut [u8]) -> Result<()> {
    let mut cipher = Aes128Ctr::new(key.into(), iv.into());
    cipher
        .try_seek(offset)
        .map_err(|_| Error::Parse("keystream position out of range"))?;
    cipher.apply_keystream(data);
    Ok(())
}

/// The four verifier bytes the header stores for `seed`.
pub fn seed_verifier(seed: &[u8; 16], program_id: u64) -> [u8; 4] {
    let digest = Sha256::new()
        .chain_update(seed)
        .chain_update(program_id.to_le_bytes())
        .finalize();
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

/// KeyY with the title seed mixed in: `SHA-256(key_y ‖ seed)[..16]`.
pub fn seeded_key_y(key_y: &[u8; 16], seed: &[u8; 16]) -> [u8; 16] {
    let digest = Sha256::new()
        .chain_update(key_y)
        .chain_update(seed)
        .finalize();
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[..16]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes<const N: usize>(s: &str) -> [u8; N] {
        let mut out = [0u8; N];
        hex::decode_to_slice(s, &mut out).unwrap();
        out
    }

    // NIST SP 800-38A, F.5.1 CTR-AES128.Encrypt
    const KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c";
    const COUNTER: &str = "f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff";
    const PLAIN: &str = "6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51";
    const CIPHER: &str = "874d6191b620e3261bef6864990db6ce9806f66b7970fdff8617187bb9fffdff";

    #[test]
    fn ctr_matches_nist_vector() {
        let mut data = hex::decode(PLAIN).unwrap();
        apply_keystream(&bytes(KEY), &bytes(COUNTER), 0, &mut data).unwrap();
        assert_eq!(hex::encode(&data), CIPHER);
    }

    #[test]
    fn ctr_seeks_to_unaligned_offsets() {
        let cipher = hex::decode(CIPHER).unwrap();
        let mut middle = cipher[7..29].to_vec();
        apply_keystream(&bytes(KEY), &bytes(COUNTER), 7, &mut middle).unwrap();
        assert_eq!(middle, hex::decode(PLAIN).unwrap()[7..29]);
    }

    #[test]
    fn iv_layout() {
        let iv = region_iv(&[1, 2, 3, 4, 5, 6, 7, 8], RegionType::Romfs);
        assert_eq!(iv, [8, 7, 6, 5, 4, 3, 2, 1, 3, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(region_iv(&[0; 8], RegionType::Exheader)[8], 1);
        assert_eq!(region_iv(&[0; 8], RegionType::Exefs)[8], 2);
    }

    #[test]
    fn seed_helpers() {
        let seed: [u8; 16] = bytes("000102030405060708090a0b0c0d0e0f");
        assert_eq!(seed_verifier(&seed, 0x0004_0000_0005_5D00), bytes("189a693b"));

        let key_y: [u8; 16] = bytes("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff");
        assert_eq!(
            seeded_key_y(&key_y, &seed),
            bytes::<16>("b92e87964e56e1bd6dff0c29cc1fbd76")
        );
    }
}
