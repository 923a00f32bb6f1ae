//! Secret and seed providers.
//!
//! NCCH decryption needs two kinds of external material:
//!
//! * **Secrets** - console-wide constants looked up by name: the KeyX for
//!   each crypto method, the key scrambler constant and the CFA/NCSD header
//!   public key. They are obtained from the console's boot ROM and are never
//!   shipped with this library.
//! * **Seeds** - 16-byte per-title values needed by seed-crypto titles,
//!   looked up by program id.
//!
//! The decoder only depends on the [`SecretProvider`] and [`SeedProvider`]
//! traits. [`SecretDb`] and [`SeedDb`] are the file-backed implementations.
//!
//! ## Secrets file format
//! One `name = hex_value` entry per line; lines starting with `;` or `#` and
//! blank lines are ignored:
//!
//! ```text
//! ; scrambler constant
//! generator = 1FF9E9AAC5FE0408024591DC5D52768A
//! slot0x2CKeyX = ...
//! ```

use std::collections::HashMap;
use std::fmt;
use std::io::{BufRead, BufReader, Read};

use log::{debug, trace};

use crate::utils::{bytesa, le_u32, le_u64};
use crate::{Error, Result};

/// KeyX for the primary key and for crypto method 0x00.
pub const KEY_X_0X2C: &str = "slot0x2CKeyX";
/// KeyX for crypto method 0x01 (7.x).
pub const KEY_X_0X25: &str = "slot0x25KeyX";
/// KeyX for crypto method 0x0A (New 3DS 9.3).
pub const KEY_X_0X18: &str = "slot0x18KeyX";
/// KeyX for crypto method 0x0B (New 3DS 9.6).
pub const KEY_X_0X1B: &str = "slot0x1BKeyX";
/// Key scrambler constant `C`.
pub const GENERATOR: &str = "generator";
/// RSA-2048 modulus that signs CFA and NCSD headers.
pub const PUBKEY_NCSD_CFA: &str = "ncsdCfaPublicKey";

/// Human-readable description of every secret name the library consults.
pub const SECRET_DESCRIPTIONS: &[(&str, &str)] = &[
    (
        KEY_X_0X2C,
        "Primary NCCH encryption key. Every encrypted NCCH except fixed-key ones needs it.",
    ),
    (
        KEY_X_0X25,
        "Secondary key for 7.x (crypto method 0x01) NCCH.",
    ),
    (
        KEY_X_0X18,
        "Secondary key for New 3DS 9.3 (crypto method 0x0A) NCCH.",
    ),
    (
        KEY_X_0X1B,
        "Secondary key for New 3DS 9.6 (crypto method 0x0B) NCCH.",
    ),
    (
        GENERATOR,
        "Constant of the AES key scrambler. Needed for every scrambled key.",
    ),
    (
        PUBKEY_NCSD_CFA,
        "Public key for verifying NCSD and CFA header signatures.",
    ),
];

/// Look up the description of a well-known secret.
pub fn describe(name: &str) -> Option<&'static str> {
    SECRET_DESCRIPTIONS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, d)| *d)
}

/// Why key material for a region cannot be produced.
///
/// This is the recoverable side of key handling: the decoder turns it into
/// the text of a `…Error` field and keeps every other field readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyIssue {
    /// A secret is absent or not 16 bytes long.
    MissingSecret(&'static str),
    /// The title needs a seed and the seed provider has none.
    SeedNotFound,
    /// The provided seed does not match the header's verifier.
    SeedIncorrect,
}

impl fmt::Display for KeyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyIssue::MissingSecret(name) => f.write_str(name),
            KeyIssue::SeedNotFound => f.write_str("seed not found"),
            KeyIssue::SeedIncorrect => f.write_str("seed not correct"),
        }
    }
}

/// Named secret lookup.
pub trait SecretProvider {
    fn secret(&self, name: &str) -> Option<&[u8]>;

    /// Fetch a 16-byte AES key.
    ///
    /// An entry of any other length counts as missing.
    fn aes_key(&self, name: &'static str) -> std::result::Result<[u8; 16], KeyIssue> {
        self.secret(name)
            .and_then(|bytes| <[u8; 16]>::try_from(bytes).ok())
            .ok_or(KeyIssue::MissingSecret(name))
    }
}

/// Per-title seed lookup.
pub trait SeedProvider {
    fn seed(&self, program_id: u64) -> Option<[u8; 16]>;
}

/// In-memory secret store.
#[derive(Debug, Default, Clone)]
pub struct SecretDb {
    entries: HashMap<String, Vec<u8>>,
}

impl SecretDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.entries.remove(name)
    }

    /// Names of all stored secrets, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Load `name = hex` entries from a reader.
    ///
    /// Lines that do not parse are skipped so one bad line does not hide the
    /// rest of the file. Later entries replace earlier ones.
    pub fn load<R: Read>(&mut self, reader: R) -> Result<()> {
        let buf = BufReader::new(reader);
        for line in buf.lines() {
            let line = line.map_err(Error::Io)?;
            let Some((name, value)) = entry(&line) else {
                continue;
            };
            match hex::decode(value) {
                Ok(bytes) => {
                    trace!("secret {name}: {} bytes", bytes.len());
                    self.entries.insert(name.to_owned(), bytes);
                }
                Err(e) => debug!("skipping secret {name}: {e}"),
            }
        }
        Ok(())
    }
}

impl SecretProvider for SecretDb {
    fn secret(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }
}

/// In-memory seed store keyed by program id.
#[derive(Debug, Default, Clone)]
pub struct SeedDb {
    seeds: HashMap<u64, [u8; 16]>,
}

impl SeedDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, program_id: u64, seed: [u8; 16]) {
        self.seeds.insert(program_id, seed);
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    /// Load a console `seeddb.bin`.
    ///
    /// ```text
    /// [0x00] EntryCount   (u32 LE)
    /// [0x04] Reserved     (0xC bytes)
    /// [0x10] Entries      (EntryCount × 0x20 bytes)
    ///
    /// Entry:
    /// [0x00] ProgramId    (u64 LE)
    /// [0x08] Seed         (0x10 bytes)
    /// [0x18] Reserved     (8 bytes)
    /// ```
    pub fn load_seeddb<R: Read>(&mut self, mut reader: R) -> Result<()> {
        let r = &mut reader;
        let count = le_u32(r)?;
        let _reserved = bytesa::<0xC>(r)?;
        for _ in 0..count {
            let program_id = le_u64(r)?;
            let seed = bytesa::<0x10>(r)?;
            let _reserved = bytesa::<0x8>(r)?;
            self.seeds.insert(program_id, seed);
        }
        debug!("loaded {count} seeds");
        Ok(())
    }

    /// Load `program_id = hex_seed` lines (program id in hex).
    pub fn load_text<R: Read>(&mut self, reader: R) -> Result<()> {
        let buf = BufReader::new(reader);
        for line in buf.lines() {
            let line = line.map_err(Error::Io)?;
            let Some((id, value)) = entry(&line) else {
                continue;
            };
            let id = id.trim_start_matches("0x").trim_start_matches("0X");
            let mut seed = [0u8; 16];
            if let Ok(program_id) = u64::from_str_radix(id, 16)
                && hex::decode_to_slice(value, &mut seed).is_ok()
            {
                self.seeds.insert(program_id, seed);
            } else {
                debug!("skipping seed line for {id}");
            }
        }
        Ok(())
    }
}

impl SeedProvider for SeedDb {
    fn seed(&self, program_id: u64) -> Option<[u8; 16]> {
        self.seeds.get(&program_id).copied()
    }
}

/// Split a `name = value` line, skipping comments and blanks.
fn entry(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
        return None;
    }
    let (name, value) = line.split_once('=')?;
    Some((name.trim(), value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRETS: &str = "\
; scrambler constant
generator = 1FF9E9AAC5FE0408024591DC5D52768A
# short entry
slot0x25KeyX = 0011
slot0x2CKeyX=000102030405060708090a0b0c0d0e0f
broken = zz
no equals sign
";

    #[test]
    fn loads_secret_lines() {
        let mut db = SecretDb::new();
        db.load(SECRETS.as_bytes()).unwrap();

        assert_eq!(db.names(), [GENERATOR, KEY_X_0X25, KEY_X_0X2C]);
        assert_eq!(db.secret(GENERATOR).unwrap()[0], 0x1F);
        assert_eq!(
            db.aes_key(KEY_X_0X2C),
            Ok([0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15])
        );
    }

    #[test]
    fn wrong_length_is_missing() {
        let mut db = SecretDb::new();
        db.load(SECRETS.as_bytes()).unwrap();
        assert_eq!(db.aes_key(KEY_X_0X25), Err(KeyIssue::MissingSecret(KEY_X_0X25)));
        assert_eq!(db.aes_key(KEY_X_0X18), Err(KeyIssue::MissingSecret(KEY_X_0X18)));
        assert_eq!(KeyIssue::MissingSecret(KEY_X_0X18).to_string(), "slot0x18KeyX");
    }

    #[test]
    fn loads_seeddb_bin() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&2u32.to_le_bytes());
        raw.extend_from_slice(&[0; 0xC]);
        for (id, fill) in [(0x0004_0000_0011_2233u64, 0xAA), (0x0004_0000_0044_5566, 0xBB)] {
            raw.extend_from_slice(&id.to_le_bytes());
            raw.extend_from_slice(&[fill; 0x10]);
            raw.extend_from_slice(&[0; 8]);
        }

        let mut db = SeedDb::new();
        db.load_seeddb(raw.as_slice()).unwrap();
        assert_eq!(db.len(), 2);
        assert_eq!(db.seed(0x0004_0000_0044_5566), Some([0xBB; 16]));
        assert_eq!(db.seed(0x0004_0000_0000_0000), None);
    }

    #[test]
    fn truncated_seeddb_fails() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&1u32.to_le_bytes());
        raw.extend_from_slice(&[0; 0xC]);
        raw.extend_from_slice(&[0; 0x10]);
        assert!(SeedDb::new().load_seeddb(raw.as_slice()).is_err());
    }

    #[test]
    fn loads_seed_text() {
        let mut db = SeedDb::new();
        db.load_text("0x000400000FF3FF00 = 00112233445566778899AABBCCDDEEFF\n".as_bytes())
            .unwrap();
        assert_eq!(db.seed(0x0004_0000_0FF3_FF00).unwrap()[15], 0xFF);
        assert!(describe(GENERATOR).is_some());
    }
}
