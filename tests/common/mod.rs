//! Synthetic NCCH images for the integration tests.
//!
//! Regions are built in plaintext, hashed, the header is signed with a fixed
//! RSA-2048 test key, and only then are the regions encrypted with keys
//! derived from that signature, in the order a mastering tool works.

#![allow(dead_code)]

use ctrkit::crypto::ncch::{RegionType, apply_keystream, region_iv, seed_verifier, seeded_key_y};
use ctrkit::crypto::scrambler::scramble;
use ctrkit::crypto::sha256;
use ctrkit::keys::{self, SecretDb, SeedDb};
use rsa::{BigUint, Pkcs1v15Sign, RsaPrivateKey};
use sha2::Sha256;

pub const PROGRAM_ID: u64 = 0x0004_0000_0012_3400;
pub const PARTITION_ID: u64 = 0x0004_0000_0012_3401;
pub const SEED: [u8; 16] = *b"ctrkit-test-seed";

pub const GENERATOR: [u8; 16] = [
    0x1F, 0xF9, 0xE9, 0xAA, 0xC5, 0xFE, 0x04, 0x08, 0x02, 0x45, 0x91, 0xDC, 0x5D, 0x52, 0x76, 0x8A,
];
pub const KEY_X_0X2C: [u8; 16] = [0x2C; 16];
pub const KEY_X_0X25: [u8; 16] = [0x25; 16];
pub const KEY_X_0X18: [u8; 16] = [0x18; 16];
pub const KEY_X_0X1B: [u8; 16] = [0x1B; 16];

pub const SECTOR: usize = 0x200;
pub const EXHEADER_OFFSET: usize = 0x200;
pub const EXHEADER_SIZE: usize = 0x800;
pub const EXEFS_SECTOR: u32 = 5;
pub const EXEFS_SECTORS: u32 = 2;
pub const ROMFS_SECTOR: u32 = 7;
pub const ROMFS_SECTORS: u32 = 2;
pub const IMAGE_SIZE: usize = (ROMFS_SECTOR + ROMFS_SECTORS) as usize * SECTOR;

/// `.code` sits at the start of the ExeFS data, `icon` right after it.
pub const CODE_SIZE: usize = 0x30;
pub const ICON_OFFSET: usize = 0x40;
pub const ICON_SIZE: usize = 0x20;
pub const LEVEL3_SIZE: usize = 0x40;

const MODULUS: &[&str] = &[
    "D2E5A411C84354482C75D783EB9538E714E2600771DB707E870F0BEEEFE42303",
    "3B4EFDB16122FBAF61C5AB22CCD77C06655CA921F74A897D316CA163308DEBFF",
    "DABAA3D51D8ABB4198E55B4CFE6EA6BCB96F659F1732AF4F07808260DD7232D9",
    "196A5B380B81B2F4D606D82788841F901128FD535E46BA048BB3439B4517032E",
    "0C9BD5A71F53174868FD3C3566B82015D5BD0CBFDEE4C69DE5EA422F2385B319",
    "A16D1B6A4A7C88CA55D09AFA372AC21E805E756F163B7F5DB41BE5CF1B9AE13D",
    "A683F66E7371FA0242A082DC0A73D95F50216E43F2168E3FE049A33B777B9D63",
    "149992D5B62CF4F7EDBB5B614F8A06C64E4B3AAD9FB9B8C809A5D245D662798F",
];
const PRIME_P: &[&str] = &[
    "FD79E00C841A319C85A31773C7348545950F6E750C77C463F86B4862DF541ACB",
    "3CF57C13C97FDDBCF5AD6123484C3705E8996F23B59D4206463EA5C5082E623B",
    "74F8D6185C57612A05F6C6F4670AD8E9B7C35E3C2B9559605A8A3350F58DEBCF",
    "BC22DDC6F9EDD01146B65922632F6F62CF32E4464EBED486B3433559308F89F9",
];
const PRIME_Q: &[&str] = &[
    "D4FF3AB56B8732E9EBF2AAC20183ED733E908F8E5268F64E0CC353BC309F50BF",
    "0FB0EF9E486A89581203E3FD742EE3505C5C851BCF949A6AF011D3A91C6CB61A",
    "1CEA768BD2B03B068BB054AB2F750EBEB544EBCB777BF21A9E4401284C9B19A8",
    "BED71B0C3B7F209DDC91C45C3166E0DCE7B5A8A356E77C25A65225AE6C7641C7",
];

fn joined(parts: &[&str]) -> Vec<u8> {
    hex::decode(parts.concat()).unwrap()
}

/// Public modulus of the test signing key.
pub fn modulus() -> Vec<u8> {
    joined(MODULUS)
}

fn signing_key() -> RsaPrivateKey {
    RsaPrivateKey::from_p_q(
        BigUint::from_bytes_be(&joined(PRIME_P)),
        BigUint::from_bytes_be(&joined(PRIME_Q)),
        BigUint::from(65537u32),
    )
    .unwrap()
}

/// Every secret the decoder can ask for.
pub fn secrets() -> SecretDb {
    let mut db = SecretDb::new();
    db.set(keys::GENERATOR, GENERATOR);
    db.set(keys::KEY_X_0X2C, KEY_X_0X2C);
    db.set(keys::KEY_X_0X25, KEY_X_0X25);
    db.set(keys::KEY_X_0X18, KEY_X_0X18);
    db.set(keys::KEY_X_0X1B, KEY_X_0X1B);
    db.set(keys::PUBKEY_NCSD_CFA, modulus());
    db
}

/// A seed database holding the test title's seed.
pub fn seeds() -> SeedDb {
    let mut db = SeedDb::new();
    db.insert(PROGRAM_ID, SEED);
    db
}

pub fn code() -> Vec<u8> {
    (0..CODE_SIZE).map(|i| (i * 7 + 1) as u8).collect()
}

pub fn icon() -> Vec<u8> {
    (0..ICON_SIZE).map(|i| 0xA0 ^ i as u8).collect()
}

pub fn level3() -> Vec<u8> {
    (0..LEVEL3_SIZE).map(|i| (0xF0 - i) as u8).collect()
}

/// What to put in the image.
#[derive(Debug, Clone)]
pub struct Builder {
    pub content_type2: u8,
    pub crypto_method: u8,
    pub version: u16,
    pub exheader: bool,
    /// Encrypt the regions (ignored when the no-crypto flag is set).
    pub encrypt: bool,
    /// Leave regions in plaintext and set the no-crypto flag after signing,
    /// the way decryption tools rewrite a header.
    pub strip_crypto: bool,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            content_type2: 0,
            crypto_method: 0,
            version: 2,
            exheader: true,
            encrypt: true,
            strip_crypto: false,
        }
    }
}

/// A finished image with its plaintext regions.
pub struct Image {
    pub bytes: Vec<u8>,
    pub exheader: Vec<u8>,
    pub exefs: Vec<u8>,
    pub romfs: Vec<u8>,
}

impl Builder {
    pub fn build(&self) -> Image {
        let exheader = build_exheader();
        let exefs = build_exefs();
        let romfs = build_romfs();

        let mut image = vec![0u8; IMAGE_SIZE];
        let header = &mut image[..0x200];
        header[0x100..0x104].copy_from_slice(b"NCCH");
        header[0x104..0x108].copy_from_slice(&((IMAGE_SIZE / SECTOR) as u32).to_le_bytes());
        header[0x108..0x110].copy_from_slice(&PARTITION_ID.to_le_bytes());
        header[0x110..0x112].copy_from_slice(b"01");
        header[0x112..0x114].copy_from_slice(&self.version.to_le_bytes());
        header[0x114..0x118].copy_from_slice(&seed_verifier(&SEED, PROGRAM_ID));
        header[0x118..0x120].copy_from_slice(&PROGRAM_ID.to_le_bytes());
        header[0x150..0x15A].copy_from_slice(b"CTR-P-CTKT");
        if self.exheader {
            header[0x160..0x180].copy_from_slice(&sha256(&exheader[..0x400]));
            header[0x180..0x184].copy_from_slice(&0x400u32.to_le_bytes());
        }
        header[0x18B] = self.crypto_method;
        header[0x18C] = 1;
        header[0x18D] = if self.exheader { 0x03 } else { 0x01 };
        header[0x18F] = self.content_type2;
        put_region(header, 0x1A0, EXEFS_SECTOR, EXEFS_SECTORS);
        put_region(header, 0x1B0, ROMFS_SECTOR, ROMFS_SECTORS);
        header[0x1C0..0x1E0].copy_from_slice(&sha256(&exefs[..SECTOR]));
        header[0x1E0..0x200].copy_from_slice(&sha256(&romfs[..SECTOR]));

        let digest = sha256(&header[0x100..0x200]);
        let signature = signing_key()
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .unwrap();
        header[..0x100].copy_from_slice(&signature);

        let mut regions = (exheader.clone(), exefs.clone(), romfs.clone());
        if self.strip_crypto {
            header[0x18F] |= 0x04;
        } else if self.encrypt && self.content_type2 & 0x04 == 0 {
            self.encrypt_regions(&signature, &mut regions);
        }

        let (enc_exheader, enc_exefs, enc_romfs) = regions;
        if self.exheader {
            image[EXHEADER_OFFSET..EXHEADER_OFFSET + EXHEADER_SIZE].copy_from_slice(&enc_exheader);
        }
        let exefs_at = EXEFS_SECTOR as usize * SECTOR;
        image[exefs_at..exefs_at + enc_exefs.len()].copy_from_slice(&enc_exefs);
        let romfs_at = ROMFS_SECTOR as usize * SECTOR;
        image[romfs_at..romfs_at + enc_romfs.len()].copy_from_slice(&enc_romfs);

        Image {
            bytes: image,
            exheader,
            exefs,
            romfs,
        }
    }

    fn keys(&self, signature: &[u8]) -> ([u8; 16], [u8; 16]) {
        if self.content_type2 & 0x01 != 0 {
            return ([0; 16], [0; 16]);
        }
        let key_y: [u8; 16] = signature[..16].try_into().unwrap();
        let primary = scramble(&KEY_X_0X2C, &key_y, &GENERATOR);

        let secondary_y = if self.content_type2 & 0x20 != 0 {
            seeded_key_y(&key_y, &SEED)
        } else {
            key_y
        };
        let key_x = match self.crypto_method {
            0x01 => KEY_X_0X25,
            0x0A => KEY_X_0X18,
            0x0B => KEY_X_0X1B,
            _ => KEY_X_0X2C,
        };
        (primary, scramble(&key_x, &secondary_y, &GENERATOR))
    }

    fn encrypt_regions(&self, signature: &[u8], regions: &mut (Vec<u8>, Vec<u8>, Vec<u8>)) {
        let (primary, secondary) = self.keys(signature);
        let partition_id = PARTITION_ID.to_le_bytes();
        let (exheader, exefs, romfs) = regions;

        let iv = region_iv(&partition_id, RegionType::Exheader);
        apply_keystream(&primary, &iv, 0, exheader).unwrap();

        // Header and icon under the primary key, .code under the secondary.
        let iv = region_iv(&partition_id, RegionType::Exefs);
        let mut under_secondary = exefs.clone();
        apply_keystream(&primary, &iv, 0, exefs).unwrap();
        apply_keystream(&secondary, &iv, 0, &mut under_secondary).unwrap();
        exefs[SECTOR..SECTOR + CODE_SIZE].copy_from_slice(&under_secondary[SECTOR..SECTOR + CODE_SIZE]);

        let iv = region_iv(&partition_id, RegionType::Romfs);
        apply_keystream(&secondary, &iv, 0, romfs).unwrap();
    }
}

fn put_region(header: &mut [u8], at: usize, offset: u32, size: u32) {
    header[at..at + 4].copy_from_slice(&offset.to_le_bytes());
    header[at + 4..at + 8].copy_from_slice(&size.to_le_bytes());
    // Hash region: first sector only.
    header[at + 8..at + 12].copy_from_slice(&1u32.to_le_bytes());
}

fn build_exheader() -> Vec<u8> {
    let mut e = vec![0u8; EXHEADER_SIZE];
    e[..7].copy_from_slice(b"CtrTest");
    e[0x0D] = 0x02;
    e[0x1C..0x20].copy_from_slice(&0x4000u32.to_le_bytes());
    e[0x200..0x208].copy_from_slice(&PROGRAM_ID.to_le_bytes());
    e[0x500..0x600].copy_from_slice(&modulus());
    e
}

fn build_exefs() -> Vec<u8> {
    let mut e = vec![0u8; EXEFS_SECTORS as usize * SECTOR];
    let files = [(&b".code"[..], 0, code()), (&b"icon"[..], ICON_OFFSET, icon())];
    for (i, (name, offset, data)) in files.iter().enumerate() {
        let entry = &mut e[i * 0x10..(i + 1) * 0x10];
        entry[..name.len()].copy_from_slice(name);
        entry[8..12].copy_from_slice(&(*offset as u32).to_le_bytes());
        entry[12..16].copy_from_slice(&(data.len() as u32).to_le_bytes());

        let hash_at = 0xC0 + (9 - i) * 0x20;
        e[hash_at..hash_at + 0x20].copy_from_slice(&sha256(data));
        e[SECTOR + offset..SECTOR + offset + data.len()].copy_from_slice(data);
    }
    e
}

fn build_romfs() -> Vec<u8> {
    let mut r = vec![0u8; ROMFS_SECTORS as usize * SECTOR];
    r[..4].copy_from_slice(b"IVFC");
    r[0x04..0x08].copy_from_slice(&0x10000u32.to_le_bytes());
    r[0x08..0x0C].copy_from_slice(&0x20u32.to_le_bytes());
    r[0x44..0x4C].copy_from_slice(&(LEVEL3_SIZE as u64).to_le_bytes());
    r[0x4C..0x50].copy_from_slice(&9u32.to_le_bytes());
    r[0x200..0x200 + LEVEL3_SIZE].copy_from_slice(&level3());
    r
}
