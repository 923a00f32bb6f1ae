//! NCCH - the 3DS content container (CXI executables, CFA archives).
//!
//! ## Layout
//! ```text
//! [0x000] RSA-2048 signature over [0x100..0x200]      (0x100 bytes)
//!         bytes 0x000..0x010 double as the title KeyY
//! [0x100] Magic "NCCH"                                (4 bytes)
//! [0x104] ContentSize (media units)                   (u32 LE)
//! [0x108] PartitionId                                 (u64 LE)
//! [0x110] MakerCode                                   (u16 LE)
//! [0x112] Version                                     (u16 LE)
//! [0x114] SeedVerifier = SHA-256(seed ‖ ProgramId)[..4]
//! [0x118] ProgramId                                   (u64 LE)
//! [0x150] ProductCode                                 (0x10 bytes)
//! [0x160] SHA-256 of the extended header hash region  (0x20 bytes)
//! [0x180] ExheaderHashRegionSize (bytes, 0 = absent)  (u32 LE)
//! [0x188] Flags[8]: [3] CryptoMethod, [4] Platform,
//!                   [5] ContentTypeFlags, [7] ContentType2
//! [0x190] PlainRegion  offset / size                  (media units)
//! [0x198] LogoRegion   offset / size                  (media units)
//! [0x1A0] ExeFS        offset / size / hash region    (media units)
//! [0x1B0] RomFS        offset / size / hash region    (media units)
//! [0x1C0] SHA-256 of the ExeFS hash region            (0x20 bytes)
//! [0x1E0] SHA-256 of the RomFS hash region            (0x20 bytes)
//! [0x200] Extended header (encrypted, 0x800 bytes) if present
//! ```
//!
//! One media unit is [`SECTOR`] bytes. A region is present iff its offset is
//! non-zero.
//!
//! ## Fields
//! [`Ncch::open`] installs every header scalar above by name plus derived
//! flags (`IsData`, `IsExecutable`, `ContentType`, `IsFixedKeyCrypto`,
//! `IsNoRomfsMount`, `IsNoCrypto`, `IsSeedCrypto`), `SeedStatus`,
//! `IsForceNoCrypto`, `IsDecrypted`, and the `Signature` /
//! `SignaturePatched` checks. For each present region it installs a
//! `…Error` text field and, when the region can be decrypted:
//!
//! | Region | Views | Children | Checks |
//! |--------|-------|----------|--------|
//! | exheader | - | `Exheader` | `ExheaderHash` |
//! | exefs | `ExefsPrimary`, `ExefsSecondary` | `Exefs` | `ExefsHash` |
//! | romfs | `Romfs` | `Ivfc` | `RomfsHash` |
//!
//! ## Keys
//! The primary key (exheader, ExeFS icon/banner, ExeFS hash region) always
//! uses KeyX 0x2C. The secondary key (remaining ExeFS files, RomFS) picks its
//! KeyX from the crypto method and, for seed-crypto titles, mixes the seed
//! into KeyY. Fixed-key titles use an all-zero key.

use std::ops::Deref;
use std::rc::Rc;

use log::{debug, warn};

use super::{exefs, exheader, romfs};
use crate::container::field::{constant, derived, field, flag};
use crate::container::node::{node, value};
use crate::container::{Container, Derivation, FromNode, Kind, Node, NodeRef};
use crate::crypto::ncch::{RegionType, region_iv, seed_verifier, seeded_key_y};
use crate::crypto::scrambler::scramble;
use crate::keys::{self, KeyIssue, SecretProvider, SeedProvider};
use crate::source::{self, Buffer, Patch, Source, SourceRef};
use crate::verify::Check;
use crate::{Error, Result};

/// Media unit for region offsets and sizes.
pub const SECTOR: u64 = 0x200;

const SIGNATURE_SIZE: u64 = 0x100;
const HEADER_OFFSET: u64 = 0x100;
const HEADER_SIZE: u64 = 0x100;
const PARTITION_ID_OFFSET: u64 = 0x108;
/// `ContentType2` relative to the signed header block.
const CONTENT_TYPE2_IN_HEADER: u64 = 0x8F;
const EXHEADER_OFFSET: u64 = 0x200;
const EXHEADER_SIZE: u64 = 0x800;
const EXHEADER_HASH_OFFSET: u64 = 0x160;
const EXEFS_HASH_OFFSET: u64 = 0x1C0;
const ROMFS_HASH_OFFSET: u64 = 0x1E0;
const HASH_SIZE: u64 = 0x20;

const FIXED_KEY_CRYPTO: u8 = 0x01;
const NO_ROMFS_MOUNT: u8 = 0x02;
const NO_CRYPTO: u8 = 0x04;
const SEED_CRYPTO: u8 = 0x20;

/// Placeholder for the system fixed key, which is not handled yet.
const FIXED_KEY: [u8; 16] = [0; 16];

const HEADER_FIELDS: &[(&str, u64, Kind)] = &[
    ("Magic", 0x100, Kind::Bytes(4)),
    ("ContentSize", 0x104, Kind::U32),
    ("PartitionId", 0x108, Kind::U64),
    ("MakerCode", 0x110, Kind::U16),
    ("Version", 0x112, Kind::U16),
    ("SeedVerifier", 0x114, Kind::U32),
    ("ProgramId", 0x118, Kind::U64),
    ("ProductCode", 0x150, Kind::Bytes(0x10)),
    ("ExheaderHashRegionSize", 0x180, Kind::U32),
    ("CryptoMethod", 0x18B, Kind::U8),
    ("Platform", 0x18C, Kind::U8),
    ("ContentTypeFlags", 0x18D, Kind::U8),
    ("ContentType2", 0x18F, Kind::U8),
    ("PlainRegionOffset", 0x190, Kind::U32),
    ("PlainRegionSize", 0x194, Kind::U32),
    ("LogoRegionOffset", 0x198, Kind::U32),
    ("LogoRegionSize", 0x19C, Kind::U32),
    ("ExefsOffset", 0x1A0, Kind::U32),
    ("ExefsSize", 0x1A4, Kind::U32),
    ("ExefsHashRegionSize", 0x1A8, Kind::U32),
    ("RomfsOffset", 0x1B0, Kind::U32),
    ("RomfsSize", 0x1B4, Kind::U32),
    ("RomfsHashRegionSize", 0x1B8, Kind::U32),
];

/// Whether the title seed is needed and usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SeedStatus {
    /// Not a seed-crypto title.
    NotNeeded = 0,
    /// Seed present and matches the header verifier.
    Found = 1,
    /// Seed-crypto title with no seed available.
    NotFound = 2,
    /// A seed was found but does not match the verifier.
    Incorrect = 3,
}

impl TryFrom<u8> for SeedStatus {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::NotNeeded),
            1 => Ok(Self::Found),
            2 => Ok(Self::NotFound),
            3 => Ok(Self::Incorrect),
            _ => Err(Error::Parse("invalid seed status")),
        }
    }
}

impl FromNode for SeedStatus {
    fn from_node(node: &Node) -> Result<Self> {
        Self::try_from(u8::from_node(node)?)
    }
}

/// Which KeyX the secondary key is scrambled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CryptoMethod {
    /// Original crypto; secondary key equals the primary key.
    Original = 0x00,
    /// 7.x crypto.
    Secure2 = 0x01,
    /// New 3DS 9.3 crypto.
    Secure3 = 0x0A,
    /// New 3DS 9.6 crypto.
    Secure4 = 0x0B,
}

impl CryptoMethod {
    /// Secret name of the KeyX this method uses.
    pub fn key_x(self) -> &'static str {
        match self {
            Self::Original => keys::KEY_X_0X2C,
            Self::Secure2 => keys::KEY_X_0X25,
            Self::Secure3 => keys::KEY_X_0X18,
            Self::Secure4 => keys::KEY_X_0X1B,
        }
    }
}

impl TryFrom<u8> for CryptoMethod {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self> {
        match v {
            0x00 => Ok(Self::Original),
            0x01 => Ok(Self::Secure2),
            0x0A => Ok(Self::Secure3),
            0x0B => Ok(Self::Secure4),
            _ => Err(Error::UnknownCryptoMethod(v)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Primary,
    Secondary,
}

/// An opened NCCH.
///
/// Dereferences to its root [`Container`]; every field listed in the module
/// docs is opened through it.
#[derive(Debug)]
pub struct Ncch {
    container: Container,
    seed_status: SeedStatus,
    force_no_crypto: bool,
}

impl Ncch {
    /// Decode the header of `source` and install every field.
    ///
    /// Only the header block is read here (plus four bytes of the RomFS to
    /// detect force-no-crypto); regions are decrypted on demand. Missing
    /// keys or seeds never fail this call.
    pub fn open(
        source: SourceRef,
        secrets: Rc<dyn SecretProvider>,
        seeds: &dyn SeedProvider,
    ) -> Result<Self> {
        let container = Container::new(source);
        container.install_list(
            HEADER_FIELDS
                .iter()
                .map(|&(name, offset, kind)| field(name, offset, kind)),
        );
        container.install_list([
            flag("IsData", "ContentTypeFlags", 0x01),
            flag("IsExecutable", "ContentTypeFlags", 0x02),
            derived("ContentType", |c| {
                Ok(value(c.get::<u8>("ContentTypeFlags")? >> 2))
            }),
            flag("IsFixedKeyCrypto", "ContentType2", FIXED_KEY_CRYPTO),
            flag("IsNoRomfsMount", "ContentType2", NO_ROMFS_MOUNT),
            flag("IsNoCrypto", "ContentType2", NO_CRYPTO),
            flag("IsSeedCrypto", "ContentType2", SEED_CRYPTO),
        ]);

        let (seed_status, seed) = init_seed(&container, seeds)?;
        let force_no_crypto = check_force_no_crypto(&container)?;
        debug!(
            "ncch {:016X}: seed {seed_status:?}, force-no-crypto {force_no_crypto}",
            container.get::<u64>("ProgramId")?
        );

        let crypto = Rc::new(Crypto {
            secrets,
            seed,
            seed_status,
            force_no_crypto,
        });
        let decrypted = Rc::clone(&crypto);
        container.install_list([
            constant("SeedStatus", seed_status as u8),
            constant("IsForceNoCrypto", force_no_crypto),
            derived("IsDecrypted", move |c| Ok(value(decrypted.is_decrypted(c)?))),
        ]);

        install_signatures(&container, &crypto)?;
        install_exheader(&container, &crypto)?;
        install_exefs(&container, &crypto)?;
        install_romfs(&container, &crypto)?;

        Ok(Self {
            container,
            seed_status,
            force_no_crypto,
        })
    }

    pub fn seed_status(&self) -> SeedStatus {
        self.seed_status
    }

    /// The header claims encryption but the RomFS is stored in plaintext.
    pub fn is_force_no_crypto(&self) -> bool {
        self.force_no_crypto
    }
}

impl Deref for Ncch {
    type Target = Container;

    fn deref(&self) -> &Container {
        &self.container
    }
}

fn init_seed(
    c: &Container,
    seeds: &dyn SeedProvider,
) -> Result<(SeedStatus, Option<[u8; 16]>)> {
    if !c.get::<bool>("IsSeedCrypto")? {
        return Ok((SeedStatus::NotNeeded, None));
    }

    let program_id = c.get::<u64>("ProgramId")?;
    let Some(seed) = seeds.seed(program_id) else {
        debug!("no seed for {program_id:016X}");
        return Ok((SeedStatus::NotFound, None));
    };

    let stored = c.get::<u32>("SeedVerifier")?.to_le_bytes();
    if seed_verifier(&seed, program_id) != stored {
        debug!("seed for {program_id:016X} fails verification");
        return Ok((SeedStatus::Incorrect, None));
    }
    Ok((SeedStatus::Found, Some(seed)))
}

/// Some tools strip encryption without clearing the header flag; the RomFS
/// then starts with a plaintext IVFC magic.
fn check_force_no_crypto(c: &Container) -> Result<bool> {
    if c.get::<bool>("IsNoCrypto")? || c.get::<u32>("RomfsOffset")? == 0 {
        return Ok(false);
    }
    let raw = raw_region(c, "RomfsOffset", "RomfsSize")?;
    match raw.read_array::<4>(0) {
        Ok(magic) => Ok(magic == romfs::MAGIC),
        Err(e) => {
            debug!("cannot probe romfs magic: {e}");
            Ok(false)
        }
    }
}

fn raw_region(c: &Container, offset: &str, size: &str) -> Result<SourceRef> {
    let offset = u64::from(c.get::<u32>(offset)?) * SECTOR;
    let size = u64::from(c.get::<u32>(size)?) * SECTOR;
    Ok(source::window(c.source(), offset, size))
}

/// Key state shared by the derivations of one NCCH.
struct Crypto {
    secrets: Rc<dyn SecretProvider>,
    seed: Option<[u8; 16]>,
    seed_status: SeedStatus,
    force_no_crypto: bool,
}

impl Crypto {
    fn is_decrypted(&self, c: &Container) -> Result<bool> {
        Ok(self.force_no_crypto || c.get::<bool>("IsNoCrypto")?)
    }

    fn primary_issue(&self, c: &Container) -> Result<Option<KeyIssue>> {
        if c.get::<bool>("IsFixedKeyCrypto")? {
            return Ok(None);
        }
        Ok(self
            .secrets
            .aes_key(keys::GENERATOR)
            .and(self.secrets.aes_key(keys::KEY_X_0X2C))
            .err())
    }

    fn secondary_issue(&self, c: &Container) -> Result<Option<KeyIssue>> {
        if c.get::<bool>("IsFixedKeyCrypto")? {
            return Ok(None);
        }
        match self.seed_status {
            SeedStatus::NotFound => return Ok(Some(KeyIssue::SeedNotFound)),
            SeedStatus::Incorrect => return Ok(Some(KeyIssue::SeedIncorrect)),
            SeedStatus::NotNeeded | SeedStatus::Found => {}
        }
        if let Err(issue) = self.secrets.aes_key(keys::GENERATOR) {
            return Ok(Some(issue));
        }
        let method = CryptoMethod::try_from(c.get::<u8>("CryptoMethod")?)?;
        Ok(self.secrets.aes_key(method.key_x()).err())
    }

    fn exheader_issue(&self, c: &Container) -> Result<Option<KeyIssue>> {
        if self.is_decrypted(c)? {
            return Ok(None);
        }
        self.primary_issue(c)
    }

    fn exefs_issue(&self, c: &Container) -> Result<Option<KeyIssue>> {
        if self.is_decrypted(c)? {
            return Ok(None);
        }
        match self.primary_issue(c)? {
            Some(issue) => Ok(Some(issue)),
            None => self.secondary_issue(c),
        }
    }

    fn romfs_issue(&self, c: &Container) -> Result<Option<KeyIssue>> {
        if self.is_decrypted(c)? {
            return Ok(None);
        }
        self.secondary_issue(c)
    }

    fn secret(&self, name: &'static str) -> Result<[u8; 16]> {
        self.secrets
            .aes_key(name)
            .map_err(|issue| Error::KeyUnavailable(issue.to_string()))
    }

    fn normal_key(&self, c: &Container, key: Key) -> Result<[u8; 16]> {
        if c.get::<bool>("IsFixedKeyCrypto")? {
            return Ok(FIXED_KEY);
        }
        let mut key_y = c.source().read_array::<16>(0)?;
        let key_x = match key {
            Key::Primary => keys::KEY_X_0X2C,
            Key::Secondary => {
                if let Some(seed) = &self.seed {
                    key_y = seeded_key_y(&key_y, seed);
                }
                CryptoMethod::try_from(c.get::<u8>("CryptoMethod")?)?.key_x()
            }
        };
        Ok(scramble(
            &self.secret(key_x)?,
            &key_y,
            &self.secret(keys::GENERATOR)?,
        ))
    }

    fn iv(&self, c: &Container, region: RegionType) -> Result<[u8; 16]> {
        let version = c.get::<u16>("Version")?;
        if version == 1 {
            return Err(Error::UnsupportedIvVersion(version));
        }
        let partition_id = c.source().read_array::<8>(PARTITION_ID_OFFSET)?;
        Ok(region_iv(&partition_id, region))
    }

    fn view(&self, c: &Container, raw: SourceRef, key: Key, region: RegionType) -> Result<SourceRef> {
        if self.is_decrypted(c)? {
            return Ok(raw);
        }
        let iv = self.iv(c, region)?;
        let key = self.normal_key(c, key)?;
        Ok(source::aes_ctr(&raw, key, iv))
    }

    fn exheader(&self, c: &Container) -> Result<SourceRef> {
        let raw = source::window(c.source(), EXHEADER_OFFSET, EXHEADER_SIZE);
        self.view(c, raw, Key::Primary, RegionType::Exheader)
    }

    fn exefs(&self, c: &Container, key: Key) -> Result<SourceRef> {
        let raw = raw_region(c, "ExefsOffset", "ExefsSize")?;
        self.view(c, raw, key, RegionType::Exefs)
    }

    fn romfs(&self, c: &Container) -> Result<SourceRef> {
        let raw = raw_region(c, "RomfsOffset", "RomfsSize")?;
        self.view(c, raw, Key::Secondary, RegionType::Romfs)
    }

    /// Modulus that verifies the header signature.
    ///
    /// CXIs carry it in their exheader; CFAs use the console-wide key. An
    /// exheader that cannot be decrypted yields an empty key, which fails
    /// verification.
    fn signature_key(&self, c: &Container) -> Result<SourceRef> {
        if c.get::<u32>("ExheaderHashRegionSize")? == 0 {
            let key = self
                .secrets
                .secret(keys::PUBKEY_NCSD_CFA)
                .unwrap_or_default();
            return Ok(source::buffer(key));
        }
        if self.exheader_issue(c)?.is_some() {
            return Ok(source::buffer(Vec::new()));
        }
        c.open("Exheader")?
            .as_container()?
            .get::<SourceRef>("NcchSignaturePublicKey")
    }
}

type IssueFn = fn(&Crypto, &Container) -> Result<Option<KeyIssue>>;

/// `…Error` field: empty when the region decrypts, otherwise the reason.
fn issue_field(name: &str, crypto: &Rc<Crypto>, issue: IssueFn) -> (String, Derivation) {
    let crypto = Rc::clone(crypto);
    derived(name, move |c| {
        let text = issue(&crypto, c)?.map(|i| i.to_string()).unwrap_or_default();
        Ok(value(text))
    })
}

/// Whether a region's views should be installed.
fn decryptable(region: &str, issue: Result<Option<KeyIssue>>) -> bool {
    match issue {
        Ok(None) => true,
        Ok(Some(issue)) => {
            debug!("{region} not decryptable: {issue}");
            false
        }
        Err(e) => {
            warn!("{region} key classification failed: {e}");
            false
        }
    }
}

fn hash_check(c: &Container, view: &str, hashed: u64, stored_at: u64) -> Result<NodeRef> {
    let view: SourceRef = c.get(view)?;
    Ok(node(Check::sha256(
        source::window(&view, 0, hashed),
        source::window(c.source(), stored_at, HASH_SIZE),
    )))
}

fn hashed_sectors(c: &Container, field: &str) -> Result<u64> {
    Ok(u64::from(c.get::<u32>(field)?) * SECTOR)
}

fn install_signatures(c: &Container, crypto: &Rc<Crypto>) -> Result<()> {
    let header = source::window(c.source(), HEADER_OFFSET, HEADER_SIZE);
    let patched = patched_header(&header)?;
    let signature = source::window(c.source(), 0, SIGNATURE_SIZE);
    c.install_list([
        signature_check("Signature", header, Rc::clone(&signature), crypto),
        signature_check("SignaturePatched", patched, signature, crypto),
    ]);
    Ok(())
}

fn signature_check(
    name: &str,
    data: SourceRef,
    signature: SourceRef,
    crypto: &Rc<Crypto>,
) -> (String, Derivation) {
    let crypto = Rc::clone(crypto);
    derived(name, move |c| {
        let key = crypto.signature_key(c)?;
        Ok(node(Check::rsa(Rc::clone(&data), Rc::clone(&signature), key)))
    })
}

/// The header with the no-crypto bit cleared.
///
/// Decryption tools set that bit in place without re-signing, so a header
/// that fails verification as stored may still verify in this form.
fn patched_header(header: &SourceRef) -> Result<SourceRef> {
    let mut flags = Buffer::from(header.read(CONTENT_TYPE2_IN_HEADER, 1)?);
    flags[0] &= !NO_CRYPTO;
    let patch = Patch::new(Rc::clone(header), CONTENT_TYPE2_IN_HEADER, flags)?;
    Ok(Source::from(patch).into_ref())
}

fn install_exheader(c: &Container, crypto: &Rc<Crypto>) -> Result<()> {
    let hash_region_size = u64::from(c.get::<u32>("ExheaderHashRegionSize")?);
    if hash_region_size == 0 {
        return Ok(());
    }

    c.install_list([issue_field("ExheaderError", crypto, Crypto::exheader_issue)]);
    if !decryptable("exheader", crypto.exheader_issue(c)) {
        return Ok(());
    }

    let open = Rc::clone(crypto);
    let hash = Rc::clone(crypto);
    c.install_list([
        derived("Exheader", move |c| {
            Ok(node(exheader::open(open.exheader(c)?)))
        }),
        derived("ExheaderHash", move |c| {
            let data = source::window(&hash.exheader(c)?, 0, hash_region_size);
            let stored = source::window(c.source(), EXHEADER_HASH_OFFSET, HASH_SIZE);
            Ok(node(Check::sha256(data, stored)))
        }),
    ]);
    Ok(())
}

fn install_exefs(c: &Container, crypto: &Rc<Crypto>) -> Result<()> {
    if c.get::<u32>("ExefsOffset")? == 0 {
        return Ok(());
    }

    c.install_list([issue_field("ExefsError", crypto, Crypto::exefs_issue)]);
    if !decryptable("exefs", crypto.exefs_issue(c)) {
        return Ok(());
    }

    let primary = Rc::clone(crypto);
    let secondary = Rc::clone(crypto);
    c.install_list([
        derived("ExefsPrimary", move |c| {
            Ok(node(primary.exefs(c, Key::Primary)?))
        }),
        derived("ExefsSecondary", move |c| {
            Ok(node(secondary.exefs(c, Key::Secondary)?))
        }),
        derived("Exefs", |c| {
            let exefs = exefs::open(c.get("ExefsPrimary")?, c.get("ExefsSecondary")?)?;
            Ok(node(exefs))
        }),
        derived("ExefsHash", |c| {
            let hashed = hashed_sectors(c, "ExefsHashRegionSize")?;
            hash_check(c, "ExefsPrimary", hashed, EXEFS_HASH_OFFSET)
        }),
    ]);
    Ok(())
}

fn install_romfs(c: &Container, crypto: &Rc<Crypto>) -> Result<()> {
    if c.get::<u32>("RomfsOffset")? == 0 {
        return Ok(());
    }

    c.install_list([issue_field("RomfsError", crypto, Crypto::romfs_issue)]);
    if !decryptable("romfs", crypto.romfs_issue(c)) {
        return Ok(());
    }

    let view = Rc::clone(crypto);
    c.install_list([
        derived("Romfs", move |c| Ok(node(view.romfs(c)?))),
        derived("Ivfc", |c| Ok(node(romfs::open(c.get("Romfs")?)?))),
        derived("RomfsHash", |c| {
            let hashed = hashed_sectors(c, "RomfsHashRegionSize")?;
            hash_check(c, "Romfs", hashed, ROMFS_HASH_OFFSET)
        }),
    ]);
    Ok(())
}
