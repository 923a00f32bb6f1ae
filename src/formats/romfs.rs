//! IVFC hash tree at the start of a RomFS.
//!
//! ## Layout
//! ```text
//! [0x00] Magic "IVFC"                      (4 bytes)
//! [0x04] MagicId (0x10000)                 (u32 LE)
//! [0x08] MasterHashSize                    (u32 LE)
//! [0x0C] Level 1: Offset (u64), Size (u64), BlockSize log2 (u32), Reserved (u32)
//! [0x24] Level 2: same
//! [0x3C] Level 3: same
//! [0x54] Reserved                          (4 bytes)
//! [0x58] OptionalInfoSize                  (u32 LE)
//! [0x60] Master hash                       (MasterHashSize bytes)
//! ```
//!
//! Level 3 holds the actual file system. It starts at the first multiple of
//! its block size at or after the end of the master hash.

use crate::container::Container;
use crate::container::field::{Kind, derived, field};
use crate::container::node::node;
use crate::source::{self, SourceRef};
use crate::utils::align_up;
use crate::{Error, Result};

pub const MAGIC: [u8; 4] = *b"IVFC";

const MASTER_HASH_OFFSET: u64 = 0x60;

const FIELDS: &[(&str, u64, Kind)] = &[
    ("Magic", 0x00, Kind::Bytes(4)),
    ("MagicId", 0x04, Kind::U32),
    ("MasterHashSize", 0x08, Kind::U32),
    ("Level1Offset", 0x0C, Kind::U64),
    ("Level1Size", 0x14, Kind::U64),
    ("Level1BlockSize", 0x1C, Kind::U32),
    ("Level2Offset", 0x24, Kind::U64),
    ("Level2Size", 0x2C, Kind::U64),
    ("Level2BlockSize", 0x34, Kind::U32),
    ("Level3Offset", 0x3C, Kind::U64),
    ("Level3Size", 0x44, Kind::U64),
    ("Level3BlockSize", 0x4C, Kind::U32),
];

/// Build the IVFC container over a plaintext RomFS view.
///
/// Fails with [`Error::BadMagic`] if the view does not start with `IVFC`.
pub fn open(source: SourceRef) -> Result<Container> {
    let c = Container::new(source);
    c.install_list(
        FIELDS
            .iter()
            .map(|&(name, offset, kind)| field(name, offset, kind)),
    );
    if c.get::<Vec<u8>>("Magic")? != MAGIC {
        return Err(Error::BadMagic);
    }

    c.install_list([
        derived("MasterHash", |c| {
            let size = u64::from(c.get::<u32>("MasterHashSize")?);
            Ok(node(source::window(c.source(), MASTER_HASH_OFFSET, size)))
        }),
        derived("Level3", |c| {
            let start = level3_offset(
                c.get::<u32>("MasterHashSize")?,
                c.get::<u32>("Level3BlockSize")?,
            )?;
            let size = c.get::<u64>("Level3Size")?;
            Ok(node(source::window(c.source(), start, size)))
        }),
    ]);
    Ok(c)
}

/// Offset of level 3 relative to the IVFC header.
pub fn level3_offset(master_hash_size: u32, block_size_log2: u32) -> Result<u64> {
    let block = 1u64
        .checked_shl(block_size_log2)
        .ok_or(Error::Parse("IVFC block size out of range"))?;
    align_up(MASTER_HASH_OFFSET + u64::from(master_hash_size), block)
}
