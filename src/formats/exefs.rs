//! ExeFS - the executable file system inside an NCCH.
//!
//! ## Layout
//! ```text
//! [0x000] File headers   (10 × 0x10 bytes)
//! [0x0A0] Reserved       (0x20 bytes)
//! [0x0C0] File hashes    (10 × 0x20 bytes, stored in reverse order:
//!                         the hash of file i lives at 0xC0 + (9 - i) × 0x20)
//! [0x200] File data
//! ```
//!
//! ## File Header (0x10 bytes)
//! ```text
//! [0x00] Name     NUL-padded ASCII (8 bytes)
//! [0x08] Offset   relative to the data start (u32 LE)
//! [0x0C] Size     in bytes (u32 LE)
//! ```
//!
//! ## Keys
//! In an encrypted NCCH the header block, `icon` and `banner` are encrypted
//! with the primary key; every other file with the secondary key. Each file
//! appears under its name, with a `<name>Hash` check next to it. A slot whose
//! name or hash name is already taken is skipped.

use std::io::Cursor;
use std::rc::Rc;

use log::{debug, trace};

use crate::Result;
use crate::container::Container;
use crate::container::field::{constant, derived};
use crate::container::node::node;
use crate::source::{self, SourceRef};
use crate::utils::{bytesa, le_u32, padded_string};
use crate::verify::Check;

/// Size of the header block; file data starts right after it.
pub const HEADER_SIZE: u64 = 0x200;
/// Number of file slots.
pub const MAX_FILES: usize = 10;

const HASHES_OFFSET: u64 = 0xC0;
const HASH_SIZE: u64 = 0x20;

/// Files that stay under the primary key.
const PRIMARY_FILES: [&str; 2] = ["icon", "banner"];

/// One used slot of the file table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExefsFile {
    pub name: String,
    pub offset: u32,
    pub size: u32,
    /// Position in the file table.
    pub index: usize,
}

/// Parse the used slots of the file table in `header`.
pub fn files(header: &[u8]) -> Result<Vec<ExefsFile>> {
    let mut r = Cursor::new(header);
    let mut files = Vec::new();
    for index in 0..MAX_FILES {
        let name = padded_string(&bytesa::<8>(&mut r)?);
        let offset = le_u32(&mut r)?;
        let size = le_u32(&mut r)?;
        if name.is_empty() {
            continue;
        }
        files.push(ExefsFile {
            name,
            offset,
            size,
            index,
        });
    }
    Ok(files)
}

/// Build the ExeFS container.
///
/// `primary` and `secondary` are the whole region viewed under each key;
/// they are the same source when the NCCH is not encrypted.
pub fn open(primary: SourceRef, secondary: SourceRef) -> Result<Container> {
    let header = primary.read(0, HEADER_SIZE as usize)?;
    let files = files(&header)?;
    let c = Container::new(Rc::clone(&primary));

    let mut installed = 0u32;
    for file in &files {
        let hash_name = format!("{}Hash", file.name);
        if file.name == "FileCount" || c.contains(&file.name) || c.contains(&hash_name) {
            debug!("exefs: skipping slot {} ({}), name already taken", file.index, file.name);
            continue;
        }
        let base = if PRIMARY_FILES.contains(&file.name.as_str()) {
            &primary
        } else {
            &secondary
        };
        trace!("exefs {}: {:#x} bytes at {:#x}", file.name, file.size, file.offset);
        let data = source::window(
            base,
            HEADER_SIZE + u64::from(file.offset),
            u64::from(file.size),
        );
        let stored = source::window(
            &primary,
            HASHES_OFFSET + (MAX_FILES - 1 - file.index) as u64 * HASH_SIZE,
            HASH_SIZE,
        );

        let view = Rc::clone(&data);
        c.install_list([
            derived(&file.name, move |_| Ok(node(Rc::clone(&view)))),
            derived(&hash_name, move |_| {
                Ok(node(Check::sha256(Rc::clone(&data), Rc::clone(&stored))))
            }),
        ]);
        installed += 1;
    }
    c.install_list([constant("FileCount", installed)]);
    Ok(c)
}
