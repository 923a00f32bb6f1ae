//! Randomly addressable, read-only byte sources.
//!
//! A [`Source`] is one of a closed set of variants:
//!
//! | Variant | Owns | Shares |
//! |---------|------|--------|
//! | [`Buffer`] | its bytes | - |
//! | [`Window`] | nothing | parent source |
//! | [`Patch`]  | the replacement bytes | base source |
//! | [`AesCtr`] | key and IV | ciphertext source |
//! | [`Disk`]   | the open file handle | - |
//!
//! Sources are shared through [`SourceRef`] (`Rc<Source>`). A derived source
//! holds a strong reference to the source it reads from; a source never
//! refers to the sources built on top of it, so the graph is acyclic and is
//! freed when the last handle goes away.
//!
//! Every read is positional and stateless: reading the same range twice
//! yields the same bytes. The whole layer is single-owner (`Rc`, no locks),
//! matching the single-session model of the container tree.

mod aes_ctr;
mod buffer;
mod disk;
mod patch;
mod window;

use std::path::Path;
use std::rc::Rc;

pub use aes_ctr::AesCtr;
pub use buffer::Buffer;
pub use disk::Disk;
pub use patch::Patch;
pub use window::Window;

use crate::{Error, Result};

/// Shared handle to a byte source.
pub type SourceRef = Rc<Source>;

/// A randomly addressable byte sequence.
#[derive(Debug)]
pub enum Source {
    /// Owned in-memory bytes.
    Buffer(Buffer),
    /// Fixed `offset..offset + len` view of a parent source.
    Window(Window),
    /// Base source with one byte range replaced.
    Patch(Patch),
    /// Transparent AES-128-CTR decryption of another source.
    AesCtr(AesCtr),
    /// A file on disk.
    Disk(Disk),
}

impl Source {
    /// Total length in bytes.
    pub fn len(&self) -> u64 {
        match self {
            Source::Buffer(b) => b.len() as u64,
            Source::Window(w) => w.len(),
            Source::Patch(p) => p.len(),
            Source::AesCtr(a) => a.len(),
            Source::Disk(d) => d.len(),
        }
    }

    /// Returns `true` if the source holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `buf` with the bytes starting at `offset`.
    ///
    /// Returns [`Error::OutOfRange`] if the range is not fully inside this
    /// source, or whatever the backing store reports if it cannot be read.
    pub fn read_into(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_range(offset, buf.len(), self.len())?;
        match self {
            Source::Buffer(b) => {
                // In range per the check above, so the casts cannot truncate.
                let start = offset as usize;
                buf.copy_from_slice(&b[start..start + buf.len()]);
                Ok(())
            }
            Source::Window(w) => w.read_at(offset, buf),
            Source::Patch(p) => p.read_at(offset, buf),
            Source::AesCtr(a) => a.read_at(offset, buf),
            Source::Disk(d) => d.read_at(offset, buf),
        }
    }

    /// Read `len` bytes starting at `offset`.
    pub fn read(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(offset, &mut buf)?;
        Ok(buf)
    }

    /// Read exactly `N` bytes at `offset` into an array.
    pub fn read_array<const N: usize>(&self, offset: u64) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_into(offset, &mut buf)?;
        Ok(buf)
    }

    /// Read the whole source.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        let len = usize::try_from(self.len()).map_err(|_| Error::Parse("source too large"))?;
        self.read(0, len)
    }

    /// Wrap the source in a shared handle.
    pub fn into_ref(self) -> SourceRef {
        Rc::new(self)
    }
}

impl From<Buffer> for Source {
    fn from(b: Buffer) -> Self {
        Source::Buffer(b)
    }
}

impl From<Window> for Source {
    fn from(w: Window) -> Self {
        Source::Window(w)
    }
}

impl From<Patch> for Source {
    fn from(p: Patch) -> Self {
        Source::Patch(p)
    }
}

impl From<AesCtr> for Source {
    fn from(a: AesCtr) -> Self {
        Source::AesCtr(a)
    }
}

impl From<Disk> for Source {
    fn from(d: Disk) -> Self {
        Source::Disk(d)
    }
}

/// Shared handle to an owned copy of `bytes`.
pub fn buffer(bytes: impl Into<Vec<u8>>) -> SourceRef {
    Source::from(Buffer::from(bytes.into())).into_ref()
}

/// Shared handle to a window over `parent`.
pub fn window(parent: &SourceRef, offset: u64, len: u64) -> SourceRef {
    Source::from(Window::new(Rc::clone(parent), offset, len)).into_ref()
}

/// Shared handle to a decrypting view over `ciphertext`.
pub fn aes_ctr(ciphertext: &SourceRef, key: [u8; 16], iv: [u8; 16]) -> SourceRef {
    Source::from(AesCtr::new(Rc::clone(ciphertext), key, iv)).into_ref()
}

/// Open a file on disk as a shared source.
pub fn open_file(path: impl AsRef<Path>) -> Result<SourceRef> {
    Ok(Source::from(Disk::open(path)?).into_ref())
}

/// Check that `len` bytes at `offset` fit in a source of `size` bytes.
pub(crate) fn check_range(offset: u64, len: usize, size: u64) -> Result<()> {
    let len = len as u64;
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(Error::OutOfRange { offset, len, size }),
    }
}
