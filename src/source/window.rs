use super::SourceRef;
use crate::{Error, Result};

/// A fixed `offset..offset + len` view of a parent source.
///
/// The window owns no bytes. It is not validated against the parent when
/// created; a read that falls outside the parent fails at read time.
#[derive(Debug)]
pub struct Window {
    parent: SourceRef,
    offset: u64,
    len: u64,
}

impl Window {
    pub fn new(parent: SourceRef, offset: u64, len: u64) -> Self {
        Self {
            parent,
            offset,
            len,
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(super) fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let absolute = self.offset.checked_add(offset).ok_or(Error::OutOfRange {
            offset,
            len: buf.len() as u64,
            size: self.len,
        })?;
        self.parent.read_into(absolute, buf)
    }
}
