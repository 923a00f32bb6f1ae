use std::ops::Range;

use super::{Buffer, SourceRef, check_range};
use crate::Result;

/// A base source with one byte range replaced by owned bytes.
///
/// Used to author small edits, e.g. clearing a single flag bit in a header
/// before checking a signature against the normalized bytes.
#[derive(Debug)]
pub struct Patch {
    base: SourceRef,
    at: u64,
    bytes: Buffer,
}

impl Patch {
    /// Layer `bytes` over `base` starting at `at`.
    ///
    /// The replaced range must lie inside `base`.
    pub fn new(base: SourceRef, at: u64, bytes: Buffer) -> Result<Self> {
        check_range(at, bytes.len(), base.len())?;
        Ok(Self { base, at, bytes })
    }

    pub fn len(&self) -> u64 {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// The replacement bytes, editable in place.
    pub fn bytes_mut(&mut self) -> &mut Buffer {
        &mut self.bytes
    }

    pub(super) fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.base.read_into(offset, buf)?;

        let read = offset..offset + buf.len() as u64;
        let patched = self.at..self.at + self.bytes.len() as u64;
        if let Some(overlap) = intersect(&read, &patched) {
            let dst = (overlap.start - offset) as usize..(overlap.end - offset) as usize;
            let src = (overlap.start - self.at) as usize..(overlap.end - self.at) as usize;
            buf[dst].copy_from_slice(&self.bytes[src]);
        }
        Ok(())
    }
}

fn intersect(a: &Range<u64>, b: &Range<u64>) -> Option<Range<u64>> {
    let start = a.start.max(b.start);
    let end = a.end.min(b.end);
    (start < end).then_some(start..end)
}
