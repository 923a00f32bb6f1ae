use log::trace;

use super::SourceRef;
use crate::Result;
use crate::crypto::ncch::apply_keystream;

/// Transparent AES-128-CTR view over a ciphertext source.
///
/// The keystream position of a byte is its offset *inside this view*, not
/// its position in whatever file the ciphertext ultimately lives in. A view
/// over a window into a larger encrypted image therefore starts its counter
/// at the IV, which is how NCCH regions are encrypted.
///
/// Nothing is cached: every read re-derives the keystream for its range, so
/// repeated reads are identical and the view can be read out of order. The
/// same view over plaintext encrypts.
#[derive(Debug)]
pub struct AesCtr {
    inner: SourceRef,
    key: [u8; 16],
    iv: [u8; 16],
}

impl AesCtr {
    pub fn new(inner: SourceRef, key: [u8; 16], iv: [u8; 16]) -> Self {
        Self { inner, key, iv }
    }

    pub fn len(&self) -> u64 {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub(super) fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.inner.read_into(offset, buf)?;
        trace!("aes-ctr: {:#x} bytes at {offset:#x}", buf.len());
        apply_keystream(&self.key, &self.iv, offset, buf)
    }
}
