//! Declarative field installers.
//!
//! Each helper returns a `(name, Derivation)` entry for
//! [`Container::install_list`]. A fixed-offset field reads its bytes from the
//! container's own source and decodes them little-endian, the byte order of
//! every 3DS header.

use std::rc::Rc;

use super::node::{NodeRef, Scalar, node, value};
use super::{Container, Derivation};
use crate::Result;
use crate::source::window;

/// Width and interpretation of a fixed-offset field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    U8,
    U16,
    U32,
    U64,
    /// Raw bytes of the given length.
    Bytes(usize),
}

impl Kind {
    pub fn width(self) -> usize {
        match self {
            Kind::U8 => 1,
            Kind::U16 => 2,
            Kind::U32 => 4,
            Kind::U64 => 8,
            Kind::Bytes(n) => n,
        }
    }

    fn decode(self, raw: Vec<u8>) -> Scalar {
        let mut le = [0u8; 8];
        let width = raw.len().min(8);
        le[..width].copy_from_slice(&raw[..width]);
        let v = u64::from_le_bytes(le);
        // Truncating casts: `raw` holds exactly `width()` bytes.
        match self {
            Kind::U8 => Scalar::U8(v as u8),
            Kind::U16 => Scalar::U16(v as u16),
            Kind::U32 => Scalar::U32(v as u32),
            Kind::U64 => Scalar::U64(v),
            Kind::Bytes(_) => Scalar::Bytes(raw),
        }
    }
}

/// A scalar at a fixed byte offset of the container's source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub offset: u64,
    pub kind: Kind,
}

impl Field {
    pub(super) fn evaluate(&self, container: &Container) -> Result<NodeRef> {
        let raw = container.source().read(self.offset, self.kind.width())?;
        Ok(value(self.kind.decode(raw)))
    }
}

/// Install a fixed-offset scalar.
pub fn field(name: &str, offset: u64, kind: Kind) -> (String, Derivation) {
    (name.to_owned(), Derivation::Field(Field { offset, kind }))
}

/// Install a window `offset..offset + len` of the container's source.
pub fn region(name: &str, offset: u64, len: u64) -> (String, Derivation) {
    derived(name, move |c| Ok(node(window(c.source(), offset, len))))
}

/// Install a constant.
pub fn constant(name: &str, v: impl Into<Scalar>) -> (String, Derivation) {
    (name.to_owned(), Derivation::Const(value(v)))
}

/// Install an arbitrary derivation, evaluated on first open.
pub fn derived(
    name: &str,
    f: impl Fn(&Container) -> Result<NodeRef> + 'static,
) -> (String, Derivation) {
    (name.to_owned(), Derivation::Derived(Rc::new(f)))
}

/// Install a boolean that tests `mask` against the `u8` field `of`.
pub fn flag(name: &str, of: &'static str, mask: u8) -> (String, Derivation) {
    derived(name, move |c| Ok(value((c.get::<u8>(of)? & mask) != 0)))
}
