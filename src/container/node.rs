use std::fmt;
use std::rc::Rc;

use super::Container;
use crate::source::SourceRef;
use crate::verify::Check;
use crate::{Error, Result};

/// Shared handle to an evaluated node.
pub type NodeRef = Rc<Node>;

/// The value a field evaluates to.
#[derive(Debug)]
pub enum Node {
    Scalar(Scalar),
    Source(SourceRef),
    Container(Container),
    Check(Check),
}

/// A fixed-width (or short textual) value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    /// Raw fixed-width bytes such as a magic or a product code.
    Bytes(Vec<u8>),
    /// Human-readable text; `…Error` fields hold one.
    Text(String),
}

impl Scalar {
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Bool(_) => "bool",
            Scalar::U8(_) => "u8",
            Scalar::U16(_) => "u16",
            Scalar::U32(_) => "u32",
            Scalar::U64(_) => "u64",
            Scalar::Bytes(_) => "bytes",
            Scalar::Text(_) => "text",
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::U8(v) => write!(f, "{v:#04X}"),
            Scalar::U16(v) => write!(f, "{v:#06X}"),
            Scalar::U32(v) => write!(f, "{v:#010X}"),
            Scalar::U64(v) => write!(f, "{v:016X}"),
            Scalar::Bytes(v) if v.iter().all(|b| b.is_ascii_graphic() || *b == 0) => {
                write!(f, "{}", String::from_utf8_lossy(v).trim_end_matches('\0'))
            }
            Scalar::Bytes(v) => write!(f, "{}", hex::encode_upper(v)),
            Scalar::Text(v) => f.write_str(v),
        }
    }
}

impl Node {
    /// Name of the variant (or scalar type) for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Scalar(s) => s.type_name(),
            Node::Source(_) => "source",
            Node::Container(_) => "container",
            Node::Check(_) => "check",
        }
    }

    /// Convert the stored value to `T`.
    pub fn value<T: FromNode>(&self) -> Result<T> {
        T::from_node(self)
    }

    pub fn as_container(&self) -> Result<&Container> {
        match self {
            Node::Container(c) => Ok(c),
            other => Err(mismatch("container", other)),
        }
    }

    pub fn as_check(&self) -> Result<&Check> {
        match self {
            Node::Check(c) => Ok(c),
            other => Err(mismatch("check", other)),
        }
    }
}

fn mismatch(expected: &'static str, found: &Node) -> Error {
    Error::TypeMismatch {
        expected,
        found: found.type_name(),
    }
}

/// Typed access to a node's value.
pub trait FromNode: Sized {
    fn from_node(node: &Node) -> Result<Self>;
}

macro_rules! scalar_from_node {
    ($($ty:ty => $variant:ident, $name:literal;)*) => {
        $(
            impl FromNode for $ty {
                fn from_node(node: &Node) -> Result<Self> {
                    match node {
                        Node::Scalar(Scalar::$variant(v)) => Ok(v.clone()),
                        other => Err(mismatch($name, other)),
                    }
                }
            }

            impl From<$ty> for Scalar {
                fn from(v: $ty) -> Self {
                    Scalar::$variant(v)
                }
            }
        )*
    };
}

scalar_from_node! {
    bool => Bool, "bool";
    u8 => U8, "u8";
    u16 => U16, "u16";
    u32 => U32, "u32";
    u64 => U64, "u64";
    Vec<u8> => Bytes, "bytes";
    String => Text, "text";
}

impl FromNode for SourceRef {
    fn from_node(node: &Node) -> Result<Self> {
        match node {
            Node::Source(s) => Ok(Rc::clone(s)),
            other => Err(mismatch("source", other)),
        }
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_owned())
    }
}

impl From<Scalar> for Node {
    fn from(s: Scalar) -> Self {
        Node::Scalar(s)
    }
}

impl From<SourceRef> for Node {
    fn from(s: SourceRef) -> Self {
        Node::Source(s)
    }
}

impl From<Container> for Node {
    fn from(c: Container) -> Self {
        Node::Container(c)
    }
}

impl From<Check> for Node {
    fn from(c: Check) -> Self {
        Node::Check(c)
    }
}

/// Shared scalar node.
pub fn value(v: impl Into<Scalar>) -> NodeRef {
    Rc::new(Node::Scalar(v.into()))
}

/// Shared node from anything convertible to [`Node`].
pub fn node(n: impl Into<Node>) -> NodeRef {
    Rc::new(n.into())
}
