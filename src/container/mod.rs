//! Lazily evaluated, memoized, named-field containers.
//!
//! A [`Container`] owns a byte source and a table mapping field names to
//! [`Derivation`]s. Nothing is read until a field is opened; the first
//! [`Container::open`] evaluates the derivation and caches the resulting
//! [`Node`], and every later open returns the same `Rc`.
//!
//! Derivations receive the container they are installed on, so a field can
//! open its siblings:
//!
//! ```
//! use ctrkit::container::{Container, field::{field, flag, Kind}};
//! use ctrkit::source::buffer;
//!
//! let c = Container::new(buffer(vec![0x34, 0x12, 0x05]));
//! c.install_list([
//!     field("Word", 0, Kind::U16),
//!     field("Flags", 2, Kind::U8),
//!     flag("IsOdd", "Flags", 0x01),
//! ]);
//! assert_eq!(c.get::<u16>("Word").unwrap(), 0x1234);
//! assert!(c.get::<bool>("IsOdd").unwrap());
//! ```
//!
//! ## Ownership and threading
//! Containers are single-owner: the cache uses `RefCell` and nodes are
//! shared through `Rc`, so a container tree cannot leave the thread that
//! built it. A field that is opened while it is still being evaluated is
//! a cycle and fails with [`Error::Cycle`].
//!
//! ## Failures
//! A failing derivation is not cached; the field can be opened again. The
//! decoder reserves `Err` for fatal conditions and reports recoverable ones
//! through sibling `…Error` text fields.

pub mod field;
pub mod node;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use log::trace;

pub use field::{Field, Kind};
pub use node::{FromNode, Node, NodeRef, Scalar};

use crate::source::SourceRef;
use crate::{Error, Result};

/// Closure form of a derivation.
pub type DeriveFn = Rc<dyn Fn(&Container) -> Result<NodeRef>>;

/// How a field produces its node.
#[derive(Clone)]
pub enum Derivation {
    /// Fixed-offset scalar read from the container's source.
    Field(Field),
    /// A value known at install time.
    Const(NodeRef),
    /// Arbitrary code run on first open.
    Derived(DeriveFn),
}

impl Derivation {
    fn evaluate(&self, container: &Container) -> Result<NodeRef> {
        match self {
            Derivation::Field(f) => f.evaluate(container),
            Derivation::Const(n) => Ok(Rc::clone(n)),
            Derivation::Derived(f) => f(container),
        }
    }
}

impl fmt::Debug for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Derivation::Field(field) => f.debug_tuple("Field").field(field).finish(),
            Derivation::Const(n) => f.debug_tuple("Const").field(n).finish(),
            Derivation::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

/// A named-field tree node over a byte source.
#[derive(Debug)]
pub struct Container {
    source: SourceRef,
    table: RefCell<HashMap<String, Derivation>>,
    order: RefCell<Vec<String>>,
    cache: RefCell<HashMap<String, NodeRef>>,
    pending: RefCell<HashSet<String>>,
}

impl Container {
    pub fn new(source: SourceRef) -> Self {
        Self {
            source,
            table: RefCell::default(),
            order: RefCell::default(),
            cache: RefCell::default(),
            pending: RefCell::default(),
        }
    }

    /// The source fixed-offset fields read from.
    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    /// Register derivations, replacing any earlier registration (and its
    /// cached node) under the same name.
    pub fn install_list(&self, entries: impl IntoIterator<Item = (String, Derivation)>) {
        let mut table = self.table.borrow_mut();
        let mut order = self.order.borrow_mut();
        let mut cache = self.cache.borrow_mut();
        for (name, derivation) in entries {
            cache.remove(&name);
            if table.insert(name.clone(), derivation).is_none() {
                order.push(name);
            }
        }
    }

    /// Whether a derivation is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.table.borrow().contains_key(name)
    }

    /// Installed field names, in installation order.
    pub fn names(&self) -> Vec<String> {
        self.order.borrow().clone()
    }

    /// Evaluate (at most once) and return the node for `name`.
    pub fn open(&self, name: &str) -> Result<NodeRef> {
        if let Some(node) = self.cache.borrow().get(name) {
            return Ok(Rc::clone(node));
        }

        let derivation = self
            .table
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::FieldNotFound(name.to_owned()))?;

        if !self.pending.borrow_mut().insert(name.to_owned()) {
            return Err(Error::Cycle(name.to_owned()));
        }
        trace!("evaluating field {name}");
        let result = derivation.evaluate(self);
        self.pending.borrow_mut().remove(name);

        let node = result?;
        self.cache
            .borrow_mut()
            .insert(name.to_owned(), Rc::clone(&node));
        Ok(node)
    }

    /// Open `name` and convert its value to `T`.
    pub fn get<T: FromNode>(&self, name: &str) -> Result<T> {
        self.open(name)?.value()
    }

    /// Open `name` as a nested container.
    ///
    /// The returned handle keeps the node alive; borrow the container with
    /// [`Node::as_container`].
    pub fn child(&self, name: &str) -> Result<NodeRef> {
        let node = self.open(name)?;
        node.as_container()?;
        Ok(node)
    }

    /// Open `name` as a verification node and return its verdict.
    pub fn verify(&self, name: &str) -> Result<bool> {
        self.open(name)?.as_check()?.verify()
    }
}
