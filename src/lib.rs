//! **ctrkit** - a Rust library for inspecting Nintendo 3DS NCCH containers.
//!
//! An opened file is a tree of lazily evaluated, memoized named fields.
//! Header scalars, decrypted region views, nested containers and hash or
//! signature checks are all fields, and nothing is read or decrypted until
//! a field is first opened.
//!
//! ```no_run
//! use std::rc::Rc;
//! use ctrkit::formats::ncch::Ncch;
//! use ctrkit::keys::{SecretDb, SeedDb};
//!
//! # fn main() -> ctrkit::Result<()> {
//! let mut secrets = SecretDb::new();
//! secrets.load(std::fs::File::open("secrets.txt")?)?;
//! let ncch = Ncch::open(
//!     ctrkit::source::open_file("game.cxi")?,
//!     Rc::new(secrets),
//!     &SeedDb::new(),
//! )?;
//! println!("{:016X}", ncch.get::<u64>("ProgramId")?);
//! if ncch.contains("Exefs") {
//!     println!("exefs hash ok: {}", ncch.verify("ExefsHash")?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Layers
//! | Module | Role |
//! |--------|------|
//! | [`source`]    | Byte sources: buffer, window, patch, AES-CTR view, file |
//! | [`container`] | Lazy named-field containers and their node types |
//! | [`verify`]    | SHA-256 and RSA-2048 checks |
//! | [`crypto`]    | Key scrambler, NCCH IVs and seed mixing |
//! | [`keys`]      | Secret and seed providers |
//! | [`formats`]   | NCCH, exheader, ExeFS and IVFC decoders |

pub mod container;
pub mod crypto;
pub mod error;
pub mod formats;
pub mod keys;
pub mod source;
pub(crate) mod utils;
pub mod verify;

pub use error::{Error, Result};
