//! Decoders for 3DS content formats.
//!
//! Every decoder builds a [`crate::container::Container`] over a byte
//! source and installs its fields lazily; nothing past the header is read
//! until a field is opened. Decoders receive plaintext views, except
//! [`ncch`], which sets up the decrypting views for its children itself.
//!
//! | Module | Format | Description |
//! |--------|--------|-------------|
//! | [`ncch`] | NCCH (CXI / CFA) | Content container; header, key derivation, regions |
//! | [`exheader`] | Exheader | Code-set and access-control info of a CXI |
//! | [`exefs`] | ExeFS | Flat executable file system with per-file SHA-256 |
//! | [`romfs`] | IVFC | Hash-tree header at the start of a RomFS |

pub mod exefs;
pub mod exheader;
pub mod ncch;
pub mod romfs;
