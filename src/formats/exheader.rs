//! Extended header (exheader) of an executable NCCH.
//!
//! ## Layout
//! ```text
//! [0x000] System control info                       (0x200 bytes)
//!   [0x000] Name                                    (8 bytes)
//!   [0x00D] Flags: bit0 compressed .code, bit1 SD app
//!   [0x00E] RemasterVersion                         (u16 LE)
//!   [0x010] Text: Address, PageCount, Size          (3 × u32 LE)
//!   [0x01C] StackSize                               (u32 LE)
//!   [0x020] ReadOnly: Address, PageCount, Size      (3 × u32 LE)
//!   [0x030] Data: Address, PageCount, Size          (3 × u32 LE)
//!   [0x03C] BssSize                                 (u32 LE)
//!   [0x040] Dependency program ids                  (48 × u64 LE)
//!   [0x1C0] SaveDataSize                            (u64 LE)
//!   [0x1C8] JumpId                                  (u64 LE)
//! [0x200] Access control info                       (0x200 bytes)
//!   [0x200] ProgramId                               (u64 LE)
//!   [0x208] CoreVersion                             (u32 LE)
//! [0x400] AccessDesc signature                      (0x100 bytes)
//! [0x500] NCCH header public key                    (0x100 bytes)
//! [0x600] AccessDesc ACI copy                       (0x200 bytes)
//! ```
//!
//! Only the first `ExheaderHashRegionSize` bytes (0x400) are covered by the
//! NCCH header hash.

use crate::container::Container;
use crate::container::field::{Kind, field, flag, region};
use crate::source::SourceRef;

const FIELDS: &[(&str, u64, Kind)] = &[
    ("Name", 0x000, Kind::Bytes(8)),
    ("Flags", 0x00D, Kind::U8),
    ("RemasterVersion", 0x00E, Kind::U16),
    ("TextAddress", 0x010, Kind::U32),
    ("TextPageCount", 0x014, Kind::U32),
    ("TextSize", 0x018, Kind::U32),
    ("StackSize", 0x01C, Kind::U32),
    ("RoAddress", 0x020, Kind::U32),
    ("RoPageCount", 0x024, Kind::U32),
    ("RoSize", 0x028, Kind::U32),
    ("DataAddress", 0x030, Kind::U32),
    ("DataPageCount", 0x034, Kind::U32),
    ("DataSize", 0x038, Kind::U32),
    ("BssSize", 0x03C, Kind::U32),
    ("SaveDataSize", 0x1C0, Kind::U64),
    ("JumpId", 0x1C8, Kind::U64),
    ("ProgramId", 0x200, Kind::U64),
    ("CoreVersion", 0x208, Kind::U32),
];

/// Build the exheader container over a plaintext view.
pub fn open(source: SourceRef) -> Container {
    let c = Container::new(source);
    c.install_list(
        FIELDS
            .iter()
            .map(|&(name, offset, kind)| field(name, offset, kind)),
    );
    c.install_list([
        flag("IsCompressedCode", "Flags", 0x01),
        flag("IsSdApplication", "Flags", 0x02),
        region("Dependencies", 0x040, 0x180),
        region("AccessDescSignature", 0x400, 0x100),
        region("NcchSignaturePublicKey", 0x500, 0x100),
    ]);
    c
}
