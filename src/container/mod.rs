//! # Station archive container
//!
//! A single-file, hierarchical store for one station's recordings and
//! connectivity metadata. Entries are addressed by `/`-separated paths such as
//! `Waveforms/<tag>/<trace>` or `AuxiliaryData/connections/<key>`.
//!
//! ## File layout (v1)
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ HEADER  magic (u32 "SPK1") | version (u16)           │
//! ├──────────────────────────────────────────────────────┤
//! │ DATA    kind (u8) | path | attributes | payload      │
//! │         ... repeated for each entry ...              │
//! ├──────────────────────────────────────────────────────┤
//! │ INDEX   path | kind (u8) | data_offset (u64)         │
//! │         ... repeated, sorted by path ...             │
//! ├──────────────────────────────────────────────────────┤
//! │ FOOTER  index_offset (u64) | entry_count (u64)       │
//! │         magic (u32 "SPK1")                           │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Strings are `len (u32) | utf-8 bytes`; attributes are `count (u32)`
//! followed by key/value strings. Waveform payloads are `count (u64)` then
//! f32 samples; fixed-string payloads are `width (u32) | count (u32)` then
//! NUL-padded cells. All integers are little-endian.

pub mod format;
pub mod reader;
pub mod writer;

pub use format::{AUXILIARY_GROUP, Attributes, EntryKind, WAVEFORMS_GROUP};
pub use reader::ArchiveReader;
pub use writer::{ArchiveSummary, ArchiveWriter};
