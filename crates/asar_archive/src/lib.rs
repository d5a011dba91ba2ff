//! This library handles reading from and creating **ASAR** archives used by *Electron* applications.
//!
//! # ASAR Archive Format Documentation
//!
//! An ASAR archive bundles a directory tree into a single file. Electron reads application code straight
//! out of it, typically from `resources/app.asar`. The format is a small binary frame around a JSON
//! description of the tree, followed by the contents of every file stored back to back.
//!
//! ## File Structure
//!
//! The file consists of a size pickle, a header pickle holding the JSON header, and the content region.
//! Pickles are Chromium's length prefixed framing, their payload is always padded to a multiple of 4 bytes.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Size Payload           | 4 bytes: Fixed value 0x00000004                            |
//! | 0x0004         | Header Size            | 4 bytes: Number of bytes `H` in the header pickle          |
//! | 0x0008         | Header Payload         | 4 bytes: `4 + align4(J)`                                   |
//! | 0x000C         | JSON Length            | 4 bytes: Number of bytes `J` in the JSON string            |
//! | 0x0010         | JSON Header            | `J` bytes of UTF-8, zero padded to a multiple of 4         |
//! | 8 + H          | Content Region         | File contents, back to back                                |
//!
//! ### Header
//!
//! The JSON header describes every entry of the tree. Each node is an object, the keys it holds decide
//! what it is:
//!
//! - **Directory**: `{"files": {<name>: <node>, ...}}`. The root node is always a directory. The
//!   ecosystem may add `"unpacked": true` when all of its children live outside the archive.
//! - **Packed File**: `{"size": N, "offset": "O"}`. The offset is relative to the start of the content
//!   region and stored as a decimal string. `"executable": true` marks files that should keep the
//!   executable bit when extracted.
//! - **Unpacked File**: `{"size": N, "unpacked": true}`. The bytes are stored next to the archive in
//!   `<archive>.unpacked/` and nothing is reserved in the content region.
//! - **Link**: `{"link": "relative/target"}`. A symbolic link to another path inside the archive.
//!
//! Children keep the order they are written in. Other keys such as `integrity` are ignored.
//!
//! ### Content Region
//!
//! Packed files are stored in the order of a depth-first walk of the header, so the offset of each file is
//! the sum of the sizes of the packed files before it.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.asar`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Compression**: None
//!

pub mod entry;
pub mod error;
pub mod patch;
pub mod read;
pub mod types;
pub mod write;

pub use entry::{Archive, Entry, EntryId, EntryKind, Flags};
pub use patch::{Patch, PatchReport, Replacement};
pub use read::read_header;
pub use write::AsarWriter;
