//! Base types for structure of ASAR file.

use binrw::{BinRead, BinWrite};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Number of bytes taken by the [`SizePickle`] at the start of the file
pub const SIZE_PICKLE_LEN: u64 = 8;

/// ASAR size pickle
///
/// The file always starts with a pickle whose payload is a single `u32`: the length of the
/// [`HeaderPickle`] that follows. All data is stored in little endian format
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = 4u32, little)]
pub struct SizePickle {
    /// The number of bytes in the header pickle
    pub header_size: u32,
}

/// ASAR header pickle
///
/// Wraps the JSON description of the tree as a length prefixed string, padded with zeroes so the
/// payload is aligned to 4 bytes
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq)]
#[brw(little)]
pub struct HeaderPickle {
    /// The number of bytes following this field
    #[br(assert(
        payload_size >= 4,
        "pickle payload of {} bytes cannot hold a string",
        payload_size
    ))]
    pub payload_size: u32,

    /// The number of bytes in the JSON string
    #[br(assert(
        json_len <= payload_size - 4,
        "string of {} bytes exceeds the pickle payload of {} bytes",
        json_len,
        payload_size
    ))]
    pub json_len: u32,

    /// The JSON string
    #[br(count = json_len)]
    pub json: Vec<u8>,

    /// Alignment bytes
    #[br(count = payload_size - 4 - json_len)]
    pub padding: Vec<u8>,
}

impl HeaderPickle {
    /// Wrap a serialized header, returns [`None`] if it does not fit in a pickle
    pub fn new(json: Vec<u8>) -> Option<Self> {
        let json_len = u32::try_from(json.len()).ok()?;
        let aligned = json_len.checked_add(3)? & !3;
        let payload_size = aligned.checked_add(4)?;
        // The size pickle must still be able to describe the whole header pickle
        payload_size.checked_add(4)?;

        Some(HeaderPickle {
            payload_size,
            json_len,
            json,
            padding: vec![0; (aligned - json_len) as usize],
        })
    }

    /// The number of bytes this pickle takes in the file
    pub fn size(&self) -> u32 {
        4 + self.payload_size
    }
}

/// A node of the JSON header
///
/// The header has no explicit discriminant, the keys present decide what the node describes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum HeaderNode {
    /// A directory, holds a `files` object
    Directory(DirectoryNode),

    /// A symbolic link, holds a `link` string
    Link(LinkNode),

    /// A file, holds a `size`
    File(FileNode),
}

/// A directory in the JSON header
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DirectoryNode {
    /// The children of this directory in the order they are laid out
    pub files: IndexMap<String, HeaderNode>,

    /// Whether the directory is stored outside of the archive
    #[serde(default, skip_serializing_if = "is_false")]
    pub unpacked: bool,
}

/// A file in the JSON header
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FileNode {
    /// The size of the file in bytes
    pub size: u64,

    /// The offset from the start of the content region, written as a decimal string
    #[serde(default, skip_serializing_if = "Option::is_none", with = "offset")]
    pub offset: Option<u64>,

    /// Whether the file is stored outside of the archive
    #[serde(default, skip_serializing_if = "is_false")]
    pub unpacked: bool,

    /// Whether the file should be executable when extracted
    #[serde(default, skip_serializing_if = "is_false")]
    pub executable: bool,
}

/// A symbolic link in the JSON header
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct LinkNode {
    /// The path the link points to, relative to the archive root
    pub link: String,

    /// Whether the link is stored outside of the archive
    #[serde(default, skip_serializing_if = "is_false")]
    pub unpacked: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Offsets exceed what JavaScript numbers can represent exactly, so they are stored as strings
mod offset {
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    pub fn serialize<S: Serializer>(
        value: &Option<u64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(offset) => serializer.collect_str(offset),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u64>, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text.parse().map(Some).map_err(de::Error::custom),
            Raw::Number(number) => Ok(Some(number)),
        }
    }
}
