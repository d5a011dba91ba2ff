//! Types for reading ASAR archives
//!

use binrw::BinRead;
use serde::Deserialize;
use std::{
    fs::File,
    io::{BufReader, Cursor, Read},
    path::Path,
};
use tracing::{debug, instrument};

use crate::{
    entry::{is_valid_name, Archive, EntryId, Flags},
    error::{Error, MalformedHeaderError, Result, TruncatedContentError},
    types::{DirectoryNode, HeaderNode, HeaderPickle, SizePickle, SIZE_PICKLE_LEN},
};

/// The structural header of an archive
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// The number of bytes in the header pickle
    pub size: u32,

    /// The root directory of the tree
    pub root: DirectoryNode,
}

impl Header {
    /// Offset from the start of the file where the content region starts
    pub fn content_start(&self) -> u64 {
        SIZE_PICKLE_LEN + self.size as u64
    }
}

/// Read the pickle framed header, leaving `reader` at the start of the content region
#[instrument(skip_all, err)]
pub fn read_header<R: Read>(reader: &mut R) -> Result<Header> {
    let size_block = read_header_block(reader, SIZE_PICKLE_LEN)?;
    let size =
        SizePickle::read(&mut Cursor::new(size_block)).map_err(MalformedHeaderError::Pickle)?;

    let header_block = read_header_block(reader, size.header_size as u64)?;
    let pickle =
        HeaderPickle::read(&mut Cursor::new(header_block)).map_err(MalformedHeaderError::Pickle)?;

    let root = match parse_header_json(&pickle.json).map_err(MalformedHeaderError::Json)? {
        HeaderNode::Directory(root) => root,
        _ => return Err(MalformedHeaderError::RootNotDirectory.into()),
    };

    debug!(header_size = size.header_size, "read header");

    Ok(Header {
        size: size.header_size,
        root,
    })
}

/// Parse without serde_json's nesting limit. Every directory nests two JSON objects.
fn parse_header_json(json: &[u8]) -> serde_json::Result<HeaderNode> {
    let mut deserializer = serde_json::Deserializer::from_slice(json);
    deserializer.disable_recursion_limit();

    let node = HeaderNode::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
    deserializer.end()?;

    Ok(node)
}

fn read_header_block<R: Read>(reader: &mut R, len: u64) -> Result<Vec<u8>> {
    let mut block = Vec::new();
    reader.by_ref().take(len).read_to_end(&mut block)?;

    if (block.len() as u64) < len {
        return Err(MalformedHeaderError::UnexpectedEnd {
            expected: len,
            actual: block.len() as u64,
        }
        .into());
    }

    Ok(block)
}

/// Methods for decoding archives
impl Archive {
    /// Decode an archive, materializing every packed file in memory.
    ///
    /// ```no_run
    /// fn list_asar_contents(reader: impl std::io::Read) -> asar_archive::error::Result<()> {
    ///     let archive = asar_archive::Archive::read(reader)?;
    ///
    ///     for id in archive.walk() {
    ///         println!("{} ({} bytes)", archive.path(id), archive[id].size());
    ///     }
    ///
    ///     Ok(())
    /// }
    /// ```
    #[instrument(skip_all, err)]
    pub fn read<R: Read>(mut reader: R) -> Result<Archive> {
        let header = read_header(&mut reader)?;

        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;

        let mut archive = Archive::new();
        let root = archive.root();
        archive.insert_nodes(root, header.root, &content)?;

        debug!(
            entries = archive.len(),
            content_size = content.len(),
            "decoded archive"
        );

        Ok(archive)
    }

    /// Read and decode the archive at `path`.
    ///
    /// The file is closed before this returns, so the same path can be written to afterwards.
    #[instrument(err)]
    pub fn open(path: &Path) -> Result<Archive> {
        let file = File::open(path)?;
        Archive::read(BufReader::new(file))
    }

    /// Directories are expanded from a work list, nesting depth does not grow the stack
    fn insert_nodes(&mut self, dir: EntryId, node: DirectoryNode, content: &[u8]) -> Result<()> {
        let mut pending = vec![(dir, node)];

        while let Some((dir, node)) = pending.pop() {
            let parent = self.path(dir);

            for (name, child) in node.files {
                let path = if parent.is_empty() {
                    name.clone()
                } else {
                    format!("{parent}/{name}")
                };

                if !is_valid_name(&name) {
                    return Err(MalformedHeaderError::InvalidName(path).into());
                }

                match child {
                    HeaderNode::Directory(directory) => {
                        let id = self.add_dir(dir, name, unpacked_flag(directory.unpacked))?;
                        pending.push((id, directory));
                    }
                    HeaderNode::Link(link) => {
                        self.add_link(dir, name, link.link, unpacked_flag(link.unpacked))?;
                    }
                    HeaderNode::File(file) => {
                        let flags = if file.executable {
                            Flags::EXECUTABLE
                        } else {
                            Flags::NONE
                        };

                        if file.unpacked {
                            self.add_unpacked(dir, name, file.size, flags)?;
                            continue;
                        }

                        let offset = file
                            .offset
                            .ok_or_else(|| MalformedHeaderError::MissingOffset(path.clone()))?;
                        let bytes = slice_content(content, offset, file.size, path)?;
                        self.add_file(dir, name, bytes, flags)?;
                    }
                }
            }
        }

        Ok(())
    }
}

fn unpacked_flag(unpacked: bool) -> Flags {
    if unpacked {
        Flags::UNPACKED
    } else {
        Flags::NONE
    }
}

fn slice_content(content: &[u8], offset: u64, size: u64, path: String) -> Result<&[u8]> {
    let available = content.len() as u64;
    match offset.checked_add(size) {
        Some(end) if end <= available => Ok(&content[offset as usize..end as usize]),
        _ => Err(Error::TruncatedContent(TruncatedContentError {
            path,
            offset,
            size,
            available,
        })),
    }
}
