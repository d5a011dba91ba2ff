//! Types for writing ASAR archives
//!

use binrw::BinWrite;
use std::fmt::Debug;
use std::io::{self, Cursor, Write};
use tracing::{debug, instrument};

use crate::entry::{Archive, EntryId, EntryKind, Flags};
use crate::error::{Error, Result};
use crate::types::{DirectoryNode, FileNode, HeaderNode, HeaderPickle, LinkNode, SizePickle};

/// ASAR archive generator
///
/// Entries are added relative to a current directory. [`AsarWriter::add_dir`] descends into the
/// new directory and [`AsarWriter::parent`] returns to the one holding it.
///
/// ```
/// # fn doit() -> asar_archive::error::Result<()>
/// # {
/// use asar_archive::{AsarWriter, Flags};
///
/// // We use a buffer here, though you'd normally use a `File`
/// let mut asar = AsarWriter::new(std::io::Cursor::new(Vec::new()));
///
/// asar.add_dir("app", Flags::NONE)?;
/// asar.add_file("main.js", "mainWindow.show();", Flags::NONE)?;
/// asar.parent()?;
/// asar.add_file("package.json", r#"{"main":"app/main.js"}"#, Flags::NONE)?;
///
/// // Apply the changes you've made.
/// asar.finish()?;
///
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct AsarWriter<W: Write> {
    inner: W,
    archive: Archive,
    stack: Vec<EntryId>,
}

impl<W: Write> AsarWriter<W> {
    /// Initializes an empty archive, positioned at the root directory.
    pub fn new(inner: W) -> AsarWriter<W> {
        Self::from_archive(inner, Archive::new())
    }

    /// Continue building on top of an existing tree, positioned at its root directory.
    pub fn from_archive(inner: W, archive: Archive) -> AsarWriter<W> {
        AsarWriter {
            inner,
            stack: vec![archive.root()],
            archive,
        }
    }

    /// The tree built so far
    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    /// Stop building and take the tree without writing anything
    pub fn into_archive(self) -> Archive {
        self.archive
    }

    /// The directory new entries are added to
    pub fn current_dir(&self) -> EntryId {
        self.stack.last().copied().unwrap_or(EntryId::ROOT)
    }

    /// Add a packed file to the current directory
    #[instrument(skip(self, name, content), fields(name = %name.as_ref()), err)]
    pub fn add_file(
        &mut self,
        name: impl AsRef<str>,
        content: impl Into<Vec<u8>>,
        flags: Flags,
    ) -> Result<EntryId> {
        let dir = self.current_dir();
        self.archive.add_file(dir, name.as_ref(), content, flags)
    }

    /// Add a file stored outside the archive to the current directory
    #[instrument(skip(self, name), fields(name = %name.as_ref()), err)]
    pub fn add_unpacked(
        &mut self,
        name: impl AsRef<str>,
        size: u64,
        flags: Flags,
    ) -> Result<EntryId> {
        let dir = self.current_dir();
        self.archive.add_unpacked(dir, name.as_ref(), size, flags)
    }

    /// Add a symbolic link to the current directory
    #[instrument(skip(self, name, target), fields(name = %name.as_ref()), err)]
    pub fn add_link(
        &mut self,
        name: impl AsRef<str>,
        target: impl AsRef<str>,
        flags: Flags,
    ) -> Result<EntryId> {
        let dir = self.current_dir();
        self.archive
            .add_link(dir, name.as_ref(), target.as_ref(), flags)
    }

    /// Add a directory to the current directory and descend into it
    #[instrument(skip(self, name), fields(name = %name.as_ref()), err)]
    pub fn add_dir(&mut self, name: impl AsRef<str>, flags: Flags) -> Result<EntryId> {
        let dir = self.current_dir();
        let id = self.archive.add_dir(dir, name.as_ref(), flags)?;
        self.stack.push(id);
        Ok(id)
    }

    /// Return to the directory holding the current directory
    pub fn parent(&mut self) -> Result<()> {
        if self.stack.len() <= 1 {
            return Err(Error::NoParent);
        }
        self.stack.pop();
        Ok(())
    }

    /// Write the header and the content region
    ///
    /// This will return the writer, but one should normally not append any data to the end of the
    /// file.
    #[instrument(skip(self), err)]
    pub fn finish(self) -> Result<W> {
        self.archive.write(self.inner)
    }
}

impl<W: Write> Debug for AsarWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AsarWriter({} entries, at {:?})",
            self.archive.len(),
            self.archive.path(self.current_dir())
        )
    }
}

/// Methods for encoding archives
impl Archive {
    /// Encode the archive into `writer`.
    ///
    /// Content offsets are recomputed from the current tree, packed files are laid out back to back
    /// in depth-first order.
    #[instrument(skip_all, err)]
    pub fn write<W: Write>(&self, mut writer: W) -> Result<W> {
        let (root, content_size) = self.header_root();

        let json = serde_json::to_vec(&HeaderNode::Directory(root))
            .map_err(|e| Error::WriteError(e.into()))?;
        let header = HeaderPickle::new(json).ok_or_else(|| {
            Error::WriteError(io::Error::new(
                io::ErrorKind::InvalidInput,
                "header does not fit in a pickle",
            ))
        })?;
        let size = SizePickle {
            header_size: header.size(),
        };

        let mut framing = Cursor::new(Vec::with_capacity(8 + header.size() as usize));
        size.write(&mut framing).map_err(into_write_error)?;
        header.write(&mut framing).map_err(into_write_error)?;

        debug!(
            header_size = header.size(),
            content_size,
            "encoded header"
        );

        writer
            .write_all(framing.get_ref())
            .map_err(Error::WriteError)?;

        for id in self.walk() {
            if let EntryKind::File(content) = self[id].kind() {
                writer.write_all(content).map_err(Error::WriteError)?;
            }
        }

        writer.flush().map_err(Error::WriteError)?;

        Ok(writer)
    }

    /// Build the JSON tree bottom up from a reversed depth-first walk, so children are ready before
    /// their directory. Offsets are handed out from the end of the content region backwards.
    fn header_root(&self) -> (DirectoryNode, u64) {
        let content_size = self.content_size();
        let mut cursor = content_size;
        let mut built: Vec<Option<HeaderNode>> = vec![None; self.len() + 1];

        for id in self.walk().collect::<Vec<_>>().into_iter().rev() {
            let entry = &self[id];
            let flags = entry.flags();
            let node = match entry.kind() {
                EntryKind::Directory(_) => {
                    HeaderNode::Directory(self.header_directory(id, &mut built))
                }
                EntryKind::File(content) => {
                    cursor -= content.len() as u64;
                    HeaderNode::File(FileNode {
                        size: content.len() as u64,
                        offset: Some(cursor),
                        unpacked: false,
                        executable: flags.contains(Flags::EXECUTABLE),
                    })
                }
                EntryKind::Unpacked(size) => HeaderNode::File(FileNode {
                    size: *size,
                    offset: None,
                    unpacked: true,
                    executable: flags.contains(Flags::EXECUTABLE),
                }),
                EntryKind::Link(target) => HeaderNode::Link(LinkNode {
                    link: target.to_string(),
                    unpacked: flags.contains(Flags::UNPACKED),
                }),
            };
            built[id.index()] = Some(node);
        }

        (self.header_directory(self.root(), &mut built), content_size)
    }

    fn header_directory(&self, dir: EntryId, built: &mut [Option<HeaderNode>]) -> DirectoryNode {
        DirectoryNode {
            files: self[dir]
                .children()
                .filter_map(|id| {
                    let node = built.get_mut(id.index())?.take()?;
                    Some((self[id].name().to_owned(), node))
                })
                .collect(),
            unpacked: self[dir].flags().contains(Flags::UNPACKED),
        }
    }
}

fn into_write_error(error: binrw::Error) -> Error {
    match error {
        binrw::Error::Io(e) => Error::WriteError(e),
        other => Error::WriteError(io::Error::new(io::ErrorKind::Other, other.to_string())),
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_str_eq;
    use tracing_test::traced_test;

    use crate::entry::{Archive, Flags};
    use crate::error::{Error, Result};
    use crate::read::read_header;
    use crate::types::HeaderNode;
    use crate::write::AsarWriter;
    use std::io::{self, Cursor, Write};

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[traced_test]
    #[test]
    fn asar_empty_write() -> Result<()> {
        #[rustfmt::skip]
        let expected = vec![
            // Size pickle
            0x04, 0x00, 0x00, 0x00,
            0x14, 0x00, 0x00, 0x00,
            // Header pickle
            0x10, 0x00, 0x00, 0x00,
            0x0C, 0x00, 0x00, 0x00,
            // {"files":{}}
            0x7B, 0x22, 0x66, 0x69, 0x6C, 0x65, 0x73, 0x22, 0x3A, 0x7B, 0x7D, 0x7D,
        ];

        let writer = AsarWriter::new(Cursor::new(Vec::new()));
        let result = writer.finish()?;
        assert_eq!(result.get_ref().len(), expected.len());
        assert_str_eq!(
            format!("{:02X?}", *result.get_ref()),
            format!("{:02X?}", expected)
        );

        Ok(())
    }

    #[traced_test]
    #[test]
    fn asar_with_data_write() -> Result<()> {
        #[rustfmt::skip]
        let expected = [
            // Size pickle
            0x04, 0x00, 0x00, 0x00,
            0x38, 0x00, 0x00, 0x00,
            // Header pickle
            0x34, 0x00, 0x00, 0x00,
            0x2F, 0x00, 0x00, 0x00,
            // {"files":{"hello.txt":{"size":5,"offset":"0"}}}
            0x7B, 0x22, 0x66, 0x69, 0x6C, 0x65, 0x73, 0x22, 0x3A, 0x7B, 0x22, 0x68, 0x65, 0x6C,
            0x6C, 0x6F, 0x2E, 0x74, 0x78, 0x74, 0x22, 0x3A, 0x7B, 0x22, 0x73, 0x69, 0x7A, 0x65,
            0x22, 0x3A, 0x35, 0x2C, 0x22, 0x6F, 0x66, 0x66, 0x73, 0x65, 0x74, 0x22, 0x3A, 0x22,
            0x30, 0x22, 0x7D, 0x7D, 0x7D,
            // Padding
            0x00,
            // Content
            0x48, 0x65, 0x6C, 0x6C, 0x6F,
        ];

        let mut writer = AsarWriter::new(Cursor::new(Vec::new()));
        writer.add_file("hello.txt", "Hello", Flags::NONE)?;

        let result = writer.finish()?;
        assert_eq!(result.get_ref().len(), expected.len());
        assert_str_eq!(
            format!("{:02X?}", *result.get_ref()),
            format!("{:02X?}", expected)
        );

        Ok(())
    }

    #[traced_test]
    #[test]
    fn asar_offsets_follow_depth_first_order() -> Result<()> {
        let mut writer = AsarWriter::new(Cursor::new(Vec::new()));
        writer.add_dir("b", Flags::NONE)?;
        writer.add_file("one.js", "1", Flags::NONE)?;
        writer.add_dir("c", Flags::NONE)?;
        writer.add_file("two.js", "22", Flags::NONE)?;
        writer.parent()?;
        writer.parent()?;
        writer.add_file("three.js", "333", Flags::NONE)?;

        let output = writer.finish()?.into_inner();
        let header = read_header(&mut Cursor::new(&output))?;

        assert_str_eq!(
            serde_json::to_string(&HeaderNode::Directory(header.root.clone())).unwrap(),
            concat!(
                r#"{"files":{"b":{"files":{"one.js":{"size":1,"offset":"0"},"#,
                r#""c":{"files":{"two.js":{"size":2,"offset":"1"}}}}},"#,
                r#""three.js":{"size":3,"offset":"3"}}}"#
            )
        );
        assert_eq!(&output[header.content_start() as usize..], b"122333");

        Ok(())
    }

    #[traced_test]
    #[test]
    fn asar_flags_write() -> Result<()> {
        let mut writer = AsarWriter::new(Cursor::new(Vec::new()));
        writer.add_dir("bin", Flags::UNPACKED)?;
        writer.add_unpacked("tool", 7, Flags::EXECUTABLE)?;
        writer.add_link("latest", "bin/tool", Flags::UNPACKED)?;
        writer.parent()?;
        writer.add_file("run.sh", "#!", Flags::EXECUTABLE)?;

        let output = writer.finish()?.into_inner();
        let header = read_header(&mut Cursor::new(&output))?;

        assert_str_eq!(
            serde_json::to_string(&HeaderNode::Directory(header.root)).unwrap(),
            concat!(
                r#"{"files":{"bin":{"files":{"tool":{"size":7,"unpacked":true,"executable":true},"#,
                r#""latest":{"link":"bin/tool","unpacked":true}},"unpacked":true},"#,
                r#""run.sh":{"size":2,"offset":"0","executable":true}}}"#
            )
        );

        Ok(())
    }

    #[test]
    fn asar_parent_at_root() {
        let mut writer = AsarWriter::new(Cursor::new(Vec::new()));
        assert!(matches!(writer.parent(), Err(Error::NoParent)));
    }

    #[test]
    fn asar_builder_matches_direct_tree() -> Result<()> {
        let mut writer = AsarWriter::new(Cursor::new(Vec::new()));
        writer.add_dir("app", Flags::NONE)?;
        writer.add_file("main.js", "main", Flags::NONE)?;
        writer.parent()?;
        writer.add_file("notes.txt", "notes", Flags::NONE)?;

        let mut expected = Archive::new();
        let app = expected.add_dir(expected.root(), "app", Flags::NONE)?;
        expected.add_file(app, "main.js", "main", Flags::NONE)?;
        expected.add_file(expected.root(), "notes.txt", "notes", Flags::NONE)?;

        assert_eq!(writer.archive(), &expected);
        assert_eq!(
            writer.finish()?.into_inner(),
            expected.write(Vec::new())?
        );

        Ok(())
    }

    #[test]
    fn asar_write_failure() -> Result<()> {
        let mut archive = Archive::new();
        archive.add_file(archive.root(), "a.txt", "a", Flags::NONE)?;

        assert!(matches!(archive.write(FullDisk), Err(Error::WriteError(_))));

        Ok(())
    }
}
