//! In-memory tree of archive entries
//!
//! Every entry lives in a single arena owned by [`Archive`]. Directories refer to their children by
//! [`EntryId`] and every entry refers back to its parent the same way, so ownership only flows from the
//! archive into its entries.

use bitflags::bitflags;
use indexmap::IndexMap;
use std::{
    fmt,
    ops::{Index, IndexMut},
    path::{Component, Path},
};

use crate::error::{Error, Result};

/// Handle to an entry stored in an [`Archive`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(usize);

impl EntryId {
    /// The root directory of every archive
    pub const ROOT: EntryId = EntryId(0);

    /// Position of the entry inside the arena
    pub const fn index(self) -> usize {
        self.0
    }
}

bitflags! {
    /// Attributes recorded for an entry in the archive header
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct Flags: u8 {
        /// The entry is a directory
        const DIRECTORY = 1;

        /// The file should be marked executable when extracted
        const EXECUTABLE = 1 << 1;

        /// The entry is stored outside of the archive in the `.unpacked` directory
        const UNPACKED = 1 << 2;

        /// The entry is a symbolic link
        const LINK = 1 << 3;
    }
}

impl Flags {
    /// No attributes
    pub const NONE: Flags = Flags::empty();
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bit = |flag: Flags, c: char| if self.contains(flag) { c } else { '-' };
        write!(
            f,
            "{}{}{}{}",
            bit(Flags::DIRECTORY, 'd'),
            bit(Flags::LINK, 'l'),
            bit(Flags::EXECUTABLE, 'x'),
            bit(Flags::UNPACKED, 'u'),
        )
    }
}

/// What an entry holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// A directory and its children in insertion order
    Directory(IndexMap<Box<str>, EntryId>),

    /// A file whose bytes are stored in the content region
    File(Vec<u8>),

    /// A file stored next to the archive, only its size is known
    Unpacked(u64),

    /// A symbolic link to another path in the archive
    Link(Box<str>),
}

/// A single member of the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    name: Box<str>,
    parent: Option<EntryId>,
    flags: Flags,
    kind: EntryKind,
}

impl Entry {
    fn new(name: Box<str>, parent: Option<EntryId>, kind: EntryKind, flags: Flags) -> Self {
        // Only attributes that the kind does not already imply are stored
        let stored = match kind {
            EntryKind::Directory(_) | EntryKind::Link(_) => flags.intersection(Flags::UNPACKED),
            EntryKind::File(_) | EntryKind::Unpacked(_) => flags.intersection(Flags::EXECUTABLE),
        };

        Entry {
            name,
            parent,
            flags: stored,
            kind,
        }
    }

    /// Name of the entry inside its parent directory. The root has an empty name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The directory holding this entry, [`None`] for the root
    pub fn parent(&self) -> Option<EntryId> {
        self.parent
    }

    /// What this entry holds
    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    /// All attributes of the entry, including the ones implied by its kind
    pub fn flags(&self) -> Flags {
        self.flags
            | match self.kind {
                EntryKind::Directory(_) => Flags::DIRECTORY,
                EntryKind::File(_) => Flags::NONE,
                EntryKind::Unpacked(_) => Flags::UNPACKED,
                EntryKind::Link(_) => Flags::LINK,
            }
    }

    /// Returns true for directories
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Directory(_))
    }

    /// Returns true for packed and unpacked files
    pub fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File(_) | EntryKind::Unpacked(_))
    }

    /// Returns true for symbolic links
    pub fn is_link(&self) -> bool {
        matches!(self.kind, EntryKind::Link(_))
    }

    /// Size of the file in bytes, zero for directories and links
    pub fn size(&self) -> u64 {
        match &self.kind {
            EntryKind::File(content) => content.len() as u64,
            EntryKind::Unpacked(size) => *size,
            _ => 0,
        }
    }

    /// Bytes of a packed file, empty for everything else
    pub fn content(&self) -> &[u8] {
        match &self.kind {
            EntryKind::File(content) => content,
            _ => &[],
        }
    }

    /// Mutable access to the bytes of a packed file
    pub fn content_mut(&mut self) -> Option<&mut Vec<u8>> {
        match &mut self.kind {
            EntryKind::File(content) => Some(content),
            _ => None,
        }
    }

    /// Target of a link
    pub fn link_target(&self) -> Option<&str> {
        match &self.kind {
            EntryKind::Link(target) => Some(target),
            _ => None,
        }
    }

    /// Children of a directory in insertion order
    pub fn children(&self) -> impl Iterator<Item = EntryId> + '_ {
        let children = match &self.kind {
            EntryKind::Directory(children) => Some(children.values().copied()),
            _ => None,
        };
        children.into_iter().flatten()
    }
}

/// An archive materialized in memory
///
/// ```
/// use asar_archive::{Archive, Flags};
///
/// let mut archive = Archive::new();
/// let app = archive.add_dir(archive.root(), "app", Flags::NONE)?;
/// archive.add_file(app, "main.js", "console.log(1);", Flags::NONE)?;
///
/// let main = archive.by_path("app/main.js")?;
/// assert_eq!(archive[main].content(), b"console.log(1);");
/// # Ok::<(), asar_archive::error::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Archive {
    entries: Vec<Entry>,
}

impl Default for Archive {
    fn default() -> Self {
        Self::new()
    }
}

impl Archive {
    /// Create an archive holding only an empty root directory
    pub fn new() -> Self {
        Archive {
            entries: vec![Entry::new(
                "".into(),
                None,
                EntryKind::Directory(IndexMap::new()),
                Flags::NONE,
            )],
        }
    }

    /// The root directory
    pub const fn root(&self) -> EntryId {
        EntryId::ROOT
    }

    /// Number of entries below the root
    pub fn len(&self) -> usize {
        self.entries.len() - 1
    }

    /// Whether the root directory has no children
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get an entry by its handle
    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(id.0)
    }

    /// Get an entry by its handle for modification
    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut Entry> {
        self.entries.get_mut(id.0)
    }

    /// Find a direct child of `dir` by name
    pub fn child(&self, dir: EntryId, name: &str) -> Option<EntryId> {
        match &self.get(dir)?.kind {
            EntryKind::Directory(children) => children.get(name).copied(),
            _ => None,
        }
    }

    /// Resolve a `/` separated path relative to the root
    pub fn by_path(&self, path: &str) -> Result<EntryId> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self.root(), |dir, segment| self.child(dir, segment))
            .ok_or_else(|| Error::FileNotFound(path.to_owned()))
    }

    /// Full `/` separated path of an entry, empty for the root
    pub fn path(&self, id: EntryId) -> String {
        let mut segments = Vec::new();
        let mut current = self.get(id);
        while let Some(entry) = current {
            if entry.parent.is_none() {
                break;
            }
            segments.push(entry.name());
            current = entry.parent.and_then(|p| self.get(p));
        }
        segments.reverse();
        segments.join("/")
    }

    /// Depth-first walk over every entry below the root, in the order the encoder lays them out
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            archive: self,
            stack: reversed(self[self.root()].children()),
        }
    }

    /// Total number of bytes that packed files contribute to the content region
    pub fn content_size(&self) -> u64 {
        self.walk()
            .filter_map(|id| match &self[id].kind {
                EntryKind::File(content) => Some(content.len() as u64),
                _ => None,
            })
            .sum()
    }

    /// Add a packed file to the directory `parent`
    pub fn add_file(
        &mut self,
        parent: EntryId,
        name: impl Into<Box<str>>,
        content: impl Into<Vec<u8>>,
        flags: Flags,
    ) -> Result<EntryId> {
        self.insert(parent, name.into(), EntryKind::File(content.into()), flags)
    }

    /// Add a file stored outside the archive to the directory `parent`
    pub fn add_unpacked(
        &mut self,
        parent: EntryId,
        name: impl Into<Box<str>>,
        size: u64,
        flags: Flags,
    ) -> Result<EntryId> {
        self.insert(parent, name.into(), EntryKind::Unpacked(size), flags)
    }

    /// Add an empty directory to the directory `parent`
    pub fn add_dir(
        &mut self,
        parent: EntryId,
        name: impl Into<Box<str>>,
        flags: Flags,
    ) -> Result<EntryId> {
        self.insert(
            parent,
            name.into(),
            EntryKind::Directory(IndexMap::new()),
            flags,
        )
    }

    /// Add a symbolic link to the directory `parent`
    pub fn add_link(
        &mut self,
        parent: EntryId,
        name: impl Into<Box<str>>,
        target: impl Into<Box<str>>,
        flags: Flags,
    ) -> Result<EntryId> {
        self.insert(parent, name.into(), EntryKind::Link(target.into()), flags)
    }

    fn insert(
        &mut self,
        parent: EntryId,
        name: Box<str>,
        kind: EntryKind,
        flags: Flags,
    ) -> Result<EntryId> {
        if !is_valid_name(&name) {
            return Err(Error::InvalidName(name.into()));
        }

        let id = EntryId(self.entries.len());
        let parent_path = self.path(parent);
        let children = match self.entries.get_mut(parent.0).map(|e| &mut e.kind) {
            Some(EntryKind::Directory(children)) => children,
            _ => return Err(Error::NotADirectory(parent_path)),
        };

        if children.contains_key(&name) {
            return Err(Error::DuplicateEntry(join(&parent_path, &name)));
        }

        children.insert(name.clone(), id);
        self.entries.push(Entry::new(name, Some(parent), kind, flags));

        Ok(id)
    }
}

/// Two archives are equal when they describe the same tree with siblings in the same order. Where
/// entries sit in the arena is ignored.
impl PartialEq for Archive {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self[self.root()].children().count() == other[other.root()].children().count()
            && self.walk().zip(other.walk()).all(|(left, right)| {
                let (left, right) = (&self[left], &other[right]);
                left.name == right.name
                    && left.flags() == right.flags()
                    && match (&left.kind, &right.kind) {
                        (EntryKind::Directory(l), EntryKind::Directory(r)) => l.len() == r.len(),
                        (l, r) => l == r,
                    }
            })
    }
}

impl Eq for Archive {}

impl Index<EntryId> for Archive {
    type Output = Entry;

    fn index(&self, id: EntryId) -> &Self::Output {
        &self.entries[id.0]
    }
}

impl IndexMut<EntryId> for Archive {
    fn index_mut(&mut self, id: EntryId) -> &mut Self::Output {
        &mut self.entries[id.0]
    }
}

/// Depth-first iterator over the entries of an [`Archive`], see [`Archive::walk`]
pub struct Walk<'a> {
    archive: &'a Archive,
    stack: Vec<EntryId>,
}

impl Iterator for Walk<'_> {
    type Item = EntryId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        self.stack.extend(reversed(self.archive[id].children()));
        Some(id)
    }
}

fn reversed(ids: impl Iterator<Item = EntryId>) -> Vec<EntryId> {
    let mut ids: Vec<EntryId> = ids.collect();
    ids.reverse();
    ids
}

/// Entry names are single path segments on every platform
pub(crate) fn is_valid_name(name: &str) -> bool {
    if name.contains(|c: char| c == '/' || c == '\\') {
        return false;
    }

    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(segment)), None) if segment.to_str() == Some(name)
    ) && !is_drive_relative(name)
}

/// `C:x` names a path relative to the current directory of drive `C` on Windows
fn is_drive_relative(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_owned()
    } else {
        format!("{parent}/{name}")
    }
}
