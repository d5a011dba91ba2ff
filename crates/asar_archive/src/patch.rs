//! Literal substring replacement over the files of an archive

use bon::Builder;
use std::{fmt, str::FromStr};
use tracing::{debug, instrument};

use crate::entry::{Archive, EntryKind};
use crate::error::InvalidReplacementError;

/// A single literal substitution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    /// The bytes to look for
    pub from: Vec<u8>,

    /// The bytes every match is replaced with
    pub to: Vec<u8>,
}

impl Replacement {
    /// Create a replacement of `from` with `to`
    pub fn new(from: impl Into<Vec<u8>>, to: impl Into<Vec<u8>>) -> Self {
        Replacement {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Parses `MATCH=REPLACEMENT`, splitting at the first `=`
impl FromStr for Replacement {
    type Err = InvalidReplacementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split_once('=')
            .map(|(from, to)| Replacement::new(from, to))
            .ok_or_else(|| InvalidReplacementError(s.to_owned()))
    }
}

impl fmt::Display for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}",
            String::from_utf8_lossy(&self.from),
            String::from_utf8_lossy(&self.to)
        )
    }
}

/// Which files to rewrite and how
///
/// ```
/// use asar_archive::{Archive, Flags, Patch, Replacement};
///
/// let mut archive = Archive::new();
/// let main = archive.add_file(archive.root(), "main.js", "mainWindow.show();", Flags::NONE)?;
///
/// let patch = Patch::builder()
///     .replacements(vec![Replacement::new("mainWindow.show();", "1+1;")])
///     .build();
/// let report = patch.apply(&mut archive);
///
/// assert_eq!(report.replacements, 1);
/// assert_eq!(archive[main].content(), b"1+1;");
/// # Ok::<(), asar_archive::error::Error>(())
/// ```
#[derive(Debug, Clone, Builder)]
pub struct Patch {
    /// Only packed files whose name ends with this suffix are rewritten
    #[builder(into, default = ".js".to_owned())]
    pub suffix: String,

    /// Substitutions, applied one after the other
    #[builder(default)]
    pub replacements: Vec<Replacement>,
}

/// Summary of a patch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// Packed files selected by the suffix
    pub visited: usize,

    /// Files whose content changed
    pub changed: usize,

    /// Total number of substitutions made
    pub replacements: usize,
}

impl Patch {
    /// Whether an entry with this name is rewritten
    pub fn selects(&self, name: &str) -> bool {
        name.ends_with(&self.suffix)
    }

    /// Rewrite the content of every selected file in place.
    ///
    /// Names, kinds, flags and the shape of the tree are left untouched.
    #[instrument(skip_all, fields(suffix = %self.suffix))]
    pub fn apply(&self, archive: &mut Archive) -> PatchReport {
        let mut report = PatchReport::default();

        let selected = archive
            .walk()
            .filter(|&id| {
                matches!(archive[id].kind(), EntryKind::File(_))
                    && self.selects(archive[id].name())
            })
            .collect::<Vec<_>>();

        for id in selected {
            report.visited += 1;

            let Some(content) = archive[id].content_mut() else {
                continue;
            };
            let count = self.apply_to(content);

            if count > 0 {
                report.changed += 1;
                report.replacements += count;
                debug!(path = %archive.path(id), count, "patched file");
            }
        }

        debug!(
            visited = report.visited,
            changed = report.changed,
            replacements = report.replacements,
            "patch pass finished"
        );

        report
    }

    /// Run every replacement over `content` and return the number of substitutions
    pub fn apply_to(&self, content: &mut Vec<u8>) -> usize {
        self.replacements
            .iter()
            .filter(|r| !r.from.is_empty())
            .map(|r| match replace_all(content, &r.from, &r.to) {
                Some((replaced, count)) => {
                    *content = replaced;
                    count
                }
                None => 0,
            })
            .sum()
    }
}

/// Left to right, non-overlapping replacement. Returns [`None`] when nothing matched.
fn replace_all(haystack: &[u8], from: &[u8], to: &[u8]) -> Option<(Vec<u8>, usize)> {
    let mut rest = haystack;
    let mut output = Vec::new();
    let mut count = 0;

    while let Some(position) = find(rest, from) {
        output.extend_from_slice(&rest[..position]);
        output.extend_from_slice(to);
        rest = &rest[position + from.len()..];
        count += 1;
    }

    if count == 0 {
        return None;
    }

    output.extend_from_slice(rest);
    Some((output, count))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
