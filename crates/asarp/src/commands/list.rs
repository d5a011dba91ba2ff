use asar_archive::{Archive, EntryId, EntryKind};
use clap::Args;
use miette::{Context, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;

use crate::config;

#[derive(Args)]
pub struct ListArgs {
    /// An input archive, defaults to the Blitz app archive
    #[arg(short, long, value_name = "FILE", env = "ASARP_FILE")]
    file: Option<PathBuf>,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let path = config::archive_path(self.file.as_deref())?;
        let archive = Archive::open(&path).context(format!("decoding {}", path.display()))?;

        for id in archive.walk() {
            println!("{}", describe(&archive, id));
        }

        Ok(())
    }
}

/// One line per entry: flags, size and path
fn describe(archive: &Archive, id: EntryId) -> String {
    let entry = &archive[id];
    let path = archive.path(id);

    match entry.kind() {
        EntryKind::Directory(_) => format!("{} {:>10} {}/", entry.flags(), "", path.blue()),
        EntryKind::Link(target) => {
            format!("{} {:>10} {} -> {}", entry.flags(), "", path.cyan(), target)
        }
        EntryKind::File(_) | EntryKind::Unpacked(_) => {
            format!("{} {:>10} {}", entry.flags(), entry.size(), path)
        }
    }
}
