pub mod extract;
pub mod list;
pub mod pack;
pub mod patch;

use asar_archive::Archive;
use miette::{miette, Context, IntoDiagnostic, Result};
use std::{
    io::{BufWriter, IntoInnerError},
    path::Path,
};
use tempfile::NamedTempFile;
use tracing::info;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Replace text in the scripts of an archive
    Patch(patch::PatchArgs),
    /// List every entry of an archive
    List(list::ListArgs),
    /// Extract an archive into a directory
    Extract(extract::ExtractArgs),
    /// Pack a directory into an archive
    Pack(pack::PackArgs),
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Patch(patch) => patch.handle(),
            Commands::List(list) => list.handle(),
            Commands::Extract(extract) => extract.handle(),
            Commands::Pack(pack) => pack.handle(),
        }
    }
}

/// Encode `archive` into a temporary file next to `path`, then move it into place
pub(crate) fn persist(archive: &Archive, path: &Path, overwrite: bool) -> Result<()> {
    if !overwrite && path.exists() {
        return Err(miette!(
            help = "pass --overwrite to replace it",
            "{} already exists",
            path.display()
        ));
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let temp = NamedTempFile::new_in(dir)
        .into_diagnostic()
        .context(format!("creating a temporary file in {}", dir.display()))?;

    let temp = archive
        .write(BufWriter::new(temp))
        .context(format!("encoding {}", path.display()))?
        .into_inner()
        .map_err(IntoInnerError::into_error)
        .into_diagnostic()
        .context(format!("encoding {}", path.display()))?;

    let persisted = if overwrite {
        temp.persist(path)
    } else {
        temp.persist_noclobber(path)
    };
    persisted
        .into_diagnostic()
        .context(format!("replacing {}", path.display()))?;

    info!("wrote {}", path.display());

    Ok(())
}
