use asar_archive::{Archive, AsarWriter, Flags};
use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use std::{
    fs::Metadata,
    io,
    path::{Path, PathBuf},
};
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Args)]
pub struct PackArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl PackArgs {
    pub fn handle(&self) -> Result<()> {
        info!("creating {}", &self.file.display());

        let archive = self.collect()?;
        if archive.is_empty() {
            warn!("{} is empty", &self.directory.display());
        }

        super::persist(&archive, &self.file, self.overwrite)
    }

    /// Mirror the directory into an archive, children sorted by name
    fn collect(&self) -> Result<Archive> {
        let root = self
            .directory
            .canonicalize()
            .into_diagnostic()
            .context(format!("path: {}", &self.directory.display()))?;

        let mut asar = AsarWriter::new(io::sink());
        // Depth of the entries that belong in the writer's current directory
        let mut depth = 1;

        for file in WalkDir::new(&root).min_depth(1).sort_by_file_name() {
            let file = file.into_diagnostic()?;

            while depth > file.depth() {
                asar.parent()?;
                depth -= 1;
            }

            let name = file
                .file_name()
                .to_str()
                .ok_or(miette!("unable to convert {} to a string", file.path().display()))?;

            if file.file_type().is_dir() {
                asar.add_dir(name, Flags::NONE)?;
                depth += 1;
            } else if file.path_is_symlink() {
                match link_target(&root, file.path()) {
                    LinkTarget::Inside(target) => {
                        asar.add_link(name, target, Flags::NONE)?;
                    }
                    LinkTarget::Dangling => warn!(
                        "skipping link {}, its target does not exist",
                        file.path().display()
                    ),
                    LinkTarget::Outside => warn!(
                        "skipping link {}, it points outside {}",
                        file.path().display(),
                        root.display()
                    ),
                }
            } else {
                info!("packing {}", file.path().display());

                let content = std::fs::read(file.path())
                    .into_diagnostic()
                    .context(format!("reading {}", file.path().display()))?;
                let metadata = file.metadata().into_diagnostic()?;

                asar.add_file(name, content, executable_flag(&metadata))
                    .context(format!("adding {}", file.path().display()))?;
            }
        }

        Ok(asar.into_archive())
    }
}

/// Where a symbolic link found while packing resolves to
#[derive(Debug, PartialEq)]
enum LinkTarget {
    /// `/` separated target relative to the packed directory
    Inside(String),
    /// The target cannot be resolved
    Dangling,
    /// The target is not below the packed directory
    Outside,
}

fn link_target(root: &Path, link: &Path) -> LinkTarget {
    let Ok(target) = link.canonicalize() else {
        return LinkTarget::Dangling;
    };
    let Ok(relative) = target.strip_prefix(root) else {
        return LinkTarget::Outside;
    };

    relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()
        .map_or(LinkTarget::Outside, |segments| LinkTarget::Inside(segments.join("/")))
}

#[cfg(unix)]
fn executable_flag(metadata: &Metadata) -> Flags {
    use std::os::unix::fs::PermissionsExt;

    if metadata.permissions().mode() & 0o111 != 0 {
        Flags::EXECUTABLE
    } else {
        Flags::NONE
    }
}

#[cfg(not(unix))]
fn executable_flag(_metadata: &Metadata) -> Flags {
    Flags::NONE
}
