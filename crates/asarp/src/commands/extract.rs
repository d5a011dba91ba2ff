use asar_archive::{Archive, EntryKind, Flags};
use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use std::{
    fs::File,
    io::Write,
    path::{Component, Path, PathBuf},
};
use tracing::{info, warn};

#[derive(Args)]
pub struct ExtractArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = Archive::open(&self.file)
            .context(format!("decoding {}", &self.file.display()))?;

        std::fs::create_dir_all(&self.directory)
            .into_diagnostic()
            .context(format!("creating {}", &self.directory.display()))?;

        for id in archive.walk() {
            let entry = &archive[id];
            let p = self.destination(&archive.path(id))?;

            match entry.kind() {
                EntryKind::Directory(_) => {
                    std::fs::create_dir_all(&p)
                        .into_diagnostic()
                        .context(format!("creating {}", &p.display()))?;
                }
                EntryKind::File(content) => {
                    info!("writing {}", p.display());

                    let mut out = if !self.overwrite {
                        File::create_new(&p)
                            .into_diagnostic()
                            .context(format!("creating {}", &p.display()))?
                    } else {
                        File::create(&p)
                            .into_diagnostic()
                            .context(format!("creating {}", &p.display()))?
                    };

                    out.write_all(content)
                        .into_diagnostic()
                        .context(format!("writing {}", &p.display()))?;

                    if entry.flags().contains(Flags::EXECUTABLE) {
                        mark_executable(&out)
                            .into_diagnostic()
                            .context(format!("setting permissions of {}", &p.display()))?;
                    }
                }
                EntryKind::Unpacked(_) => {
                    warn!("skipping {}, it is stored outside the archive", archive.path(id));
                }
                EntryKind::Link(target) => {
                    warn!("skipping link {} -> {}", archive.path(id), target);
                }
            }
        }

        Ok(())
    }

    /// Location of an archive path below the target directory
    fn destination(&self, relative: &str) -> Result<PathBuf> {
        relative
            .split('/')
            .try_fold(self.directory.clone(), |path, segment| {
                let mut components = Path::new(segment).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(part)), None) if part == segment => {
                        Ok(path.join(part))
                    }
                    _ => Err(miette!(
                        "refusing to extract {relative}, it would leave {}",
                        self.directory.display()
                    )),
                }
            })
    }
}

#[cfg(unix)]
fn mark_executable(file: &File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = file.metadata()?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    file.set_permissions(permissions)
}

#[cfg(not(unix))]
fn mark_executable(_file: &File) -> std::io::Result<()> {
    Ok(())
}
