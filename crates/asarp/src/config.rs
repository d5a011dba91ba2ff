//! Defaults for locating the archive and choosing what to patch

use asar_archive::Replacement;
use miette::{miette, Result};
use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
};

/// Location of the Blitz desktop app archive below the local application data directory
const BLITZ_ARCHIVE: [&str; 4] = ["Blitz", "current", "resources", "app.asar"];

/// Replacements used when none are given on the command line.
///
/// Both calls would raise the Blitz window when the app starts, `1+1;` keeps the script valid.
pub fn default_replacements() -> Vec<Replacement> {
    vec![
        Replacement::new("mainWindow.show();", "1+1;"),
        Replacement::new("mainWindow.focus();", "1+1;"),
    ]
}

/// Use `path` if given, otherwise fall back to the Blitz app archive
pub fn archive_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => default_archive_path().ok_or_else(|| {
            miette!(
                help = "pass --file or set ASARP_FILE",
                "unable to locate the default archive, neither LOCALAPPDATA nor APPDATA is set"
            )
        }),
    }
}

/// `%LOCALAPPDATA%\Blitz\current\resources\app.asar`
pub fn default_archive_path() -> Option<PathBuf> {
    let dir = local_app_data(env::var_os("LOCALAPPDATA"), env::var_os("APPDATA"))?;
    Some(BLITZ_ARCHIVE.iter().fold(dir, |path, segment| path.join(segment)))
}

fn local_app_data(local: Option<OsString>, roaming: Option<OsString>) -> Option<PathBuf> {
    if let Some(local) = local.filter(|dir| !dir.is_empty()) {
        return Some(local.into());
    }

    // APPDATA points at `AppData\Roaming`, the local directory sits next to it
    let roaming = PathBuf::from(roaming.filter(|dir| !dir.is_empty())?);
    match roaming.file_name() {
        Some(name) if name.eq_ignore_ascii_case("Roaming") => {
            roaming.parent().map(|parent| parent.join("Local"))
        }
        _ => None,
    }
}
