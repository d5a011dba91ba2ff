use asar_archive::{Archive, EntryId, Patch, Replacement};
use clap::Args;
use itertools::Itertools;
use miette::{Context, Result};
use owo_colors::OwoColorize;
use similar::{ChangeTag, TextDiff};
use std::path::PathBuf;
use tracing::info;

use crate::config;

#[derive(Args)]
pub struct PatchArgs {
    /// The archive to patch, defaults to the Blitz app archive
    #[arg(short, long, value_name = "FILE", env = "ASARP_FILE")]
    file: Option<PathBuf>,

    /// Only files whose name ends with this suffix are patched
    #[arg(short, long, default_value = ".js")]
    suffix: String,

    /// A substitution, may be repeated. Replaces the Blitz window calls when omitted
    #[arg(short, long = "replace", value_name = "MATCH=REPLACEMENT")]
    replacements: Vec<Replacement>,

    /// Print the changes without writing the archive
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

impl PatchArgs {
    pub fn handle(&self) -> Result<()> {
        let path = config::archive_path(self.file.as_deref())?;
        info!("patching {}", path.display());

        let replacements = if self.replacements.is_empty() {
            config::default_replacements()
        } else {
            self.replacements.clone()
        };
        info!(
            "replacing {}",
            replacements.iter().map(|r| format!("`{r}`")).join(", ")
        );

        let patch = Patch::builder()
            .suffix(self.suffix.clone())
            .replacements(replacements)
            .build();

        let mut archive =
            Archive::open(&path).context(format!("decoding {}", path.display()))?;
        let original = self.dry_run.then(|| archive.clone());

        let report = patch.apply(&mut archive);
        info!(
            "{} of {} files changed, {} replacements",
            report.changed, report.visited, report.replacements
        );

        if let Some(original) = original {
            for id in changed_files(&original, &archive) {
                print!(
                    "{}",
                    render_diff(
                        &original.path(id),
                        original[id].content(),
                        archive[id].content()
                    )
                );
            }
            return Ok(());
        }

        if report.changed == 0 {
            info!("nothing to change, leaving {} untouched", path.display());
            return Ok(());
        }

        super::persist(&archive, &path, true)
    }
}

/// Entries whose content differs. Both archives must share the same shape.
fn changed_files<'a>(
    before: &'a Archive,
    after: &'a Archive,
) -> impl Iterator<Item = EntryId> + 'a {
    before
        .walk()
        .zip(after.walk())
        .filter(|&(left, right)| before[left].content() != after[right].content())
        .map(|(left, _)| left)
}

fn render_diff(name: &str, old: &[u8], new: &[u8]) -> String {
    let old = String::from_utf8_lossy(old);
    let new = String::from_utf8_lossy(new);
    let diff = TextDiff::from_lines(old.as_ref(), new.as_ref());

    let mut output = format!("🔃 {}\n", name.blue());
    for op in diff.grouped_ops(1).iter().flatten() {
        for change in diff.iter_inline_changes(op) {
            let sign = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };

            let line = change
                .iter_strings_lossy()
                .map(|(emphasized, value)| match (change.tag(), emphasized) {
                    (ChangeTag::Insert, true) => format!("{}", value.green().underline()),
                    (ChangeTag::Insert, false) => format!("{}", value.green()),
                    (ChangeTag::Delete, true) => format!("{}", value.red().underline()),
                    (ChangeTag::Delete, false) => format!("{}", value.red()),
                    (ChangeTag::Equal, _) => format!("{}", value.dimmed()),
                })
                .join("");

            output.push_str(&format!("  {sign} {line}"));
            if change.missing_newline() {
                output.push('\n');
            }
        }
    }

    output
}

#[cfg(test)]
mod test {
    use asar_archive::{Archive, Flags, Replacement};
    use miette::IntoDiagnostic;
    use pretty_assertions::assert_eq;
    use std::{fs, path::Path};

    use super::{changed_files, render_diff, PatchArgs};
    use crate::commands::{persist, test::archive_bytes};
    use crate::config::default_replacements;

    fn patch_args(file: &Path, dry_run: bool) -> PatchArgs {
        PatchArgs {
            file: Some(file.to_path_buf()),
            suffix: ".js".to_owned(),
            replacements: Vec::new(),
            dry_run,
        }
    }

    fn window_archive(path: &Path) -> miette::Result<()> {
        let mut archive = Archive::new();
        let app = archive.add_dir(archive.root(), "app", Flags::NONE)?;
        archive.add_file(
            app,
            "main.js",
            "mainWindow.show(); mainWindow.focus();",
            Flags::NONE,
        )?;
        archive.add_file(archive.root(), "notes.txt", "mainWindow.show();", Flags::NONE)?;

        persist(&archive, path, false)
    }

    #[test]
    fn patch_rewrites_the_archive() -> miette::Result<()> {
        let dir = tempfile::tempdir().into_diagnostic()?;
        let path = dir.path().join("app.asar");
        window_archive(&path)?;

        patch_args(&path, false).handle()?;

        let archive = Archive::open(&path)?;
        let main = archive.by_path("app/main.js")?;
        assert_eq!(archive[main].content(), b"1+1; 1+1;");
        let notes = archive.by_path("notes.txt")?;
        assert_eq!(archive[notes].content(), b"mainWindow.show();");

        Ok(())
    }

    #[test]
    fn patch_with_custom_replacement() -> miette::Result<()> {
        let dir = tempfile::tempdir().into_diagnostic()?;
        let path = dir.path().join("app.asar");
        window_archive(&path)?;

        let mut args = patch_args(&path, false);
        args.replacements = vec![Replacement::new("mainWindow.focus();", "")];
        args.handle()?;

        let archive = Archive::open(&path)?;
        let main = archive.by_path("app/main.js")?;
        assert_eq!(archive[main].content(), b"mainWindow.show(); ");

        Ok(())
    }

    #[test]
    fn dry_run_leaves_the_archive_untouched() -> miette::Result<()> {
        let dir = tempfile::tempdir().into_diagnostic()?;
        let path = dir.path().join("app.asar");
        window_archive(&path)?;
        let before = fs::read(&path).into_diagnostic()?;

        patch_args(&path, true).handle()?;

        assert_eq!(fs::read(&path).into_diagnostic()?, before);

        Ok(())
    }

    #[test]
    fn no_match_leaves_the_archive_untouched() -> miette::Result<()> {
        let dir = tempfile::tempdir().into_diagnostic()?;
        let path = dir.path().join("app.asar");
        // A numeric offset would be written back as a string if the file were re-encoded
        let before = archive_bytes(
            r#"{"files":{"main.js":{"size":14,"offset":0},"notes.txt":{"size":4,"offset":14}}}"#,
            b"exports.x = 1;show",
        );
        fs::write(&path, &before).into_diagnostic()?;

        patch_args(&path, false).handle()?;

        assert_eq!(fs::read(&path).into_diagnostic()?, before);

        Ok(())
    }

    #[test]
    fn patch_missing_archive_fails() -> miette::Result<()> {
        let dir = tempfile::tempdir().into_diagnostic()?;
        let path = dir.path().join("missing.asar");

        assert!(patch_args(&path, false).handle().is_err());
        assert!(!path.exists());

        Ok(())
    }

    #[test]
    fn reports_only_changed_files() -> asar_archive::error::Result<()> {
        let mut archive = Archive::new();
        let app = archive.add_dir(archive.root(), "app", Flags::NONE)?;
        let main = archive.add_file(app, "main.js", "mainWindow.show();", Flags::NONE)?;
        archive.add_file(app, "util.js", "exports.x = 1;", Flags::NONE)?;
        archive.add_file(archive.root(), "notes.txt", "mainWindow.show();", Flags::NONE)?;

        let original = archive.clone();
        asar_archive::Patch::builder()
            .replacements(default_replacements())
            .build()
            .apply(&mut archive);

        assert_eq!(changed_files(&original, &archive).collect::<Vec<_>>(), vec![main]);

        Ok(())
    }

    #[test]
    fn diff_names_the_file_and_both_sides() {
        let rendered = render_diff(
            "app/main.js",
            b"const a = 1;\nmainWindow.show();\n",
            b"const a = 1;\n1+1;\n",
        );

        assert!(rendered.contains("app/main.js"));
        assert!(rendered.contains("  - "));
        assert!(rendered.contains("  + "));
        assert!(rendered.contains("show"));
    }
}
