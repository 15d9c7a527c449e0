use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre;
use color_eyre::eyre::WrapErr;

use crate::canonical::canonical_file_name;
use crate::helpers;

/// A file that normalized onto a name that was already taken. The existing file is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub kept: String,
    pub removed: String,
    /// Whether both files had the same bytes, i.e. nothing was lost.
    pub identical: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub renamed: Vec<(String, String)>,
    pub conflicts: Vec<Conflict>,
    pub failures: Vec<(String, String)>,
}

impl ReconcileReport {
    /// Number of filesystem changes made (or planned, on a dry run).
    pub fn operations(&self) -> usize {
        self.renamed.len() + self.conflicts.len()
    }

    pub fn lost_conflicts(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter().filter(|conflict| !conflict.identical)
    }
}

/// Renames every `.png` in `dir` to its canonical name.
///
/// When the canonical name is already taken, the file holding it wins and the other one is deleted
/// and reported. Already canonical files are never touched, so a second run is a no-op.
pub fn reconcile_filenames(dir: &Utf8Path, dry_run: bool) -> eyre::Result<ReconcileReport> {
    let files = helpers::list_files(dir, &["png"])?;

    // Name -> file currently holding that content (differs from the name only on a dry run).
    let mut present = files.iter()
        .filter_map(|file| Some((file.file_name()?.to_string(), file.clone())))
        .collect::<BTreeMap<String, Utf8PathBuf>>();

    let mut report = ReconcileReport::default();

    for file in &files {
        let Some(name) = file.file_name() else { continue };
        let canonical = canonical_file_name(name);

        if canonical == name {
            continue;
        }

        let target = dir.join(&canonical);

        if let Some(holder) = present.get(&canonical) {
            let identical = match (fs::read(file), fs::read(holder)) {
                (Ok(removed), Ok(kept)) => removed == kept,
                _ => false,
            };

            tracing::warn!("'{}' normalizes to existing '{}'{}, removing it.", name, canonical, if identical { "" } else { " with different contents" });

            if !dry_run {
                if let Err(e) = fs::remove_file(file).wrap_err_with(|| format!("Unable to remove '{file}'")) {
                    tracing::error!("{e:#}");
                    report.failures.push((name.to_string(), format!("{e:#}")));
                    continue;
                }
            }

            present.remove(name);
            report.conflicts.push(Conflict {
                kept: canonical,
                removed: name.to_string(),
                identical,
            });
        } else {
            if !dry_run {
                if let Err(e) = fs::rename(file, &target).wrap_err_with(|| format!("Unable to rename '{file}'")) {
                    tracing::error!("{e:#}");
                    report.failures.push((name.to_string(), format!("{e:#}")));
                    continue;
                }
            }

            tracing::debug!("Renamed '{}' -> '{}'.", name, canonical);

            present.remove(name);
            present.insert(canonical.clone(), if dry_run { file.clone() } else { target });
            report.renamed.push((name.to_string(), canonical));
        }
    }

    Ok(report)
}
