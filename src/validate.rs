use std::collections::BTreeSet;

use color_eyre::eyre;

use crate::canonical;
use crate::canonical::CardRecord;
use crate::config::CatalogPaths;
use crate::helpers;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTexture {
    pub record: CardRecord,
    pub expected: String,
    /// Some other file carrying the same card number, usually a spelling that drifted.
    pub candidate: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetReport {
    pub set_name: String,
    pub total: usize,
    pub matched: usize,
    pub missing: Vec<MissingTexture>,
    pub orphans: Vec<String>,
    pub wrong_size: Vec<(String, (u32, u32))>,
    pub unreadable: Vec<String>,
}

impl SetReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.orphans.is_empty() && self.wrong_size.is_empty() && self.unreadable.is_empty()
    }
}

/// Diffs the filenames a set's metadata expects against what is on disk. Reports only, never repairs.
///
/// Returns `None` when the set has no metadata file.
pub fn validate_set(paths: &CatalogPaths, set_name: &str, expected_size: Option<(u32, u32)>) -> eyre::Result<Option<SetReport>> {
    let set_dir = paths.set_dir(set_name);
    let metadata_path = paths.metadata_path(set_name);

    if !metadata_path.exists() {
        return Ok(None);
    }

    let metadata = canonical::load_metadata(&metadata_path, set_name)?;

    let files = helpers::list_files(&set_dir, &["png"])?;
    let file_names = files.iter()
        .filter_map(|path| path.file_name().map(str::to_string))
        .collect::<BTreeSet<_>>();

    let mut report = SetReport {
        set_name: set_name.to_string(),
        total: metadata.cards.len(),
        ..Default::default()
    };

    let mut referenced = BTreeSet::new();

    for record in metadata.cards {
        let expected = record.canonical_filename();

        if file_names.contains(&expected) {
            report.matched += 1;
        } else {
            let prefix = format!("{}_", canonical::canonical_number(&record.number));
            let candidate = file_names.iter()
                .find(|name| name.starts_with(&prefix) && !referenced.contains(*name))
                .cloned();

            report.missing.push(MissingTexture { record, expected: expected.clone(), candidate });
        }

        referenced.insert(expected);
    }

    report.orphans = file_names.difference(&referenced).cloned().collect();

    for file in &files {
        let Some(name) = file.file_name() else { continue };

        match image::image_dimensions(file) {
            Ok(dimensions) => {
                if expected_size.is_some_and(|expected| expected != dimensions) {
                    report.wrong_size.push((name.to_string(), dimensions));
                }
            }
            Err(e) => {
                tracing::warn!("Unable to read '{}': {e}", file);
                report.unreadable.push(name.to_string());
            }
        }
    }

    Ok(Some(report))
}

pub fn log_report(report: &SetReport) {
    if report.is_clean() {
        tracing::info!("{}: all {} texture(s) mapped correctly.", report.set_name, report.total);
        return;
    }

    tracing::warn!("{}: {}/{} texture(s) mapped correctly.", report.set_name, report.matched, report.total);

    for missing in &report.missing {
        match &missing.candidate {
            Some(candidate) => tracing::warn!("  #{} {}: expected '{}', found '{}'", missing.record.number, missing.record.name, missing.expected, candidate),
            None => tracing::warn!("  #{} {}: expected '{}', MISSING", missing.record.number, missing.record.name, missing.expected),
        }
    }

    for orphan in &report.orphans {
        tracing::warn!("  '{}' is not referenced by the metadata", orphan);
    }

    for (name, (width, height)) in &report.wrong_size {
        tracing::warn!("  '{}' is {}x{}", name, width, height);
    }

    for name in &report.unreadable {
        tracing::warn!("  '{}' could not be decoded", name);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8Path;
    use image::RgbaImage;

    use super::*;

    #[test]
    fn reports_drifted_missing_and_orphaned_textures() {
        let temp_dir = tempfile::tempdir().unwrap();
        let resources = Utf8Path::from_path(temp_dir.path()).unwrap();
        let paths = CatalogPaths::from_resources(resources, "etbmod");
        let set_dir = paths.set_dir("phantom_forces");
        fs::create_dir_all(&set_dir).unwrap();

        fs::write(paths.metadata_path("phantom_forces"), r#"{"cards": [
            {"id": "xy4-1", "name": "Flabébé", "number": "1", "rarity": "Common"},
            {"id": "xy4-2", "name": "Mr. Mime", "number": "2", "rarity": "Rare"},
            {"id": "xy4-3", "name": "Nidoran♀", "number": "3", "rarity": "Common"}
        ]}"#).unwrap();

        RgbaImage::new(256, 256).save(set_dir.join("001_common_flabebe.png")).unwrap();
        RgbaImage::new(183, 256).save(set_dir.join("002_rare_mr._mime.png")).unwrap();
        RgbaImage::new(256, 256).save(set_dir.join("099_common_stray.png")).unwrap();

        let report = validate_set(&paths, "phantom_forces", Some((256, 256))).unwrap().unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.matched, 1);
        assert_eq!(report.missing.len(), 2);
        assert_eq!(report.missing[0].expected, "002_rare_mr_mime.png");
        assert_eq!(report.missing[0].candidate.as_deref(), Some("002_rare_mr._mime.png"));
        assert_eq!(report.missing[1].expected, "003_common_nidoranf.png");
        assert_eq!(report.missing[1].candidate, None);
        assert_eq!(report.orphans, vec!["002_rare_mr._mime.png".to_string(), "099_common_stray.png".to_string()]);
        assert_eq!(report.wrong_size, vec![("002_rare_mr._mime.png".to_string(), (183, 256))]);
        assert!(!report.is_clean());
    }

    #[test]
    fn sets_without_metadata_are_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let resources = Utf8Path::from_path(temp_dir.path()).unwrap();
        let paths = CatalogPaths::from_resources(resources, "etbmod");
        fs::create_dir_all(paths.set_dir("empty")).unwrap();

        assert_eq!(validate_set(&paths, "empty", None).unwrap(), None);
    }
}
