use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre;
use color_eyre::eyre::WrapErr;
use image::DynamicImage;
use rayon::iter::ParallelIterator;
use rayon::prelude::IntoParallelRefIterator;

use crate::helpers;
use crate::helpers::SavePngAtomic;
use crate::progress::ProgressBar;
use crate::texture::{normalize_texture, TextureSpec};

pub const DEFAULT_WORKERS: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub workers: usize,
    pub show_progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            show_progress: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub written: usize,
    pub unchanged: usize,
    /// Outputs that already existed from an earlier, interrupted run.
    pub skipped: usize,
    pub failures: Vec<(Utf8PathBuf, String)>,
    /// Sources left out because another source maps to the same output, paired with the one that was kept.
    pub conflicts: Vec<(Utf8PathBuf, Utf8PathBuf)>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.written + self.unchanged
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

enum Outcome {
    Written,
    Unchanged,
    Skipped,
}

/// Normalizes every image in `input` into `output` (which may be the same folder).
///
/// Per-file failures are logged and counted; only problems with the folders themselves abort the batch.
pub fn normalize_directory(input: &Utf8Path, output: &Utf8Path, spec: &TextureSpec, options: &BatchOptions) -> eyre::Result<BatchReport> {
    let sources = helpers::list_files(input, &helpers::IMAGE_EXTENSIONS)?;

    fs::create_dir_all(output).wrap_err_with(|| format!("Unable to create '{output}'"))?;

    let in_place = input.canonicalize_utf8()? == output.canonicalize_utf8()?;
    let output = if in_place { input } else { output };

    tracing::info!("Normalizing {} image(s) from '{}' into '{}'...", sources.len(), input, output);

    let mut report = BatchReport::default();
    let jobs = claim_destinations(&sources, output, &mut report);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers.max(1))
        .build()?;

    let progress_bar = options.show_progress.then(|| ProgressBar::start(jobs.len()));

    let results = pool.install(|| {
        jobs.par_iter()
            .map(|(source, destination)| {
                let result = normalize_file(source, destination, spec);

                if let Some(progress_bar) = &progress_bar {
                    progress_bar.inc();
                }

                (*source, result)
            })
            .collect::<Vec<_>>()
    });

    if let Some(progress_bar) = progress_bar {
        progress_bar.finish();
    }

    for (source, result) in results {
        match result {
            Ok(Outcome::Written) => report.written += 1,
            Ok(Outcome::Unchanged) => report.unchanged += 1,
            Ok(Outcome::Skipped) => report.skipped += 1,
            Err(e) => {
                tracing::error!("Failed to process '{}': {e:#}", source);
                report.failures.push((source.clone(), format!("{e:#}")));
            }
        }
    }

    tracing::info!(
        "Processed {} image(s): {} written, {} already canonical, {} skipped, {} conflicting, {} failed.",
        sources.len(), report.written, report.unchanged, report.skipped, report.conflicts.len(), report.failed()
    );

    Ok(report)
}

fn destination_for(source: &Utf8Path, output_dir: &Utf8Path) -> eyre::Result<Utf8PathBuf> {
    let stem = source.file_stem().ok_or_else(|| eyre::eyre!("'{source}' has no file name"))?;
    Ok(output_dir.join(format!("{stem}.png")))
}

/// Pairs every source with its output, keeping a single source per output so no two workers write the same file.
///
/// A source already named like its output (`a.png` next to `a.jpg`) wins, otherwise the first in name order.
fn claim_destinations<'a>(sources: &'a [Utf8PathBuf], output_dir: &Utf8Path, report: &mut BatchReport) -> Vec<(&'a Utf8PathBuf, Utf8PathBuf)> {
    let mut claims: BTreeMap<Utf8PathBuf, Vec<&'a Utf8PathBuf>> = BTreeMap::new();

    for source in sources {
        match destination_for(source, output_dir) {
            Ok(destination) => claims.entry(destination).or_default().push(source),
            Err(e) => {
                tracing::error!("{e:#}");
                report.failures.push((source.clone(), format!("{e:#}")));
            }
        }
    }

    let mut jobs = vec![];

    for (destination, mut claimants) in claims {
        let kept = claimants.iter()
            .position(|source| source.file_name() == destination.file_name())
            .unwrap_or(0);
        let kept = claimants.remove(kept);

        for dropped in claimants {
            tracing::warn!("'{}' and '{}' both map to '{}', keeping the latter.", dropped, kept, destination);
            report.conflicts.push((dropped.clone(), kept.clone()));
        }

        jobs.push((kept, destination));
    }

    jobs
}

fn normalize_file(source: &Utf8Path, destination: &Utf8Path, spec: &TextureSpec) -> eyre::Result<Outcome> {
    if destination != source && destination.exists() {
        tracing::debug!("'{}' already exists, skipping.", destination);
        return Ok(Outcome::Skipped);
    }

    let image = image::open(source).wrap_err_with(|| format!("Unable to decode '{source}'"))?;

    if destination == source && is_already_canonical(&image, spec) {
        return Ok(Outcome::Unchanged);
    }

    normalize_texture(&image, spec).save_png_atomic(destination)?;

    Ok(Outcome::Written)
}

fn is_already_canonical(image: &DynamicImage, spec: &TextureSpec) -> bool {
    let dimensions = (image.width(), image.height());

    matches!(image, DynamicImage::ImageRgba8(_)) && spec.target_dimensions(dimensions) == dimensions
}
