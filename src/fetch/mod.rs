//! Downloading card scans and metadata from the public card API.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use camino::Utf8Path;
use color_eyre::eyre;
use color_eyre::eyre::WrapErr;
use itertools::Itertools;
use rayon::iter::ParallelIterator;
use rayon::prelude::IntoParallelRefIterator;
use serde::{Deserialize, Serialize};

pub use client::{ApiCard, ApiSet, TcgClient};

use crate::canonical;
use crate::canonical::CardsMetadata;
use crate::config::CatalogPaths;
use crate::helpers;
use crate::helpers::SavePngAtomic;
use crate::progress::ProgressBar;

pub mod client;

pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_PROGRESS_FILE: &str = "download_progress.json";

/// Ids the upstream API has used for sets whose local id disagrees with it.
const SET_ID_ALIASES: &[(&str, &str)] = &[
    ("sm115", "sma"),
];

/// Result of probing a list of spellings for the first one that exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found { id: String, value: T },
    NotFound { tried: Vec<String> },
}

/// Looks `candidates` up in order. A lookup that errors counts as a miss, so one flaky spelling does not end the search.
pub fn first_found<T, F>(candidates: &[String], mut look_up: F) -> Lookup<T>
where
    F: FnMut(&str) -> eyre::Result<Option<T>>,
{
    for candidate in candidates {
        match look_up(candidate) {
            Ok(Some(value)) => return Lookup::Found { id: candidate.clone(), value },
            Ok(None) => tracing::debug!("'{}' not found.", candidate),
            Err(e) => tracing::warn!("Looking up '{}' failed: {e:#}", candidate),
        }
    }

    Lookup::NotFound { tried: candidates.to_vec() }
}

/// Spellings under which a half set (`sv3pt5`, `sv3.5`, `sv35`) might be listed, the given id first.
pub fn set_id_candidates(set_id: &str) -> Vec<String> {
    let set_id = set_id.trim().to_lowercase();
    let mut candidates = vec![set_id.clone()];

    let whole = set_id.strip_suffix("pt5")
        .or_else(|| set_id.strip_suffix(".5"))
        .or_else(|| {
            set_id.strip_suffix('5')
                .filter(|whole| whole.ends_with(|c: char| c.is_ascii_digit()))
        });

    if let Some(whole) = whole {
        candidates.push(format!("{whole}pt5"));
        candidates.push(format!("{whole}.5"));
        candidates.push(format!("{whole}5"));
    }

    for (local, upstream) in SET_ID_ALIASES {
        if set_id == *local {
            candidates.push(upstream.to_string());
        }
    }

    candidates.into_iter().unique().collect()
}

pub fn resolve_set(client: &TcgClient, set_id: &str) -> Lookup<ApiSet> {
    first_found(&set_id_candidates(set_id), |candidate| client.find_set(candidate))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedDownload {
    pub set_name: String,
    pub card_name: String,
}

/// Persisted between runs so an interrupted or partly failed fetch can pick up where it stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchProgress {
    #[serde(default)]
    pub completed_sets: BTreeSet<String>,
    /// Keyed by `{set id}_{card number}`.
    #[serde(default)]
    pub failed_downloads: BTreeMap<String, FailedDownload>,
}

impl FetchProgress {
    pub fn load(path: &Utf8Path) -> eyre::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).wrap_err_with(|| format!("Unable to read '{path}'"))?;

        serde_json::from_str(&contents).wrap_err_with(|| format!("'{path}' is not a valid progress file"))
    }

    /// Records `set_id` as completed once none of its downloads is still failing.
    pub fn mark_completed_if_clean(&mut self, set_id: &str) {
        let still_failing = self.failed_downloads.keys()
            .any(|key| key.rsplit_once('_').is_some_and(|(failed_set, _)| failed_set == set_id));

        if !still_failing {
            self.completed_sets.insert(set_id.to_string());
        }
    }

    pub fn save(&self, path: &Utf8Path) -> eyre::Result<()> {
        helpers::write_json(path, self)?;
        Ok(())
    }
}

fn failure_key(set_id: &str, number: &str) -> String {
    format!("{set_id}_{number}")
}

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub workers: usize,
    pub show_progress: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            show_progress: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub downloaded: usize,
    pub existing: usize,
    pub failed: usize,
    /// Cards whose canonical filename another card of the set already claims.
    pub duplicates: usize,
    pub already_completed: bool,
}

enum Outcome {
    Downloaded,
    Existing,
}

/// Keeps the first card per canonical filename; the rest would only overwrite the same file.
pub fn split_duplicate_filenames(cards: &[ApiCard]) -> (Vec<&ApiCard>, Vec<&ApiCard>) {
    let mut claimed = BTreeSet::new();

    cards.iter().partition(|card| claimed.insert(card.to_record().canonical_filename()))
}

fn download_card(client: &TcgClient, card: &ApiCard, set_dir: &Utf8Path) -> eyre::Result<Outcome> {
    let destination = set_dir.join(card.to_record().canonical_filename());

    if destination.exists() {
        return Ok(Outcome::Existing);
    }

    let bytes = client.download_image(card)?;

    // Everything on disk is a PNG under a .png name, whatever the source served.
    match image::guess_format(&bytes)? {
        image::ImageFormat::Png => helpers::write_atomic(&destination, &bytes)?,
        _ => image::load_from_memory(&bytes)?.to_rgba8().save_png_atomic(&destination)?,
    }

    Ok(Outcome::Downloaded)
}

fn download_cards(client: &TcgClient, cards: &[&ApiCard], set_dir: &Utf8Path, options: &FetchOptions) -> eyre::Result<Vec<eyre::Result<Outcome>>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers.max(1))
        .build()?;

    let progress_bar = options.show_progress.then(|| ProgressBar::start(cards.len()));

    let results = pool.install(|| {
        cards.par_iter()
            .map(|card| {
                let result = download_card(client, *card, set_dir);

                if let Some(progress_bar) = &progress_bar {
                    progress_bar.inc();
                }

                result
            })
            .collect::<Vec<_>>()
    });

    if let Some(progress_bar) = progress_bar {
        progress_bar.finish();
    }

    Ok(results)
}

/// Downloads every card of `set_id` into the folder of `set_name` and writes its canonical metadata.
///
/// Failed cards are recorded in `progress`; the set is only marked complete once nothing failed.
pub fn download_set(client: &TcgClient, paths: &CatalogPaths, set_name: &str, set_id: &str, options: &FetchOptions, progress: &mut FetchProgress) -> eyre::Result<DownloadReport> {
    if progress.completed_sets.contains(set_id) {
        tracing::info!("{}: set '{}' already completed, skipping.", set_name, set_id);
        return Ok(DownloadReport { already_completed: true, ..Default::default() });
    }

    let cards = client.cards_for_set(set_id)?;

    if cards.is_empty() {
        tracing::warn!("{}: no cards found for set '{}'.", set_name, set_id);
        return Ok(DownloadReport::default());
    }

    let set_dir = paths.set_dir(set_name);
    fs::create_dir_all(&set_dir).wrap_err_with(|| format!("Unable to create '{set_dir}'"))?;

    tracing::info!("{}: downloading {} card(s) of set '{}'...", set_name, cards.len(), set_id);

    let (unique, duplicates) = split_duplicate_filenames(&cards);

    for duplicate in &duplicates {
        tracing::warn!("{}: card #{} '{}' shares its filename with another card, not downloaded twice.", set_name, duplicate.number, duplicate.name);
    }

    let results = download_cards(client, &unique, &set_dir, options)?;

    let mut report = DownloadReport { duplicates: duplicates.len(), ..Default::default() };

    for (card, result) in unique.iter().zip(results) {
        let key = failure_key(set_id, &card.number);

        match result {
            Ok(outcome) => {
                progress.failed_downloads.remove(&key);

                match outcome {
                    Outcome::Downloaded => report.downloaded += 1,
                    Outcome::Existing => report.existing += 1,
                }
            }
            Err(e) => {
                tracing::error!("{}: card #{} '{}' failed: {e:#}", set_name, card.number, card.name);
                report.failed += 1;
                progress.failed_downloads.insert(key, FailedDownload {
                    set_name: set_name.to_string(),
                    card_name: card.name.clone(),
                });
            }
        }
    }

    let metadata = CardsMetadata { cards: cards.iter().map(ApiCard::to_record).collect() };
    canonical::write_metadata(&paths.metadata_path(set_name), &metadata)?;

    progress.mark_completed_if_clean(set_id);

    tracing::info!("{}: {} downloaded, {} already present, {} duplicate(s), {} failed.", set_name, report.downloaded, report.existing, report.duplicates, report.failed);

    Ok(report)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub retried: usize,
    pub recovered: usize,
}

/// Re-attempts every recorded failure, fetching each set's card list once.
pub fn retry_failed(client: &TcgClient, paths: &CatalogPaths, options: &FetchOptions, progress: &mut FetchProgress) -> eyre::Result<RetryReport> {
    let by_set = progress.failed_downloads.iter()
        .filter_map(|(key, failed)| {
            let (set_id, number) = key.rsplit_once('_')?;
            Some((set_id.to_string(), (number.to_string(), failed.set_name.clone())))
        })
        .into_group_map();

    let mut report = RetryReport::default();

    for (set_id, failures) in by_set {
        let cards = match client.cards_for_set(&set_id) {
            Ok(cards) => cards,
            Err(e) => {
                tracing::error!("Unable to list cards of set '{}': {e:#}", set_id);
                continue;
            }
        };

        for (number, set_name) in failures {
            let Some(card) = cards.iter().find(|card| card.number == number) else {
                tracing::warn!("Card #{} is no longer listed in set '{}'.", number, set_id);
                continue;
            };

            let set_dir = paths.set_dir(&set_name);
            fs::create_dir_all(&set_dir).wrap_err_with(|| format!("Unable to create '{set_dir}'"))?;

            report.retried += 1;

            match download_cards(client, &[card], &set_dir, options)?.remove(0) {
                Ok(_) => {
                    report.recovered += 1;
                    progress.failed_downloads.remove(&failure_key(&set_id, &number));
                }
                Err(e) => tracing::error!("{}: card #{} failed again: {e:#}", set_name, number),
            }
        }

        progress.mark_completed_if_clean(&set_id);
    }

    tracing::info!("Retried {} download(s), {} recovered.", report.retried, report.recovered);

    Ok(report)
}
