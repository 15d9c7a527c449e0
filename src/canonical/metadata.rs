use std::fs;

use camino::Utf8Path;
use color_eyre::eyre;
use color_eyre::eyre::{eyre, WrapErr};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::CardRecord;
use crate::config::CatalogPaths;
use crate::helpers;

pub const DEFAULT_RARITY: &str = "Common";

/// The canonical `cards_metadata.json` document: one `cards` array, catalog order kept.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardsMetadata {
    pub cards: Vec<CardRecord>,
}

impl CardsMetadata {
    /// Fails instead of guessing when the document has no `cards` array, so a malformed sidecar is never rewritten empty.
    pub fn from_upstream(set_name: &str, document: &Value) -> eyre::Result<Self> {
        let cards = document.get("cards")
            .and_then(Value::as_array)
            .ok_or_else(|| eyre!("no cards array"))?;

        let cards = cards.iter()
            .enumerate()
            .map(|(index, card)| match card {
                Value::Object(_) => Ok(card_from_upstream(set_name, card)),
                _ => Err(eyre!("cards[{index}] is not an object")),
            })
            .collect::<eyre::Result<Vec<_>>>()?;

        Ok(Self { cards })
    }
}

// Upstream dumps disagree on types (numbers as integers, missing ids), so read fields loosely.
fn text_field(card: &Value, key: &str) -> Option<String> {
    match card.get(key)? {
        Value::Null => None,
        Value::String(text) => Some(text.trim().to_string()),
        other => Some(other.to_string()),
    }
}

fn card_from_upstream(set_name: &str, card: &Value) -> CardRecord {
    let number = text_field(card, "number").unwrap_or_default();

    let id = text_field(card, "id")
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("{set_name}-{number:0>3}"));

    let rarity = text_field(card, "rarity")
        .filter(|rarity| !rarity.is_empty())
        .map(|rarity| rarity.replace('_', " "))
        .unwrap_or_else(|| DEFAULT_RARITY.to_string());

    CardRecord {
        id,
        name: text_field(card, "name").unwrap_or_default(),
        number,
        rarity,
    }
}

/// Reads a sidecar in either the canonical or an upstream shape.
pub fn load_metadata(path: &Utf8Path, set_name: &str) -> eyre::Result<CardsMetadata> {
    let contents = fs::read_to_string(path).wrap_err_with(|| format!("Unable to read '{path}'"))?;
    let document: Value = serde_json::from_str(&contents).wrap_err_with(|| format!("'{path}' is not valid JSON"))?;

    CardsMetadata::from_upstream(set_name, &document).wrap_err_with(|| format!("'{path}' is not a cards metadata file"))
}

/// Writes the canonical form; returns `false` without touching the file when it is already identical.
pub fn write_metadata(path: &Utf8Path, metadata: &CardsMetadata) -> eyre::Result<bool> {
    helpers::write_json(path, metadata)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataOutcome {
    Missing,
    Unchanged(usize),
    Rewritten(usize),
}

pub fn canonicalize_set_metadata(paths: &CatalogPaths, set_name: &str) -> eyre::Result<MetadataOutcome> {
    let metadata_path = paths.metadata_path(set_name);

    if !metadata_path.exists() {
        tracing::warn!("{}: no metadata file found.", set_name);
        return Ok(MetadataOutcome::Missing);
    }

    let metadata = load_metadata(&metadata_path, set_name)?;
    let count = metadata.cards.len();

    if write_metadata(&metadata_path, &metadata)? {
        tracing::info!("{}: rewrote metadata for {} card(s).", set_name, count);
        Ok(MetadataOutcome::Rewritten(count))
    } else {
        tracing::debug!("{}: metadata already canonical.", set_name);
        Ok(MetadataOutcome::Unchanged(count))
    }
}
