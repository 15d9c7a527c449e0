//! Model, blockstate, loot table and lang JSON for the item and block textures that ship with the mod.

use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre;
use color_eyre::eyre::WrapErr;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::CatalogPaths;
use crate::helpers;

pub const BOOSTER_BASE_MODEL: &str = "booster_pack_base";
pub const ETB_FRONT: &str = "etb_front";
pub const ETB_BACK: &str = "etb_back";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub parent: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub textures: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockState {
    pub variants: BTreeMap<String, BlockStateVariant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStateVariant {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<u16>,
}

/// `namespace:category/name`, the form every model reference takes.
pub fn resource_id(namespace: &str, category: &str, name: &str) -> String {
    format!("{namespace}:{category}/{name}")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetReport {
    pub written: usize,
    pub unchanged: usize,
}

impl AssetReport {
    fn record(&mut self, written: bool) {
        if written {
            self.written += 1;
        } else {
            self.unchanged += 1;
        }
    }
}

/// One item model per `etb_*_booster.png`, all sharing the pack base model.
pub fn generate_booster_models(paths: &CatalogPaths) -> eyre::Result<AssetReport> {
    let textures_dir = paths.item_textures_dir();
    let pattern = format!("{}/etb_*_booster.png", glob::Pattern::escape(textures_dir.as_str()));

    let mut report = AssetReport::default();

    let mut textures = glob::glob(&pattern)?
        .filter_map(|entry| match entry {
            Ok(path) => Utf8PathBuf::from_path_buf(path).ok(),
            Err(e) => {
                tracing::warn!("{e}");
                None
            }
        })
        .collect::<Vec<_>>();

    textures.sort();

    for texture in textures {
        let Some(name) = texture.file_stem() else { continue };

        let model = Model {
            parent: resource_id(&paths.namespace, "item", BOOSTER_BASE_MODEL),
            textures: BTreeMap::from([("layer0".to_string(), resource_id(&paths.namespace, "item", name))]),
        };

        report.record(helpers::write_json(&paths.item_models_dir().join(format!("{name}.json")), &model)?);
    }

    tracing::info!("Booster models: {} written, {} unchanged.", report.written, report.unchanged);

    Ok(report)
}

/// Block texture folders that carry at least a front and a back face, sorted.
pub fn find_etb_variants(paths: &CatalogPaths) -> eyre::Result<Vec<String>> {
    let block_dir = paths.block_textures_dir();

    if !block_dir.is_dir() {
        return Ok(vec![]);
    }

    let mut variants = vec![];

    for entry in block_dir.read_dir_utf8().wrap_err_with(|| format!("Unable to list '{block_dir}'"))? {
        let entry = entry?;

        if !entry.file_type()?.is_dir() {
            continue;
        }

        if [ETB_FRONT, ETB_BACK].iter().all(|face| entry.path().join(format!("{face}.png")).is_file()) {
            variants.push(entry.file_name().to_string());
        }
    }

    variants.sort();

    Ok(variants)
}

/// `etb_black_bolt` -> `Elite Trainer Box - Black Bolt`.
pub fn variant_display_name(variant: &str) -> String {
    let words = variant.strip_prefix("etb_").unwrap_or(variant)
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| match word.to_lowercase().as_str() {
            "etb" | "tcg" => word.to_uppercase(),
            lower => {
                let mut chars = lower.chars();
                chars.next()
                    .map(|first| first.to_uppercase().chain(chars).collect::<String>())
                    .unwrap_or_default()
            }
        })
        .collect::<Vec<_>>();

    format!("Elite Trainer Box - {}", words.join(" "))
}

fn facing_blockstate(namespace: &str, variant: &str) -> BlockState {
    let model = resource_id(namespace, "block", variant);

    let variants = [("north", None), ("east", Some(90)), ("south", Some(180)), ("west", Some(270))]
        .into_iter()
        .map(|(facing, y)| (format!("facing={facing}"), BlockStateVariant { model: model.clone(), y }))
        .collect();

    BlockState { variants }
}

fn block_model(namespace: &str, variant: &str, variant_dir: &Utf8Path) -> Model {
    let face_texture = |face: &str, fallback: &str| {
        let face = if variant_dir.join(format!("{face}.png")).is_file() { face } else { fallback };
        resource_id(namespace, "block", &format!("{variant}/{face}"))
    };

    let textures = BTreeMap::from([
        ("particle".to_string(), face_texture(ETB_FRONT, ETB_FRONT)),
        ("north".to_string(), face_texture(ETB_FRONT, ETB_FRONT)),
        ("south".to_string(), face_texture(ETB_BACK, ETB_BACK)),
        ("east".to_string(), face_texture("etb_right", ETB_FRONT)),
        ("west".to_string(), face_texture("etb_left", ETB_FRONT)),
        ("up".to_string(), face_texture("etb_top", ETB_FRONT)),
        ("down".to_string(), face_texture("etb_bottom", ETB_BACK)),
    ]);

    Model { parent: "block/cube".to_string(), textures }
}

fn loot_table(namespace: &str, variant: &str) -> Value {
    json!({
        "type": "minecraft:block",
        "pools": [{
            "rolls": 1,
            "entries": [{"type": "minecraft:item", "name": format!("{namespace}:{variant}")}]
        }]
    })
}

fn update_lang(paths: &CatalogPaths, variants: &[String]) -> eyre::Result<bool> {
    let lang_path = paths.lang_path();

    let mut entries: BTreeMap<String, Value> = if lang_path.exists() {
        let contents = fs::read_to_string(&lang_path).wrap_err_with(|| format!("Unable to read '{lang_path}'"))?;
        serde_json::from_str(&contents).wrap_err_with(|| format!("'{lang_path}' is not valid JSON"))?
    } else {
        BTreeMap::new()
    };

    entries.insert(format!("itemGroup.{}", paths.namespace), Value::from("Elite Trainer Boxes"));

    for variant in variants {
        entries.insert(format!("block.{}.{variant}", paths.namespace), Value::from(variant_display_name(variant)));
    }

    helpers::write_json(&lang_path, &entries)
}

/// Everything a placeable box needs: blockstate, block and item model, loot table, lang entry.
pub fn generate_etb_assets(paths: &CatalogPaths) -> eyre::Result<AssetReport> {
    let variants = find_etb_variants(paths)?;
    let namespace = paths.namespace.as_str();

    let mut report = AssetReport::default();

    for variant in &variants {
        let file_name = format!("{variant}.json");
        let variant_dir = paths.block_textures_dir().join(variant);

        report.record(helpers::write_json(&paths.blockstates_dir().join(&file_name), &facing_blockstate(namespace, variant))?);
        report.record(helpers::write_json(&paths.block_models_dir().join(&file_name), &block_model(namespace, variant, &variant_dir))?);

        let item_model = Model { parent: resource_id(namespace, "block", variant), textures: BTreeMap::new() };
        report.record(helpers::write_json(&paths.item_models_dir().join(&file_name), &item_model)?);

        report.record(helpers::write_json(&paths.block_loot_tables_dir().join(&file_name), &loot_table(namespace, variant))?);

        tracing::debug!("Generated assets for '{}'.", variant);
    }

    if !variants.is_empty() {
        report.record(update_lang(paths, &variants)?);
    }

    tracing::info!("ETB assets for {} variant(s): {} written, {} unchanged.", variants.len(), report.written, report.unchanged);

    Ok(report)
}
