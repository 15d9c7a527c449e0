use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre;
use color_eyre::eyre::WrapErr;

pub const DEFAULT_NAMESPACE: &str = "etbmod";
pub const DEFAULT_METADATA_FILENAME: &str = "cards_metadata.json";

/// Where every generated asset lives, derived once from the mod's resource folder and handed to each component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPaths {
    pub assets_root: Utf8PathBuf,
    pub data_root: Utf8PathBuf,
    pub namespace: String,
    pub metadata_filename: String,
}

impl CatalogPaths {
    /// `resources` is the `src/main/resources` folder of the mod.
    pub fn from_resources(resources: &Utf8Path, namespace: &str) -> Self {
        Self {
            assets_root: resources.join("assets").join(namespace),
            data_root: resources.join("data").join(namespace),
            namespace: namespace.to_string(),
            metadata_filename: DEFAULT_METADATA_FILENAME.to_string(),
        }
    }

    pub fn cards_dir(&self) -> Utf8PathBuf {
        self.assets_root.join("textures").join("cards")
    }

    pub fn set_dir(&self, set_name: &str) -> Utf8PathBuf {
        self.cards_dir().join(set_name)
    }

    pub fn metadata_path(&self, set_name: &str) -> Utf8PathBuf {
        self.set_dir(set_name).join(&self.metadata_filename)
    }

    pub fn item_textures_dir(&self) -> Utf8PathBuf {
        self.assets_root.join("textures").join("item")
    }

    pub fn block_textures_dir(&self) -> Utf8PathBuf {
        self.assets_root.join("textures").join("block")
    }

    pub fn item_models_dir(&self) -> Utf8PathBuf {
        self.assets_root.join("models").join("item")
    }

    pub fn block_models_dir(&self) -> Utf8PathBuf {
        self.assets_root.join("models").join("block")
    }

    pub fn blockstates_dir(&self) -> Utf8PathBuf {
        self.assets_root.join("blockstates")
    }

    pub fn lang_path(&self) -> Utf8PathBuf {
        self.assets_root.join("lang").join("en_us.json")
    }

    pub fn block_loot_tables_dir(&self) -> Utf8PathBuf {
        self.data_root.join("loot_tables").join("blocks")
    }

    /// Set directory names below the cards folder, sorted. A missing cards folder yields no sets.
    pub fn set_names(&self) -> eyre::Result<Vec<String>> {
        let cards_dir = self.cards_dir();

        if !cards_dir.is_dir() {
            tracing::warn!("Cards directory '{}' does not exist.", cards_dir);
            return Ok(vec![]);
        }

        let mut set_names = vec![];

        for entry in cards_dir.read_dir_utf8().wrap_err_with(|| format!("Unable to list '{cards_dir}'"))? {
            let entry = entry?;

            if entry.file_type()?.is_dir() {
                set_names.push(entry.file_name().to_string());
            }
        }

        set_names.sort();

        Ok(set_names)
    }

    /// Either the explicitly requested sets or every set on disk.
    pub fn select_sets(&self, requested: &[String]) -> eyre::Result<Vec<String>> {
        if requested.is_empty() {
            self.set_names()
        } else {
            Ok(requested.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_follows_resource_folder() {
        let paths = CatalogPaths::from_resources(Utf8Path::new("src/main/resources"), "etbmod");

        assert_eq!(paths.cards_dir(), Utf8PathBuf::from("src/main/resources/assets/etbmod/textures/cards"));
        assert_eq!(paths.metadata_path("black_bolt"), Utf8PathBuf::from("src/main/resources/assets/etbmod/textures/cards/black_bolt/cards_metadata.json"));
        assert_eq!(paths.block_loot_tables_dir(), Utf8PathBuf::from("src/main/resources/data/etbmod/loot_tables/blocks"));
    }

    #[test]
    fn set_names_are_sorted_directories_only() {
        let temp_dir = tempfile::tempdir().unwrap();
        let resources = Utf8Path::from_path(temp_dir.path()).unwrap();
        let paths = CatalogPaths::from_resources(resources, "etbmod");

        std::fs::create_dir_all(paths.set_dir("white_flare")).unwrap();
        std::fs::create_dir_all(paths.set_dir("black_bolt")).unwrap();
        std::fs::write(paths.cards_dir().join("notes.txt"), "x").unwrap();

        assert_eq!(paths.set_names().unwrap(), vec!["black_bolt".to_string(), "white_flare".to_string()]);
        assert_eq!(paths.select_sets(&["white_flare".to_string()]).unwrap(), vec!["white_flare".to_string()]);
    }
}
