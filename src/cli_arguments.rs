use std::str::FromStr;

use camino::Utf8PathBuf;

use crate::texture::Preset;

#[derive(gumdrop::Options)]
pub struct CliArguments {
    pub help: bool,

    #[options(help = "The mod's resource folder, containing assets/ and data/.", short = "r", meta = "<PATH>", default = "src/main/resources")]
    pub resources: Utf8PathBuf,

    #[options(help = "Mod id used as the asset namespace.", short = "n", meta = "<NAMESPACE>", default = "etbmod")]
    pub namespace: String,

    #[options(help = "Log every file that gets touched.", short = "v")]
    pub verbose: bool,

    #[options(command)]
    pub command: Option<Command>,
}

#[derive(gumdrop::Options)]
pub enum Command {
    #[options(help = "Resize a folder of images into fixed-size textures.")]
    Normalize(NormalizeArguments),

    #[options(help = "Rename card textures to their canonical filenames.")]
    Reconcile(ReconcileArguments),

    #[options(help = "Rewrite cards_metadata.json files into the canonical shape.")]
    Metadata(SetArguments),

    #[options(help = "Check every metadata entry against the textures on disk.")]
    Validate(ValidateArguments),

    #[options(help = "Generate models, blockstates, loot tables and lang entries.")]
    Assets(AssetsArguments),

    #[options(help = "Download card scans and metadata from the card API.")]
    Fetch(FetchArguments),
}

#[derive(gumdrop::Options)]
pub struct NormalizeArguments {
    pub help: bool,

    #[options(help = "Folder of source images.", short = "i", meta = "<PATH>", required)]
    pub input: Utf8PathBuf,

    #[options(help = "Folder to write to. Defaults to the input folder, normalizing in place.", short = "o", meta = "<PATH>")]
    pub output: Option<Utf8PathBuf>,

    #[options(help = "Options: card, padded-card, booster, power-of-two, etb-face", short = "p", meta = "<PRESET>", default = "card")]
    pub preset: Preset,

    #[options(help = "Override the preset's canvas size, e.g. 256x256.", short = "s", meta = "<WxH>")]
    pub size: Option<TextureSize>,

    #[options(help = "Override the preset's margin in pixels.", short = "m", meta = "<PIXELS>")]
    pub margin: Option<u32>,

    #[options(help = "Number of worker threads.", short = "w", meta = "<NUMBER>", default = "5")]
    pub workers: usize,

    #[options(help = "Show a progress bar.", no_short)]
    pub progress: bool,
}

#[derive(gumdrop::Options)]
pub struct ReconcileArguments {
    pub help: bool,

    #[options(help = "Only report what would be renamed or removed.", short = "d")]
    pub dry_run: bool,

    #[options(free, help = "Set folders to process. All sets when omitted.")]
    pub sets: Vec<String>,
}

#[derive(gumdrop::Options)]
pub struct SetArguments {
    pub help: bool,

    #[options(free, help = "Set folders to process. All sets when omitted.")]
    pub sets: Vec<String>,
}

#[derive(gumdrop::Options)]
pub struct ValidateArguments {
    pub help: bool,

    #[options(help = "Also report textures that are not exactly this size, e.g. 256x256.", short = "s", meta = "<WxH>")]
    pub size: Option<TextureSize>,

    #[options(free, help = "Set folders to check. All sets when omitted.")]
    pub sets: Vec<String>,
}

#[derive(gumdrop::Options)]
pub struct AssetsArguments {
    pub help: bool,

    #[options(help = "Only generate booster pack item models.", short = "b")]
    pub boosters_only: bool,
}

#[derive(gumdrop::Options)]
pub struct FetchArguments {
    pub help: bool,

    #[options(help = "Retry the downloads recorded as failed instead of fetching sets.", short = "r")]
    pub retry: bool,

    #[options(help = "Number of parallel downloads.", short = "w", meta = "<NUMBER>", default = "5")]
    pub workers: usize,

    #[options(help = "Where completed sets and failed downloads are remembered between runs.", short = "f", meta = "<PATH>", default = "download_progress.json")]
    pub progress_file: Utf8PathBuf,

    #[options(help = "Show a progress bar.", short = "p")]
    pub progress: bool,

    #[options(free, help = "Sets to download as <folder>=<set id>, or just <set id>.")]
    pub sets: Vec<SetRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSize(pub u32, pub u32);

impl FromStr for TextureSize {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s.split_once(['x', 'X']).ok_or("Expected a size like 256x256.")?;

        match (width.trim().parse(), height.trim().parse()) {
            (Ok(width), Ok(height)) if width > 0 && height > 0 => Ok(Self(width, height)),
            _ => Err("Expected a size like 256x256."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRequest {
    pub folder: String,
    pub set_id: String,
}

impl FromStr for SetRequest {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (folder, set_id) = s.split_once('=').unwrap_or((s, s));
        let (folder, set_id) = (folder.trim(), set_id.trim());

        if folder.is_empty() || set_id.is_empty() {
            return Err("Expected <folder>=<set id>.");
        }

        Ok(Self {
            folder: folder.to_string(),
            set_id: set_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use gumdrop::Options;

    use super::*;

    #[test]
    fn parses_subcommands_with_defaults() {
        let arguments = CliArguments::parse_args_default(&["normalize", "-i", "raw/boosters", "-p", "booster", "--progress"]).unwrap();

        assert_eq!(arguments.resources, Utf8PathBuf::from("src/main/resources"));
        assert_eq!(arguments.namespace, "etbmod");

        let Some(Command::Normalize(normalize)) = arguments.command else { panic!("expected normalize") };
        assert_eq!(normalize.input, Utf8PathBuf::from("raw/boosters"));
        assert_eq!(normalize.output, None);
        assert_eq!(normalize.preset, Preset::Booster);
        assert_eq!(normalize.workers, 5);
        assert!(normalize.progress);
    }

    #[test]
    fn fetch_set_requests() {
        let arguments = CliArguments::parse_args_default(&["fetch", "black_bolt=sv10.5b", "sv8"]).unwrap();

        let Some(Command::Fetch(fetch)) = arguments.command else { panic!("expected fetch") };
        assert_eq!(fetch.sets, vec![
            SetRequest { folder: "black_bolt".into(), set_id: "sv10.5b".into() },
            SetRequest { folder: "sv8".into(), set_id: "sv8".into() },
        ]);
        assert_eq!(fetch.progress_file, Utf8PathBuf::from("download_progress.json"));
    }

    #[test]
    fn texture_sizes() {
        assert_eq!("256x256".parse(), Ok(TextureSize(256, 256)));
        assert_eq!("32X48".parse(), Ok(TextureSize(32, 48)));
        assert!("0x48".parse::<TextureSize>().is_err());
        assert!("256".parse::<TextureSize>().is_err());
    }
}
