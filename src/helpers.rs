use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre;
use color_eyre::eyre::WrapErr;
use image::{ImageFormat, RgbaImage};
use serde::Serialize;

pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

pub trait SavePngAtomic {
    fn save_png_atomic(&self, path: &Utf8Path) -> eyre::Result<()>;
}

impl SavePngAtomic for RgbaImage {
    fn save_png_atomic(&self, path: &Utf8Path) -> eyre::Result<()> {
        let partial_path = partial_path(path);

        self.save_with_format(&partial_path, ImageFormat::Png)
            .wrap_err_with(|| format!("Unable to encode '{partial_path}'"))?;

        fs::rename(&partial_path, path).wrap_err_with(|| format!("Unable to move '{partial_path}' into place"))?;

        Ok(())
    }
}

/// Writes next to the destination first so a killed process never leaves a truncated file under the final name.
pub fn write_atomic(path: &Utf8Path, contents: &[u8]) -> eyre::Result<()> {
    let partial_path = partial_path(path);

    fs::write(&partial_path, contents).wrap_err_with(|| format!("Unable to write '{partial_path}'"))?;
    fs::rename(&partial_path, path).wrap_err_with(|| format!("Unable to move '{partial_path}' into place"))?;

    Ok(())
}

/// Pretty-prints `value` to `path`, creating parent folders. Returns `false` when the file already held exactly that.
pub fn write_json<T: Serialize>(path: &Utf8Path, value: &T) -> eyre::Result<bool> {
    let serialized = serde_json::to_string_pretty(value)?;

    if fs::read_to_string(path).map(|existing| existing == serialized).unwrap_or(false) {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).wrap_err_with(|| format!("Unable to create '{parent}'"))?;
    }

    write_atomic(path, serialized.as_bytes())?;

    Ok(true)
}

fn partial_path(path: &Utf8Path) -> Utf8PathBuf {
    let mut partial = path.as_str().to_string();
    partial.push_str(".part");
    partial.into()
}

pub fn has_extension(path: &Utf8Path, extensions: &[&str]) -> bool {
    path.extension()
        .map(|extension| extensions.iter().any(|candidate| extension.eq_ignore_ascii_case(candidate)))
        .unwrap_or(false)
}

/// Regular files in `dir` with one of the given extensions (case-insensitive), sorted by name.
pub fn list_files(dir: &Utf8Path, extensions: &[&str]) -> eyre::Result<Vec<Utf8PathBuf>> {
    let mut files = vec![];

    for entry in dir.read_dir_utf8().wrap_err_with(|| format!("Unable to list '{dir}'"))? {
        let entry = entry?;

        if entry.file_type()?.is_file() && has_extension(entry.path(), extensions) {
            files.push(entry.into_path());
        }
    }

    files.sort();

    Ok(files)
}
