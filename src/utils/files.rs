use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extension of images served by the primary host
pub const PRIMARY_EXT: &str = "png";
/// Extension of images served by the fallback host
pub const FALLBACK_EXT: &str = "webp";

const PARTIAL_SUFFIX: &str = ".part";

/// Root of the image tree under the base directory
pub fn images_root(base_path: &Path) -> PathBuf {
    base_path.join("images")
}

/// `<base>/images/<language>/cards-by-set/<set_code>/<number>.<ext>`
pub fn image_path(base_path: &Path, language: &str, set_code: &str, number: u32, ext: &str) -> PathBuf {
    images_root(base_path)
        .join(language)
        .join("cards-by-set")
        .join(set_code)
        .join(format!("{number}.{ext}"))
}

/// In-progress sibling of a download target, e.g. `5.png.part`
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}

/// Ensure the image root exists
pub fn ensure_directories(base_path: &Path) -> io::Result<()> {
    let root = images_root(base_path);
    if !root.exists() {
        fs::create_dir_all(&root)?;
        tracing::info!(path = %root.display(), "Created directory");
    }
    Ok(())
}

/// Delete `.part` files left behind by an interrupted run
pub fn sweep_partial_files(base_path: &Path) -> io::Result<usize> {
    let root = images_root(base_path);
    if !root.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in WalkDir::new(&root) {
        let entry = entry.map_err(io::Error::from)?;
        let is_partial = entry.file_type().is_file()
            && entry
                .file_name()
                .to_string_lossy()
                .ends_with(PARTIAL_SUFFIX);
        if is_partial {
            fs::remove_file(entry.path())?;
            tracing::debug!(path = %entry.path().display(), "Removed partial download");
            removed += 1;
        }
    }
    Ok(removed)
}

/// Count set directories per language under the image root
pub fn count_set_directories(base_path: &Path, languages: &[String]) -> io::Result<Vec<(String, usize)>> {
    let mut counts = Vec::with_capacity(languages.len());
    for language in languages {
        let sets_dir = images_root(base_path).join(language).join("cards-by-set");
        let count = if sets_dir.exists() {
            fs::read_dir(&sets_dir)?
                .filter_map(|entry| {
                    entry.ok().and_then(|e| {
                        if e.file_type().ok()?.is_dir() {
                            Some(())
                        } else {
                            None
                        }
                    })
                })
                .count()
        } else {
            0
        };
        counts.push((language.clone(), count));
    }
    Ok(counts)
}
