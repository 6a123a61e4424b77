//! Asset scanning functions (pure, no side effects).

use std::path::{Path, PathBuf};

use jwalk::WalkDir;

use super::AssetKind;

/// Collect every file under `root` whose kind satisfies `wanted`.
///
/// Paths are sorted so log output is stable between runs. Anything under
/// `exclude` (the image cache, when it lives inside the site) is skipped.
///
/// # Pure Function
///
/// This function only reads the filesystem and returns data
pub fn scan_assets(
    root: &Path,
    exclude: Option<&Path>,
    wanted: impl Fn(AssetKind) -> bool,
) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .skip_hidden(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|p| exclude.is_none_or(|dir| !p.starts_with(dir)))
        .filter(|p| AssetKind::from_path(p).is_some_and(&wanted))
        .collect();
    files.sort();
    files
}
