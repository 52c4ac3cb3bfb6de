/**
 * Directory scanning for candidate image files
 */

use log::debug;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions (lower-case) recognized as images.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Lower-cased extension of `path`, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

pub fn is_image_file(path: &Path) -> bool {
    extension_of(path)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Lazily enumerate image files under `root`.
///
/// Order follows the filesystem and must not be relied upon. Without
/// `recursive` only direct children of `root` are inspected. Symlinks are
/// followed; dangling links and link loops are skipped.
pub fn scan(root: &Path, recursive: bool) -> impl Iterator<Item = PathBuf> {
    let walkdir = WalkDir::new(root).follow_links(true);
    let walkdir = if recursive { walkdir } else { walkdir.max_depth(1) };

    walkdir
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_image_file(path))
}
