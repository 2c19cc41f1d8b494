//! Lazy traversal of the scan root.

use crate::log_sink::LogSink;
use crate::paths::{is_excluded, is_source_file};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every non-directory entry under `root` with the given extension, in
/// traversal order. Unreadable entries are skipped.
pub fn scan_candidates<'a>(
    root: &Path,
    extension: &'a str,
) -> impl Iterator<Item = PathBuf> + 'a {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| !entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .filter(move |path| is_source_file(path, extension))
}

/// First candidate under `root` that no exclusion covers.
///
/// Traversal stops as soon as a candidate is accepted.
pub fn select_candidate(
    root: &Path,
    extension: &str,
    exclusions: &[String],
    log: &LogSink,
) -> Option<PathBuf> {
    scan_candidates(root, extension).find(|path| match is_excluded(path, exclusions) {
        Some(entry) => {
            log.log(format!(
                "Skipping excluded path: {} matches exclude {}",
                path.display(),
                entry
            ));
            false
        }
        None => true,
    })
}
