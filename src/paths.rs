//! Path helpers: source-file detection, exclusion matching and output naming.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Extension of files awaiting conversion.
pub const SOURCE_EXTENSION: &str = "mkv";

/// Extension of converted files.
pub const OUTPUT_EXTENSION: &str = "mp4";

static YEAR_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(19|20)\d{2}$").expect("year pattern is valid"));

/// Check if a path has the given extension, ignoring case.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use autoconvert::paths::is_source_file;
///
/// assert!(is_source_file(Path::new("/media/Movie.MKV"), "mkv"));
/// assert!(!is_source_file(Path::new("/media/Movie.mp4"), "mkv"));
/// ```
pub fn is_source_file(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Expand `~` and drop a single trailing `/` from an exclusion entry.
pub fn normalize_exclusion(entry: &str) -> String {
    let expanded = shellexpand::tilde(entry);
    expanded
        .strip_suffix('/')
        .unwrap_or(expanded.as_ref())
        .to_string()
}

/// Return the first exclusion that is a prefix of `path`, if any.
///
/// The comparison is a plain string prefix on the normalized entry, so
/// `/media/keep` also covers `/media/keeper/...`.
pub fn is_excluded<'a>(path: &Path, exclusions: &'a [String]) -> Option<&'a String> {
    let full = path.to_string_lossy();
    exclusions
        .iter()
        .find(|entry| full.starts_with(normalize_exclusion(entry).as_str()))
}

/// Derive the file name a converted file gets.
///
/// The source extension is swapped for `extension`. Scene-style names with a
/// year token (`Title.Words.2019.1080p`) become `Title Words (2019)`.
///
/// # Examples
///
/// ```
/// use autoconvert::paths::output_file_name;
///
/// assert_eq!(output_file_name("Movie.Title.2019.1080p.mkv", "mp4"), "Movie Title (2019).mp4");
/// assert_eq!(output_file_name("random_clip.mkv", "mp4"), "random_clip.mp4");
/// ```
pub fn output_file_name(file_name: &str, extension: &str) -> String {
    let base = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name = titled_name(&base).unwrap_or(base);

    format!("{}.{}", name, extension).replace(std::path::is_separator, "-")
}

/// `Title Words (Year)` for dotted names with a year token. `None` when there
/// is no year or no title tokens before it, so `2019.Movie` keeps its stem.
fn titled_name(base: &str) -> Option<String> {
    if !base.contains('.') {
        return None;
    }

    let parts: Vec<&str> = base.split('.').filter(|p| !p.is_empty()).collect();
    let year_index = parts.iter().position(|p| YEAR_TOKEN.is_match(p))?;
    let title = parts[..year_index].join(" ");

    if title.is_empty() {
        return None;
    }

    Some(format!("{} ({})", title, parts[year_index]))
}

/// Output path for `input`: the derived file name in the input's directory.
pub fn output_path_for(input: &Path, extension: &str) -> PathBuf {
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    input.with_file_name(output_file_name(&file_name, extension))
}
