// Cache path utilities.
// Resolves the storage directory and maps storage keys to files.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

/// Get the base cache directory (~/.cache/fincache on Linux).
pub fn cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "fincache").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Path of the file backing a storage key.
pub fn storage_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.json", sanitize_name(key)))
}

/// Sanitize a name for use in filesystem paths.
/// Replaces problematic characters with underscores.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}
