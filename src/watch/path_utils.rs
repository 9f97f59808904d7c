// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Make `path` absolute against the current directory without touching the
/// filesystem (the path may not exist yet).
pub fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Directory that has to be watched to see changes of `path`.
///
/// A bare file name maps to the current directory.
pub fn watch_dir_of(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Group monitored files by the directory that has to be watched for them.
///
/// Returns `dir -> [(file name, monitored path)]`, preserving the order in
/// which files were given within each directory. Paths without a file name
/// are skipped.
pub fn group_by_dir<'a, I>(paths: I) -> BTreeMap<PathBuf, Vec<(OsString, PathBuf)>>
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut groups: BTreeMap<PathBuf, Vec<(OsString, PathBuf)>> = BTreeMap::new();

    for path in paths {
        let path = absolutize(path);
        let Some(name) = path.file_name().map(|n| n.to_os_string()) else {
            continue;
        };
        let entry = groups.entry(watch_dir_of(&path)).or_default();
        if !entry.iter().any(|(n, _)| *n == name) {
            entry.push((name, path));
        }
    }

    groups
}
