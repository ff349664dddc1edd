//! File-level helpers shared by the record, asset and genre stores

use log::warn;
use walkdir::WalkDir;

use std::{
    io::Write,
    path::{Component, Path, PathBuf},
};

use crate::{
    domain::{id::TrackId, track::Track},
    storage::error::StorageError,
};

const RECORD_EXTENSION: &str = "json";

pub fn record_file_name(id: &TrackId) -> String {
    format!("{id}.{RECORD_EXTENSION}")
}

pub fn is_record_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == RECORD_EXTENSION)
        .unwrap_or(false)
}

/// Lists record files directly inside `dir`, sorted by file name.
///
/// Fails only if `dir` itself cannot be read; unreadable entries are skipped.
pub fn scan_records(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let mut records = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && is_record_file(entry.path()) {
                    records.push(entry.into_path());
                }
            }
            Err(err) if err.depth() == 0 => return Err(err.into()),
            Err(err) => {
                warn!(
                    "error while scanning dir {}, skipping an entry: {err}",
                    dir.display()
                );
            }
        }
    }

    Ok(records)
}

pub fn read_record(path: &Path) -> Result<Track, StorageError> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn write_record(path: &Path, track: &Track) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(track)?;
    write_atomic(path, &bytes)
}

/// Writes to a hidden, uniquely named sibling file, then renames it over `path`.
///
/// Readers see either the old or the new content, never a partial write.
/// Concurrent writers of the same path never share a temporary file, so
/// the last rename wins.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// `dir/name` if `name` is a single plain file name, `None` for anything
/// that could point outside `dir`
pub fn child_path(dir: &Path, name: &str) -> Option<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(dir.join(name)),
        _ => None,
    }
}
