//! Track records, one JSON file per record, keyed by id.
//!
//! Lookups never fail: any storage problem is logged and looks like
//! "not found". `create` reports storage errors to the caller, while
//! `update` and `delete` absorb them into `None` / `false`.
//!
//! Every query scans and parses the whole tracks directory.

use std::path::PathBuf;

use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    domain::{
        id::TrackId,
        query::{Page, TrackQuery},
        track::{Track, TrackDraft, TrackPatch},
    },
    storage::{
        error::StorageError,
        fs::{child_path, read_record, record_file_name, scan_records, write_record},
    },
};

pub struct TrackRepository {
    tracks_dir: PathBuf,
    uploads_dir: PathBuf,
}

/// Outcome of a batch delete, in input order
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchDeleteReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl TrackRepository {
    pub fn new(tracks_dir: impl Into<PathBuf>, uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            tracks_dir: tracks_dir.into(),
            uploads_dir: uploads_dir.into(),
        }
    }

    #[cfg(test)]
    pub fn tracks_dir(&self) -> &std::path::Path {
        &self.tracks_dir
    }

    fn record_path(&self, id: &TrackId) -> PathBuf {
        self.tracks_dir.join(record_file_name(id))
    }

    pub fn create(&self, draft: TrackDraft) -> Result<Track, StorageError> {
        let track = Track::new(TrackId::generate(), draft, Utc::now());
        write_record(&self.record_path(&track.id), &track)?;
        info!("created track {} ({})", track.id, track.slug);
        Ok(track)
    }

    /// Record file of `id`; reads and writes of one call go through this path only
    fn locate(&self, id: &str) -> Result<PathBuf, StorageError> {
        Ok(self.record_path(&TrackId::parse(id)?))
    }

    fn read(&self, id: &str) -> Result<Track, StorageError> {
        read_record(&self.locate(id)?)
    }

    pub fn get_by_id(&self, id: &str) -> Option<Track> {
        match self.read(id) {
            Ok(track) => Some(track),
            Err(err) => {
                debug!("track {id} not available: {err}");
                None
            }
        }
    }

    pub fn get_by_slug(&self, slug: &str) -> Option<Track> {
        self.load_all().into_iter().find(|track| track.slug == slug)
    }

    /// Every readable record, in file name order
    fn load_all(&self) -> Vec<Track> {
        let paths = match scan_records(&self.tracks_dir) {
            Ok(paths) => paths,
            Err(err) => {
                warn!(
                    "cannot scan tracks directory {}: {err}",
                    self.tracks_dir.display()
                );
                return Vec::new();
            }
        };

        paths
            .iter()
            .filter_map(|path| match read_record(path) {
                Ok(track) => Some(track),
                Err(err) => {
                    warn!("skipping unreadable record {}: {err}", path.display());
                    None
                }
            })
            .collect()
    }

    /// Filters, then sorts, then cuts out the requested page.
    /// `total` counts all matches, not just the page.
    pub fn list(&self, query: &TrackQuery) -> Page<Track> {
        let mut matching: Vec<Track> = self
            .load_all()
            .into_iter()
            .filter(|track| query.matches(track))
            .collect();
        matching.sort_by(|a, b| query.compare(a, b));

        let total = matching.len();
        let items = matching.drain(query.window(total)).collect();
        Page::new(items, total, query)
    }

    pub fn update(&self, id: &str, patch: TrackPatch) -> Option<Track> {
        match self.try_update(id, patch) {
            Ok(track) => Some(track),
            Err(err) => {
                warn!("update of track {id} failed: {err}");
                None
            }
        }
    }

    fn try_update(&self, id: &str, patch: TrackPatch) -> Result<Track, StorageError> {
        let path = self.locate(id)?;
        let mut track = read_record(&path)?;
        track.apply(patch, Utc::now());
        write_record(&path, &track)?;
        debug!("updated track {}", track.id);
        Ok(track)
    }

    /// Removes the record, then its audio file if it had one.
    ///
    /// A failure to remove the audio file is logged and does not fail the delete.
    pub fn delete(&self, id: &str) -> bool {
        let (path, track) = match self
            .locate(id)
            .and_then(|path| read_record(&path).map(|track| (path, track)))
        {
            Ok(found) => found,
            Err(err) => {
                debug!("delete of track {id} skipped: {err}");
                return false;
            }
        };

        if let Err(err) = std::fs::remove_file(&path) {
            warn!("failed to remove record of track {id}: {err}");
            return false;
        }
        info!("deleted track {id}");

        if let Some(audio_file) = &track.audio_file {
            match child_path(&self.uploads_dir, audio_file) {
                Some(asset) => {
                    if let Err(err) = std::fs::remove_file(&asset) {
                        warn!(
                            "track {id} deleted but its audio file {} could not be removed: {err}",
                            asset.display()
                        );
                    }
                }
                None => warn!("track {id} referenced a non-plain audio file name {audio_file:?}, left alone"),
            }
        }

        true
    }

    /// Deletes ids one after another. A repeated id is attempted again
    /// and lands in `failed` the second time.
    pub fn delete_batch<I, S>(&self, ids: I) -> BatchDeleteReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = BatchDeleteReport::default();
        for id in ids {
            let id = id.as_ref();
            if self.delete(id) {
                report.succeeded.push(id.to_string());
            } else {
                report.failed.push(id.to_string());
            }
        }
        report
    }
}
