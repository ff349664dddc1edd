//! Audio files, at most one per track, stored as `<track id><extension>`.
//!
//! The file is always written before the track points at it, and removed
//! before the reference is cleared, so an interrupted sequence can only
//! leave a reference to a missing file.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{info, warn};

use crate::{
    domain::{
        id::TrackId,
        track::{Track, TrackPatch},
    },
    storage::{
        error::StorageError,
        fs::{child_path, write_atomic},
        tracks::TrackRepository,
    },
};

pub struct AudioAssetManager {
    uploads_dir: PathBuf,
    tracks: Arc<TrackRepository>,
}

/// Deterministic asset name: the track id plus the extension of the uploaded file
pub fn asset_name(track_id: &TrackId, original_name: &str) -> String {
    match Path::new(original_name).extension() {
        Some(ext) => format!("{track_id}.{}", ext.to_string_lossy()),
        None => track_id.to_string(),
    }
}

impl AudioAssetManager {
    pub fn new(uploads_dir: impl Into<PathBuf>, tracks: Arc<TrackRepository>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            tracks,
        }
    }

    /// Stores the bytes, replacing any previous asset with the same name.
    ///
    /// Content type and size are not checked here.
    pub fn save(
        &self,
        track_id: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let track_id = TrackId::parse(track_id)?;
        let name = asset_name(&track_id, original_name);
        write_atomic(&self.uploads_dir.join(&name), bytes)?;
        info!("stored audio file {name} ({} bytes)", bytes.len());
        Ok(name)
    }

    /// Saves the asset and points the track at it.
    ///
    /// Returns `Ok(None)` without writing anything if the track does not exist.
    pub fn attach(
        &self,
        track_id: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<Option<Track>, StorageError> {
        let Some(track) = self.tracks.get_by_id(track_id) else {
            return Ok(None);
        };

        let name = self.save(track_id, original_name, bytes)?;

        if let Some(previous) = track.audio_file.as_deref().filter(|p| *p != name) {
            match child_path(&self.uploads_dir, previous) {
                Some(path) => {
                    if let Err(err) = std::fs::remove_file(path) {
                        warn!("could not remove replaced audio file {previous}: {err}");
                    }
                }
                None => warn!("replaced audio file name {previous:?} is not a plain name, left alone"),
            }
        }

        Ok(self
            .tracks
            .update(track_id, TrackPatch::audio_file(Some(name))))
    }

    /// Removes the track's audio file, then clears its reference.
    ///
    /// `false` if the track has no audio file, or if any step fails.
    pub fn delete(&self, track_id: &str) -> bool {
        let Some(audio_file) = self
            .tracks
            .get_by_id(track_id)
            .and_then(|track| track.audio_file)
        else {
            return false;
        };

        let Some(path) = child_path(&self.uploads_dir, &audio_file) else {
            warn!("track {track_id} references a non-plain audio file name {audio_file:?}");
            return false;
        };
        if let Err(err) = std::fs::remove_file(path) {
            warn!("could not remove audio file {audio_file} of track {track_id}: {err}");
            return false;
        }

        let cleared = self
            .tracks
            .update(track_id, TrackPatch::audio_file(None))
            .is_some();
        if cleared {
            info!("removed audio file {audio_file} of track {track_id}");
        }
        cleared
    }

    /// Location of a stored asset, if `name` is a plain file name that exists
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        child_path(&self.uploads_dir, name).filter(|path| path.is_file())
    }
}
