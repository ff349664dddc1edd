use std::sync::Arc;

use log::info;

use crate::config::StorageConfig;

pub mod assets;
pub mod error;
mod fs;
pub mod genres;
pub mod tracks;

use assets::AudioAssetManager;
use error::StorageError;
use genres::GenreCatalog;
use tracks::TrackRepository;

/// Track records, their audio files and the genre catalog of one storage area
pub struct Storage {
    pub tracks: Arc<TrackRepository>,
    pub assets: AudioAssetManager,
    pub genres: GenreCatalog,
}

impl Storage {
    /// Creates missing directories and seeds the genre catalog on first use
    pub fn open(config: &StorageConfig) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&config.tracks_dir)?;
        std::fs::create_dir_all(&config.uploads_dir)?;

        let genres = GenreCatalog::new(&config.genres_file);
        genres.bootstrap()?;

        let tracks = Arc::new(TrackRepository::new(
            &config.tracks_dir,
            &config.uploads_dir,
        ));
        let assets = AudioAssetManager::new(&config.uploads_dir, Arc::clone(&tracks));

        info!(
            "storage ready: tracks in {}, uploads in {}",
            config.tracks_dir.display(),
            config.uploads_dir.display()
        );

        Ok(Self {
            tracks,
            assets,
            genres,
        })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::domain::{query::TrackQuery, track::TrackDraft};

    #[test]
    fn test_open_empty_area_bootstraps_genres() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let config = StorageConfig::under(&dir.path().join("data"));

        let storage = Storage::open(&config)?;

        assert!(config.tracks_dir.is_dir());
        assert!(config.uploads_dir.is_dir());
        assert_eq!(storage.genres.list(), genres::DEFAULT_GENRES);
        assert_eq!(storage.tracks.list(&TrackQuery::default()).total, 0);
        Ok(())
    }

    #[test]
    fn test_independent_areas_do_not_share_records() -> anyhow::Result<()> {
        let a = tempdir()?;
        let b = tempdir()?;
        let first = Storage::open(&StorageConfig::under(a.path()))?;
        let second = Storage::open(&StorageConfig::under(b.path()))?;

        let track = first.tracks.create(TrackDraft {
            title: "Only here".into(),
            artist: "x".into(),
            slug: "only-here".into(),
            ..Default::default()
        })?;

        assert!(first.tracks.get_by_id(track.id.as_str()).is_some());
        assert!(second.tracks.get_by_id(track.id.as_str()).is_none());
        Ok(())
    }

    #[test]
    fn test_reopen_keeps_records() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let config = StorageConfig::under(dir.path());

        let id = Storage::open(&config)?
            .tracks
            .create(TrackDraft {
                title: "Persisted".into(),
                artist: "x".into(),
                slug: "persisted".into(),
                ..Default::default()
            })?
            .id;

        let reopened = Storage::open(&config)?;
        assert_eq!(
            reopened.tracks.get_by_slug("persisted").map(|t| t.id),
            Some(id)
        );
        Ok(())
    }
}
