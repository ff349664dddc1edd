use std::path::PathBuf;

use log::{info, warn};

use crate::storage::{error::StorageError, fs::write_atomic};

/// Written on first initialization when no catalog file exists yet
pub const DEFAULT_GENRES: &[&str] = &[
    "Rock",
    "Pop",
    "Hip Hop",
    "Jazz",
    "Classical",
    "Electronic",
    "R&B",
    "Country",
    "Folk",
    "Reggae",
    "Metal",
    "Blues",
    "Indie",
];

/// Fixed list of genre names, edited outside of the application
pub struct GenreCatalog {
    path: PathBuf,
}

impl GenreCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Empty if the catalog file is missing or malformed
    pub fn list(&self) -> Vec<String> {
        let parsed = std::fs::read(&self.path)
            .map_err(StorageError::from)
            .and_then(|bytes| Ok(serde_json::from_slice::<Vec<String>>(&bytes)?));

        match parsed {
            Ok(genres) => genres,
            Err(err) => {
                warn!("genre catalog {} unavailable: {err}", self.path.display());
                Vec::new()
            }
        }
    }

    /// Seeds the default vocabulary if the file does not exist yet.
    /// Returns whether it did.
    pub fn bootstrap(&self) -> Result<bool, StorageError> {
        if self.path.exists() {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let bytes = serde_json::to_vec_pretty(DEFAULT_GENRES)?;
        write_atomic(&self.path, &bytes)?;
        info!("seeded genre catalog {}", self.path.display());
        Ok(true)
    }
}
