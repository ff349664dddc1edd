use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::id::TrackId;

/// Represent a music track, exactly as it is persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything a new track needs. The slug is computed by the caller.
#[derive(Debug, Clone, Default)]
pub struct TrackDraft {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub genres: Vec<String>,
    pub slug: String,
    pub cover_image: Option<String>,
}

/// Partial update of a track.
///
/// `None` leaves a field untouched. For nullable fields `Some(None)`
/// clears the value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPatch {
    pub title: Option<String>,
    pub artist: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub album: Option<Option<String>>,
    pub genres: Option<Vec<String>>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub cover_image: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub audio_file: Option<Option<String>>,
}

/// A key that is present in the input maps to `Some`, even when its value is null.
pub(crate) fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl Track {
    pub fn new(id: TrackId, draft: TrackDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            artist: draft.artist,
            album: draft.album,
            genres: draft.genres,
            slug: draft.slug,
            cover_image: draft.cover_image,
            audio_file: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges the supplied fields and refreshes `updated_at`.
    ///
    /// `updated_at` never goes below `created_at`, even if the clock moved back.
    pub fn apply(&mut self, patch: TrackPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(artist) = patch.artist {
            self.artist = artist;
        }
        if let Some(album) = patch.album {
            self.album = album;
        }
        if let Some(genres) = patch.genres {
            self.genres = genres;
        }
        if let Some(slug) = patch.slug {
            self.slug = slug;
        }
        if let Some(cover_image) = patch.cover_image {
            self.cover_image = cover_image;
        }
        if let Some(audio_file) = patch.audio_file {
            self.audio_file = audio_file;
        }
        self.updated_at = now.max(self.created_at);
    }
}

impl TrackPatch {
    pub fn audio_file(name: Option<String>) -> Self {
        Self {
            audio_file: Some(name),
            ..Default::default()
        }
    }
}
