//! Request bodies and their validation rules

use serde::Deserialize;

use crate::{
    domain::track::{TrackDraft, TrackPatch, present},
    http::error::ApiError,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTrackRequest {
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTrackRequest {
    pub title: Option<String>,
    pub artist: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub album: Option<Option<String>>,
    pub genres: Option<Vec<String>>,
    #[serde(default, deserialize_with = "present")]
    pub cover_image: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct BatchDeleteRequest {
    pub ids: Vec<String>,
}

fn required(field: &str, value: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Blank strings mean "no value"
fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Genres must come from the catalog, unless the catalog is unavailable
fn check_genres(genres: &[String], catalog: &[String]) -> Result<(), ApiError> {
    if catalog.is_empty() {
        return Ok(());
    }
    match genres.iter().find(|g| !catalog.contains(*g)) {
        Some(unknown) => Err(ApiError::BadRequest(format!("unknown genre '{unknown}'"))),
        None => Ok(()),
    }
}

fn check_cover_image(url: Option<&str>) -> Result<(), ApiError> {
    match url {
        Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => Err(
            ApiError::BadRequest("coverImage must be an http(s) URL".into()),
        ),
        _ => Ok(()),
    }
}

impl CreateTrackRequest {
    /// Validated draft; the slug is left for the caller to fill in
    pub fn into_draft(self, catalog: &[String]) -> Result<TrackDraft, ApiError> {
        let title = required("title", &self.title)?;
        let artist = required("artist", &self.artist)?;
        let cover_image = optional(self.cover_image);
        check_genres(&self.genres, catalog)?;
        check_cover_image(cover_image.as_deref())?;

        Ok(TrackDraft {
            title,
            artist,
            album: optional(self.album),
            genres: self.genres,
            slug: String::new(),
            cover_image,
        })
    }
}

impl UpdateTrackRequest {
    pub fn into_patch(self, catalog: &[String]) -> Result<TrackPatch, ApiError> {
        let title = self
            .title
            .map(|title| required("title", &title))
            .transpose()?;
        let artist = self
            .artist
            .map(|artist| required("artist", &artist))
            .transpose()?;
        if let Some(genres) = &self.genres {
            check_genres(genres, catalog)?;
        }
        let cover_image = self.cover_image.map(optional);
        check_cover_image(cover_image.clone().flatten().as_deref())?;

        Ok(TrackPatch {
            title,
            artist,
            album: self.album.map(optional),
            genres: self.genres,
            slug: None,
            cover_image,
            audio_file: None,
        })
    }
}
