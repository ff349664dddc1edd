//! Filtering, sorting and pagination of tracks

use std::{cmp::Ordering, fmt::Display, str::FromStr};

use serde::Serialize;

use super::track::Track;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Title,
    Artist,
    Album,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseQueryError(String);

impl Display for ParseQueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParseQueryError {}

impl FromStr for SortField {
    type Err = ParseQueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(Self::Title),
            "artist" => Ok(Self::Artist),
            "album" => Ok(Self::Album),
            "createdAt" => Ok(Self::CreatedAt),
            other => Err(ParseQueryError(format!(
                "sort must be one of title, artist, album, createdAt (got '{other}')"
            ))),
        }
    }
}

impl FromStr for SortOrder {
    type Err = ParseQueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(ParseQueryError(format!(
                "order must be asc or desc (got '{other}')"
            ))),
        }
    }
}

/// Parameters of a track listing.
///
/// All filters are combined with AND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackQuery {
    /// case-insensitive substring of title, artist or album
    pub search: Option<String>,
    /// exact member of the track's genres
    pub genre: Option<String>,
    /// case-insensitive substring of the artist
    pub artist: Option<String>,
    pub sort: Option<SortField>,
    pub order: Option<SortOrder>,
    /// 1-based
    pub page: u32,
    pub limit: u32,
}

impl Default for TrackQuery {
    fn default() -> Self {
        Self {
            search: None,
            genre: None,
            artist: None,
            sort: None,
            order: None,
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl TrackQuery {
    pub fn matches(&self, track: &Track) -> bool {
        if let Some(term) = non_empty(&self.search) {
            let term = term.to_lowercase();
            let hit = contains_folded(&track.title, &term)
                || contains_folded(&track.artist, &term)
                || track
                    .album
                    .as_deref()
                    .is_some_and(|album| contains_folded(album, &term));
            if !hit {
                return false;
            }
        }

        if let Some(genre) = non_empty(&self.genre) {
            if !track.genres.iter().any(|g| g == genre) {
                return false;
            }
        }

        if let Some(artist) = non_empty(&self.artist) {
            if !contains_folded(&track.artist, &artist.to_lowercase()) {
                return false;
            }
        }

        true
    }

    /// Ordering used by listings. Without an explicit sort field, newest first.
    pub fn compare(&self, a: &Track, b: &Track) -> Ordering {
        let (field, order) = match self.sort {
            Some(field) => (field, self.order.unwrap_or_default()),
            None => (SortField::CreatedAt, SortOrder::Desc),
        };

        let ordering = match field {
            SortField::Title => collate(&a.title, &b.title),
            SortField::Artist => collate(&a.artist, &b.artist),
            SortField::Album => collate(
                a.album.as_deref().unwrap_or_default(),
                b.album.as_deref().unwrap_or_default(),
            ),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        };

        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }

    /// Index range of the requested page inside a result set of `total` items
    pub fn window(&self, total: usize) -> std::ops::Range<usize> {
        let limit = self.limit.max(1) as usize;
        let start = (self.page.max(1) as usize - 1).saturating_mul(limit);
        let start = start.min(total);
        let end = start.saturating_add(limit).min(total);
        start..end
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn contains_folded(haystack: &str, folded_needle: &str) -> bool {
    haystack.to_lowercase().contains(folded_needle)
}

/// Dictionary-style comparison: letters compare case-insensitively first,
/// case only breaks ties.
pub fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}

/// Paginated response containing items and metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of matching items across all pages
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: usize, query: &TrackQuery) -> Self {
        let limit = query.limit.max(1);
        Self {
            items,
            total,
            page: query.page.max(1),
            limit,
            total_pages: total.div_ceil(limit as usize),
        }
    }
}
