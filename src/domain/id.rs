use std::fmt::Display;

use uuid::Uuid;

use crate::storage::error::StorageError;

/// Represents the track ID.
///
/// The id doubles as the record's file name, so only ids made of
/// ASCII alphanumerics, `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(String);

impl TrackId {
    /// Time-ordered id: ids created later sort after earlier ones,
    /// and the random tail keeps ids from the same millisecond apart.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let valid = !raw.is_empty()
            && raw.len() <= 128
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(StorageError::InvalidTrackId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for TrackId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for TrackId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TrackId::parse(&raw).map_err(serde::de::Error::custom)
    }
}
