use crate::media::MediaKind;
use serde::{Deserialize, Serialize};

pub type MediaRecordId = u64;

/// A deduplicated movie or episode, unique per (source id, kind).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaRecord {
    pub id: MediaRecordId,
    /// Media server guid the record was first seen under
    pub source_id: String,
    pub kind: MediaKind,
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<u32>,
    pub imdb_id: Option<String>,
    /// Diary service internal film id, back-filled on first successful lookup
    pub letterboxd_id: Option<u64>,
}

/// Attributes used when a media record is created on first sighting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaAttributes {
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<u32>,
    pub imdb_id: Option<String>,
}

impl MediaRecord {
    pub fn from_attributes(
        id: MediaRecordId,
        source_id: &str,
        kind: MediaKind,
        attributes: MediaAttributes,
    ) -> Self {
        Self {
            id,
            source_id: source_id.to_string(),
            kind,
            title: attributes.title,
            original_title: attributes.original_title,
            year: attributes.year,
            imdb_id: attributes.imdb_id,
            letterboxd_id: None,
        }
    }
}
