//! Parsing and filtering of media-server webhook payloads.

use chrono::{DateTime, Utc};
use scrobble_sync_models::{
    imdb_id_from_guid, Activity, ActivityKind, MediaAttributes, MediaKind, MediaRecordId,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Deserialize)]
struct Payload {
    event: Option<String>,
    rating: Option<f64>,
    #[serde(rename = "Account")]
    account: Option<Account>,
    #[serde(rename = "Metadata")]
    metadata: Option<Metadata>,
}

#[derive(Debug, Deserialize)]
struct Account {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(rename = "type")]
    kind: Option<String>,
    guid: Option<String>,
    title: Option<String>,
    #[serde(rename = "originalTitle")]
    original_title: Option<String>,
    year: Option<u32>,
    #[serde(rename = "Guid", default)]
    guids: Vec<GuidEntry>,
}

#[derive(Debug, Deserialize)]
struct GuidEntry {
    id: String,
}

/// Why a payload produced no activity.
#[derive(Debug, Error, PartialEq)]
pub enum Ignored {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("payload has no Metadata")]
    MissingMetadata,
    #[error("unsupported event {0:?}")]
    UnsupportedEvent(Option<String>),
    #[error("music tracks are not synchronized")]
    Track,
    #[error("unknown media type {0:?}")]
    UnknownMediaKind(Option<String>),
    #[error("metadata has no title")]
    MissingTitle,
    #[error("metadata has no usable identifier")]
    MissingIdentifier,
}

/// A scrobble or rating event that passed filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub kind: ActivityKind,
    pub media_kind: MediaKind,
    pub imdb_id: Option<String>,
    /// Server guid, or the IMDb id when the server sent none
    pub source_id: String,
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<u32>,
    pub user: String,
    pub received_at: DateTime<Utc>,
}

impl WebhookEvent {
    pub fn attributes(&self) -> MediaAttributes {
        MediaAttributes {
            title: self.title.clone(),
            original_title: self.original_title.clone(),
            year: self.year,
            imdb_id: self.imdb_id.clone(),
        }
    }

    pub fn into_activity(self, media_record_id: Option<MediaRecordId>) -> Activity {
        Activity {
            id: None,
            kind: self.kind,
            media_kind: self.media_kind,
            imdb_id: self.imdb_id,
            source_guid: self.source_id,
            title: self.title,
            original_title: self.original_title,
            year: self.year,
            occurred_at: self.received_at,
            user: self.user,
            media_record_id,
            outcomes: BTreeMap::new(),
        }
    }
}

/// Parse a raw payload. Events other than scrobbles and ratings are ignored.
pub fn parse(payload: &str, received_at: DateTime<Utc>) -> Result<WebhookEvent, Ignored> {
    let payload: Payload =
        serde_json::from_str(payload).map_err(|e| Ignored::InvalidJson(e.to_string()))?;
    let metadata = payload.metadata.ok_or(Ignored::MissingMetadata)?;

    let kind = match payload.event.as_deref() {
        Some("media.scrobble") => ActivityKind::Scrobble,
        Some("media.rate") => ActivityKind::Rate { rating: payload.rating },
        _ => return Err(Ignored::UnsupportedEvent(payload.event)),
    };

    if metadata.kind.as_deref() == Some("track") {
        return Err(Ignored::Track);
    }
    let media_kind = metadata
        .kind
        .as_deref()
        .and_then(MediaKind::from_server_type)
        .ok_or_else(|| Ignored::UnknownMediaKind(metadata.kind.clone()))?;

    let title = metadata
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or(Ignored::MissingTitle)?;

    let imdb_id = metadata.guids.iter().find_map(|guid| imdb_id_from_guid(&guid.id));
    let source_id = metadata
        .guid
        .filter(|g| !g.is_empty())
        .or_else(|| imdb_id.clone())
        .ok_or(Ignored::MissingIdentifier)?;

    Ok(WebhookEvent {
        kind,
        media_kind,
        imdb_id,
        source_id,
        title,
        original_title: metadata.original_title.filter(|t| !t.is_empty()),
        year: metadata.year,
        user: payload.account.and_then(|a| a.title).unwrap_or_default(),
        received_at,
    })
}
