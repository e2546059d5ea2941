use crate::destination::Destination;
use crate::media::MediaKind;
use crate::media_record::MediaRecordId;
use crate::outcome::Outcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ActivityId = u64;

/// Brand prefix the media server puts in front of IMDb guids (`imdb://tt0137523`).
pub const IMDB_GUID_PREFIX: &str = "imdb://";

/// Strip the IMDb brand prefix from a media-server guid.
///
/// Guids of any other brand (`tmdb://`, `tvdb://`, `plex://`) yield `None`.
pub fn imdb_id_from_guid(guid: &str) -> Option<String> {
    guid.strip_prefix(IMDB_GUID_PREFIX)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| id.to_string())
}

/// What happened on the media server.
///
/// A rating can only exist on a `Rate` activity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ActivityKind {
    /// Item was played to completion
    Scrobble,
    /// Item was rated (0-10 scale); the server may omit the value
    Rate { rating: Option<f64> },
}

impl ActivityKind {
    /// Webhook event name for this kind
    pub fn event_name(&self) -> &'static str {
        match self {
            ActivityKind::Scrobble => "media.scrobble",
            ActivityKind::Rate { .. } => "media.rate",
        }
    }

    pub fn rating(&self) -> Option<f64> {
        match self {
            ActivityKind::Scrobble => None,
            ActivityKind::Rate { rating } => *rating,
        }
    }
}

/// One normalized playback or rating occurrence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    /// Assigned by the store on insert
    pub id: Option<ActivityId>,
    pub kind: ActivityKind,
    pub media_kind: MediaKind,
    /// IMDb id without brand prefix
    pub imdb_id: Option<String>,
    /// Media server guid (e.g. `plex://movie/5d7768...`)
    pub source_guid: String,
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<u32>,
    pub occurred_at: DateTime<Utc>,
    /// Media server account that triggered the event
    pub user: String,
    pub media_record_id: Option<MediaRecordId>,
    /// Outcome per destination that attempted this activity
    pub outcomes: BTreeMap<Destination, Outcome>,
}

impl Activity {
    pub fn rating(&self) -> Option<f64> {
        self.kind.rating()
    }

    pub fn outcome(&self, destination: Destination) -> Option<&Outcome> {
        self.outcomes.get(&destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imdb_id_from_guid() {
        assert_eq!(imdb_id_from_guid("imdb://tt0137523"), Some("tt0137523".to_string()));
        assert_eq!(imdb_id_from_guid("tmdb://550"), None);
        assert_eq!(imdb_id_from_guid("imdb://"), None);
        assert_eq!(imdb_id_from_guid("tt0137523"), None);
    }

    #[test]
    fn test_rating_only_on_rate() {
        assert_eq!(ActivityKind::Scrobble.rating(), None);
        assert_eq!(ActivityKind::Rate { rating: Some(8.0) }.rating(), Some(8.0));
        assert_eq!(ActivityKind::Rate { rating: None }.event_name(), "media.rate");
    }
}
