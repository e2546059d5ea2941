use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of media a webhook event refers to.
///
/// Music tracks never make it this far; they are filtered out while parsing
/// the webhook payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaKind {
    Movie,
    Episode,
    Show,
    Season,
}

impl MediaKind {
    /// Parse the `Metadata.type` value sent by the media server.
    pub fn from_server_type(value: &str) -> Option<Self> {
        match value {
            "movie" => Some(MediaKind::Movie),
            "episode" => Some(MediaKind::Episode),
            "show" => Some(MediaKind::Show),
            "season" => Some(MediaKind::Season),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Episode => "episode",
            MediaKind::Show => "show",
            MediaKind::Season => "season",
        }
    }

    /// Plural collection key used by batch APIs (`movies`, `episodes`, ...)
    pub fn collection_key(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movies",
            MediaKind::Episode => "episodes",
            MediaKind::Show => "shows",
            MediaKind::Season => "seasons",
        }
    }

    /// Only movies and episodes are deduplicated into local media records.
    pub fn has_media_record(&self) -> bool {
        matches!(self, MediaKind::Movie | MediaKind::Episode)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
