use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// External tracking service an activity can be synchronized to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Ratings/scrobble API
    Trakt,
    /// Diary-logging service
    Letterboxd,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Trakt => "trakt",
            Destination::Letterboxd => "letterboxd",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDestination(pub String);

impl fmt::Display for UnknownDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown destination: {}", self.0)
    }
}

impl std::error::Error for UnknownDestination {}

impl FromStr for Destination {
    type Err = UnknownDestination;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trakt" => Ok(Destination::Trakt),
            "letterboxd" => Ok(Destination::Letterboxd),
            other => Err(UnknownDestination(other.to_string())),
        }
    }
}
