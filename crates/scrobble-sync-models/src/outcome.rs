use crate::media::MediaKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Terminal classification of a single destination call.
///
/// Stored and displayed as its string form (`"logged and rated"`, `"rated 2 movies"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Outcome {
    /// Ratings service acknowledged a scrobble
    Scrobbled,
    /// Ratings service added `count` new ratings of `kind`
    Rated { count: u64, kind: MediaKind },
    /// Diary entry written
    Logged,
    /// Diary entry written and the rating stored
    LoggedAndRated,
    /// Remote service rejected the call or answered unexpectedly
    Failed,
    /// Diary service film id could not be extracted from its lookup page
    IdNotFound,
    /// Destination credentials are missing
    NotConfigured,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Outcome::Scrobbled | Outcome::Rated { .. } | Outcome::Logged | Outcome::LoggedAndRated
        )
    }
}

fn noun(kind: MediaKind, count: u64) -> &'static str {
    if count == 1 {
        kind.as_str()
    } else {
        kind.collection_key()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Scrobbled => f.write_str("scrobbled"),
            Outcome::Rated { count, kind } => write!(f, "rated {} {}", count, noun(*kind, *count)),
            Outcome::Logged => f.write_str("logged"),
            Outcome::LoggedAndRated => f.write_str("logged and rated"),
            Outcome::Failed => f.write_str("failed"),
            Outcome::IdNotFound => f.write_str("id not found"),
            Outcome::NotConfigured => f.write_str("not configured"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidOutcome(pub String);

impl fmt::Display for InvalidOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid outcome: {}", self.0)
    }
}

impl std::error::Error for InvalidOutcome {}

impl FromStr for Outcome {
    type Err = InvalidOutcome;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scrobbled" => return Ok(Outcome::Scrobbled),
            "logged" => return Ok(Outcome::Logged),
            "logged and rated" => return Ok(Outcome::LoggedAndRated),
            "failed" => return Ok(Outcome::Failed),
            "id not found" => return Ok(Outcome::IdNotFound),
            "not configured" => return Ok(Outcome::NotConfigured),
            _ => {}
        }

        let invalid = || InvalidOutcome(s.to_string());
        let rest = s.strip_prefix("rated ").ok_or_else(invalid)?;
        let (count, media) = rest.split_once(' ').ok_or_else(invalid)?;
        let count: u64 = count.parse().map_err(|_| invalid())?;
        let kind = [MediaKind::Movie, MediaKind::Episode, MediaKind::Show, MediaKind::Season]
            .into_iter()
            .find(|kind| kind.as_str() == media || kind.collection_key() == media)
            .ok_or_else(invalid)?;

        Ok(Outcome::Rated { count, kind })
    }
}

impl From<Outcome> for String {
    fn from(outcome: Outcome) -> Self {
        outcome.to_string()
    }
}

impl TryFrom<String> for Outcome {
    type Error = InvalidOutcome;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rated_display_pluralizes() {
        let two = Outcome::Rated { count: 2, kind: MediaKind::Movie };
        let one = Outcome::Rated { count: 1, kind: MediaKind::Episode };
        assert_eq!(two.to_string(), "rated 2 movies");
        assert_eq!(one.to_string(), "rated 1 episode");
    }

    #[test]
    fn test_parse_outcome_strings() {
        assert_eq!("logged and rated".parse::<Outcome>(), Ok(Outcome::LoggedAndRated));
        assert_eq!(
            "rated 3 seasons".parse::<Outcome>(),
            Ok(Outcome::Rated { count: 3, kind: MediaKind::Season })
        );
        assert!("rated many movies".parse::<Outcome>().is_err());
        assert!("movie ID not found".parse::<Outcome>().is_err());
    }

    #[test]
    fn test_outcome_serializes_as_string() {
        let json = serde_json::to_string(&Outcome::IdNotFound).unwrap();
        assert_eq!(json, "\"id not found\"");
        let back: Outcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Outcome::IdNotFound);
    }

    #[test]
    fn test_success_classification() {
        assert!(Outcome::Scrobbled.is_success());
        assert!(!Outcome::Failed.is_success());
        assert!(!Outcome::NotConfigured.is_success());
    }
}
