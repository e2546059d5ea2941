use serde::Serialize;
use serde_json::{Map, Value};

/// One destination call reconstructed from an append-only log line.
///
/// JSON captures of the line are merged into `fields`; anything that did not
/// parse as JSON is kept in `positional`. A line that did not match its
/// pattern at all only carries `log_date`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogEntry {
    pub fields: Map<String, Value>,
    pub positional: Vec<String>,
    /// Bracketed timestamp the log line starts with
    pub log_date: Option<String>,
    /// IMDb id derived from nested metadata ids
    pub imdb: Option<String>,
    /// Link extracted from the destination's response messages
    pub url: Option<String>,
    pub retried: bool,
}

impl LogEntry {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

fn value_as_bool(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}

fn value_as_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn value_as_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_as_strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Diary service history entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiaryLogEntry {
    pub film_id: Option<String>,
    pub specified_date: Option<bool>,
    pub viewing_date_str: Option<String>,
    pub rating: Option<f64>,
    pub result: Option<bool>,
    pub messages: Vec<String>,
    pub error_codes: Vec<String>,
    pub log_date: String,
    pub film: Option<Value>,
    pub liked: Option<bool>,
    pub is_new_viewing: Option<bool>,
    pub viewing_date: Option<String>,
    pub rewatch: Option<bool>,
    pub url: Option<String>,
    /// Set once the entry has been retried, so it is not offered again
    pub retried: bool,
}

impl DiaryLogEntry {
    pub fn from_entry(entry: &LogEntry) -> Self {
        // Diary posts identify the film as `filmId` or as `viewingableUid=film:<id>`.
        let film_id = value_as_string(entry.get("filmId")).or_else(|| {
            entry
                .str_field("viewingableUid")
                .and_then(|uid| uid.strip_prefix("film:"))
                .filter(|id| !id.is_empty())
                .map(str::to_string)
        });

        Self {
            film_id,
            specified_date: value_as_bool(entry.get("specifiedDate")),
            viewing_date_str: value_as_string(entry.get("viewingDateStr")),
            rating: value_as_f64(entry.get("rating")),
            result: value_as_bool(entry.get("result")),
            messages: value_as_strings(entry.get("messages")),
            error_codes: value_as_strings(entry.get("errorCodes")),
            log_date: entry.log_date.clone().unwrap_or_default(),
            film: entry.get("film").cloned(),
            liked: value_as_bool(entry.get("liked")),
            is_new_viewing: value_as_bool(entry.get("isNewViewing")),
            viewing_date: value_as_string(entry.get("viewingDate")),
            rewatch: value_as_bool(entry.get("rewatch")),
            url: entry.url.clone(),
            retried: entry.retried,
        }
    }

    /// Failed entries with a known film id can be retried once.
    pub fn can_retry(&self) -> bool {
        self.result == Some(false) && self.film_id.is_some() && !self.retried
    }
}

/// A rating submitted to the ratings service, as echoed in its log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraktRatedItem {
    pub rated_at: Option<String>,
    pub rating: Option<f64>,
    pub imdb: Option<String>,
}

impl TraktRatedItem {
    fn from_value(value: &Value) -> Self {
        Self {
            rated_at: value_as_string(value.get("rated_at")),
            rating: value_as_f64(value.get("rating")),
            imdb: value
                .get("ids")
                .and_then(|ids| value_as_string(ids.get("imdb"))),
        }
    }
}

/// Ratings/scrobble service history entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraktLogEntry {
    pub rated_movies: Vec<TraktRatedItem>,
    pub rated_episodes: Vec<TraktRatedItem>,
    pub movie: Option<Value>,
    pub episode: Option<Value>,
    pub progress: Option<f64>,
    /// `scrobble` when the service acknowledged a scrobble
    pub action: Option<String>,
    pub added: Option<Value>,
    pub not_found: Option<Value>,
    pub imdb: Option<String>,
    pub log_date: String,
}

impl TraktLogEntry {
    pub fn from_entry(entry: &LogEntry) -> Self {
        let rated = |key: &str| -> Vec<TraktRatedItem> {
            entry
                .get(key)
                .and_then(Value::as_array)
                .map(|items| items.iter().map(TraktRatedItem::from_value).collect())
                .unwrap_or_default()
        };

        Self {
            rated_movies: rated("movies"),
            rated_episodes: rated("episodes"),
            movie: entry.get("movie").cloned(),
            episode: entry.get("episode").cloned(),
            progress: value_as_f64(entry.get("progress")),
            action: value_as_string(entry.get("action")),
            added: entry.get("added").cloned(),
            not_found: entry.get("not_found").cloned(),
            imdb: entry.imdb.clone(),
            log_date: entry.log_date.clone().unwrap_or_default(),
        }
    }

    pub fn is_scrobble(&self) -> bool {
        self.action.as_deref() == Some("scrobble")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(fields: Value, log_date: &str) -> LogEntry {
        LogEntry {
            fields: fields.as_object().cloned().unwrap_or_default(),
            log_date: Some(log_date.to_string()),
            ..LogEntry::default()
        }
    }

    #[test]
    fn test_diary_entry_from_form_fields() {
        let e = entry(
            json!({
                "viewingableUid": "film:51315",
                "specifiedDate": "true",
                "viewingDateStr": "2024-03-09",
                "rating": "8",
                "result": false,
                "errorCodes": ["film.not.watched.but.viewing.exists"],
            }),
            "2024-03-09T10:00:00",
        );
        let diary = DiaryLogEntry::from_entry(&e);
        assert_eq!(diary.film_id.as_deref(), Some("51315"));
        assert_eq!(diary.specified_date, Some(true));
        assert_eq!(diary.rating, Some(8.0));
        assert_eq!(diary.error_codes, vec!["film.not.watched.but.viewing.exists"]);
        assert!(diary.can_retry());
    }

    #[test]
    fn test_diary_entry_without_film_id() {
        let e = entry(json!({ "watched": "true", "result": true }), "2024-03-09T10:00:00");
        let diary = DiaryLogEntry::from_entry(&e);
        assert_eq!(diary.film_id, None);
        assert!(!diary.can_retry());
    }

    #[test]
    fn test_trakt_entry_from_rating_log() {
        let e = entry(
            json!({
                "movies": [{ "rated_at": "2024-03-09T10:00:00.000Z", "rating": 8, "ids": { "imdb": "tt0137523" } }],
                "added": { "movies": 1, "episodes": 0 },
            }),
            "2024-03-09T10:00:00",
        );
        let trakt = TraktLogEntry::from_entry(&e);
        assert_eq!(trakt.rated_movies.len(), 1);
        assert_eq!(trakt.rated_movies[0].imdb.as_deref(), Some("tt0137523"));
        assert_eq!(trakt.rated_movies[0].rating, Some(8.0));
        assert!(!trakt.is_scrobble());
    }
}
