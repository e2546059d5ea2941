use crate::error::DestinationError;
use crate::http::{HttpRequest, HttpTransport, RequestBody};
use crate::letterboxd::markup::film_id_from_markup;
use crate::request_log::{LogChannel, RequestLog};
use chrono::NaiveDate;
use scrobble_sync_config::LetterboxdConfig;
use scrobble_sync_models::{MediaRecord, Outcome};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const BASE_URL: &str = "https://letterboxd.com";

/// Error code returned when marking a film watched that already has a diary entry
pub const ALREADY_VIEWED: &str = "film.not.watched.but.viewing.exists";

/// Result of publishing one viewing to the diary.
#[derive(Debug, Clone, PartialEq)]
pub struct DiaryPublication {
    pub outcome: Outcome,
    pub film_id: Option<u64>,
    /// The film id was looked up during this call rather than taken from the record
    pub discovered: bool,
}

/// Diary adapter, authenticated with browser session cookies.
pub struct LetterboxdClient {
    config: Option<LetterboxdConfig>,
    transport: Arc<dyn HttpTransport>,
    request_log: Arc<RequestLog>,
    base_url: String,
}

/// Classify a watch or diary response.
pub fn classify(response: &Value) -> Outcome {
    let Some(fields) = response.as_object() else {
        return Outcome::Failed;
    };
    match fields.get("result") {
        Some(Value::Bool(true)) | None => {}
        Some(_) => return Outcome::Failed,
    }
    match fields.get("rating") {
        Some(rating) if !rating.is_null() => Outcome::LoggedAndRated,
        _ => Outcome::Logged,
    }
}

fn first_error_code(response: &Value) -> Option<&str> {
    response
        .get("errorCodes")
        .and_then(Value::as_array)
        .and_then(|codes| codes.first())
        .and_then(Value::as_str)
}

fn field(name: &str, value: impl Into<String>) -> (String, String) {
    (name.to_string(), value.into())
}

impl LetterboxdClient {
    pub fn new(
        config: Option<LetterboxdConfig>,
        transport: Arc<dyn HttpTransport>,
        request_log: Arc<RequestLog>,
    ) -> Self {
        Self {
            config,
            transport,
            request_log,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `(user cookie, csrf cookie)`; both are needed for every call
    fn session(&self) -> Result<(&str, &str), DestinationError> {
        self.config
            .as_ref()
            .and_then(LetterboxdConfig::session)
            .ok_or_else(|| DestinationError::Configuration("letterboxd session cookies missing".to_string()))
    }

    /// Resolve the internal film id from the IMDb redirect page.
    pub async fn lookup_film_id(&self, imdb_id: &str) -> Result<u64, DestinationError> {
        self.session()?;
        let url = format!("{}/imdb/{}/", self.base_url, imdb_id);
        let response = self.transport.send(HttpRequest::get(url)).await?;

        let raw = film_id_from_markup(&response.body).ok_or_else(|| {
            DestinationError::ContractDrift(format!(
                "no film id in lookup page for {} (status {})",
                imdb_id, response.status
            ))
        })?;
        raw.parse()
            .map_err(|_| DestinationError::ContractDrift(format!("non-numeric film id: {}", raw)))
    }

    /// Mark a film watched and write the diary entry for this viewing.
    ///
    /// With a rating the diary entry carries it. Without one the entry is only
    /// written when the film was already watched before, flagged as a rewatch.
    pub async fn publish(
        &self,
        imdb_id: &str,
        record: &MediaRecord,
        viewed_on: NaiveDate,
        rating: Option<f64>,
    ) -> Result<DiaryPublication, DestinationError> {
        self.session()?;
        let rating = rating.filter(|r| *r > 0.0);

        let (film_id, discovered) = match record.letterboxd_id {
            Some(id) => (id, false),
            None => match self.lookup_film_id(imdb_id).await {
                Ok(id) => (id, true),
                Err(DestinationError::ContractDrift(reason)) => {
                    warn!(imdb_id, "Letterboxd contract drift: {}", reason);
                    return Ok(DiaryPublication {
                        outcome: Outcome::IdNotFound,
                        film_id: None,
                        discovered: false,
                    });
                }
                Err(e) => return Err(e),
            },
        };

        let watch_url = format!("{}/s/film:{}/watch/", self.base_url, film_id);
        let watched = self.submit(&watch_url, vec![field("watched", "true")]).await?;
        let already_viewed = first_error_code(&watched) == Some(ALREADY_VIEWED);

        let outcome = if rating.is_some() || already_viewed {
            let mut fields = vec![
                field("viewingableUid", format!("film:{}", film_id)),
                field("viewingableUID", format!("film:{}", film_id)),
                field("specifiedDate", "true"),
                field("viewingDateStr", viewed_on.format("%Y-%m-%d").to_string()),
                field("rating", rating.map_or_else(|| "0".to_string(), |r| r.to_string())),
            ];
            // A rated rewatch is assumed to have been scrobbled already
            if rating.is_none() {
                fields.push(field("rewatch", "true"));
            }
            let diary = self.submit(&self.diary_url(), fields).await?;
            classify(&diary)
        } else {
            classify(&watched)
        };

        info!(imdb_id, film_id, outcome = %outcome, "Published diary activity");
        Ok(DiaryPublication {
            outcome,
            film_id: Some(film_id),
            discovered,
        })
    }

    /// Standalone diary entry with a rating, used to resubmit failed entries.
    pub async fn submit_rating(
        &self,
        film_id: u64,
        rating: f64,
        viewed_on: NaiveDate,
    ) -> Result<Outcome, DestinationError> {
        self.session()?;
        let fields = vec![
            field("filmId", film_id.to_string()),
            field("specifiedDate", "true"),
            field("viewingDateStr", viewed_on.format("%Y-%m-%d").to_string()),
            field("rating", rating.to_string()),
        ];
        let response = self.submit(&self.diary_url(), fields).await?;
        Ok(classify(&response))
    }

    fn diary_url(&self) -> String {
        format!("{}/s/save-diary-entry", self.base_url)
    }

    /// Form POST with the session cookies; non-JSON answers come back as `Null`.
    async fn submit(&self, url: &str, mut fields: Vec<(String, String)>) -> Result<Value, DestinationError> {
        let (user, csrf) = self.session()?;
        fields.push(field("__csrf", csrf));

        let request = HttpRequest::post(url, RequestBody::Form(fields))
            .header(
                "Cookie",
                format!(
                    "letterboxd.user={}; com.xk72.webparts.csrf={}",
                    urlencoding::encode(user),
                    urlencoding::encode(csrf)
                ),
            )
            .header("Content-Type", "application/x-www-form-urlencoded");

        let response = self.transport.send(request.clone()).await?;
        self.request_log.record_exchange(LogChannel::Letterboxd, &request, &response);
        debug!(url, status = response.status, "Letterboxd answered");

        Ok(response.json().unwrap_or(Value::Null))
    }
}
