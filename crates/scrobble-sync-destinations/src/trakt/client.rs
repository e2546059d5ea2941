use crate::error::DestinationError;
use crate::http::{HttpRequest, HttpResponse, HttpTransport, RequestBody};
use crate::request_log::{LogChannel, RequestLog};
use crate::trakt::{auth, API_URL};
use crate::SharedSettings;
use chrono::{DateTime, SecondsFormat, Utc};
use scrobble_sync_config::TraktConfig;
use scrobble_sync_models::{Destination, MediaKind, Outcome};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ratings and scrobble adapter.
pub struct TraktClient {
    config: Option<TraktConfig>,
    transport: Arc<dyn HttpTransport>,
    settings: SharedSettings,
    request_log: Arc<RequestLog>,
    api_url: String,
}

/// Ratings are whole numbers from 1 to 10
fn trakt_rating(rating: f64) -> u8 {
    (rating.round() as i64).clamp(1, 10) as u8
}

fn single_key(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

impl TraktClient {
    pub fn new(
        config: Option<TraktConfig>,
        transport: Arc<dyn HttpTransport>,
        settings: SharedSettings,
        request_log: Arc<RequestLog>,
    ) -> Self {
        Self {
            config,
            transport,
            settings,
            request_log,
            api_url: API_URL.to_string(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    fn config(&self) -> Result<&TraktConfig, DestinationError> {
        self.config
            .as_ref()
            .ok_or_else(|| DestinationError::Configuration("trakt client credentials missing".to_string()))
    }

    pub fn authorization_url(&self) -> Result<String, DestinationError> {
        Ok(auth::authorization_url(&self.api_url, self.config()?))
    }

    /// Finish the authorization redirect and store the issued token.
    pub async fn exchange_code(&self, code: &str, state: &str) -> Result<(), DestinationError> {
        auth::verify_state(state)?;
        let config = self.config()?;
        let token = auth::exchange_code(
            self.transport.as_ref(),
            &self.request_log,
            &self.api_url,
            config,
            code,
        )
        .await?;

        let mut settings = self.settings.write().await;
        settings.set_token(Destination::Trakt, &token);
        if let Err(e) = settings.save() {
            warn!("Failed to persist trakt token: {}", e);
        }
        info!("Authorized trakt access");
        Ok(())
    }

    /// Stored access token, refreshed once if it has expired.
    pub async fn valid_access_token(&self) -> Result<String, DestinationError> {
        let config = self.config()?;
        let token = self
            .settings
            .read()
            .await
            .token(Destination::Trakt)
            .ok_or_else(|| DestinationError::Configuration("no trakt token stored".to_string()))?;

        if !token.is_expired() {
            return Ok(token.access_token);
        }

        info!(expired_at = ?token.expires_at(), "Trakt access token expired, refreshing");
        let refresh_token = token.refresh_token.as_deref().ok_or_else(|| {
            DestinationError::Authentication("token expired and no refresh token stored".to_string())
        })?;

        let refreshed = auth::refresh_access_token(
            self.transport.as_ref(),
            &self.request_log,
            &self.api_url,
            config,
            refresh_token,
        )
        .await?;

        let mut settings = self.settings.write().await;
        settings.set_token(Destination::Trakt, &refreshed);
        if let Err(e) = settings.save() {
            warn!("Failed to persist refreshed trakt token: {}", e);
        }

        Ok(refreshed.access_token)
    }

    async fn post(&self, path: &str, body: Value) -> Result<HttpResponse, DestinationError> {
        let config = self.config()?;
        let access_token = self.valid_access_token().await?;

        let request = HttpRequest::post(format!("{}{}", self.api_url, path), RequestBody::Json(body))
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", access_token))
            .header("trakt-api-version", "2")
            .header("trakt-api-key", config.client_id.as_str());

        let response = self.transport.send(request.clone()).await?;
        self.request_log.record_exchange(LogChannel::Trakt, &request, &response);
        Ok(response)
    }

    /// Mark an item as watched. True when the service acknowledged the scrobble.
    pub async fn scrobble(&self, imdb_id: &str, kind: MediaKind) -> Result<bool, DestinationError> {
        let mut body = single_key(kind.as_str(), json!({ "ids": { "imdb": imdb_id } }));
        body.insert("progress".to_string(), json!(100));

        let response = self.post("/scrobble/stop", Value::Object(body)).await?;
        let acknowledged = response
            .json()
            .ok()
            .and_then(|body| body.get("action").and_then(Value::as_str).map(|a| a == "scrobble"))
            .unwrap_or(false);

        if !acknowledged {
            warn!(imdb_id, status = response.status, "Scrobble not acknowledged");
        }
        Ok(acknowledged)
    }

    /// Submit a rating. `None` when the service added nothing.
    ///
    /// Success is read from the `added` counters only; the status code is not consulted.
    pub async fn rate(
        &self,
        imdb_id: &str,
        rating: f64,
        rated_at: DateTime<Utc>,
        kind: MediaKind,
    ) -> Result<Option<Outcome>, DestinationError> {
        let key = kind.collection_key();
        let item = json!({
            "rated_at": rated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "rating": trakt_rating(rating),
            "ids": { "imdb": imdb_id }
        });
        let body = Value::Object(single_key(key, json!([item])));

        let response = self.post("/sync/ratings", body).await?;
        let body = response.json()?;

        let added = body.get("added");
        let count = [key, "movies", "episodes"]
            .iter()
            .find_map(|k| added.and_then(|a| a.get(*k)).and_then(Value::as_u64))
            .unwrap_or(0);

        if count == 0 {
            warn!(imdb_id, status = response.status, not_found = ?body.get("not_found"), "Rating not added");
            return Ok(None);
        }

        debug!(imdb_id, count, "Rating added");
        Ok(Some(Outcome::Rated { count, kind }))
    }
}
