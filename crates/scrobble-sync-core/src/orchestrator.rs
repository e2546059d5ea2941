use crate::error::SyncError;
use crate::reconstruct::LogReconstructor;
use crate::resolver::MediaResolver;
use crate::router::EventRouter;
use crate::store::{FileStore, SyncStore};
use crate::webhook;
use chrono::{DateTime, Utc};
use scrobble_sync_config::{Config, PathManager, SettingsStore};
use scrobble_sync_destinations::{
    HttpTransport, LetterboxdClient, LogChannel, ReqwestTransport, RequestLog, SharedSettings,
    TraktClient,
};
use scrobble_sync_models::{
    ActivityId, Destination, DiaryLogEntry, LogEntry, Outcome, TraktLogEntry,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Reconstructed history of one destination.
#[derive(Debug, Clone, PartialEq)]
pub enum History {
    Trakt(Vec<TraktLogEntry>),
    Letterboxd(Vec<DiaryLogEntry>),
}

impl History {
    pub fn len(&self) -> usize {
        match self {
            History::Trakt(entries) => entries.len(),
            History::Letterboxd(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Entry point for incoming webhooks and history views.
pub struct SyncOrchestrator {
    config: Config,
    settings: SharedSettings,
    store: Arc<dyn SyncStore>,
    resolver: MediaResolver,
    router: EventRouter,
    letterboxd: Arc<LetterboxdClient>,
    trakt: Arc<TraktClient>,
    request_log: Arc<RequestLog>,
    reconstructor: LogReconstructor,
}

impl SyncOrchestrator {
    pub fn new(
        config: Config,
        settings: SharedSettings,
        store: Arc<dyn SyncStore>,
        transport: Arc<dyn HttpTransport>,
        log_dir: &Path,
    ) -> Self {
        let request_log = Arc::new(RequestLog::new(log_dir));
        let trakt = Arc::new(TraktClient::new(
            config.trakt.clone(),
            transport.clone(),
            settings.clone(),
            request_log.clone(),
        ));
        let letterboxd = Arc::new(LetterboxdClient::new(
            config.letterboxd.clone(),
            transport,
            request_log.clone(),
        ));

        Self {
            resolver: MediaResolver::new(store.clone()),
            router: EventRouter::new(trakt.clone(), letterboxd.clone(), store.clone()),
            reconstructor: LogReconstructor::new(log_dir),
            config,
            settings,
            store,
            letterboxd,
            trakt,
            request_log,
        }
    }

    /// Wire up the file-backed store, settings file and reqwest transport under `paths`.
    pub fn open(config: Config, paths: &PathManager) -> Result<Self, SyncError> {
        config.validate()?;
        let paths = paths.clone().with_overrides(
            config.storage.data_dir.as_deref(),
            config.storage.log_dir.as_deref(),
        );
        paths.ensure_directories()?;

        let settings = Arc::new(RwLock::new(SettingsStore::open(paths.settings_file())?));
        let store: Arc<dyn SyncStore> = Arc::new(FileStore::open(paths.store_file())?);
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new());

        info!(logs = ?paths.log_dir(), store = ?paths.store_file(), "Opened sync orchestrator");
        Ok(Self::new(config, settings, store, transport, paths.log_dir()))
    }

    pub fn trakt(&self) -> &TraktClient {
        &self.trakt
    }

    pub fn store(&self) -> &Arc<dyn SyncStore> {
        &self.store
    }

    /// Runtime setting wins over the configured list.
    pub async fn enabled_destinations(&self) -> Vec<Destination> {
        match self.settings.read().await.enabled_destinations() {
            Some(destinations) => destinations,
            None => self.config.enabled_destinations(),
        }
    }

    pub async fn synchronize(&self, payload: &str) -> Result<Option<ActivityId>, SyncError> {
        self.synchronize_at(payload, Utc::now()).await
    }

    /// Handle one webhook payload received at `received_at`.
    ///
    /// Payloads that are not scrobbles or ratings yield `Ok(None)` and leave no trace.
    #[instrument(skip(self, payload))]
    pub async fn synchronize_at(
        &self,
        payload: &str,
        received_at: DateTime<Utc>,
    ) -> Result<Option<ActivityId>, SyncError> {
        let event = match webhook::parse(payload, received_at) {
            Ok(event) => event,
            Err(reason) => {
                debug!(%reason, "Ignoring webhook");
                return Ok(None);
            }
        };

        self.request_log.record_raw(LogChannel::Incoming, payload);

        let mut record = if event.media_kind.has_media_record() {
            Some(
                self.resolver
                    .resolve(&event.source_id, event.media_kind, event.attributes())
                    .await?,
            )
        } else {
            None
        };

        let mut activity = event.into_activity(record.as_ref().map(|r| r.id));
        let id = self.store.insert_activity(activity.clone()).await?;
        activity.id = Some(id);
        info!(
            id,
            event = activity.kind.event_name(),
            kind = %activity.media_kind,
            title = %activity.title,
            "Stored activity"
        );

        let destinations = self.enabled_destinations().await;
        self.router
            .route(&mut activity, record.as_mut(), &destinations)
            .await?;

        Ok(Some(id))
    }

    pub async fn history(&self, destination: Destination, limit: usize) -> History {
        match destination {
            Destination::Trakt => History::Trakt(self.reconstructor.trakt_history(limit).await),
            Destination::Letterboxd => {
                History::Letterboxd(self.reconstructor.diary_history(limit).await)
            }
        }
    }

    /// Most recent webhook payloads as received, oldest first.
    pub async fn incoming(&self, limit: usize) -> Vec<LogEntry> {
        self.reconstructor.latest(LogChannel::Incoming, limit).await
    }

    /// Mark the diary entry logged at `log_date` as retried and, when both the
    /// film id and a rating are known, resubmit it as a standalone diary entry.
    #[instrument(skip(self))]
    pub async fn retry_diary_entry(
        &self,
        log_date: &str,
        film_id: Option<u64>,
        rating: Option<f64>,
    ) -> Result<Option<Outcome>, SyncError> {
        self.request_log.record_payload(
            LogChannel::LetterboxdRetries,
            &json!({
                "originalLogDate": log_date,
                "id": film_id.map(|id| id.to_string()),
            }),
        );

        let (Some(film_id), Some(rating)) = (film_id, rating) else {
            return Ok(None);
        };
        let outcome = self
            .letterboxd
            .submit_rating(film_id, rating, Utc::now().date_naive())
            .await?;
        info!(film_id, outcome = %outcome, "Resubmitted diary entry");
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use scrobble_sync_config::{LetterboxdConfig, LoggingConfig, StorageConfig, TokenRecord, TraktConfig};
    use scrobble_sync_destinations::testing::ScriptedTransport;
    use scrobble_sync_models::{ActivityKind, MediaKind};

    const POSTER: &str = r#"<div class="film-poster" data-film-id="51568" data-film-slug="fight-club">"#;

    struct Fixture {
        dir: tempfile::TempDir,
        transport: Arc<ScriptedTransport>,
        settings: SharedSettings,
        orchestrator: SyncOrchestrator,
    }

    fn config(destinations: Vec<Destination>) -> Config {
        Config {
            destinations,
            trakt: Some(TraktConfig {
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
                redirect_url: "urn:ietf:wg:oauth:2.0:oob".to_string(),
            }),
            letterboxd: Some(LetterboxdConfig {
                user_cookie: Some("user".to_string()),
                csrf_cookie: Some("csrf".to_string()),
            }),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    fn fixture(config: Config, token_created: DateTime<Utc>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = SettingsStore::new(dir.path().join("settings.toml"));
        settings.set_token(
            Destination::Trakt,
            &TokenRecord {
                access_token: "access".to_string(),
                refresh_token: Some("refresh".to_string()),
                expires_in: 86_400,
                created_at: token_created.timestamp(),
                token_type: Some("bearer".to_string()),
                scope: None,
            },
        );
        let settings = Arc::new(RwLock::new(settings));
        let transport = Arc::new(ScriptedTransport::new());
        let orchestrator = SyncOrchestrator::new(
            config,
            settings.clone(),
            Arc::new(FileStore::in_memory()),
            transport.clone(),
            &dir.path().join("logs"),
        );
        Fixture { dir, transport, settings, orchestrator }
    }

    fn payload(event: &str, kind: &str, rating: Option<f64>) -> String {
        json!({
            "event": event,
            "rating": rating,
            "Account": { "title": "tyler" },
            "Metadata": {
                "type": kind,
                "guid": "plex://movie/5d776825880197001ec967c6",
                "title": "Fight Club",
                "year": 1999,
                "Guid": [{ "id": "imdb://tt0137523" }, { "id": "tmdb://550" }]
            }
        })
        .to_string()
    }

    fn received_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 21, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn test_only_scrobbles_and_ratings_create_activities() {
        let f = fixture(config(vec![]), Utc::now());
        let o = &f.orchestrator;

        assert!(o.synchronize_at(&payload("media.scrobble", "movie", None), received_at()).await.unwrap().is_some());
        assert!(o.synchronize_at(&payload("media.rate", "episode", Some(7.0)), received_at()).await.unwrap().is_some());
        assert!(o.synchronize_at(&payload("media.play", "movie", None), received_at()).await.unwrap().is_none());
        assert!(o.synchronize_at(&payload("media.scrobble", "track", None), received_at()).await.unwrap().is_none());
        assert!(o.synchronize_at("not json", received_at()).await.unwrap().is_none());

        assert!(o.store().activity(2).await.unwrap().is_some());
        assert!(o.store().activity(3).await.unwrap().is_none());
        assert_eq!(f.transport.request_count(), 0);

        let incoming = o.incoming(10).await;
        assert_eq!(incoming.len(), 2);
        assert_eq!(incoming[0].imdb.as_deref(), Some("tt0137523"));
    }

    #[tokio::test]
    async fn test_repeat_events_share_media_record() {
        let f = fixture(config(vec![]), Utc::now());
        let first = f.orchestrator.synchronize(&payload("media.scrobble", "movie", None)).await.unwrap().unwrap();
        let second = f.orchestrator.synchronize(&payload("media.rate", "movie", Some(9.0))).await.unwrap().unwrap();

        let first = f.orchestrator.store().activity(first).await.unwrap().unwrap();
        let second = f.orchestrator.store().activity(second).await.unwrap().unwrap();
        assert_eq!(first.media_record_id, Some(1));
        assert_eq!(second.media_record_id, Some(1));
        assert_eq!(second.kind, ActivityKind::Rate { rating: Some(9.0) });
    }

    #[tokio::test]
    async fn test_rating_fans_out_and_records_outcomes() {
        let f = fixture(config(vec![Destination::Trakt, Destination::Letterboxd]), Utc::now());
        f.transport.respond(201, r#"{"added":{"movies":2,"episodes":0},"not_found":{"movies":[]}}"#);
        f.transport.respond(200, POSTER);
        f.transport.respond(200, r#"{"result":false,"errorCodes":["film.not.watched.but.viewing.exists"]}"#);
        f.transport.respond(200, r#"{"result":true,"rating":8,"messages":["<a href=\"/film/fight-club/\">Fight Club</a> was added."]}"#);

        let id = f
            .orchestrator
            .synchronize_at(&payload("media.rate", "movie", Some(8.0)), received_at())
            .await
            .unwrap()
            .unwrap();

        let activity = f.orchestrator.store().activity(id).await.unwrap().unwrap();
        assert_eq!(activity.outcome(Destination::Trakt).unwrap().to_string(), "rated 2 movies");
        assert_eq!(activity.outcome(Destination::Letterboxd), Some(&Outcome::LoggedAndRated));
        assert_eq!(f.orchestrator.store().media(1).await.unwrap().unwrap().letterboxd_id, Some(51568));

        let diary_request = &f.transport.requests()[3];
        let body = diary_request.body.as_ref().unwrap().to_json();
        assert_eq!(body["viewingDateStr"], "2024-03-09");
        assert_eq!(body.get("rewatch"), None);

        let History::Letterboxd(diary) = f.orchestrator.history(Destination::Letterboxd, 10).await else {
            panic!("expected diary history");
        };
        assert_eq!(diary.len(), 2);
        assert_eq!(diary[0].film_id.as_deref(), Some("51568"));
        assert_eq!(diary[0].error_codes, vec!["film.not.watched.but.viewing.exists"]);
        assert_eq!(diary[1].film_id.as_deref(), Some("51568"));
        assert_eq!(diary[1].rating, Some(8.0));
        assert_eq!(diary[1].url.as_deref(), Some("/film/fight-club/"));

        let History::Trakt(trakt) = f.orchestrator.history(Destination::Trakt, 10).await else {
            panic!("expected trakt history");
        };
        assert_eq!(trakt.len(), 1);
        assert_eq!(trakt[0].imdb.as_deref(), Some("tt0137523"));
        assert_eq!(trakt[0].rated_movies[0].rating, Some(8.0));
    }

    #[tokio::test]
    async fn test_cached_film_id_skips_lookup() {
        let f = fixture(config(vec![Destination::Letterboxd]), Utc::now());
        f.transport.respond(200, POSTER);
        f.transport.respond(200, r#"{"result":true}"#);
        f.transport.respond(200, r#"{"result":true}"#);

        f.orchestrator.synchronize(&payload("media.scrobble", "movie", None)).await.unwrap();
        f.orchestrator.synchronize(&payload("media.scrobble", "movie", None)).await.unwrap();

        let urls: Vec<String> = f.transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![
                "https://letterboxd.com/imdb/tt0137523/",
                "https://letterboxd.com/s/film:51568/watch/",
                "https://letterboxd.com/s/film:51568/watch/",
            ]
        );
    }

    #[tokio::test]
    async fn test_settings_override_configured_destinations() {
        let f = fixture(config(vec![Destination::Trakt]), Utc::now());
        assert_eq!(f.orchestrator.enabled_destinations().await, vec![Destination::Trakt]);

        f.settings.write().await.set_enabled_destinations(&[]);
        assert!(f.orchestrator.enabled_destinations().await.is_empty());

        f.orchestrator.synchronize(&payload("media.scrobble", "movie", None)).await.unwrap();
        assert_eq!(f.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_refreshed_before_scrobble() {
        let f = fixture(config(vec![Destination::Trakt]), Utc::now() - Duration::days(2));
        f.transport.respond(200, r#"{"access_token":"fresh","refresh_token":"r2","expires_in":86400}"#);
        f.transport.respond(201, r#"{"action":"scrobble"}"#);

        let id = f.orchestrator.synchronize(&payload("media.scrobble", "movie", None)).await.unwrap().unwrap();

        let activity = f.orchestrator.store().activity(id).await.unwrap().unwrap();
        assert_eq!(activity.outcome(Destination::Trakt), Some(&Outcome::Scrobbled));
        let requests = f.transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].url.ends_with("/oauth/token"));
        assert!(f.dir.path().join("settings.toml").exists());
    }

    #[tokio::test]
    async fn test_show_scrobble_is_stored_without_calls() {
        let f = fixture(config(vec![Destination::Trakt, Destination::Letterboxd]), Utc::now());
        let id = f.orchestrator.synchronize(&payload("media.scrobble", "show", None)).await.unwrap().unwrap();

        let activity = f.orchestrator.store().activity(id).await.unwrap().unwrap();
        assert_eq!(activity.media_kind, MediaKind::Show);
        assert_eq!(activity.media_record_id, None);
        assert!(activity.outcomes.is_empty());
        assert_eq!(f.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_retry_marks_entry_and_resubmits() {
        let f = fixture(config(vec![Destination::Letterboxd]), Utc::now());
        f.transport.respond(200, POSTER);
        f.transport.respond(200, r#"{"result":false,"errorCodes":["film.not.watched.but.viewing.exists"]}"#);
        f.transport.respond(200, r#"{"result":false,"errorCodes":["server.error"]}"#);
        f.orchestrator.synchronize(&payload("media.rate", "movie", Some(8.0))).await.unwrap();

        let History::Letterboxd(before) = f.orchestrator.history(Destination::Letterboxd, 10).await else {
            panic!("expected diary history");
        };
        assert_eq!(before.len(), 2);
        assert_eq!(before[1].error_codes, vec!["server.error"]);
        assert!(before[1].can_retry());

        f.transport.respond(200, r#"{"result":true,"rating":8}"#);
        let outcome = f
            .orchestrator
            .retry_diary_entry(&before[1].log_date, Some(51568), Some(8.0))
            .await
            .unwrap();
        assert_eq!(outcome, Some(Outcome::LoggedAndRated));

        let History::Letterboxd(after) = f.orchestrator.history(Destination::Letterboxd, 10).await else {
            panic!("expected diary history");
        };
        assert_eq!(after.len(), 3);
        assert!(!after[0].retried);
        assert!(after[1].retried);
        assert!(!after[2].retried);
        assert_eq!(after[2].result, Some(true));

        let again = f.orchestrator.history(Destination::Letterboxd, 10).await;
        assert_eq!(again, History::Letterboxd(after));
    }

    #[test]
    fn test_open_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathManager::with_base(dir.path());
        let orchestrator = SyncOrchestrator::open(config(vec![Destination::Trakt]), &paths).unwrap();

        assert!(dir.path().join("data").is_dir());
        assert!(dir.path().join("logs").is_dir());
        assert!(orchestrator.trakt().authorization_url().unwrap().contains("state=trakt-sync"));
    }
}
