use crate::error::StoreError;
use crate::status::{ActivityRef, StatusTracker};
use crate::store::SyncStore;
use scrobble_sync_destinations::{DestinationError, LetterboxdClient, TraktClient};
use scrobble_sync_models::{Activity, ActivityKind, Destination, MediaKind, MediaRecord, Outcome};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Adapter call selected for one (destination, activity) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DestinationCall {
    TraktScrobble,
    TraktRate { rating: f64 },
    DiaryPublish { rating: Option<f64> },
    Skip(&'static str),
}

/// Dispatch table. Every combination is listed so new kinds fail to compile here.
pub fn plan(destination: Destination, kind: ActivityKind, media_kind: MediaKind) -> DestinationCall {
    use ActivityKind::{Rate, Scrobble};
    use MediaKind::{Episode, Movie, Season, Show};

    match (destination, kind, media_kind) {
        (Destination::Trakt, Scrobble, Movie | Episode) => DestinationCall::TraktScrobble,
        (Destination::Trakt, Scrobble, Show | Season) => DestinationCall::Skip("shows and seasons are not scrobbled"),
        (Destination::Trakt, Rate { rating: Some(rating) }, _) if rating > 0.0 => {
            DestinationCall::TraktRate { rating }
        }
        (Destination::Trakt, Rate { .. }, _) => DestinationCall::Skip("rating event without a rating"),
        (Destination::Letterboxd, Scrobble, Movie) => DestinationCall::DiaryPublish { rating: None },
        (Destination::Letterboxd, Rate { rating: Some(rating) }, Movie) if rating > 0.0 => {
            DestinationCall::DiaryPublish { rating: Some(rating) }
        }
        (Destination::Letterboxd, Rate { .. }, Movie) => {
            DestinationCall::Skip("rating event without a rating")
        }
        (Destination::Letterboxd, _, Episode | Show | Season) => DestinationCall::Skip("diary only logs movies"),
    }
}

fn failure_outcome(destination: Destination, error: &DestinationError) -> Outcome {
    if error.is_configuration() {
        debug!(destination = %destination, "{}", error);
        Outcome::NotConfigured
    } else {
        warn!(destination = %destination, "Destination call failed: {}", error);
        Outcome::Failed
    }
}

/// Fans an activity out to the enabled destinations, one after another.
pub struct EventRouter {
    trakt: Arc<TraktClient>,
    letterboxd: Arc<LetterboxdClient>,
    store: Arc<dyn SyncStore>,
    status: StatusTracker,
}

impl EventRouter {
    pub fn new(
        trakt: Arc<TraktClient>,
        letterboxd: Arc<LetterboxdClient>,
        store: Arc<dyn SyncStore>,
    ) -> Self {
        Self {
            trakt,
            letterboxd,
            status: StatusTracker::new(store.clone()),
            store,
        }
    }

    /// A failing destination never stops the next one; only storage errors abort.
    #[instrument(skip_all, fields(activity = ?activity.id, kind = activity.kind.event_name()))]
    pub async fn route(
        &self,
        activity: &mut Activity,
        mut record: Option<&mut MediaRecord>,
        destinations: &[Destination],
    ) -> Result<(), StoreError> {
        let Some(imdb_id) = activity.imdb_id.clone() else {
            warn!(title = %activity.title, "No IMDb id on activity, skipping all destinations");
            return Ok(());
        };

        let mut seen = Vec::with_capacity(destinations.len());
        for &destination in destinations {
            if seen.contains(&destination) {
                continue;
            }
            seen.push(destination);

            let outcome = match plan(destination, activity.kind, activity.media_kind) {
                DestinationCall::Skip(reason) => {
                    debug!(destination = %destination, reason, "No destination call");
                    continue;
                }
                DestinationCall::TraktScrobble => {
                    match self.trakt.scrobble(&imdb_id, activity.media_kind).await {
                        Ok(true) => Outcome::Scrobbled,
                        Ok(false) => Outcome::Failed,
                        Err(e) => failure_outcome(destination, &e),
                    }
                }
                DestinationCall::TraktRate { rating } => {
                    match self
                        .trakt
                        .rate(&imdb_id, rating, activity.occurred_at, activity.media_kind)
                        .await
                    {
                        Ok(Some(outcome)) => outcome,
                        Ok(None) => Outcome::Failed,
                        Err(e) => failure_outcome(destination, &e),
                    }
                }
                DestinationCall::DiaryPublish { rating } => {
                    let Some(record) = record.as_deref_mut() else {
                        warn!(destination = %destination, "Movie activity without media record");
                        continue;
                    };
                    let viewed_on = activity.occurred_at.date_naive();
                    match self.letterboxd.publish(&imdb_id, record, viewed_on, rating).await {
                        Ok(publication) => {
                            if let (true, Some(film_id)) = (publication.discovered, publication.film_id) {
                                if record.letterboxd_id.is_none() {
                                    self.store.set_letterboxd_id(record.id, film_id).await?;
                                    record.letterboxd_id = Some(film_id);
                                }
                            }
                            publication.outcome
                        }
                        Err(e) => failure_outcome(destination, &e),
                    }
                }
            };

            self.status
                .record(ActivityRef::Activity(activity), destination, outcome)
                .await?;
        }

        Ok(())
    }
}
