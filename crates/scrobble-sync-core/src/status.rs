use crate::error::StoreError;
use crate::store::SyncStore;
use scrobble_sync_models::{Activity, ActivityId, Destination, Outcome};
use std::sync::Arc;
use tracing::{debug, warn};

/// Activity whose outcome is being recorded: held in memory, or known only by id.
pub enum ActivityRef<'a> {
    Activity(&'a mut Activity),
    Id(ActivityId),
}

pub struct StatusTracker {
    store: Arc<dyn SyncStore>,
}

impl StatusTracker {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self { store }
    }

    /// Record the outcome for one destination, replacing any earlier one.
    pub async fn record(
        &self,
        target: ActivityRef<'_>,
        destination: Destination,
        outcome: Outcome,
    ) -> Result<(), StoreError> {
        let id = match target {
            ActivityRef::Activity(activity) => {
                activity.outcomes.insert(destination, outcome.clone());
                match activity.id {
                    Some(id) => id,
                    None => return Ok(()),
                }
            }
            ActivityRef::Id(id) => id,
        };

        debug!(activity = id, destination = %destination, outcome = %outcome, "Recording outcome");
        if !self.store.set_outcome(id, destination, outcome).await? {
            warn!(activity = id, destination = %destination, "Outcome for unknown activity ignored");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileStore;
    use chrono::Utc;
    use scrobble_sync_models::{ActivityKind, MediaKind};
    use std::collections::BTreeMap;

    fn activity() -> Activity {
        Activity {
            id: None,
            kind: ActivityKind::Scrobble,
            media_kind: MediaKind::Movie,
            imdb_id: Some("tt0137523".to_string()),
            source_guid: "plex://movie/1".to_string(),
            title: "Fight Club".to_string(),
            original_title: None,
            year: Some(1999),
            occurred_at: Utc::now(),
            user: "tyler".to_string(),
            media_record_id: None,
            outcomes: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_later_outcome_overwrites_only_its_destination() {
        let store = Arc::new(FileStore::in_memory());
        let tracker = StatusTracker::new(store.clone());
        let mut activity = activity();
        activity.id = Some(store.insert_activity(activity.clone()).await.unwrap());

        tracker.record(ActivityRef::Activity(&mut activity), Destination::Trakt, Outcome::Failed).await.unwrap();
        tracker.record(ActivityRef::Activity(&mut activity), Destination::Letterboxd, Outcome::Logged).await.unwrap();
        tracker.record(ActivityRef::Id(1), Destination::Trakt, Outcome::Scrobbled).await.unwrap();

        let stored = store.activity(1).await.unwrap().unwrap();
        assert_eq!(stored.outcome(Destination::Trakt), Some(&Outcome::Scrobbled));
        assert_eq!(stored.outcome(Destination::Letterboxd), Some(&Outcome::Logged));
        assert_eq!(activity.outcome(Destination::Trakt), Some(&Outcome::Failed));
    }

    #[tokio::test]
    async fn test_unknown_id_is_ignored() {
        let tracker = StatusTracker::new(Arc::new(FileStore::in_memory()));
        assert!(tracker.record(ActivityRef::Id(7), Destination::Trakt, Outcome::Failed).await.is_ok());
    }
}
