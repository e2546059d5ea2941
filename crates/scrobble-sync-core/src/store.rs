use crate::error::StoreError;
use async_trait::async_trait;
use bincode::{deserialize, serialize};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use scrobble_sync_models::{
    Activity, ActivityId, Destination, MediaAttributes, MediaKind, MediaRecord, MediaRecordId,
    Outcome,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Persistence for activities and deduplicated media records.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Find the record for `(source_id, kind)` or create it from `attributes`.
    ///
    /// Lookup and insert happen atomically; the flag is true when the record was created.
    async fn find_or_create_media(
        &self,
        source_id: &str,
        kind: MediaKind,
        attributes: MediaAttributes,
    ) -> Result<(MediaRecord, bool), StoreError>;

    async fn media(&self, id: MediaRecordId) -> Result<Option<MediaRecord>, StoreError>;

    /// Back-fill the diary film id. An id that is already set is kept.
    async fn set_letterboxd_id(&self, id: MediaRecordId, film_id: u64) -> Result<(), StoreError>;

    async fn insert_activity(&self, activity: Activity) -> Result<ActivityId, StoreError>;

    async fn activity(&self, id: ActivityId) -> Result<Option<Activity>, StoreError>;

    /// Returns false when no activity has this id.
    async fn set_outcome(
        &self,
        id: ActivityId,
        destination: Destination,
        outcome: Outcome,
    ) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    next_media_id: MediaRecordId,
    next_activity_id: ActivityId,
    media: BTreeMap<MediaRecordId, MediaRecord>,
    activities: BTreeMap<ActivityId, Activity>,
}

/// In-memory store, optionally snapshotted to a gzip-compressed bincode file
/// after every write.
pub struct FileStore {
    path: Option<PathBuf>,
    state: Mutex<StoreState>,
}

impl FileStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Open the snapshot at `path`, starting empty if it does not exist.
    ///
    /// An unreadable snapshot is backed up next to the original and replaced
    /// by an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = if path.exists() {
            Self::load(&path)?
        } else {
            debug!(path = ?path, "Store file does not exist, starting empty");
            StoreState::default()
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    fn load(path: &Path) -> Result<StoreState, StoreError> {
        let data = std::fs::read(path).map_err(|e| StoreError::io(path, e))?;
        let mut decoded = Vec::new();
        let decompressed = GzDecoder::new(&data[..]).read_to_end(&mut decoded);

        match decompressed.map_err(|e| e.to_string()).and_then(|_| {
            deserialize::<StoreState>(&decoded).map_err(|e| e.to_string())
        }) {
            Ok(state) => {
                info!(
                    media = state.media.len(),
                    activities = state.activities.len(),
                    "Loaded store snapshot"
                );
                Ok(state)
            }
            Err(e) => {
                let backup_path = path.with_extension("bin.bak");
                if let Err(backup_err) = std::fs::copy(path, &backup_path) {
                    warn!("Failed to back up unreadable store snapshot: {}", backup_err);
                } else {
                    warn!(
                        "Store snapshot unreadable ({}), backed up to {:?} and starting empty",
                        e, backup_path
                    );
                }
                Ok(StoreState::default())
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Persist `next` and only then make it the live state, so a failed
    /// write leaves memory matching the last snapshot.
    fn commit(&self, state: &mut StoreState, next: StoreState) -> Result<(), StoreError> {
        self.persist(&next)?;
        *state = next;
        Ok(())
    }

    /// Atomic write: temp file, then rename
    fn persist(&self, state: &StoreState) -> Result<(), StoreError> {
        let Some(ref path) = self.path else {
            return Ok(());
        };

        let serialized = serialize(state)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&serialized)
            .map_err(|e| StoreError::io(path, e))?;
        let encoded = encoder.finish().map_err(|e| StoreError::io(path, e))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, encoded).map_err(|e| StoreError::io(&temp_path, e))?;
        std::fs::rename(&temp_path, path).map_err(|e| StoreError::io(path, e))?;
        Ok(())
    }
}

#[async_trait]
impl SyncStore for FileStore {
    async fn find_or_create_media(
        &self,
        source_id: &str,
        kind: MediaKind,
        attributes: MediaAttributes,
    ) -> Result<(MediaRecord, bool), StoreError> {
        let mut state = self.lock();
        if let Some(existing) = state
            .media
            .values()
            .find(|record| record.kind == kind && record.source_id == source_id)
        {
            return Ok((existing.clone(), false));
        }

        let mut next = state.clone();
        next.next_media_id += 1;
        let record = MediaRecord::from_attributes(next.next_media_id, source_id, kind, attributes);
        next.media.insert(record.id, record.clone());
        self.commit(&mut state, next)?;
        Ok((record, true))
    }

    async fn media(&self, id: MediaRecordId) -> Result<Option<MediaRecord>, StoreError> {
        Ok(self.lock().media.get(&id).cloned())
    }

    async fn set_letterboxd_id(&self, id: MediaRecordId, film_id: u64) -> Result<(), StoreError> {
        let mut state = self.lock();
        let mut next = state.clone();
        match next.media.get_mut(&id) {
            Some(record) if record.letterboxd_id.is_none() => {
                record.letterboxd_id = Some(film_id);
            }
            _ => return Ok(()),
        }
        self.commit(&mut state, next)
    }

    async fn insert_activity(&self, mut activity: Activity) -> Result<ActivityId, StoreError> {
        let mut state = self.lock();
        let mut next = state.clone();
        next.next_activity_id += 1;
        let id = next.next_activity_id;
        activity.id = Some(id);
        next.activities.insert(id, activity);
        self.commit(&mut state, next)?;
        Ok(id)
    }

    async fn activity(&self, id: ActivityId) -> Result<Option<Activity>, StoreError> {
        Ok(self.lock().activities.get(&id).cloned())
    }

    async fn set_outcome(
        &self,
        id: ActivityId,
        destination: Destination,
        outcome: Outcome,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let mut next = state.clone();
        let Some(activity) = next.activities.get_mut(&id) else {
            return Ok(false);
        };
        activity.outcomes.insert(destination, outcome);
        self.commit(&mut state, next)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scrobble_sync_models::ActivityKind;
    use std::sync::Arc;

    fn attributes(title: &str) -> MediaAttributes {
        MediaAttributes {
            title: title.to_string(),
            year: Some(1999),
            imdb_id: Some("tt0137523".to_string()),
            ..MediaAttributes::default()
        }
    }

    fn activity() -> Activity {
        Activity {
            id: None,
            kind: ActivityKind::Rate { rating: Some(8.0) },
            media_kind: MediaKind::Movie,
            imdb_id: Some("tt0137523".to_string()),
            source_guid: "plex://movie/5d776825880197001ec967c6".to_string(),
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
    async fn test_find_or_create_is_idempotent() {
        let store = FileStore::in_memory();
        let (first, created) = store
            .find_or_create_media("tt0137523", MediaKind::Movie, attributes("Fight Club"))
            .await
            .unwrap();
        assert!(created);

        let (second, created) = store
            .find_or_create_media("tt0137523", MediaKind::Movie, attributes("Renamed"))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.title, "Fight Club");

        let (episode, created) = store
            .find_or_create_media("tt0137523", MediaKind::Episode, attributes("Fight Club"))
            .await
            .unwrap();
        assert!(created);
        assert_ne!(episode.id, first.id);
    }

    #[tokio::test]
    async fn test_concurrent_resolution_creates_one_record() {
        let store = Arc::new(FileStore::in_memory());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .find_or_create_media("tt0137523", MediaKind::Movie, attributes("Fight Club"))
                    .await
                    .unwrap()
                    .0
                    .id
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/store.bin");

        let store = FileStore::open(&path).unwrap();
        let (record, _) = store
            .find_or_create_media("plex://movie/1", MediaKind::Movie, attributes("Fight Club"))
            .await
            .unwrap();
        store.set_letterboxd_id(record.id, 51568).await.unwrap();
        store.set_letterboxd_id(record.id, 99).await.unwrap();
        let id = store.insert_activity(activity()).await.unwrap();
        assert!(store.set_outcome(id, Destination::Letterboxd, Outcome::LoggedAndRated).await.unwrap());
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.media(record.id).await.unwrap().unwrap().letterboxd_id, Some(51568));
        let stored = reopened.activity(id).await.unwrap().unwrap();
        assert_eq!(stored.id, Some(id));
        assert_eq!(stored.rating(), Some(8.0));
        assert_eq!(stored.outcome(Destination::Letterboxd), Some(&Outcome::LoggedAndRated));
    }

    #[tokio::test]
    async fn test_unreadable_snapshot_is_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        std::fs::write(&path, b"not a snapshot").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.activity(1).await.unwrap(), None);
        assert!(dir.path().join("store.bin.bak").exists());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blocker"), b"").unwrap();
        let store = FileStore::open(dir.path().join("blocker/store.bin")).unwrap();

        for _ in 0..2 {
            let result = store
                .find_or_create_media("plex://movie/1", MediaKind::Movie, attributes("Fight Club"))
                .await;
            assert!(matches!(result, Err(StoreError::Io { .. })));
        }
        assert_eq!(store.media(1).await.unwrap(), None);

        assert!(store.insert_activity(activity()).await.is_err());
        assert_eq!(store.activity(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_outcome_unknown_activity() {
        let store = FileStore::in_memory();
        assert!(!store.set_outcome(42, Destination::Trakt, Outcome::Scrobbled).await.unwrap());
    }
}
