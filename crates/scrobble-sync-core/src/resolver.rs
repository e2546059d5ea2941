use crate::error::StoreError;
use crate::store::SyncStore;
use scrobble_sync_models::{MediaAttributes, MediaKind, MediaRecord};
use std::sync::Arc;
use tracing::{debug, info};

/// Maps media-server identifiers to deduplicated local media records.
#[derive(Clone)]
pub struct MediaResolver {
    store: Arc<dyn SyncStore>,
}

impl MediaResolver {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self { store }
    }

    /// Existing records keep their attributes; only the first sighting writes.
    pub async fn resolve(
        &self,
        source_id: &str,
        kind: MediaKind,
        attributes: MediaAttributes,
    ) -> Result<MediaRecord, StoreError> {
        let (record, created) = self.store.find_or_create_media(source_id, kind, attributes).await?;
        if created {
            info!(id = record.id, source_id, kind = %kind, title = %record.title, "Created media record");
        } else {
            debug!(id = record.id, source_id, kind = %kind, "Reusing media record");
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileStore;

    #[tokio::test]
    async fn test_same_source_resolves_to_same_record() {
        let resolver = MediaResolver::new(Arc::new(FileStore::in_memory()));
        let attributes = MediaAttributes {
            title: "Fight Club".to_string(),
            year: Some(1999),
            imdb_id: Some("tt0137523".to_string()),
            ..MediaAttributes::default()
        };

        let first = resolver.resolve("tt0137523", MediaKind::Movie, attributes.clone()).await.unwrap();
        let second = resolver.resolve("tt0137523", MediaKind::Movie, attributes).await.unwrap();
        assert_eq!(first, second);
    }
}
