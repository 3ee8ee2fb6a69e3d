use super::{by_resource_id, is_success, EventStore};
use crate::error::FetchError;
use paj_types::ResourceEvent;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory event store, lost when dropped
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    latest: RwLock<HashMap<String, ResourceEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with events, last one per id wins
    pub fn with_events(events: impl IntoIterator<Item = ResourceEvent>) -> Self {
        let latest = events
            .into_iter()
            .map(|e| (e.resource_id.clone(), e))
            .collect();
        Self {
            latest: RwLock::new(latest),
        }
    }
}

impl EventStore for MemoryEventStore {
    async fn is_completed(&self, resource_id: &str) -> Result<bool, FetchError> {
        Ok(is_success(self.latest.read().await.get(resource_id)))
    }

    async fn record(&self, event: ResourceEvent) -> Result<(), FetchError> {
        self.latest
            .write()
            .await
            .insert(event.resource_id.clone(), event);
        Ok(())
    }

    async fn latest_events(&self) -> Result<Vec<ResourceEvent>, FetchError> {
        Ok(by_resource_id(self.latest.read().await.values().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_last_event_wins() {
        let store = MemoryEventStore::with_events([
            ResourceEvent::success("a"),
            ResourceEvent::failure("b", "HTTP 500"),
        ]);
        assert!(store.is_completed("a").await.unwrap());
        assert!(!store.is_completed("b").await.unwrap());
        assert!(!store.is_completed("c").await.unwrap());

        store.record(ResourceEvent::failure("a", "HTTP 404")).await.unwrap();
        assert!(!store.is_completed("a").await.unwrap());

        let ids: Vec<_> = store
            .latest_events()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.resource_id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
