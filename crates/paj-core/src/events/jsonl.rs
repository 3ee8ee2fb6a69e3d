//! Append-only JSON-lines status log
//!
//! One `ResourceEvent` per line. The whole log is replayed on open; for each
//! resource the last line wins.

use super::{by_resource_id, is_success, EventStore};
use crate::error::FetchError;
use paj_types::ResourceEvent;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Status log backed by a `.jsonl` file
#[derive(Debug)]
pub struct JsonlEventStore {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    file: File,
    latest: HashMap<String, ResourceEvent>,
}

impl JsonlEventStore {
    /// Load the existing log at `path` (if any) and open it for appending
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, FetchError> {
        let path = path.into();
        let latest = load_events(&path).await?;
        debug!("Loaded {} resource events from {}", latest.len(), path.display());

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            inner: Mutex::new(Inner { file, latest }),
        })
    }
}

/// Replay a status log, keeping the last event per resource
pub async fn load_events(path: &Path) -> Result<HashMap<String, ResourceEvent>, FetchError> {
    let mut latest = HashMap::new();
    if !path.exists() {
        return Ok(latest);
    }

    let content = fs::read_to_string(path).await?;
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ResourceEvent>(line) {
            Ok(event) => {
                latest.insert(event.resource_id.clone(), event);
            }
            Err(e) => warn!(
                "Ignoring unreadable line {} of {}: {}",
                line_no + 1,
                path.display(),
                e
            ),
        }
    }

    Ok(latest)
}

impl EventStore for JsonlEventStore {
    async fn is_completed(&self, resource_id: &str) -> Result<bool, FetchError> {
        Ok(is_success(self.inner.lock().await.latest.get(resource_id)))
    }

    async fn record(&self, event: ResourceEvent) -> Result<(), FetchError> {
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        let mut inner = self.inner.lock().await;
        inner.file.write_all(line.as_bytes()).await?;
        inner.file.flush().await?;
        inner.latest.insert(event.resource_id.clone(), event);
        Ok(())
    }

    async fn latest_events(&self) -> Result<Vec<ResourceEvent>, FetchError> {
        Ok(by_resource_id(self.inner.lock().await.latest.values().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_events_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.jsonl");

        {
            let store = JsonlEventStore::open(&path).await.unwrap();
            store.record(ResourceEvent::success("2020-05-01_a")).await.unwrap();
            store
                .record(ResourceEvent::failure("2020-05-01_b", "HTTP 404"))
                .await
                .unwrap();
        }

        let store = JsonlEventStore::open(&path).await.unwrap();
        assert!(store.is_completed("2020-05-01_a").await.unwrap());
        assert!(!store.is_completed("2020-05-01_b").await.unwrap());

        let events = store.latest_events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].message.as_deref(), Some("HTTP 404"));
    }

    #[tokio::test]
    async fn test_unreadable_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.jsonl");
        let good = serde_json::to_string(&ResourceEvent::success("kept")).unwrap();
        std::fs::write(&path, format!("not json\n\n{}\n", good)).unwrap();

        let store = JsonlEventStore::open(&path).await.unwrap();
        assert!(store.is_completed("kept").await.unwrap());
        assert_eq!(store.latest_events().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_appends_instead_of_rewriting() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.jsonl");

        let store = JsonlEventStore::open(&path).await.unwrap();
        store.record(ResourceEvent::failure("x", "boom")).await.unwrap();
        store.record(ResourceEvent::success("x")).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(store.is_completed("x").await.unwrap());
    }
}
