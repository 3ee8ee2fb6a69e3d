//! Status tracking - which resources already completed
//!
//! The orchestrator only needs two things from persistence: "did resource X
//! already succeed?" and "record this outcome for resource X". Three stores
//! provide them:
//! - `MemoryEventStore` for tests and dry runs
//! - `JsonlEventStore`, an append-only `status.jsonl` in the target directory
//! - `SqliteEventStore`, a `status.db` in the target directory

mod jsonl;
mod memory;
mod sqlite;

pub use jsonl::*;
pub use memory::*;
pub use sqlite::*;

use crate::error::FetchError;
use paj_types::{FetcherConfig, ResourceEvent, ResourceStatus};
use std::future::Future;
use std::path::Path;

/// Persistence for resource outcomes
pub trait EventStore: Send + Sync {
    /// Whether the latest recorded event for `resource_id` is a success
    fn is_completed(&self, resource_id: &str)
        -> impl Future<Output = Result<bool, FetchError>> + Send;

    /// Append an event
    fn record(&self, event: ResourceEvent) -> impl Future<Output = Result<(), FetchError>> + Send;

    /// The latest event for every resource, ordered by resource id
    fn latest_events(&self) -> impl Future<Output = Result<Vec<ResourceEvent>, FetchError>> + Send;
}

/// Which backend to keep the status log in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreKind {
    #[default]
    Jsonl,
    Sqlite,
    Memory,
}

/// A store picked at runtime
#[derive(Debug)]
pub enum StatusStore {
    Memory(MemoryEventStore),
    Jsonl(JsonlEventStore),
    Sqlite(SqliteEventStore),
}

impl StatusStore {
    /// Open the store of the given kind inside `target_dir`
    pub async fn open(
        kind: StoreKind,
        target_dir: &Path,
        config: &FetcherConfig,
    ) -> Result<Self, FetchError> {
        Ok(match kind {
            StoreKind::Memory => StatusStore::Memory(MemoryEventStore::new()),
            StoreKind::Jsonl => {
                StatusStore::Jsonl(JsonlEventStore::open(target_dir.join(&config.status_file)).await?)
            }
            StoreKind::Sqlite => StatusStore::Sqlite(
                SqliteEventStore::open(target_dir.join(&config.status_db_file)).await?,
            ),
        })
    }
}

impl EventStore for StatusStore {
    async fn is_completed(&self, resource_id: &str) -> Result<bool, FetchError> {
        match self {
            StatusStore::Memory(store) => store.is_completed(resource_id).await,
            StatusStore::Jsonl(store) => store.is_completed(resource_id).await,
            StatusStore::Sqlite(store) => store.is_completed(resource_id).await,
        }
    }

    async fn record(&self, event: ResourceEvent) -> Result<(), FetchError> {
        match self {
            StatusStore::Memory(store) => store.record(event).await,
            StatusStore::Jsonl(store) => store.record(event).await,
            StatusStore::Sqlite(store) => store.record(event).await,
        }
    }

    async fn latest_events(&self) -> Result<Vec<ResourceEvent>, FetchError> {
        match self {
            StatusStore::Memory(store) => store.latest_events().await,
            StatusStore::Jsonl(store) => store.latest_events().await,
            StatusStore::Sqlite(store) => store.latest_events().await,
        }
    }
}

/// The latest event per resource, read without creating or changing the log
///
/// A log that does not exist yet reads as empty.
pub async fn read_latest_events(
    kind: StoreKind,
    target_dir: &Path,
    config: &FetcherConfig,
) -> Result<Vec<ResourceEvent>, FetchError> {
    match kind {
        StoreKind::Memory => Ok(Vec::new()),
        StoreKind::Jsonl => {
            let latest = load_events(&target_dir.join(&config.status_file)).await?;
            Ok(by_resource_id(latest.into_values()))
        }
        StoreKind::Sqlite => {
            let path = target_dir.join(&config.status_db_file);
            if !path.exists() {
                return Ok(Vec::new());
            }
            SqliteEventStore::open_existing(&path)
                .await?
                .latest_events()
                .await
        }
    }
}

fn is_success(event: Option<&ResourceEvent>) -> bool {
    matches!(event, Some(e) if e.status == ResourceStatus::Success)
}

fn by_resource_id(events: impl IntoIterator<Item = ResourceEvent>) -> Vec<ResourceEvent> {
    let mut events: Vec<_> = events.into_iter().collect();
    events.sort_by(|a, b| a.resource_id.cmp(&b.resource_id));
    events
}
