//! PAJ Fetcher Core
//!
//! Lists the dataset spreadsheets published on the PAJ statistics index page
//! and downloads each one into a per-group directory. Runs are incremental:
//! resources that already succeeded are skipped on the next run.

mod download;
mod error;
pub mod events;
mod lister;
mod orchestrator;
mod storage;

pub use download::*;
pub use error::*;
pub use lister::*;
pub use orchestrator::*;
pub use storage::*;

use events::EventStore;
use paj_types::{CoreEvent, FetcherConfig, Resource, RunSummary};
use reqwest::Client;
use std::path::Path;
use tokio::sync::broadcast;

/// The main fetcher instance
#[derive(Clone, Debug)]
pub struct PajFetcher {
    /// Shared HTTP session
    client: Client,
    config: FetcherConfig,
    /// Event broadcaster
    event_tx: broadcast::Sender<CoreEvent>,
}

impl PajFetcher {
    /// Create a new fetcher with its own HTTP client
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create a fetcher around an existing client
    pub fn with_client(client: Client, config: FetcherConfig) -> Self {
        let (event_tx, _) = broadcast::channel(1000);
        Self {
            client,
            config,
            event_tx,
        }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Subscribe to core events
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.event_tx.subscribe()
    }

    /// Emit an event
    pub fn emit(&self, event: CoreEvent) {
        let _ = self.event_tx.send(event);
    }

    // ========================================================================
    // Resource Operations
    // ========================================================================

    /// List every resource on the index page, rooted at `target_root`
    pub async fn list_resources(&self, target_root: &Path) -> Result<Vec<Resource>, FetchError> {
        self.emit(CoreEvent::ListingStarted {
            url: self.config.index_url.clone(),
        });
        let resources = lister::list_resources(&self.client, &self.config, target_root).await?;
        self.emit(CoreEvent::ListingCompleted {
            count: resources.len(),
        });
        Ok(resources)
    }

    /// Download a single resource, returning the bytes written
    pub async fn download(&self, resource: &Resource) -> Result<u64, FetchError> {
        download::download_resource(
            &self.client,
            resource,
            self.config.chunk_size,
            Some(&self.event_tx),
        )
        .await
    }

    /// List, then process every resource against `store`
    ///
    /// The listing is complete before the first download starts.
    pub async fn run<S: EventStore>(
        &self,
        target_root: &Path,
        store: &S,
        options: &ProcessOptions,
    ) -> Result<RunSummary, FetchError> {
        ensure_target_dir(target_root)?;
        let resources = self.list_resources(target_root).await?;
        orchestrator::process_resources(self, resources, store, options).await
    }
}

/// Fail with `TargetDirNotFound` unless `path` is an existing directory
pub fn ensure_target_dir(path: &Path) -> Result<(), FetchError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(FetchError::TargetDirNotFound(path.to_path_buf()))
    }
}
