//! Resource processing loop
//!
//! Takes the full listing, filters it, skips what already succeeded, downloads
//! the rest with bounded concurrency and records every outcome.

use crate::error::FetchError;
use crate::events::EventStore;
use crate::storage;
use crate::PajFetcher;
use futures::stream::{self, StreamExt};
use paj_types::{CoreEvent, Resource, ResourceEvent, ResourceStatus, RunSummary};
use std::collections::HashSet;
use std::path::Path;
use tracing::{error, info, warn};

/// Knobs for one processing run
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Process only these ids (empty = all)
    pub only: Vec<String>,
    /// Never process these ids
    pub exclude: Vec<String>,
    /// Process at most this many resources
    pub limit: Option<usize>,
    /// Wipe group directories and download everything again
    pub force: bool,
    /// Stop at the first failed resource
    pub fail_fast: bool,
    /// Resources downloaded at the same time
    pub jobs: usize,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            only: Vec::new(),
            exclude: Vec::new(),
            limit: None,
            force: false,
            fail_fast: false,
            jobs: 1,
        }
    }
}

/// Apply `only`, `exclude` and `limit`, keeping listing order
pub fn select_resources(resources: Vec<Resource>, options: &ProcessOptions) -> Vec<Resource> {
    let only: HashSet<&str> = options.only.iter().map(String::as_str).collect();
    let exclude: HashSet<&str> = options.exclude.iter().map(String::as_str).collect();

    for id in &only {
        if !resources.iter().any(|r| r.id == *id) {
            warn!("Requested resource {} is not on the index page", id);
        }
    }

    resources
        .into_iter()
        .filter(|r| only.is_empty() || only.contains(r.id.as_str()))
        .filter(|r| !exclude.contains(r.id.as_str()))
        .take(options.limit.unwrap_or(usize::MAX))
        .collect()
}

/// Extend a forced selection with every listed resource sharing a group
///
/// Wiping a group removes the files of unselected resources too. They are
/// downloaded again so that no `success` in the log points at a deleted file.
fn with_group_mates(listed: Vec<Resource>, selected: Vec<Resource>) -> Vec<Resource> {
    let groups: HashSet<&Path> = selected.iter().map(|r| r.target_dir.as_path()).collect();
    let ids: HashSet<&str> = selected.iter().map(|r| r.id.as_str()).collect();

    let mates: Vec<Resource> = listed
        .into_iter()
        .filter(|r| ids.contains(r.id.as_str()) || groups.contains(r.target_dir.as_path()))
        .collect();
    for mate in mates.iter().filter(|r| !ids.contains(r.id.as_str())) {
        info!("Also downloading {}: its group {} was wiped", mate.id, mate.group);
    }
    mates
}

enum Outcome {
    Skipped,
    Downloaded(u64),
    Failed(FetchError),
}

/// Process every selected resource and report totals
///
/// Download failures are recorded and counted; with `fail_fast` the first one
/// is returned as the error instead. Failures of the event store itself always
/// abort the run.
pub async fn process_resources<S: EventStore>(
    fetcher: &PajFetcher,
    resources: Vec<Resource>,
    store: &S,
    options: &ProcessOptions,
) -> Result<RunSummary, FetchError> {
    let mut summary = RunSummary {
        listed: resources.len(),
        ..Default::default()
    };

    let mut selected = select_resources(resources.clone(), options);

    if options.force {
        let mut wiped = HashSet::new();
        for resource in &selected {
            if wiped.insert(resource.target_dir.clone()) {
                storage::delete_resource(resource).await?;
            }
        }
        selected = with_group_mates(resources, selected);
    }
    info!("Processing {} of {} resources", selected.len(), summary.listed);

    let mut outcomes = stream::iter(selected)
        .map(|resource| async move {
            let outcome = process_one(fetcher, &resource, store, options.force).await;
            (resource, outcome)
        })
        .buffer_unordered(options.jobs.max(1));

    while let Some((resource, outcome)) = outcomes.next().await {
        let (status, error) = match outcome? {
            Outcome::Skipped => {
                summary.skipped += 1;
                (ResourceStatus::Skipped, None)
            }
            Outcome::Downloaded(bytes) => {
                summary.succeeded += 1;
                summary.bytes_downloaded += bytes;
                (ResourceStatus::Success, None)
            }
            Outcome::Failed(e) => {
                summary.failed += 1;
                summary.failed_ids.push(resource.id.clone());
                fetcher.emit(CoreEvent::ResourceFinished {
                    id: resource.id.clone(),
                    status: ResourceStatus::Failure,
                    error: Some(e.to_string()),
                });
                if options.fail_fast {
                    error!("Aborting run after {} failed", resource.id);
                    return Err(e);
                }
                continue;
            }
        };

        fetcher.emit(CoreEvent::ResourceFinished {
            id: resource.id.clone(),
            status,
            error,
        });
    }

    info!("Run finished: {}", summary);
    fetcher.emit(CoreEvent::RunCompleted {
        summary: summary.clone(),
    });

    Ok(summary)
}

async fn process_one<S: EventStore>(
    fetcher: &PajFetcher,
    resource: &Resource,
    store: &S,
    force: bool,
) -> Result<Outcome, FetchError> {
    if !force && store.is_completed(&resource.id).await? {
        info!("Skipping {}: already downloaded", resource.id);
        return Ok(Outcome::Skipped);
    }

    fetcher.emit(CoreEvent::ResourceStarted {
        id: resource.id.clone(),
        file_name: resource.file_name.clone(),
    });

    let result = match storage::create_context(resource).await {
        Ok(()) => fetcher.download(resource).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(bytes) => {
            store.record(ResourceEvent::success(&resource.id)).await?;
            Ok(Outcome::Downloaded(bytes))
        }
        Err(e) => {
            error!("Resource {} failed: {}", resource.id, e);
            store
                .record(ResourceEvent::failure(&resource.id, e.to_string()))
                .await?;
            Ok(Outcome::Failed(e))
        }
    }
}
