//! Shared types for the PAJ fetcher
//!
//! This crate contains the data structures shared between the core
//! engine and the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Resource Types
// ============================================================================

/// One downloadable file listed on the index page, plus where it lands locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// `<date>_<base file name>`, unique within one listing
    pub id: String,
    /// Dataset group index taken from the href (e.g. `03`)
    pub group: String,
    /// Directory shared by every file of the same group
    pub target_dir: PathBuf,
    /// Absolute URL of the remote file
    pub source_url: String,
    /// `<date>_<original file name>`
    pub file_name: String,
}

impl Resource {
    /// Full local path the file is written to
    pub fn target_path(&self) -> PathBuf {
        self.target_dir.join(&self.file_name)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source_url, self.target_path().display())
    }
}

/// Outcome recorded for a resource in the event log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Success,
    Failure,
    Skipped,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Success => "success",
            ResourceStatus::Failure => "failure",
            ResourceStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(ResourceStatus::Success),
            "failure" => Some(ResourceStatus::Failure),
            "skipped" => Some(ResourceStatus::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single line of the status log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub resource_id: String,
    pub status: ResourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ResourceEvent {
    pub fn new(resource_id: impl Into<String>, status: ResourceStatus) -> Self {
        Self {
            resource_id: resource_id.into(),
            status,
            message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn success(resource_id: impl Into<String>) -> Self {
        Self::new(resource_id, ResourceStatus::Success)
    }

    pub fn failure(resource_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(resource_id, ResourceStatus::Failure)
        }
    }
}

// ============================================================================
// Run Types
// ============================================================================

/// Totals for one processing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub listed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Bytes written by successful downloads
    pub bytes_downloaded: u64,
    #[serde(default)]
    pub failed_ids: Vec<String>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} listed, {} downloaded, {} skipped, {} failed",
            self.listed, self.succeeded, self.skipped, self.failed
        )
    }
}

// ============================================================================
// Settings Types
// ============================================================================

/// Fetcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Page enumerating every dataset file
    pub index_url: String,
    /// Prefix prepended to the site-relative hrefs found on the index page
    pub base_url: String,
    /// Path prefix stripped from hrefs before splitting group and file name
    pub data_path_prefix: String,
    pub user_agent: String,
    /// Size of each write to the destination file
    pub chunk_size: usize,
    /// Name of the JSON-lines status log inside the target directory
    pub status_file: String,
    /// Name of the SQLite status database inside the target directory
    pub status_db_file: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            index_url: "https://www.paj.gr.jp/english/statis/".to_string(),
            base_url: "https://www.paj.gr.jp".to_string(),
            data_path_prefix: "/english/statis/data/".to_string(),
            user_agent: concat!("paj-fetcher/", env!("CARGO_PKG_VERSION")).to_string(),
            chunk_size: 512,
            status_file: "status.jsonl".to_string(),
            status_db_file: "status.db".to_string(),
        }
    }
}

// ============================================================================
// Event Types
// ============================================================================

/// Events emitted by the core while a run is in progress
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    ListingStarted {
        url: String,
    },
    ListingCompleted {
        count: usize,
    },
    ResourceStarted {
        id: String,
        file_name: String,
    },
    ResourceProgress {
        id: String,
        downloaded: u64,
        total: Option<u64>,
    },
    ResourceFinished {
        id: String,
        status: ResourceStatus,
        error: Option<String>,
    },
    RunCompleted {
        summary: RunSummary,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            ResourceStatus::Success,
            ResourceStatus::Failure,
            ResourceStatus::Skipped,
        ] {
            assert_eq!(ResourceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ResourceStatus::parse("done"), None);
    }

    #[test]
    fn test_event_serializes_lowercase_status() {
        let event = ResourceEvent::failure("2020-05-01_report", "HTTP 404");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"status\":\"failure\""));
        assert!(json.contains("\"message\":\"HTTP 404\""));

        let ok = ResourceEvent::success("2020-05-01_report");
        let json = serde_json::to_string(&ok).unwrap();
        assert!(!json.contains("message"));
    }

    #[test]
    fn test_target_path_joins_dir_and_name() {
        let resource = Resource {
            id: "2020-05-01_report_2020".into(),
            group: "03".into(),
            target_dir: PathBuf::from("/data/03"),
            source_url: "https://www.paj.gr.jp/english/statis/data/03/report_2020.xlsx".into(),
            file_name: "2020-05-01_report_2020.xlsx".into(),
        };
        assert_eq!(
            resource.target_path(),
            PathBuf::from("/data/03/2020-05-01_report_2020.xlsx")
        );
    }
}
