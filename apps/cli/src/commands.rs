//! CLI command implementations

use crate::output::{format_bytes, print_output, truncate};
use crate::progress::DownloadProgress;
use crate::OutputFormat;
use anyhow::{bail, Result};
use console::style;
use paj_core::events::{read_latest_events, StatusStore, StoreKind};
use paj_core::{PajFetcher, ProcessOptions};
use paj_types::{FetcherConfig, Resource, ResourceEvent, ResourceStatus, RunSummary};
use std::path::Path;
use tracing::info;

// ============================================================================
// Download Commands
// ============================================================================

pub async fn download(
    config: FetcherConfig,
    target_dir: &Path,
    options: &ProcessOptions,
    store_kind: StoreKind,
    show_progress: bool,
    format: OutputFormat,
) -> Result<()> {
    let fetcher = PajFetcher::new(config)?;
    info!("Recording status in the {:?} store under {}", store_kind, target_dir.display());
    let store = StatusStore::open(store_kind, target_dir, fetcher.config()).await?;

    let progress = (show_progress && matches!(format, OutputFormat::Human)).then(|| {
        let rx = fetcher.subscribe();
        tokio::spawn(DownloadProgress::new().run(rx))
    });

    let result = fetcher.run(target_dir, &store, options).await;

    // Closes the event channel so the progress task stops on early errors too
    drop(fetcher);
    if let Some(handle) = progress {
        let _ = handle.await;
    }

    let summary = result?;
    print_summary(&summary, format)?;

    if !summary.is_success() {
        bail!("{} resource(s) failed", summary.failed);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json | OutputFormat::Table => print_output(summary, format)?,
        OutputFormat::Human => {
            println!(
                "{} {} downloaded ({}), {} already up to date",
                style("✓").green().bold(),
                style(summary.succeeded).bold(),
                format_bytes(summary.bytes_downloaded),
                summary.skipped
            );
            if summary.failed > 0 {
                println!(
                    "{} {} failed:",
                    style("✗").red().bold(),
                    style(summary.failed).bold()
                );
                for id in &summary.failed_ids {
                    println!("    {}", style(id).red());
                }
            }
        }
    }
    Ok(())
}

// ============================================================================
// Listing Commands
// ============================================================================

pub async fn list_resources(
    config: FetcherConfig,
    target_dir: &Path,
    format: OutputFormat,
) -> Result<()> {
    let fetcher = PajFetcher::new(config)?;
    let resources = fetcher.list_resources(target_dir).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&resources)?);
        }
        OutputFormat::Table => {
            use tabled::{Table, Tabled};

            #[derive(Tabled)]
            struct ResourceRow {
                id: String,
                group: String,
                file: String,
                url: String,
            }

            let rows: Vec<ResourceRow> = resources
                .iter()
                .map(|r| ResourceRow {
                    id: truncate(&r.id, 40),
                    group: r.group.clone(),
                    file: truncate(&r.file_name, 40),
                    url: r.source_url.clone(),
                })
                .collect();

            println!("{}", Table::new(rows));
        }
        OutputFormat::Human => {
            if resources.is_empty() {
                println!("{}", style("No resources found").dim());
                return Ok(());
            }

            for resource in &resources {
                print_resource(resource);
            }
            println!();
            println!("{} resource(s) listed", style(resources.len()).bold());
        }
    }

    Ok(())
}

fn print_resource(resource: &Resource) {
    println!("{} {}", style("•").cyan(), style(&resource.id).bold());
    println!("    URL: {}", resource.source_url);
    println!("    Path: {}", resource.target_path().display());
}

// ============================================================================
// Status Commands
// ============================================================================

pub async fn show_status(
    config: FetcherConfig,
    target_dir: &Path,
    store_kind: StoreKind,
    format: OutputFormat,
) -> Result<()> {
    let events = read_latest_events(store_kind, target_dir, &config).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        OutputFormat::Table => {
            use tabled::{Table, Tabled};

            #[derive(Tabled)]
            struct EventRow {
                id: String,
                status: String,
                when: String,
                message: String,
            }

            let rows: Vec<EventRow> = events
                .iter()
                .map(|e| EventRow {
                    id: truncate(&e.resource_id, 40),
                    status: e.status.to_string(),
                    when: e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    message: truncate(e.message.as_deref().unwrap_or(""), 50),
                })
                .collect();

            println!("{}", Table::new(rows));
        }
        OutputFormat::Human => {
            if events.is_empty() {
                println!("{}", style("Nothing downloaded yet").dim());
                return Ok(());
            }

            for event in &events {
                print_event(event);
            }
            let failed = events
                .iter()
                .filter(|e| e.status == ResourceStatus::Failure)
                .count();
            println!();
            println!(
                "{} resource(s) recorded, {} failing",
                style(events.len()).bold(),
                failed
            );
        }
    }

    Ok(())
}

fn print_event(event: &ResourceEvent) {
    let icon = match event.status {
        ResourceStatus::Success => style("✓").green(),
        ResourceStatus::Failure => style("✗").red(),
        ResourceStatus::Skipped => style("·").dim(),
    };

    println!(
        "{} {} {}",
        icon,
        style(&event.resource_id).bold(),
        style(event.timestamp.to_rfc3339()).dim()
    );
    if let Some(ref message) = event.message {
        println!("    Error: {}", style(message).red());
    }
}
