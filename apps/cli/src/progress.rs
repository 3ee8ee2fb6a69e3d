//! Progress bar utilities for CLI downloads

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use paj_types::{CoreEvent, ResourceStatus};
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Manages progress bars for the resources of one run
pub struct DownloadProgress {
    multi: MultiProgress,
    listing: Option<ProgressBar>,
    bars: HashMap<String, ProgressBar>,
}

impl DownloadProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            listing: None,
            bars: HashMap::new(),
        }
    }

    /// Consume events until the run completes or the fetcher goes away
    pub async fn run(mut self, mut rx: broadcast::Receiver<CoreEvent>) {
        loop {
            match rx.recv().await {
                Ok(CoreEvent::RunCompleted { .. }) => break,
                Ok(event) => self.handle_event(&event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        self.clear();
    }

    /// Update the bars from an event
    pub fn handle_event(&mut self, event: &CoreEvent) {
        match event {
            CoreEvent::ListingStarted { url } => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_message(format!("Reading {}", url));
                pb.enable_steady_tick(std::time::Duration::from_millis(120));
                self.listing = Some(pb);
            }

            CoreEvent::ListingCompleted { count } => {
                if let Some(pb) = self.listing.take() {
                    pb.finish_with_message(format!(
                        "{} {} resources listed",
                        style("✓").green().bold(),
                        count
                    ));
                }
            }

            CoreEvent::ResourceStarted { id, file_name } => {
                let pb = self.multi.add(ProgressBar::new(0));
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} {msg:40} [{bar:30.cyan/blue}] {bytes}/{total_bytes}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("█▓▒░  "),
                );
                pb.set_message(file_name.clone());
                self.bars.insert(id.clone(), pb);
            }

            CoreEvent::ResourceProgress {
                id,
                downloaded,
                total,
            } => {
                if let Some(pb) = self.bars.get(id) {
                    if let Some(total) = total {
                        pb.set_length(*total);
                    }
                    pb.set_position(*downloaded);
                }
            }

            CoreEvent::ResourceFinished { id, status, error } => {
                if let Some(pb) = self.bars.remove(id) {
                    match status {
                        ResourceStatus::Success => {
                            pb.finish_with_message(format!("{} {}", style("✓").green().bold(), id));
                        }
                        ResourceStatus::Failure => {
                            pb.abandon_with_message(format!(
                                "{} {}: {}",
                                style("✗").red().bold(),
                                id,
                                error.as_deref().unwrap_or("Unknown error")
                            ));
                        }
                        ResourceStatus::Skipped => pb.finish_and_clear(),
                    }
                }
            }

            CoreEvent::RunCompleted { .. } => {}
        }
    }

    /// Clear all progress bars
    pub fn clear(&mut self) {
        if let Some(pb) = self.listing.take() {
            pb.finish_and_clear();
        }
        for (_, pb) in self.bars.drain() {
            pb.finish_and_clear();
        }
    }
}

impl Default for DownloadProgress {
    fn default() -> Self {
        Self::new()
    }
}
