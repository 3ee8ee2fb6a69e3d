//! Resource downloader - streams one remote file into its group directory
//!
//! The body is written to `<file_name>.part` in fixed-size chunks and renamed
//! into place once the stream ends, so a failed transfer never leaves a file
//! that looks complete.

use crate::error::FetchError;
use futures::StreamExt;
use paj_types::{CoreEvent, Resource};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Suffix of the in-progress file next to the destination
const PART_SUFFIX: &str = ".part";

/// Download `resource.source_url` into `resource.target_path()`
///
/// Returns the number of bytes written. Any non-success status fails before
/// a file is created.
pub async fn download_resource(
    client: &Client,
    resource: &Resource,
    chunk_size: usize,
    event_tx: Option<&broadcast::Sender<CoreEvent>>,
) -> Result<u64, FetchError> {
    info!("Download file {}", resource);

    let response = client.get(&resource.source_url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus {
            status: status.as_u16(),
            url: resource.source_url.clone(),
        });
    }
    let total = response.content_length();

    fs::create_dir_all(&resource.target_dir).await?;
    let dest_path = resource.target_path();
    let part_path = part_path(&dest_path);

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&part_path)
        .await?;

    let mut stream = response.bytes_stream();
    let result = write_stream(&mut file, &mut stream, resource, chunk_size, total, event_tx).await;
    let written = match result {
        Ok(written) => written,
        Err(e) => {
            drop(file);
            discard(&part_path).await;
            return Err(e);
        }
    };
    drop(file);

    if let Err(e) = fs::rename(&part_path, &dest_path).await {
        discard(&part_path).await;
        return Err(e.into());
    }

    info!("Downloaded {} ({} bytes)", resource.id, written);
    Ok(written)
}

async fn write_stream<S, B>(
    file: &mut File,
    stream: &mut S,
    resource: &Resource,
    chunk_size: usize,
    total: Option<u64>,
    event_tx: Option<&broadcast::Sender<CoreEvent>>,
) -> Result<u64, FetchError>
where
    S: futures::Stream<Item = reqwest::Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    let chunk_size = chunk_size.max(1);
    let mut written = 0u64;
    let mut last_progress_time = Instant::now();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result?;

        for piece in chunk.as_ref().chunks(chunk_size) {
            if piece.is_empty() {
                continue;
            }
            file.write_all(piece).await?;
            written += piece.len() as u64;
        }

        // Emit progress event (throttled to ~4x per second)
        if let Some(tx) = event_tx {
            if last_progress_time.elapsed() >= Duration::from_millis(250) {
                let _ = tx.send(CoreEvent::ResourceProgress {
                    id: resource.id.clone(),
                    downloaded: written,
                    total,
                });
                last_progress_time = Instant::now();
            }
        }
    }

    file.flush().await?;
    file.sync_all().await?;

    if let Some(tx) = event_tx {
        let _ = tx.send(CoreEvent::ResourceProgress {
            id: resource.id.clone(),
            downloaded: written,
            total,
        });
    }

    Ok(written)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(PART_SUFFIX);
    dest.with_file_name(name)
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        warn!("Failed to remove partial file {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("/data/03/2020-05-01_report.xlsx")),
            PathBuf::from("/data/03/2020-05-01_report.xlsx.part")
        );
    }
}
