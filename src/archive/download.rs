use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::Client;
use tokio::{fs::File, io::AsyncWriteExt};

use crate::{
    error::{PipelineError, PipelineResult},
    retry::RetryPolicy,
};

/// Sibling path used while a download is in flight.
pub fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Streams `url` into `dest` and returns the number of bytes written.
///
/// Data goes to a `.part` sibling first and is renamed into place once the
/// body is complete, so `dest` only ever exists when the download finished.
/// Transient failures are retried; the `.part` file is removed when the
/// download finally fails.
pub async fn download_to(
    client: &Client,
    url: &str,
    dest: &Path,
    retry: &RetryPolicy,
) -> PipelineResult<u64> {
    let part = part_path(dest);
    let part_ref = part.as_path();
    let result = retry
        .run("download", |_| stream_once(client, url, part_ref))
        .await;

    match result {
        Ok(bytes) => {
            async_fs::rename(&part, dest)
                .await
                .map_err(|e| PipelineError::io(dest, e))?;
            Ok(bytes)
        }
        Err(e) => {
            let _ = async_fs::remove_file(&part).await;
            Err(e)
        }
    }
}

async fn stream_once(client: &Client, url: &str, part: &Path) -> PipelineResult<u64> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let expected = response.content_length();
    let mut file = File::create(part)
        .await
        .map_err(|e| PipelineError::io(part, e))?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| PipelineError::io(part, e))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| PipelineError::io(part, e))?;

    if let Some(expected) = expected {
        if expected != written {
            return Err(PipelineError::Status {
                status: 500,
                url: format!("{} (short body: {} of {} bytes)", url, written, expected),
            });
        }
    }
    Ok(written)
}
