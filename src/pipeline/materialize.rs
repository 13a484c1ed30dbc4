use std::path::Path;

use reqwest::Client;

use super::context::RunContext;
use crate::{
    archive::download,
    config::Settings,
    error::{PipelineError, PipelineResult},
    types::TrackStatus,
    utils,
};

/// Non-empty regular file whose extension matches the archive.org file.
pub async fn is_valid_audio(path: &Path, extension: Option<&str>) -> bool {
    let Ok(meta) = async_fs::metadata(path).await else {
        return false;
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    meta.is_file() && meta.len() > 0 && utils::file_extension(&name).as_deref() == extension
}

/// Makes the track's audio available locally, reusing a valid file from an
/// earlier run.
pub async fn materialize(
    client: &Client,
    settings: &Settings,
    ctx: &mut RunContext,
    number: u32,
) -> PipelineResult<()> {
    let (url, extension) = match ctx.track(number) {
        Some(track) => (track.audio_url.clone(), track.extension()),
        None => return Ok(()),
    };
    let Some(path) = ctx.state(number).map(|s| s.audio_path.clone()) else {
        return Ok(());
    };

    if is_valid_audio(&path, extension.as_deref()).await {
        tracing::debug!(track = number, path = %path.display(), "reusing audio");
        if let Some(state) = ctx.tracks.get_mut(&number) {
            state.reused_audio = true;
        }
    } else {
        let bytes = download::download_to(client, &url, &path, &settings.retry)
            .await
            .map_err(|e| e.for_download(number))?;
        if !is_valid_audio(&path, extension.as_deref()).await {
            let _ = async_fs::remove_file(&path).await;
            return Err(PipelineError::Download {
                track: number,
                message: format!("{} returned an empty file", url),
            });
        }
        tracing::debug!(track = number, bytes, "downloaded");
    }

    ctx.advance(number, TrackStatus::Downloaded);
    Ok(())
}
