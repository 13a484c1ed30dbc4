use std::path::{Path, PathBuf};

use reqwest::Client;

use super::context::RunContext;
use crate::{
    archive::{self, download},
    config::Settings,
    error::{PipelineError, PipelineResult},
    media::Encoder,
    types::TrackStatus,
};

/// `{stem}.partial.mp4` next to the final video.
pub fn partial_path(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    video.with_file_name(format!("{}.partial.mp4", stem))
}

/// Puts the background image in place and checks it is a still image.
///
/// A configured image is copied, otherwise the archive.org item image is
/// downloaded. An existing copy from an earlier run is reused when it still
/// validates.
pub async fn prepare_background<E: Encoder>(
    client: &Client,
    settings: &Settings,
    encoder: &E,
    ctx: &RunContext,
) -> PipelineResult<()> {
    let target = ctx.background.as_path();
    if async_fs::metadata(target).await.is_ok() {
        if encoder.validate_image(target).await.is_ok() {
            return Ok(());
        }
        let _ = async_fs::remove_file(target).await;
    }

    match &settings.background_image {
        Some(source) => {
            async_fs::copy(source, target)
                .await
                .map_err(|e| PipelineError::io(source, e))?;
        }
        None => {
            let url = archive::image_url(&settings.archive_url, &ctx.collection.identifier);
            download::download_to(client, &url, target, &settings.retry).await?;
        }
    }

    if let Err(e) = encoder.validate_image(target).await {
        let _ = async_fs::remove_file(target).await;
        return Err(e);
    }
    Ok(())
}

/// Produces the track's video, reusing a valid one from an earlier run.
/// The audio file is never touched.
pub async fn synthesize<E: Encoder>(
    encoder: &E,
    ctx: &mut RunContext,
    number: u32,
) -> PipelineResult<()> {
    let duration = ctx.track(number).and_then(|t| t.duration);
    let Some((audio, video)) = ctx
        .state(number)
        .map(|s| (s.audio_path.clone(), s.video_path.clone()))
    else {
        return Ok(());
    };

    if async_fs::metadata(&video).await.is_ok() {
        if encoder.is_valid_video(&video, duration).await {
            tracing::debug!(track = number, path = %video.display(), "reusing video");
            if let Some(state) = ctx.tracks.get_mut(&number) {
                state.reused_video = true;
            }
            ctx.advance(number, TrackStatus::Encoded);
            return Ok(());
        }
        tracing::warn!(track = number, path = %video.display(), "replacing invalid video");
        async_fs::remove_file(&video)
            .await
            .map_err(|e| PipelineError::io(&video, e))?;
    }

    let partial = partial_path(&video);
    if let Err(e) = encoder
        .encode(number, &ctx.background, &audio, &partial)
        .await
    {
        let _ = async_fs::remove_file(&partial).await;
        return Err(e);
    }

    if !encoder.is_valid_video(&partial, duration).await {
        let _ = async_fs::remove_file(&partial).await;
        return Err(PipelineError::encoding(
            Some(number),
            "encoder produced an invalid video",
        ));
    }

    async_fs::rename(&partial, &video)
        .await
        .map_err(|e| PipelineError::io(&video, e))?;
    ctx.advance(number, TrackStatus::Encoded);
    Ok(())
}
