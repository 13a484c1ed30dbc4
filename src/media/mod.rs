//! # Media
//!
//! Still-image video synthesis through ffmpeg, and the checks that decide
//! whether an artifact on disk can be reused.
//!
//! The pipeline talks to the [`Encoder`] trait; [`FfmpegEncoder`] is the
//! production implementation. Tests substitute an in-memory encoder.

pub mod command;
pub mod probe;

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use crate::{
    config::Settings,
    error::{PipelineError, PipelineResult},
    utils,
};

/// Time allowed for a single ffprobe call.
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
pub trait Encoder: Send + Sync {
    /// Fails unless `path` is a still image usable as a background.
    async fn validate_image(&self, path: &Path) -> PipelineResult<()>;

    /// Whether `path` is a finished video for a track of
    /// `expected_duration` seconds.
    async fn is_valid_video(&self, path: &Path, expected_duration: Option<f64>) -> bool;

    /// Combines `image` and `audio` into the video at `output`.
    async fn encode(
        &self,
        track: u32,
        image: &Path,
        audio: &Path,
        output: &Path,
    ) -> PipelineResult<()>;
}

/// Magic-byte check on the first bytes of `path`.
pub async fn check_image_header(path: &Path) -> PipelineResult<()> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| PipelineError::io(path, e))?;
    let mut header = [0u8; 16];
    let mut read = 0;
    while read < header.len() {
        let n = file
            .read(&mut header[read..])
            .await
            .map_err(|e| PipelineError::io(path, e))?;
        if n == 0 {
            break;
        }
        read += n;
    }

    if utils::looks_like_image(&header[..read]) {
        Ok(())
    } else {
        Err(PipelineError::encoding(
            None,
            format!("{} is not a supported image file", path.display()),
        ))
    }
}

pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    timeout: Duration,
}

impl FfmpegEncoder {
    pub fn new(settings: &Settings) -> Self {
        Self {
            ffmpeg: settings.ffmpeg_path.clone(),
            ffprobe: settings.ffprobe_path.clone(),
            timeout: settings.encode_timeout,
        }
    }

    /// Runs `-version` on both binaries.
    pub async fn check_available(&self) -> PipelineResult<()> {
        for program in [&self.ffmpeg, &self.ffprobe] {
            let status = tokio::process::Command::new(program)
                .arg("-version")
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .status()
                .await
                .map_err(|e| {
                    PipelineError::Config(format!("{} not found: {}", program.display(), e))
                })?;
            if !status.success() {
                return Err(PipelineError::Config(format!(
                    "{} -version exited with {}",
                    program.display(),
                    status
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn validate_image(&self, path: &Path) -> PipelineResult<()> {
        check_image_header(path).await?;
        let info = probe::probe(&self.ffprobe, path, PROBE_TIMEOUT).await?;
        if info.is_still_image() {
            Ok(())
        } else {
            Err(PipelineError::encoding(
                None,
                format!(
                    "{} is not a still image ({} video, {} audio streams)",
                    path.display(),
                    info.video_streams,
                    info.audio_streams
                ),
            ))
        }
    }

    async fn is_valid_video(&self, path: &Path, expected_duration: Option<f64>) -> bool {
        let size = match async_fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(_) => return false,
        };
        if size < probe::MIN_VIDEO_BYTES {
            tracing::debug!(path = %path.display(), size, "video too small");
            return false;
        }

        match probe::probe(&self.ffprobe, path, PROBE_TIMEOUT).await {
            Ok(info) => info.is_playable_video(expected_duration),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "video probe failed");
                false
            }
        }
    }

    async fn encode(
        &self,
        track: u32,
        image: &Path,
        audio: &Path,
        output: &Path,
    ) -> PipelineResult<()> {
        let cmd = command::still_image_video(image, audio, output);
        command::run(&self.ffmpeg, &cmd, self.timeout, Some(track)).await
    }
}
