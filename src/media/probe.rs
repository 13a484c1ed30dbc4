//! ffprobe media information.

use std::{path::Path, process::Stdio, time::Duration};

use serde::Deserialize;
use tokio::process::Command;

use crate::error::{PipelineError, PipelineResult};

/// Smallest mp4 accepted as a finished encode.
pub const MIN_VIDEO_BYTES: u64 = 1024;
/// Allowed gap between the expected and the probed duration.
pub const DURATION_TOLERANCE_SECS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub duration: Option<f64>,
    pub video_streams: usize,
    pub audio_streams: usize,
}

impl MediaInfo {
    /// One picture, no sound.
    pub fn is_still_image(&self) -> bool {
        self.video_streams == 1 && self.audio_streams == 0
    }

    pub fn is_playable_video(&self, expected_duration: Option<f64>) -> bool {
        if self.video_streams == 0 || self.audio_streams == 0 {
            return false;
        }
        let Some(duration) = self.duration.filter(|d| *d > 0.0) else {
            return false;
        };
        match expected_duration {
            Some(expected) if expected > 0.0 => {
                (duration - expected).abs() <= DURATION_TOLERANCE_SECS
            }
            _ => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
}

pub fn parse_probe_output(stdout: &[u8]) -> PipelineResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;
    let count = |kind: &str| {
        probe
            .streams
            .iter()
            .filter(|s| s.codec_type.as_deref() == Some(kind))
            .count()
    };

    Ok(MediaInfo {
        duration: probe
            .format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .and_then(|d| d.parse::<f64>().ok()),
        video_streams: count("video"),
        audio_streams: count("audio"),
    })
}

pub async fn probe(ffprobe: &Path, path: &Path, timeout: Duration) -> PipelineResult<MediaInfo> {
    let mut command = Command::new(ffprobe);
    command
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| PipelineError::encoding(None, format!("ffprobe timed out on {}", path.display())))?
        .map_err(|e| {
            PipelineError::encoding(None, format!("cannot start {}: {}", ffprobe.display(), e))
        })?;

    if !output.status.success() {
        return Err(PipelineError::Encoding {
            track: None,
            message: format!("ffprobe failed on {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}
