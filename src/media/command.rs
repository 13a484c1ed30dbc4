//! ffmpeg command builder and runner.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use tokio::{io::AsyncReadExt, process::Command};

use crate::error::{PipelineError, PipelineResult};

/// Bytes of stderr kept for error reports.
const STDERR_TAIL_BYTES: usize = 4096;

#[derive(Debug, Clone)]
struct Input {
    args: Vec<String>,
    path: PathBuf,
}

/// Builder for ffmpeg invocations with several inputs and one output.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<Input>,
    output_args: Vec<String>,
    output: PathBuf,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output_args: Vec::new(),
            output: output.as_ref().to_path_buf(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.inputs.push(Input {
            args: Vec::new(),
            path: path.as_ref().to_path_buf(),
        });
        self
    }

    /// Input repeated forever; combine with [`FfmpegCommand::shortest`].
    pub fn looped_input(mut self, path: impl AsRef<Path>) -> Self {
        self.inputs.push(Input {
            args: vec!["-loop".to_string(), "1".to_string()],
            path: path.as_ref().to_path_buf(),
        });
        self
    }

    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    pub fn pixel_format(self, format: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(format)
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Stop at the end of the shortest input.
    pub fn shortest(self) -> Self {
        self.output_arg("-shortest")
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.overwrite {
            args.push("-y".to_string());
        }
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// 1920x1080 H.264/AAC video of `image` for the length of `audio`.
pub fn still_image_video(image: &Path, audio: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .looped_input(image)
        .input(audio)
        .video_codec("libx264")
        .preset("slow")
        .crf(18)
        .audio_codec("aac")
        .audio_bitrate("192k")
        .shortest()
        .pixel_format("yuv420p")
        .video_filter(
            "scale=1920:1080:force_original_aspect_ratio=decrease,pad=1920:1080:(ow-iw)/2:(oh-ih)/2",
        )
}

/// Runs ffmpeg, killing it once `timeout` elapses.
pub async fn run(
    program: &Path,
    cmd: &FfmpegCommand,
    timeout: Duration,
    track: Option<u32>,
) -> PipelineResult<()> {
    let args = cmd.build_args();
    tracing::debug!("running {} {}", program.display(), args.join(" "));

    let mut child = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            PipelineError::encoding(track, format!("cannot start {}: {}", program.display(), e))
        })?;

    let mut stderr = child.stderr.take();
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(stderr) = stderr.as_mut() {
            let _ = stderr.read_to_end(&mut buf).await;
        }
        buf
    });

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => status.map_err(|e| PipelineError::encoding(track, e.to_string()))?,
        Err(_) => {
            tracing::warn!("ffmpeg timed out after {}s, killing", timeout.as_secs());
            let _ = child.kill().await;
            return Err(PipelineError::encoding(
                track,
                format!("ffmpeg timed out after {} seconds", timeout.as_secs()),
            ));
        }
    };

    let stderr = stderr_task.await.unwrap_or_default();
    if status.success() {
        return Ok(());
    }

    Err(PipelineError::Encoding {
        track,
        message: format!("ffmpeg exited with {}", status),
        stderr: Some(stderr_tail(&stderr)),
    })
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    let mut start = trimmed.len().saturating_sub(STDERR_TAIL_BYTES);
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}
