//! Error taxonomy for the republishing pipeline.
//!
//! Errors fall in two groups. Per-track errors ([`PipelineError::Download`],
//! [`PipelineError::Encoding`], [`PipelineError::Upload`]) exclude a single
//! track from the remaining stages of the current run while its siblings keep
//! going. Run-level errors ([`PipelineError::NotFound`],
//! [`PipelineError::NoAudioFiles`], [`PipelineError::Auth`],
//! [`PipelineError::QuotaExceeded`]) abort whatever is left of the run.

use std::path::PathBuf;

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("not an archive.org item URL or identifier: {0}")]
    InvalidInput(String),

    #[error("archive.org item {0} not found")]
    NotFound(String),

    #[error("archive.org item {0} has no audio files")]
    NoAudioFiles(String),

    #[error("download of track {track} failed: {message}")]
    Download { track: u32, message: String },

    #[error("encoding failed: {message}")]
    Encoding {
        track: Option<u32>,
        message: String,
        stderr: Option<String>,
    },

    #[error("upload of track {track} failed: {message}")]
    Upload { track: u32, message: String },

    #[error("YouTube request failed: {0}")]
    Api(String),

    #[error("YouTube authorization failed: {0}")]
    Auth(String),

    #[error("YouTube API quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            source,
            path: path.into(),
        }
    }

    pub fn encoding(track: Option<u32>, message: impl Into<String>) -> Self {
        PipelineError::Encoding {
            track,
            message: message.into(),
            stderr: None,
        }
    }

    /// Errors that abort the rest of the run instead of a single track.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidInput(_)
                | PipelineError::NotFound(_)
                | PipelineError::NoAudioFiles(_)
                | PipelineError::Auth(_)
                | PipelineError::QuotaExceeded(_)
                | PipelineError::Config(_)
        )
    }

    /// Errors worth retrying on an idempotent call.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::Http(e) => e.is_timeout() || e.is_connect() || e.is_body(),
            PipelineError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Attaches a track number to a transport error raised while handling it.
    pub fn for_download(self, track: u32) -> Self {
        match self {
            PipelineError::Download { .. } => self,
            other => PipelineError::Download {
                track,
                message: other.to_string(),
            },
        }
    }

    /// Same as [`PipelineError::for_download`] for the upload stage. Auth and
    /// quota failures keep their kind so the run can stop.
    pub fn for_upload(self, track: u32) -> Self {
        match self {
            PipelineError::Upload { .. } | PipelineError::Auth(_) | PipelineError::QuotaExceeded(_) => {
                self
            }
            other => PipelineError::Upload {
                track,
                message: other.to_string(),
            },
        }
    }

    /// User-facing text with the next step to take.
    pub fn actionable(&self) -> String {
        match self {
            PipelineError::QuotaExceeded(_) => format!(
                "{}. Retry after the daily quota resets; already uploaded tracks will be skipped.",
                self
            ),
            PipelineError::Auth(_) => {
                format!("{}. Run `archivetube auth` to sign in again.", self)
            }
            PipelineError::NotFound(_) | PipelineError::InvalidInput(_) => {
                format!("{}. Check the archive.org URL.", self)
            }
            PipelineError::Download { .. }
            | PipelineError::Encoding { .. }
            | PipelineError::Upload { .. } => format!(
                "{}. Local files were kept; run the same command again to resume.",
                self
            ),
            _ => self.to_string(),
        }
    }
}
