//! Configuration management for archivetube.
//!
//! Configuration comes from environment variables, optionally seeded from a
//! `.env` file in the local data directory:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in `{data_local_dir}/archivetube/`
//! 3. Defaults baked into [`Settings::defaults`]
//!
//! Everything is resolved once into an immutable [`Settings`] value that the
//! pipeline stages receive explicitly.

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use crate::{
    error::{PipelineError, PipelineResult},
    retry::RetryPolicy,
};

pub const YOUTUBE_SCOPE: &str =
    "https://www.googleapis.com/auth/youtube.upload https://www.googleapis.com/auth/youtube";

/// Root of everything archivetube keeps on disk (`.env`, token cache,
/// default work directory).
///
/// - Linux: `~/.local/share/archivetube`
/// - macOS: `~/Library/Application Support/archivetube`
/// - Windows: `%LOCALAPPDATA%/archivetube`
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("archivetube");
    path
}

/// Loads environment variables from `{data_dir}/.env`.
///
/// The directory is created if needed. A missing `.env` file is not an
/// error; the environment and the defaults still apply. Variables already
/// present in the process environment are never overridden.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file exists but
/// cannot be parsed.
pub async fn load_env() -> Result<(), String> {
    let dir = data_dir();
    async_fs::create_dir_all(&dir)
        .await
        .map_err(|e| e.to_string())?;

    let path = dir.join(".env");
    if path.is_file() {
        dotenv::from_path(&path).map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// OAuth client registration and Google endpoints.
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub scope: String,
}

impl OAuthSettings {
    /// Fails with [`PipelineError::Auth`] when no client is registered.
    pub fn require_client(&self) -> PipelineResult<()> {
        if self.client_id.is_empty() {
            return Err(PipelineError::Auth(
                "GOOGLE_CLIENT_ID must be set".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Root under which each collection gets its own `{identifier}/` directory.
    pub work_dir: PathBuf,
    /// Fixed background image; when unset the archive.org item image is used.
    pub background_image: Option<PathBuf>,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub archive_url: String,
    pub youtube_api_url: String,
    pub youtube_upload_url: String,
    pub oauth: OAuthSettings,
    /// Cached OAuth token.
    pub token_path: PathBuf,
    pub server_addr: String,
    pub http_timeout: Duration,
    /// Total time allowed for large transfers (audio downloads, video uploads).
    pub upload_timeout: Duration,
    pub encode_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Settings {
    pub fn defaults(work_dir: PathBuf) -> Self {
        Self {
            work_dir,
            background_image: None,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            archive_url: "https://archive.org".to_string(),
            youtube_api_url: "https://www.googleapis.com/youtube/v3".to_string(),
            youtube_upload_url: "https://www.googleapis.com/upload/youtube/v3".to_string(),
            oauth: OAuthSettings {
                client_id: String::new(),
                client_secret: String::new(),
                auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                redirect_uri: "http://127.0.0.1:18765/callback".to_string(),
                scope: YOUTUBE_SCOPE.to_string(),
            },
            token_path: data_dir().join("cache").join("token.json"),
            server_addr: "127.0.0.1:18765".to_string(),
            http_timeout: Duration::from_secs(60),
            upload_timeout: Duration::from_secs(3600),
            encode_timeout: Duration::from_secs(3600),
            retry: RetryPolicy::default(),
        }
    }

    /// Builds settings from the process environment on top of the defaults.
    ///
    /// Call [`load_env`] first so values from the `.env` file are visible.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] when a numeric variable cannot be
    /// parsed.
    pub fn from_env() -> PipelineResult<Self> {
        let mut settings = Self::defaults(data_dir().join("work"));

        if let Some(dir) = var("ARCHIVETUBE_WORK_DIR") {
            settings.work_dir = PathBuf::from(dir);
        }
        settings.background_image = var("ARCHIVETUBE_BACKGROUND_IMAGE").map(PathBuf::from);
        if let Some(path) = var("FFMPEG_PATH") {
            settings.ffmpeg_path = PathBuf::from(path);
        }
        if let Some(path) = var("FFPROBE_PATH") {
            settings.ffprobe_path = PathBuf::from(path);
        }
        if let Some(url) = var("ARCHIVE_API_URL") {
            settings.archive_url = url;
        }
        if let Some(url) = var("YOUTUBE_API_URL") {
            settings.youtube_api_url = url;
        }
        if let Some(url) = var("YOUTUBE_UPLOAD_URL") {
            settings.youtube_upload_url = url;
        }
        if let Some(addr) = var("SERVER_ADDRESS") {
            settings.server_addr = addr;
        }

        let oauth = &mut settings.oauth;
        oauth.client_id = var("GOOGLE_CLIENT_ID").unwrap_or_default();
        oauth.client_secret = var("GOOGLE_CLIENT_SECRET").unwrap_or_default();
        if let Some(url) = var("GOOGLE_AUTH_URL") {
            oauth.auth_url = url;
        }
        if let Some(url) = var("GOOGLE_TOKEN_URL") {
            oauth.token_url = url;
        }
        if let Some(uri) = var("GOOGLE_REDIRECT_URI") {
            oauth.redirect_uri = uri;
        }

        if let Some(secs) = parsed::<u64>("HTTP_TIMEOUT_SECS")? {
            settings.http_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parsed::<u64>("UPLOAD_TIMEOUT_SECS")? {
            settings.upload_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parsed::<u64>("ENCODE_TIMEOUT_SECS")? {
            settings.encode_timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = parsed::<u32>("RETRY_ATTEMPTS")? {
            settings.retry.max_retries = attempts;
        }
        if let Some(ms) = parsed::<u64>("RETRY_BASE_DELAY_MS")? {
            settings.retry.base_delay = Duration::from_millis(ms);
        }

        Ok(settings)
    }

    /// Directory owned by one collection's run.
    pub fn collection_dir(&self, identifier: &str) -> PathBuf {
        self.work_dir.join(identifier)
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: FromStr>(key: &str) -> PipelineResult<Option<T>> {
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| PipelineError::Config(format!("{} must be a number, got {:?}", key, raw))),
        None => Ok(None),
    }
}
