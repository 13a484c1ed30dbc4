//! # YouTube Integration
//!
//! Access to the YouTube Data API v3 for the pipeline, behind the
//! [`VideoHost`] trait.
//!
//! ```text
//! Pipeline stages
//!      ↓
//! VideoHost (trait)
//!      ↓
//! YouTubeClient ── auth (OAuth 2.0 PKCE, token refresh)
//!      ├── videos     (uploads listing, videos.list, resumable upload, privacy)
//!      └── playlists  (playlists.list/insert/update, playlistItems)
//!      ↓
//! reqwest + bearer token from TokenManager
//! ```
//!
//! ## Retries
//!
//! Reads and privacy updates go through the configured
//! [`RetryPolicy`](crate::retry::RetryPolicy). Uploads and inserts are sent
//! exactly once: a second attempt could create a duplicate, and the
//! existing-video search of the next run picks up whatever did get through.
//!
//! ## Errors
//!
//! Non-success responses are classified by [`classify_error`]: quota
//! exhaustion and authorization failures get their own
//! [`PipelineError`] variants so the run can stop early.

pub mod auth;
mod playlists;
mod videos;

use std::path::Path;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::{
    config::Settings,
    error::{PipelineError, PipelineResult},
    management::TokenManager,
    types::{GoogleErrorBody, PlaylistMetadata, Privacy, RemotePlaylist, RemoteVideo, VideoMetadata},
};

/// Page size for every list call.
pub const PAGE_SIZE: usize = 50;

/// Remote side of the pipeline: where videos and playlists live.
#[async_trait]
pub trait VideoHost: Send + Sync {
    /// Videos on the channel whose description carries the `marker` line.
    async fn find_existing_videos(&self, marker: &str) -> PipelineResult<Vec<RemoteVideo>>;

    /// The subset of `ids` that still exists.
    async fn videos_by_id(&self, ids: &[String]) -> PipelineResult<Vec<RemoteVideo>>;

    async fn upload_video(&self, path: &Path, metadata: &VideoMetadata)
    -> PipelineResult<RemoteVideo>;

    async fn set_video_privacy(&self, video_id: &str, privacy: Privacy) -> PipelineResult<()>;

    /// Playlist whose description carries the `marker` line, else one titled
    /// `title`.
    async fn find_playlist(&self, marker: &str, title: &str)
    -> PipelineResult<Option<RemotePlaylist>>;

    async fn create_playlist(&self, metadata: &PlaylistMetadata) -> PipelineResult<RemotePlaylist>;

    /// Member video ids in playlist order.
    async fn playlist_items(&self, playlist_id: &str) -> PipelineResult<Vec<String>>;

    /// Inserts at `position` (0-based), or appends when `None`.
    async fn insert_playlist_item(
        &self,
        playlist_id: &str,
        video_id: &str,
        position: Option<u32>,
    ) -> PipelineResult<()>;

    async fn set_playlist_privacy(
        &self,
        playlist: &RemotePlaylist,
        privacy: Privacy,
    ) -> PipelineResult<()>;
}

pub struct YouTubeClient {
    http: Client,
    upload: Client,
    settings: Settings,
    tokens: Mutex<TokenManager>,
}

impl YouTubeClient {
    pub fn new(settings: &Settings, tokens: TokenManager) -> PipelineResult<Self> {
        let http = Client::builder().timeout(settings.http_timeout).build()?;
        let upload = Client::builder()
            .connect_timeout(settings.http_timeout)
            .timeout(settings.upload_timeout)
            .build()?;

        Ok(Self {
            http,
            upload,
            settings: settings.clone(),
            tokens: Mutex::new(tokens),
        })
    }

    /// Client authorized with the cached token.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Auth`] when no client id is configured or no token
    /// is cached.
    pub async fn from_cache(settings: &Settings) -> PipelineResult<Self> {
        settings.oauth.require_client()?;
        let tokens = TokenManager::load(&settings.token_path).await.map_err(|e| {
            PipelineError::Auth(format!("no usable token at {}: {}", settings.token_path.display(), e))
        })?;
        Self::new(settings, tokens)
    }

    async fn access_token(&self) -> PipelineResult<String> {
        let mut tokens = self.tokens.lock().await;
        tokens.get_valid_token(&self.http, &self.settings.oauth).await
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.settings.youtube_api_url.trim_end_matches('/'),
            path
        )
    }

    /// GET with retry.
    async fn get_json<T: DeserializeOwned + Send>(
        &self,
        what: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> PipelineResult<T> {
        let url = self.api_url(path);
        let url = &url;
        self.settings
            .retry
            .run(what, |_| async move {
                let token = self.access_token().await?;
                let response = self
                    .http
                    .get(url)
                    .bearer_auth(token)
                    .query(query)
                    .send()
                    .await?;
                let response = check_response(response).await?;
                Ok(response.json::<T>().await?)
            })
            .await
    }
}

/// Passes successful responses through, classifies the rest.
pub(crate) async fn check_response(response: Response) -> PipelineResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(classify_error(status.as_u16(), &body, &url))
}

/// Maps a failed API response to a [`PipelineError`].
pub fn classify_error(status: u16, body: &str, url: &str) -> PipelineError {
    let parsed = serde_json::from_str::<GoogleErrorBody>(body).ok();
    let reasons: Vec<String> = parsed
        .as_ref()
        .map(|b| b.error.errors.iter().filter_map(|e| e.reason.clone()).collect())
        .unwrap_or_default();
    let message = parsed
        .as_ref()
        .map(|b| b.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("http status {}", status));

    let quota = reasons
        .iter()
        .any(|r| matches!(r.as_str(), "quotaExceeded" | "dailyLimitExceeded" | "uploadLimitExceeded"));

    match status {
        403 if quota => PipelineError::QuotaExceeded(message),
        401 => PipelineError::Auth(message),
        429 => PipelineError::Status {
            status,
            url: url.to_string(),
        },
        s if s >= 500 => PipelineError::Status {
            status,
            url: url.to_string(),
        },
        _ => PipelineError::Api(format!("{} ({})", message, status)),
    }
}

#[async_trait]
impl VideoHost for YouTubeClient {
    async fn find_existing_videos(&self, marker: &str) -> PipelineResult<Vec<RemoteVideo>> {
        self.search_uploads(marker).await
    }

    async fn videos_by_id(&self, ids: &[String]) -> PipelineResult<Vec<RemoteVideo>> {
        self.list_videos(ids).await
    }

    async fn upload_video(
        &self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> PipelineResult<RemoteVideo> {
        self.upload_resumable(path, metadata).await
    }

    async fn set_video_privacy(&self, video_id: &str, privacy: Privacy) -> PipelineResult<()> {
        self.update_video_privacy(video_id, privacy).await
    }

    async fn find_playlist(
        &self,
        marker: &str,
        title: &str,
    ) -> PipelineResult<Option<RemotePlaylist>> {
        self.search_playlists(marker, title).await
    }

    async fn create_playlist(&self, metadata: &PlaylistMetadata) -> PipelineResult<RemotePlaylist> {
        self.insert_playlist(metadata).await
    }

    async fn playlist_items(&self, playlist_id: &str) -> PipelineResult<Vec<String>> {
        self.list_playlist_video_ids(playlist_id).await
    }

    async fn insert_playlist_item(
        &self,
        playlist_id: &str,
        video_id: &str,
        position: Option<u32>,
    ) -> PipelineResult<()> {
        self.insert_item(playlist_id, video_id, position).await
    }

    async fn set_playlist_privacy(
        &self,
        playlist: &RemotePlaylist,
        privacy: Privacy,
    ) -> PipelineResult<()> {
        self.update_playlist_privacy(playlist, privacy).await
    }
}
