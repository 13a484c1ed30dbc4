use std::path::Path;

use reqwest::{
    Body,
    header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION},
};

use super::{PAGE_SIZE, YouTubeClient, check_response};
use crate::{
    error::{PipelineError, PipelineResult},
    format,
    types::{
        ChannelResource, PlaylistItemResource, Privacy, RemoteVideo, VideoMetadata, VideoResource,
        VideoSnippet, VideoStatus, YouTubeListResponse,
    },
};

pub(super) fn remote_video(resource: VideoResource) -> Option<RemoteVideo> {
    let id = resource.id?;
    let (title, description) = resource
        .snippet
        .map(|s| (s.title, s.description))
        .unwrap_or_default();
    Some(RemoteVideo {
        id,
        title,
        description,
        privacy: resource
            .status
            .map(|s| s.privacy_status)
            .unwrap_or(Privacy::Private),
    })
}

impl YouTubeClient {
    /// Id of the channel's "uploads" playlist.
    async fn uploads_playlist_id(&self) -> PipelineResult<String> {
        let res: YouTubeListResponse<ChannelResource> = self
            .get_json(
                "channels.list",
                "channels",
                &[
                    ("part", "contentDetails".to_string()),
                    ("mine", "true".to_string()),
                ],
            )
            .await?;

        res.items
            .into_iter()
            .next()
            .map(|c| c.content_details.related_playlists.uploads)
            .ok_or_else(|| {
                PipelineError::Api("the authorized account has no YouTube channel".to_string())
            })
    }

    pub(super) async fn list_playlist_video_ids(
        &self,
        playlist_id: &str,
    ) -> PipelineResult<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("part", "contentDetails".to_string()),
                ("playlistId", playlist_id.to_string()),
                ("maxResults", PAGE_SIZE.to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let page: YouTubeListResponse<PlaylistItemResource> = self
                .get_json("playlistItems.list", "playlistItems", &query)
                .await?;
            ids.extend(
                page.items
                    .into_iter()
                    .filter_map(|item| item.content_details.map(|d| d.video_id)),
            );

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(ids)
    }

    pub(super) async fn list_videos(&self, ids: &[String]) -> PipelineResult<Vec<RemoteVideo>> {
        let mut videos = Vec::new();
        for chunk in ids.chunks(PAGE_SIZE) {
            let query = [
                ("part", "snippet,status".to_string()),
                ("id", chunk.join(",")),
                ("maxResults", PAGE_SIZE.to_string()),
            ];
            let page: YouTubeListResponse<VideoResource> =
                self.get_json("videos.list", "videos", &query).await?;
            videos.extend(page.items.into_iter().filter_map(remote_video));
        }
        Ok(videos)
    }

    /// Walks the uploads playlist instead of `search.list`, which costs 100
    /// quota units per page and lags behind fresh uploads.
    pub(super) async fn search_uploads(&self, marker: &str) -> PipelineResult<Vec<RemoteVideo>> {
        let uploads = self.uploads_playlist_id().await?;
        let ids = self.list_playlist_video_ids(&uploads).await?;
        let videos = self.list_videos(&ids).await?;
        let matching: Vec<RemoteVideo> = videos
            .into_iter()
            .filter(|v| format::has_marker(&v.description, marker))
            .collect();

        tracing::debug!(
            scanned = ids.len(),
            matching = matching.len(),
            "existing video search"
        );
        Ok(matching)
    }

    /// Resumable upload: one request opens the session, a second streams the
    /// file. Sent once, never retried.
    pub(super) async fn upload_resumable(
        &self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> PipelineResult<RemoteVideo> {
        let size = async_fs::metadata(path)
            .await
            .map_err(|e| PipelineError::io(path, e))?
            .len();
        let token = self.access_token().await?;

        let resource = VideoResource {
            id: None,
            snippet: Some(VideoSnippet {
                title: metadata.title.clone(),
                description: metadata.description.clone(),
                tags: metadata.tags.clone(),
                category_id: Some(metadata.category_id.clone()),
            }),
            status: Some(VideoStatus {
                privacy_status: metadata.privacy,
                self_declared_made_for_kids: Some(false),
                embeddable: None,
                license: None,
                public_stats_viewable: None,
            }),
        };

        let url = format!(
            "{}/videos",
            self.settings.youtube_upload_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .header("X-Upload-Content-Type", "video/mp4")
            .header("X-Upload-Content-Length", size.to_string())
            .json(&resource)
            .send()
            .await?;
        let response = check_response(response).await?;

        let session_url = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                PipelineError::Api("upload session response without Location header".to_string())
            })?;

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| PipelineError::io(path, e))?;
        let response = self
            .upload
            .put(&session_url)
            .bearer_auth(&token)
            .header(CONTENT_TYPE, "video/mp4")
            .header(CONTENT_LENGTH, size)
            .body(Body::from(file))
            .send()
            .await?;
        let response = check_response(response).await?;

        let created: VideoResource = response.json().await?;
        let video = remote_video(created)
            .ok_or_else(|| PipelineError::Api("upload response without video id".to_string()))?;
        tracing::debug!(video_id = %video.id, path = %path.display(), "uploaded");
        Ok(video)
    }

    /// `videos.update` resets status fields it is not sent, so the current
    /// status is fetched and sent back with only the privacy changed.
    pub(super) async fn update_video_privacy(
        &self,
        video_id: &str,
        privacy: Privacy,
    ) -> PipelineResult<()> {
        let query = [("part", "status".to_string()), ("id", video_id.to_string())];
        let current: YouTubeListResponse<VideoResource> =
            self.get_json("videos.list", "videos", &query).await?;
        let mut status = current
            .items
            .into_iter()
            .find_map(|v| v.status)
            .ok_or_else(|| PipelineError::Api(format!("video {} not found (404)", video_id)))?;
        status.privacy_status = privacy;
        status.self_declared_made_for_kids.get_or_insert(false);

        let url = self.api_url("videos");
        let url = &url;
        let resource = VideoResource {
            id: Some(video_id.to_string()),
            snippet: None,
            status: Some(status),
        };
        let resource = &resource;

        self.settings
            .retry
            .run("videos.update", |_| async move {
                let token = self.access_token().await?;
                let response = self
                    .http
                    .put(url)
                    .bearer_auth(token)
                    .query(&[("part", "status")])
                    .json(resource)
                    .send()
                    .await?;
                check_response(response).await?;
                Ok(())
            })
            .await
    }
}
