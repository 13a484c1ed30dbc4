use super::{PAGE_SIZE, YouTubeClient, check_response};
use crate::{
    error::{PipelineError, PipelineResult},
    format,
    types::{
        PlaylistItemInsertRequest, PlaylistItemInsertSnippet, PlaylistMetadata, PlaylistResource,
        PlaylistSnippet, PlaylistStatus, Privacy, RemotePlaylist, ResourceId, YouTubeListResponse,
    },
};

fn remote_playlist(resource: PlaylistResource) -> Option<RemotePlaylist> {
    let id = resource.id?;
    let (title, description) = resource
        .snippet
        .map(|s| (s.title, s.description))
        .unwrap_or_default();
    Some(RemotePlaylist {
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
    pub(super) async fn search_playlists(
        &self,
        marker: &str,
        title: &str,
    ) -> PipelineResult<Option<RemotePlaylist>> {
        let mut playlists = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("part", "snippet,status".to_string()),
                ("mine", "true".to_string()),
                ("maxResults", PAGE_SIZE.to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let page: YouTubeListResponse<PlaylistResource> =
                self.get_json("playlists.list", "playlists", &query).await?;
            playlists.extend(page.items.into_iter().filter_map(remote_playlist));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        let by_marker = playlists
            .iter()
            .position(|p| format::has_marker(&p.description, marker));
        let index = by_marker.or_else(|| playlists.iter().position(|p| p.title == title));
        Ok(index.map(|i| playlists.swap_remove(i)))
    }

    /// Sent once, never retried.
    pub(super) async fn insert_playlist(
        &self,
        metadata: &PlaylistMetadata,
    ) -> PipelineResult<RemotePlaylist> {
        let token = self.access_token().await?;
        let resource = PlaylistResource {
            id: None,
            snippet: Some(PlaylistSnippet {
                title: metadata.title.clone(),
                description: metadata.description.clone(),
            }),
            status: Some(PlaylistStatus {
                privacy_status: metadata.privacy,
            }),
        };

        let response = self
            .http
            .post(self.api_url("playlists"))
            .bearer_auth(token)
            .query(&[("part", "snippet,status")])
            .json(&resource)
            .send()
            .await?;
        let response = check_response(response).await?;

        let created: PlaylistResource = response.json().await?;
        remote_playlist(created)
            .ok_or_else(|| PipelineError::Api("playlist response without id".to_string()))
    }

    /// Sent once, never retried.
    pub(super) async fn insert_item(
        &self,
        playlist_id: &str,
        video_id: &str,
        position: Option<u32>,
    ) -> PipelineResult<()> {
        let token = self.access_token().await?;
        let request = PlaylistItemInsertRequest {
            snippet: PlaylistItemInsertSnippet {
                playlist_id: playlist_id.to_string(),
                position,
                resource_id: ResourceId {
                    kind: "youtube#video".to_string(),
                    video_id: video_id.to_string(),
                },
            },
        };

        let response = self
            .http
            .post(self.api_url("playlistItems"))
            .bearer_auth(token)
            .query(&[("part", "snippet")])
            .json(&request)
            .send()
            .await?;
        check_response(response).await?;
        Ok(())
    }

    /// `playlists.update` replaces the snippet too, so title and description
    /// are sent back unchanged.
    pub(super) async fn update_playlist_privacy(
        &self,
        playlist: &RemotePlaylist,
        privacy: Privacy,
    ) -> PipelineResult<()> {
        let url = self.api_url("playlists");
        let url = &url;
        let resource = PlaylistResource {
            id: Some(playlist.id.clone()),
            snippet: Some(PlaylistSnippet {
                title: playlist.title.clone(),
                description: playlist.description.clone(),
            }),
            status: Some(PlaylistStatus {
                privacy_status: privacy,
            }),
        };
        let resource = &resource;

        self.settings
            .retry
            .run("playlists.update", |_| async move {
                let token = self.access_token().await?;
                let response = self
                    .http
                    .put(url)
                    .bearer_auth(token)
                    .query(&[("part", "snippet,status")])
                    .json(resource)
                    .send()
                    .await?;
                check_response(response).await?;
                Ok(())
            })
            .await
    }
}
