#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use archivetube::{
    config::Settings,
    error::{PipelineError, PipelineResult},
    format,
    media::{Encoder, check_image_header},
    retry::RetryPolicy,
    types::{PlaylistMetadata, Privacy, RemotePlaylist, RemoteVideo, VideoMetadata},
    youtube::VideoHost,
};
use async_trait::async_trait;
use axum::{
    Extension, Json, Router,
    extract::Path as UrlPath,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

/// Serves `router` on an ephemeral port and returns its base URL.
pub async fn spawn_router(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn test_settings(work_dir: &Path, archive_url: &str) -> Settings {
    let mut settings = Settings::defaults(work_dir.to_path_buf());
    settings.archive_url = archive_url.to_string();
    settings.retry = RetryPolicy::none();
    settings
}

/// archive.org metadata for a show with `tracks` recordings, each present
/// as a Flac original plus a VBR MP3 derivative.
pub fn show_metadata(tracks: u32) -> Value {
    let mut files = vec![
        json!({"name": "show.jpg", "source": "original", "format": "JPEG"}),
        json!({"name": "show_meta.xml", "source": "original", "format": "Metadata"}),
    ];
    for n in 1..=tracks {
        files.push(json!({
            "name": format!("d1t0{}.flac", n),
            "source": "original",
            "format": "Flac",
            "title": format!("Song {}", n),
            "track": n.to_string(),
            "length": format!("3:0{}", n),
            "size": "2048"
        }));
        files.push(json!({
            "name": format!("d1t0{}.mp3", n),
            "source": "derivative",
            "format": "VBR MP3",
            "original": format!("d1t0{}.flac", n),
            "title": format!("Song {}", n),
            "track": n.to_string(),
            "length": format!("18{}.0", n)
        }));
    }

    json!({
        "metadata": {
            "identifier": "show",
            "title": "Band Live at the Hall on 1977-05-08",
            "creator": "The Band",
            "venue": "The Hall",
            "date": "1977-05-08",
            "description": "Set one.<br/>Recorded from the board.",
            "taper": "Someone"
        },
        "files": files
    })
}

#[derive(Default)]
pub struct ArchiveState {
    pub metadata: Mutex<HashMap<String, Value>>,
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    /// File names answered with 404.
    pub failing: Mutex<HashSet<String>>,
    pub downloads: Mutex<Vec<String>>,
}

impl ArchiveState {
    pub fn download_count(&self, file: &str) -> usize {
        self.downloads
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.as_str() == file)
            .count()
    }

    pub fn set_failing(&self, files: &[&str]) {
        let mut failing = self.failing.lock().unwrap();
        failing.clear();
        failing.extend(files.iter().map(|f| f.to_string()));
    }
}

pub struct FakeArchive {
    pub url: String,
    pub state: Arc<ArchiveState>,
}

impl FakeArchive {
    /// Archive serving `identifier` with `tracks` Flac recordings.
    pub async fn start(identifier: &str, tracks: u32) -> Self {
        let state = Arc::new(ArchiveState::default());
        state
            .metadata
            .lock()
            .unwrap()
            .insert(identifier.to_string(), show_metadata(tracks));
        {
            let mut files = state.files.lock().unwrap();
            for n in 1..=tracks {
                files.insert(format!("d1t0{}.flac", n), format!("fLaC track {}", n).into_bytes());
            }
        }

        let router = Router::new()
            .route("/metadata/{id}", get(metadata))
            .route("/download/{id}/{*file}", get(download))
            .route("/services/img/{id}", get(image))
            .layer(Extension(Arc::clone(&state)));
        let url = spawn_router(router).await;
        Self { url, state }
    }
}

async fn metadata(
    UrlPath(id): UrlPath<String>,
    Extension(state): Extension<Arc<ArchiveState>>,
) -> Json<Value> {
    let docs = state.metadata.lock().unwrap();
    Json(docs.get(&id).cloned().unwrap_or_else(|| json!({})))
}

async fn download(
    UrlPath((_id, file)): UrlPath<(String, String)>,
    Extension(state): Extension<Arc<ArchiveState>>,
) -> Response {
    state.downloads.lock().unwrap().push(file.clone());
    if state.failing.lock().unwrap().contains(&file) {
        return StatusCode::NOT_FOUND.into_response();
    }
    match state.files.lock().unwrap().get(&file) {
        Some(bytes) => bytes.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn image(UrlPath(_id): UrlPath<String>) -> Vec<u8> {
    JPEG_BYTES.to_vec()
}

/// Encoder writing a small marker file instead of running ffmpeg.
#[derive(Default)]
pub struct FakeEncoder {
    pub encodes: Mutex<Vec<u32>>,
}

impl FakeEncoder {
    pub fn encode_count(&self) -> usize {
        self.encodes.lock().unwrap().len()
    }
}

#[async_trait]
impl Encoder for FakeEncoder {
    async fn validate_image(&self, path: &Path) -> PipelineResult<()> {
        check_image_header(path).await
    }

    async fn is_valid_video(&self, path: &Path, _expected_duration: Option<f64>) -> bool {
        match tokio::fs::read(path).await {
            Ok(bytes) => bytes.starts_with(b"VIDEO"),
            Err(_) => false,
        }
    }

    async fn encode(
        &self,
        track: u32,
        image: &Path,
        audio: &Path,
        output: &Path,
    ) -> PipelineResult<()> {
        assert!(image.exists(), "background missing while encoding");
        let audio_bytes = tokio::fs::read(audio)
            .await
            .map_err(|e| PipelineError::io(audio, e))?;
        let mut out = b"VIDEO:".to_vec();
        out.extend(audio_bytes);
        tokio::fs::write(output, out)
            .await
            .map_err(|e| PipelineError::io(output, e))?;
        self.encodes.lock().unwrap().push(track);
        Ok(())
    }
}

pub struct FakePlaylist {
    pub playlist: RemotePlaylist,
    pub members: Vec<String>,
}

#[derive(Default)]
pub struct HostState {
    pub videos: Vec<RemoteVideo>,
    pub playlists: Vec<FakePlaylist>,
    /// Ids missing from the channel listing (listing lag).
    pub unlisted: HashSet<String>,
    /// Track numbers whose upload fails with a transient API error.
    pub failing_uploads: HashSet<u32>,
    /// Fail every upload with a quota error once this many succeeded.
    pub quota_after: Option<usize>,
    pub privacy_calls: Vec<(String, Privacy)>,
    pub inserts: Vec<(String, Option<u32>)>,
}

/// In-memory channel.
#[derive(Default)]
pub struct FakeHost {
    pub state: Mutex<HostState>,
    uploads: AtomicUsize,
}

impl FakeHost {
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn with_state(f: impl FnOnce(&mut HostState)) -> Self {
        let host = Self::default();
        f(&mut host.state.lock().unwrap());
        host
    }

    /// Track numbers of the playlist members, in playlist order.
    pub fn playlist_order(&self) -> Vec<u32> {
        let state = self.state.lock().unwrap();
        let Some(playlist) = state.playlists.first() else {
            return Vec::new();
        };
        playlist
            .members
            .iter()
            .filter_map(|id| state.videos.iter().find(|v| &v.id == id))
            .filter_map(|v| format::match_track_number(&v.description))
            .collect()
    }
}

#[async_trait]
impl VideoHost for FakeHost {
    async fn find_existing_videos(&self, marker: &str) -> PipelineResult<Vec<RemoteVideo>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .videos
            .iter()
            .filter(|v| format::has_marker(&v.description, marker) && !state.unlisted.contains(&v.id))
            .cloned()
            .collect())
    }

    async fn videos_by_id(&self, ids: &[String]) -> PipelineResult<Vec<RemoteVideo>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .videos
            .iter()
            .filter(|v| ids.contains(&v.id))
            .cloned()
            .collect())
    }

    async fn upload_video(
        &self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> PipelineResult<RemoteVideo> {
        assert!(path.exists(), "uploading a missing file");
        let number = format::match_track_number(&metadata.description).unwrap_or(0);

        let mut state = self.state.lock().unwrap();
        if state.failing_uploads.contains(&number) {
            return Err(PipelineError::Status {
                status: 503,
                url: "videos.insert".to_string(),
            });
        }
        if state
            .quota_after
            .is_some_and(|limit| self.uploads.load(Ordering::SeqCst) >= limit)
        {
            return Err(PipelineError::QuotaExceeded("quotaExceeded".to_string()));
        }

        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        let video = RemoteVideo {
            id: format!("vid{}", n),
            title: metadata.title.clone(),
            description: metadata.description.clone(),
            privacy: metadata.privacy,
        };
        state.videos.push(video.clone());
        Ok(video)
    }

    async fn set_video_privacy(&self, video_id: &str, privacy: Privacy) -> PipelineResult<()> {
        let mut state = self.state.lock().unwrap();
        state.privacy_calls.push((video_id.to_string(), privacy));
        match state.videos.iter_mut().find(|v| v.id == video_id) {
            Some(video) => {
                video.privacy = privacy;
                Ok(())
            }
            None => Err(PipelineError::Api(format!("video {} not found (404)", video_id))),
        }
    }

    async fn find_playlist(
        &self,
        marker: &str,
        title: &str,
    ) -> PipelineResult<Option<RemotePlaylist>> {
        let state = self.state.lock().unwrap();
        let found = state
            .playlists
            .iter()
            .find(|p| format::has_marker(&p.playlist.description, marker))
            .or_else(|| state.playlists.iter().find(|p| p.playlist.title == title));
        Ok(found.map(|p| p.playlist.clone()))
    }

    async fn create_playlist(&self, metadata: &PlaylistMetadata) -> PipelineResult<RemotePlaylist> {
        let mut state = self.state.lock().unwrap();
        let playlist = RemotePlaylist {
            id: format!("pl{}", state.playlists.len() + 1),
            title: metadata.title.clone(),
            description: metadata.description.clone(),
            privacy: metadata.privacy,
        };
        state.playlists.push(FakePlaylist {
            playlist: playlist.clone(),
            members: Vec::new(),
        });
        Ok(playlist)
    }

    async fn playlist_items(&self, playlist_id: &str) -> PipelineResult<Vec<String>> {
        let state = self.state.lock().unwrap();
        state
            .playlists
            .iter()
            .find(|p| p.playlist.id == playlist_id)
            .map(|p| p.members.clone())
            .ok_or_else(|| PipelineError::Api(format!("playlist {} not found", playlist_id)))
    }

    async fn insert_playlist_item(
        &self,
        playlist_id: &str,
        video_id: &str,
        position: Option<u32>,
    ) -> PipelineResult<()> {
        let mut state = self.state.lock().unwrap();
        state.inserts.push((video_id.to_string(), position));
        let playlist = state
            .playlists
            .iter_mut()
            .find(|p| p.playlist.id == playlist_id)
            .ok_or_else(|| PipelineError::Api(format!("playlist {} not found", playlist_id)))?;
        match position {
            Some(p) => playlist.members.insert(p as usize, video_id.to_string()),
            None => playlist.members.push(video_id.to_string()),
        }
        Ok(())
    }

    async fn set_playlist_privacy(
        &self,
        playlist: &RemotePlaylist,
        privacy: Privacy,
    ) -> PipelineResult<()> {
        let mut state = self.state.lock().unwrap();
        state.privacy_calls.push((playlist.id.clone(), privacy));
        if let Some(p) = state
            .playlists
            .iter_mut()
            .find(|p| p.playlist.id == playlist.id)
        {
            p.playlist.privacy = privacy;
        }
        Ok(())
    }
}
