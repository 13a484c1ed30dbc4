use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Serialize;

use crate::{
    config::Settings,
    error::{PipelineError, PipelineResult},
    management::ManifestManager,
    types::{Collection, RemotePlaylist, RemoteVideo, Track, TrackStatus},
    utils,
};

/// Progress notification for user interfaces.
#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub message: String,
    pub current: usize,
    pub total: usize,
}

pub type ProgressFn = Arc<dyn Fn(Progress) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct TrackState {
    pub status: TrackStatus,
    pub audio_path: PathBuf,
    pub video_path: PathBuf,
    pub video: Option<RemoteVideo>,
    /// Set when a stage failed this run; later stages skip the track.
    pub failure: Option<TrackFailure>,
    pub reused_audio: bool,
    pub reused_video: bool,
    pub matched_existing: bool,
}

impl TrackState {
    pub fn is_remote(&self) -> bool {
        self.video.is_some()
    }
}

/// Everything one run of one collection carries between stages.
pub struct RunContext {
    pub collection: Collection,
    pub dir: PathBuf,
    pub tracks: BTreeMap<u32, TrackState>,
    pub manifest: ManifestManager,
    pub playlist: Option<RemotePlaylist>,
    pub background: PathBuf,
    pub new_uploads: usize,
}

impl RunContext {
    /// Creates the collection directory and loads the manifest of earlier
    /// runs.
    pub async fn prepare(settings: &Settings, collection: Collection) -> PipelineResult<Self> {
        let dir = settings.collection_dir(&collection.identifier);
        async_fs::create_dir_all(&dir)
            .await
            .map_err(|e| PipelineError::io(&dir, e))?;

        let mut manifest = ManifestManager::load(&dir, &collection.identifier).await;
        manifest.retain_matching(&collection);

        let tracks = collection
            .tracks
            .iter()
            .map(|track| (track.number, TrackState::new(&dir, &collection.identifier, track)))
            .collect();

        Ok(Self {
            background: dir.join(utils::background_file_name(&collection.identifier)),
            collection,
            dir,
            tracks,
            manifest,
            playlist: None,
            new_uploads: 0,
        })
    }

    pub fn track(&self, number: u32) -> Option<&Track> {
        self.collection.track(number)
    }

    pub fn state(&self, number: u32) -> Option<&TrackState> {
        self.tracks.get(&number)
    }

    /// Advances a track and mirrors the change into the manifest.
    pub fn advance(&mut self, number: u32, status: TrackStatus) {
        let Some(state) = self.tracks.get_mut(&number) else {
            return;
        };
        state.status = status;
        let file_name = self
            .collection
            .track(number)
            .map(|t| t.file_name.as_str())
            .unwrap_or_default();
        let video_id = state.video.as_ref().map(|v| v.id.as_str());
        self.manifest.record(number, file_name, status, video_id);
    }

    pub fn fail(&mut self, number: u32, stage: &str, error: &PipelineError) {
        tracing::warn!(track = number, stage, error = %error, "track failed");
        if let Some(state) = self.tracks.get_mut(&number) {
            state.failure = Some(TrackFailure {
                number,
                stage: stage.to_string(),
                message: error.actionable(),
            });
        }
    }

    pub fn all_remote(&self) -> bool {
        self.tracks.values().all(TrackState::is_remote)
    }

    pub fn marker(&self) -> &str {
        &self.collection.url
    }

    pub async fn save(&self) -> PipelineResult<()> {
        self.manifest.persist().await
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            identifier: self.collection.identifier.clone(),
            playlist_id: self.playlist.as_ref().map(|p| p.id.clone()),
            playlist_url: self.playlist.as_ref().map(|p| p.url()),
            track_count: self.tracks.len(),
            videos: self
                .tracks
                .iter()
                .filter_map(|(n, s)| {
                    s.video.as_ref().map(|v| UploadedTrack {
                        number: *n,
                        video_id: v.id.clone(),
                    })
                })
                .collect(),
            new_uploads: self.new_uploads,
            matched_existing: self.tracks.values().filter(|s| s.matched_existing).count(),
            reused_audio: self.tracks.values().filter(|s| s.reused_audio).count(),
            reused_video: self.tracks.values().filter(|s| s.reused_video).count(),
            failures: self
                .tracks
                .values()
                .filter_map(|s| s.failure.clone())
                .collect(),
        }
    }
}

impl TrackState {
    fn new(dir: &Path, identifier: &str, track: &Track) -> Self {
        Self {
            status: TrackStatus::Pending,
            audio_path: dir.join(track.audio_file_name(identifier)),
            video_path: dir.join(track.video_file_name(identifier)),
            video: None,
            failure: None,
            reused_audio: false,
            reused_video: false,
            matched_existing: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackFailure {
    pub number: u32,
    pub stage: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadedTrack {
    pub number: u32,
    pub video_id: String,
}

/// Outcome of [`Pipeline::run`](super::Pipeline::run).
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub identifier: String,
    pub playlist_id: Option<String>,
    pub playlist_url: Option<String>,
    pub track_count: usize,
    /// Every track with a remote video, new or found, in track order.
    pub videos: Vec<UploadedTrack>,
    pub new_uploads: usize,
    pub matched_existing: usize,
    pub reused_audio: usize,
    pub reused_video: usize,
    pub failures: Vec<TrackFailure>,
}

impl RunReport {
    /// Every track is uploaded and in the playlist.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.playlist_id.is_some() && self.videos.len() == self.track_count
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishFailure {
    pub video_id: String,
    pub message: String,
}

/// Outcome of [`Pipeline::publish`](super::Pipeline::publish).
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishReport {
    pub published: Vec<String>,
    pub already_public: Vec<String>,
    pub failures: Vec<PublishFailure>,
    pub playlist_id: Option<String>,
    pub playlist_updated: bool,
}
