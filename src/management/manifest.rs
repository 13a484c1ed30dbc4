use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{PipelineError, PipelineResult},
    types::{Collection, TrackStatus},
};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub status: TrackStatus,
    /// archive.org file the record was written for.
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_id: Option<String>,
    #[serde(default)]
    pub tracks: BTreeMap<u32, TrackRecord>,
}

/// Per-collection record of stage progress and remote ids, kept at
/// `{work_dir}/{identifier}/manifest.json`.
pub struct ManifestManager {
    path: PathBuf,
    manifest: RunManifest,
}

impl ManifestManager {
    pub fn new(dir: &Path, identifier: &str) -> Self {
        Self {
            path: dir.join(MANIFEST_FILE),
            manifest: RunManifest {
                identifier: identifier.to_string(),
                ..RunManifest::default()
            },
        }
    }

    /// Loads the manifest of a previous run, or starts an empty one when none
    /// exists or it cannot be read.
    pub async fn load(dir: &Path, identifier: &str) -> Self {
        let path = dir.join(MANIFEST_FILE);
        let json = match async_fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(_) => return Self::new(dir, identifier),
        };

        match serde_json::from_str::<RunManifest>(&json) {
            Ok(manifest) if manifest.identifier == identifier => Self { path, manifest },
            Ok(_) => {
                tracing::warn!(path = %path.display(), "manifest belongs to another collection, ignoring");
                Self::new(dir, identifier)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable manifest, ignoring");
                Self::new(dir, identifier)
            }
        }
    }

    pub async fn persist(&self) -> PipelineResult<()> {
        if let Some(parent) = self.path.parent() {
            async_fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(&self.manifest)?;
        async_fs::write(&self.path, json)
            .await
            .map_err(|e| PipelineError::io(&self.path, e))
    }

    /// Drops records whose track number now points at a different file.
    pub fn retain_matching(&mut self, collection: &Collection) {
        self.manifest.tracks.retain(|number, record| {
            collection
                .track(*number)
                .is_some_and(|t| t.file_name == record.file_name)
        });
    }

    pub fn record(&mut self, number: u32, file_name: &str, status: TrackStatus, video_id: Option<&str>) {
        let entry = self.manifest.tracks.entry(number).or_insert_with(|| TrackRecord {
            status,
            file_name: file_name.to_string(),
            video_id: None,
        });
        entry.status = status;
        entry.file_name = file_name.to_string();
        if let Some(id) = video_id {
            entry.video_id = Some(id.to_string());
        }
    }

    pub fn forget_video(&mut self, number: u32) {
        if let Some(record) = self.manifest.tracks.get_mut(&number) {
            record.video_id = None;
            record.status = TrackStatus::Pending;
        }
    }

    pub fn set_playlist(&mut self, playlist_id: &str) {
        self.manifest.playlist_id = Some(playlist_id.to_string());
    }

    pub fn track(&self, number: u32) -> Option<&TrackRecord> {
        self.manifest.tracks.get(&number)
    }

    /// Video ids from earlier runs, by track number.
    pub fn known_videos(&self) -> Vec<(u32, String)> {
        self.manifest
            .tracks
            .iter()
            .filter_map(|(n, r)| r.video_id.clone().map(|id| (*n, id)))
            .collect()
    }

    pub fn manifest(&self) -> &RunManifest {
        &self.manifest
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
