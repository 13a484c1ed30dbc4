use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tabled::Tabled;

use crate::utils;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
    pub expires_in: u64,
    pub obtained_at: u64,
}

#[derive(Debug, Clone)]
pub struct PkceToken {
    pub code_verifier: String,
    pub token: Option<Token>,
}

// ---------------------------------------------------------------------------
// Domain
// ---------------------------------------------------------------------------

/// One archive.org item, processed as one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub identifier: String,
    /// Canonical item page; embedded in every description as the dedup marker.
    pub url: String,
    pub title: String,
    pub performer: String,
    pub venue: String,
    pub date: String,
    pub recorder: String,
    pub description: String,
    pub tracks: Vec<Track>,
}

impl Collection {
    pub fn track(&self, number: u32) -> Option<&Track> {
        self.tracks.iter().find(|t| t.number == number)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// 1-based position, defines playlist order.
    pub number: u32,
    pub name: String,
    /// File name on archive.org, possibly inside a sub directory.
    pub file_name: String,
    pub audio_url: String,
    pub duration: Option<f64>,
    pub format: Option<String>,
    pub size: Option<u64>,
}

impl Track {
    pub fn audio_file_name(&self, identifier: &str) -> String {
        utils::audio_file_name(identifier, self.number, &self.file_name)
    }

    pub fn video_file_name(&self, identifier: &str) -> String {
        utils::video_file_name(identifier, self.number)
    }

    pub fn extension(&self) -> Option<String> {
        utils::file_extension(&self.file_name)
    }
}

/// Per-track progress through the stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    Pending,
    Downloaded,
    Encoded,
    Uploaded,
    PlaylistAttached,
    Published,
}

impl TrackStatus {
    /// A remote video exists for the track.
    pub fn is_remote(self) -> bool {
        self >= TrackStatus::Uploaded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Private,
    Unlisted,
    Public,
}

impl fmt::Display for Privacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Privacy::Private => "private",
            Privacy::Unlisted => "unlisted",
            Privacy::Public => "public",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Privacy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "private" => Ok(Privacy::Private),
            "unlisted" => Ok(Privacy::Unlisted),
            "public" => Ok(Privacy::Public),
            other => Err(format!("unknown privacy status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteVideo {
    pub id: String,
    pub title: String,
    pub description: String,
    pub privacy: Privacy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePlaylist {
    pub id: String,
    pub title: String,
    pub description: String,
    pub privacy: Privacy,
}

impl RemotePlaylist {
    pub fn url(&self) -> String {
        format!("https://www.youtube.com/playlist?list={}", self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: Privacy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistMetadata {
    pub title: String,
    pub description: String,
    pub privacy: Privacy,
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub metadata: PreviewCollection,
    pub playlist: PreviewPlaylist,
    pub tracks: Vec<PreviewTrack>,
    pub total_duration_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewCollection {
    pub identifier: String,
    pub title: String,
    pub performer: String,
    pub venue: String,
    pub date: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewPlaylist {
    pub title: String,
    pub description: String,
    pub track_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewTrack {
    pub number: u32,
    pub name: String,
    pub video_title: String,
    pub duration_seconds: Option<f64>,
    pub description_preview: String,
    pub audio_filename: String,
}

#[derive(Tabled)]
pub struct TrackTableRow {
    #[tabled(rename = "#")]
    pub number: u32,
    pub title: String,
    pub duration: String,
    pub file: String,
}

// ---------------------------------------------------------------------------
// archive.org wire format
// ---------------------------------------------------------------------------

/// Response of `GET /metadata/{identifier}`. Unknown identifiers come back as
/// an empty object, hence every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchiveMetadataResponse {
    #[serde(default)]
    pub metadata: Option<ArchiveItemMetadata>,
    #[serde(default)]
    pub files: Vec<ArchiveFile>,
    #[serde(default)]
    pub is_dark: Option<bool>,
}

/// Item level fields; archive.org stores any of them as a string or an array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchiveItemMetadata {
    pub identifier: Option<Value>,
    pub title: Option<Value>,
    pub creator: Option<Value>,
    pub venue: Option<Value>,
    pub coverage: Option<Value>,
    pub date: Option<Value>,
    pub description: Option<Value>,
    pub taper: Option<Value>,
    pub transferer: Option<Value>,
    pub source: Option<Value>,
    pub lineage: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchiveFile {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub format: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub original: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub track: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub length: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub size: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(utils::value_to_string))
}

// ---------------------------------------------------------------------------
// YouTube Data API wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YouTubeListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResource {
    pub id: String,
    pub content_details: ChannelContentDetails,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelContentDetails {
    pub related_playlists: RelatedPlaylists,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelatedPlaylists {
    pub uploads: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemResource {
    pub id: Option<String>,
    pub content_details: Option<PlaylistItemContentDetails>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemContentDetails {
    pub video_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<VideoSnippet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<VideoStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatus {
    pub privacy_status: Privacy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_declared_made_for_kids: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeddable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_stats_viewable: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<PlaylistSnippet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PlaylistStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistStatus {
    pub privacy_status: Privacy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemInsertRequest {
    pub snippet: PlaylistItemInsertSnippet,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemInsertSnippet {
    pub playlist_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    pub resource_id: ResourceId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub kind: String,
    pub video_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleErrorBody {
    pub error: GoogleError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleError {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<GoogleErrorItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleErrorItem {
    pub reason: Option<String>,
    pub message: Option<String>,
}
