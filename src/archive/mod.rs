//! # archive.org Integration
//!
//! Turns an archive.org item into a [`Collection`]: one metadata request per
//! run, followed by file selection and track numbering. The audio itself is
//! fetched later by [`download`].
//!
//! ## File selection
//!
//! Items usually carry the same recording several times (the uploaded
//! original plus derivatives such as VBR MP3 or Ogg Vorbis). Files are
//! grouped by recording, using the `original` field of derivatives, and one
//! file per recording is kept following [`FORMAT_PREFERENCE`]: lossless first,
//! then MP3, then everything else.
//!
//! ## Ordering
//!
//! Tracks are ordered by their `track` tag when archive.org extracted one,
//! then by file name. Sequence numbers are then reassigned from 1, so they
//! always form a gapless playlist order.

pub mod download;

use std::collections::BTreeMap;

use reqwest::{Client, StatusCode, Url};

use crate::{
    config::Settings,
    error::{PipelineError, PipelineResult},
    types::{ArchiveFile, ArchiveItemMetadata, ArchiveMetadataResponse, Collection, Track},
    utils,
};

/// Preferred formats, best first.
pub const FORMAT_PREFERENCE: &[&str] = &[
    "Flac",
    "24bit Flac",
    "WAVE",
    "Apple Lossless Audio",
    "AIFF",
    "VBR MP3",
    "320Kbps MP3",
    "256Kbps MP3",
    "192Kbps MP3",
    "160Kbps MP3",
    "128Kbps MP3",
    "64Kbps MP3",
    "Ogg Vorbis",
    "Opus",
    "AAC",
];

const AUDIO_FORMAT_HINTS: &[&str] = &[
    "MP3", "Flac", "FLAC", "Ogg Vorbis", "WAVE", "AIFF", "Opus", "Apple Lossless", "AAC", "M4A",
];

const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "opus", "m4a", "aac", "wav", "aif", "aiff",
];

pub fn is_audio_file(file: &ArchiveFile) -> bool {
    let Some(ext) = utils::file_extension(&file.name) else {
        return false;
    };
    if !AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        return false;
    }
    match &file.format {
        Some(format) => AUDIO_FORMAT_HINTS.iter().any(|hint| format.contains(hint)),
        None => true,
    }
}

fn format_rank(file: &ArchiveFile) -> usize {
    file.format
        .as_deref()
        .and_then(|f| FORMAT_PREFERENCE.iter().position(|p| *p == f))
        .unwrap_or(FORMAT_PREFERENCE.len())
}

/// Path without extension of the recording a file belongs to.
fn recording_key(file: &ArchiveFile) -> String {
    let name = match (&file.source, &file.original) {
        (Some(source), Some(original)) if source == "derivative" => original.as_str(),
        _ => file.name.as_str(),
    };
    let base = utils::base_name(name);
    match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => {
            format!("{}{}", &name[..name.len() - base.len()], stem)
        }
        _ => name.to_string(),
    }
}

/// One file per recording, in playlist order.
pub fn select_audio_files(files: &[ArchiveFile]) -> Vec<&ArchiveFile> {
    let mut best: BTreeMap<String, &ArchiveFile> = BTreeMap::new();
    for file in files.iter().filter(|f| is_audio_file(f)) {
        let key = recording_key(file);
        let replace = match best.get(&key) {
            Some(current) => {
                let (rank, current_rank) = (format_rank(file), format_rank(current));
                rank < current_rank
                    || (rank == current_rank
                        && file.source.as_deref() == Some("original")
                        && current.source.as_deref() != Some("original"))
            }
            None => true,
        };
        if replace {
            best.insert(key, file);
        }
    }

    let mut selected: Vec<&ArchiveFile> = best.into_values().collect();
    selected.sort_by(|a, b| {
        let a_track = utils::parse_track_number(a.track.as_deref());
        let b_track = utils::parse_track_number(b.track.as_deref());
        match (a_track, b_track) {
            (Some(x), Some(y)) if x != y => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            _ => a.name.cmp(&b.name),
        }
    });
    selected
}

pub fn download_url(archive_url: &str, identifier: &str, file_name: &str) -> String {
    match Url::parse(archive_url) {
        Ok(mut url) => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments
                    .pop_if_empty()
                    .push("download")
                    .push(identifier)
                    .extend(file_name.split('/'));
            }
            url.to_string()
        }
        Err(_) => format!(
            "{}/download/{}/{}",
            archive_url.trim_end_matches('/'),
            identifier,
            file_name
        ),
    }
}

pub fn image_url(archive_url: &str, identifier: &str) -> String {
    format!(
        "{}/services/img/{}",
        archive_url.trim_end_matches('/'),
        identifier
    )
}

fn field(value: &Option<serde_json::Value>) -> String {
    value
        .as_ref()
        .and_then(utils::value_to_string)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn recorder_text(metadata: &ArchiveItemMetadata) -> String {
    [
        ("Taper", &metadata.taper),
        ("Transfer", &metadata.transferer),
        ("Recording source", &metadata.source),
        ("Lineage", &metadata.lineage),
    ]
    .into_iter()
    .filter_map(|(label, value)| {
        let value = utils::collapse_whitespace(&utils::strip_html(&field(value)));
        (!value.is_empty()).then(|| format!("{}: {}", label, value))
    })
    .collect::<Vec<_>>()
    .join("\n")
}

/// Builds the [`Collection`] for `identifier` from a metadata response.
///
/// # Errors
///
/// - [`PipelineError::NotFound`] when the response has no item metadata
///   (archive.org answers unknown identifiers with `{}`) or the item is dark.
/// - [`PipelineError::NoAudioFiles`] when no audio file survives selection.
pub fn collection_from_metadata(
    identifier: &str,
    response: &ArchiveMetadataResponse,
    archive_url: &str,
) -> PipelineResult<Collection> {
    let Some(metadata) = response.metadata.as_ref() else {
        return Err(PipelineError::NotFound(identifier.to_string()));
    };
    if response.is_dark.unwrap_or(false) {
        return Err(PipelineError::NotFound(identifier.to_string()));
    }

    let files = select_audio_files(&response.files);
    if files.is_empty() {
        return Err(PipelineError::NoAudioFiles(identifier.to_string()));
    }

    let tracks = files
        .into_iter()
        .enumerate()
        .map(|(idx, file)| {
            let number = idx as u32 + 1;
            let raw_name = file
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| utils::file_stem(&file.name).to_string());
            Track {
                number,
                name: utils::sanitize_track_name(&raw_name, number),
                file_name: file.name.clone(),
                audio_url: download_url(archive_url, identifier, &file.name),
                duration: utils::parse_duration(file.length.as_deref()),
                format: file.format.clone(),
                size: file.size.as_deref().and_then(|s| s.parse().ok()),
            }
        })
        .collect();

    let venue = match field(&metadata.venue) {
        v if v.is_empty() => field(&metadata.coverage),
        v => v,
    };

    Ok(Collection {
        identifier: identifier.to_string(),
        url: format!("https://archive.org/details/{}", identifier),
        title: utils::collapse_whitespace(&utils::strip_html(&field(&metadata.title))),
        performer: utils::collapse_whitespace(&field(&metadata.creator)),
        venue: utils::collapse_whitespace(&venue),
        date: field(&metadata.date),
        recorder: recorder_text(metadata),
        description: field(&metadata.description),
        tracks,
    })
}

/// Fetches the raw metadata document for an item.
///
/// Idempotent read: transient failures are retried with the configured
/// backoff.
pub async fn fetch_metadata(
    client: &Client,
    settings: &Settings,
    identifier: &str,
) -> PipelineResult<ArchiveMetadataResponse> {
    let url = format!(
        "{}/metadata/{}",
        settings.archive_url.trim_end_matches('/'),
        identifier
    );
    let url = &url;

    settings
        .retry
        .run("archive metadata", |_| async move {
            let response = client.get(url).send().await?;
            match response.status() {
                StatusCode::NOT_FOUND => Err(PipelineError::NotFound(identifier.to_string())),
                status if !status.is_success() => Err(PipelineError::Status {
                    status: status.as_u16(),
                    url: url.clone(),
                }),
                _ => Ok(response.json::<ArchiveMetadataResponse>().await?),
            }
        })
        .await
}

/// Collection Fetcher: item URL or identifier in, fully populated
/// [`Collection`] out. Read-only.
pub async fn fetch_collection(
    client: &Client,
    settings: &Settings,
    input: &str,
) -> PipelineResult<Collection> {
    let identifier = utils::parse_identifier(input)?;
    let response = fetch_metadata(client, settings, &identifier).await?;
    let collection = collection_from_metadata(&identifier, &response, &settings.archive_url)?;
    tracing::debug!(
        identifier = %collection.identifier,
        tracks = collection.tracks.len(),
        "collection fetched"
    );
    Ok(collection)
}
