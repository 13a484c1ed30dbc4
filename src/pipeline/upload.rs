use std::collections::{BTreeMap, HashMap, HashSet};

use super::context::RunContext;
use crate::{
    error::PipelineResult,
    format,
    types::{Privacy, RemoteVideo, TrackStatus},
    youtube::VideoHost,
};

/// Attaches videos uploaded by earlier runs to their tracks.
///
/// Runs before anything is downloaded. Candidates are the channel videos
/// carrying the collection marker plus the ids remembered in the manifest,
/// which covers uploads the channel listing has not caught up with yet.
/// A video maps to a track by manifest record, then by the track line of its
/// description, then by exact title. Manifest ids that no longer exist are
/// forgotten so the track is uploaded again.
pub async fn match_existing<H: VideoHost>(host: &H, ctx: &mut RunContext) -> PipelineResult<()> {
    let marker = ctx.marker().to_string();
    let listed = host.find_existing_videos(&marker).await?;
    let listed_ids: HashSet<&str> = listed.iter().map(|v| v.id.as_str()).collect();

    let known = ctx.manifest.known_videos();
    let unlisted: Vec<String> = known
        .iter()
        .filter(|(_, id)| !listed_ids.contains(id.as_str()))
        .map(|(_, id)| id.clone())
        .collect();
    let verified = if unlisted.is_empty() {
        Vec::new()
    } else {
        host.videos_by_id(&unlisted).await?
    };

    let verified_ids: HashSet<&str> = verified.iter().map(|v| v.id.as_str()).collect();
    for (number, id) in &known {
        if !listed_ids.contains(id.as_str()) && !verified_ids.contains(id.as_str()) {
            tracing::warn!(track = number, video_id = %id, "remembered video is gone");
            ctx.manifest.forget_video(*number);
        }
    }

    let known_by_id: HashMap<&str, u32> = known.iter().map(|(n, id)| (id.as_str(), *n)).collect();
    let titles: HashMap<String, u32> = ctx
        .collection
        .tracks
        .iter()
        .map(|t| (format::video_title(t, &ctx.collection), t.number))
        .collect();

    let mut assigned: BTreeMap<u32, RemoteVideo> = BTreeMap::new();
    for video in verified.iter().chain(listed.iter()) {
        let number = known_by_id
            .get(video.id.as_str())
            .copied()
            .or_else(|| format::match_track_number(&video.description))
            .or_else(|| titles.get(&video.title).copied())
            .filter(|n| ctx.tracks.contains_key(n));

        match number {
            Some(n) => match assigned.get(&n) {
                Some(first) if first.id != video.id => {
                    tracing::warn!(track = n, kept = %first.id, duplicate = %video.id, "duplicate video for track");
                }
                Some(_) => {}
                None => {
                    assigned.insert(n, video.clone());
                }
            },
            None => {
                tracing::debug!(video_id = %video.id, title = %video.title, "unmatched video with marker");
            }
        }
    }

    for (number, video) in assigned {
        let status = if video.privacy == Privacy::Public {
            TrackStatus::Published
        } else {
            TrackStatus::Uploaded
        };
        if let Some(state) = ctx.tracks.get_mut(&number) {
            state.video = Some(video);
            state.matched_existing = true;
        }
        ctx.advance(number, status);
    }

    Ok(())
}

/// Uploads the track's video as private. The caller persists the manifest
/// once the track's local files are cleaned up.
pub async fn upload_track<H: VideoHost>(
    host: &H,
    ctx: &mut RunContext,
    number: u32,
) -> PipelineResult<()> {
    let (Some(track), Some(state)) = (ctx.track(number), ctx.state(number)) else {
        return Ok(());
    };
    let metadata = format::video_metadata(track, &ctx.collection);
    let path = state.video_path.clone();

    let video = host
        .upload_video(&path, &metadata)
        .await
        .map_err(|e| e.for_upload(number))?;
    tracing::info!(track = number, video_id = %video.id, "uploaded");

    if let Some(state) = ctx.tracks.get_mut(&number) {
        state.video = Some(video);
    }
    ctx.new_uploads += 1;
    ctx.advance(number, TrackStatus::Uploaded);
    Ok(())
}
