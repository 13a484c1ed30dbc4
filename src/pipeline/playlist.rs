use std::collections::HashMap;

use super::context::RunContext;
use crate::{error::PipelineResult, format, types::TrackStatus, youtube::VideoHost};

/// Where to insert track `number` so members stay in track order: before the
/// first member with a higher track number, `None` to append.
pub fn insert_position(members: &[String], numbers: &HashMap<String, u32>, number: u32) -> Option<usize> {
    members
        .iter()
        .position(|id| numbers.get(id).is_some_and(|n| *n > number))
}

/// Finds or creates the collection playlist and adds every track with a
/// video that is not a member yet.
pub async fn organize<H: VideoHost>(host: &H, ctx: &mut RunContext) -> PipelineResult<()> {
    let attached: Vec<(u32, String)> = ctx
        .tracks
        .iter()
        .filter_map(|(n, s)| s.video.as_ref().map(|v| (*n, v.id.clone())))
        .collect();
    if attached.is_empty() {
        return Ok(());
    }

    let metadata = format::playlist_metadata(&ctx.collection);
    let playlist = match host.find_playlist(ctx.marker(), &metadata.title).await? {
        Some(playlist) => playlist,
        None => {
            let playlist = host.create_playlist(&metadata).await?;
            tracing::info!(playlist_id = %playlist.id, "playlist created");
            playlist
        }
    };
    ctx.manifest.set_playlist(&playlist.id);
    let playlist_id = playlist.id.clone();
    ctx.playlist = Some(playlist);

    let mut members = host.playlist_items(&playlist_id).await?;
    let numbers: HashMap<String, u32> = attached.iter().map(|(n, id)| (id.clone(), *n)).collect();

    for (number, video_id) in attached {
        if !members.contains(&video_id) {
            let position = insert_position(&members, &numbers, number);
            match host
                .insert_playlist_item(&playlist_id, &video_id, position.map(|p| p as u32))
                .await
            {
                Ok(()) => match position {
                    Some(p) => members.insert(p, video_id.clone()),
                    None => members.push(video_id.clone()),
                },
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    ctx.fail(number, "playlist", &e);
                    continue;
                }
            }
        }

        let status = ctx
            .state(number)
            .map(|s| s.status.max(TrackStatus::PlaylistAttached))
            .unwrap_or(TrackStatus::PlaylistAttached);
        ctx.advance(number, status);
    }

    Ok(())
}
