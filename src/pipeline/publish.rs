use super::context::{PublishFailure, PublishReport, RunContext};
use crate::{
    error::PipelineResult,
    format,
    types::{Privacy, TrackStatus},
    youtube::VideoHost,
};

/// Makes every video of the collection and its playlist public.
///
/// Only ever sets `public`; anything already public is left alone, so
/// publishing twice is a no-op. A failing video does not stop the others.
pub async fn publish<H: VideoHost>(host: &H, ctx: &mut RunContext) -> PipelineResult<PublishReport> {
    let mut report = PublishReport::default();

    let videos: Vec<(u32, String, Privacy)> = ctx
        .tracks
        .iter()
        .filter_map(|(n, s)| s.video.as_ref().map(|v| (*n, v.id.clone(), v.privacy)))
        .collect();

    for (number, video_id, privacy) in videos {
        if privacy == Privacy::Public {
            report.already_public.push(video_id);
            ctx.advance(number, TrackStatus::Published);
            continue;
        }

        match host.set_video_privacy(&video_id, Privacy::Public).await {
            Ok(()) => {
                if let Some(video) = ctx.tracks.get_mut(&number).and_then(|s| s.video.as_mut()) {
                    video.privacy = Privacy::Public;
                }
                ctx.advance(number, TrackStatus::Published);
                report.published.push(video_id);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(track = number, video_id = %video_id, error = %e, "publish failed");
                report.failures.push(PublishFailure {
                    video_id,
                    message: e.to_string(),
                });
            }
        }
    }

    let playlist = match ctx.playlist.take() {
        Some(playlist) => Some(playlist),
        None => {
            let title = format::playlist_title(&ctx.collection);
            host.find_playlist(ctx.marker(), &title).await?
        }
    };

    if let Some(mut playlist) = playlist {
        if playlist.privacy != Privacy::Public {
            host.set_playlist_privacy(&playlist, Privacy::Public).await?;
            playlist.privacy = Privacy::Public;
            report.playlist_updated = true;
        }
        report.playlist_id = Some(playlist.id.clone());
        ctx.playlist = Some(playlist);
    }

    Ok(report)
}
