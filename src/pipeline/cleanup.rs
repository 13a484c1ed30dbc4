use std::path::Path;

use super::{context::RunContext, synthesize::partial_path};
use crate::archive::download::part_path;

async fn remove_if_present(path: &Path) {
    match async_fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot remove"),
    }
}

/// Deletes the local artifacts of a track, but only once its remote video
/// exists. Failures to delete are logged; the next run tries again.
pub async fn cleanup_track(ctx: &RunContext, number: u32) {
    let Some(state) = ctx.state(number) else {
        return;
    };
    if !state.is_remote() {
        return;
    }

    for path in [
        state.audio_path.clone(),
        part_path(&state.audio_path),
        state.video_path.clone(),
        partial_path(&state.video_path),
    ] {
        remove_if_present(&path).await;
    }
}

/// Deletes the background image once every track has a remote video.
pub async fn cleanup_background(ctx: &RunContext) {
    if ctx.all_remote() {
        remove_if_present(&ctx.background).await;
    }
}
