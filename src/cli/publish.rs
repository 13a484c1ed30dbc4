use crate::{
    config::Settings,
    error, info,
    media::Encoder,
    pipeline::{Pipeline, PublishReport},
    success, utils, warning,
    youtube::VideoHost,
};

use super::process::build_pipeline;

pub(super) async fn run_publish<H: VideoHost, E: Encoder>(
    pipeline: &Pipeline<H, E>,
    identifier: &str,
) -> PublishReport {
    info!("Publishing {}", identifier);
    match pipeline.publish(identifier).await {
        Ok(report) => report,
        Err(e) => error!("{}", e.actionable()),
    }
}

/// Prints the outcome and exits with 1 when anything stayed private.
pub(super) fn print_publish_report(report: &PublishReport) {
    for failure in &report.failures {
        warning!("Video {} stays private: {}", failure.video_id, failure.message);
    }
    if !report.already_public.is_empty() {
        info!("{} videos were already public", report.already_public.len());
    }
    if let Some(id) = &report.playlist_id {
        let state = if report.playlist_updated {
            "made public"
        } else {
            "already public"
        };
        info!("Playlist https://www.youtube.com/playlist?list={} {}", id, state);
    }

    if !report.failures.is_empty() {
        error!(
            "{} videos could not be published. Run `archivetube publish` again to retry.",
            report.failures.len()
        );
    }
    success!("Published {} videos", report.published.len());
}

pub async fn publish(settings: Settings, input: &str) {
    let identifier = match utils::parse_identifier(input) {
        Ok(identifier) => identifier,
        Err(e) => error!("{}", e.actionable()),
    };

    let pipeline = build_pipeline(settings, false).await;
    let report = run_publish(&pipeline, &identifier).await;
    print_publish_report(&report);
}
