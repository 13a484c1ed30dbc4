use std::{
    io::{self, IsTerminal, Write},
    sync::Arc,
};

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    config::Settings,
    error, info,
    media::FfmpegEncoder,
    pipeline::{Pipeline, Progress, ProgressFn, RunReport},
    success, utils, warning,
    youtube::YouTubeClient,
};

use super::publish::{print_publish_report, run_publish};

/// Builds the production pipeline or exits with the reason it cannot run.
pub(super) async fn build_pipeline(
    settings: Settings,
    needs_encoder: bool,
) -> Pipeline<YouTubeClient, FfmpegEncoder> {
    let host = match YouTubeClient::from_cache(&settings).await {
        Ok(host) => host,
        Err(e) => error!("{}", e.actionable()),
    };

    let encoder = FfmpegEncoder::new(&settings);
    if needs_encoder {
        if let Err(e) = encoder.check_available().await {
            error!("{}", e.actionable());
        }
    }

    match Pipeline::new(settings, host, encoder) {
        Ok(pipeline) => pipeline,
        Err(e) => error!("Cannot create pipeline: {}", e),
    }
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} [{bar:30.blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb
}

fn progress_fn(pb: &ProgressBar) -> ProgressFn {
    let pb = pb.clone();
    Arc::new(move |progress: Progress| {
        pb.set_length(progress.total as u64);
        pb.set_position(progress.current as u64);
        pb.set_message(progress.message);
        pb.tick();
    })
}

/// Asks on the terminal; anything but `y`/`yes` declines. Without a terminal
/// the answer is no.
fn confirm(question: &str) -> bool {
    if !io::stdin().is_terminal() {
        return false;
    }

    print!("{} [y/N] ", question);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn print_run_report(report: &RunReport) {
    for track in &report.videos {
        info!(
            "Track {}: https://www.youtube.com/watch?v={}",
            track.number, track.video_id
        );
    }
    if let Some(url) = &report.playlist_url {
        success!("Playlist: {}", url);
    }
    info!(
        "{} uploaded, {} already on YouTube, {} audio and {} videos reused",
        report.new_uploads, report.matched_existing, report.reused_audio, report.reused_video
    );
    for failure in &report.failures {
        warning!(
            "Track {} failed at {}: {}",
            failure.number,
            failure.stage,
            failure.message
        );
    }
}

pub async fn process(settings: Settings, input: &str, publish: Option<bool>) {
    let identifier = match utils::parse_identifier(input) {
        Ok(identifier) => identifier,
        Err(e) => error!("{}", e.actionable()),
    };

    let pb = progress_bar();
    let pipeline = build_pipeline(settings, true)
        .await
        .with_progress(progress_fn(&pb));

    info!("Processing {}", identifier);
    let report = match pipeline.run(&identifier).await {
        Ok(report) => {
            pb.finish_and_clear();
            report
        }
        Err(e) => {
            pb.abandon();
            error!("{}", e.actionable());
        }
    };

    print_run_report(&report);
    if !report.is_complete() {
        error!(
            "{} of {} tracks unfinished. Videos stay private; run `archivetube process {}` again to resume.",
            report.failures.len(),
            report.track_count,
            identifier
        );
    }
    success!("All {} tracks are on YouTube (private)", report.track_count);

    let publish = match publish {
        Some(publish) => publish,
        None => confirm("Make the videos and the playlist public now?"),
    };
    if !publish {
        info!(
            "Left private. Run `archivetube publish {}` to make it public.",
            identifier
        );
        return;
    }

    let report = run_publish(&pipeline, &identifier).await;
    print_publish_report(&report);
}
