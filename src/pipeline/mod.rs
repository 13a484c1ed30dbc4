//! # Pipeline
//!
//! One run republishes one archive.org collection:
//!
//! ```text
//! fetch ─▶ match existing ─▶ per track: download ─▶ encode ─▶ upload ─▶ cleanup
//!                                                        ─▶ playlist ─▶ (publish)
//! ```
//!
//! Tracks go through the stages one at a time, in track order. A failing
//! track is recorded in the [`RunReport`] and skipped by the remaining
//! stages while its siblings continue; run-level errors (see
//! [`PipelineError::is_fatal`]) stop the run.
//!
//! ## Resume
//!
//! A valid local artifact proves its stage finished: a non-empty audio file
//! with the right extension, a video that probes correctly. Remote state is
//! rediscovered at the start of every run from the marker in video
//! descriptions and the ids in the run manifest, before anything is
//! downloaded. Re-running a finished collection therefore uploads nothing.
//!
//! Local files of a track are deleted only after its remote video exists.

mod cleanup;
mod context;
mod materialize;
mod playlist;
mod preview;
mod publish;
mod synthesize;
mod upload;

pub use context::{
    Progress, ProgressFn, PublishFailure, PublishReport, RunContext, RunReport, TrackFailure,
    TrackState, UploadedTrack,
};
pub use materialize::is_valid_audio;
pub use playlist::insert_position;
pub use preview::build_preview;
pub use synthesize::partial_path;

use reqwest::Client;

use crate::{
    archive,
    config::Settings,
    error::{PipelineError, PipelineResult},
    media::Encoder,
    types::{Collection, Preview},
    youtube::VideoHost,
};

pub struct Pipeline<H, E> {
    settings: Settings,
    http: Client,
    transfer: Client,
    host: H,
    encoder: E,
    progress: Option<ProgressFn>,
}

impl<H: VideoHost, E: Encoder> Pipeline<H, E> {
    pub fn new(settings: Settings, host: H, encoder: E) -> PipelineResult<Self> {
        let http = Client::builder().timeout(settings.http_timeout).build()?;
        let transfer = Client::builder()
            .connect_timeout(settings.http_timeout)
            .timeout(settings.upload_timeout)
            .build()?;

        Ok(Self {
            settings,
            http,
            transfer,
            host,
            encoder,
            progress: None,
        })
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    fn notify(&self, message: impl Into<String>, current: usize, total: usize) {
        if let Some(progress) = &self.progress {
            progress(Progress {
                message: message.into(),
                current,
                total,
            });
        }
    }

    pub async fn fetch(&self, input: &str) -> PipelineResult<Collection> {
        archive::fetch_collection(&self.http, &self.settings, input).await
    }

    pub async fn preview(&self, input: &str) -> PipelineResult<Preview> {
        let collection = self.fetch(input).await?;
        Ok(build_preview(&collection))
    }

    /// Runs every stage up to the playlist. Videos stay private.
    pub async fn run(&self, input: &str) -> PipelineResult<RunReport> {
        self.notify("Fetching collection", 0, 0);
        let collection = self.fetch(input).await?;
        let mut ctx = RunContext::prepare(&self.settings, collection).await?;

        let result = self.run_stages(&mut ctx).await;
        let saved = ctx.save().await;
        result?;
        saved?;
        Ok(ctx.report())
    }

    async fn run_stages(&self, ctx: &mut RunContext) -> PipelineResult<()> {
        let total = ctx.tracks.len();
        self.notify("Searching for existing videos", 0, total);
        upload::match_existing(&self.host, ctx).await?;

        let numbers: Vec<u32> = ctx.tracks.keys().copied().collect();
        let mut background: Option<Result<(), String>> = None;

        for (idx, number) in numbers.into_iter().enumerate() {
            let current = idx + 1;
            if ctx.state(number).is_some_and(TrackState::is_remote) {
                tracing::debug!(track = number, "already uploaded");
                cleanup::cleanup_track(ctx, number).await;
                continue;
            }

            self.notify(format!("Downloading track {}", number), current, total);
            if let Err(e) =
                materialize::materialize(&self.transfer, &self.settings, ctx, number).await
            {
                ctx.fail(number, "download", &e);
                continue;
            }

            self.notify(format!("Encoding track {}", number), current, total);
            if background.is_none() {
                let prepared = synthesize::prepare_background(
                    &self.transfer,
                    &self.settings,
                    &self.encoder,
                    ctx,
                )
                .await
                .map_err(|e| e.to_string());
                background = Some(prepared);
            }
            if let Some(Err(message)) = &background {
                let e = PipelineError::encoding(
                    Some(number),
                    format!("background image unusable: {}", message),
                );
                ctx.fail(number, "encode", &e);
                continue;
            }
            if let Err(e) = synthesize::synthesize(&self.encoder, ctx, number).await {
                ctx.fail(number, "encode", &e);
                continue;
            }

            self.notify(format!("Uploading track {}", number), current, total);
            match upload::upload_track(&self.host, ctx, number).await {
                Ok(()) => cleanup::cleanup_track(ctx, number).await,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => ctx.fail(number, "upload", &e),
            }
            ctx.save().await?;
        }

        self.notify("Organizing playlist", total, total);
        playlist::organize(&self.host, ctx).await?;
        cleanup::cleanup_background(ctx).await;

        self.notify("Done", total, total);
        Ok(())
    }

    /// Makes the collection's videos and playlist public. Only call this
    /// after explicit confirmation.
    pub async fn publish(&self, input: &str) -> PipelineResult<PublishReport> {
        let collection = self.fetch(input).await?;
        let mut ctx = RunContext::prepare(&self.settings, collection).await?;
        upload::match_existing(&self.host, &mut ctx).await?;

        let result = publish::publish(&self.host, &mut ctx).await;
        let saved = ctx.save().await;
        let report = result?;
        saved?;
        Ok(report)
    }
}
