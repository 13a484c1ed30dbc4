//! # API Module
//!
//! HTTP endpoints of the `serve` command. Every handler is a thin wrapper
//! around the same pipeline the CLI drives.
//!
//! ## Endpoints
//!
//! ### Monitoring
//!
//! - [`health`] - `GET /health`, status and version.
//!
//! ### Authentication
//!
//! - [`auth_status`] - `GET /api/auth/status`, whether a token is cached.
//! - [`auth_url`] - `GET /api/auth/url`, Google consent URL; the PKCE
//!   verifier stays in server state.
//! - [`callback`] - `GET /callback`, completes the PKCE flow by exchanging
//!   the authorization code and caching the token.
//!
//! ### Pipeline
//!
//! - [`preview`] - `POST /api/preview`, dry run of a collection.
//! - [`process`] - `POST /api/process`, starts a job. `401` without a token,
//!   `409` while another job for the same collection is running.
//! - [`job_status`] - `GET /api/job/{id}`, current snapshot.
//! - [`job_events`] - `GET /api/job/{id}/events`, snapshots as server-sent
//!   events until the job settles.
//! - [`publish`] - `POST /api/job/{id}/publish`, makes a completed job's
//!   videos and playlist public.
//!
//! Failures are reported as [`ApiError`] with a JSON `{"detail": ...}` body.

mod auth;
mod callback;
mod error;
mod health;
mod jobs;
mod preview;

use serde::Deserialize;

pub use auth::{auth_status, auth_url};
pub use callback::callback;
pub use error::{ApiError, ApiResult};
pub use health::health;
pub use jobs::{
    JobSnapshot, JobStatus, JobStore, MAX_SETTLED_JOBS, job_events, job_status, process, publish,
};
pub use preview::preview;

#[derive(Debug, Clone, Deserialize)]
pub struct UrlRequest {
    pub url: String,
}
