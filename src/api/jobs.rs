use std::{collections::HashMap, convert::Infallible, sync::Arc};

use axum::{
    Extension, Json,
    extract::Path,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, stream};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use super::{ApiError, ApiResult, UrlRequest};
use crate::{
    media::FfmpegEncoder,
    pipeline::{Pipeline, Progress, ProgressFn, PublishReport, RunReport},
    server::AppState,
    utils,
    youtube::YouTubeClient,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Publishing,
    Published,
}

impl JobStatus {
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Running | JobStatus::Publishing)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub identifier: String,
    pub status: JobStatus,
    pub progress: Option<Progress>,
    pub result: Option<RunReport>,
    pub publish: Option<PublishReport>,
    pub error: Option<String>,
}

impl JobSnapshot {
    /// No further updates follow until someone publishes.
    pub fn is_settled(&self) -> bool {
        !self.status.is_active()
    }
}

type JobHandle = Arc<watch::Sender<JobSnapshot>>;

/// Settled jobs kept for status queries; older ones are dropped first.
pub const MAX_SETTLED_JOBS: usize = 32;

struct JobEntry {
    handle: JobHandle,
    seq: u64,
}

#[derive(Default)]
struct Jobs {
    entries: HashMap<Uuid, JobEntry>,
    next_seq: u64,
}

impl Jobs {
    fn is_busy(&self, identifier: &str, except: Option<Uuid>) -> bool {
        self.entries.iter().any(|(id, entry)| {
            let snapshot = entry.handle.borrow();
            Some(*id) != except && snapshot.identifier == identifier && snapshot.status.is_active()
        })
    }

    fn prune(&mut self) {
        let mut settled: Vec<(u64, Uuid)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.handle.borrow().is_settled())
            .map(|(id, entry)| (entry.seq, *id))
            .collect();
        if settled.len() <= MAX_SETTLED_JOBS {
            return;
        }
        settled.sort_unstable();
        let excess = settled.len() - MAX_SETTLED_JOBS;
        for (_, id) in settled.into_iter().take(excess) {
            self.entries.remove(&id);
        }
    }
}

/// In-memory jobs of this server process. Each job owns a watch channel:
/// the sender holds the current snapshot, event streams subscribe to it.
///
/// Every move into an active status happens under the store lock, so a run
/// and a publish never work on the same collection at once.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<Mutex<Jobs>>,
}

impl JobStore {
    /// Registers a running job, refusing a second active job for the same
    /// collection.
    pub async fn create(&self, identifier: &str) -> ApiResult<(Uuid, JobHandle)> {
        let mut jobs = self.jobs.lock().await;
        if jobs.is_busy(identifier, None) {
            return Err(ApiError::conflict(format!(
                "a job for {} is already running",
                identifier
            )));
        }
        jobs.prune();

        let id = Uuid::new_v4();
        let (tx, _rx) = watch::channel(JobSnapshot {
            id,
            identifier: identifier.to_string(),
            status: JobStatus::Running,
            progress: None,
            result: None,
            publish: None,
            error: None,
        });
        let handle = Arc::new(tx);
        let seq = jobs.next_seq;
        jobs.next_seq += 1;
        jobs.entries.insert(
            id,
            JobEntry {
                handle: Arc::clone(&handle),
                seq,
            },
        );
        Ok((id, handle))
    }

    pub async fn get(&self, id: Uuid) -> ApiResult<JobHandle> {
        self.jobs
            .lock()
            .await
            .entries
            .get(&id)
            .map(|entry| Arc::clone(&entry.handle))
            .ok_or_else(|| ApiError::not_found(format!("job {}", id)))
    }

    /// Moves a finished job to `Publishing`. Only a run that left every track
    /// uploaded and in the playlist can be published, and never while another
    /// job works on the same collection. Returns the job, its identifier and
    /// the status to restore if publishing cannot start.
    pub async fn begin_publish(&self, id: Uuid) -> ApiResult<(JobHandle, String, JobStatus)> {
        let jobs = self.jobs.lock().await;
        let handle = jobs
            .entries
            .get(&id)
            .map(|entry| Arc::clone(&entry.handle))
            .ok_or_else(|| ApiError::not_found(format!("job {}", id)))?;

        let identifier = handle.borrow().identifier.clone();
        if jobs.is_busy(&identifier, Some(id)) {
            return Err(ApiError::conflict(format!(
                "a job for {} is already running",
                identifier
            )));
        }

        let mut outcome: ApiResult<JobStatus> =
            Err(ApiError::conflict(format!("job {} is not complete", id)));
        handle.send_if_modified(|snapshot| {
            if !matches!(snapshot.status, JobStatus::Completed | JobStatus::Published) {
                return false;
            }
            if !snapshot.result.as_ref().is_some_and(RunReport::is_complete) {
                outcome = Err(ApiError::conflict(format!(
                    "job {} left tracks unfinished; run it again before publishing",
                    id
                )));
                return false;
            }
            outcome = Ok(snapshot.status);
            snapshot.status = JobStatus::Publishing;
            snapshot.error = None;
            true
        });

        let previous = outcome?;
        Ok((handle, identifier, previous))
    }
}

async fn build_pipeline(
    state: &AppState,
) -> ApiResult<Pipeline<YouTubeClient, FfmpegEncoder>> {
    let host = YouTubeClient::from_cache(&state.settings)
        .await
        .map_err(|e| ApiError::Unauthorized(e.actionable()))?;
    let encoder = FfmpegEncoder::new(&state.settings);
    Ok(Pipeline::new((*state.settings).clone(), host, encoder)?)
}

pub async fn process(
    Extension(state): Extension<AppState>,
    Json(req): Json<UrlRequest>,
) -> ApiResult<Json<Value>> {
    let identifier = utils::parse_identifier(&req.url)?;
    let pipeline = build_pipeline(&state).await?;
    let (id, job) = state.jobs.create(&identifier).await?;

    let progress_job = Arc::clone(&job);
    let progress: ProgressFn = Arc::new(move |progress: Progress| {
        progress_job.send_modify(|snapshot| snapshot.progress = Some(progress));
    });
    let pipeline = pipeline.with_progress(progress);

    tokio::spawn(async move {
        let result = pipeline.run(&identifier).await;
        job.send_modify(|snapshot| match result {
            Ok(report) => {
                snapshot.status = JobStatus::Completed;
                snapshot.result = Some(report);
            }
            Err(e) => {
                snapshot.status = JobStatus::Failed;
                snapshot.error = Some(e.actionable());
            }
        });
    });

    Ok(Json(json!({ "job_id": id })))
}

pub async fn job_status(
    Path(id): Path<Uuid>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<JobSnapshot>> {
    let job = state.jobs.get(id).await?;
    let snapshot = job.borrow().clone();
    Ok(Json(snapshot))
}

/// Server-sent `job` events carrying the snapshot, the current one first,
/// until the job settles.
pub async fn job_events(
    Path(id): Path<Uuid>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let job = state.jobs.get(id).await?;
    let rx = job.subscribe();

    let events = stream::unfold((rx, true, false), |(mut rx, first, done)| async move {
        if done {
            return None;
        }
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let snapshot = rx.borrow_and_update().clone();
        let settled = snapshot.is_settled();
        let event = Event::default()
            .event("job")
            .json_data(&snapshot)
            .unwrap_or_else(|_| Event::default().event("job").data("{}"));
        Some((Ok(event), (rx, false, settled)))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

pub async fn publish(
    Path(id): Path<Uuid>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<PublishReport>> {
    let (job, identifier, previous) = state.jobs.begin_publish(id).await?;

    let pipeline = match build_pipeline(&state).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            job.send_modify(|snapshot| snapshot.status = previous);
            return Err(e);
        }
    };

    match pipeline.publish(&identifier).await {
        Ok(report) => {
            job.send_modify(|snapshot| {
                snapshot.status = JobStatus::Published;
                snapshot.publish = Some(report.clone());
                snapshot.error = None;
            });
            Ok(Json(report))
        }
        Err(e) => {
            job.send_modify(|snapshot| {
                snapshot.status = previous;
                snapshot.error = Some(e.actionable());
            });
            Err(e.into())
        }
    }
}
