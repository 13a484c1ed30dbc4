mod common;

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex},
};

use archivetube::{
    api::{JobStatus, MAX_SETTLED_JOBS},
    config::Settings,
    pipeline::{RunReport, UploadedTrack},
    server::{AppState, router},
    utils,
};
use axum::{Extension, Form, Json, Router, routing::post};
use common::{FakeArchive, spawn_router, test_settings};
use reqwest::{Client, StatusCode, Url};
use serde_json::{Value, json};

fn server_settings(dir: &Path, archive_url: &str) -> Settings {
    let mut settings = test_settings(&dir.join("work"), archive_url);
    settings.token_path = dir.join("token.json");
    settings
}

async fn start(settings: Settings) -> (String, AppState) {
    let state = AppState::new(settings);
    let base = spawn_router(router(state.clone())).await;
    (base, state)
}

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let (base, _) = start(server_settings(dir.path(), "http://127.0.0.1:9")).await;

    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "archivetube");
}

#[tokio::test]
async fn test_auth_url_requires_client_id() {
    let dir = tempfile::tempdir().unwrap();
    let (base, _) = start(server_settings(dir.path(), "http://127.0.0.1:9")).await;

    let status: Value = reqwest::get(format!("{}/api/auth/status", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status, json!({"authenticated": false, "client_configured": false}));

    let res = reqwest::get(format!("{}/api/auth/url", base)).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("GOOGLE_CLIENT_ID"));
}

#[tokio::test]
async fn test_login_round_trip() {
    let requests: Arc<Mutex<Vec<HashMap<String, String>>>> = Arc::default();
    let token_server = Router::new()
        .route(
            "/token",
            post(
                |Extension(requests): Extension<Arc<Mutex<Vec<HashMap<String, String>>>>>,
                 Form(form): Form<HashMap<String, String>>| async move {
                    requests.lock().unwrap().push(form);
                    Json(json!({
                        "access_token": "a1",
                        "refresh_token": "r1",
                        "expires_in": 3600,
                        "scope": "youtube"
                    }))
                },
            ),
        )
        .layer(Extension(Arc::clone(&requests)));
    let token_base = spawn_router(token_server).await;

    let dir = tempfile::tempdir().unwrap();
    let mut settings = server_settings(dir.path(), "http://127.0.0.1:9");
    settings.oauth.client_id = "client".to_string();
    settings.oauth.token_url = format!("{}/token", token_base);
    let token_path = settings.token_path.clone();
    let (base, _) = start(settings).await;

    let body: Value = reqwest::get(format!("{}/api/auth/url", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let consent = Url::parse(body["url"].as_str().unwrap()).unwrap();
    let params: HashMap<String, String> = consent.query_pairs().into_owned().collect();
    assert_eq!(params["client_id"], "client");

    let page = reqwest::get(format!("{}/callback?code=abc", base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Authentication successful"));

    {
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["grant_type"], "authorization_code");
        assert_eq!(requests[0]["code"], "abc");
        let verifier = &requests[0]["code_verifier"];
        assert_eq!(utils::generate_code_challenge(verifier), params["code_challenge"]);
    }

    assert!(token_path.exists());
    let status: Value = reqwest::get(format!("{}/api/auth/status", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["authenticated"], true);
}

#[tokio::test]
async fn test_callback_without_login_or_code() {
    let dir = tempfile::tempdir().unwrap();
    let (base, _) = start(server_settings(dir.path(), "http://127.0.0.1:9")).await;

    let missing_code = reqwest::get(format!("{}/callback", base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(missing_code.contains("Missing authorization code"));

    let no_verifier = reqwest::get(format!("{}/callback?code=abc", base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(no_verifier.contains("Missing PKCE code verifier"));
}

#[tokio::test]
async fn test_preview_endpoint() {
    let fake = FakeArchive::start("show", 2).await;
    let dir = tempfile::tempdir().unwrap();
    let (base, _) = start(server_settings(dir.path(), &fake.url)).await;
    let client = Client::new();

    let res = client
        .post(format!("{}/api/preview", base))
        .json(&json!({"url": "https://archive.org/details/show"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let preview: Value = res.json().await.unwrap();
    assert_eq!(preview["metadata"]["identifier"], "show");
    assert_eq!(preview["playlist"]["track_count"], 2);
    assert_eq!(preview["tracks"][0]["number"], 1);
    assert_eq!(fake.state.download_count(), 0);

    let missing = client
        .post(format!("{}/api/preview", base))
        .json(&json!({"url": "https://archive.org/details/nothing"}))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_process_rejects_bad_input_then_missing_token() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = server_settings(dir.path(), "http://127.0.0.1:9");
    settings.oauth.client_id = "client".to_string();
    let (base, _) = start(settings).await;
    let client = Client::new();

    let invalid = client
        .post(format!("{}/api/process", base))
        .json(&json!({"url": "https://example.com/details/show"}))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    let unauthorized = client
        .post(format!("{}/api/process", base))
        .json(&json!({"url": "show"}))
        .send()
        .await
        .unwrap();
    assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);
    let body: Value = unauthorized.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("archivetube auth"));
}

#[tokio::test]
async fn test_unknown_job() {
    let dir = tempfile::tempdir().unwrap();
    let (base, _) = start(server_settings(dir.path(), "http://127.0.0.1:9")).await;
    let id = uuid::Uuid::new_v4();

    let res = reqwest::get(format!("{}/api/job/{}", base, id)).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = reqwest::get(format!("{}/api/job/not-a-uuid", base)).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_job_store_refuses_second_active_job() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::new(server_settings(dir.path(), "http://127.0.0.1:9"));

    let (_, job) = state.jobs.create("show").await.unwrap();
    assert!(state.jobs.create("show").await.is_err());
    assert!(state.jobs.create("other").await.is_ok());

    job.send_modify(|snapshot| snapshot.status = JobStatus::Failed);
    assert!(state.jobs.create("show").await.is_ok());
}

#[tokio::test]
async fn test_job_status_events_and_publish_guard() {
    let dir = tempfile::tempdir().unwrap();
    let (base, state) = start(server_settings(dir.path(), "http://127.0.0.1:9")).await;
    let client = Client::new();

    let (id, job) = state.jobs.create("show").await.unwrap();

    let snapshot: Value = reqwest::get(format!("{}/api/job/{}", base, id))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["status"], "running");
    assert_eq!(snapshot["identifier"], "show");

    let res = client
        .post(format!("{}/api/job/{}/publish", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    job.send_modify(|snapshot| {
        snapshot.status = JobStatus::Failed;
        snapshot.error = Some("boom".to_string());
    });

    // a settled job yields its snapshot once and closes the stream
    let events = reqwest::get(format!("{}/api/job/{}/events", base, id))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(events.contains("event: job"));
    assert!(events.contains("\"status\":\"failed\""));
    assert!(events.contains("boom"));
}

fn run_report(uploaded: u32, track_count: usize) -> RunReport {
    RunReport {
        identifier: "show".to_string(),
        playlist_id: Some("pl1".to_string()),
        playlist_url: Some("https://www.youtube.com/playlist?list=pl1".to_string()),
        track_count,
        videos: (1..=uploaded)
            .map(|number| UploadedTrack {
                number,
                video_id: format!("vid{}", number),
            })
            .collect(),
        new_uploads: uploaded as usize,
        matched_existing: 0,
        reused_audio: 0,
        reused_video: 0,
        failures: Vec::new(),
    }
}

#[tokio::test]
async fn test_publish_requires_complete_run() {
    let dir = tempfile::tempdir().unwrap();
    let (base, state) = start(server_settings(dir.path(), "http://127.0.0.1:9")).await;
    let client = Client::new();

    let (id, job) = state.jobs.create("show").await.unwrap();
    job.send_modify(|snapshot| {
        snapshot.status = JobStatus::Completed;
        snapshot.result = Some(run_report(2, 3));
    });

    let res = client
        .post(format!("{}/api/job/{}/publish", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(job.borrow().status, JobStatus::Completed);

    // complete run, but no cached token: refused and the job is back to completed
    job.send_modify(|snapshot| snapshot.result = Some(run_report(3, 3)));
    let res = client
        .post(format!("{}/api/job/{}/publish", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let snapshot: Value = reqwest::get(format!("{}/api/job/{}", base, id))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["status"], "completed");
    assert!(state.jobs.create("show").await.is_ok());
}

#[tokio::test]
async fn test_publish_excludes_other_work_on_the_collection() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::new(server_settings(dir.path(), "http://127.0.0.1:9"));

    let (id, job) = state.jobs.create("show").await.unwrap();
    job.send_modify(|snapshot| {
        snapshot.status = JobStatus::Completed;
        snapshot.result = Some(run_report(1, 1));
    });

    let (_, _, previous) = state.jobs.begin_publish(id).await.unwrap();
    assert_eq!(previous, JobStatus::Completed);
    assert_eq!(job.borrow().status, JobStatus::Publishing);

    // second publish and a new run both wait for the first publish
    assert!(state.jobs.begin_publish(id).await.is_err());
    assert!(state.jobs.create("show").await.is_err());

    job.send_modify(|snapshot| snapshot.status = JobStatus::Published);
    let (_, running) = state.jobs.create("show").await.unwrap();
    assert!(state.jobs.begin_publish(id).await.is_err());
    assert_eq!(job.borrow().status, JobStatus::Published);

    running.send_modify(|snapshot| snapshot.status = JobStatus::Failed);
    let (_, _, previous) = state.jobs.begin_publish(id).await.unwrap();
    assert_eq!(previous, JobStatus::Published);
}

#[tokio::test]
async fn test_settled_jobs_are_evicted_oldest_first() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::new(server_settings(dir.path(), "http://127.0.0.1:9"));

    let mut ids = Vec::new();
    for _ in 0..MAX_SETTLED_JOBS + 5 {
        let (id, job) = state.jobs.create("show").await.unwrap();
        job.send_modify(|snapshot| snapshot.status = JobStatus::Failed);
        ids.push(id);
    }
    let (running, _) = state.jobs.create("show").await.unwrap();

    for id in &ids[..5] {
        assert!(state.jobs.get(*id).await.is_err());
    }
    for id in &ids[5..] {
        assert!(state.jobs.get(*id).await.is_ok());
    }
    assert!(state.jobs.get(running).await.is_ok());
}
