mod common;

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use archivetube::{
    error::PipelineError,
    management::ManifestManager,
    pipeline::{Pipeline, Progress, ProgressFn},
    types::{Privacy, RemoteVideo, TrackStatus},
};
use common::{FakeArchive, FakeEncoder, FakeHost, test_settings};

fn audio_path(dir: &Path, n: u32) -> PathBuf {
    dir.join(format!("show_track_{}_d1t0{}.flac", n, n))
}

fn video_path(dir: &Path, n: u32) -> PathBuf {
    dir.join(format!("show_video_{}.mp4", n))
}

fn background_path(dir: &Path) -> PathBuf {
    dir.join("show_background_image.jpg")
}

#[tokio::test]
async fn test_resume_after_failed_download() {
    let archive = FakeArchive::start("show", 3).await;
    archive.state.set_failing(&["d1t03.flac"]);
    let work = tempfile::tempdir().unwrap();
    let settings = test_settings(work.path(), &archive.url);
    let dir = settings.collection_dir("show");
    let pipeline =
        Pipeline::new(settings, FakeHost::default(), FakeEncoder::default()).unwrap();

    let report = pipeline
        .run("https://archive.org/details/show")
        .await
        .unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.new_uploads, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].number, 3);
    assert_eq!(report.failures[0].stage, "download");
    assert!(report.playlist_id.is_some());
    assert_eq!(pipeline.host().playlist_order(), vec![1, 2]);

    // uploaded tracks are cleaned up, the failed one never materialized
    for n in 1..=3 {
        assert!(!audio_path(&dir, n).exists(), "audio {}", n);
        assert!(!video_path(&dir, n).exists(), "video {}", n);
    }
    assert!(!dir.join("show_track_3_d1t03.flac.part").exists());
    assert!(background_path(&dir).exists());

    archive.state.set_failing(&[]);
    let report = pipeline.run("show").await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.new_uploads, 1);
    assert_eq!(report.matched_existing, 2);
    assert_eq!(report.videos.len(), 3);
    assert_eq!(pipeline.host().upload_count(), 3);
    assert_eq!(archive.state.download_count("d1t01.flac"), 1);
    assert_eq!(archive.state.download_count("d1t02.flac"), 1);
    assert_eq!(archive.state.download_count("d1t03.flac"), 2);
    assert_eq!(pipeline.host().playlist_order(), vec![1, 2, 3]);
    assert_eq!(pipeline.host().state.lock().unwrap().playlists.len(), 1);
    assert!(!background_path(&dir).exists());
}

#[tokio::test]
async fn test_rerun_of_published_collection_changes_nothing() {
    let archive = FakeArchive::start("show", 3).await;
    let work = tempfile::tempdir().unwrap();
    let settings = test_settings(work.path(), &archive.url);
    let pipeline =
        Pipeline::new(settings, FakeHost::default(), FakeEncoder::default()).unwrap();

    let report = pipeline.run("show").await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.new_uploads, 3);

    let published = pipeline.publish("show").await.unwrap();
    assert_eq!(published.published.len(), 3);
    assert!(published.playlist_updated);

    let inserts_before = pipeline.host().state.lock().unwrap().inserts.len();
    let report = pipeline.run("show").await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.new_uploads, 0);
    assert_eq!(report.matched_existing, 3);
    assert_eq!(pipeline.host().upload_count(), 3);
    assert_eq!(
        pipeline.host().state.lock().unwrap().inserts.len(),
        inserts_before
    );
    assert_eq!(archive.state.download_count("d1t01.flac"), 1);
    assert_eq!(pipeline.host().playlist_order(), vec![1, 2, 3]);

    // re-running never touches privacy
    let state = pipeline.host().state.lock().unwrap();
    assert!(state.videos.iter().all(|v| v.privacy == Privacy::Public));
}

#[tokio::test]
async fn test_publish_only_ever_makes_things_public() {
    let archive = FakeArchive::start("show", 2).await;
    let work = tempfile::tempdir().unwrap();
    let settings = test_settings(work.path(), &archive.url);
    let pipeline =
        Pipeline::new(settings, FakeHost::default(), FakeEncoder::default()).unwrap();

    pipeline.run("show").await.unwrap();
    {
        let state = pipeline.host().state.lock().unwrap();
        assert!(state.videos.iter().all(|v| v.privacy == Privacy::Private));
        assert_eq!(state.playlists[0].playlist.privacy, Privacy::Private);
    }

    let first = pipeline.publish("show").await.unwrap();
    assert_eq!(first.published.len(), 2);
    assert!(first.already_public.is_empty());
    assert!(first.failures.is_empty());
    assert!(first.playlist_updated);
    assert_eq!(first.playlist_id.as_deref(), Some("pl1"));

    let calls = pipeline.host().state.lock().unwrap().privacy_calls.len();
    assert_eq!(calls, 3);

    let second = pipeline.publish("show").await.unwrap();
    assert!(second.published.is_empty());
    assert_eq!(second.already_public.len(), 2);
    assert!(!second.playlist_updated);

    let state = pipeline.host().state.lock().unwrap();
    assert_eq!(state.privacy_calls.len(), calls);
    assert!(state.privacy_calls.iter().all(|(_, p)| *p == Privacy::Public));
}

#[tokio::test]
async fn test_failed_upload_keeps_files_and_playlist_stays_ordered() {
    let archive = FakeArchive::start("show", 3).await;
    let work = tempfile::tempdir().unwrap();
    let settings = test_settings(work.path(), &archive.url);
    let dir = settings.collection_dir("show");
    let host = FakeHost::with_state(|s| {
        s.failing_uploads.insert(2);
    });
    let pipeline = Pipeline::new(settings, host, FakeEncoder::default()).unwrap();

    let report = pipeline.run("show").await.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].number, 2);
    assert_eq!(report.failures[0].stage, "upload");
    assert_eq!(pipeline.host().playlist_order(), vec![1, 3]);

    // local files exist exactly for the track without a remote video
    assert!(!audio_path(&dir, 1).exists());
    assert!(audio_path(&dir, 2).exists());
    assert!(video_path(&dir, 2).exists());
    assert!(!audio_path(&dir, 3).exists());

    pipeline
        .host()
        .state
        .lock()
        .unwrap()
        .failing_uploads
        .clear();
    let report = pipeline.run("show").await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.new_uploads, 1);
    assert_eq!(report.reused_audio, 1);
    assert_eq!(report.reused_video, 1);
    assert_eq!(pipeline.encoder().encode_count(), 3);
    assert_eq!(archive.state.download_count("d1t02.flac"), 1);
    assert_eq!(pipeline.host().playlist_order(), vec![1, 2, 3]);

    let state = pipeline.host().state.lock().unwrap();
    assert_eq!(state.inserts.last(), Some(&("vid3".to_string(), Some(1))));
    drop(state);
    assert!(!audio_path(&dir, 2).exists());
    assert!(!video_path(&dir, 2).exists());
}

#[tokio::test]
async fn test_manifest_covers_listing_lag() {
    let archive = FakeArchive::start("show", 2).await;
    let work = tempfile::tempdir().unwrap();
    let settings = test_settings(work.path(), &archive.url);
    let dir = settings.collection_dir("show");
    let pipeline =
        Pipeline::new(settings, FakeHost::default(), FakeEncoder::default()).unwrap();

    pipeline.run("show").await.unwrap();

    let manifest = ManifestManager::load(&dir, "show").await;
    assert_eq!(manifest.manifest().playlist_id.as_deref(), Some("pl1"));
    let record = manifest.track(1).unwrap();
    assert_eq!(record.video_id.as_deref(), Some("vid1"));
    assert_eq!(record.status, TrackStatus::PlaylistAttached);
    assert_eq!(record.file_name, "d1t01.flac");

    {
        let mut state = pipeline.host().state.lock().unwrap();
        let ids: Vec<String> = state.videos.iter().map(|v| v.id.clone()).collect();
        state.unlisted.extend(ids);
    }

    let report = pipeline.run("show").await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.new_uploads, 0);
    assert_eq!(report.matched_existing, 2);
    assert_eq!(pipeline.host().upload_count(), 2);
}

#[tokio::test]
async fn test_deleted_video_is_uploaded_again() {
    let archive = FakeArchive::start("show", 3).await;
    let work = tempfile::tempdir().unwrap();
    let settings = test_settings(work.path(), &archive.url);
    let dir = settings.collection_dir("show");
    let pipeline =
        Pipeline::new(settings, FakeHost::default(), FakeEncoder::default()).unwrap();

    pipeline.run("show").await.unwrap();
    {
        let mut state = pipeline.host().state.lock().unwrap();
        state.videos.retain(|v| v.id != "vid2");
        state.playlists[0].members.retain(|id| id != "vid2");
    }

    let report = pipeline.run("show").await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.new_uploads, 1);
    assert_eq!(archive.state.download_count("d1t02.flac"), 2);
    assert_eq!(pipeline.host().playlist_order(), vec![1, 2, 3]);

    let manifest = ManifestManager::load(&dir, "show").await;
    assert_eq!(manifest.track(2).unwrap().video_id.as_deref(), Some("vid4"));
}

#[tokio::test]
async fn test_rerun_without_work_dir_uploads_nothing() {
    let archive = FakeArchive::start("show", 3).await;
    let work = tempfile::tempdir().unwrap();
    let settings = test_settings(work.path(), &archive.url);
    let dir = settings.collection_dir("show");
    let pipeline =
        Pipeline::new(settings, FakeHost::default(), FakeEncoder::default()).unwrap();

    pipeline.run("show").await.unwrap();
    std::fs::remove_dir_all(&dir).unwrap();

    let report = pipeline.run("show").await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.new_uploads, 0);
    assert_eq!(report.matched_existing, 3);
    assert_eq!(pipeline.host().upload_count(), 3);
    assert_eq!(archive.state.download_count("d1t01.flac"), 1);
    assert_eq!(pipeline.host().state.lock().unwrap().playlists.len(), 1);
    assert_eq!(pipeline.host().playlist_order(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_existing_video_matched_by_title() {
    let archive = FakeArchive::start("show", 3).await;
    let work = tempfile::tempdir().unwrap();
    let settings = test_settings(work.path(), &archive.url);
    let host = FakeHost::with_state(|s| {
        s.videos.push(RemoteVideo {
            id: "old2".to_string(),
            title: "The Band - Song 2 (1977-05-08)".to_string(),
            description: "notes\n\nSource: https://archive.org/details/show".to_string(),
            privacy: Privacy::Private,
        });
    });
    let pipeline = Pipeline::new(settings, host, FakeEncoder::default()).unwrap();

    let report = pipeline.run("show").await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.new_uploads, 2);
    assert_eq!(report.matched_existing, 1);
    assert!(
        report
            .videos
            .iter()
            .any(|v| v.number == 2 && v.video_id == "old2")
    );
    assert_eq!(archive.state.download_count("d1t02.flac"), 0);

    let state = pipeline.host().state.lock().unwrap();
    assert_eq!(state.playlists[0].members, vec!["vid1", "old2", "vid2"]);
}

#[tokio::test]
async fn test_failed_manifest_save_still_cleans_up_uploaded_track() {
    let archive = FakeArchive::start("show", 3).await;
    let work = tempfile::tempdir().unwrap();
    let settings = test_settings(work.path(), &archive.url);
    let dir = settings.collection_dir("show");
    let manifest = dir.join("manifest.json");
    std::fs::create_dir_all(&manifest).unwrap();
    let pipeline =
        Pipeline::new(settings, FakeHost::default(), FakeEncoder::default()).unwrap();

    let err = pipeline.run("show").await.unwrap_err();
    assert!(matches!(err, PipelineError::Io { .. }));
    assert_eq!(pipeline.host().upload_count(), 1);
    assert!(!audio_path(&dir, 1).exists());
    assert!(!video_path(&dir, 1).exists());

    std::fs::remove_dir_all(&manifest).unwrap();
    let report = pipeline.run("show").await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.matched_existing, 1);
    assert_eq!(report.new_uploads, 2);
    assert_eq!(pipeline.host().upload_count(), 3);
}

#[tokio::test]
async fn test_quota_exhaustion_stops_the_run() {
    let archive = FakeArchive::start("show", 3).await;
    let work = tempfile::tempdir().unwrap();
    let settings = test_settings(work.path(), &archive.url);
    let dir = settings.collection_dir("show");
    let host = FakeHost::with_state(|s| s.quota_after = Some(1));
    let pipeline = Pipeline::new(settings, host, FakeEncoder::default()).unwrap();

    let err = pipeline.run("show").await.unwrap_err();
    assert!(matches!(err, PipelineError::QuotaExceeded(_)));
    assert!(err.actionable().contains("quota"));

    assert_eq!(pipeline.host().upload_count(), 1);
    assert_eq!(archive.state.download_count("d1t03.flac"), 0);
    assert!(!audio_path(&dir, 1).exists());
    assert!(audio_path(&dir, 2).exists());
    assert!(video_path(&dir, 2).exists());

    let manifest = ManifestManager::load(&dir, "show").await;
    assert_eq!(manifest.track(1).unwrap().video_id.as_deref(), Some("vid1"));
    assert_eq!(manifest.track(2).unwrap().status, TrackStatus::Encoded);
}

#[tokio::test]
async fn test_invalid_background_fails_every_track_at_encode() {
    let archive = FakeArchive::start("show", 2).await;
    let work = tempfile::tempdir().unwrap();
    let image = work.path().join("cover.jpg");
    tokio::fs::write(&image, b"<html>not an image</html>")
        .await
        .unwrap();

    let mut settings = test_settings(work.path(), &archive.url);
    settings.background_image = Some(image);
    let dir = settings.collection_dir("show");
    let pipeline =
        Pipeline::new(settings, FakeHost::default(), FakeEncoder::default()).unwrap();

    let report = pipeline.run("show").await.unwrap();
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().all(|f| f.stage == "encode"));
    assert_eq!(pipeline.host().upload_count(), 0);
    assert!(report.playlist_id.is_none());
    assert!(audio_path(&dir, 1).exists());
    assert!(!background_path(&dir).exists());
}

#[tokio::test]
async fn test_configured_background_is_copied() {
    let archive = FakeArchive::start("show", 1).await;
    let work = tempfile::tempdir().unwrap();
    let image = work.path().join("cover.png");
    tokio::fs::write(&image, [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0])
        .await
        .unwrap();

    let mut settings = test_settings(work.path(), &archive.url);
    settings.background_image = Some(image.clone());
    let pipeline =
        Pipeline::new(settings, FakeHost::default(), FakeEncoder::default()).unwrap();

    let report = pipeline.run("show").await.unwrap();
    assert!(report.is_complete());
    assert!(image.exists());
}

#[tokio::test]
async fn test_progress_is_reported() {
    let archive = FakeArchive::start("show", 2).await;
    let work = tempfile::tempdir().unwrap();
    let settings = test_settings(work.path(), &archive.url);

    let seen: Arc<Mutex<Vec<Progress>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let progress: ProgressFn = Arc::new(move |p: Progress| sink.lock().unwrap().push(p));
    let pipeline = Pipeline::new(settings, FakeHost::default(), FakeEncoder::default())
        .unwrap()
        .with_progress(progress);

    pipeline.run("show").await.unwrap();

    let seen = seen.lock().unwrap();
    assert!(seen.iter().any(|p| p.message == "Uploading track 2" && p.current == 2));
    let last = seen.last().unwrap();
    assert_eq!(last.message, "Done");
    assert_eq!((last.current, last.total), (2, 2));
}

#[tokio::test]
async fn test_preview_downloads_nothing() {
    let archive = FakeArchive::start("show", 3).await;
    let work = tempfile::tempdir().unwrap();
    let settings = test_settings(work.path(), &archive.url);
    let pipeline =
        Pipeline::new(settings, FakeHost::default(), FakeEncoder::default()).unwrap();

    let preview = pipeline.preview("show").await.unwrap();
    assert_eq!(preview.tracks.len(), 3);
    assert_eq!(preview.tracks[0].name, "Song 1");
    assert_eq!(preview.total_duration_seconds, 546.0);
    assert_eq!(preview.playlist.track_count, 3);
    assert!(archive.state.downloads.lock().unwrap().is_empty());
    assert!(!work.path().join("show").exists());
}

#[tokio::test]
async fn test_unknown_item_is_not_found() {
    let archive = FakeArchive::start("show", 1).await;
    let work = tempfile::tempdir().unwrap();
    let settings = test_settings(work.path(), &archive.url);
    let pipeline =
        Pipeline::new(settings, FakeHost::default(), FakeEncoder::default()).unwrap();

    let err = pipeline.run("missing-item").await.unwrap_err();
    assert!(matches!(err, PipelineError::NotFound(id) if id == "missing-item"));
    assert_eq!(pipeline.host().upload_count(), 0);
}
