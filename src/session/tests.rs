use super::*;
use crate::config::RepCountConfig;
use crate::counter::Stage;
use crate::display::{ChannelDisplaySink, DisplayUpdate, OverlayRenderer};
use crate::error::{ExportError, RepCountError, SourceError, UploadError};
use crate::events::{EndReason, EventBus, EventFilter, RepCountEvent};
use crate::frame::FrameData;
use crate::pose::{FrameSkip, JointPoint, LandmarkId, PoseLandmarks};
use crate::source::{ChannelFrameSource, FrameSource, RecordedFrame, Recording};
use crate::upload::{LocalArchiveUploader, Uploader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Left leg with the knee bent to `angle` degrees
fn leg_at(angle: f64) -> PoseLandmarks {
    let knee = (0.5, 0.5);
    let theta = angle.to_radians();
    PoseLandmarks::new()
        .with(LandmarkId::LeftHip, JointPoint::new(knee.0, knee.1 - 0.2))
        .with(LandmarkId::LeftKnee, JointPoint::new(knee.0, knee.1))
        .with(
            LandmarkId::LeftAnkle,
            JointPoint::new(knee.0 + 0.2 * theta.sin(), knee.1 - 0.2 * theta.cos()),
        )
}

fn recording(angles: &[Option<f64>]) -> Recording {
    let frames = angles
        .iter()
        .enumerate()
        .map(|(i, angle)| RecordedFrame {
            timestamp_ms: 1_000 + i as u64 * 33,
            landmarks: angle.map(leg_at),
        })
        .collect();
    Recording::from_frames(frames, "test")
}

fn test_config(dir: &Path) -> RepCountConfig {
    let mut config = RepCountConfig::default();
    config.overlay.enabled = false;
    config.export.directory = dir.join("exports").to_string_lossy().to_string();
    config.upload.archive_dir = dir.join("archive").to_string_lossy().to_string();
    config
}

struct Harness {
    dir: TempDir,
    controller: SessionController,
    display: mpsc::UnboundedReceiver<DisplayUpdate>,
}

fn harness(recording: &Recording, uploader: Option<Arc<dyn Uploader>>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let (sink, display) = ChannelDisplaySink::new();
    let uploader: Arc<dyn Uploader> = match uploader {
        Some(uploader) => uploader,
        None => Arc::new(LocalArchiveUploader::new(&config.upload.archive_dir)),
    };

    let controller = SessionController::with_overlay(
        config,
        Arc::new(recording.estimator()),
        Arc::new(sink),
        uploader,
        Arc::new(OverlayRenderer::disabled()),
        EventBus::new(64),
    )
    .unwrap();

    Harness {
        dir,
        controller,
        display,
    }
}

fn drain(display: &mut mpsc::UnboundedReceiver<DisplayUpdate>) -> Vec<DisplayUpdate> {
    let mut updates = Vec::new();
    while let Ok(update) = display.try_recv() {
        updates.push(update);
    }
    updates
}

/// Uploader that fails until told otherwise
struct FlakyUploader {
    failing: AtomicBool,
    inner: LocalArchiveUploader,
}

#[async_trait::async_trait]
impl Uploader for FlakyUploader {
    async fn upload(&self, path: &Path, name: &str) -> Result<String, UploadError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(UploadError::UpstreamUploadFailure {
                path: path.to_path_buf(),
                details: "service unavailable".to_string(),
            });
        }
        self.inner.upload(path, name).await
    }

    fn uploader_name(&self) -> &str {
        "flaky"
    }
}

struct BrokenSource;

#[async_trait::async_trait]
impl FrameSource for BrokenSource {
    async fn next_frame(&mut self) -> Result<Option<FrameData>, SourceError> {
        Err(SourceError::Read {
            details: "device unplugged".to_string(),
        })
    }

    fn source_name(&self) -> &str {
        "broken"
    }
}

#[tokio::test]
async fn test_start_reports_unknown_and_zero() {
    let rec = recording(&[Some(170.0)]);
    let mut h = harness(&rec, None);
    let (_sender, source) = ChannelFrameSource::new(4, "live");

    h.controller.start(Box::new(source)).await.unwrap();

    let status = h.controller.status();
    assert!(status.active);
    assert_eq!(status.state.stage, Stage::Unknown);
    assert_eq!(status.state.count, 0);
    assert!(h.controller.is_active());

    h.controller.stop().await.unwrap();
}

#[tokio::test]
async fn test_replay_counts_repetitions() {
    let rec = recording(&[
        Some(170.0),
        Some(100.0),
        Some(140.0),
        Some(170.0),
        Some(100.0),
        Some(100.0),
    ]);
    let mut h = harness(&rec, None);

    h.controller.start(Box::new(rec.frames((640, 480), 0))).await.unwrap();
    let summary = h.controller.wait().await.unwrap().unwrap();

    assert_eq!(summary.end_reason, EndReason::SourceExhausted);
    assert_eq!(summary.reps, 2);
    assert_eq!(summary.final_stage, Stage::Down);
    assert_eq!(summary.frames_processed, 6);
    assert_eq!(summary.samples_recorded, 6);
    assert!(!h.controller.is_active());

    let records = h.controller.records().await.unwrap();
    let counts: Vec<u32> = records.iter().map(|r| r.count).collect();
    assert_eq!(counts, vec![0, 1, 1, 1, 2, 2]);
}

#[tokio::test]
async fn test_detection_miss_is_displayed_with_previous_state() {
    let rec = recording(&[Some(170.0), None, Some(100.0)]);
    let mut h = harness(&rec, None);

    h.controller.start(Box::new(rec.frames((640, 480), 0))).await.unwrap();
    let summary = h.controller.wait().await.unwrap().unwrap();
    assert_eq!(summary.frames_skipped, 1);
    assert_eq!(summary.samples_recorded, 2);

    let updates = drain(&mut h.display);
    assert_eq!(updates.len(), 3);

    let missed = &updates[1].status;
    assert!(!missed.detected);
    assert_eq!(missed.angle, None);
    assert_eq!(missed.stage, Stage::Up);
    assert_eq!(missed.count, 0);

    assert_eq!(updates[2].status.count, 1);
    assert_eq!(updates[2].status.stage, Stage::Down);
}

#[tokio::test]
async fn test_record_matches_state_after_update() {
    let rec = recording(&[Some(170.0), Some(100.0)]);
    let mut h = harness(&rec, None);

    h.controller.start(Box::new(rec.frames((640, 480), 0))).await.unwrap();
    h.controller.wait().await.unwrap();

    let records = h.controller.records().await.unwrap();
    assert_eq!(records[0].stage, Stage::Up);
    assert_eq!(records[1].stage, Stage::Down);
    assert_eq!(records[1].count, 1);
    assert!((records[1].sample.angle_degrees - 100.0).abs() < 1e-6);
    assert!(records[0].timestamp() < records[1].timestamp());
}

#[tokio::test]
async fn test_restart_resets_session() {
    let rec = recording(&[Some(170.0), Some(100.0)]);
    let mut h = harness(&rec, None);

    let first = h
        .controller
        .start(Box::new(rec.frames((640, 480), 0)))
        .await
        .unwrap();
    h.controller.wait().await.unwrap();
    assert_eq!(h.controller.rep_state().count, 1);

    let (sender, source) = ChannelFrameSource::new(4, "live");
    let second = h.controller.start(Box::new(source)).await.unwrap();
    assert_ne!(first, second);
    assert_eq!(h.controller.rep_state().count, 0);
    assert_eq!(h.controller.rep_state().stage, Stage::Unknown);

    drop(sender);
    h.controller.wait().await.unwrap();
    assert!(h.controller.records().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stop_interrupts_idle_source() {
    let rec = recording(&[Some(170.0)]);
    let mut h = harness(&rec, None);
    let (sender, source) = ChannelFrameSource::new(4, "live");

    h.controller.start(Box::new(source)).await.unwrap();
    sender
        .send(FrameData::empty(0, SystemTime::now(), 640, 480))
        .await
        .unwrap();

    let mut status = h.controller.watch_status();
    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| s.frames_processed == 1),
    )
    .await
    .unwrap()
    .unwrap();

    let summary = tokio::time::timeout(Duration::from_secs(5), h.controller.stop())
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(summary.end_reason, EndReason::Stopped);
    assert_eq!(summary.frames_processed, 1);
    assert_eq!(summary.final_stage, Stage::Up);
    assert!(!h.controller.status().active);
    assert!(h.controller.stop().await.unwrap().is_none());
}

#[tokio::test]
async fn test_estimator_fault_skips_frame() {
    let rec = recording(&[Some(170.0)]);
    let mut h = harness(&rec, None);
    let (sender, source) = ChannelFrameSource::new(4, "live");

    h.controller.start(Box::new(source)).await.unwrap();
    // No recorded frame with this id
    sender
        .send(FrameData::empty(42, SystemTime::now(), 640, 480))
        .await
        .unwrap();
    drop(sender);

    let summary = h.controller.wait().await.unwrap().unwrap();
    assert_eq!(summary.end_reason, EndReason::SourceExhausted);
    assert_eq!(summary.frames_processed, 1);
    assert_eq!(summary.frames_skipped, 1);
    assert_eq!(summary.samples_recorded, 0);
    assert_eq!(drain(&mut h.display).len(), 1);
}

#[tokio::test]
async fn test_source_failure_ends_session() {
    let rec = recording(&[]);
    let mut h = harness(&rec, None);

    h.controller.start(Box::new(BrokenSource)).await.unwrap();
    let summary = h.controller.wait().await.unwrap().unwrap();
    assert_eq!(summary.end_reason, EndReason::SourceFailed);
    assert_eq!(h.controller.last_summary(), Some(&summary));
}

#[tokio::test]
async fn test_export_empty_session_is_rejected() {
    let rec = recording(&[None, None]);
    let mut h = harness(&rec, None);

    h.controller.start(Box::new(rec.frames((640, 480), 0))).await.unwrap();
    h.controller.wait().await.unwrap();

    let result = h.controller.export().await;
    assert!(matches!(
        result,
        Err(RepCountError::Export(ExportError::EmptyExportRequest))
    ));
    assert!(!h.controller.config().export_path().exists());
}

#[tokio::test]
async fn test_export_while_active_is_rejected() {
    let rec = recording(&[Some(170.0)]);
    let mut h = harness(&rec, None);
    let (_sender, source) = ChannelFrameSource::new(4, "live");

    h.controller.start(Box::new(source)).await.unwrap();
    let result = h.controller.export_local().await;
    assert!(matches!(
        result,
        Err(RepCountError::Export(ExportError::SessionActive))
    ));
    assert!(!h.controller.config().export_path().exists());

    h.controller.stop().await.unwrap();
}

#[tokio::test]
async fn test_export_settles_finished_loop_and_uploads() {
    let rec = recording(&[Some(170.0), Some(100.0), Some(170.0)]);
    let mut h = harness(&rec, None);

    h.controller.start(Box::new(rec.frames((640, 480), 0))).await.unwrap();
    let mut status = h.controller.watch_status();
    status.wait_for(|s| !s.active).await.unwrap();

    let receipt = h.controller.export().await.unwrap();
    assert_eq!(receipt.artifact.rows, 3);
    assert_eq!(receipt.artifact.name, "squat_position_data.csv");
    assert_eq!(
        receipt.viewer_url,
        format!("https://drive.google.com/file/d/{}/view", receipt.artifact_id)
    );

    let local = std::fs::read_to_string(&receipt.artifact.path).unwrap();
    assert_eq!(local.lines().count(), 4);

    let archived = h
        .dir
        .path()
        .join("archive")
        .join(&receipt.artifact_id)
        .join("squat_position_data.csv");
    assert_eq!(std::fs::read_to_string(archived).unwrap(), local);
}

#[tokio::test]
async fn test_upload_failure_keeps_local_artifact() {
    let rec = recording(&[Some(170.0), Some(100.0)]);
    let dir = tempfile::tempdir().unwrap();
    let flaky = Arc::new(FlakyUploader {
        failing: AtomicBool::new(true),
        inner: LocalArchiveUploader::new(dir.path()),
    });
    let mut h = harness(&rec, Some(flaky.clone() as Arc<dyn Uploader>));
    let mut events = h
        .controller
        .event_bus()
        .subscribe_filtered(EventFilter::EventTypes(vec!["upload_failed"]), "test");

    h.controller.start(Box::new(rec.frames((640, 480), 0))).await.unwrap();
    h.controller.wait().await.unwrap();

    let result = h.controller.export().await;
    assert!(matches!(
        result,
        Err(RepCountError::Upload(UploadError::UpstreamUploadFailure { .. }))
    ));
    assert!(h.controller.config().export_path().exists());
    assert!(matches!(
        events.try_recv().unwrap(),
        Some(RepCountEvent::UploadFailed { .. })
    ));

    let artifact = h.controller.export_local().await.unwrap();
    flaky.failing.store(false, Ordering::SeqCst);
    let receipt = h.controller.retry_upload(&artifact).await.unwrap();
    assert_eq!(receipt.artifact, artifact);
    assert!(dir.path().join(&receipt.artifact_id).exists());
}

#[tokio::test]
async fn test_reset_clears_measurements() {
    let rec = recording(&[Some(170.0), Some(100.0)]);
    let mut h = harness(&rec, None);

    h.controller.start(Box::new(rec.frames((640, 480), 0))).await.unwrap();
    h.controller.wait().await.unwrap();
    h.controller.reset().await.unwrap();

    assert_eq!(h.controller.rep_state().count, 0);
    assert!(h.controller.records().await.unwrap().is_empty());
    assert!(h.controller.last_summary().is_none());
}

#[tokio::test]
async fn test_session_events_are_published() {
    let rec = recording(&[Some(170.0), Some(100.0), None]);
    let mut h = harness(&rec, None);
    let mut events = h.controller.event_bus().subscribe();

    h.controller.start(Box::new(rec.frames((640, 480), 0))).await.unwrap();
    h.controller.wait().await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event.event_type());
    }
    assert_eq!(
        seen,
        vec![
            "session_started",
            "stage_changed",
            "stage_changed",
            "rep_completed",
            "frame_skipped",
            "session_ended",
        ]
    );
}

#[tokio::test]
async fn test_process_frame_outcomes() {
    let rec = recording(&[Some(170.0), None]);
    let (status_tx, _status_rx) =
        tokio::sync::watch::channel(Session::new(Default::default()).status(false));
    let (sink, _display) = ChannelDisplaySink::new();
    let (_sender, source) = ChannelFrameSource::new(1, "unused");

    let mut processing = FrameProcessingLoop::new(
        Session::new(Default::default()),
        Box::new(source),
        Arc::new(rec.estimator()),
        Arc::new(sink),
        Arc::new(OverlayRenderer::disabled()),
        EventBus::new(8),
        RepCountConfig::default().counter,
        LoopControl::new(),
        status_tx,
    );

    let counted = processing
        .process_frame(FrameData::empty(0, SystemTime::now(), 640, 480))
        .await;
    match counted {
        FrameOutcome::Counted { transition, .. } => {
            assert_eq!(transition.state.stage, Stage::Up);
            assert!(transition.stage_changed());
        }
        other => panic!("Unexpected outcome: {:?}", other),
    }

    let skipped = processing
        .process_frame(FrameData::empty(1, SystemTime::now(), 640, 480))
        .await;
    assert_eq!(skipped, FrameOutcome::Skipped(FrameSkip::DetectionMiss));
    assert_eq!(processing.session().records().len(), 1);
}

async fn feed_until_rep(sender: &mpsc::Sender<FrameData>, controller: &SessionController) {
    for id in 0..2 {
        sender
            .send(FrameData::empty(id, SystemTime::now(), 640, 480))
            .await
            .unwrap();
    }

    let mut status = controller.watch_status();
    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| s.state.count >= 1),
    )
    .await
    .unwrap()
    .unwrap();
}

#[tokio::test]
async fn test_start_while_active_resets_counted_session() {
    let rec = recording(&[Some(170.0), Some(100.0)]);
    let mut h = harness(&rec, None);

    let (sender, source) = ChannelFrameSource::new(4, "live");
    let first = h.controller.start(Box::new(source)).await.unwrap();
    feed_until_rep(&sender, &h.controller).await;
    assert!(h.controller.is_active());

    let (_next_sender, next_source) = ChannelFrameSource::new(4, "live");
    let second = h.controller.start(Box::new(next_source)).await.unwrap();
    assert_ne!(first, second);
    assert_eq!(h.controller.rep_state().stage, Stage::Unknown);
    assert_eq!(h.controller.rep_state().count, 0);

    let summary = h.controller.stop().await.unwrap().unwrap();
    assert_eq!(summary.session_id, second);
    assert_eq!(summary.reps, 0);
    assert!(h.controller.records().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stop_then_start_resets_counted_session() {
    let rec = recording(&[Some(170.0), Some(100.0)]);
    let mut h = harness(&rec, None);

    let (sender, source) = ChannelFrameSource::new(4, "live");
    h.controller.start(Box::new(source)).await.unwrap();
    feed_until_rep(&sender, &h.controller).await;

    let stopped = h.controller.stop().await.unwrap().unwrap();
    assert_eq!(stopped.reps, 1);
    assert_eq!(h.controller.records().await.unwrap().len(), 2);

    let (_next_sender, next_source) = ChannelFrameSource::new(4, "live");
    h.controller.start(Box::new(next_source)).await.unwrap();
    assert_eq!(h.controller.rep_state().stage, Stage::Unknown);
    assert_eq!(h.controller.rep_state().count, 0);

    h.controller.stop().await.unwrap();
    assert!(h.controller.records().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_out_of_range_timestamp_is_skipped_without_losing_session() {
    let at = |timestamp_ms: u64, angle: f64| RecordedFrame {
        timestamp_ms,
        landmarks: Some(leg_at(angle)),
    };
    let rec = Recording::from_frames(
        vec![
            at(1_000, 170.0),
            at(1_033, 100.0),
            at(10_000_000_000_000_000, 170.0),
        ],
        "far-future",
    );
    let mut h = harness(&rec, None);
    let mut skips = h
        .controller
        .event_bus()
        .subscribe_filtered(EventFilter::EventTypes(vec!["frame_skipped"]), "test");

    h.controller.start(Box::new(rec.frames((640, 480), 0))).await.unwrap();
    let summary = h.controller.wait().await.unwrap().unwrap();

    assert_eq!(summary.end_reason, EndReason::SourceExhausted);
    assert_eq!(summary.reps, 1);
    assert_eq!(summary.frames_skipped, 1);
    assert_eq!(h.controller.records().await.unwrap().len(), 2);
    assert_eq!(h.controller.rep_state().stage, Stage::Down);

    match skips.try_recv().unwrap() {
        Some(RepCountEvent::FrameSkipped { frame_id, reason, .. }) => {
            assert_eq!(frame_id, 2);
            assert_eq!(reason, FrameSkip::MalformedAngleInput);
        }
        other => panic!("Unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_inverted_threshold_band_is_rejected() {
    let rec = recording(&[]);
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.counter.up_threshold = 120.0;
    config.counter.down_threshold = 160.0;
    let (sink, _display) = ChannelDisplaySink::new();

    let result = SessionController::new(
        config,
        Arc::new(rec.estimator()),
        Arc::new(sink),
        Arc::new(LocalArchiveUploader::new(dir.path())),
    );
    assert!(matches!(result, Err(RepCountError::Config(_))));
}
