use super::processing_loop::{FrameProcessingLoop, LoopControl, LoopOutcome};
use super::state::{Session, SessionStatus, SessionSummary};
use crate::config::RepCountConfig;
use crate::counter::{RepState, RepStateMachine};
use crate::display::{DisplaySink, OverlayRenderer};
use crate::error::{ExportError, RepCountError, Result};
use crate::events::{EventBus, RepCountEvent};
use crate::measurement::{write_csv, MeasurementRecord};
use crate::pose::PoseEstimator;
use crate::source::FrameSource;
use crate::upload::{viewer_url, Uploader};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A CSV export written to local storage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportArtifact {
    pub path: PathBuf,
    /// Logical name handed to the uploader
    pub name: String,
    pub rows: usize,
    pub bytes: u64,
}

/// An export that the upload collaborator accepted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportReceipt {
    pub artifact: ExportArtifact,
    pub artifact_id: String,
    pub viewer_url: String,
}

struct RunningLoop {
    control: LoopControl,
    handle: JoinHandle<LoopOutcome>,
}

/// Owns the session lifecycle: start, stop, reset and export.
///
/// While a loop runs the session lives inside the loop task; the controller takes it back
/// when the loop is joined.
pub struct SessionController {
    config: RepCountConfig,
    estimator: Arc<dyn PoseEstimator>,
    display: Arc<dyn DisplaySink>,
    uploader: Arc<dyn Uploader>,
    overlay: Arc<OverlayRenderer>,
    event_bus: EventBus,
    session: Option<Session>,
    running: Option<RunningLoop>,
    status_tx: watch::Sender<SessionStatus>,
    status_rx: watch::Receiver<SessionStatus>,
    last_summary: Option<SessionSummary>,
}

impl SessionController {
    pub fn new(
        config: RepCountConfig,
        estimator: Arc<dyn PoseEstimator>,
        display: Arc<dyn DisplaySink>,
        uploader: Arc<dyn Uploader>,
    ) -> Result<Self> {
        config.validate()?;
        let overlay = Arc::new(OverlayRenderer::new(&config.overlay));
        let event_bus = EventBus::new(config.system.event_bus_capacity);
        Self::with_overlay(config, estimator, display, uploader, overlay, event_bus)
    }

    /// Build with an explicit overlay renderer and event bus.
    ///
    /// Fails when the configuration does not validate, e.g. an inverted threshold band.
    pub fn with_overlay(
        config: RepCountConfig,
        estimator: Arc<dyn PoseEstimator>,
        display: Arc<dyn DisplaySink>,
        uploader: Arc<dyn Uploader>,
        overlay: Arc<OverlayRenderer>,
        event_bus: EventBus,
    ) -> Result<Self> {
        config.validate()?;
        let session = Session::new(Self::machine_for(&config));
        let (status_tx, status_rx) = watch::channel(session.status(false));

        Ok(Self {
            config,
            estimator,
            display,
            uploader,
            overlay,
            event_bus,
            session: Some(session),
            running: None,
            status_tx,
            status_rx,
            last_summary: None,
        })
    }

    fn machine_for(config: &RepCountConfig) -> RepStateMachine {
        RepStateMachine::with_thresholds(config.counter.up_threshold, config.counter.down_threshold)
    }

    pub fn config(&self) -> &RepCountConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Reset the session and start processing frames from `source`.
    ///
    /// A loop that is still running is stopped first. Returns the new session id.
    pub async fn start(&mut self, source: Box<dyn FrameSource>) -> Result<String> {
        if self.running.is_some() {
            info!("Session already running, stopping it before restart");
            self.stop().await?;
        }

        let mut session = self
            .session
            .take()
            .unwrap_or_else(|| Session::new(Self::machine_for(&self.config)));
        session.reset();

        let session_id = session.id().to_string();
        let control = LoopControl::new();

        // Observers see (UNKNOWN, 0) before the first frame is read.
        self.status_tx.send_replace(session.status(true));
        self.last_summary = None;

        let _ = self.event_bus.publish(RepCountEvent::SessionStarted {
            session_id: session_id.clone(),
            timestamp: SystemTime::now(),
        });

        let processing = FrameProcessingLoop::new(
            session,
            source,
            Arc::clone(&self.estimator),
            Arc::clone(&self.display),
            Arc::clone(&self.overlay),
            self.event_bus.clone(),
            self.config.counter.clone(),
            control.clone(),
            self.status_tx.clone(),
        );

        let handle = tokio::spawn(processing.run());
        self.running = Some(RunningLoop { control, handle });

        info!("Session {} started", session_id);
        Ok(session_id)
    }

    /// Clear the active flag and wait for the loop to finish its in-flight frame.
    ///
    /// Returns the summary of the run, or `None` when nothing was running.
    pub async fn stop(&mut self) -> Result<Option<SessionSummary>> {
        let Some(running) = self.running.take() else {
            debug!("Stop requested with no running session");
            return Ok(None);
        };

        running.control.request_stop();
        self.join(running.handle).await.map(Some)
    }

    /// Stop any running loop, then clear counters and measurements
    pub async fn reset(&mut self) -> Result<()> {
        self.stop().await?;
        let session = self
            .session
            .get_or_insert_with(|| Session::new(Self::machine_for(&self.config)));
        session.reset();
        self.status_tx.send_replace(session.status(false));
        self.last_summary = None;
        info!("Session reset");
        Ok(())
    }

    /// Whether a processing loop is currently running
    pub fn is_active(&self) -> bool {
        self.running
            .as_ref()
            .map(|running| running.control.is_active() && !running.handle.is_finished())
            .unwrap_or(false)
    }

    /// Latest published counters
    pub fn status(&self) -> SessionStatus {
        self.status_rx.borrow().clone()
    }

    pub fn rep_state(&self) -> RepState {
        self.status_rx.borrow().state
    }

    /// Receiver that observes every status update
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status_rx.clone()
    }

    /// Summary of the last finished run, if any
    pub fn last_summary(&self) -> Option<&SessionSummary> {
        self.last_summary.as_ref()
    }

    /// Wait for a running loop to end on its own, e.g. when replaying a finite recording
    pub async fn wait(&mut self) -> Result<Option<SessionSummary>> {
        match self.running.take() {
            Some(running) => self.join(running.handle).await.map(Some),
            None => Ok(self.last_summary.clone()),
        }
    }

    /// Copy of the recorded measurements; only available while idle
    pub async fn records(&mut self) -> Result<Vec<MeasurementRecord>> {
        self.settle().await?;
        if self.running.is_some() {
            return Err(ExportError::SessionActive.into());
        }
        Ok(self
            .session
            .as_ref()
            .map(Session::snapshot)
            .unwrap_or_default())
    }

    /// Write the recorded measurements to the configured CSV path.
    ///
    /// Rejected while the loop is running and when nothing has been recorded; in both cases
    /// no file is touched.
    pub async fn export_local(&mut self) -> Result<ExportArtifact> {
        self.settle().await?;
        if self.running.is_some() {
            warn!("Export requested while session is active");
            return Err(ExportError::SessionActive.into());
        }

        let records = self.session.as_ref().map(Session::records).unwrap_or(&[]);
        if records.is_empty() {
            return Err(ExportError::EmptyExportRequest.into());
        }

        let path = self.config.export_path();
        let bytes = write_csv(&path, records).await?;
        let rows = records.len();

        info!("Exported {} measurements to {}", rows, path.display());
        let _ = self.event_bus.publish(RepCountEvent::ExportWritten {
            path: path.clone(),
            rows,
        });

        Ok(ExportArtifact {
            path,
            name: self.config.export.file_name.clone(),
            rows,
            bytes,
        })
    }

    /// Hand a local export to the upload collaborator.
    ///
    /// The artifact stays on disk whatever the outcome, so a failed upload can be retried.
    pub async fn retry_upload(&self, artifact: &ExportArtifact) -> Result<ExportReceipt> {
        match self.uploader.upload(&artifact.path, &artifact.name).await {
            Ok(artifact_id) => {
                let url = viewer_url(&self.config.upload.viewer_url_template, &artifact_id);
                info!(
                    "Uploaded {} via {}: {}",
                    artifact.path.display(),
                    self.uploader.uploader_name(),
                    url
                );
                let _ = self.event_bus.publish(RepCountEvent::UploadCompleted {
                    artifact_id: artifact_id.clone(),
                    viewer_url: url.clone(),
                });
                Ok(ExportReceipt {
                    artifact: artifact.clone(),
                    artifact_id,
                    viewer_url: url,
                })
            }
            Err(e) => {
                error!("Upload via {} failed: {}", self.uploader.uploader_name(), e);
                let _ = self.event_bus.publish(RepCountEvent::UploadFailed {
                    path: artifact.path.clone(),
                    error: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Export locally, then upload.
    ///
    /// On upload failure the error carries the local path; `retry_upload` can be called with
    /// the artifact returned by `export_local` later.
    pub async fn export(&mut self) -> Result<ExportReceipt> {
        let artifact = self.export_local().await?;
        self.retry_upload(&artifact).await
    }

    /// Take back the session from a loop that ended on its own
    async fn settle(&mut self) -> Result<()> {
        let ending = self
            .running
            .as_ref()
            .map(|running| !running.control.is_active() || running.handle.is_finished())
            .unwrap_or(false);

        if ending {
            if let Some(running) = self.running.take() {
                self.join(running.handle).await?;
            }
        }
        Ok(())
    }

    async fn join(&mut self, handle: JoinHandle<LoopOutcome>) -> Result<SessionSummary> {
        match handle.await {
            Ok(LoopOutcome { session, summary }) => {
                info!(
                    "Session {} ended ({:?}) with {} reps",
                    summary.session_id, summary.end_reason, summary.reps
                );
                self.status_tx.send_replace(session.status(false));
                self.session = Some(session);
                self.last_summary = Some(summary.clone());
                Ok(summary)
            }
            Err(e) => {
                error!("Processing loop task failed: {}", e);
                let session = Session::new(Self::machine_for(&self.config));
                self.status_tx.send_replace(session.status(false));
                self.session = Some(session);
                Err(RepCountError::system(format!(
                    "processing loop task failed: {}",
                    e
                )))
            }
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.control.request_stop();
            running.handle.abort();
        }
    }
}
