use super::state::{Session, SessionStatus, SessionSummary};
use crate::config::CounterConfig;
use crate::counter::{joint_angle, Transition};
use crate::display::{DisplaySink, DisplayStatus, OverlayRenderer};
use crate::events::{EndReason, EventBus, RepCountEvent};
use crate::frame::FrameData;
use crate::measurement::{AngleSample, MeasurementRecord};
use crate::pose::{extract_joints, FrameSkip, JointTriple, PoseDetection, PoseEstimator, PoseLandmarks};
use crate::source::FrameSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, trace, warn};

/// What a single frame did to the session
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// The frame produced a sample; state and buffer were both updated
    Counted { angle: f64, transition: Transition },
    /// The frame was skipped for counting
    Skipped(FrameSkip),
    /// The pose estimator failed internally; the frame was skipped
    EstimatorFault(String),
}

/// Handles shared between a running loop and its controller
#[derive(Clone)]
pub struct LoopControl {
    pub(crate) active: Arc<AtomicBool>,
    pub(crate) wake: Arc<Notify>,
}

impl LoopControl {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Clear the active flag. The loop finishes its in-flight frame and then ends.
    pub fn request_stop(&self) {
        self.active.store(false, Ordering::Release);
        self.wake.notify_one();
    }
}

impl Default for LoopControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a finished loop: the session is handed back to its owner
pub struct LoopOutcome {
    pub session: Session,
    pub summary: SessionSummary,
}

/// Sequential frame pipeline for one session: acquire, estimate, measure, count, record,
/// display.
pub struct FrameProcessingLoop {
    session: Session,
    source: Box<dyn FrameSource>,
    estimator: Arc<dyn PoseEstimator>,
    display: Arc<dyn DisplaySink>,
    overlay: Arc<OverlayRenderer>,
    event_bus: EventBus,
    counter: CounterConfig,
    control: LoopControl,
    status: watch::Sender<SessionStatus>,
}

impl FrameProcessingLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session: Session,
        source: Box<dyn FrameSource>,
        estimator: Arc<dyn PoseEstimator>,
        display: Arc<dyn DisplaySink>,
        overlay: Arc<OverlayRenderer>,
        event_bus: EventBus,
        counter: CounterConfig,
        control: LoopControl,
        status: watch::Sender<SessionStatus>,
    ) -> Self {
        Self {
            session,
            source,
            estimator,
            display,
            overlay,
            event_bus,
            counter,
            control,
            status,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Drive the session until the source ends or the active flag is cleared
    pub async fn run(mut self) -> LoopOutcome {
        info!(
            "Processing session {} from {} with {}",
            self.session.id(),
            self.source.source_name(),
            self.estimator.estimator_name()
        );

        let reason = loop {
            if !self.control.is_active() {
                break EndReason::Stopped;
            }

            // Only the wait for a frame is interruptible; an acquired frame is always finished.
            let next = tokio::select! {
                next = self.source.next_frame() => next,
                _ = self.control.wake.notified() => continue,
            };

            match next {
                Ok(Some(frame)) => {
                    self.process_frame(frame).await;
                }
                Ok(None) => {
                    info!("Frame source {} exhausted", self.source.source_name());
                    break EndReason::SourceExhausted;
                }
                Err(e) => {
                    error!("Frame source {} failed: {}", self.source.source_name(), e);
                    let _ = self.event_bus.publish(RepCountEvent::SystemError {
                        component: "frame_source".to_string(),
                        error: e.to_string(),
                    });
                    break EndReason::SourceFailed;
                }
            }
        };

        self.control.active.store(false, Ordering::Release);
        self.status.send_replace(self.session.status(false));

        let summary = self.session.summarize(reason);
        let _ = self.event_bus.publish(RepCountEvent::SessionEnded {
            session_id: summary.session_id.clone(),
            reason,
            reps: summary.reps,
            timestamp: SystemTime::now(),
        });

        LoopOutcome {
            session: self.session,
            summary,
        }
    }

    /// Run one acquired frame through the pipeline.
    ///
    /// Either the state machine update and the buffer append both happen, or neither does.
    /// The display sink receives the frame in every case.
    pub async fn process_frame(&mut self, frame: FrameData) -> FrameOutcome {
        self.session.frames_processed += 1;

        let measured = match self.estimator.estimate(&frame).await {
            Ok(PoseDetection::Detected(landmarks)) => self.measure(&frame, &landmarks),
            Ok(PoseDetection::NoPerson) => Err(FrameSkip::DetectionMiss),
            Err(e) => {
                warn!("Pose estimation failed on frame {}: {}", frame.id, e);
                let _ = self.event_bus.publish(RepCountEvent::SystemError {
                    component: self.estimator.estimator_name().to_string(),
                    error: e.to_string(),
                });
                self.session.frames_skipped += 1;
                self.present(frame, None, None).await;
                return FrameOutcome::EstimatorFault(e.to_string());
            }
        };

        match measured {
            Ok(sample) => {
                let (joints, angle) = (sample.joints, sample.angle_degrees);
                let transition = self.record(sample, frame.timestamp);
                self.present(frame, Some(&joints), Some(angle)).await;
                FrameOutcome::Counted { angle, transition }
            }
            Err(skip) => {
                trace!("Frame {} skipped: {}", frame.id, skip);
                self.session.frames_skipped += 1;
                let _ = self.event_bus.publish(RepCountEvent::FrameSkipped {
                    frame_id: frame.id,
                    reason: skip,
                    timestamp: frame.timestamp,
                });
                self.present(frame, None, None).await;
                FrameOutcome::Skipped(skip)
            }
        }
    }

    /// Everything fallible about a frame, computed before any state is touched
    fn measure(
        &self,
        frame: &FrameData,
        landmarks: &PoseLandmarks,
    ) -> Result<AngleSample, FrameSkip> {
        let joints = extract_joints(
            landmarks,
            self.counter.side,
            self.counter.fallback_to_opposite_side,
        )?;
        if joints.side != self.counter.side {
            debug!("Using {} side, {} side not fully visible", joints.side, self.counter.side);
        }
        let angle = joint_angle(joints.hip, joints.knee, joints.ankle)?;
        let timestamp = frame.capture_time().ok_or_else(|| {
            warn!("Frame {} has an out-of-range capture timestamp", frame.id);
            FrameSkip::MalformedAngleInput
        })?;

        Ok(AngleSample {
            timestamp,
            joints,
            angle_degrees: angle,
        })
    }

    fn record(&mut self, sample: AngleSample, timestamp: SystemTime) -> Transition {
        let angle = sample.angle_degrees;
        let transition = self.session.machine.update(angle);
        self.session
            .buffer
            .append(MeasurementRecord::new(sample, transition.state));

        if transition.stage_changed() {
            let _ = self.event_bus.publish(RepCountEvent::StageChanged {
                from: transition.previous,
                to: transition.state.stage,
                angle,
                timestamp,
            });
        }
        if transition.rep_completed {
            let _ = self.event_bus.publish(RepCountEvent::RepCompleted {
                count: transition.state.count,
                timestamp,
            });
        }

        transition
    }

    async fn present(&mut self, frame: FrameData, joints: Option<&JointTriple>, angle: Option<f64>) {
        let state = self.session.rep_state();
        let status = DisplayStatus {
            frame_id: frame.id,
            timestamp: frame.timestamp,
            stage: state.stage,
            count: state.count,
            detected: angle.is_some(),
            angle,
        };

        let annotated = self.overlay.annotate(frame, &status, joints);
        self.display.present(annotated, status).await;
        self.status
            .send_replace(self.session.status(self.control.is_active()));
    }
}
