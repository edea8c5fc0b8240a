//! Replay of recorded pose landmarks.
//!
//! A recording is newline-delimited JSON, one object per captured frame:
//!
//! ```text
//! {"timestamp_ms": 1700000000000, "landmarks": {"left_hip": {"x": 0.51, "y": 0.42}, ...}}
//! {"timestamp_ms": 1700000000033, "landmarks": null}
//! ```
//!
//! `landmarks: null` (or a missing field) is a frame where the model found nobody. Blank lines
//! and lines starting with `#` are ignored. The same recording feeds both the frame source and
//! the pose estimator, matched by frame id.

use super::FrameSource;
use crate::error::{PoseError, SourceError};
use crate::frame::FrameData;
use crate::pose::{PoseDetection, PoseEstimator, PoseLandmarks};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info};

/// One line of a recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub timestamp_ms: u64,
    #[serde(default)]
    pub landmarks: Option<PoseLandmarks>,
}

impl RecordedFrame {
    pub fn timestamp(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.timestamp_ms)
    }
}

/// A parsed landmark recording
#[derive(Debug, Clone)]
pub struct Recording {
    frames: Arc<Vec<RecordedFrame>>,
    name: String,
}

impl Recording {
    /// Load a recording from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| SourceError::Open {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;

        let recording = Self::from_reader(file, &path.display().to_string())?;
        info!(
            "Loaded recording {} with {} frames",
            path.display(),
            recording.len()
        );
        Ok(recording)
    }

    /// Parse a recording from any reader
    pub fn from_reader<R: Read>(reader: R, name: &str) -> Result<Self, SourceError> {
        let mut frames = Vec::new();

        for (index, line) in BufReader::new(reader).lines().enumerate() {
            let line = line.map_err(|e| SourceError::Read {
                details: e.to_string(),
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let frame: RecordedFrame =
                serde_json::from_str(trimmed).map_err(|e| SourceError::Malformed {
                    line: index + 1,
                    details: e.to_string(),
                })?;
            frames.push(frame);
        }

        Ok(Self {
            frames: Arc::new(frames),
            name: name.to_string(),
        })
    }

    pub fn from_frames(frames: Vec<RecordedFrame>, name: &str) -> Self {
        Self {
            frames: Arc::new(frames),
            name: name.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame source over this recording.
    ///
    /// `replay_fps` of 0 yields frames as fast as they are requested.
    pub fn frames(&self, resolution: (u32, u32), replay_fps: u32) -> RecordedFrameSource {
        RecordedFrameSource {
            frames: Arc::clone(&self.frames),
            cursor: 0,
            resolution,
            frame_interval: (replay_fps > 0)
                .then(|| Duration::from_secs_f64(1.0 / replay_fps as f64)),
            pacing: None,
            name: self.name.clone(),
        }
    }

    /// Pose estimator answering from this recording
    pub fn estimator(&self) -> RecordedPoseEstimator {
        RecordedPoseEstimator {
            frames: Arc::clone(&self.frames),
            name: format!("recording:{}", self.name),
        }
    }
}

/// Frames replayed from a recording. The frames carry no pixels.
pub struct RecordedFrameSource {
    frames: Arc<Vec<RecordedFrame>>,
    cursor: usize,
    resolution: (u32, u32),
    frame_interval: Option<Duration>,
    pacing: Option<Interval>,
    name: String,
}

#[async_trait::async_trait]
impl FrameSource for RecordedFrameSource {
    async fn next_frame(&mut self) -> Result<Option<FrameData>, SourceError> {
        let Some(recorded) = self.frames.get(self.cursor) else {
            debug!("Recording {} exhausted after {} frames", self.name, self.cursor);
            return Ok(None);
        };

        if let Some(period) = self.frame_interval {
            let interval = self.pacing.get_or_insert_with(|| {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                interval
            });
            interval.tick().await;
        }

        let frame = FrameData::empty(
            self.cursor as u64,
            recorded.timestamp(),
            self.resolution.0,
            self.resolution.1,
        );
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

/// Pose estimator that looks up recorded landmarks by frame id
#[derive(Clone)]
pub struct RecordedPoseEstimator {
    frames: Arc<Vec<RecordedFrame>>,
    name: String,
}

#[async_trait::async_trait]
impl PoseEstimator for RecordedPoseEstimator {
    async fn estimate(&self, frame: &FrameData) -> Result<PoseDetection, PoseError> {
        let recorded = usize::try_from(frame.id)
            .ok()
            .and_then(|index| self.frames.get(index))
            .ok_or_else(|| PoseError::UnsupportedFrame {
                details: format!("frame {} is not part of {}", frame.id, self.name),
            })?;

        Ok(match &recorded.landmarks {
            Some(landmarks) if !landmarks.is_empty() => PoseDetection::Detected(landmarks.clone()),
            _ => PoseDetection::NoPerson,
        })
    }

    fn estimator_name(&self) -> &str {
        &self.name
    }
}
