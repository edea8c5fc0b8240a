use super::landmark::PoseLandmarks;
use crate::error::PoseError;
use crate::frame::FrameData;

/// Outcome of running the pose model on one frame
#[derive(Debug, Clone, PartialEq)]
pub enum PoseDetection {
    Detected(PoseLandmarks),
    NoPerson,
}

impl PoseDetection {
    pub fn landmarks(&self) -> Option<&PoseLandmarks> {
        match self {
            PoseDetection::Detected(landmarks) => Some(landmarks),
            PoseDetection::NoPerson => None,
        }
    }
}

/// External pose model: turns a frame into landmarks for at most one person.
///
/// `Ok(PoseDetection::NoPerson)` is the normal "nobody in frame" answer; `Err` is reserved for
/// faults inside the estimator itself.
#[async_trait::async_trait]
pub trait PoseEstimator: Send + Sync {
    async fn estimate(&self, frame: &FrameData) -> Result<PoseDetection, PoseError>;

    /// Name used in logs and events
    fn estimator_name(&self) -> &str;
}
