mod estimator;
mod extract;
mod landmark;

pub use estimator::{PoseDetection, PoseEstimator};
pub use extract::{extract_joints, BodySide, FrameSkip, JointTriple};
pub use landmark::{JointPoint, LandmarkId, PoseLandmarks, LANDMARK_COUNT};
