use super::landmark::{JointPoint, LandmarkId, PoseLandmarks};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of the body whose hip, knee and ankle drive the counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodySide {
    Left,
    Right,
}

impl BodySide {
    pub fn opposite(self) -> Self {
        match self {
            BodySide::Left => BodySide::Right,
            BodySide::Right => BodySide::Left,
        }
    }

    fn landmarks(self) -> [LandmarkId; 3] {
        match self {
            BodySide::Left => [LandmarkId::LeftHip, LandmarkId::LeftKnee, LandmarkId::LeftAnkle],
            BodySide::Right => [
                LandmarkId::RightHip,
                LandmarkId::RightKnee,
                LandmarkId::RightAnkle,
            ],
        }
    }
}

impl fmt::Display for BodySide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodySide::Left => write!(f, "left"),
            BodySide::Right => write!(f, "right"),
        }
    }
}

/// Reason a frame did not contribute a sample to the counter.
///
/// These are expected per-frame conditions, not faults: the loop records them and moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSkip {
    /// No person detected, or the joints needed are not in the estimate
    DetectionMiss,
    /// A coordinate needed for the angle is not a finite number
    MalformedAngleInput,
}

impl fmt::Display for FrameSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameSkip::DetectionMiss => write!(f, "detection miss"),
            FrameSkip::MalformedAngleInput => write!(f, "malformed angle input"),
        }
    }
}

/// Hip, knee and ankle of one side, with the knee as the angle vertex
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointTriple {
    pub side: BodySide,
    pub hip: JointPoint,
    pub knee: JointPoint,
    pub ankle: JointPoint,
}

impl JointTriple {
    pub fn is_finite(&self) -> bool {
        self.hip.is_finite() && self.knee.is_finite() && self.ankle.is_finite()
    }
}

fn triple_for(landmarks: &PoseLandmarks, side: BodySide) -> Result<JointTriple, FrameSkip> {
    let [hip, knee, ankle] = side.landmarks();
    let (Some(hip), Some(knee), Some(ankle)) =
        (landmarks.get(hip), landmarks.get(knee), landmarks.get(ankle))
    else {
        return Err(FrameSkip::DetectionMiss);
    };

    let triple = JointTriple {
        side,
        hip,
        knee,
        ankle,
    };

    if triple.is_finite() {
        Ok(triple)
    } else {
        Err(FrameSkip::MalformedAngleInput)
    }
}

/// Pick the hip/knee/ankle triple used for counting.
///
/// The preferred side wins whenever all three of its joints are present and finite. With
/// `fallback` set, a complete opposite side is used instead; otherwise the preferred side's
/// failure is reported.
pub fn extract_joints(
    landmarks: &PoseLandmarks,
    preferred: BodySide,
    fallback: bool,
) -> Result<JointTriple, FrameSkip> {
    match triple_for(landmarks, preferred) {
        Ok(triple) => Ok(triple),
        Err(skip) if fallback => triple_for(landmarks, preferred.opposite()).map_err(|_| skip),
        Err(skip) => Err(skip),
    }
}
