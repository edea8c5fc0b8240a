//! Joint angle from three image points
//!
//! The angle is measured at the middle point, between the rays towards the first and the
//! last point, and folded into [0, 180] degrees.

use crate::pose::{FrameSkip, JointPoint};

/// Angle at `b` formed by `a` and `c`, in degrees within [0, 180].
///
/// Returns `FrameSkip::MalformedAngleInput` if any coordinate is not finite.
pub fn joint_angle(a: JointPoint, b: JointPoint, c: JointPoint) -> Result<f64, FrameSkip> {
    if !(a.is_finite() && b.is_finite() && c.is_finite()) {
        return Err(FrameSkip::MalformedAngleInput);
    }

    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let mut angle = radians.to_degrees().abs();

    if angle > 180.0 {
        angle = 360.0 - angle;
    }

    Ok(angle)
}
