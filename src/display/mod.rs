mod overlay;
mod sinks;

pub use overlay::OverlayRenderer;
pub use sinks::{ChannelDisplaySink, DisplayUpdate, TracingDisplaySink};

use crate::counter::Stage;
use crate::frame::FrameData;
use std::time::SystemTime;

/// Counters shown alongside a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayStatus {
    pub frame_id: u64,
    pub timestamp: SystemTime,
    pub stage: Stage,
    pub count: u32,
    /// Whether this frame contributed a sample
    pub detected: bool,
    /// Knee angle of this frame, when one was measured
    pub angle: Option<f64>,
}

/// A frame on its way to the display, possibly with the status overlay drawn on it
#[derive(Debug, Clone)]
pub struct AnnotatedFrame {
    pub frame: FrameData,
    pub annotated: bool,
}

impl AnnotatedFrame {
    pub fn passthrough(frame: FrameData) -> Self {
        Self {
            frame,
            annotated: false,
        }
    }
}

/// Presentation surface for the live session. Fire-and-forget: nothing it does feeds back
/// into counting.
#[async_trait::async_trait]
pub trait DisplaySink: Send + Sync {
    async fn present(&self, frame: AnnotatedFrame, status: DisplayStatus);
}
