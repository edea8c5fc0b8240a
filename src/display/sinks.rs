use super::{AnnotatedFrame, DisplaySink, DisplayStatus};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

/// Display sink for headless runs: reports counters through the log
#[derive(Debug, Default)]
pub struct TracingDisplaySink {
    last_count: AtomicU32,
}

impl TracingDisplaySink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl DisplaySink for TracingDisplaySink {
    async fn present(&self, frame: AnnotatedFrame, status: DisplayStatus) {
        let previous = self.last_count.swap(status.count, Ordering::Relaxed);
        if status.count != previous {
            info!("Squat count: {} (stage: {})", status.count, status.stage);
        }

        match status.angle {
            Some(angle) => debug!(
                "Frame {}: angle {:.1}°, stage {}, count {}",
                status.frame_id, angle, status.stage, status.count
            ),
            None => trace!(
                "Frame {}: no measurement, stage {}, count {} (annotated: {})",
                status.frame_id,
                status.stage,
                status.count,
                frame.annotated
            ),
        }
    }
}

/// Frame and counters as delivered to a channel consumer
#[derive(Debug, Clone)]
pub struct DisplayUpdate {
    pub frame: AnnotatedFrame,
    pub status: DisplayStatus,
}

/// Display sink that forwards every update to a UI task over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelDisplaySink {
    sender: mpsc::UnboundedSender<DisplayUpdate>,
}

impl ChannelDisplaySink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DisplayUpdate>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait::async_trait]
impl DisplaySink for ChannelDisplaySink {
    async fn present(&self, frame: AnnotatedFrame, status: DisplayStatus) {
        if self.sender.send(DisplayUpdate { frame, status }).is_err() {
            trace!("Display receiver dropped, discarding frame {}", status.frame_id);
        }
    }
}
