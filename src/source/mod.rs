mod channel;
mod recording;

pub use channel::ChannelFrameSource;
pub use recording::{RecordedFrame, RecordedFrameSource, RecordedPoseEstimator, Recording};

use crate::error::SourceError;
use crate::frame::FrameData;

/// Sequential supplier of frames: a capture device, a decoded file, or a replay.
///
/// `Ok(None)` marks the end of the stream and is not an error.
#[async_trait::async_trait]
pub trait FrameSource: Send {
    /// Wait for the next frame.
    ///
    /// Must be cancel-safe: a stop request drops the pending future, and a frame it had not yet
    /// returned must not be lost from the source (an `mpsc` receive or interval tick is fine).
    async fn next_frame(&mut self) -> Result<Option<FrameData>, SourceError>;

    /// Name used in logs and events
    fn source_name(&self) -> &str;
}
