pub mod config;
pub mod counter;
pub mod display;
pub mod error;
pub mod events;
pub mod frame;
pub mod measurement;
pub mod pose;
pub mod session;
pub mod source;
pub mod upload;

pub use config::RepCountConfig;
pub use counter::{joint_angle, RepState, RepStateMachine, Stage, Transition};
pub use display::{
    AnnotatedFrame, ChannelDisplaySink, DisplaySink, DisplayStatus, DisplayUpdate,
    OverlayRenderer, TracingDisplaySink,
};
pub use error::{RepCountError, Result};
pub use events::{EndReason, EventBus, EventFilter, EventReceiver, RepCountEvent};
pub use frame::{FrameData, FrameFormat};
pub use measurement::{AngleSample, MeasurementBuffer, MeasurementRecord};
pub use pose::{BodySide, FrameSkip, JointPoint, JointTriple, PoseDetection, PoseEstimator};
pub use session::{
    ExportArtifact, ExportReceipt, FrameProcessingLoop, SessionController, SessionStatus,
    SessionSummary,
};
pub use source::{ChannelFrameSource, FrameSource, Recording};
pub use upload::{LocalArchiveUploader, Uploader};
