use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the session controller. Pose, source, overlay and event bus faults are
/// handled inside the processing loop and never reach this level.
#[derive(Error, Debug)]
pub enum RepCountError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("System error: {message}")]
    System { message: String },
}

impl RepCountError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }
}

/// Internal fault of a pose estimator. A frame without a person is not an error.
#[derive(Error, Debug)]
pub enum PoseError {
    #[error("Unsupported frame for pose estimation: {details}")]
    UnsupportedFrame { details: String },
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to open frame source '{path}': {details}")]
    Open { path: PathBuf, details: String },

    #[error("Malformed recording at line {line}: {details}")]
    Malformed { line: usize, details: String },

    #[error("Frame read failed: {details}")]
    Read { details: String },
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Export requested with no recorded measurements")]
    EmptyExportRequest,

    #[error("Export is not allowed while the session is active")]
    SessionActive,

    #[error("Failed to write export file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum UploadError {
    /// The upload collaborator rejected or failed the transfer. The local artifact is untouched.
    #[error("Upload of '{path}' failed: {details}")]
    UpstreamUploadFailure { path: PathBuf, details: String },
}

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Failed to load overlay font '{path}': {details}")]
    Font { path: String, details: String },

    #[error("Frame buffer does not match {width}x{height} RGB24")]
    FrameLayout { width: u32, height: u32 },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, RepCountError>;
