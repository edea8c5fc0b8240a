use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Pixel layout of a frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// RGB24 format - uncompressed RGB data
    Rgb24,
    /// No pixel payload (replayed landmark streams)
    Empty,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Rgb24 => 3,
            FrameFormat::Empty => 0,
        }
    }
}

/// Frame data structure containing raw frame data and metadata
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Sequential frame identifier within one source
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw frame data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frame format
    pub format: FrameFormat,
}

impl FrameData {
    /// Create a new frame data instance
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Frame that carries only identity and timing
    pub fn empty(id: u64, timestamp: SystemTime, width: u32, height: u32) -> Self {
        Self::new(id, timestamp, Vec::new(), width, height, FrameFormat::Empty)
    }

    /// Get the expected frame size in bytes
    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        self.data.len() == self.expected_size()
    }

    /// Capture timestamp as UTC, or `None` when it lies outside the representable range
    pub fn capture_time(&self) -> Option<DateTime<Utc>> {
        let epoch = DateTime::<Utc>::from_timestamp(0, 0)?;
        match self.timestamp.duration_since(UNIX_EPOCH) {
            Ok(after) => epoch.checked_add_signed(chrono::Duration::from_std(after).ok()?),
            Err(before) => {
                epoch.checked_sub_signed(chrono::Duration::from_std(before.duration()).ok()?)
            }
        }
    }

    /// Whether the frame holds pixels that can be drawn on
    pub fn has_pixels(&self) -> bool {
        self.format == FrameFormat::Rgb24 && !self.data.is_empty() && self.validate_size()
    }
}
