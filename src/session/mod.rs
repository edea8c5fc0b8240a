//! Session lifecycle and the per-frame processing pipeline

mod controller;
mod processing_loop;
mod state;

pub use controller::{ExportArtifact, ExportReceipt, SessionController};
pub use processing_loop::{FrameOutcome, FrameProcessingLoop, LoopControl, LoopOutcome};
pub use state::{Session, SessionStatus, SessionSummary};

#[cfg(test)]
mod tests;
