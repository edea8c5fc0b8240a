use crate::counter::{RepState, RepStateMachine, Stage};
use crate::events::EndReason;
use crate::measurement::{MeasurementBuffer, MeasurementRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Counter and measurement history of one exercise session.
///
/// Exactly one owner at a time: the controller while idle, the processing loop while running.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    pub(crate) machine: RepStateMachine,
    pub(crate) buffer: MeasurementBuffer,
    started_at: DateTime<Utc>,
    pub(crate) frames_processed: u64,
    pub(crate) frames_skipped: u64,
}

impl Session {
    pub fn new(machine: RepStateMachine) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            machine,
            buffer: MeasurementBuffer::new(),
            started_at: Utc::now(),
            frames_processed: 0,
            frames_skipped: 0,
        }
    }

    /// Fresh identity, (UNKNOWN, 0) and an empty buffer; thresholds are kept
    pub fn reset(&mut self) {
        self.id = Uuid::new_v4().to_string();
        self.machine.reset();
        self.buffer.clear();
        self.started_at = Utc::now();
        self.frames_processed = 0;
        self.frames_skipped = 0;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rep_state(&self) -> RepState {
        self.machine.state()
    }

    pub fn records(&self) -> &[MeasurementRecord] {
        self.buffer.records()
    }

    pub fn snapshot(&self) -> Vec<MeasurementRecord> {
        self.buffer.snapshot()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn status(&self, active: bool) -> SessionStatus {
        SessionStatus {
            session_id: self.id.clone(),
            active,
            state: self.rep_state(),
            frames_processed: self.frames_processed,
            frames_skipped: self.frames_skipped,
            samples_recorded: self.buffer.len(),
        }
    }

    pub fn summarize(&self, end_reason: EndReason) -> SessionSummary {
        let state = self.rep_state();
        SessionSummary {
            session_id: self.id.clone(),
            started_at: self.started_at,
            ended_at: Utc::now(),
            end_reason,
            frames_processed: self.frames_processed,
            frames_skipped: self.frames_skipped,
            samples_recorded: self.buffer.len(),
            reps: state.count,
            final_stage: state.stage,
        }
    }
}

/// Live view of a session, published after every frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub active: bool,
    pub state: RepState,
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub samples_recorded: usize,
}

/// Outcome of one processing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub end_reason: EndReason,
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub samples_recorded: usize,
    pub reps: u32,
    pub final_stage: Stage,
}
