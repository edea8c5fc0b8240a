use crate::counter::{RepState, Stage};
use crate::pose::JointTriple;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One angle measurement derived from a frame's hip, knee and ankle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleSample {
    pub timestamp: DateTime<Utc>,
    pub joints: JointTriple,
    pub angle_degrees: f64,
}

/// A sample together with the counter state right after it was applied
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub sample: AngleSample,
    pub stage: Stage,
    pub count: u32,
}

impl MeasurementRecord {
    pub fn new(sample: AngleSample, state: RepState) -> Self {
        Self {
            sample,
            stage: state.stage,
            count: state.count,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.sample.timestamp
    }
}

/// Append-only, arrival-ordered log of measurements for one session
#[derive(Debug, Clone, Default)]
pub struct MeasurementBuffer {
    records: Vec<MeasurementRecord>,
}

impl MeasurementBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: MeasurementRecord) {
        self.records.push(record);
    }

    /// Copy of every record in arrival order
    pub fn snapshot(&self) -> Vec<MeasurementRecord> {
        self.records.clone()
    }

    pub fn records(&self) -> &[MeasurementRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&MeasurementRecord> {
        self.records.last()
    }

    pub fn clear(&mut self) {
        debug!("Clearing {} measurement records", self.records.len());
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
