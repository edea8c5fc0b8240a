use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};

/// Angle above which the joint counts as extended
pub const DEFAULT_UP_THRESHOLD: f64 = 160.0;
/// Angle below which an extended joint counts as flexed
pub const DEFAULT_DOWN_THRESHOLD: f64 = 120.0;

/// Phase of the tracked movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Unknown,
    Up,
    Down,
}

impl Stage {
    /// Label used in exports; `Unknown` has none
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Unknown => "",
            Stage::Up => "up",
            Stage::Down => "down",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Unknown => write!(f, "-"),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// Current stage and completed repetitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepState {
    pub stage: Stage,
    pub count: u32,
}

/// What a single angle sample did to the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub previous: Stage,
    pub state: RepState,
    pub rep_completed: bool,
}

impl Transition {
    pub fn stage_changed(&self) -> bool {
        self.previous != self.state.stage
    }
}

/// Two-threshold hysteresis counter.
///
/// A repetition is an UP followed by a DOWN: angles above the up threshold set UP, angles
/// below the down threshold while UP set DOWN and count one rep. Anything in between leaves
/// the state alone.
#[derive(Debug, Clone)]
pub struct RepStateMachine {
    up_threshold: f64,
    down_threshold: f64,
    state: RepState,
}

impl Default for RepStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RepStateMachine {
    pub fn new() -> Self {
        Self::with_thresholds(DEFAULT_UP_THRESHOLD, DEFAULT_DOWN_THRESHOLD)
    }

    /// Thresholds must satisfy `down_threshold < up_threshold`; the config layer validates this.
    pub fn with_thresholds(up_threshold: f64, down_threshold: f64) -> Self {
        debug_assert!(down_threshold < up_threshold);
        Self {
            up_threshold,
            down_threshold,
            state: RepState::default(),
        }
    }

    /// Feed one angle sample
    pub fn update(&mut self, angle: f64) -> Transition {
        let previous = self.state.stage;
        let mut rep_completed = false;

        if angle > self.up_threshold {
            self.state.stage = Stage::Up;
        } else if angle < self.down_threshold && self.state.stage == Stage::Up {
            self.state.stage = Stage::Down;
            self.state.count += 1;
            rep_completed = true;
        }

        if rep_completed {
            debug!("Repetition {} completed at {:.1}°", self.state.count, angle);
        } else if previous != self.state.stage {
            debug!("Stage {} -> {} at {:.1}°", previous, self.state.stage, angle);
        } else {
            trace!("Angle {:.1}° leaves stage {}", angle, self.state.stage);
        }

        Transition {
            previous,
            state: self.state,
            rep_completed,
        }
    }

    pub fn state(&self) -> RepState {
        self.state
    }

    pub fn stage(&self) -> Stage {
        self.state.stage
    }

    pub fn count(&self) -> u32 {
        self.state.count
    }

    pub fn thresholds(&self) -> (f64, f64) {
        (self.up_threshold, self.down_threshold)
    }

    /// Back to (UNKNOWN, 0), keeping thresholds
    pub fn reset(&mut self) {
        self.state = RepState::default();
    }
}
