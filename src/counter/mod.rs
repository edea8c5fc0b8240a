mod angle;
mod state_machine;

pub use angle::joint_angle;
pub use state_machine::{
    RepState, RepStateMachine, Stage, Transition, DEFAULT_DOWN_THRESHOLD, DEFAULT_UP_THRESHOLD,
};
