pub mod action_log;
pub mod executor;
pub mod layout;
pub mod program;

pub use action_log::{ActionEntry, ActionLog, ActionTag};
pub use executor::{Outcome, RouteExecutor, RunState};
pub use layout::{
    ChallengeLayout, ColorCounts, GridPose, Orientation, TileInventory, TokenColor, VictoryTally,
};
pub use program::{Primitive, Program, ProgramIssue};
