pub mod clock;
pub mod config;
pub mod drivers;
pub mod error;
pub mod follow;
pub mod heading;
pub mod line_sensor;
pub mod report;
pub mod robot;
pub mod route;
pub mod session;
pub mod sim;
pub mod turn;

pub use config::RunnerConfig;
pub use error::{Aborted, Maneuver, Result, RunnerError};
pub use robot::Robot;
pub use route::{ChallengeLayout, Outcome, Program};
pub use session::{Session, SessionState};
