//! Run lifecycle: idle, running, back to idle, with a clean restart after
//! every abort.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::drivers::Platform;
use crate::report::RunReport;
use crate::robot::Robot;
use crate::route::{ActionLog, ChallengeLayout, Outcome, Program, RouteExecutor, RunState};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Running,
}

pub struct Session<P: Platform> {
    robot: Robot<P>,
    layout: ChallengeLayout,
    program: Program,
    log: ActionLog,
    state: SessionState,
    run_state: RunState,
    runs_started: u32,
    last_outcome: Option<Outcome>,
}

impl<P: Platform> Session<P> {
    pub fn new(robot: Robot<P>, layout: ChallengeLayout, program: Program) -> Self {
        let log = ActionLog::new(robot.config().run.action_log_capacity);
        let run_state = RunState::fresh(&layout);
        Self {
            robot,
            layout,
            program,
            log,
            state: SessionState::Idle,
            run_state,
            runs_started: 0,
            last_outcome: None,
        }
    }

    pub fn power_on(&mut self) {
        self.robot.power_on();
    }

    /// One full pass over the program from the layout's start pose.
    ///
    /// A trigger fired while idle is kept and aborts this run at its first
    /// check. The hard reset after an abort drains whatever is still queued.
    pub fn run_once(&mut self) -> Outcome {
        self.state = SessionState::Running;
        self.runs_started += 1;
        self.run_state = RunState::fresh(&self.layout);
        log::info!(
            "[session] Run {} starting at {:?}",
            self.runs_started,
            self.run_state.pose
        );

        let outcome = RouteExecutor::new(
            &mut self.robot,
            &mut self.run_state,
            &mut self.log,
            self.runs_started,
        )
        .execute(&self.program);

        if outcome == Outcome::Aborted {
            self.robot.hard_reset();
            self.run_state = RunState::fresh(&self.layout);
        }
        self.state = SessionState::Idle;
        self.last_outcome = Some(outcome);
        log::info!(
            "[session] Run {} -> {:?} ({} actions pending)",
            self.runs_started,
            outcome,
            self.log.len()
        );
        outcome
    }

    /// Snapshot of the action log, if there is anything to send.
    pub fn pending_report(&self, room: &str) -> Option<RunReport> {
        if self.log.is_empty() {
            return None;
        }
        Some(RunReport {
            room: room.to_string(),
            run: self.runs_started,
            outcome: self.last_outcome,
            generated_at: Utc::now(),
            actions: self.log.snapshot(),
        })
    }

    pub fn confirm_delivery(&mut self) {
        self.log.clear();
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn run_state(&self) -> &RunState {
        &self.run_state
    }

    pub fn action_log(&self) -> &ActionLog {
        &self.log
    }

    pub fn robot(&self) -> &Robot<P> {
        &self.robot
    }

    pub fn robot_mut(&mut self) -> &mut Robot<P> {
        &mut self.robot
    }

    pub fn runs_started(&self) -> u32 {
        self.runs_started
    }

    pub fn last_outcome(&self) -> Option<Outcome> {
        self.last_outcome
    }
}
