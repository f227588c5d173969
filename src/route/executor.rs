//! Runs a route program against the robot and the grid model.

use serde::{Deserialize, Serialize};

use crate::drivers::Platform;
use crate::error::{Aborted, Maneuver};
use crate::follow::FollowRequest;
use crate::robot::Robot;
use crate::route::action_log::{ActionLog, ActionTag};
use crate::route::layout::{ChallengeLayout, GridPose, Take, TileInventory, TokenColor, VictoryTally};
use crate::route::program::{Primitive, Program};
use crate::turn::TurnKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Continue,
    Victory,
    Defeat,
    Aborted,
}

/// Everything a run mutates. Rebuilt from the layout at the start of every
/// run and after an abort.
#[derive(Clone, Debug, PartialEq)]
pub struct RunState {
    pub pose: GridPose,
    pub inventory: TileInventory,
    pub tally: VictoryTally,
}

impl RunState {
    pub fn fresh(layout: &ChallengeLayout) -> Self {
        Self {
            pose: layout.start_pose(),
            inventory: layout.inventory(),
            tally: VictoryTally::new(layout.required()),
        }
    }

    /// Take one token from the current tile, counting it toward victory.
    pub fn collect_one(&mut self, color: TokenColor, enforce_gate: bool) -> Take {
        let take = self.inventory.take(self.pose.tile(), color, enforce_gate);
        if take == Take::Taken {
            self.tally.record(color);
        }
        take
    }

    pub fn tile_has(&self, color: TokenColor) -> bool {
        self.inventory.has(self.pose.tile(), color)
    }
}

fn turn_tag(kind: TurnKind) -> ActionTag {
    match kind {
        TurnKind::Left => ActionTag::TurnLeft,
        TurnKind::Right => ActionTag::TurnRight,
        TurnKind::Back => ActionTag::TurnBack,
    }
}

pub struct RouteExecutor<'a, P: Platform> {
    robot: &'a mut Robot<P>,
    state: &'a mut RunState,
    log: &'a mut ActionLog,
    run: u32,
}

impl<'a, P: Platform> RouteExecutor<'a, P> {
    pub fn new(
        robot: &'a mut Robot<P>,
        state: &'a mut RunState,
        log: &'a mut ActionLog,
        run: u32,
    ) -> Self {
        Self {
            robot,
            state,
            log,
            run,
        }
    }

    /// Run the whole program. Victory is only judged once every step is done.
    pub fn execute(&mut self, program: &Program) -> Outcome {
        let outcome = self.run_steps(&program.steps);
        if outcome != Outcome::Continue {
            log::info!("[route] Run {} ended early: {:?}", self.run, outcome);
            return outcome;
        }

        let victory = self.state.tally.is_victory();
        self.robot.show_outcome(victory);
        log::info!(
            "[route] Run {} finished at ({}, {}) facing {:?}: collected {:?}, required {:?}",
            self.run,
            self.state.pose.x,
            self.state.pose.y,
            self.state.pose.orientation,
            self.state.tally.collected,
            self.state.tally.required
        );
        if victory {
            Outcome::Victory
        } else {
            Outcome::Defeat
        }
    }

    fn run_steps(&mut self, steps: &[Primitive]) -> Outcome {
        for step in steps {
            let outcome = self.step(step);
            if outcome != Outcome::Continue {
                return outcome;
            }
        }
        Outcome::Continue
    }

    pub fn step(&mut self, primitive: &Primitive) -> Outcome {
        match self.try_step(primitive) {
            Ok(outcome) => outcome,
            Err(Aborted) => Outcome::Aborted,
        }
    }

    fn try_step(&mut self, primitive: &Primitive) -> Maneuver<Outcome> {
        self.robot.check_abort()?;

        match primitive {
            Primitive::Forward {
                count,
                timeout_ms,
                speed,
                stop_on_cross,
            } => {
                let defaults = self.robot.default_follow();
                let request = FollowRequest {
                    timeout_ms: timeout_ms.unwrap_or(defaults.timeout_ms),
                    speed: speed.unwrap_or(defaults.speed),
                    stop_on_cross: stop_on_cross.unwrap_or(defaults.stop_on_cross),
                };
                for _ in 0..*count {
                    self.robot.forward(request)?;
                    self.state.pose.advance();
                    self.log.push(ActionTag::Forward, self.run);
                }
            }
            Primitive::TurnLeft { count } => self.turn(TurnKind::Left, *count)?,
            Primitive::TurnRight { count } => self.turn(TurnKind::Right, *count)?,
            Primitive::TurnBack { count } => self.turn(TurnKind::Back, *count)?,
            Primitive::Collect { count, color } => {
                let enforce_gate = self.robot.config().run.enforce_collect_gate;
                for _ in 0..*count {
                    self.log.push(ActionTag::Collect { color: *color }, self.run);
                    match self.state.collect_one(*color, enforce_gate) {
                        Take::Forbidden => {
                            log::warn!(
                                "[route] Tile {:?} may not be collected from",
                                self.state.pose.tile()
                            );
                            self.robot.signal_defeat();
                            return Ok(Outcome::Defeat);
                        }
                        Take::Empty => log::debug!(
                            "[route] No {} token at {:?}",
                            color,
                            self.state.pose.tile()
                        ),
                        Take::Taken => {}
                    }
                }
                self.robot.collect_feedback(*count)?;
            }
            Primitive::StartSound => self.robot.start_sound()?,
            Primitive::FinishSound => self.robot.finish_sound()?,
            Primitive::WhenToken { color, then } => {
                if self.state.tile_has(*color) {
                    return Ok(self.run_steps(then));
                }
            }
        }
        Ok(Outcome::Continue)
    }

    fn turn(&mut self, kind: TurnKind, count: u32) -> Maneuver<()> {
        for _ in 0..count {
            self.robot.turn(kind)?;
            self.state.pose.rotate(kind);
            self.log.push(turn_tag(kind), self.run);
        }
        Ok(())
    }
}
