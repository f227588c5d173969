//! Two-phase turn: gyro-driven rotation, then spin until the line is back.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::Deadline;
use crate::config::TurnConfig;
use crate::drivers::{Cue, Platform};
use crate::error::{Aborted, Maneuver};
use crate::heading::{heading_error, normalize_heading, HeadingEstimator};
use crate::line_sensor::LineClassifier;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnKind {
    Left,
    Right,
    Back,
}

impl TurnKind {
    /// Nominal rotation, degrees, counter-clockwise positive.
    pub fn nominal_deg(self) -> f64 {
        match self {
            TurnKind::Left => 90.0,
            TurnKind::Right => -90.0,
            TurnKind::Back => 180.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpinDirection {
    CounterClockwise,
    Clockwise,
}

impl SpinDirection {
    /// (left, right) wheel commands for an in-place spin.
    pub fn wheel_speeds(self, speed: i32) -> (i32, i32) {
        match self {
            SpinDirection::CounterClockwise => (-speed, speed),
            SpinDirection::Clockwise => (speed, -speed),
        }
    }

    fn cue(self) -> Cue {
        match self {
            SpinDirection::CounterClockwise => Cue::TurnLeft,
            SpinDirection::Clockwise => Cue::TurnRight,
        }
    }
}

/// Which way to spin from `current` to reach `target`.
///
/// Sign of `((target - current + 540) mod 360) - 180`; an exact zero (or a
/// target straight behind) spins clockwise.
pub fn turn_direction(target: f64, current: f64) -> SpinDirection {
    let delta = (target - current + 540.0).rem_euclid(360.0) - 180.0;
    if delta > 0.0 {
        SpinDirection::CounterClockwise
    } else {
        SpinDirection::Clockwise
    }
}

/// Commanded heading for the gyro phase: the nominal rotation cut short by
/// `overshoot` degrees, leaving the seek phase to spin onto the line.
pub fn turn_target(current: f64, nominal: f64, overshoot: f64) -> f64 {
    normalize_heading(current + nominal - nominal.signum() * overshoot)
}

/// Spin speed for the remaining error: fast far out, slow near the target.
pub fn inertial_speed(abs_error: f64, config: &TurnConfig) -> i32 {
    if abs_error > config.coarse_band_deg {
        config.turn_speed
    } else if abs_error > config.fine_band_deg {
        config.mid_speed
    } else {
        config.min_speed
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TurnReport {
    pub kind: TurnKind,
    pub target_deg: f64,
    /// Heading committed to the estimator after both phases.
    pub heading_deg: f64,
    pub settled: bool,
    pub line_found: bool,
    pub elapsed: Duration,
}

pub struct TurnController {
    classifier: LineClassifier,
    config: TurnConfig,
}

impl TurnController {
    pub fn new(classifier: LineClassifier, config: TurnConfig) -> Self {
        Self { classifier, config }
    }

    pub fn run<P: Platform + ?Sized>(
        &mut self,
        platform: &mut P,
        heading: &mut HeadingEstimator,
        kind: TurnKind,
    ) -> Maneuver<TurnReport> {
        let start = platform.now();
        let current = heading.heading();
        let target = turn_target(current, kind.nominal_deg(), self.config.overshoot_deg);
        let direction = turn_direction(target, current);
        platform.cue(direction.cue());
        log::debug!(
            "[turn] {:?}: heading {:.1} -> target {:.1} ({:?})",
            kind,
            current,
            target,
            direction
        );

        // Phase 1: rotate on the gyro alone.
        let deadline = Deadline::after_ms(start, self.config.inertial_timeout_ms);
        let mut angle = current;
        let mut last = start;
        let mut settled = false;
        loop {
            if platform.abort_requested() {
                platform.stop_motors();
                return Err(Aborted);
            }
            let now = platform.now();
            let dt = now.saturating_sub(last).as_secs_f64();
            angle = HeadingEstimator::integrate(angle, heading.sample(platform), dt);
            last = now;

            let error = heading_error(target, angle);
            if error.abs() < self.config.tolerance_deg {
                settled = true;
                break;
            }

            let (left, right) = direction.wheel_speeds(inertial_speed(error.abs(), &self.config));
            platform.drive(left, right);

            if deadline.expired(now) {
                break;
            }
            platform.sleep_ms(self.config.inertial_tick_ms);
        }
        platform.stop_motors();
        if !settled {
            log::warn!(
                "[turn] {:?} did not settle within {}ms (heading {:.1}, target {:.1})",
                kind,
                self.config.inertial_timeout_ms,
                angle,
                target
            );
        }

        // Phase 2: keep spinning the same way until the sensor is back on the line.
        let seek_start = platform.now();
        let seek_deadline = Deadline::after_ms(seek_start, self.config.seek_timeout_ms);
        let (left, right) = direction.wheel_speeds(self.config.seek_speed);
        platform.drive(left, right);
        let mut line_found = false;
        while seek_deadline.remaining(platform.now()) > Duration::ZERO {
            if platform.abort_requested() {
                platform.stop_motors();
                return Err(Aborted);
            }
            let now = platform.now();
            let dt = now.saturating_sub(last).as_secs_f64();
            angle = HeadingEstimator::integrate(angle, heading.sample(platform), dt);
            last = now;

            if self.classifier.is_on_line(platform.read_analog()) {
                line_found = true;
                break;
            }
            platform.sleep_ms(self.config.seek_tick_ms);
        }
        platform.stop_motors();
        platform.cue(Cue::Idle);
        if !line_found {
            log::warn!(
                "[turn] Line not re-acquired within {}ms",
                self.config.seek_timeout_ms
            );
        }

        heading.set_heading(angle);
        Ok(TurnReport {
            kind,
            target_deg: target,
            heading_deg: heading.heading(),
            settled,
            line_found,
            elapsed: platform.now().saturating_sub(start),
        })
    }
}
