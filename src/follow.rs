//! PD line following with crossing detection.
//!
//! One analog sensor rides the edge of the printed line. The follower
//! steers the reading toward the midpoint of the two thresholds and treats
//! a reading above the upper threshold as a grid crossing.

use std::time::Duration;

use crate::clock::Deadline;
use crate::config::FollowConfig;
use crate::drivers::{clamp_motor_speed, Cue, Platform, MAX_MOTOR_SPEED};
use crate::error::{Aborted, Maneuver};
use crate::line_sensor::{LineBand, LineClassifier};

// ─── PD corrector ────────────────────────────────────────────────────────────

/// Proportional-derivative steering correction.
///
/// `previous` is never reset between maneuvers: the derivative term on the
/// first tick of a new maneuver uses the last reading of the one before.
#[derive(Clone, Debug)]
pub struct PdCorrector {
    setpoint: i32,
    kp: f64,
    kd: f64,
    max_correction: i32,
    previous: i32,
}

impl PdCorrector {
    pub fn new(setpoint: i32, config: &FollowConfig) -> Self {
        Self {
            setpoint,
            kp: config.kp,
            kd: config.kd,
            max_correction: config.max_correction,
            previous: setpoint,
        }
    }

    /// Correction for `reading` given an explicit previous reading.
    /// Truncates toward zero, then clamps to ±max_correction.
    pub fn correction_from(&self, reading: i32, previous: i32) -> i32 {
        let error = (self.setpoint - reading) as f64;
        let derivative = (previous - reading) as f64;
        let raw = (self.kp * error + self.kd * derivative) as i32;
        raw.clamp(-self.max_correction, self.max_correction)
    }

    /// Correction for `reading`; remembers it for the next derivative.
    pub fn correct(&mut self, reading: i32) -> i32 {
        let correction = self.correction_from(reading, self.previous);
        self.previous = reading;
        correction
    }

    pub fn previous(&self) -> i32 {
        self.previous
    }

    pub fn setpoint(&self) -> i32 {
        self.setpoint
    }
}

/// Wheel commands for a base speed and a steering correction.
/// Positive correction steers counter-clockwise. Never drives backwards.
pub fn differential_speeds(speed: i32, correction: i32) -> (i32, i32) {
    (
        (speed - correction).clamp(0, MAX_MOTOR_SPEED),
        (speed + correction).clamp(0, MAX_MOTOR_SPEED),
    )
}

// ─── Crossing latch ──────────────────────────────────────────────────────────

/// Arms crossing detection only after the robot has left the crossing it
/// started on, so a maneuver never stops on the intersection it departs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CrossingLatch {
    stop_on_cross: bool,
    armed: bool,
}

impl CrossingLatch {
    pub fn new(stop_on_cross: bool, initial: LineBand) -> Self {
        Self {
            stop_on_cross,
            armed: !stop_on_cross || initial != LineBand::Above,
        }
    }

    pub fn observe(&mut self, band: LineBand) {
        if self.stop_on_cross && !self.armed && band != LineBand::Above {
            self.armed = true;
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn should_stop(&self, band: LineBand) -> bool {
        band == LineBand::Above && self.stop_on_cross && self.armed
    }
}

// ─── Maneuver ────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FollowRequest {
    pub timeout_ms: u64,
    pub speed: i32,
    pub stop_on_cross: bool,
}

impl FollowRequest {
    pub fn from_config(config: &FollowConfig) -> Self {
        Self {
            timeout_ms: config.default_timeout_ms,
            speed: config.cruise_speed,
            stop_on_cross: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FollowEnd {
    /// Stopped centered on a crossing.
    Crossing,
    /// Ran out of time. Still counts as success for the grid model.
    TimedOut,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FollowReport {
    pub end: FollowEnd,
    pub elapsed: Duration,
    pub ticks: u32,
}

impl FollowReport {
    pub fn timed_out(&self) -> bool {
        self.end == FollowEnd::TimedOut
    }
}

pub struct LineFollower {
    classifier: LineClassifier,
    pd: PdCorrector,
    config: FollowConfig,
}

impl LineFollower {
    pub fn new(classifier: LineClassifier, config: FollowConfig) -> Self {
        Self {
            pd: PdCorrector::new(classifier.setpoint(), &config),
            classifier,
            config,
        }
    }

    /// Follow the line until the next crossing or the deadline.
    pub fn run<P: Platform + ?Sized>(
        &mut self,
        platform: &mut P,
        request: FollowRequest,
    ) -> Maneuver<FollowReport> {
        let speed = clamp_motor_speed(request.speed);
        platform.cue(Cue::Forward);

        let start = platform.now();
        let deadline = Deadline::after_ms(start, request.timeout_ms);
        let initial = self.classifier.classify(platform.read_analog());
        let mut latch = CrossingLatch::new(request.stop_on_cross, initial);
        let mut end = FollowEnd::TimedOut;
        let mut ticks = 0u32;

        loop {
            if platform.abort_requested() {
                platform.stop_motors();
                return Err(Aborted);
            }
            if deadline.expired(platform.now()) {
                break;
            }
            ticks += 1;

            let reading = platform.read_analog();
            let band = self.classifier.classify(reading);
            latch.observe(band);

            if band == LineBand::Above {
                if latch.should_stop(band) {
                    if self.config.creep_ms > 0 {
                        let creep = speed.min(self.config.creep_speed);
                        platform.drive(creep, creep);
                        platform.sleep_ms(self.config.creep_ms);
                    }
                    platform.stop_motors();
                    platform.cue(Cue::Idle);
                    platform.sleep_ms(self.config.settle_after_creep_ms);
                    end = FollowEnd::Crossing;
                    break;
                }
                platform.drive(speed, speed);
                platform.sleep_ms(self.config.crossing_tick_ms);
                continue;
            }

            let correction = self.pd.correct(reading);
            let (left, right) = differential_speeds(speed, correction);
            platform.drive(left, right);
            platform.sleep_ms(self.config.tick_ms);
        }

        platform.stop_motors();
        platform.cue(Cue::Idle);
        platform.sleep_ms(self.config.settle_after_stop_ms);

        let elapsed = platform.now().saturating_sub(start);
        if end == FollowEnd::TimedOut {
            log::warn!(
                "[follow] No crossing within {}ms ({} ticks), stopping anyway",
                request.timeout_ms,
                ticks
            );
        } else {
            log::debug!("[follow] Crossing reached after {:?} ({} ticks)", elapsed, ticks);
        }

        Ok(FollowReport {
            end,
            elapsed,
            ticks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::config::LineConfig;
    use crate::sim::{SimConfig, SimPlatform};

    fn corrector() -> PdCorrector {
        PdCorrector::new(511, &FollowConfig::default())
    }

    fn follower() -> LineFollower {
        LineFollower::new(
            LineClassifier::new(&LineConfig::default()),
            FollowConfig::default(),
        )
    }

    #[test]
    fn test_correction_symmetry_without_derivative() {
        let pd = corrector();
        for e in 0..=600 {
            let high = 511 + e;
            let low = 511 - e;
            assert_eq!(
                pd.correction_from(high, high),
                -pd.correction_from(low, low),
                "asymmetric at e={}",
                e
            );
        }
    }

    #[test]
    fn test_correction_is_clamped() {
        let pd = corrector();
        for reading in (-5000..5000).step_by(37) {
            for previous in [-5000, 0, 511, 1023, 5000] {
                let c = pd.correction_from(reading, previous);
                assert!((-70..=70).contains(&c), "{} escaped clamp", c);
            }
        }
        assert_eq!(pd.correction_from(0, 511), 70);
        assert_eq!(pd.correction_from(1023, 511), -70);
    }

    #[test]
    fn test_correction_truncates_and_remembers() {
        let mut pd = corrector();
        // 0.12 * 11 + 0.06 * 11 = 1.98 -> 1
        assert_eq!(pd.correct(500), 1);
        assert_eq!(pd.previous(), 500);
        // 0.12 * 11 + 0.06 * 0 = 1.32 -> 1
        assert_eq!(pd.correct(500), 1);
        // 0.12 * -89 + 0.06 * -100 = -16.68 -> -16
        assert_eq!(pd.correct(600), -16);
    }

    #[test]
    fn test_differential_speeds_never_reverse() {
        assert_eq!(differential_speeds(110, 0), (110, 110));
        assert_eq!(differential_speeds(110, 70), (40, 180));
        assert_eq!(differential_speeds(50, -70), (120, 0));
        assert_eq!(differential_speeds(250, 70), (180, 255));
    }

    #[test]
    fn test_latch_starting_on_crossing() {
        let mut latch = CrossingLatch::new(true, LineBand::Above);
        assert!(!latch.is_armed());
        assert!(!latch.should_stop(LineBand::Above));

        latch.observe(LineBand::Above);
        assert!(!latch.is_armed());

        latch.observe(LineBand::Below);
        assert!(latch.is_armed());
        assert!(latch.should_stop(LineBand::Above));
    }

    #[test]
    fn test_latch_line_band_also_arms() {
        let mut latch = CrossingLatch::new(true, LineBand::Above);
        latch.observe(LineBand::LineBand);
        assert!(latch.is_armed());
    }

    #[test]
    fn test_latch_starting_off_crossing() {
        for initial in [LineBand::LineBand, LineBand::Below] {
            let latch = CrossingLatch::new(true, initial);
            assert!(latch.is_armed());
            assert!(latch.should_stop(LineBand::Above));
        }
    }

    #[test]
    fn test_latch_without_stop_never_stops() {
        let latch = CrossingLatch::new(false, LineBand::Above);
        assert!(latch.is_armed());
        assert!(!latch.should_stop(LineBand::Above));
    }

    #[test]
    fn test_follow_stops_centered_on_next_crossing() {
        let mut sim = SimPlatform::new(SimConfig::default());
        let mut follower = follower();

        let report = follower
            .run(&mut sim, FollowRequest::from_config(&FollowConfig::default()))
            .unwrap();

        assert_eq!(report.end, FollowEnd::Crossing);
        let (x, y, _) = sim.true_pose();
        assert!((x - 1.0).abs() < 0.1, "stopped at x={}", x);
        assert!(y.abs() < 0.05);
        assert_eq!(sim.motor_speeds(), (0, 0));
    }

    #[test]
    fn test_follow_departs_the_crossing_it_starts_on() {
        let mut sim = SimPlatform::new(SimConfig::default());
        // Sensor sits right on the crossing at x = 1.
        sim.place(0.76, 0.0, 0.0);
        let mut follower = follower();

        let report = follower
            .run(&mut sim, FollowRequest::from_config(&FollowConfig::default()))
            .unwrap();

        assert_eq!(report.end, FollowEnd::Crossing);
        assert!((sim.true_pose().0 - 2.0).abs() < 0.1);
    }

    #[test]
    fn test_follow_timeout_still_succeeds() {
        let mut sim = SimPlatform::new(SimConfig::default());
        let mut follower = follower();
        let request = FollowRequest {
            timeout_ms: 200,
            ..FollowRequest::from_config(&FollowConfig::default())
        };

        let report = follower.run(&mut sim, request).unwrap();

        assert!(report.timed_out());
        assert!(report.elapsed >= Duration::from_millis(200));
        assert!(report.elapsed < Duration::from_millis(400));
        assert_eq!(sim.motor_speeds(), (0, 0));
    }

    #[test]
    fn test_follow_without_stop_drives_through_crossings() {
        let mut sim = SimPlatform::new(SimConfig::default());
        let mut follower = follower();
        let request = FollowRequest {
            timeout_ms: 3000,
            speed: 110,
            stop_on_cross: false,
        };

        let report = follower.run(&mut sim, request).unwrap();

        assert!(report.timed_out());
        assert!(sim.true_pose().0 > 1.5);
    }

    #[test]
    fn test_follow_abort_stops_motors() {
        let mut sim = SimPlatform::new(SimConfig {
            abort_at_ms: Some(300),
            ..SimConfig::default()
        });
        let mut follower = follower();

        let result = follower.run(&mut sim, FollowRequest::from_config(&FollowConfig::default()));

        assert_eq!(result, Err(Aborted));
        assert_eq!(sim.motor_speeds(), (0, 0));
        assert!(sim.now() < Duration::from_millis(400));
    }
}
