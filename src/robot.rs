//! The robot as the route executor sees it: one platform, one heading
//! estimate, and the two maneuver controllers that share them.

use crate::config::RunnerConfig;
use crate::drivers::{Cue, Platform, Tone};
use crate::error::{Aborted, Maneuver};
use crate::follow::{FollowReport, FollowRequest, LineFollower};
use crate::heading::HeadingEstimator;
use crate::line_sensor::LineClassifier;
use crate::turn::{TurnController, TurnKind, TurnReport};

pub struct Robot<P: Platform> {
    platform: P,
    config: RunnerConfig,
    heading: HeadingEstimator,
    follower: LineFollower,
    turner: TurnController,
}

impl<P: Platform> Robot<P> {
    pub fn new(platform: P, config: RunnerConfig) -> Self {
        let classifier = LineClassifier::new(&config.line);
        Self {
            follower: LineFollower::new(classifier, config.follow.clone()),
            turner: TurnController::new(classifier, config.turn.clone()),
            heading: HeadingEstimator::new(),
            platform,
            config,
        }
    }

    /// Startup sequence: calibrate the gyro with the motors off, then show
    /// the ready cue.
    pub fn power_on(&mut self) {
        self.platform.stop_motors();
        self.heading.calibrate(&mut self.platform, &self.config.heading);
        self.platform.cue(Cue::Ready);
        self.platform.sleep_ms(self.config.run.ready_pause_ms);
    }

    pub fn check_abort(&mut self) -> Maneuver<()> {
        if self.platform.abort_requested() {
            self.platform.stop_motors();
            return Err(Aborted);
        }
        Ok(())
    }

    /// Follow request carrying the configured defaults.
    pub fn default_follow(&self) -> FollowRequest {
        FollowRequest::from_config(&self.config.follow)
    }

    pub fn forward(&mut self, request: FollowRequest) -> Maneuver<FollowReport> {
        self.follower.run(&mut self.platform, request)
    }

    pub fn turn(&mut self, kind: TurnKind) -> Maneuver<TurnReport> {
        self.turner.run(&mut self.platform, &mut self.heading, kind)
    }

    /// One collect tone per unit, then a short settle.
    pub fn collect_feedback(&mut self, units: u32) -> Maneuver<()> {
        for _ in 0..units {
            self.check_abort()?;
            self.platform.tone(Tone::Collect);
            self.platform.sleep_ms(self.config.run.collect_cue_ms);
        }
        self.platform.sleep_ms(self.config.run.collect_settle_ms);
        Ok(())
    }

    pub fn start_sound(&mut self) -> Maneuver<()> {
        self.play(Tone::PowerUp)
    }

    pub fn finish_sound(&mut self) -> Maneuver<()> {
        self.play(Tone::PowerDown)
    }

    fn play(&mut self, tone: Tone) -> Maneuver<()> {
        self.check_abort()?;
        self.platform.tone(tone);
        self.platform.sleep_ms(self.config.run.sound_ms);
        Ok(())
    }

    pub fn signal_defeat(&mut self) {
        self.platform.stop_motors();
        self.platform.cue(Cue::Failure);
        self.platform.tone(Tone::PowerDown);
    }

    pub fn show_outcome(&mut self, victory: bool) {
        self.platform.stop_motors();
        let cue = if victory { Cue::Success } else { Cue::Failure };
        self.platform.cue(cue);
    }

    /// Abort handling: motors off, heading zeroed, display cleared, alert.
    /// Pending triggers are dropped so the next run starts clean.
    pub fn hard_reset(&mut self) {
        self.platform.stop_motors();
        self.heading.reset();
        self.platform.cue(Cue::Clear);
        self.platform.sleep_ms(self.config.run.reset_pause_ms);
        self.platform.cue(Cue::Alert);
        self.platform.sleep_ms(self.config.run.alert_pause_ms);
        self.platform.clear_abort();
        log::info!("[robot] Reset after abort, heading zeroed");
    }

    pub fn heading(&self) -> f64 {
        self.heading.heading()
    }

    pub fn heading_estimator(&self) -> &HeadingEstimator {
        &self.heading
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::sim::{SimConfig, SimPlatform};
    use std::time::Duration;

    fn robot() -> Robot<SimPlatform> {
        Robot::new(SimPlatform::new(SimConfig::default()), RunnerConfig::default())
    }

    #[test]
    fn test_power_on_calibrates_and_signals_ready() {
        let mut robot = robot();
        robot.power_on();

        assert!(robot.heading_estimator().is_calibrated());
        assert!((robot.heading_estimator().bias() - 0.4).abs() < 0.1);
        assert_eq!(robot.platform().cues(), &[Cue::Ready]);
        assert_eq!(robot.platform().now(), Duration::from_millis(800));
    }

    #[test]
    fn test_collect_feedback_timing() {
        let mut robot = robot();
        robot.collect_feedback(3).unwrap();

        assert_eq!(robot.platform().tones(), &[Tone::Collect; 3]);
        assert_eq!(robot.platform().now(), Duration::from_millis(1000));
    }

    #[test]
    fn test_hard_reset_zeroes_heading() {
        let mut robot = robot();
        robot.power_on();
        robot.turn(TurnKind::Left).unwrap();
        assert!(robot.heading() > 60.0);

        robot.hard_reset();

        assert_eq!(robot.heading(), 0.0);
        assert_eq!(robot.platform().motor_speeds(), (0, 0));
        let cues = robot.platform().cues();
        assert_eq!(&cues[cues.len() - 2..], &[Cue::Clear, Cue::Alert]);
    }

    #[test]
    fn test_sound_checks_abort_first() {
        let mut robot = Robot::new(
            SimPlatform::new(SimConfig {
                abort_at_ms: Some(0),
                ..SimConfig::default()
            }),
            RunnerConfig::default(),
        );

        assert_eq!(robot.start_sound(), Err(Aborted));
        assert!(robot.platform().tones().is_empty());
        assert_eq!(robot.finish_sound(), Ok(()));
        assert_eq!(robot.platform().tones(), &[Tone::PowerDown]);
    }
}
