//! Tunable constants for the motion engine and the run lifecycle.
//!
//! Every section falls back to the values the robot was tuned with, so a
//! config file only needs the keys it changes.

use crate::error::{Result, RunnerError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub line: LineConfig,
    pub heading: HeadingConfig,
    pub follow: FollowConfig,
    pub turn: TurnConfig,
    pub run: RunConfig,
    pub report: ReportConfig,
}

/// Line sensor thresholds. `above` must be greater than `normal`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    pub above_threshold: i32,
    pub normal_threshold: i32,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            above_threshold: 941,
            normal_threshold: 81,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingConfig {
    /// Settle time after waking the IMU, before sampling.
    pub warmup_ms: u64,
    pub calibration_samples: u32,
    pub sample_interval_ms: u64,
}

impl Default for HeadingConfig {
    fn default() -> Self {
        Self {
            warmup_ms: 100,
            calibration_samples: 20,
            sample_interval_ms: 10,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowConfig {
    // ── PD corrector ──
    pub kp: f64,
    pub kd: f64,
    pub max_correction: i32,

    // ── Speeds ──
    pub cruise_speed: i32,
    pub creep_speed: i32,

    // ── Timing ──
    pub default_timeout_ms: u64,
    pub tick_ms: u64,
    pub crossing_tick_ms: u64,
    pub creep_ms: u64,
    pub settle_after_creep_ms: u64,
    pub settle_after_stop_ms: u64,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            kp: 0.12,
            kd: 0.06,
            max_correction: 70,
            cruise_speed: 110,
            creep_speed: 80,
            default_timeout_ms: 3000,
            tick_ms: 10,
            crossing_tick_ms: 120,
            creep_ms: 500,
            settle_after_creep_ms: 60,
            settle_after_stop_ms: 80,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    // ── Phase 1: inertial ──
    /// Extra degrees added beyond the nominal 90/180 in the turn direction.
    pub overshoot_deg: f64,
    pub turn_speed: i32,
    pub mid_speed: i32,
    pub min_speed: i32,
    pub coarse_band_deg: f64,
    pub fine_band_deg: f64,
    pub tolerance_deg: f64,
    pub inertial_timeout_ms: u64,
    pub inertial_tick_ms: u64,

    // ── Phase 2: seek ──
    pub seek_speed: i32,
    pub seek_timeout_ms: u64,
    pub seek_tick_ms: u64,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            overshoot_deg: 8.0,
            turn_speed: 110,
            mid_speed: 75,
            min_speed: 60,
            coarse_band_deg: 30.0,
            fine_band_deg: 15.0,
            tolerance_deg: 5.0,
            inertial_timeout_ms: 3000,
            inertial_tick_ms: 10,
            seek_speed: 110,
            seek_timeout_ms: 1500,
            seek_tick_ms: 8,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// End the run in defeat when collecting on a tile marked not collectable.
    pub enforce_collect_gate: bool,
    pub action_log_capacity: usize,
    pub ready_pause_ms: u64,
    pub reset_pause_ms: u64,
    pub alert_pause_ms: u64,
    pub collect_cue_ms: u64,
    pub collect_settle_ms: u64,
    pub sound_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            enforce_collect_gate: true,
            action_log_capacity: 64,
            ready_pause_ms: 500,
            reset_pause_ms: 100,
            alert_pause_ms: 500,
            collect_cue_ms: 300,
            collect_settle_ms: 100,
            sound_ms: 500,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Room identifier sent along with the action log.
    pub room: String,
    pub http_timeout_secs: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            room: "default".to_string(),
            http_timeout_secs: 10,
        }
    }
}

impl RunnerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: RunnerConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.line.above_threshold <= self.line.normal_threshold {
            return Err(RunnerError::Config(format!(
                "above_threshold ({}) must exceed normal_threshold ({})",
                self.line.above_threshold, self.line.normal_threshold
            )));
        }
        if self.follow.max_correction < 0 {
            return Err(RunnerError::Config(
                "max_correction must not be negative".to_string(),
            ));
        }
        if self.heading.calibration_samples == 0 {
            return Err(RunnerError::Config(
                "calibration_samples must be at least 1".to_string(),
            ));
        }
        for (name, tick) in [
            ("follow.tick_ms", self.follow.tick_ms),
            ("follow.crossing_tick_ms", self.follow.crossing_tick_ms),
            ("turn.inertial_tick_ms", self.turn.inertial_tick_ms),
            ("turn.seek_tick_ms", self.turn.seek_tick_ms),
        ] {
            if tick == 0 {
                return Err(RunnerError::Config(format!("{} must be at least 1", name)));
            }
        }
        if self.run.action_log_capacity == 0 {
            return Err(RunnerError::Config(
                "action_log_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
