// sim.rs: kinematic stand-in for the robot hardware
//
// A differential-drive body on an unbounded grid of printed lines, one line
// per integer x and y (tile units). The reflectance sensor sits a fixed
// distance ahead of the wheel axis. Time is virtual: `sleep()` advances the
// physics instead of blocking, so the whole engine runs in microseconds
// under test. `realtime` additionally paces the simulation to the wall clock.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::drivers::{
    clamp_motor_speed, AbortChannel, AbortSignal, Cue, FeedbackDriver, GyroDriver,
    LineSensorDriver, MotorChannel, MotorDriver, Tone,
};
use crate::heading::normalize_heading;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // ── Kinematics ──
    /// Yaw rate per unit of (right - left) motor command, deg/s.
    pub yaw_gain: f64,
    /// Forward speed per unit of mean motor command, tiles/s.
    pub speed_gain: f64,
    /// Sensor distance ahead of the wheel axis, tiles.
    pub sensor_offset: f64,

    // ── Line sensor model ──
    pub crossing_radius: f64,
    pub capture_deg: f64,
    pub line_center: i32,
    pub line_gain_per_deg: f64,
    pub crossing_reading: i32,
    pub floor_reading: i32,

    // ── Gyro model ──
    pub gyro_bias_dps: f64,
    pub gyro_noise_dps: f64,

    // ── Scripted events ──
    pub abort_at_ms: Option<u64>,
    pub realtime: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            yaw_gain: 0.9,
            speed_gain: 0.006,
            sensor_offset: 0.24,
            crossing_radius: 0.05,
            capture_deg: 15.0,
            line_center: 511,
            line_gain_per_deg: 15.0,
            crossing_reading: 990,
            floor_reading: 30,
            gyro_bias_dps: 0.4,
            gyro_noise_dps: 0.05,
            abort_at_ms: None,
            realtime: false,
        }
    }
}

const PHYSICS_STEP: Duration = Duration::from_millis(1);

/// Simulated robot implementing every driver trait.
pub struct SimPlatform {
    config: SimConfig,
    now: Duration,

    // Body state: wheel-axis center in tiles, heading in degrees (CCW+).
    x: f64,
    y: f64,
    heading_deg: f64,
    left: i32,
    right: i32,

    gyro_reads: u64,
    abort_fired: bool,
    abort_channel: Option<AbortChannel>,

    cues: Vec<Cue>,
    tones: Vec<Tone>,
}

impl SimPlatform {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            now: Duration::ZERO,
            x: 0.0,
            y: 0.0,
            heading_deg: 0.0,
            left: 0,
            right: 0,
            gyro_reads: 0,
            abort_fired: false,
            abort_channel: None,
            cues: Vec::new(),
            tones: Vec::new(),
        }
    }

    /// Also poll an external abort channel (Ctrl-C, other threads).
    pub fn with_abort_channel(mut self, channel: AbortChannel) -> Self {
        self.abort_channel = Some(channel);
        self
    }

    /// Ground-truth body pose: (x, y, heading_deg).
    pub fn true_pose(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.heading_deg)
    }

    pub fn motor_speeds(&self) -> (i32, i32) {
        (self.left, self.right)
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn tones(&self) -> &[Tone] {
        &self.tones
    }

    /// Move the body, e.g. to start a test somewhere other than the origin.
    pub fn place(&mut self, x: f64, y: f64, heading_deg: f64) {
        self.x = x;
        self.y = y;
        self.heading_deg = normalize_heading(heading_deg);
    }

    fn yaw_rate(&self) -> f64 {
        (self.right - self.left) as f64 * self.config.yaw_gain
    }

    fn step(&mut self, dt: f64) {
        let v = (self.left + self.right) as f64 / 2.0 * self.config.speed_gain;
        let rad = self.heading_deg.to_radians();
        self.x += v * rad.cos() * dt;
        self.y += v * rad.sin() * dt;
        self.heading_deg = normalize_heading(self.heading_deg + self.yaw_rate() * dt);
    }

    fn sensor_position(&self) -> (f64, f64) {
        let rad = self.heading_deg.to_radians();
        (
            self.x + self.config.sensor_offset * rad.cos(),
            self.y + self.config.sensor_offset * rad.sin(),
        )
    }

    /// Degrees off the nearest grid axis, in [-45, 45].
    fn axis_offset(&self) -> f64 {
        let nearest = (self.heading_deg / 90.0).round() * 90.0;
        normalize_heading(self.heading_deg - nearest)
    }

    fn jitter(&self, seed: u64, amplitude: f64) -> f64 {
        (seed as f64 * 0.7).sin() * amplitude
    }
}

impl Clock for SimPlatform {
    fn now(&self) -> Duration {
        self.now
    }

    fn sleep(&mut self, duration: Duration) {
        let mut remaining = duration;
        while remaining > Duration::ZERO {
            let step = remaining.min(PHYSICS_STEP);
            self.step(step.as_secs_f64());
            self.now += step;
            remaining -= step;
        }
        if self.config.realtime {
            std::thread::sleep(duration);
        }
    }
}

impl MotorDriver for SimPlatform {
    fn set_channel_speed(&mut self, channel: MotorChannel, speed: i32) {
        let speed = clamp_motor_speed(speed);
        match channel {
            MotorChannel::Left => self.left = speed,
            MotorChannel::Right => self.right = speed,
        }
    }
}

impl GyroDriver for SimPlatform {
    fn read_angular_velocity_z(&mut self) -> f64 {
        self.gyro_reads += 1;
        self.yaw_rate()
            + self.config.gyro_bias_dps
            + self.jitter(self.gyro_reads, self.config.gyro_noise_dps)
    }
}

impl LineSensorDriver for SimPlatform {
    fn read_analog(&mut self) -> i32 {
        let (sx, sy) = self.sensor_position();
        let dx = sx - sx.round();
        let dy = sy - sy.round();
        if dx.hypot(dy) < self.config.crossing_radius {
            return self.config.crossing_reading;
        }

        let offset = self.axis_offset();
        if offset.abs() > self.config.capture_deg {
            return self.config.floor_reading;
        }
        self.config.line_center + (offset * self.config.line_gain_per_deg).round() as i32
    }
}

impl FeedbackDriver for SimPlatform {
    fn cue(&mut self, cue: Cue) {
        log::debug!("[sim] cue {:?}", cue);
        self.cues.push(cue);
    }

    fn tone(&mut self, tone: Tone) {
        log::debug!("[sim] tone {:?}", tone);
        self.tones.push(tone);
    }
}

impl AbortSignal for SimPlatform {
    fn abort_requested(&mut self) -> bool {
        if let Some(at) = self.config.abort_at_ms {
            if !self.abort_fired && self.now >= Duration::from_millis(at) {
                self.abort_fired = true;
                return true;
            }
        }
        self.abort_channel
            .as_mut()
            .map(|channel| channel.abort_requested())
            .unwrap_or(false)
    }

    fn clear_abort(&mut self) {
        if let Some(channel) = self.abort_channel.as_mut() {
            channel.clear_abort();
        }
    }
}
