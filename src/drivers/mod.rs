//! Hardware seams consumed by the motion engine.
//!
//! Each trait is the smallest surface the controllers need. Drivers fail
//! closed: a sensor that cannot be read reports a neutral value instead of
//! an error, so nothing in here returns `Result`.

pub mod abort;

pub use abort::{AbortChannel, AbortTrigger};

use crate::clock::Clock;
use serde::{Deserialize, Serialize};

/// Maximum magnitude accepted by the motor bridge.
pub const MAX_MOTOR_SPEED: i32 = 255;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotorChannel {
    Left,
    Right,
}

/// Differential drive actuator.
pub trait MotorDriver {
    /// `speed` is signed, clamped to `[-255, 255]` by the implementation.
    fn set_channel_speed(&mut self, channel: MotorChannel, speed: i32);

    fn drive(&mut self, left: i32, right: i32) {
        self.set_channel_speed(MotorChannel::Left, left);
        self.set_channel_speed(MotorChannel::Right, right);
    }

    fn stop_motors(&mut self) {
        self.drive(0, 0);
    }
}

/// Z-axis rate gyro, degrees per second, counter-clockwise positive.
pub trait GyroDriver {
    /// Returns 0.0 on I/O failure.
    fn read_angular_velocity_z(&mut self) -> f64;
}

/// Single analog reflectance sensor looking at the floor.
pub trait LineSensorDriver {
    fn read_analog(&mut self) -> i32;
}

/// Discrete display cues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cue {
    Idle,
    Ready,
    Forward,
    TurnLeft,
    TurnRight,
    Success,
    Failure,
    Alert,
    Clear,
}

/// Short sounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tone {
    Collect,
    PowerUp,
    PowerDown,
}

/// Display and buzzer. Fire-and-forget.
pub trait FeedbackDriver {
    fn cue(&mut self, cue: Cue);
    fn tone(&mut self, tone: Tone);
}

/// Externally polled stop button.
pub trait AbortSignal {
    fn abort_requested(&mut self) -> bool;

    /// Drop any trigger that arrived while nobody was polling.
    fn clear_abort(&mut self) {}
}

/// Everything the robot talks to.
pub trait Platform:
    Clock + MotorDriver + GyroDriver + LineSensorDriver + FeedbackDriver + AbortSignal
{
}

impl<T> Platform for T where
    T: Clock + MotorDriver + GyroDriver + LineSensorDriver + FeedbackDriver + AbortSignal
{
}

pub fn clamp_motor_speed(speed: i32) -> i32 {
    speed.clamp(-MAX_MOTOR_SPEED, MAX_MOTOR_SPEED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingMotors {
        commands: Vec<(MotorChannel, i32)>,
    }

    impl MotorDriver for RecordingMotors {
        fn set_channel_speed(&mut self, channel: MotorChannel, speed: i32) {
            self.commands.push((channel, clamp_motor_speed(speed)));
        }
    }

    #[test]
    fn test_drive_sets_both_channels() {
        let mut motors = RecordingMotors::default();
        motors.drive(-300, 120);
        motors.stop_motors();

        assert_eq!(
            motors.commands,
            vec![
                (MotorChannel::Left, -255),
                (MotorChannel::Right, 120),
                (MotorChannel::Left, 0),
                (MotorChannel::Right, 0),
            ]
        );
    }
}
