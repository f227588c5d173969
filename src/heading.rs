//! Gyro heading integration.

use crate::clock::Clock;
use crate::config::HeadingConfig;
use crate::drivers::GyroDriver;

/// Past this magnitude the angle is reduced with `rem_euclid` before stepping.
const STEP_LIMIT_DEG: f64 = 3600.0;

/// Wrap an angle into (-180, 180] by repeated ±360 steps.
///
/// Stepping instead of `rem_euclid` keeps a value that is already in range
/// bit-identical, so a heading sitting on the boundary never jumps a turn.
/// Far-out inputs are reduced first so the loops stay bounded.
pub fn normalize_heading(mut deg: f64) -> f64 {
    if !deg.is_finite() {
        return 0.0;
    }
    if deg.abs() > STEP_LIMIT_DEG {
        deg = deg.rem_euclid(360.0);
    }
    while deg > 180.0 {
        deg -= 360.0;
    }
    while deg <= -180.0 {
        deg += 360.0;
    }
    deg
}

/// Signed shortest rotation from `current` to `target`, in [-180, 180].
pub fn heading_error(target: f64, current: f64) -> f64 {
    let mut err = target - current;
    if err > 180.0 {
        err -= 360.0;
    } else if err < -180.0 {
        err += 360.0;
    }
    err
}

/// Heading state: integrated angle plus the gyro zero offset.
#[derive(Clone, Debug, Default)]
pub struct HeadingEstimator {
    heading_deg: f64,
    bias_dps: f64,
    calibrated: bool,
}

impl HeadingEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Average stationary samples into the gyro bias. Blocks for
    /// `warmup + samples * interval` (about 300ms with defaults).
    pub fn calibrate<S>(&mut self, sensor: &mut S, config: &HeadingConfig)
    where
        S: GyroDriver + Clock + ?Sized,
    {
        sensor.sleep_ms(config.warmup_ms);
        let samples = config.calibration_samples.max(1);
        let mut total = 0.0;
        for _ in 0..samples {
            total += sensor.read_angular_velocity_z();
            sensor.sleep_ms(config.sample_interval_ms);
        }
        self.bias_dps = total / samples as f64;
        self.calibrated = true;
        log::info!(
            "[heading] Calibrated gyro bias {:.3} deg/s ({} samples)",
            self.bias_dps,
            samples
        );
    }

    /// Bias-corrected angular velocity, deg/s.
    pub fn sample<G: GyroDriver + ?Sized>(&self, gyro: &mut G) -> f64 {
        gyro.read_angular_velocity_z() - self.bias_dps
    }

    /// Advance `from` by `rate * dt` and wrap. Pure; callers decide when to
    /// commit the result with [`set_heading`](Self::set_heading).
    pub fn integrate(from: f64, rate_dps: f64, dt_secs: f64) -> f64 {
        normalize_heading(from + rate_dps * dt_secs)
    }

    pub fn heading(&self) -> f64 {
        self.heading_deg
    }

    pub fn set_heading(&mut self, deg: f64) {
        self.heading_deg = normalize_heading(deg);
    }

    pub fn bias(&self) -> f64 {
        self.bias_dps
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Zero the heading. The bias survives: calibration only runs at startup.
    pub fn reset(&mut self) {
        self.heading_deg = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::time::Duration;

    /// Constant-rate gyro on a clock that only counts.
    struct StillGyro {
        rate: f64,
        now: Duration,
    }

    impl GyroDriver for StillGyro {
        fn read_angular_velocity_z(&mut self) -> f64 {
            self.rate
        }
    }

    impl Clock for StillGyro {
        fn now(&self) -> Duration {
            self.now
        }
        fn sleep(&mut self, duration: Duration) {
            self.now += duration;
        }
    }

    #[test]
    fn test_normalize_range() {
        assert_eq!(normalize_heading(180.0), 180.0);
        assert_eq!(normalize_heading(-180.0), 180.0);
        assert_eq!(normalize_heading(190.0), -170.0);
        assert_eq!(normalize_heading(-190.0), 170.0);
        assert_eq!(normalize_heading(720.0), 0.0);
        assert_eq!(normalize_heading(-540.0), 180.0);
        assert_eq!(normalize_heading(179.5), 179.5);
        assert_eq!(normalize_heading(f64::NAN), 0.0);
    }

    #[test]
    fn test_normalize_huge_finite_inputs() {
        for deg in [1.0e20, -1.0e20, f64::MAX, f64::MIN, 3600.0 * 1.0e9 + 90.0] {
            let wrapped = normalize_heading(deg);
            assert!(wrapped > -180.0 && wrapped <= 180.0, "{} -> {}", deg, wrapped);
        }
        assert_abs_diff_eq!(normalize_heading(36_000_090.0), 90.0, epsilon = 1e-6);
        assert_abs_diff_eq!(normalize_heading(-36_000_090.0), -90.0, epsilon = 1e-6);
    }

    #[test]
    fn test_normalize_composes_with_deltas() {
        let mut h = -725.0;
        while h <= 725.0 {
            let mut d = -400.0;
            while d <= 400.0 {
                let lhs = normalize_heading(normalize_heading(h) + d);
                let rhs = normalize_heading(h + d);
                assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-9);
                assert!(lhs > -180.0 && lhs <= 180.0, "{} out of range", lhs);
                d += 12.5;
            }
            h += 17.5;
        }
    }

    #[test]
    fn test_heading_error_takes_short_way() {
        assert_eq!(heading_error(170.0, -170.0), -20.0);
        assert_eq!(heading_error(-170.0, 170.0), 20.0);
        assert_eq!(heading_error(90.0, 0.0), 90.0);
        assert_eq!(heading_error(0.0, 90.0), -90.0);
    }

    #[test]
    fn test_calibration_removes_bias() {
        let mut gyro = StillGyro {
            rate: 0.75,
            now: Duration::ZERO,
        };
        let mut estimator = HeadingEstimator::new();

        estimator.calibrate(&mut gyro, &HeadingConfig::default());

        assert!(estimator.is_calibrated());
        assert_abs_diff_eq!(estimator.bias(), 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(estimator.sample(&mut gyro), 0.0, epsilon = 1e-12);
        assert_eq!(gyro.now, Duration::from_millis(300));
    }

    #[test]
    fn test_integrate_wraps_and_reset_zeroes() {
        let next = HeadingEstimator::integrate(175.0, 100.0, 0.1);
        assert_abs_diff_eq!(next, -175.0, epsilon = 1e-9);

        let mut estimator = HeadingEstimator::new();
        estimator.set_heading(next);
        estimator.reset();
        assert_eq!(estimator.heading(), 0.0);
    }
}
