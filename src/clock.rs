use std::time::Duration;

/// Monotonic time source used by every control loop.
///
/// `now()` is the time since the clock was created. Loops compare it
/// against [`Deadline`]s instead of scheduling alarms.
pub trait Clock {
    fn now(&self) -> Duration;
    fn sleep(&mut self, duration: Duration);

    fn sleep_ms(&mut self, millis: u64) {
        self.sleep(Duration::from_millis(millis));
    }
}

/// Point in clock time after which a loop must give up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deadline {
    at: Duration,
}

impl Deadline {
    pub fn after(now: Duration, budget: Duration) -> Self {
        Self { at: now + budget }
    }

    pub fn after_ms(now: Duration, millis: u64) -> Self {
        Self::after(now, Duration::from_millis(millis))
    }

    /// Strictly past the deadline, matching `elapsed > timeout` checks.
    pub fn expired(&self, now: Duration) -> bool {
        now > self.at
    }

    pub fn remaining(&self, now: Duration) -> Duration {
        self.at.saturating_sub(now)
    }
}
