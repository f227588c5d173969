use crate::config::LineConfig;
use serde::{Deserialize, Serialize};

/// Where a reflectance reading falls relative to the two thresholds.
///
/// `Above` is a crossing. `LineBand` and `Below` are both steered by the
/// same PD branch; the split only says which side of the line edge we are on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineBand {
    Above,
    LineBand,
    Below,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineClassifier {
    above: i32,
    normal: i32,
}

impl LineClassifier {
    pub fn new(config: &LineConfig) -> Self {
        Self {
            above: config.above_threshold,
            normal: config.normal_threshold,
        }
    }

    pub fn classify(&self, reading: i32) -> LineBand {
        if reading > self.above {
            LineBand::Above
        } else if reading > self.normal {
            LineBand::LineBand
        } else {
            LineBand::Below
        }
    }

    /// Strictly between the thresholds: the sensor sits on the line edge.
    pub fn is_on_line(&self, reading: i32) -> bool {
        self.normal < reading && reading < self.above
    }

    /// Midpoint the line follower steers toward.
    pub fn setpoint(&self) -> i32 {
        (self.above + self.normal) / 2
    }
}
