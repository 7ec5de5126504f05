//! Project time units.
//!
//! Every time value in a project document is expressed in ticks, a fixed
//! fraction of a second. Frame rates are stored as ticks per frame.

use serde::{Deserialize, Serialize};

/// Ticks in one second.
pub const TICKS_PER_SECOND: i64 = 254_016_000_000;

/// Signed tick count.
pub type Ticks = i64;

pub fn ticks_to_seconds(ticks: Ticks) -> f64 {
    ticks as f64 / TICKS_PER_SECOND as f64
}

pub fn seconds_to_ticks(seconds: f64) -> Ticks {
    (seconds * TICKS_PER_SECOND as f64).round() as Ticks
}

/// Frame rate expressed as ticks per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRate {
    pub ticks_per_frame: Ticks,
}

impl FrameRate {
    /// 23.976 fps, used when a document does not declare a rate.
    pub const DEFAULT: FrameRate = FrameRate {
        ticks_per_frame: 10_594_584_000,
    };

    pub fn from_ticks_per_frame(ticks_per_frame: Ticks) -> Option<Self> {
        (ticks_per_frame > 0).then_some(Self { ticks_per_frame })
    }

    pub fn from_fps(fps: f64) -> Option<Self> {
        if fps.is_finite() && fps > 0.0 {
            Self::from_ticks_per_frame((TICKS_PER_SECOND as f64 / fps).round() as Ticks)
        } else {
            None
        }
    }

    pub fn fps(&self) -> f64 {
        TICKS_PER_SECOND as f64 / self.ticks_per_frame as f64
    }

    /// Duration of `frames` frames.
    pub fn frames_to_ticks(&self, frames: u32) -> Ticks {
        self.ticks_per_frame.saturating_mul(frames as Ticks)
    }

    /// Frame index containing `ticks`.
    pub fn ticks_to_frame(&self, ticks: Ticks) -> i64 {
        ticks.div_euclid(self.ticks_per_frame)
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}
