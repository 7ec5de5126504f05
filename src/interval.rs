//! Half-open time intervals in source ticks.

use crate::ticks::{ticks_to_seconds, Ticks};
use serde::{Deserialize, Serialize};

/// `[start, end)` in a media item's own time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Interval {
    pub start: Ticks,
    pub end: Ticks,
}

impl Interval {
    /// Build an interval, swapping the bounds if they come reversed.
    pub fn new(a: Ticks, b: Ticks) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn len(&self) -> Ticks {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Grow by `pad` on both sides.
    pub fn expand(&self, pad: Ticks) -> Self {
        let pad = pad.max(0);
        Self {
            start: self.start.saturating_sub(pad),
            end: self.end.saturating_add(pad),
        }
    }

    /// Clip into `[0, duration)`; an unknown duration only bounds the start.
    pub fn clamp_to(&self, duration: Option<Ticks>) -> Self {
        let upper = duration.unwrap_or(Ticks::MAX).max(0);
        let start = self.start.clamp(0, upper);
        let end = self.end.clamp(start, upper);
        Self { start, end }
    }

    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Overlapping, touching, or separated by at most `tolerance`.
    pub fn is_near(&self, other: &Interval, tolerance: Ticks) -> bool {
        other.start <= self.end.saturating_add(tolerance)
            && self.start <= other.end.saturating_add(tolerance)
    }

    pub fn shift(&self, by: Ticks) -> Self {
        Self {
            start: self.start.saturating_add(by),
            end: self.end.saturating_add(by),
        }
    }

    pub fn to_seconds(&self) -> [f64; 2] {
        [ticks_to_seconds(self.start), ticks_to_seconds(self.end)]
    }
}

/// Sort and merge into the minimal covering set.
pub fn merge_intervals(intervals: &[Interval], tolerance: Ticks) -> Vec<Interval> {
    let mut sorted: Vec<Interval> = intervals.to_vec();
    sorted.sort();

    let mut merged: Vec<Interval> = Vec::with_capacity(sorted.len());
    for interval in sorted {
        match merged.last_mut() {
            Some(last) if last.is_near(&interval, tolerance) => {
                last.end = last.end.max(interval.end);
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// Smallest interval covering all of `intervals`.
pub fn bounding(intervals: &[Interval]) -> Option<Interval> {
    let start = intervals.iter().map(|i| i.start).min()?;
    let end = intervals.iter().map(|i| i.end).max()?;
    Some(Interval { start, end })
}
