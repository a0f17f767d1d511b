//! Exact simulated time.
//!
//! [`SimTime`] is a point on the simulated time axis in seconds, kept as an
//! exact fraction so that clocks of unrelated frequencies interleave without
//! rounding.

use hlim_common::ClockRational;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// A point in simulated time, in seconds since power-on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SimTime(ClockRational);

impl SimTime {
    /// Power-on.
    pub const ZERO: SimTime = SimTime(ClockRational::ZERO);

    /// Creates a time from seconds.
    pub fn from_seconds(seconds: ClockRational) -> Self {
        Self(seconds)
    }

    /// Creates a time from whole nanoseconds.
    pub fn from_ns(ns: u64) -> Self {
        Self(ClockRational::new(i128::from(ns), 1_000_000_000))
    }

    /// Creates a time from whole microseconds.
    pub fn from_us(us: u64) -> Self {
        Self(ClockRational::new(i128::from(us), 1_000_000))
    }

    /// Creates a time from whole picoseconds.
    pub fn from_ps(ps: u64) -> Self {
        Self(ClockRational::new(i128::from(ps), 1_000_000_000_000))
    }

    /// The time in seconds.
    pub fn seconds(&self) -> ClockRational {
        self.0
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 + rhs.0)
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 - rhs.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_zero() {
            return write!(f, "0 ns");
        }
        for (unit, scale) in [("ns", 1_000_000_000), ("ps", 1_000_000_000_000), ("fs", 1_000_000_000_000_000)] {
            let scaled = self.0 * ClockRational::from_integer(scale);
            if scaled.denom() == 1 {
                return write!(f, "{} {unit}", scaled.numer());
            }
        }
        write!(f, "{} s", self.0)
    }
}
