//! Simulation time management

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

use crate::error::SimError;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Simulation time with nanosecond precision
///
/// SimTime represents a point in simulation time, stored as nanoseconds since
/// the simulation start. Model code works in abstract time units; one unit maps
/// to one second of `SimTime`. The value is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimTime(u64);

impl SimTime {
    /// Create a new SimTime at the simulation start (time zero)
    pub const fn zero() -> Self {
        SimTime(0)
    }

    /// Create a SimTime from nanoseconds
    pub const fn from_nanos(nanos: u64) -> Self {
        SimTime(nanos)
    }

    /// Create a SimTime from milliseconds
    pub const fn from_millis(millis: u64) -> Self {
        SimTime(millis * 1_000_000)
    }

    /// Create a SimTime from whole seconds (model time units)
    pub const fn from_secs(secs: u64) -> Self {
        SimTime(secs * 1_000_000_000)
    }

    /// Create a SimTime from a Duration
    pub fn from_duration(duration: Duration) -> Self {
        SimTime(duration.as_nanos().min(u64::MAX as u128) as u64)
    }

    /// Convert fractional seconds into a SimTime, rounded to the nearest
    /// nanosecond.
    ///
    /// This is the validation point for every delay supplied by model code:
    /// negative, NaN, infinite or overflowing inputs yield
    /// [`SimError::InvalidDuration`].
    ///
    /// ```
    /// # use queuesim_core::SimTime;
    /// let t = SimTime::try_from_secs_f64(1.5).unwrap();
    /// assert_eq!(t.as_nanos(), 1_500_000_000);
    /// assert!(SimTime::try_from_secs_f64(-0.1).is_err());
    /// ```
    pub fn try_from_secs_f64(secs: f64) -> Result<Self, SimError> {
        const MAX_SECS: f64 = (u64::MAX as f64) / NANOS_PER_SEC;
        if !secs.is_finite() || secs < 0.0 || secs > MAX_SECS {
            return Err(SimError::InvalidDuration { value: secs });
        }
        Ok(SimTime((secs * NANOS_PER_SEC).round() as u64))
    }

    /// Convert SimTime to a Duration
    pub fn as_duration(&self) -> Duration {
        Duration::from_nanos(self.0)
    }

    /// Get the raw nanosecond value
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Time since the simulation start in fractional seconds (model units)
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC
    }

    /// Calculate the duration since another SimTime (zero if `earlier` is later)
    pub fn duration_since(&self, earlier: SimTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<SimTime> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> Self::Output {
        SimTime(self.0.saturating_add(rhs.0))
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> Self::Output {
        self + SimTime::from_duration(rhs)
    }
}

impl Sub<SimTime> for SimTime {
    type Output = Duration;

    fn sub(self, rhs: SimTime) -> Self::Output {
        self.duration_since(rhs)
    }
}

impl Default for SimTime {
    fn default() -> Self {
        SimTime::zero()
    }
}

impl TryFrom<f64> for SimTime {
    type Error = SimError;

    fn try_from(secs: f64) -> Result<Self, Self::Error> {
        SimTime::try_from_secs_f64(secs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let duration = self.as_duration();
        let secs = duration.as_secs();
        let millis = duration.subsec_millis();
        let micros = duration.subsec_micros() % 1000;
        let nanos = duration.subsec_nanos() % 1000;

        if secs > 0 {
            write!(f, "{secs}.{millis:03}s")
        } else if millis > 0 {
            write!(f, "{millis}.{micros:03}ms")
        } else if micros > 0 {
            write!(f, "{micros}.{nanos:03}µs")
        } else {
            write!(f, "{nanos}ns")
        }
    }
}
