//! Unit types for physical quantities.
//!
//! Provides type-safe representations of distances, feed rates,
//! accelerations, and motor steps to prevent unit confusion at compile
//! time. Machine coordinates are millimeters; feed rates are programmed
//! in mm/min (the conventional machine unit) and converted to mm/s for
//! all internal velocity math.

use core::ops::{Add, Mul, Sub};

use serde::Deserialize;

/// Linear position in millimeters.
///
/// Used for configuration and the user-facing API. Internally converted
/// to [`Steps`] per axis.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct Millimeters(pub f32);

impl Millimeters {
    /// Create a new Millimeters value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }
}

impl Add for Millimeters {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Millimeters {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

/// Feed rate in millimeters per minute.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct MmPerMin(pub f32);

impl MmPerMin {
    /// Create a new MmPerMin value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }

    /// Convert to mm/s for internal velocity math.
    #[inline]
    pub fn to_mm_per_sec(self) -> f32 {
        self.0 / 60.0
    }
}

impl Mul<f32> for MmPerMin {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self(self.0 * rhs)
    }
}

/// Linear acceleration in millimeters per second squared.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct MmPerSec2(pub f32);

impl MmPerSec2 {
    /// Create a new MmPerSec2 value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }
}

impl Mul<f32> for MmPerSec2 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self(self.0 * rhs)
    }
}

/// Axis position in motor steps (absolute from machine origin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Steps(pub i32);

impl Steps {
    /// Create a new Steps value.
    #[inline]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Get absolute value as u32.
    #[inline]
    pub fn abs(self) -> u32 {
        self.0.unsigned_abs()
    }

    /// Convert to millimeters using a steps-per-mm scale factor.
    #[inline]
    pub fn to_mm(self, steps_per_mm: f32) -> Millimeters {
        Millimeters(self.0 as f32 / steps_per_mm)
    }

    /// Create from millimeters using a steps-per-mm scale factor.
    ///
    /// Rounds to the nearest whole step so repeated conversions do not
    /// drift.
    #[inline]
    pub fn from_mm(mm: Millimeters, steps_per_mm: f32) -> Self {
        Self(round_f32(mm.0 * steps_per_mm))
    }
}

impl Add for Steps {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Steps {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

/// Round to nearest integer, halves away from zero (no_std safe).
#[inline]
pub(crate) fn round_f32(value: f32) -> i32 {
    if value >= 0.0 {
        (value + 0.5) as i32
    } else {
        (value - 0.5) as i32
    }
}
