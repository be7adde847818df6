//! Per-axis configuration and derived kinematic limits.

use heapless::String;
use serde::Deserialize;

use super::units::{Millimeters, MmPerMin, MmPerSec2};

/// Soft travel limits for one axis, in machine coordinates.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TravelLimits {
    /// Minimum allowed position in millimeters.
    #[serde(rename = "min_mm")]
    pub min: Millimeters,

    /// Maximum allowed position in millimeters.
    #[serde(rename = "max_mm")]
    pub max: Millimeters,
}

impl TravelLimits {
    /// Check if limits are valid (min < max).
    pub fn is_valid(&self) -> bool {
        self.min.0 < self.max.0
    }

    /// Check if a position is within limits.
    pub fn contains(&self, position: Millimeters) -> bool {
        position.0 >= self.min.0 && position.0 <= self.max.0
    }
}

/// Complete configuration for one machine axis.
#[derive(Debug, Clone, Deserialize)]
pub struct AxisConfig {
    /// Human-readable name (max 16 chars), e.g. "X".
    pub name: String<16>,

    /// Step resolution in steps per millimeter of travel.
    pub steps_per_mm: f32,

    /// Maximum rate in millimeters per minute (rapid rate).
    #[serde(rename = "max_rate_mm_per_min")]
    pub max_rate: MmPerMin,

    /// Maximum acceleration in millimeters per second squared.
    #[serde(rename = "acceleration_mm_per_sec2")]
    pub acceleration: MmPerSec2,

    /// Invert direction pin logic.
    #[serde(default)]
    pub invert_direction: bool,

    /// Optional soft travel limits.
    #[serde(default)]
    pub travel: Option<TravelLimits>,
}

/// Derived per-axis kinematic parameters computed from configuration.
///
/// Computed once at initialization and used for all planning and step
/// generation.
#[derive(Debug, Clone, Copy)]
pub struct AxisKinematics {
    /// Step resolution in steps/mm.
    pub steps_per_mm: f32,

    /// Maximum rate in mm/s.
    pub max_rate_mm_per_sec: f32,

    /// Maximum acceleration in mm/s².
    pub acceleration_mm_per_sec2: f32,

    /// Invert direction pin logic.
    pub invert_direction: bool,

    /// Soft travel limits (if configured).
    pub travel: Option<TravelLimits>,
}

impl AxisKinematics {
    /// Compute derived kinematics from an axis configuration.
    pub fn from_config(config: &AxisConfig) -> Self {
        Self {
            steps_per_mm: config.steps_per_mm,
            max_rate_mm_per_sec: config.max_rate.to_mm_per_sec(),
            acceleration_mm_per_sec2: config.acceleration.0,
            invert_direction: config.invert_direction,
            travel: config.travel,
        }
    }

    /// Check a target position against the soft travel limits.
    ///
    /// Returns `false` if the axis has limits and the target falls
    /// outside them.
    #[inline]
    pub fn within_travel(&self, target: Millimeters) -> bool {
        match &self.travel {
            Some(limits) => limits.contains(target),
            None => true,
        }
    }
}
