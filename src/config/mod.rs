//! Configuration module for motion-core.
//!
//! Provides types for loading and validating machine and per-axis
//! configurations from TOML files (with `std` feature) or pre-parsed data.

mod axis;
mod machine;
pub mod units;
#[cfg(feature = "std")]
mod loader;
mod validation;

pub use axis::{AxisConfig, AxisKinematics, TravelLimits};
pub use machine::{MachineConfig, SmoothingTable, DEFAULT_TIMER_HZ, MAX_SMOOTHING_LEVEL};
pub use validation::validate_config;

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};

// Re-export unit types at config level
pub use units::{Millimeters, MmPerMin, MmPerSec2, Steps};
