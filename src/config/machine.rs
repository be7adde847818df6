//! Machine configuration - root configuration structure.

use serde::Deserialize;

use crate::N_AXIS;

use super::axis::{AxisConfig, AxisKinematics};

/// Number of adaptive step-smoothing levels above the base rate.
pub const MAX_SMOOTHING_LEVEL: usize = 3;

/// Default step timer frequency in Hz.
pub const DEFAULT_TIMER_HZ: u32 = 1_000_000;

/// Adaptive step-smoothing threshold table.
///
/// Maps the timer cycles-per-tick of a segment to a smoothing level.
/// Slow step rates produce large cycles-per-tick values; each level
/// doubles the tick rate and spreads axis pulses across the sub-ticks.
/// Level 0 (divisor 1) is used at the fastest rates the timer can
/// service.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SmoothingTable {
    /// Ascending cycles-per-tick thresholds; crossing each one raises
    /// the smoothing level by one.
    pub thresholds: [u32; MAX_SMOOTHING_LEVEL],
}

impl SmoothingTable {
    /// Build the conventional threshold table for a step timer
    /// frequency: levels engage below 8 kHz, 4 kHz, and 2 kHz step
    /// rates.
    pub fn for_timer(timer_hz: u32) -> Self {
        Self {
            thresholds: [timer_hz / 8000, timer_hz / 4000, timer_hz / 2000],
        }
    }

    /// Select the smoothing level for a segment's cycles-per-tick.
    pub fn level_for(&self, cycles_per_tick: u32) -> u8 {
        let mut level = 0u8;
        for threshold in self.thresholds.iter() {
            if cycles_per_tick < *threshold {
                break;
            }
            level += 1;
        }
        level
    }

    /// Check thresholds are strictly ascending.
    pub fn is_valid(&self) -> bool {
        self.thresholds.windows(2).all(|w| w[0] < w[1])
    }
}

impl Default for SmoothingTable {
    fn default() -> Self {
        Self::for_timer(DEFAULT_TIMER_HZ)
    }
}

/// Root machine configuration from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct MachineConfig {
    /// Per-axis configuration, in machine axis order.
    pub axes: [AxisConfig; N_AXIS],

    /// Cornering path deviation bound in millimeters.
    ///
    /// Junction speed between consecutive moves is limited so the
    /// actual path never deviates from the programmed corner by more
    /// than this distance.
    #[serde(default = "default_junction_deviation", rename = "junction_deviation_mm")]
    pub junction_deviation: f32,

    /// Step pulse width in microseconds.
    #[serde(default = "default_pulse_width", rename = "pulse_width_us")]
    pub pulse_width: u32,

    /// Step timer frequency in Hz.
    #[serde(default = "default_timer_hz")]
    pub timer_hz: u32,

    /// Adaptive step-smoothing thresholds.
    #[serde(default)]
    pub smoothing: SmoothingTable,
}

fn default_junction_deviation() -> f32 {
    0.01
}

fn default_pulse_width() -> u32 {
    10
}

fn default_timer_hz() -> u32 {
    DEFAULT_TIMER_HZ
}

impl MachineConfig {
    /// Get an axis configuration by index.
    pub fn axis(&self, index: usize) -> Option<&AxisConfig> {
        self.axes.get(index)
    }

    /// Look up an axis by name.
    pub fn axis_by_name(&self, name: &str) -> Option<(usize, &AxisConfig)> {
        self.axes
            .iter()
            .enumerate()
            .find(|(_, a)| a.name.as_str() == name)
    }

    /// Compute derived kinematics for every axis.
    pub fn kinematics(&self) -> [AxisKinematics; N_AXIS] {
        core::array::from_fn(|i| AxisKinematics::from_config(&self.axes[i]))
    }

    /// Step pulse width converted to timer cycles.
    pub fn pulse_cycles(&self) -> u32 {
        (self.pulse_width as u64 * self.timer_hz as u64 / 1_000_000) as u32
    }
}
