//! Motion block - one planned linear move.

use crate::hal::{Direction, OutputSnapshot};
use crate::N_AXIS;

/// Motion class of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionKind {
    /// Normal feed move at the programmed feed rate.
    #[default]
    Feed,
    /// Rapid traverse at the axis maximum rates.
    Rapid,
    /// Jog move; cancellable, never part of a program.
    Jog,
    /// Internal system move (homing, pull-off); bypasses soft limits.
    System,
}

/// One planned linear motion block.
///
/// Immutable once queued except for `entry_speed_sq`, which the planner
/// recomputes as neighbours are appended or consumed. The exit speed of
/// a block is the entry speed of its successor (zero for the buffer
/// tail).
#[derive(Debug, Clone, Copy)]
pub struct Block {
    /// Per-axis signed step deltas.
    pub steps: [i32; N_AXIS],

    /// Step count of the dominant axis (max absolute delta).
    pub step_event_count: u32,

    /// Per-axis travel directions.
    pub direction: [Direction; N_AXIS],

    /// Total travel distance in millimeters.
    pub millimeters: f32,

    /// Acceleration limit along the move in mm/s², normalized so every
    /// axis respects its own ceiling.
    pub acceleration: f32,

    /// Programmed speed in mm/s after clamping to axis maxima.
    pub nominal_speed: f32,

    /// Axis-limited rapid speed along this direction in mm/s; the
    /// ceiling override scaling may never exceed.
    pub rapid_speed: f32,

    /// Squared entry speed in (mm/s)², recomputed by the planner.
    pub entry_speed_sq: f32,

    /// Squared ceiling on the entry speed from junction geometry and
    /// neighbouring nominal speeds. Never exceeded by recomputation.
    pub max_entry_speed_sq: f32,

    /// Motion class.
    pub kind: MotionKind,

    /// Whether this move watches the probe input.
    pub is_probe: bool,

    /// Spindle/coolant outputs active while this block executes.
    pub outputs: OutputSnapshot,
}

impl Default for Block {
    fn default() -> Self {
        Self {
            steps: [0; N_AXIS],
            step_event_count: 0,
            direction: [Direction::Positive; N_AXIS],
            millimeters: 0.0,
            acceleration: 0.0,
            nominal_speed: 0.0,
            rapid_speed: 0.0,
            entry_speed_sq: 0.0,
            max_entry_speed_sq: 0.0,
            kind: MotionKind::Feed,
            is_probe: false,
            outputs: OutputSnapshot::default(),
        }
    }
}

impl Block {
    /// Squared speed reachable at the end of this block when entering at
    /// `entry_sq` and accelerating the whole distance.
    #[inline]
    pub fn reachable_exit_sq(&self, entry_sq: f32) -> f32 {
        entry_sq + 2.0 * self.acceleration * self.millimeters
    }

    /// Check if the block commands any steps.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.step_event_count == 0
    }
}
