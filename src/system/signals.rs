//! Cross-context signalling primitives.
//!
//! The signal context (limit/control pin changes) and the upstream API
//! communicate with the cooperative context exclusively through these
//! atomics; no other state is shared across contexts.

use core::sync::atomic::{AtomicI32, AtomicU16, Ordering};

use crate::N_AXIS;

const FLAG_RESET: u16 = 1 << 0;
const FLAG_FEED_HOLD: u16 = 1 << 1;
const FLAG_CYCLE_START: u16 = 1 << 2;
const FLAG_SAFETY_DOOR: u16 = 1 << 3;
const FLAG_HARD_LIMIT: u16 = 1 << 4;
const FLAG_PROBE_TRIP: u16 = 1 << 5;

/// Pending real-time events, decoded from the flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PendingEvents {
    /// Reset / emergency stop requested.
    pub reset: bool,
    /// Feed hold requested.
    pub feed_hold: bool,
    /// Cycle start / resume requested.
    pub cycle_start: bool,
    /// Safety door opened.
    pub safety_door: bool,
    /// A hard limit switch tripped.
    pub hard_limit: bool,
    /// The probe input tripped.
    pub probe_trip: bool,
}

impl PendingEvents {
    /// Check if any event is pending.
    pub fn any(&self) -> bool {
        self.reset
            || self.feed_hold
            || self.cycle_start
            || self.safety_door
            || self.hard_limit
            || self.probe_trip
    }
}

/// Atomic event flag word written by the signal context and drained by
/// the cooperative context.
#[derive(Debug, Default)]
pub struct EventFlags {
    bits: AtomicU16,
}

impl EventFlags {
    /// Create an empty flag word.
    pub const fn new() -> Self {
        Self {
            bits: AtomicU16::new(0),
        }
    }

    #[inline]
    fn raise(&self, flag: u16) {
        self.bits.fetch_or(flag, Ordering::AcqRel);
    }

    /// Raise the reset event.
    pub fn raise_reset(&self) {
        self.raise(FLAG_RESET);
    }

    /// Raise the feed-hold event.
    pub fn raise_feed_hold(&self) {
        self.raise(FLAG_FEED_HOLD);
    }

    /// Raise the cycle-start event.
    pub fn raise_cycle_start(&self) {
        self.raise(FLAG_CYCLE_START);
    }

    /// Raise the safety-door event.
    pub fn raise_safety_door(&self) {
        self.raise(FLAG_SAFETY_DOOR);
    }

    /// Raise the hard-limit event.
    pub fn raise_hard_limit(&self) {
        self.raise(FLAG_HARD_LIMIT);
    }

    /// Raise the probe-trip event.
    pub fn raise_probe_trip(&self) {
        self.raise(FLAG_PROBE_TRIP);
    }

    /// Atomically drain all pending events.
    pub fn take(&self) -> PendingEvents {
        let bits = self.bits.swap(0, Ordering::AcqRel);
        PendingEvents {
            reset: bits & FLAG_RESET != 0,
            feed_hold: bits & FLAG_FEED_HOLD != 0,
            cycle_start: bits & FLAG_CYCLE_START != 0,
            safety_door: bits & FLAG_SAFETY_DOOR != 0,
            hard_limit: bits & FLAG_HARD_LIMIT != 0,
            probe_trip: bits & FLAG_PROBE_TRIP != 0,
        }
    }

    /// Check without draining.
    pub fn peek(&self) -> PendingEvents {
        let bits = self.bits.load(Ordering::Acquire);
        PendingEvents {
            reset: bits & FLAG_RESET != 0,
            feed_hold: bits & FLAG_FEED_HOLD != 0,
            cycle_start: bits & FLAG_CYCLE_START != 0,
            safety_door: bits & FLAG_SAFETY_DOOR != 0,
            hard_limit: bits & FLAG_HARD_LIMIT != 0,
            probe_trip: bits & FLAG_PROBE_TRIP != 0,
        }
    }
}

/// Absolute machine position mirrored for lock-free reads from any
/// context.
///
/// The tick context is the only writer; readers get a value exact as of
/// the last completed tick.
#[derive(Debug)]
pub struct SharedPosition {
    axes: [AtomicI32; N_AXIS],
}

impl Default for SharedPosition {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedPosition {
    /// Create a zeroed position mirror.
    pub const fn new() -> Self {
        const ZERO: AtomicI32 = AtomicI32::new(0);
        Self {
            axes: [ZERO; N_AXIS],
        }
    }

    /// Store a position snapshot (tick context).
    pub fn store(&self, position: [i32; N_AXIS]) {
        for (slot, value) in self.axes.iter().zip(position) {
            slot.store(value, Ordering::Release);
        }
    }

    /// Load the latest position snapshot (any context).
    pub fn load(&self) -> [i32; N_AXIS] {
        core::array::from_fn(|i| self.axes[i].load(Ordering::Acquire))
    }
}
