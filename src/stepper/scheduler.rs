//! Interrupt-driven stepper pulse scheduler.
//!
//! Executes once per hardware timer tick. Each axis owns a running
//! error accumulator; the segment's per-axis step count is added every
//! tick and a pulse fires when the sum crosses the tick-count
//! threshold. The long-run average step rate of every axis therefore
//! matches its commanded ratio exactly, even though only the dominant
//! axis can step on every tick.
//!
//! Smoothing-subdivided segments arrive with their tick count already
//! multiplied and their timer period divided, so low feed rates spread
//! pulses across sub-ticks instead of bunching them.
//!
//! All state here is mutated only within the tick context; other
//! contexts interact through [`StepperScheduler::halt`] and the
//! position snapshot the facade mirrors into atomics after each tick.

use crate::config::AxisKinematics;
use crate::hal::Board;
use crate::segment::{Segment, SegmentQueue};
use crate::N_AXIS;

/// Result of one timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickOutcome {
    /// A segment is executing; pulses may have been emitted.
    Active,
    /// The queue was empty (or a halt was requested); the scheduler is
    /// parked and emits nothing until woken.
    Parked,
}

/// In-flight segment with its accumulator state.
#[derive(Debug, Clone, Copy)]
struct ExecSegment {
    segment: Segment,
    /// Per-axis error accumulators, seeded to half the threshold so
    /// pulses are phase-centered within the slice.
    accumulator: [u32; N_AXIS],
    /// Ticks consumed so far.
    tick: u32,
}

/// Interrupt-context pulse scheduler.
pub struct StepperScheduler {
    exec: Option<ExecSegment>,
    parked: bool,
    /// Absolute machine position in steps, updated per emitted pulse.
    position: [i32; N_AXIS],
    /// Per-axis direction pin inversion from configuration.
    invert: [bool; N_AXIS],
    /// Step pulse width in timer cycles.
    pulse_cycles: u32,
}

impl StepperScheduler {
    /// Create a parked scheduler.
    pub fn new(kinematics: &[AxisKinematics; N_AXIS], pulse_cycles: u32) -> Self {
        Self {
            exec: None,
            parked: true,
            position: [0; N_AXIS],
            invert: core::array::from_fn(|i| kinematics[i].invert_direction),
            pulse_cycles,
        }
    }

    /// Check if the scheduler is parked.
    #[inline]
    pub fn is_parked(&self) -> bool {
        self.parked
    }

    /// Absolute machine position in steps.
    ///
    /// Exact at any time: counters advance with every emitted pulse.
    #[inline]
    pub fn position(&self) -> [i32; N_AXIS] {
        self.position
    }

    /// Overwrite the position counters (homing completion, manual
    /// sync). Only valid while parked.
    pub fn set_position(&mut self, position: [i32; N_AXIS]) {
        self.position = position;
    }

    /// Wake the scheduler so the next tick starts draining the queue.
    pub fn wake<B: Board>(&mut self, board: &mut B) {
        if self.parked {
            self.parked = false;
            board.steppers_enable(true);
        }
    }

    /// Immediate stop: drop the in-flight segment and park.
    ///
    /// Callable from the signal context on a hard limit trip; bounded
    /// constant-time work. The caller clears the segment queue. No
    /// pulse is emitted after this returns.
    pub fn halt(&mut self) {
        self.exec = None;
        self.parked = true;
    }

    /// Execute one timer tick.
    ///
    /// Pops the next segment when none is in flight, programs the timer
    /// period, advances the per-axis accumulators, and emits at most
    /// one pulse per axis through the board.
    pub fn on_tick<B: Board>(
        &mut self,
        queue: &mut SegmentQueue,
        board: &mut B,
    ) -> TickOutcome {
        if self.parked {
            return TickOutcome::Parked;
        }

        if self.exec.is_none() {
            match queue.pop_front() {
                Some(segment) => {
                    board.set_cycles_per_tick(segment.cycles_per_tick);
                    board.spindle_set(segment.outputs.spindle, segment.outputs.spindle_rpm);
                    board.coolant_set(segment.outputs.coolant);
                    let seed = segment.n_ticks / 2;
                    self.exec = Some(ExecSegment {
                        segment,
                        accumulator: [seed; N_AXIS],
                        tick: 0,
                    });
                }
                None => {
                    // Queue drained: park and signal idle upstream.
                    self.parked = true;
                    board.steppers_enable(false);
                    return TickOutcome::Parked;
                }
            }
        }

        let mut finished = false;
        if let Some(exec) = self.exec.as_mut() {
            let threshold = exec.segment.n_ticks;
            for axis in 0..N_AXIS {
                exec.accumulator[axis] += exec.segment.steps[axis];
                if exec.accumulator[axis] >= threshold {
                    exec.accumulator[axis] -= threshold;
                    let direction = exec.segment.direction[axis];
                    let physical = if self.invert[axis] {
                        direction.flipped()
                    } else {
                        direction
                    };
                    board.pulse_start(axis, physical, self.pulse_cycles);
                    self.position[axis] += direction.sign();
                }
            }

            exec.tick += 1;
            if exec.tick >= threshold {
                finished = true;
            }
        }

        if finished {
            self.exec = None;
        }

        TickOutcome::Active
    }
}
