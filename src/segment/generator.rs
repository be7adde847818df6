//! Execution segment generator.
//!
//! Consumes the planner's head block and slices its trapezoidal
//! velocity profile into fixed-duration segments: per-axis step counts
//! plus the timer period the scheduler must run at. Generation is
//! gap-free across block boundaries (the exit speed of one block is the
//! entry condition of the next) and honors feed holds by ramping the
//! profile down to zero with the block's own acceleration limit.

use libm::sqrtf;

use crate::config::SmoothingTable;
use crate::hal::{Direction, OutputSnapshot};
use crate::planner::{MotionKind, Planner};
use crate::N_AXIS;

/// Capacity of the run-ahead segment queue.
pub const SEGMENT_CAPACITY: usize = 8;

/// Nominal duration of one execution segment in seconds.
pub const SEGMENT_SECONDS: f32 = 0.010;

/// Speeds below this are treated as stopped (mm/s).
const SPEED_EPSILON: f32 = 1.0e-4;

/// Distance slop when closing out a block (mm).
const DISTANCE_EPSILON: f32 = 1.0e-6;

/// One fixed-duration slice of a motion block.
///
/// Consumed exactly once by the pulse scheduler, strictly FIFO.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    /// Steps to emit per axis during this slice.
    pub steps: [u32; N_AXIS],

    /// Travel direction per axis.
    pub direction: [Direction; N_AXIS],

    /// Timer ticks in this slice (after smoothing subdivision).
    pub n_ticks: u32,

    /// Timer cycles per tick (after smoothing subdivision).
    pub cycles_per_tick: u32,

    /// Smoothing divisor level the slice was built for.
    pub smoothing_level: u8,

    /// Whether the slice belongs to a probing move.
    pub is_probe: bool,

    /// Machine outputs active during this slice.
    pub outputs: OutputSnapshot,
}

/// Run-ahead queue feeding the pulse scheduler.
pub type SegmentQueue = heapless::Deque<Segment, SEGMENT_CAPACITY>;

/// Live feed/rapid override percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideState {
    feed_percent: u16,
    rapid_percent: u16,
}

impl Default for OverrideState {
    fn default() -> Self {
        Self {
            feed_percent: 100,
            rapid_percent: 100,
        }
    }
}

impl OverrideState {
    /// Feed override bounds and step (percent).
    pub const FEED_MIN: u16 = 10;
    /// Maximum feed override (percent).
    pub const FEED_MAX: u16 = 200;
    /// Allowed rapid override settings (percent).
    pub const RAPID_LEVELS: [u16; 3] = [100, 50, 25];

    /// Set the feed override, clamped to 10-200 %.
    pub fn set_feed(&mut self, percent: u16) {
        self.feed_percent = percent.clamp(Self::FEED_MIN, Self::FEED_MAX);
    }

    /// Set the rapid override; snaps to the nearest allowed setting.
    pub fn set_rapid(&mut self, percent: u16) {
        let mut best = Self::RAPID_LEVELS[0];
        for level in Self::RAPID_LEVELS {
            if percent.abs_diff(level) < percent.abs_diff(best) {
                best = level;
            }
        }
        self.rapid_percent = best;
    }

    /// Current feed override percent.
    #[inline]
    pub fn feed(&self) -> u16 {
        self.feed_percent
    }

    /// Current rapid override percent.
    #[inline]
    pub fn rapid(&self) -> u16 {
        self.rapid_percent
    }

    /// Scale a block's nominal speed by the override for its motion
    /// class, never exceeding the axis-limited rapid ceiling.
    fn scale(&self, kind: MotionKind, nominal: f32, rapid_ceiling: f32) -> f32 {
        match kind {
            MotionKind::Feed => {
                (nominal * self.feed_percent as f32 / 100.0).min(rapid_ceiling)
            }
            MotionKind::Rapid => rapid_ceiling * self.rapid_percent as f32 / 100.0,
            // Jog and system moves run at their programmed rate.
            MotionKind::Jog | MotionKind::System => nominal,
        }
    }
}

/// Feed-hold progress within the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HoldState {
    /// Normal generation.
    None,
    /// Ramping down to zero speed.
    Decelerating,
    /// Velocity reached zero; generation frozen, position retained.
    Held,
}

/// Prep state for the block currently being segmented.
#[derive(Debug, Clone, Copy)]
struct ActiveBlock {
    steps: [i32; N_AXIS],
    direction: [Direction; N_AXIS],
    millimeters: f32,
    mm_remaining: f32,
    acceleration: f32,
    nominal_speed: f32,
    rapid_speed: f32,
    kind: MotionKind,
    is_probe: bool,
    outputs: OutputSnapshot,
    /// Per-axis steps already handed to segments.
    emitted: [u32; N_AXIS],
}

/// Outcome of a fill pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStatus {
    /// Segments were produced (or the queue was already full).
    Active,
    /// Velocity reached zero under a feed hold; generation is frozen.
    Held,
    /// No block to segment; the planner buffer is drained.
    Drained,
}

/// Converts planner blocks into execution segments.
pub struct SegmentGenerator {
    timer_hz: u32,
    smoothing: SmoothingTable,
    overrides: OverrideState,
    active: Option<ActiveBlock>,
    /// Speed at the end of the last emitted segment (mm/s); the entry
    /// condition for whatever is generated next.
    current_speed: f32,
    hold: HoldState,
}

impl SegmentGenerator {
    /// Create a generator for the given step timer rate and smoothing
    /// thresholds.
    pub fn new(timer_hz: u32, smoothing: SmoothingTable) -> Self {
        Self {
            timer_hz,
            smoothing,
            overrides: OverrideState::default(),
            active: None,
            current_speed: 0.0,
            hold: HoldState::None,
        }
    }

    /// Access the override state.
    #[inline]
    pub fn overrides(&self) -> &OverrideState {
        &self.overrides
    }

    /// Mutable access to the override state.
    #[inline]
    pub fn overrides_mut(&mut self) -> &mut OverrideState {
        &mut self.overrides
    }

    /// Speed at the end of the last emitted segment in mm/s.
    #[inline]
    pub fn current_speed(&self) -> f32 {
        self.current_speed
    }

    /// Whether a block is currently being segmented.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Whether the active block is a probing move.
    #[inline]
    pub fn probing(&self) -> bool {
        self.active.map_or(false, |a| a.is_probe)
    }

    /// Begin decelerating to zero speed (feed hold / door).
    ///
    /// Already-emitted segments keep draining in the scheduler; only
    /// future segments ramp down.
    pub fn begin_hold(&mut self) {
        if self.hold == HoldState::None {
            self.hold = if self.is_active() || self.current_speed > SPEED_EPSILON {
                HoldState::Decelerating
            } else {
                HoldState::Held
            };
        }
    }

    /// Whether a hold has fully decelerated to zero.
    #[inline]
    pub fn is_held(&self) -> bool {
        self.hold == HoldState::Held
    }

    /// Whether a hold is pending or complete.
    #[inline]
    pub fn hold_requested(&self) -> bool {
        self.hold != HoldState::None
    }

    /// Resume from a hold: the remaining block distance is replanned as
    /// a fresh accelerating profile from zero speed. No position loss.
    pub fn resume(&mut self) {
        self.hold = HoldState::None;
    }

    /// Drop all generation state (abort/reset path). Any partially
    /// segmented block is abandoned; the caller resyncs positions.
    pub fn reset(&mut self) {
        self.active = None;
        self.current_speed = 0.0;
        self.hold = HoldState::None;
    }

    /// Fill the segment queue from the planner buffer.
    ///
    /// Produces segments until the queue is full, the hold completes,
    /// or the buffer drains. Never called from the interrupt context.
    pub fn fill(&mut self, planner: &mut Planner, queue: &mut SegmentQueue) -> FillStatus {
        loop {
            if queue.is_full() {
                return FillStatus::Active;
            }
            match self.produce(planner) {
                Some(segment) => {
                    // Cannot fail: fullness checked above.
                    let _ = queue.push_back(segment);
                }
                None => {
                    return if self.is_held() {
                        FillStatus::Held
                    } else if self.active.is_none() && planner.is_empty() {
                        FillStatus::Drained
                    } else {
                        FillStatus::Active
                    };
                }
            }
        }
    }

    /// Produce the next segment, loading the planner head as needed.
    fn produce(&mut self, planner: &mut Planner) -> Option<Segment> {
        loop {
            if self.hold == HoldState::Held {
                return None;
            }

            if self.active.is_none() {
                if self.hold == HoldState::Decelerating
                    && self.current_speed <= SPEED_EPSILON
                {
                    // Nothing left in flight: the hold is complete.
                    self.hold = HoldState::Held;
                    return None;
                }
                if self.load_head(planner).is_none() {
                    if self.hold == HoldState::Decelerating {
                        // No distance left to decelerate through.
                        self.hold = HoldState::Held;
                        self.current_speed = 0.0;
                    }
                    return None;
                }
            }
            let active = match self.active.as_mut() {
                Some(a) => a,
                None => return None,
            };

            // Speed ceiling for this slice: override-scaled nominal,
            // or zero when ramping down for a hold.
            let allowed = if self.hold == HoldState::Decelerating {
                0.0
            } else {
                self.overrides
                    .scale(active.kind, active.nominal_speed, active.rapid_speed)
            };

            // The exit speed this block decelerates toward: the entry
            // speed of the next buffered block, zero at the tail or
            // under a hold.
            let exit_sq = if self.hold == HoldState::Decelerating {
                0.0
            } else {
                planner.head_exit_speed_sq()
            };

            let accel = active.acceleration;
            let mut v = self.current_speed;
            let mut time = 0.0f32;
            let mut travelled = 0.0f32;
            let mut block_done = false;

            // Integrate the profile one time quantum at a time until the
            // slice commands at least one step; at very low rates one
            // segment spans several quanta so the tick period stays in
            // the timer's stable range.
            let (steps, n_step) = loop {
                let remaining = active.mm_remaining - travelled;

                // Fastest we may go right now and still reach exit_sq by
                // the end of the block.
                let limit = sqrtf(exit_sq + 2.0 * accel * remaining);
                let target = allowed.min(limit);

                let v_new = if v < target {
                    (v + accel * SEGMENT_SECONDS).min(target)
                } else {
                    (v - accel * SEGMENT_SECONDS).max(target.min(v))
                };

                let mut ds = 0.5 * (v + v_new) * SEGMENT_SECONDS;
                if ds >= remaining - DISTANCE_EPSILON {
                    ds = remaining;
                    block_done = true;
                }

                travelled += ds;
                time += SEGMENT_SECONDS;
                v = v_new;

                // Decelerated to a stop short of the block end: freeze.
                let stalled = v <= SPEED_EPSILON && !block_done;

                let (steps, n_step) = Self::slice_steps(active, travelled, block_done);
                if n_step > 0 || block_done || stalled {
                    break (steps, n_step);
                }
            };

            active.mm_remaining -= travelled;
            for axis in 0..N_AXIS {
                active.emitted[axis] += steps[axis];
            }
            self.current_speed = v;

            let direction = active.direction;
            let is_probe = active.is_probe;
            let outputs = active.outputs;

            if block_done {
                self.active = None;
                planner.consume_head();
                if planner.is_empty() {
                    // Planned-to-stop at the tail: the buffer drained, so
                    // the next enqueue starts from rest.
                    planner.motion_stopped();
                    self.current_speed = 0.0;
                }
            } else if v <= SPEED_EPSILON {
                // Stopped mid-block under a hold.
                self.current_speed = 0.0;
                if self.hold == HoldState::Decelerating {
                    self.hold = HoldState::Held;
                }
            }

            if n_step == 0 {
                // Slice carried no steps (hold completed or rounding
                // emptied a finished block); try the next block or stop.
                if block_done {
                    continue;
                }
                return None;
            }

            // Base tick rate: the dominant axis steps at most once per
            // tick. Smoothing subdivides slow slices so axis pulses are
            // phase-distributed instead of bunched.
            let mut cycles_per_tick =
                ((self.timer_hz as f32 * time) / n_step as f32) as u32;
            let level = self.smoothing.level_for(cycles_per_tick);
            let n_ticks = (n_step as u32) << level;
            cycles_per_tick >>= level;

            return Some(Segment {
                steps,
                direction,
                n_ticks,
                cycles_per_tick,
                smoothing_level: level,
                is_probe,
                outputs,
            });
        }
    }

    /// Load the planner head block as the active block.
    fn load_head(&mut self, planner: &Planner) -> Option<()> {
        let head = planner.head()?;
        self.active = Some(ActiveBlock {
            steps: head.steps,
            direction: head.direction,
            millimeters: head.millimeters,
            mm_remaining: head.millimeters,
            acceleration: head.acceleration,
            nominal_speed: head.nominal_speed,
            rapid_speed: head.rapid_speed,
            kind: head.kind,
            is_probe: head.is_probe,
            outputs: head.outputs,
            emitted: [0; N_AXIS],
        });
        Some(())
    }

    /// Per-axis step counts for a slice ending `travelled` mm into the
    /// remaining distance.
    ///
    /// Counts are cumulative-rounded against the block totals so the
    /// sum over all slices equals the commanded delta exactly.
    fn slice_steps(
        active: &ActiveBlock,
        travelled: f32,
        block_done: bool,
    ) -> ([u32; N_AXIS], u32) {
        let done_mm = active.millimeters - active.mm_remaining + travelled;
        let progress = if block_done || active.millimeters <= 0.0 {
            1.0
        } else {
            (done_mm / active.millimeters).min(1.0)
        };

        let mut steps = [0u32; N_AXIS];
        let mut n_step = 0u32;
        for axis in 0..N_AXIS {
            let total = active.steps[axis].unsigned_abs();
            let cumulative = if block_done {
                total
            } else {
                (total as f32 * progress + 0.5) as u32
            };
            let count = cumulative.saturating_sub(active.emitted[axis]);
            steps[axis] = count;
            n_step = n_step.max(count);
        }
        (steps, n_step)
    }
}
