//! Look-ahead velocity planner.
//!
//! Maintains the bounded block buffer and keeps its speed profile
//! kinematically feasible: a reverse pass bounds every entry speed by
//! what the rest of the buffer can decelerate through, and a forward
//! pass raises entry speeds toward nominal wherever acceleration
//! distance allows. The head block is never touched while it is being
//! segmented, so a completed pass is the only state the segment
//! generator ever observes.

use libm::{fabsf, sqrtf};

use crate::config::units::{Millimeters, MmPerMin, Steps};
use crate::config::AxisKinematics;
use crate::error::PlanError;
use crate::hal::{Direction, OutputSnapshot};
use crate::N_AXIS;

use super::block::{Block, MotionKind};
use super::buffer::PlannerBuffer;

/// Floor on programmed speeds in mm/s (1 mm/min).
const MIN_NOMINAL_SPEED: f32 = 1.0 / 60.0;

/// Junction speed planned at a full reversal, in mm/s.
const REVERSAL_JUNCTION_SPEED: f32 = 0.0;

/// Dot-product bound past which consecutive moves count as collinear
/// (or, negated, as a full reversal).
const COS_EPSILON: f32 = 0.999_999;

/// A requested motion: absolute target, feed rate, and machine outputs.
#[derive(Debug, Clone, Copy)]
pub struct MotionRequest {
    /// Absolute target position per axis.
    pub target: [Millimeters; N_AXIS],

    /// Programmed feed rate; ignored for Rapid and System moves.
    pub feed_rate: MmPerMin,

    /// Motion class.
    pub kind: MotionKind,

    /// Whether this move watches the probe input.
    pub is_probe: bool,

    /// Spindle/coolant outputs for the duration of the move.
    pub outputs: OutputSnapshot,
}

impl MotionRequest {
    /// A feed move to `target` at `feed_rate` with default outputs.
    pub fn feed(target: [Millimeters; N_AXIS], feed_rate: MmPerMin) -> Self {
        Self {
            target,
            feed_rate,
            kind: MotionKind::Feed,
            is_probe: false,
            outputs: OutputSnapshot::default(),
        }
    }

    /// A rapid traverse to `target` with default outputs.
    pub fn rapid(target: [Millimeters; N_AXIS]) -> Self {
        Self {
            target,
            feed_rate: MmPerMin(0.0),
            kind: MotionKind::Rapid,
            is_probe: false,
            outputs: OutputSnapshot::default(),
        }
    }
}

/// Look-ahead motion planner.
pub struct Planner {
    buffer: PlannerBuffer,
    kinematics: [AxisKinematics; N_AXIS],
    junction_deviation: f32,
    /// Planned machine position in steps (tail of the buffer).
    position: [i32; N_AXIS],
    /// Unit vector of the last appended move.
    previous_unit_vec: [f32; N_AXIS],
    /// Nominal speed of the last appended move; zero once motion has
    /// fully stopped, which forces the next block to start from rest.
    previous_nominal_speed: f32,
}

impl Planner {
    /// Create a planner for the given axis kinematics and cornering
    /// deviation bound.
    pub fn new(kinematics: [AxisKinematics; N_AXIS], junction_deviation: f32) -> Self {
        Self {
            buffer: PlannerBuffer::new(),
            kinematics,
            junction_deviation,
            position: [0; N_AXIS],
            previous_unit_vec: [0.0; N_AXIS],
            previous_nominal_speed: 0.0,
        }
    }

    /// Number of queued blocks.
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Check if the buffer has no free slot.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.buffer.is_full()
    }

    /// Get the head block (currently being segmented).
    #[inline]
    pub fn head(&self) -> Option<&Block> {
        self.buffer.head()
    }

    /// Get the block `index` positions after the head.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Block> {
        self.buffer.get(index)
    }

    /// Squared exit speed the head block should target: the entry speed
    /// of its successor, or zero when the head is the buffer tail.
    #[inline]
    pub fn head_exit_speed_sq(&self) -> f32 {
        self.buffer.get(1).map_or(0.0, |b| b.entry_speed_sq)
    }

    /// Planned machine position in steps (position after the tail
    /// block).
    #[inline]
    pub fn planned_position(&self) -> [i32; N_AXIS] {
        self.position
    }

    /// Append a motion block for `request` and recompute the buffer's
    /// speed profile.
    ///
    /// Fails with [`PlanError::BufferFull`] when no slot is free (the
    /// buffer is untouched; retry after the buffer drains) and
    /// [`PlanError::SoftLimitExceeded`] when the target violates a
    /// configured travel limit (the block never enters the buffer).
    /// A request that commands no steps is accepted and dropped.
    pub fn enqueue(&mut self, request: &MotionRequest) -> Result<(), PlanError> {
        // Soft limits guard everything except internal system moves,
        // which must be free to run past switches during homing.
        if request.kind != MotionKind::System {
            for (axis, kin) in self.kinematics.iter().enumerate() {
                if !kin.within_travel(request.target[axis]) {
                    return Err(PlanError::SoftLimitExceeded { axis });
                }
            }
        }

        if self.buffer.is_full() {
            return Err(PlanError::BufferFull);
        }

        // Quantize the target to whole steps; travel distances derive
        // from the quantized deltas so planned millimeters and emitted
        // steps always agree.
        let mut target_steps = [0i32; N_AXIS];
        let mut steps = [0i32; N_AXIS];
        let mut delta_mm = [0.0f32; N_AXIS];
        let mut step_event_count = 0u32;
        for axis in 0..N_AXIS {
            target_steps[axis] =
                Steps::from_mm(request.target[axis], self.kinematics[axis].steps_per_mm).value();
            steps[axis] = target_steps[axis] - self.position[axis];
            delta_mm[axis] = steps[axis] as f32 / self.kinematics[axis].steps_per_mm;
            step_event_count = step_event_count.max(steps[axis].unsigned_abs());
        }

        if step_event_count == 0 {
            return Ok(());
        }

        let mut distance_sq = 0.0f32;
        for axis in 0..N_AXIS {
            distance_sq += delta_mm[axis] * delta_mm[axis];
        }
        let millimeters = sqrtf(distance_sq);

        let mut unit_vec = [0.0f32; N_AXIS];
        let mut direction = [Direction::Positive; N_AXIS];
        for axis in 0..N_AXIS {
            unit_vec[axis] = delta_mm[axis] / millimeters;
            direction[axis] = Direction::from_delta(steps[axis]);
        }

        // Clamp speed and acceleration so every axis stays inside its
        // own ceiling along this direction.
        let rate_ceiling = self.limit_along(&unit_vec, |kin| kin.max_rate_mm_per_sec);
        let acceleration = self.limit_along(&unit_vec, |kin| kin.acceleration_mm_per_sec2);

        let requested = match request.kind {
            MotionKind::Rapid | MotionKind::System => rate_ceiling,
            MotionKind::Feed | MotionKind::Jog => {
                request.feed_rate.to_mm_per_sec().min(rate_ceiling)
            }
        };
        let nominal_speed = requested.max(MIN_NOMINAL_SPEED);

        let max_entry_speed_sq =
            self.junction_speed_sq(&unit_vec, acceleration, nominal_speed);

        let block = Block {
            steps,
            step_event_count,
            direction,
            millimeters,
            acceleration,
            nominal_speed,
            rapid_speed: rate_ceiling,
            entry_speed_sq: 0.0,
            max_entry_speed_sq,
            kind: request.kind,
            is_probe: request.is_probe,
            outputs: request.outputs,
        };

        // Cannot fail: fullness was checked above and nothing since has
        // consumed a slot.
        let pushed = self.buffer.push_back(block);
        debug_assert!(pushed);

        self.position = target_steps;
        self.previous_unit_vec = unit_vec;
        self.previous_nominal_speed = nominal_speed;

        self.recompute();
        Ok(())
    }

    /// Remove the head block once it has been fully segmented.
    ///
    /// Called only from the cooperative context draining the buffer.
    pub fn consume_head(&mut self) {
        self.buffer.pop_front();
    }

    /// Empty the buffer immediately (abort/reset path) and resync the
    /// planned position to `position`.
    pub fn discard_all(&mut self, position: [i32; N_AXIS]) {
        self.buffer.clear();
        self.position = position;
        self.motion_stopped();
    }

    /// Record that motion has come to a complete stop, so the next
    /// appended block starts from zero entry speed.
    pub fn motion_stopped(&mut self) {
        self.previous_unit_vec = [0.0; N_AXIS];
        self.previous_nominal_speed = 0.0;
    }

    /// Two-pass speed recomputation over the look-ahead suffix.
    ///
    /// The head block is excluded: its profile is owned by the segment
    /// generator while it executes. Running the passes twice in a row
    /// with no intervening buffer change is a no-op.
    pub fn recompute(&mut self) {
        let len = self.buffer.len();
        if len < 2 {
            return;
        }

        // Reverse pass (tail -> head): bound every entry speed by what
        // the downstream buffer can decelerate through, planning to a
        // stop at the buffer tail.
        let mut next_entry_sq = 0.0f32;
        for index in (1..len).rev() {
            if let Some(block) = self.buffer.get_mut(index) {
                let decel_reachable =
                    next_entry_sq + 2.0 * block.acceleration * block.millimeters;
                block.entry_speed_sq = block.max_entry_speed_sq.min(decel_reachable);
                next_entry_sq = block.entry_speed_sq;
            }
        }

        // Forward pass (head -> tail): no block may enter faster than
        // its predecessor can accelerate to.
        let mut accel_reachable = match self.buffer.head() {
            Some(head) => head.reachable_exit_sq(head.entry_speed_sq),
            None => return,
        };
        for index in 1..len {
            if let Some(block) = self.buffer.get_mut(index) {
                if accel_reachable < block.entry_speed_sq {
                    block.entry_speed_sq = accel_reachable;
                }
                accel_reachable = block.reachable_exit_sq(block.entry_speed_sq);
            }
        }
    }

    /// Most restrictive per-axis value projected along a unit vector.
    fn limit_along<F>(&self, unit_vec: &[f32; N_AXIS], value: F) -> f32
    where
        F: Fn(&AxisKinematics) -> f32,
    {
        let mut limit = f32::MAX;
        for (axis, kin) in self.kinematics.iter().enumerate() {
            let component = unit_vec[axis];
            if component != 0.0 {
                limit = limit.min(value(kin) / fabsf(component));
            }
        }
        limit
    }

    /// Squared ceiling on the entry speed at the junction with the
    /// previous move.
    ///
    /// Bounded by the cornering-deviation formula: the junction is
    /// approximated by a circular arc that deviates from the programmed
    /// corner by at most the configured junction deviation, and the
    /// centripetal acceleration on that arc may not exceed the block's
    /// acceleration limit. Tighter corners therefore force lower
    /// junction speeds; collinear junctions are unlimited (the nominal
    /// speeds still cap the result) and full reversals stop.
    fn junction_speed_sq(
        &self,
        unit_vec: &[f32; N_AXIS],
        acceleration: f32,
        nominal_speed: f32,
    ) -> f32 {
        if self.previous_nominal_speed <= 0.0 {
            // First move after a stop begins from rest.
            return 0.0;
        }

        let mut cos_theta = 0.0f32;
        for axis in 0..N_AXIS {
            cos_theta += self.previous_unit_vec[axis] * unit_vec[axis];
        }

        let nominal_cap = nominal_speed.min(self.previous_nominal_speed);
        let nominal_cap_sq = nominal_cap * nominal_cap;

        if cos_theta > COS_EPSILON {
            // Collinear: no geometric bound.
            nominal_cap_sq
        } else if cos_theta < -COS_EPSILON {
            // Full reversal: stop at the junction.
            REVERSAL_JUNCTION_SPEED * REVERSAL_JUNCTION_SPEED
        } else {
            // Half-angle identity on the angle between the two travel
            // directions.
            let sin_half = sqrtf(0.5 * (1.0 + cos_theta));
            let junction_sq =
                (acceleration * self.junction_deviation * sin_half) / (1.0 - sin_half);
            junction_sq.min(nominal_cap_sq)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AxisKinematics;

    const ACCEL: f32 = 10.0;
    const MAX_RATE: f32 = 200.0;

    fn kinematics() -> [AxisKinematics; N_AXIS] {
        [AxisKinematics {
            steps_per_mm: 100.0,
            max_rate_mm_per_sec: MAX_RATE,
            acceleration_mm_per_sec2: ACCEL,
            invert_direction: false,
            travel: None,
        }; N_AXIS]
    }

    fn planner() -> Planner {
        Planner::new(kinematics(), 0.05)
    }

    fn feed_to(x: f32, y: f32, speed_mm_per_sec: f32) -> MotionRequest {
        MotionRequest::feed(
            [Millimeters(x), Millimeters(y), Millimeters(0.0)],
            MmPerMin(speed_mm_per_sec * 60.0),
        )
    }

    #[test]
    fn test_single_block_starts_from_rest() {
        let mut planner = planner();
        planner.enqueue(&feed_to(10.0, 0.0, 100.0)).unwrap();

        let head = planner.head().unwrap();
        assert_eq!(head.entry_speed_sq, 0.0);
        assert_eq!(head.steps[0], 1000);
        assert!((head.millimeters - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_nominal_clamped_by_axis_rate() {
        let mut planner = planner();
        planner.enqueue(&feed_to(10.0, 0.0, 500.0)).unwrap();
        let head = planner.head().unwrap();
        assert!((head.nominal_speed - MAX_RATE).abs() < 1e-3);
    }

    #[test]
    fn test_collinear_junctions_share_nominal_speed() {
        let mut planner = planner();
        // Three long collinear moves at the same speed: junction entry
        // speeds must all reach nominal, no deceleration in between.
        planner.enqueue(&feed_to(50.0, 0.0, 10.0)).unwrap();
        planner.enqueue(&feed_to(100.0, 0.0, 10.0)).unwrap();
        planner.enqueue(&feed_to(150.0, 0.0, 10.0)).unwrap();

        for index in 1..3 {
            let block = planner.get(index).unwrap();
            let entry = libm::sqrtf(block.entry_speed_sq);
            assert!(
                (entry - 10.0).abs() < 1e-3,
                "junction {} entry {} != nominal",
                index,
                entry
            );
        }
    }

    #[test]
    fn test_right_angle_junction_slows_down() {
        let mut planner = planner();
        planner.enqueue(&feed_to(100.0, 0.0, 100.0)).unwrap();
        planner.enqueue(&feed_to(100.0, 100.0, 100.0)).unwrap();

        let second = planner.get(1).unwrap();
        let junction = libm::sqrtf(second.max_entry_speed_sq);
        assert!(
            junction < 100.0,
            "90 degree corner must slow below nominal, got {}",
            junction
        );
        // sin(45) deviation bound with a=10, d=0.05.
        let sin_half = libm::sqrtf(0.5);
        let expected = (ACCEL * 0.05 * sin_half) / (1.0 - sin_half);
        assert!((second.max_entry_speed_sq - expected).abs() < 1e-3);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let mut planner = planner();
        planner.enqueue(&feed_to(100.0, 0.0, 100.0)).unwrap();
        planner.enqueue(&feed_to(100.0, 100.0, 100.0)).unwrap();
        planner.enqueue(&feed_to(0.0, 100.0, 50.0)).unwrap();

        let snapshot: heapless::Vec<f32, 16> =
            (0..planner.len()).map(|i| planner.get(i).unwrap().entry_speed_sq).collect();

        planner.recompute();

        for (index, before) in snapshot.iter().enumerate() {
            let after = planner.get(index).unwrap().entry_speed_sq;
            assert_eq!(*before, after, "recompute changed block {}", index);
        }
    }

    #[test]
    fn test_entry_never_exceeds_nominal_or_decel_chain() {
        let mut planner = planner();
        planner.enqueue(&feed_to(5.0, 0.0, 40.0)).unwrap();
        planner.enqueue(&feed_to(10.0, 0.0, 80.0)).unwrap();
        planner.enqueue(&feed_to(12.0, 0.0, 20.0)).unwrap();
        planner.enqueue(&feed_to(12.0, 30.0, 90.0)).unwrap();

        for index in 0..planner.len() {
            let block = planner.get(index).unwrap();
            assert!(
                block.entry_speed_sq <= block.nominal_speed * block.nominal_speed + 1e-3,
                "block {} entry exceeds nominal",
                index
            );
            let exit_sq = planner
                .get(index + 1)
                .map_or(0.0, |next| next.entry_speed_sq);
            assert!(
                exit_sq <= block.reachable_exit_sq(block.entry_speed_sq) + 1e-3,
                "block {} cannot reach its exit speed",
                index
            );
        }
    }

    #[test]
    fn test_buffer_full_rejection_leaves_state_unchanged() {
        let mut planner = planner();
        let mut x = 0.0;
        loop {
            x += 10.0;
            match planner.enqueue(&feed_to(x, 0.0, 50.0)) {
                Ok(()) => {}
                Err(PlanError::BufferFull) => break,
                Err(e) => panic!("unexpected error {:?}", e),
            }
        }

        let len = planner.len();
        let position = planner.planned_position();
        let entries: heapless::Vec<f32, 16> =
            (0..len).map(|i| planner.get(i).unwrap().entry_speed_sq).collect();

        let result = planner.enqueue(&feed_to(x + 10.0, 0.0, 50.0));
        assert_eq!(result, Err(PlanError::BufferFull));
        assert_eq!(planner.len(), len);
        assert_eq!(planner.planned_position(), position);
        for (index, before) in entries.iter().enumerate() {
            assert_eq!(planner.get(index).unwrap().entry_speed_sq, *before);
        }
    }

    #[test]
    fn test_soft_limit_rejected_before_entering_buffer() {
        use crate::config::TravelLimits;

        let mut kin = kinematics();
        kin[0].travel = Some(TravelLimits {
            min: Millimeters(-50.0),
            max: Millimeters(50.0),
        });
        let mut planner = Planner::new(kin, 0.05);

        let result = planner.enqueue(&feed_to(60.0, 0.0, 50.0));
        assert_eq!(result, Err(PlanError::SoftLimitExceeded { axis: 0 }));
        assert!(planner.is_empty());

        // System moves bypass soft limits (homing runs past switches).
        let mut request = feed_to(60.0, 0.0, 50.0);
        request.kind = MotionKind::System;
        planner.enqueue(&request).unwrap();
        assert_eq!(planner.len(), 1);
    }

    #[test]
    fn test_zero_length_request_is_dropped() {
        let mut planner = planner();
        planner.enqueue(&feed_to(10.0, 0.0, 50.0)).unwrap();
        planner.enqueue(&feed_to(10.0, 0.0, 50.0)).unwrap();
        assert_eq!(planner.len(), 1);
    }

    #[test]
    fn test_discard_all_resets_chain() {
        let mut planner = planner();
        planner.enqueue(&feed_to(10.0, 0.0, 50.0)).unwrap();
        planner.enqueue(&feed_to(20.0, 0.0, 50.0)).unwrap();

        planner.discard_all([123, 0, 0]);
        assert!(planner.is_empty());
        assert_eq!(planner.planned_position(), [123, 0, 0]);

        // Next block starts from rest again.
        planner.enqueue(&feed_to(30.0, 0.0, 50.0)).unwrap();
        assert_eq!(planner.head().unwrap().entry_speed_sq, 0.0);
        assert_eq!(planner.head().unwrap().max_entry_speed_sq, 0.0);
    }
}
