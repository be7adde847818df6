//! Integration tests for motion-core.
//!
//! These tests verify the complete pipeline from TOML configuration to
//! step pulses on a board: planning invariants, step conservation,
//! hold/resume position exactness, and the hard-limit stop path.

use motion_core::config::units::{Millimeters, MmPerMin};
use motion_core::hal::{
    AxisSet, Board, BoardCapabilities, ControlSignals, CoolantState, Direction, SpindleState,
};
use motion_core::planner::{MotionRequest, Planner};
use motion_core::segment::{FillStatus, SegmentGenerator, SegmentQueue};
use motion_core::{AlarmKind, Error, MotionCore, RunState, N_AXIS};

use proptest::prelude::*;

// =============================================================================
// Test configuration data
// =============================================================================

const MACHINE_CONFIG: &str = r#"
junction_deviation_mm = 0.01
pulse_width_us = 10
timer_hz = 1000000

[[axes]]
name = "X"
steps_per_mm = 100.0
max_rate_mm_per_min = 6000.0
acceleration_mm_per_sec2 = 200.0

[[axes]]
name = "Y"
steps_per_mm = 100.0
max_rate_mm_per_min = 6000.0
acceleration_mm_per_sec2 = 200.0

[[axes]]
name = "Z"
steps_per_mm = 400.0
max_rate_mm_per_min = 1500.0
acceleration_mm_per_sec2 = 50.0

[axes.travel]
min_mm = -120.0
max_mm = 0.0
"#;

/// Board stub recording every pulse.
struct SimBoard {
    pulses: [u64; N_AXIS],
    net_steps: [i64; N_AXIS],
    limits: AxisSet,
    controls: ControlSignals,
    probe: bool,
    spindle: (SpindleState, f32),
    coolant: CoolantState,
    enabled: bool,
}

impl SimBoard {
    fn new() -> Self {
        Self {
            pulses: [0; N_AXIS],
            net_steps: [0; N_AXIS],
            limits: AxisSet::NONE,
            controls: ControlSignals::default(),
            probe: false,
            spindle: (SpindleState::Off, 0.0),
            coolant: CoolantState::default(),
            enabled: false,
        }
    }
}

impl Board for SimBoard {
    fn pulse_start(&mut self, axis: usize, direction: Direction, _pulse_cycles: u32) {
        self.pulses[axis] += 1;
        self.net_steps[axis] += direction.sign() as i64;
    }

    fn set_cycles_per_tick(&mut self, _cycles: u32) {}

    fn steppers_enable(&mut self, enable: bool) {
        self.enabled = enable;
    }

    fn limits_state(&self) -> AxisSet {
        self.limits
    }

    fn controls_state(&self) -> ControlSignals {
        self.controls
    }

    fn probe_state(&self) -> bool {
        self.probe
    }

    fn spindle_set(&mut self, state: SpindleState, rpm: f32) {
        self.spindle = (state, rpm);
    }

    fn spindle_rpm(&self) -> f32 {
        self.spindle.1
    }

    fn coolant_set(&mut self, state: CoolantState) {
        self.coolant = state;
    }

    fn capabilities(&self) -> BoardCapabilities {
        BoardCapabilities {
            safety_door: true,
            variable_spindle: true,
            probe: true,
            software_debounce: false,
        }
    }
}

fn make_core() -> MotionCore<SimBoard> {
    let config = motion_core::config::parse_config(MACHINE_CONFIG).expect("valid TOML");
    MotionCore::new(&config, SimBoard::new()).expect("valid configuration")
}

fn run_until_idle(core: &mut MotionCore<SimBoard>) {
    for _ in 0..2_000_000 {
        core.on_timer_tick();
        if core.poll().expect("no alarm expected") == RunState::Idle {
            return;
        }
    }
    panic!("pipeline never settled");
}

fn feed(x: f32, y: f32, z: f32, feed_mm_per_min: f32) -> MotionRequest {
    MotionRequest::feed(
        [Millimeters(x), Millimeters(y), Millimeters(z)],
        MmPerMin(feed_mm_per_min),
    )
}

// =============================================================================
// End-to-end pipeline
// =============================================================================

#[test]
fn config_to_pulses_round_trip() {
    let mut core = make_core();

    core.enqueue(&feed(3.0, -1.5, -0.25, 3000.0)).unwrap();
    core.request_resume();
    run_until_idle(&mut core);

    // 100 steps/mm on X/Y, 400 on Z.
    assert_eq!(core.board().net_steps, [300, -150, -100]);
    assert_eq!(core.position()[0].value(), 300);
    assert_eq!(core.position()[1].value(), -150);
    assert_eq!(core.position()[2].value(), -100);
}

#[test]
fn multi_block_program_conserves_every_step() {
    let mut core = make_core();

    // A closed rectangle in XY with a Z plunge: net motion zero.
    core.enqueue(&feed(0.0, 0.0, -2.0, 1200.0)).unwrap();
    core.enqueue(&feed(25.0, 0.0, -2.0, 4000.0)).unwrap();
    core.enqueue(&feed(25.0, 15.0, -2.0, 4000.0)).unwrap();
    core.enqueue(&feed(0.0, 15.0, -2.0, 4000.0)).unwrap();
    core.enqueue(&feed(0.0, 0.0, -2.0, 4000.0)).unwrap();
    core.enqueue(&feed(0.0, 0.0, 0.0, 1200.0)).unwrap();
    core.request_resume();
    run_until_idle(&mut core);

    assert_eq!(core.board().net_steps, [0, 0, 0]);
    assert_eq!(core.position()[0].value(), 0);
    // Pulse totals show the full path was traversed, not skipped.
    assert_eq!(core.board().pulses[0], 5000);
    assert_eq!(core.board().pulses[1], 3000);
    assert_eq!(core.board().pulses[2], 1600);
}

#[test]
fn soft_limit_rejected_at_enqueue() {
    let mut core = make_core();

    // Z travel is limited to [-120, 0].
    let result = core.enqueue(&feed(0.0, 0.0, 1.0, 600.0));
    assert_eq!(
        result,
        Err(Error::Plan(motion_core::PlanError::SoftLimitExceeded {
            axis: 2
        }))
    );
    // Nothing entered the buffer; a cycle start does nothing.
    core.request_resume();
    for _ in 0..100 {
        core.on_timer_tick();
        core.poll().unwrap();
    }
    assert_eq!(core.board().pulses, [0, 0, 0]);
}

#[test]
fn hold_then_resume_matches_uninterrupted_run() {
    let program = [
        feed(40.0, 0.0, 0.0, 5000.0),
        feed(40.0, 25.0, 0.0, 5000.0),
        feed(60.0, 25.0, -1.0, 2000.0),
    ];

    let mut reference = make_core();
    for request in &program {
        reference.enqueue(request).unwrap();
    }
    reference.request_resume();
    run_until_idle(&mut reference);
    let expected: Vec<i32> = reference.position().iter().map(|s| s.value()).collect();

    let mut core = make_core();
    for request in &program {
        core.enqueue(request).unwrap();
    }
    core.request_resume();

    // Interrupt mid-program.
    for _ in 0..4000 {
        core.on_timer_tick();
        core.poll().unwrap();
    }
    core.request_hold();
    for _ in 0..400_000 {
        core.on_timer_tick();
        core.poll().unwrap();
        if core.state() == RunState::Hold && !core.board().enabled {
            break;
        }
    }
    assert_eq!(core.state(), RunState::Hold);

    core.request_resume();
    run_until_idle(&mut core);

    let actual: Vec<i32> = core.position().iter().map(|s| s.value()).collect();
    assert_eq!(actual, expected);
}

#[test]
fn hard_limit_with_queued_segments_stops_dead() {
    let mut core = make_core();
    core.enqueue(&feed(80.0, 0.0, 0.0, 6000.0)).unwrap();
    core.request_resume();

    for _ in 0..3000 {
        core.on_timer_tick();
        core.poll().unwrap();
    }
    assert!(core.board().pulses[0] > 0, "move never started");

    // Limit trip from the signal context while segments are queued.
    core.board_mut().limits.set(0, true);
    core.on_limit_change();
    let pulses_at_trip = core.board().pulses[0];

    for _ in 0..50 {
        core.on_timer_tick();
    }
    assert_eq!(core.board().pulses[0], pulses_at_trip);

    assert_eq!(core.poll(), Err(Error::Alarm(AlarmKind::HardLimitTrip)));
    assert_eq!(core.state(), RunState::Alarm);

    // Position is still exact and readable while alarmed.
    assert_eq!(core.position()[0].value() as u64, pulses_at_trip);

    // Enqueue stays locked until the explicit unlock.
    assert!(matches!(
        core.enqueue(&feed(1.0, 0.0, 0.0, 600.0)),
        Err(Error::Alarm(AlarmKind::HardLimitTrip))
    ));
    core.unlock();
    assert_eq!(core.state(), RunState::Idle);
}

#[test]
fn door_open_holds_and_kills_outputs() {
    let mut core = make_core();
    let mut request = feed(50.0, 0.0, 0.0, 5000.0);
    request.outputs.spindle = SpindleState::Cw;
    request.outputs.spindle_rpm = 10000.0;
    request.outputs.coolant.flood = true;
    core.enqueue(&request).unwrap();
    core.request_resume();

    for _ in 0..2000 {
        core.on_timer_tick();
        core.poll().unwrap();
    }
    assert_eq!(core.board().spindle.0, SpindleState::Cw);
    assert!(core.board().coolant.flood);

    core.board_mut().controls.safety_door = true;
    core.on_control_change();
    core.poll().unwrap();

    assert_eq!(core.state(), RunState::Door);
    assert_eq!(core.board().spindle.0, SpindleState::Off);
    assert!(!core.board().coolant.flood);
}

// =============================================================================
// Planner + generator property tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever is enqueued, the recomputed profile is kinematically
    /// feasible: entry speeds never exceed nominal, and every exit
    /// speed is reachable from the entry under the block's
    /// acceleration over its distance.
    #[test]
    fn prop_planner_profile_is_feasible(
        targets in prop::collection::vec(
            (-100.0f32..100.0, -100.0f32..100.0, -100.0f32..0.0),
            1..12
        ),
        feeds in prop::collection::vec(120.0f32..6000.0, 12)
    ) {
        let config = motion_core::config::parse_config(MACHINE_CONFIG).unwrap();
        let mut planner = Planner::new(config.kinematics(), config.junction_deviation);

        for (index, (x, y, z)) in targets.iter().enumerate() {
            let request = feed(*x, *y, *z, feeds[index]);
            // Buffer-full is legal here; everything else is a bug.
            match planner.enqueue(&request) {
                Ok(()) | Err(motion_core::PlanError::BufferFull) => {}
                Err(e) => prop_assert!(false, "unexpected error {:?}", e),
            }
        }

        for index in 0..planner.len() {
            let block = planner.get(index).unwrap();
            prop_assert!(
                block.entry_speed_sq
                    <= block.nominal_speed * block.nominal_speed + 1e-2
            );
            prop_assert!(block.entry_speed_sq <= block.max_entry_speed_sq + 1e-2);
            let exit_sq = planner
                .get(index + 1)
                .map_or(0.0, |next| next.entry_speed_sq);
            prop_assert!(
                exit_sq
                    <= block.entry_speed_sq
                        + 2.0 * block.acceleration * block.millimeters
                        + 1e-2
            );
        }
    }

    /// Summing per-axis steps across all generated segments equals the
    /// commanded deltas exactly: no step is ever lost or invented.
    #[test]
    fn prop_no_step_loss_through_segmentation(
        targets in prop::collection::vec(
            (-40.0f32..40.0, -40.0f32..40.0, -10.0f32..0.0),
            1..5
        ),
        feed_rate in 600.0f32..6000.0
    ) {
        let config = motion_core::config::parse_config(MACHINE_CONFIG).unwrap();
        let mut planner = Planner::new(config.kinematics(), config.junction_deviation);
        let mut generator = SegmentGenerator::new(config.timer_hz, config.smoothing);
        let mut queue = SegmentQueue::new();

        for (x, y, z) in &targets {
            let _ = planner.enqueue(&feed(*x, *y, *z, feed_rate));
        }
        let expected = planner.planned_position();

        let mut net = [0i64; N_AXIS];
        for _ in 0..1_000_000 {
            let status = generator.fill(&mut planner, &mut queue);
            while let Some(segment) = queue.pop_front() {
                for axis in 0..N_AXIS {
                    net[axis] += segment.direction[axis].sign() as i64
                        * segment.steps[axis] as i64;
                }
            }
            if status == FillStatus::Drained {
                break;
            }
        }

        for axis in 0..N_AXIS {
            prop_assert_eq!(net[axis], expected[axis] as i64);
        }
    }
}
