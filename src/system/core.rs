//! Motion core facade.
//!
//! Owns the planner, segment generator, pulse scheduler, and dispatcher,
//! and wires them to a [`Board`]. The embedding calls exactly three
//! entry points from its interrupt handlers ([`MotionCore::on_timer_tick`],
//! [`MotionCore::on_limit_change`], [`MotionCore::on_control_change`])
//! and drives everything else from its main loop through
//! [`MotionCore::poll`].

use crate::config::units::{Millimeters, Steps};
use crate::config::{validate_config, AxisKinematics, MachineConfig};
use crate::error::{Error, PlanError, Result};
use crate::hal::{Board, ControlSignals, CoolantState, SpindleState};
use crate::planner::{MotionKind, MotionRequest, Planner};
use crate::segment::{FillStatus, SegmentGenerator, SegmentQueue};
use crate::stepper::StepperScheduler;
use crate::N_AXIS;

use super::dispatcher::{Action, DispatchContext, Dispatcher, Event};
use super::signals::{EventFlags, SharedPosition};
use super::state::RunState;

/// The complete motion pipeline bound to one board.
pub struct MotionCore<B: Board> {
    board: B,
    planner: Planner,
    generator: SegmentGenerator,
    queue: SegmentQueue,
    scheduler: StepperScheduler,
    dispatcher: Dispatcher,
    flags: EventFlags,
    shared_position: SharedPosition,
    kinematics: [AxisKinematics; N_AXIS],
    last_controls: ControlSignals,
    probe_result: Option<[i32; N_AXIS]>,
}

impl<B: Board> MotionCore<B> {
    /// Build the pipeline from a validated machine configuration.
    pub fn new(config: &MachineConfig, board: B) -> Result<Self> {
        validate_config(config)?;
        let kinematics = config.kinematics();
        Ok(Self {
            board,
            planner: Planner::new(kinematics, config.junction_deviation),
            generator: SegmentGenerator::new(config.timer_hz, config.smoothing),
            queue: SegmentQueue::new(),
            scheduler: StepperScheduler::new(&kinematics, config.pulse_cycles()),
            dispatcher: Dispatcher::new(),
            flags: EventFlags::new(),
            shared_position: SharedPosition::new(),
            kinematics,
            last_controls: ControlSignals::default(),
            probe_result: None,
        })
    }

    /// Current run state.
    #[inline]
    pub fn state(&self) -> RunState {
        self.dispatcher.state()
    }

    /// Absolute machine position in steps, exact in any state.
    #[inline]
    pub fn position(&self) -> [Steps; N_AXIS] {
        let position = self.scheduler.position();
        core::array::from_fn(|i| Steps(position[i]))
    }

    /// Absolute machine position in millimeters, exact in any state.
    pub fn position_mm(&self) -> [Millimeters; N_AXIS] {
        let position = self.scheduler.position();
        core::array::from_fn(|i| Steps(position[i]).to_mm(self.kinematics[i].steps_per_mm))
    }

    /// Access the board.
    #[inline]
    pub fn board(&self) -> &B {
        &self.board
    }

    /// Mutable access to the board.
    #[inline]
    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    /// Number of free planner slots.
    #[inline]
    pub fn free_slots(&self) -> usize {
        crate::planner::PLANNER_CAPACITY - self.planner.len()
    }

    /// Queue a motion request.
    ///
    /// Recoverable failures ([`PlanError::BufferFull`],
    /// [`PlanError::SoftLimitExceeded`]) leave all state untouched. Any
    /// alarm state rejects motion until [`MotionCore::unlock`] is
    /// called. Check mode accepts and discards requests.
    pub fn enqueue(&mut self, request: &MotionRequest) -> Result<()> {
        match self.dispatcher.state() {
            RunState::Alarm => {
                let kind = self
                    .dispatcher
                    .alarm()
                    .unwrap_or(crate::error::AlarmKind::EStopReset);
                return Err(Error::Alarm(kind));
            }
            RunState::Sleep => return Err(Error::Plan(PlanError::MotionLocked)),
            RunState::Check => return Ok(()),
            RunState::Homing if request.kind != MotionKind::System => {
                return Err(Error::Plan(PlanError::MotionLocked));
            }
            RunState::Jog | RunState::Idle if request.kind == MotionKind::Jog => {}
            _ if request.kind == MotionKind::Jog => {
                return Err(Error::Plan(PlanError::MotionLocked));
            }
            _ => {}
        }

        if request.is_probe && self.board.probe_state() {
            // The probe is already closed before the move begins; report
            // to the probing caller without raising a machine alarm.
            return Err(Error::Alarm(crate::error::AlarmKind::ProbeTripUnexpected));
        }

        self.planner.enqueue(request)?;

        // Jogs start immediately, without a cycle-start.
        if request.kind == MotionKind::Jog && self.dispatcher.state() == RunState::Idle {
            let ctx = self.dispatch_context();
            self.dispatcher.dispatch(Event::JogStart, ctx);
        }
        Ok(())
    }

    /// Request a feed hold (controlled deceleration, resumable).
    pub fn request_hold(&self) {
        self.flags.raise_feed_hold();
    }

    /// Request a cycle start / resume.
    pub fn request_resume(&self) {
        self.flags.raise_cycle_start();
    }

    /// Request a reset. During motion this is an emergency stop and
    /// raises an alarm; at rest it clears the buffers.
    pub fn request_reset(&self) {
        self.flags.raise_reset();
    }

    /// Explicit reset-and-unlock from an alarm state.
    pub fn unlock(&mut self) {
        let ctx = self.dispatch_context();
        self.dispatcher.dispatch(Event::Unlock, ctx);
    }

    /// Request sleep (from Idle); reset required to leave.
    pub fn request_sleep(&mut self) {
        let ctx = self.dispatch_context();
        self.dispatcher.dispatch(Event::SleepRequest, ctx);
    }

    /// Toggle check mode (accept and discard motion) while idle.
    pub fn toggle_check_mode(&mut self) {
        let ctx = self.dispatch_context();
        self.dispatcher.dispatch(Event::CheckToggle, ctx);
    }

    /// Set the feed override percentage (clamped to 10-200).
    pub fn set_feed_override(&mut self, percent: u16) {
        self.generator.overrides_mut().set_feed(percent);
    }

    /// Set the rapid override percentage (snapped to 100/50/25).
    pub fn set_rapid_override(&mut self, percent: u16) {
        self.generator.overrides_mut().set_rapid(percent);
    }

    /// Position recorded at the last probe trip, if any.
    pub fn take_probe_result(&mut self) -> Option<[i32; N_AXIS]> {
        self.probe_result.take()
    }

    /// Begin a homing cycle (external collaborator drives the moves).
    ///
    /// Fails unless the machine is idle.
    pub fn start_homing(&mut self) -> Result<()> {
        let ctx = self.dispatch_context();
        self.dispatcher.dispatch(Event::HomingStart, ctx);
        if self.dispatcher.state() == RunState::Homing {
            Ok(())
        } else {
            Err(Error::Plan(PlanError::MotionLocked))
        }
    }

    /// Finish a homing cycle, syncing all position state to the homed
    /// coordinates.
    pub fn finish_homing(&mut self, success: bool, position: [i32; N_AXIS]) {
        self.queue.clear();
        self.generator.reset();
        self.scheduler.halt();
        self.scheduler.set_position(position);
        self.shared_position.store(position);
        self.planner.discard_all(position);
        let ctx = self.dispatch_context();
        self.dispatcher.dispatch(Event::HomingEnd { success }, ctx);
    }

    /// Timer-tick entry point (interrupt context).
    ///
    /// Bounded constant-time work: probe monitoring, one scheduler
    /// tick, and the position mirror update.
    pub fn on_timer_tick(&mut self) {
        if self.generator.probing() && self.board.probe_state() {
            // Latch the trip position and stop before the next pulse.
            self.probe_result = Some(self.scheduler.position());
            self.flags.raise_probe_trip();
            self.scheduler.halt();
            self.queue.clear();
        }

        self.scheduler.on_tick(&mut self.queue, &mut self.board);
        self.shared_position.store(self.scheduler.position());
    }

    /// Limit-change entry point (signal context).
    ///
    /// Hard limit trips take the immediate-stop path here, before the
    /// cooperative context ever sees the event.
    pub fn on_limit_change(&mut self) {
        // The homing collaborator reads the switches itself.
        if self.dispatcher.state() == RunState::Homing {
            return;
        }
        if self.board.limits_state().any() {
            self.flags.raise_hard_limit();
            self.scheduler.halt();
            self.queue.clear();
        }
    }

    /// Control-signal-change entry point (signal context).
    ///
    /// Latches rising edges into the event flag word; no other work.
    pub fn on_control_change(&mut self) {
        let controls = self.board.controls_state();
        if controls.reset && !self.last_controls.reset {
            self.flags.raise_reset();
        }
        if controls.feed_hold && !self.last_controls.feed_hold {
            self.flags.raise_feed_hold();
        }
        if controls.cycle_start && !self.last_controls.cycle_start {
            self.flags.raise_cycle_start();
        }
        if controls.safety_door && !self.last_controls.safety_door {
            self.flags.raise_safety_door();
        }
        self.last_controls = controls;
    }

    /// Cooperative main-loop entry point.
    ///
    /// Drains pending events in priority order, advances the state
    /// machine, keeps the segment queue full, and reports a newly
    /// entered alarm as an error.
    pub fn poll(&mut self) -> Result<RunState> {
        let events = self.flags.take();
        let mut alarm = None;

        if events.reset {
            let action = self.dispatch(Event::Reset);
            self.execute(action, &mut alarm);
            if self.dispatcher.state() == RunState::Idle {
                // Soft reset at rest: flush everything, keep position.
                self.clear_motion_state();
            }
        }
        if events.hard_limit {
            let action = self.dispatch(Event::HardLimit);
            self.execute(action, &mut alarm);
        }
        if events.safety_door {
            let action = self.dispatch(Event::SafetyDoor);
            self.execute(action, &mut alarm);
        }
        if events.feed_hold {
            let action = self.dispatch(Event::FeedHold);
            self.execute(action, &mut alarm);
        }
        if events.probe_trip {
            // The tick context already stopped the steppers; discard the
            // rest of the probing move and return to idle.
            self.clear_motion_state();
            let action = self.dispatch(Event::MotionEnded);
            self.execute(action, &mut alarm);
        }
        if events.cycle_start {
            let action = self.dispatch(Event::CycleStart);
            self.execute(action, &mut alarm);
        }

        if let Some(kind) = alarm {
            return Err(Error::Alarm(kind));
        }

        // Segment generation: normal stepping states, plus the
        // controlled ramp-down while a hold or door decelerates.
        let state = self.dispatcher.state();
        let decelerating =
            matches!(state, RunState::Hold | RunState::Door) && !self.generator.is_held();
        if state.can_step() || decelerating {
            let status = self.generator.fill(&mut self.planner, &mut self.queue);

            if self.generator.is_held() {
                let action = self.dispatch(Event::HoldComplete);
                self.execute(action, &mut alarm);
            }

            if !self.queue.is_empty() {
                self.scheduler.wake(&mut self.board);
            } else if status == FillStatus::Drained
                && self.scheduler.is_parked()
                && state.can_step()
            {
                let action = self.dispatch(Event::MotionEnded);
                self.execute(action, &mut alarm);
            }
        }

        Ok(self.dispatcher.state())
    }

    fn dispatch_context(&self) -> DispatchContext {
        DispatchContext {
            buffer_nonempty: !self.planner.is_empty(),
            moving: !self.scheduler.is_parked(),
            held: self.generator.is_held(),
            door_open: self.board.controls_state().safety_door,
        }
    }

    fn dispatch(&mut self, event: Event) -> Action {
        let ctx = self.dispatch_context();
        self.dispatcher.dispatch(event, ctx)
    }

    fn execute(&mut self, action: Action, alarm: &mut Option<crate::error::AlarmKind>) {
        match action {
            Action::None => {}
            Action::StartHold => self.generator.begin_hold(),
            Action::StartDoorHold => {
                self.generator.begin_hold();
                self.board.spindle_set(SpindleState::Off, 0.0);
                self.board.coolant_set(CoolantState::default());
            }
            Action::Resume => {
                // Restore the outputs of the move being resumed before
                // motion continues (they were dropped on a door hold).
                if let Some(head) = self.planner.head() {
                    self.board
                        .spindle_set(head.outputs.spindle, head.outputs.spindle_rpm);
                    self.board.coolant_set(head.outputs.coolant);
                }
                self.generator.resume();
            }
            Action::AlarmStop(kind) => {
                // Immediate stop: no deceleration, queue flushed, all
                // outputs off. Position past the trip point is lost.
                self.scheduler.halt();
                self.clear_motion_state();
                self.board.spindle_set(SpindleState::Off, 0.0);
                self.board.coolant_set(CoolantState::default());
                self.board.steppers_enable(false);
                *alarm = Some(kind);
            }
        }
    }

    /// Flush planner, generator, and queue; resync the planned position
    /// to the actual machine position.
    fn clear_motion_state(&mut self) {
        self.queue.clear();
        self.generator.reset();
        let position = self.scheduler.position();
        self.planner.discard_all(position);
        self.shared_position.store(position);
    }
}
