//! Real-time command dispatcher.
//!
//! State machine over [`RunState`]. Events arrive at the highest
//! priority, independent of normal buffer draining; the dispatcher
//! decides the new state and which recovery action the owning context
//! must execute. It alone holds the authority for the immediate-stop
//! path taken on Alarm transitions; every other transition cooperates
//! with in-flight segments so position is never lost.

use crate::error::AlarmKind;

use super::state::RunState;

/// An event the dispatcher reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Cycle start / resume (button or API).
    CycleStart,
    /// Feed hold (button or API).
    FeedHold,
    /// Reset / emergency stop.
    Reset,
    /// Safety door opened.
    SafetyDoor,
    /// Hard limit switch tripped.
    HardLimit,
    /// The generator finished decelerating to zero under a hold.
    HoldComplete,
    /// Buffer, queue, and scheduler all drained.
    MotionEnded,
    /// A jog block was accepted while idle.
    JogStart,
    /// External homing collaborator starts a homing cycle.
    HomingStart,
    /// External homing collaborator finished (success or failure).
    HomingEnd {
        /// Whether every axis found its switch.
        success: bool,
    },
    /// Explicit reset-and-unlock command.
    Unlock,
    /// Sleep request.
    SleepRequest,
    /// Toggle check mode (dry run).
    CheckToggle,
}

/// Context the dispatcher needs to resolve a transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchContext {
    /// The planner buffer holds at least one block.
    pub buffer_nonempty: bool,
    /// Steps are still being emitted (scheduler not parked).
    pub moving: bool,
    /// The hold deceleration has reached zero speed.
    pub held: bool,
    /// The safety door input currently reads open.
    pub door_open: bool,
}

/// Recovery action the owning context must execute after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Nothing to do.
    None,
    /// Begin controlled deceleration to zero speed.
    StartHold,
    /// Begin controlled deceleration and disable spindle/coolant.
    StartDoorHold,
    /// Resume generation (restoring outputs first if held for a door).
    Resume,
    /// Immediate stop: flush queues, kill outputs, positions past the
    /// trip point are lost.
    AlarmStop(AlarmKind),
}

/// Real-time command dispatcher.
#[derive(Debug, Default)]
pub struct Dispatcher {
    state: RunState,
    alarm: Option<AlarmKind>,
}

impl Dispatcher {
    /// Create a dispatcher in the Idle state.
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
            alarm: None,
        }
    }

    /// Current run state.
    #[inline]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// The active alarm, if any.
    #[inline]
    pub fn alarm(&self) -> Option<AlarmKind> {
        self.alarm
    }

    /// Process one event, returning the action the owning context must
    /// execute.
    pub fn dispatch(&mut self, event: Event, ctx: DispatchContext) -> Action {
        use RunState::*;

        match event {
            Event::Reset => {
                // A reset while steps are in flight loses position:
                // alarm. This includes the deceleration tail of a hold.
                if ctx.moving {
                    return self.enter_alarm(AlarmKind::EStopReset);
                }
                match self.state {
                    Alarm | Sleep => Action::None,
                    _ => {
                        self.state = Idle;
                        Action::None
                    }
                }
            }

            Event::HardLimit => self.enter_alarm(AlarmKind::HardLimitTrip),

            Event::SafetyDoor => match self.state {
                Alarm | Sleep | Door => Action::None,
                Homing => self.enter_alarm(AlarmKind::HardLimitTrip),
                _ => {
                    self.state = Door;
                    Action::StartDoorHold
                }
            },

            Event::FeedHold => match self.state {
                Run | Jog => {
                    self.state = Hold;
                    Action::StartHold
                }
                _ => Action::None,
            },

            Event::CycleStart => match self.state {
                Idle if ctx.buffer_nonempty => {
                    self.state = Run;
                    Action::Resume
                }
                Hold if ctx.held => {
                    self.state = Run;
                    Action::Resume
                }
                Door if ctx.held && !ctx.door_open => {
                    self.state = Run;
                    Action::Resume
                }
                _ => Action::None,
            },

            Event::HoldComplete => Action::None,

            Event::MotionEnded => match self.state {
                Run | Jog => {
                    self.state = Idle;
                    Action::None
                }
                _ => Action::None,
            },

            Event::JogStart => match self.state {
                Idle => {
                    self.state = Jog;
                    Action::Resume
                }
                _ => Action::None,
            },

            Event::HomingStart => match self.state {
                Idle => {
                    self.state = Homing;
                    Action::None
                }
                _ => Action::None,
            },

            Event::HomingEnd { success } => match self.state {
                Homing => {
                    if success {
                        self.state = Idle;
                        Action::None
                    } else {
                        self.enter_alarm(AlarmKind::HardLimitTrip)
                    }
                }
                _ => Action::None,
            },

            Event::Unlock => match self.state {
                Alarm => {
                    self.state = Idle;
                    self.alarm = None;
                    Action::None
                }
                _ => Action::None,
            },

            Event::SleepRequest => match self.state {
                Idle | Alarm => {
                    self.state = Sleep;
                    Action::None
                }
                _ => Action::None,
            },

            Event::CheckToggle => match self.state {
                Idle => {
                    self.state = Check;
                    Action::None
                }
                Check => {
                    self.state = Idle;
                    Action::None
                }
                _ => Action::None,
            },
        }
    }

    fn enter_alarm(&mut self, kind: AlarmKind) -> Action {
        // First alarm wins; later trips do not overwrite the cause.
        if self.state != RunState::Alarm {
            self.state = RunState::Alarm;
            self.alarm = Some(kind);
            Action::AlarmStop(kind)
        } else {
            Action::None
        }
    }
}
