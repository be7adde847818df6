//! Machine run state.

/// Operating mode of the motion system.
///
/// Created at init in `Idle`; every transition is owned by the
/// real-time command dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunState {
    /// No motion; ready for commands.
    #[default]
    Idle,
    /// Executing buffered motion.
    Run,
    /// Feed hold: decelerated (or decelerating) to a stop, resumable
    /// with no position loss.
    Hold,
    /// Executing a jog move.
    Jog,
    /// Homing cycle in progress (driven by an external collaborator).
    Homing,
    /// Safety door open: held, spindle and coolant disabled.
    Door,
    /// Alarm: motion locked out until explicitly unlocked.
    Alarm,
    /// Sleep: everything disabled, reset required.
    Sleep,
    /// Check mode: motion requests are accepted and discarded.
    Check,
}

impl RunState {
    /// Whether step generation is permitted in this state.
    #[inline]
    pub fn can_step(self) -> bool {
        matches!(self, RunState::Run | RunState::Jog | RunState::Homing)
    }

    /// Whether new motion requests may enter the planner.
    #[inline]
    pub fn accepts_motion(self) -> bool {
        matches!(
            self,
            RunState::Idle | RunState::Run | RunState::Hold | RunState::Jog | RunState::Door
        )
    }
}
