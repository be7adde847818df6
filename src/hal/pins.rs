//! Reference board implementation over embedded-hal 1.0 pins.
//!
//! [`PinBoard`] drives STEP/DIR pin pairs directly with `OutputPin` and
//! times the pulse width with `DelayNs`. It is intended for bring-up,
//! host-side testing, and boards whose step generation is simple GPIO;
//! production targets with dedicated step timers implement [`Board`]
//! directly against their peripherals.
//!
//! Input signals (limits, controls, probe) and the spindle feedback are
//! plain fields the embedding updates from its own pin-change handlers.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::N_AXIS;

use super::{
    AxisSet, Board, BoardCapabilities, ControlSignals, CoolantState, Direction, SpindleState,
};

/// GPIO-backed board: one STEP and one DIR pin per axis.
pub struct PinBoard<STEP, DIR, DELAY>
where
    STEP: OutputPin,
    DIR: OutputPin,
    DELAY: DelayNs,
{
    /// STEP pins, in axis order.
    step_pins: [STEP; N_AXIS],

    /// DIR pins, in axis order.
    dir_pins: [DIR; N_AXIS],

    /// Delay provider for pulse-width timing.
    delay: DELAY,

    /// Step timer frequency used to convert pulse cycles to time.
    timer_hz: u32,

    /// Last programmed timer period in cycles per tick.
    cycles_per_tick: u32,

    /// Whether the stepper drivers are energized.
    enabled: bool,

    /// Limit switch states, updated by the embedding.
    pub limits: AxisSet,

    /// Control signal states, updated by the embedding.
    pub controls: ControlSignals,

    /// Probe input state, updated by the embedding.
    pub probe: bool,

    /// Last commanded spindle state.
    spindle: SpindleState,

    /// Last commanded spindle speed in RPM.
    spindle_rpm: f32,

    /// Last commanded coolant state.
    coolant: CoolantState,
}

impl<STEP, DIR, DELAY> PinBoard<STEP, DIR, DELAY>
where
    STEP: OutputPin,
    DIR: OutputPin,
    DELAY: DelayNs,
{
    /// Create a new pin-backed board.
    pub fn new(step_pins: [STEP; N_AXIS], dir_pins: [DIR; N_AXIS], delay: DELAY, timer_hz: u32) -> Self {
        Self {
            step_pins,
            dir_pins,
            delay,
            timer_hz,
            cycles_per_tick: 0,
            enabled: false,
            limits: AxisSet::NONE,
            controls: ControlSignals::default(),
            probe: false,
            spindle: SpindleState::Off,
            spindle_rpm: 0.0,
            coolant: CoolantState::default(),
        }
    }

    /// Get the last programmed timer period.
    #[inline]
    pub fn cycles_per_tick(&self) -> u32 {
        self.cycles_per_tick
    }

    /// Check if the stepper drivers are energized.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get the last commanded spindle output.
    #[inline]
    pub fn spindle(&self) -> (SpindleState, f32) {
        (self.spindle, self.spindle_rpm)
    }

    /// Get the last commanded coolant output.
    #[inline]
    pub fn coolant(&self) -> CoolantState {
        self.coolant
    }

    /// Release the pins and delay provider.
    pub fn free(self) -> ([STEP; N_AXIS], [DIR; N_AXIS], DELAY) {
        (self.step_pins, self.dir_pins, self.delay)
    }
}

impl<STEP, DIR, DELAY> Board for PinBoard<STEP, DIR, DELAY>
where
    STEP: OutputPin,
    DIR: OutputPin,
    DELAY: DelayNs,
{
    fn pulse_start(&mut self, axis: usize, direction: Direction, pulse_cycles: u32) {
        let dir_high = direction == Direction::Positive;
        if dir_high {
            let _ = self.dir_pins[axis].set_high();
        } else {
            let _ = self.dir_pins[axis].set_low();
        }

        let _ = self.step_pins[axis].set_high();

        let pulse_ns = (pulse_cycles as u64 * 1_000_000_000 / self.timer_hz as u64) as u32;
        self.delay.delay_ns(pulse_ns);

        let _ = self.step_pins[axis].set_low();
    }

    fn set_cycles_per_tick(&mut self, cycles: u32) {
        self.cycles_per_tick = cycles;
    }

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
        self.spindle = state;
        self.spindle_rpm = rpm;
    }

    fn spindle_rpm(&self) -> f32 {
        self.spindle_rpm
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
