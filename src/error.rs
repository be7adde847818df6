//! Error types for motion-core.
//!
//! Provides unified error handling across configuration, motion planning,
//! and alarm reporting. Timing-critical contexts (timer tick, signal
//! handlers) never construct these directly; they raise atomic flags that
//! the cooperative context translates into error values.

use core::fmt;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all motion-core operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Motion planning error (recoverable, reported at enqueue time)
    Plan(PlanError),
    /// Alarm condition (fatal for the current cycle, requires unlock)
    Alarm(AlarmKind),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// Invalid steps-per-mm scale (must be > 0)
    InvalidStepsPerMm {
        /// Axis index
        axis: usize,
        /// Offending value
        value: f32,
    },
    /// Invalid maximum rate (must be > 0)
    InvalidMaxRate {
        /// Axis index
        axis: usize,
        /// Offending value
        value: f32,
    },
    /// Invalid acceleration (must be > 0)
    InvalidAcceleration {
        /// Axis index
        axis: usize,
        /// Offending value
        value: f32,
    },
    /// Invalid travel range (min must be < max)
    InvalidTravel {
        /// Axis index
        axis: usize,
        /// Minimum travel value
        min: f32,
        /// Maximum travel value
        max: f32,
    },
    /// Invalid junction deviation (must be > 0)
    InvalidJunctionDeviation(f32),
    /// Invalid step pulse width (must be 1-255 microseconds)
    InvalidPulseWidth(u32),
    /// Invalid step timer frequency (must be > 0)
    InvalidTimerFrequency(u32),
    /// Smoothing thresholds must be strictly ascending
    InvalidSmoothingTable,
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// Motion planning errors reported at enqueue time.
///
/// These are recoverable: the caller retries or corrects the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlanError {
    /// Look-ahead buffer has no free slot; retry after the buffer drains
    BufferFull,
    /// Target violates a configured soft travel limit; block never entered
    SoftLimitExceeded {
        /// Axis that would exceed its travel
        axis: usize,
    },
    /// Machine state does not accept new motion (sleeping or homing)
    MotionLocked,
}

/// Alarm conditions.
///
/// An alarm is fatal for the current cycle: motion halts, new motion is
/// rejected until an explicit unlock, and machine position may need
/// re-homing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmKind {
    /// A hard limit switch tripped during motion; position beyond the
    /// tripped limit is considered lost
    HardLimitTrip,
    /// Reset/emergency-stop was raised while motion was in progress
    EStopReset,
    /// Probe tripped outside a probing move
    ProbeTripUnexpected,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Plan(e) => write!(f, "Planning error: {}", e),
            Error::Alarm(e) => write!(f, "Alarm: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::InvalidStepsPerMm { axis, value } => {
                write!(f, "Axis {}: invalid steps/mm {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidMaxRate { axis, value } => {
                write!(f, "Axis {}: invalid max rate {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidAcceleration { axis, value } => {
                write!(f, "Axis {}: invalid acceleration {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidTravel { axis, min, max } => {
                write!(
                    f,
                    "Axis {}: invalid travel: min ({}) must be < max ({})",
                    axis, min, max
                )
            }
            ConfigError::InvalidJunctionDeviation(v) => {
                write!(f, "Invalid junction deviation: {}. Must be > 0", v)
            }
            ConfigError::InvalidPulseWidth(v) => {
                write!(f, "Invalid step pulse width: {} us. Must be 1-255", v)
            }
            ConfigError::InvalidTimerFrequency(v) => {
                write!(f, "Invalid step timer frequency: {}. Must be > 0", v)
            }
            ConfigError::InvalidSmoothingTable => {
                write!(f, "Step smoothing thresholds must be strictly ascending")
            }
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::BufferFull => write!(f, "Planner buffer full"),
            PlanError::SoftLimitExceeded { axis } => {
                write!(f, "Target exceeds soft travel limit on axis {}", axis)
            }
            PlanError::MotionLocked => {
                write!(f, "Machine state does not accept new motion")
            }
        }
    }
}

impl fmt::Display for AlarmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlarmKind::HardLimitTrip => write!(f, "Hard limit tripped, machine must be re-homed"),
            AlarmKind::EStopReset => write!(f, "Reset raised during motion"),
            AlarmKind::ProbeTripUnexpected => write!(f, "Probe tripped outside a probing move"),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<PlanError> for Error {
    fn from(e: PlanError) -> Self {
        Error::Plan(e)
    }
}

impl From<AlarmKind> for Error {
    fn from(e: AlarmKind) -> Self {
        Error::Alarm(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for PlanError {}

#[cfg(feature = "std")]
impl std::error::Error for AlarmKind {}
