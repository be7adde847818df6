//! Configuration validation.

use crate::error::{ConfigError, Error, Result};

use super::MachineConfig;

/// Validate a machine configuration.
///
/// Checks:
/// - Per-axis scales, rates, and accelerations are positive
/// - Soft travel limits are valid (min < max)
/// - Junction deviation is positive
/// - Pulse width and timer frequency are sane
/// - Smoothing thresholds are strictly ascending
pub fn validate_config(config: &MachineConfig) -> Result<()> {
    for (index, axis) in config.axes.iter().enumerate() {
        if axis.steps_per_mm <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidStepsPerMm {
                axis: index,
                value: axis.steps_per_mm,
            }));
        }

        if axis.max_rate.0 <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidMaxRate {
                axis: index,
                value: axis.max_rate.0,
            }));
        }

        if axis.acceleration.0 <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidAcceleration {
                axis: index,
                value: axis.acceleration.0,
            }));
        }

        if let Some(ref travel) = axis.travel {
            if !travel.is_valid() {
                return Err(Error::Config(ConfigError::InvalidTravel {
                    axis: index,
                    min: travel.min.0,
                    max: travel.max.0,
                }));
            }
        }
    }

    if config.junction_deviation <= 0.0 {
        return Err(Error::Config(ConfigError::InvalidJunctionDeviation(
            config.junction_deviation,
        )));
    }

    if config.pulse_width == 0 || config.pulse_width > 255 {
        return Err(Error::Config(ConfigError::InvalidPulseWidth(
            config.pulse_width,
        )));
    }

    if config.timer_hz == 0 {
        return Err(Error::Config(ConfigError::InvalidTimerFrequency(
            config.timer_hz,
        )));
    }

    if !config.smoothing.is_valid() {
        return Err(Error::Config(ConfigError::InvalidSmoothingTable));
    }

    Ok(())
}
