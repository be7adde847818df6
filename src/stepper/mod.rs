//! Stepper pulse scheduling module.
//!
//! Runs the per-tick multi-axis step algorithm inside the timer
//! interrupt context.

mod scheduler;

pub use scheduler::{StepperScheduler, TickOutcome};
