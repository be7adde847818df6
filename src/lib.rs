//! # motion-core
//!
//! Real-time look-ahead motion planning and step generation for
//! multi-axis stepper machines (CNC, laser, router class).
//!
//! ## Features
//!
//! - **Look-ahead planning**: junction-deviation cornering bounds and a
//!   two-pass velocity recomputation over a bounded block buffer
//! - **Fixed-tick segments**: trapezoidal profiles sliced into exact
//!   per-axis step counts with live feed/rapid overrides
//! - **Interrupt-safe stepping**: per-tick multi-axis step algorithm
//!   with adaptive step smoothing at low rates, no step ever lost
//! - **Real-time dispatch**: feed hold, safety door, hard limits, and
//!   reset handled at highest priority with exact resumable position
//! - **Configuration-driven**: define axes and tuning in TOML files
//! - **no_std compatible**: core library works without standard library
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use motion_core::{load_config, MotionCore, MotionRequest};
//!
//! // Load configuration from TOML
//! let config = motion_core::load_config("machine.toml")?;
//!
//! // Bind the pipeline to a board implementation
//! let mut core = MotionCore::new(&config, board)?;
//!
//! // Queue motion and start the cycle
//! core.enqueue(&MotionRequest::feed(target, feed_rate))?;
//! core.request_resume();
//!
//! // From the timer interrupt:  core.on_timer_tick();
//! // From pin-change handlers:  core.on_limit_change();
//! //                            core.on_control_change();
//! // From the main loop:        core.poll()?;
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O and TOML parsing
//! - `alloc`: Enables heap allocation for no_std with allocator
//! - `defmt`: Enables defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

#[cfg(feature = "alloc")]
extern crate alloc;

/// Number of machine axes (compile-time constant).
pub const N_AXIS: usize = 3;

// Core modules
pub mod config;
pub mod error;
pub mod hal;
pub mod planner;
pub mod segment;
pub mod stepper;
pub mod system;

// Re-exports for ergonomic API
pub use config::{validate_config, AxisConfig, MachineConfig, SmoothingTable};
pub use error::{AlarmKind, Error, PlanError, Result};
pub use hal::{Board, CoolantState, Direction, OutputSnapshot, SpindleState};
pub use planner::{MotionKind, MotionRequest, Planner};
pub use segment::{Segment, SegmentGenerator};
pub use stepper::StepperScheduler;
pub use system::{MotionCore, RunState};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::load_config;

// Unit types
pub use config::units::{Millimeters, MmPerMin, MmPerSec2, Steps};
