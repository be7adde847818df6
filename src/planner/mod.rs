//! Motion planner module.
//!
//! Provides the look-ahead block buffer and two-pass velocity profile
//! recomputation.

mod block;
mod buffer;
mod plan;

pub use block::{Block, MotionKind};
pub use buffer::{PlannerBuffer, PLANNER_CAPACITY};
pub use plan::{MotionRequest, Planner};
