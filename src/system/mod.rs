//! System module: run state, real-time dispatcher, cross-context
//! signals, and the motion core facade.

mod core;
mod dispatcher;
mod signals;
mod state;

pub use self::core::MotionCore;
pub use dispatcher::{Action, DispatchContext, Dispatcher, Event};
pub use signals::{EventFlags, PendingEvents, SharedPosition};
pub use state::RunState;
