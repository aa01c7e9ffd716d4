mod countdown;
mod engine;
mod flow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use countdown::{Countdown, SharedAttempt, share};
pub use engine::{Attempt, TestSessionEngine, Tick};
pub use flow::TestFlowService;
