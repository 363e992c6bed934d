//! Stream accumulation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! [`transition`] maps `(state, event)` to a new state plus effects, and
//! [`StreamAccumulator`] owns the state for one exchange at a time.

mod accumulator;
mod effect;
mod event;
mod state;
mod transition;

#[cfg(test)]
mod proptests;

pub use accumulator::StreamAccumulator;
pub use effect::Effect;
pub use event::StreamEvent;
pub use state::{SettledOutcome, StreamPhase, StreamSnapshot, StreamState};
pub use transition::transition;
