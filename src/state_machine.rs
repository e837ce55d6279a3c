//! Dialogue state machine
//!
//! An agent is a graph of named states joined by guarded transitions. It is
//! defined once with [`StateMachineBuilder`] and then shared by every session;
//! [`StateMachine::step`] advances one session after each stimulus.

mod builder;
mod machine;
pub mod state;
mod transition;

#[cfg(test)]
mod proptests;

pub use builder::{StateBuilder, StateMachineBuilder};
pub use machine::StateMachine;
pub use state::{Body, State, Transition};
pub use transition::{FallbackScope, StepOutcome};
