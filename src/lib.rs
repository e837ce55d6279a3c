//! agentflow - conversational agent engine
//!
//! An agent is a finite-state dialogue machine. Its transitions are guarded
//! by predicates over the session: predicted intents, received files,
//! external events, variables, and scenarios that match perception scores
//! against declared thresholds. Recognition, NLU and transports live outside
//! the crate and feed the session through [`session::Stimulus`].

pub mod config;
pub mod error;
pub mod events;
pub mod perception;
pub mod platform;
pub mod runtime;
pub mod scenario;
pub mod session;
pub mod state_machine;

pub use config::EngineConfig;
pub use error::{BodyError, ConstructionError, RuntimeError};
pub use events::{EventParams, Predicate};
pub use platform::{Payload, Platform};
pub use runtime::{SessionEvent, SessionManager};
pub use scenario::Scenario;
pub use session::{Session, Stimulus};
pub use state_machine::{StateMachine, StateMachineBuilder, StepOutcome};
