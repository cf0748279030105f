pub mod types;
pub mod map;
pub mod cards;
pub mod error;
pub mod events;
pub mod requests;
pub mod invariants;
pub mod phase;
pub mod phases;
pub mod battle;
pub mod subphase;
pub mod resolution;
pub mod setup;
pub mod manager;

#[cfg(test)]
mod tests;

pub use error::{EngineError, EngineResult};
pub use events::{GameEvent, Severity};
pub use manager::{PhaseManager, StepOutput};
pub use requests::{ActionData, DecisionRequest, DecisionResponse, RequestContext, RequestKind};
pub use types::*;
