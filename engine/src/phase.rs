// The phase handler seam. Every phase is a pure transformer: it takes a
// state value and produces a new state plus events, and either completes
// or suspends on a set of decision requests.

use crate::error::EngineResult;
use crate::events::GameEvent;
use crate::requests::DecisionRequest;
use crate::types::{GameState, Phase};

/// Outcome of one step of one phase.
pub struct StepResult {
    pub state: GameState,
    pub events: Vec<GameEvent>,
    /// Requests the caller must answer before the phase can proceed.
    /// Empty when the step ran to a phase boundary.
    pub pending: Vec<DecisionRequest>,
    pub phase_complete: bool,
}

impl StepResult {
    /// The phase finished in this step.
    pub fn complete(state: GameState, events: Vec<GameEvent>) -> StepResult {
        StepResult { state, events, pending: Vec::new(), phase_complete: true }
    }

    /// The phase is suspended awaiting answers.
    pub fn waiting(
        state: GameState,
        events: Vec<GameEvent>,
        pending: Vec<DecisionRequest>,
    ) -> StepResult {
        StepResult { state, events, pending, phase_complete: false }
    }
}

pub trait PhaseHandler {
    fn phase(&self) -> Phase;

    /// One-time entry work: set up the phase context, emit entry events,
    /// and possibly already suspend on requests.
    fn initialize(&self, state: GameState) -> EngineResult<StepResult>;

    /// Advance the phase using whatever answers arrived. Unanswered
    /// requests are treated as passes and defaulted deterministically.
    fn process_step(
        &self,
        state: GameState,
        responses: &[crate::requests::DecisionResponse],
    ) -> EngineResult<StepResult>;
}
