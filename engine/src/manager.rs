// ═══════════════════════════════════════════════════════════════════════
// Phase manager — the outer turn loop. Owns nothing but the cumulative
// event log; all game progress lives in the GameState value, so a
// suspended game can be serialized, reloaded and resumed mid-phase.
// ═══════════════════════════════════════════════════════════════════════

use crate::battle::BattlePhase;
use crate::error::{EngineError, EngineResult};
use crate::events::GameEvent;
use crate::phase::PhaseHandler;
use crate::phases::{
    BiddingPhase, CharityPhase, CollectionPhase, MentatPausePhase, NexusPhase, RevivalPhase,
    ShipmentPhase, SpiceBlowPhase, StormPhase,
};
use crate::requests::{DecisionRequest, DecisionResponse};
use crate::setup;
use crate::types::{GameState, Phase};

/// What one call to the manager produced: the new state, the events of
/// this step, and either open requests or a finished game.
pub struct StepOutput {
    pub state: GameState,
    pub events: Vec<GameEvent>,
    pub pending: Vec<DecisionRequest>,
    pub game_over: bool,
}

fn handler_for(phase: Phase) -> &'static dyn PhaseHandler {
    match phase {
        Phase::Storm => &StormPhase,
        Phase::SpiceBlow => &SpiceBlowPhase,
        Phase::Nexus => &NexusPhase,
        Phase::Charity => &CharityPhase,
        Phase::Bidding => &BiddingPhase,
        Phase::Revival => &RevivalPhase,
        Phase::Shipment => &ShipmentPhase,
        Phase::Battle => &BattlePhase,
        Phase::Collection => &CollectionPhase,
        Phase::MentatPause => &MentatPausePhase,
    }
}

#[derive(Default)]
pub struct PhaseManager {
    log: Vec<GameEvent>,
}

impl PhaseManager {
    pub fn new() -> PhaseManager {
        PhaseManager::default()
    }

    /// Every event of every step so far, in order.
    pub fn log(&self) -> &[GameEvent] {
        &self.log
    }

    /// Set up a fresh game and run it forward to the first suspension.
    pub fn start(&mut self, seed: u64) -> EngineResult<StepOutput> {
        let state = setup::create_initial_state(seed);
        let events = vec![
            GameEvent::TurnStarted { turn: state.turn },
            GameEvent::PhaseStarted { phase: state.phase },
        ];
        self.drive(state, &[], events)
    }

    /// Feed answers to the open requests and run forward again. With no
    /// answers every open decision falls back to its default.
    pub fn process_step(
        &mut self,
        state: GameState,
        responses: &[DecisionResponse],
    ) -> EngineResult<StepOutput> {
        self.drive(state, responses, Vec::new())
    }

    fn drive(
        &mut self,
        mut state: GameState,
        responses: &[DecisionResponse],
        mut events: Vec<GameEvent>,
    ) -> EngineResult<StepOutput> {
        // Answers are only meaningful to the handler that asked; after
        // its step they are spent.
        let mut live_responses = responses;
        loop {
            if state.winner.is_some() {
                return Ok(self.finish(state, events, Vec::new(), true));
            }
            let handler = handler_for(state.phase);
            let result = if !state.phase_initialized {
                state.phase_initialized = true;
                handler.initialize(state)?
            } else {
                let r = handler.process_step(state, live_responses)?;
                live_responses = &[];
                r
            };
            state = result.state;
            events.extend(result.events);

            if !result.phase_complete {
                if result.pending.is_empty() {
                    return Err(EngineError::CorruptState(
                        "phase neither completed nor suspended".into(),
                    ));
                }
                return Ok(self.finish(state, events, result.pending, false));
            }

            let finished = state.phase;
            events.push(GameEvent::PhaseEnded { phase: finished });
            if state.winner.is_some() {
                return Ok(self.finish(state, events, Vec::new(), true));
            }
            let next = finished.next();
            state.phase = next;
            state.phase_initialized = false;
            if next == Phase::Storm {
                state.turn += 1;
                events.push(GameEvent::TurnStarted { turn: state.turn });
            }
            events.push(GameEvent::PhaseStarted { phase: next });
        }
    }

    fn finish(
        &mut self,
        state: GameState,
        events: Vec<GameEvent>,
        pending: Vec<DecisionRequest>,
        game_over: bool,
    ) -> StepOutput {
        self.log.extend(events.iter().cloned());
        StepOutput { state, events, pending, game_over }
    }
}
