// ═══════════════════════════════════════════════════════════════════════
// Battle phase — identification of battle sets and the phase handler.
// The sub-phase flow inside a battle lives in subphase.rs; the pure
// resolution math lives in resolution.rs.
// ═══════════════════════════════════════════════════════════════════════

use crate::error::{EngineError, EngineResult};
use crate::events::GameEvent;
use crate::map;
use crate::phase::{PhaseHandler, StepResult};
use crate::requests::DecisionResponse;
use crate::subphase;
use crate::types::{
    BattlePhaseContext, BattleSubPhase, Faction, GameState, PendingBattle, Phase,
};

/// Scan the board for battle sets: storm-connected sector groups where
/// two or more combat-capable factions coexist. Allied pairs never fight;
/// advisors never count. A fortified territory with more than two combat
/// factions is a broken state and aborts the game.
pub fn identify_battles(state: &GameState) -> EngineResult<Vec<PendingBattle>> {
    let mut battles = Vec::new();
    for def in map::LOCATIONS.iter() {
        for group in map::battle_groups(def, state.storm_sector) {
            let factions = state.combat_factions_in(def.id, &group);
            if factions.len() > 2 && def.fortified() {
                return Err(EngineError::OccupancyViolation {
                    location: def.id,
                    sectors: group,
                    factions,
                });
            }
            if has_hostile_pair(state, &factions) {
                battles.push(PendingBattle { location: def.id, sectors: group, factions });
            }
        }
    }
    Ok(battles)
}

pub(crate) fn has_hostile_pair(state: &GameState, factions: &[Faction]) -> bool {
    factions
        .iter()
        .enumerate()
        .any(|(i, &a)| factions[i + 1..].iter().any(|&b| !state.allied(a, b)))
}

/// Battles a given faction is obligated to fight: it is present and at
/// least one co-occupant is not its ally.
pub fn eligible_battles(state: &GameState, pending: &[PendingBattle], f: Faction) -> Vec<usize> {
    pending
        .iter()
        .enumerate()
        .filter(|(_, b)| {
            b.factions.contains(&f) && b.factions.iter().any(|&o| o != f && !state.allied(f, o))
        })
        .map(|(i, _)| i)
        .collect()
}

/// Drop battle sets that fighting elsewhere has emptied out, refreshing
/// the occupant lists of those that remain.
pub fn prune_battles(state: &GameState, pending: &mut Vec<PendingBattle>) {
    pending.retain_mut(|b| {
        b.factions = state.combat_factions_in(b.location, &b.sectors);
        has_hostile_pair(state, &b.factions)
    });
}

pub struct BattlePhase;

impl PhaseHandler for BattlePhase {
    fn phase(&self) -> Phase {
        Phase::Battle
    }

    fn initialize(&self, mut state: GameState) -> EngineResult<StepResult> {
        let pending = identify_battles(&state)?;
        if pending.is_empty() {
            return Ok(StepResult::complete(state, vec![GameEvent::NoBattles]));
        }
        state.battle = Some(BattlePhaseContext {
            pending,
            order: state.storm_order.clone(),
            index: 0,
            sub_phase: BattleSubPhase::Choosing,
            prompted: false,
            current: None,
        });
        subphase::run(state, &[])
    }

    fn process_step(
        &self,
        state: GameState,
        responses: &[DecisionResponse],
    ) -> EngineResult<StepResult> {
        subphase::run(state, responses)
    }
}
