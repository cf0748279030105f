// Structural invariant checks, run after every mutation that can change
// territory occupancy. A failed check is fatal.

use crate::error::{EngineError, EngineResult};
use crate::map;
use crate::types::GameState;

/// No fortified territory may hold combat forces of more than two
/// factions. Advisors do not count; allies count separately.
pub fn check_stronghold_occupancy(state: &GameState) -> EngineResult<()> {
    for &id in &map::STRONGHOLDS {
        let def = map::location(id);
        let factions = state.combat_factions_in(id, def.sectors);
        if factions.len() > 2 {
            return Err(EngineError::OccupancyViolation {
                location: id,
                sectors: def.sectors.to_vec(),
                factions,
            });
        }
    }
    Ok(())
}

/// Whether a faction may bring combat forces into a territory without
/// breaking the two-faction limit. Always true off the strongholds.
pub fn may_enter(state: &GameState, faction: crate::types::Faction, id: map::LocationId) -> bool {
    let def = map::location(id);
    if !def.fortified() {
        return true;
    }
    let occupants = state.combat_factions_in(id, def.sectors);
    occupants.len() < 2 || occupants.contains(&faction)
}
