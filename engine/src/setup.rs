// ═══════════════════════════════════════════════════════════════════════
// Game setup — the fixed starting deployment, shuffled decks and traitor
// deal. Everything downstream of the seed is deterministic.
// ═══════════════════════════════════════════════════════════════════════

use im::HashMap as ImHashMap;
use rand::seq::SliceRandom;

use crate::cards;
use crate::map;
use crate::types::{
    Faction, FactionState, Forces, GameState, LeaderState, LeaderStatus, Phase, Placement,
};

fn starting_spice(f: Faction) -> u8 {
    match f {
        Faction::Atreides | Faction::Harkonnen | Faction::Emperor => 10,
        Faction::SpacingGuild | Faction::BeneGesserit => 5,
        Faction::Fremen => 3,
    }
}

fn starting_reserves(f: Faction) -> Forces {
    match f {
        Faction::Atreides | Faction::Harkonnen | Faction::Fremen => Forces::fighters(10),
        // The Sardaukar wait off-planet in full strength.
        Faction::Emperor => Forces { fighters: 15, elites: 5, advisors: 0 },
        Faction::SpacingGuild => Forces::fighters(15),
        Faction::BeneGesserit => Forces::fighters(19),
    }
}

/// Build the turn-1 state for a six-faction game. The Storm phase rolls
/// the initial storm position as its first act.
pub fn create_initial_state(seed: u64) -> GameState {
    let factions = Faction::ALL.map(|f| {
        let leaders = cards::faction_leaders(f)
            .into_iter()
            .map(|id| LeaderState { id, status: LeaderStatus::Available })
            .collect();
        FactionState {
            name: f,
            spice: starting_spice(f),
            reserves: starting_reserves(f),
            dead: Forces::default(),
            leaders,
            hand: Vec::new(),
            traitors: Vec::new(),
            ally: None,
            forces_lost_total: 0,
        }
    });

    let mut state = GameState {
        turn: 1,
        phase: Phase::Storm,
        phase_initialized: false,
        storm_sector: 0,
        storm_order: map::storm_order(0),
        factions,
        board: ImHashMap::new(),
        spice_on_board: ImHashMap::new(),
        treachery_deck: cards::treachery_deck(),
        treachery_discard: Vec::new(),
        spice_deck: cards::spice_deck(),
        spice_discard: Vec::new(),
        last_blow: None,
        nexus_flag: false,
        bidding: None,
        shipment: None,
        battle: None,
        seed,
        rng_counter: 0,
        winner: None,
    };

    // Home garrisons.
    state.add_forces(Placement::new(map::ARRAKEEN, 9), Faction::Atreides, Forces::fighters(10));
    state.add_forces(Placement::new(map::CARTHAG, 10), Faction::Harkonnen, Forces::fighters(10));
    state.add_forces(Placement::new(map::SIETCH_TABR, 13), Faction::Fremen, Forces::fighters(4));
    state.add_forces(
        Placement::new(map::FALSE_WALL_SOUTH, 4),
        Faction::Fremen,
        Forces::fighters(3),
    );
    state.add_forces(
        Placement::new(map::HABBANYA_SIETCH, 16),
        Faction::Fremen,
        Forces::fighters(3),
    );
    state.add_forces(
        Placement::new(map::TUEKS_SIETCH, 4),
        Faction::SpacingGuild,
        Forces::fighters(5),
    );
    state.add_forces(
        Placement::new(map::POLAR_SINK, 0),
        Faction::BeneGesserit,
        Forces { fighters: 0, elites: 0, advisors: 1 },
    );

    {
        let mut rng = state.next_rng();
        state.treachery_deck.shuffle(&mut rng);
    }
    {
        let mut rng = state.next_rng();
        state.spice_deck.shuffle(&mut rng);
    }

    // Traitor deal: one candidate each, four for the Harkonnen.
    {
        let mut pool: Vec<_> = cards::LEADERS.iter().map(|l| l.id).collect();
        let mut rng = state.next_rng();
        pool.shuffle(&mut rng);
        for f in Faction::ALL {
            let count = if f == Faction::Harkonnen { 4 } else { 1 };
            for _ in 0..count {
                if let Some(id) = pool.pop() {
                    state.faction_mut(f).traitors.push(id);
                }
            }
        }
    }

    // Opening hands: one card each, two for the Harkonnen.
    for f in Faction::ALL {
        let count = if f == Faction::Harkonnen { 2 } else { 1 };
        for _ in 0..count {
            if let Some(card) = state.treachery_deck.pop() {
                state.faction_mut(f).hand.push(card);
            }
        }
    }

    state
}
