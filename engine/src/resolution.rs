// ═══════════════════════════════════════════════════════════════════════
// Battle resolution — the pure math of two revealed plans. `resolve`
// computes a BattleResult without touching the state; `apply` carries a
// result into the state. Keeping them apart keeps the math testable.
// ═══════════════════════════════════════════════════════════════════════

use crate::cards;
use crate::error::{EngineError, EngineResult};
use crate::events::GameEvent;
use crate::map;
use crate::phases::destroy_forces;
use crate::types::{
    BattlePlan, BattleResult, CardKind, CurrentBattle, Faction, Forces, GameState, LeaderStatus,
    Placement, ResultKind, SideOutcome,
};

/// Whether `offense` kills the leader behind `defense`. Worthless cards
/// threaten nobody; a lasgun without an opposing shield kills like any
/// other weapon (with a shield it never reaches this path).
fn weapon_kills(offense: Option<CardKind>, defense: Option<CardKind>) -> bool {
    match offense {
        Some(CardKind::Worthless) | None => false,
        Some(w) => match w.countered_by() {
            Some(needed) => defense != Some(needed),
            None => true,
        },
    }
}

/// Total battle strength of one side. Elites count double; committed
/// spice adds one per point up to the dial; a surviving leader adds its
/// strength; the boost adds a flat two.
fn side_total(plan: &BattlePlan, leader_survives: bool) -> u16 {
    let mut total = u16::from(plan.fighters) + 2 * u16::from(plan.elites);
    total += u16::from(plan.spice.min(plan.dialed()));
    if leader_survives {
        if let Some(id) = plan.leader {
            total += u16::from(cards::leader(id).strength);
        }
    }
    if plan.boost {
        total += 2;
    }
    total
}

fn outcome(faction: Faction, total: u16, forces_lost: Forces, plan: &BattlePlan, dead: bool) -> SideOutcome {
    SideOutcome {
        faction,
        total,
        forces_lost,
        leader_killed: if dead { plan.leader } else { None },
    }
}

/// Compute the result of a fully revealed battle. Ties break toward the
/// side earlier in the aggressor order.
pub fn resolve(
    state: &GameState,
    order: &[Faction],
    current: &CurrentBattle,
) -> EngineResult<BattleResult> {
    let ap = current
        .aggressor_plan
        .ok_or_else(|| EngineError::CorruptState("resolution without aggressor plan".into()))?;
    let dp = current
        .defender_plan
        .ok_or_else(|| EngineError::CorruptState("resolution without defender plan".into()))?;
    let (agg, def) = (current.aggressor, current.defender);
    let agg_group = state.forces_in_group(agg, current.location, &current.sectors);
    let def_group = state.forces_in_group(def, current.location, &current.sectors);
    let combat = |g: Forces| Forces { fighters: g.fighters, elites: g.elites, advisors: 0 };

    // A called traitor voids everything else about the battle.
    let agg_betrayed = current.betrayal_by.contains(&agg);
    let def_betrayed = current.betrayal_by.contains(&def);
    if agg_betrayed && def_betrayed {
        return Ok(BattleResult {
            kind: ResultKind::DualBetrayal,
            winner: None,
            loser: None,
            aggressor: outcome(agg, 0, combat(agg_group), &ap, true),
            defender: outcome(def, 0, combat(def_group), &dp, true),
            spice_to_winner: 0,
        });
    }
    if agg_betrayed || def_betrayed {
        let caller = if agg_betrayed { agg } else { def };
        let victim = current.opponent_of(caller);
        let victim_plan = if victim == agg { &ap } else { &dp };
        let bounty = victim_plan.leader.map_or(0, |id| cards::leader(id).strength);
        let (a_out, d_out) = if caller == agg {
            (
                outcome(agg, 0, Forces::default(), &ap, false),
                outcome(def, 0, combat(def_group), &dp, true),
            )
        } else {
            (
                outcome(agg, 0, combat(agg_group), &ap, true),
                outcome(def, 0, Forces::default(), &dp, false),
            )
        };
        return Ok(BattleResult {
            kind: ResultKind::Betrayal(caller),
            winner: Some(caller),
            loser: Some(victim),
            aggressor: a_out,
            defender: d_out,
            spice_to_winner: bounty,
        });
    }

    // Lasgun meeting a shield vaporizes the territory.
    let lasgun = ap.offense == Some(CardKind::Lasgun) || dp.offense == Some(CardKind::Lasgun);
    let shield =
        ap.defense == Some(CardKind::ProjectileDefense) || dp.defense == Some(CardKind::ProjectileDefense);
    if lasgun && shield {
        return Ok(BattleResult {
            kind: ResultKind::Annihilation,
            winner: None,
            loser: None,
            aggressor: outcome(agg, 0, agg_group, &ap, true),
            defender: outcome(def, 0, def_group, &dp, true),
            spice_to_winner: 0,
        });
    }

    let agg_dead = weapon_kills(dp.offense, ap.defense);
    let def_dead = weapon_kills(ap.offense, dp.defense);
    let agg_total = side_total(&ap, !agg_dead);
    let def_total = side_total(&dp, !def_dead);
    let winner = if agg_total != def_total {
        if agg_total > def_total { agg } else { def }
    } else {
        // Tie: the earlier faction in the aggressor order prevails.
        let pos = |f: Faction| order.iter().position(|&o| o == f).unwrap_or(usize::MAX);
        if pos(agg) <= pos(def) { agg } else { def }
    };
    let loser = if winner == agg { def } else { agg };
    let mut bounty = 0;
    if agg_dead {
        bounty += ap.leader.map_or(0, |id| cards::leader(id).strength);
    }
    if def_dead {
        bounty += dp.leader.map_or(0, |id| cards::leader(id).strength);
    }
    Ok(BattleResult {
        kind: ResultKind::Normal,
        winner: Some(winner),
        loser: Some(loser),
        aggressor: outcome(
            agg,
            agg_total,
            if loser == agg { combat(agg_group) } else { Forces::default() },
            &ap,
            agg_dead,
        ),
        defender: outcome(
            def,
            def_total,
            if loser == def { combat(def_group) } else { Forces::default() },
            &dp,
            def_dead,
        ),
        spice_to_winner: bounty,
    })
}

/// Discard one played card of each slot from a faction's hand.
fn discard_played(state: &mut GameState, f: Faction, plan: &BattlePlan, events: &mut Vec<GameEvent>) {
    for card in [plan.offense, plan.defense].into_iter().flatten() {
        if let Some(pos) = state.faction(f).hand.iter().position(|&c| c == card) {
            state.faction_mut(f).hand.remove(pos);
            state.treachery_discard.push(card);
            events.push(GameEvent::CardDiscarded { faction: f, card });
        }
    }
}

fn kill_leader(state: &mut GameState, f: Faction, side: &SideOutcome, events: &mut Vec<GameEvent>) {
    if let Some(id) = side.leader_killed {
        if let Some(l) = state.faction_mut(f).leader_mut(id) {
            l.status = LeaderStatus::Dead;
        }
        events.push(GameEvent::LeaderKilled { faction: f, leader: id });
    }
}

fn destroy_side_losses(
    state: &mut GameState,
    current: &CurrentBattle,
    side: &SideOutcome,
    events: &mut Vec<GameEvent>,
) {
    if side.forces_lost.is_empty() {
        return;
    }
    let mut remaining = side.forces_lost;
    for &sector in &current.sectors {
        if remaining.is_empty() {
            break;
        }
        let p = Placement::new(current.location, sector);
        let here = state.forces_at(p, side.faction);
        let lost = Forces {
            fighters: here.fighters.min(remaining.fighters),
            elites: here.elites.min(remaining.elites),
            advisors: here.advisors.min(remaining.advisors),
        };
        remaining = remaining.minus(lost);
        destroy_forces(state, p, side.faction, lost, events);
    }
    let fs = state.faction_mut(side.faction);
    fs.forces_lost_total += u16::from(side.forces_lost.combatants());
}

/// Carry a computed result into the state. Committed spice is only spent
/// on a Normal result; voided battles return it untouched.
pub fn apply(
    state: &mut GameState,
    current: &CurrentBattle,
    result: &BattleResult,
    events: &mut Vec<GameEvent>,
) -> EngineResult<()> {
    let ap = current
        .aggressor_plan
        .ok_or_else(|| EngineError::CorruptState("apply without aggressor plan".into()))?;
    let dp = current
        .defender_plan
        .ok_or_else(|| EngineError::CorruptState("apply without defender plan".into()))?;

    match result.kind {
        ResultKind::Normal => {
            let agg_spent = ap.spice.min(state.faction(current.aggressor).spice);
            state.faction_mut(current.aggressor).spice -= agg_spent;
            let def_spent = dp.spice.min(state.faction(current.defender).spice);
            state.faction_mut(current.defender).spice -= def_spent;
            destroy_side_losses(state, current, &result.aggressor, events);
            destroy_side_losses(state, current, &result.defender, events);
            kill_leader(state, current.aggressor, &result.aggressor, events);
            kill_leader(state, current.defender, &result.defender, events);
            if let (Some(winner), Some(loser)) = (result.winner, result.loser) {
                state.faction_mut(winner).spice += result.spice_to_winner;
                let loser_plan = if loser == current.aggressor { &ap } else { &dp };
                discard_played(state, loser, loser_plan, events);
            }
        }
        ResultKind::Betrayal(caller) => {
            let victim = current.opponent_of(caller);
            let (victim_out, victim_plan) = if victim == current.aggressor {
                (&result.aggressor, &ap)
            } else {
                (&result.defender, &dp)
            };
            destroy_side_losses(state, current, victim_out, events);
            kill_leader(state, victim, victim_out, events);
            state.faction_mut(caller).spice += result.spice_to_winner;
            discard_played(state, victim, victim_plan, events);
        }
        ResultKind::DualBetrayal => {
            destroy_side_losses(state, current, &result.aggressor, events);
            destroy_side_losses(state, current, &result.defender, events);
            kill_leader(state, current.aggressor, &result.aggressor, events);
            kill_leader(state, current.defender, &result.defender, events);
            discard_played(state, current.aggressor, &ap, events);
            discard_played(state, current.defender, &dp, events);
        }
        ResultKind::Annihilation => {
            // Everything at the territory dies, advisors and spice included.
            let def = map::location(current.location);
            for &sector in def.sectors {
                let p = Placement::new(current.location, sector);
                for f in Faction::ALL {
                    let present = state.forces_at(p, f);
                    destroy_forces(state, p, f, present, events);
                }
                if let Some(amount) = state.spice_on_board.get(&p).copied() {
                    state.spice_on_board.remove(&p);
                    events.push(GameEvent::SpiceRemoved { at: p, amount });
                }
            }
            state.faction_mut(current.aggressor).forces_lost_total +=
                u16::from(result.aggressor.forces_lost.combatants());
            state.faction_mut(current.defender).forces_lost_total +=
                u16::from(result.defender.forces_lost.combatants());
            kill_leader(state, current.aggressor, &result.aggressor, events);
            kill_leader(state, current.defender, &result.defender, events);
            discard_played(state, current.aggressor, &ap, events);
            discard_played(state, current.defender, &dp, events);
        }
    }
    Ok(())
}
