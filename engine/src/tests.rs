// ═══════════════════════════════════════════════════════════════════════
// Engine test suite — map data, setup, battle identification, plan
// validation, resolution math, and full-game drives through the manager.
// ═══════════════════════════════════════════════════════════════════════

use crate::battle::{self, BattlePhase};
use crate::cards;
use crate::error::EngineError;
use crate::events::{ForcedKind, GameEvent, Severity};
use crate::manager::PhaseManager;
use crate::map;
use crate::phase::PhaseHandler;
use crate::phases::{
    self, BiddingPhase, CharityPhase, CollectionPhase, MentatPausePhase, RevivalPhase,
    SpiceBlowPhase,
};
use crate::requests::{ActionData, DecisionResponse, RequestKind};
use crate::resolution;
use crate::setup::create_initial_state;
use crate::subphase::{default_plan, validate_plan};
use crate::types::*;

// ── Helpers ────────────────────────────────────────────────────────────

/// A state with an empty board and the storm parked at sector 0, for
/// tests that stage their own deployments.
fn bare_state() -> GameState {
    let mut s = create_initial_state(42);
    s.board = im::HashMap::new();
    s.spice_on_board = im::HashMap::new();
    s.storm_sector = 0;
    s.storm_order = map::storm_order(0);
    // No traitor cards: battles stay predictable unless a test deals them.
    for f in Faction::ALL {
        s.faction_mut(f).traitors.clear();
    }
    s
}

fn place(s: &mut GameState, loc: map::LocationId, sector: u8, f: Faction, fighters: u8) {
    s.add_forces(Placement::new(loc, sector), f, Forces::fighters(fighters));
}

fn current_battle(
    loc: map::LocationId,
    sectors: Vec<u8>,
    aggressor: Faction,
    defender: Faction,
) -> CurrentBattle {
    CurrentBattle {
        location: loc,
        sectors,
        aggressor,
        defender,
        foresight_question: None,
        foresight_answer: None,
        voice: None,
        aggressor_plan: None,
        defender_plan: None,
        betrayal_by: Vec::new(),
        result: None,
        capture_target: None,
    }
}

fn act(f: Faction, kind: RequestKind, action: ActionData) -> DecisionResponse {
    DecisionResponse::act(f, kind, action)
}

// ── Map data ───────────────────────────────────────────────────────────

#[test]
fn adjacency_is_symmetric() {
    for def in map::LOCATIONS.iter() {
        for &adj in def.adjacent {
            assert!(
                map::location(adj).adjacent.contains(&def.id),
                "{} -> {} not mirrored",
                def.name,
                map::location_name(adj)
            );
        }
    }
}

#[test]
fn no_location_adjacent_to_itself() {
    for def in map::LOCATIONS.iter() {
        assert!(!def.adjacent.contains(&def.id), "{}", def.name);
    }
}

#[test]
fn spice_sectors_belong_to_their_territory() {
    for def in map::LOCATIONS.iter() {
        if let Some(s) = def.spice_sector {
            assert!(def.sectors.contains(&s), "{}", def.name);
            assert!(map::spice_blow_amount(def.id) > 0, "{}", def.name);
        }
    }
}

#[test]
fn strongholds_are_fortified_single_sector() {
    for &id in &map::STRONGHOLDS {
        let def = map::location(id);
        assert!(def.fortified());
        assert_eq!(def.sectors.len(), 1);
    }
}

#[test]
fn battle_groups_split_at_the_storm() {
    let basin = map::location(map::IMPERIAL_BASIN);
    assert_eq!(map::battle_groups(basin, 9), vec![vec![8], vec![9], vec![10]]);
    assert_eq!(map::battle_groups(basin, 7), vec![vec![8, 9, 10]]);
    let cw = map::location(map::CIELAGO_WEST);
    assert_eq!(map::battle_groups(cw, 0), vec![vec![17], vec![0]]);
}

#[test]
fn storm_order_follows_the_wheel() {
    let order = map::storm_order(5);
    assert_eq!(
        order,
        vec![
            Faction::Atreides,
            Faction::Harkonnen,
            Faction::Fremen,
            Faction::BeneGesserit,
            Faction::Emperor,
            Faction::SpacingGuild,
        ]
    );
}

// ── Setup ──────────────────────────────────────────────────────────────

#[test]
fn setup_deals_the_fixed_deployment() {
    let s = create_initial_state(7);
    assert_eq!(s.factions.len(), 6);
    for f in Faction::ALL {
        assert_eq!(s.faction(f).leaders.len(), 5);
    }
    assert_eq!(s.faction(Faction::Harkonnen).traitors.len(), 4);
    assert_eq!(s.faction(Faction::Atreides).traitors.len(), 1);
    assert_eq!(s.faction(Faction::Harkonnen).hand.len(), 2);
    assert_eq!(s.faction(Faction::Fremen).hand.len(), 1);
    assert_eq!(
        s.forces_at(Placement::new(map::ARRAKEEN, 9), Faction::Atreides),
        Forces::fighters(10)
    );
    assert_eq!(
        s.forces_at(Placement::new(map::POLAR_SINK, 0), Faction::BeneGesserit).advisors,
        1
    );
}

#[test]
fn setup_is_deterministic_per_seed() {
    assert_eq!(create_initial_state(9), create_initial_state(9));
    assert_ne!(
        create_initial_state(9).treachery_deck,
        create_initial_state(10).treachery_deck
    );
}

#[test]
fn leader_roster_is_five_per_faction() {
    for f in Faction::ALL {
        assert_eq!(cards::faction_leaders(f).len(), 5);
    }
    assert_eq!(cards::treachery_deck().len(), 22);
    assert_eq!(cards::spice_deck().len(), 17);
}

// ── Battle identification ──────────────────────────────────────────────

#[test]
fn advisors_never_trigger_battles() {
    let mut s = bare_state();
    place(&mut s, map::ARRAKEEN, 9, Faction::Atreides, 5);
    s.add_forces(
        Placement::new(map::ARRAKEEN, 9),
        Faction::BeneGesserit,
        Forces { fighters: 0, elites: 0, advisors: 3 },
    );
    let battles = battle::identify_battles(&s).unwrap();
    assert!(battles.is_empty());
}

#[test]
fn hostile_cohabitation_is_a_battle() {
    let mut s = bare_state();
    place(&mut s, map::ARRAKEEN, 9, Faction::Atreides, 5);
    place(&mut s, map::ARRAKEEN, 9, Faction::Harkonnen, 4);
    let battles = battle::identify_battles(&s).unwrap();
    assert_eq!(battles.len(), 1);
    assert_eq!(battles[0].location, map::ARRAKEEN);
    assert_eq!(battles[0].factions.len(), 2);
}

#[test]
fn allies_do_not_fight_each_other() {
    let mut s = bare_state();
    place(&mut s, map::ARRAKEEN, 9, Faction::Atreides, 5);
    place(&mut s, map::ARRAKEEN, 9, Faction::Fremen, 4);
    s.faction_mut(Faction::Atreides).ally = Some(Faction::Fremen);
    s.faction_mut(Faction::Fremen).ally = Some(Faction::Atreides);
    assert!(battle::identify_battles(&s).unwrap().is_empty());
}

#[test]
fn storm_separates_combatants() {
    let mut s = bare_state();
    s.storm_sector = 9;
    s.storm_order = map::storm_order(9);
    place(&mut s, map::IMPERIAL_BASIN, 8, Faction::Atreides, 5);
    place(&mut s, map::IMPERIAL_BASIN, 10, Faction::Harkonnen, 5);
    assert!(battle::identify_battles(&s).unwrap().is_empty());

    s.storm_sector = 7;
    s.storm_order = map::storm_order(7);
    let battles = battle::identify_battles(&s).unwrap();
    assert_eq!(battles.len(), 1);
    assert_eq!(battles[0].sectors, vec![8, 9, 10]);
}

#[test]
fn three_factions_in_a_stronghold_is_fatal() {
    let mut s = bare_state();
    place(&mut s, map::ARRAKEEN, 9, Faction::Atreides, 2);
    place(&mut s, map::ARRAKEEN, 9, Faction::Harkonnen, 2);
    place(&mut s, map::ARRAKEEN, 9, Faction::Emperor, 2);
    match battle::identify_battles(&s) {
        Err(EngineError::OccupancyViolation { location, factions, .. }) => {
            assert_eq!(location, map::ARRAKEEN);
            assert_eq!(factions.len(), 3);
        }
        other => panic!("expected occupancy violation, got {other:?}"),
    }
}

// ── Aggressor selection ────────────────────────────────────────────────

#[test]
fn aggressor_with_two_battles_is_asked_then_forced() {
    let mut s = bare_state();
    // Storm order at 0: Emperor, Guild, Atreides, Harkonnen, Fremen, BG.
    place(&mut s, map::ARRAKEEN, 9, Faction::Atreides, 5);
    place(&mut s, map::ARRAKEEN, 9, Faction::Harkonnen, 4);
    place(&mut s, map::CARTHAG, 10, Faction::Atreides, 5);
    place(&mut s, map::CARTHAG, 10, Faction::Harkonnen, 4);

    let r = BattlePhase.initialize(s).unwrap();
    assert!(!r.phase_complete);
    assert_eq!(r.pending.len(), 1);
    assert_eq!(r.pending[0].faction, Faction::Atreides);
    assert_eq!(r.pending[0].kind, RequestKind::ChooseBattle);

    // No answer: the engine picks for the aggressor and flags it.
    let r2 = BattlePhase.process_step(r.state, &[]).unwrap();
    assert!(r2.events.iter().any(|e| matches!(
        e,
        GameEvent::ForcedChoice { faction: Faction::Atreides, kind: ForcedKind::BattleChoice }
    )));
    assert!(r2.events.iter().any(|e| matches!(
        e,
        GameEvent::BattleStarted { location, .. } if *location == map::ARRAKEEN
    )));
    // Atreides fights, so the foresight window opens next.
    assert_eq!(r2.pending[0].kind, RequestKind::ForesightQuestion);
}

#[test]
fn a_lone_battle_is_still_offered_to_the_aggressor() {
    let mut s = bare_state();
    place(&mut s, map::ARRAKEEN, 9, Faction::Atreides, 5);
    place(&mut s, map::ARRAKEEN, 9, Faction::Harkonnen, 4);

    let r = BattlePhase.initialize(s).unwrap();
    assert!(!r.phase_complete);
    assert_eq!(r.pending.len(), 1);
    assert_eq!(r.pending[0].faction, Faction::Atreides);
    assert_eq!(r.pending[0].kind, RequestKind::ChooseBattle);

    // Passing force-selects the only battle, flagged as substituted.
    let r2 = BattlePhase.process_step(r.state, &[]).unwrap();
    assert!(r2.events.iter().any(|e| matches!(
        e,
        GameEvent::ForcedChoice { faction: Faction::Atreides, kind: ForcedKind::BattleChoice }
    )));
    assert!(r2.events.iter().any(|e| matches!(
        e,
        GameEvent::BattleStarted { location, .. } if *location == map::ARRAKEEN
    )));
}

#[test]
fn forced_choice_events_are_warnings() {
    let e = GameEvent::ForcedChoice { faction: Faction::Atreides, kind: ForcedKind::BattlePlan };
    assert_eq!(e.severity(), Severity::Warning);
    assert_eq!(GameEvent::NoBattles.severity(), Severity::Info);
}

// ── Plan validation ────────────────────────────────────────────────────

#[test]
fn plans_are_clamped_to_real_resources() {
    let mut s = bare_state();
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Atreides, 4);
    s.faction_mut(Faction::Atreides).spice = 3;
    s.faction_mut(Faction::Atreides).hand.clear();
    let cur = current_battle(map::CIELAGO_NORTH, vec![1, 2], Faction::Atreides, Faction::Harkonnen);
    let wild = BattlePlan {
        fighters: 99,
        elites: 99,
        spice: 50,
        leader: Some(LeaderId(3)),
        offense: Some(CardKind::Lasgun),
        defense: Some(CardKind::PoisonDefense),
        boost: true,
    };
    let plan = validate_plan(&s, &cur, Faction::Atreides, wild);
    assert_eq!(plan.fighters, 4);
    assert_eq!(plan.elites, 0);
    assert_eq!(plan.spice, 3);
    assert_eq!(plan.leader, Some(LeaderId(3)));
    assert_eq!(plan.offense, None, "cannot play a card not in hand");
    assert_eq!(plan.defense, None);
    assert!(!plan.boost, "boost locked before seven losses");
}

#[test]
fn voice_command_binds_the_plan() {
    let mut s = bare_state();
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Harkonnen, 4);
    s.faction_mut(Faction::Harkonnen).hand = vec![CardKind::ProjectileWeapon];
    let mut cur =
        current_battle(map::CIELAGO_NORTH, vec![1, 2], Faction::BeneGesserit, Faction::Harkonnen);
    cur.voice = Some((Faction::Harkonnen, VoiceCommand::MustNotPlay(CardKind::ProjectileWeapon)));
    let submitted = BattlePlan {
        fighters: 4,
        leader: Some(LeaderId(9)),
        offense: Some(CardKind::ProjectileWeapon),
        ..BattlePlan::default()
    };
    let plan = validate_plan(&s, &cur, Faction::Harkonnen, submitted);
    assert_eq!(plan.offense, None);

    cur.voice = Some((Faction::Harkonnen, VoiceCommand::MustPlay(CardKind::ProjectileWeapon)));
    let silent = BattlePlan { fighters: 4, leader: Some(LeaderId(9)), ..BattlePlan::default() };
    let plan = validate_plan(&s, &cur, Faction::Harkonnen, silent);
    assert_eq!(plan.offense, Some(CardKind::ProjectileWeapon));
}

#[test]
fn foresight_commitment_is_enforced() {
    let mut s = bare_state();
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Harkonnen, 6);
    let mut cur =
        current_battle(map::CIELAGO_NORTH, vec![1, 2], Faction::Atreides, Faction::Harkonnen);
    cur.foresight_question = Some(PlanElement::Dial);
    cur.foresight_answer = Some(ElementAnswer::Dial(2));
    let submitted = BattlePlan { fighters: 6, leader: Some(LeaderId(9)), ..BattlePlan::default() };
    let plan = validate_plan(&s, &cur, Faction::Harkonnen, submitted);
    assert_eq!(plan.dialed(), 2);
}

#[test]
fn leaderless_plans_carry_no_cards() {
    let mut s = bare_state();
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Harkonnen, 4);
    for l in &mut s.faction_mut(Faction::Harkonnen).leaders {
        l.status = LeaderStatus::Dead;
    }
    s.faction_mut(Faction::Harkonnen).hand = vec![CardKind::ProjectileWeapon];
    let cur = current_battle(map::CIELAGO_NORTH, vec![1, 2], Faction::Atreides, Faction::Harkonnen);
    let submitted = BattlePlan {
        fighters: 4,
        leader: Some(LeaderId(9)),
        offense: Some(CardKind::ProjectileWeapon),
        ..BattlePlan::default()
    };
    let plan = validate_plan(&s, &cur, Faction::Harkonnen, submitted);
    assert_eq!(plan.leader, None);
    assert_eq!(plan.offense, None);
}

#[test]
fn default_plan_dials_everything() {
    let mut s = bare_state();
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Harkonnen, 4);
    let cur = current_battle(map::CIELAGO_NORTH, vec![1, 2], Faction::Atreides, Faction::Harkonnen);
    let plan = default_plan(&s, &cur, Faction::Harkonnen);
    assert_eq!(plan.fighters, 4);
    assert_eq!(plan.spice, 0);
    assert_eq!(plan.leader, Some(LeaderId(5)), "first ready leader");
    assert_eq!(plan.offense, None);
}

// ── Resolution ─────────────────────────────────────────────────────────

fn two_sided_battle(
    a_forces: u8,
    d_forces: u8,
    ap: BattlePlan,
    dp: BattlePlan,
) -> (GameState, CurrentBattle) {
    let mut s = bare_state();
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Atreides, a_forces);
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Harkonnen, d_forces);
    let mut cur =
        current_battle(map::CIELAGO_NORTH, vec![1, 2], Faction::Atreides, Faction::Harkonnen);
    cur.aggressor_plan = Some(ap);
    cur.defender_plan = Some(dp);
    (s, cur)
}

#[test]
fn numeric_resolution_counts_dial_spice_and_leader() {
    // Atreides: 5 + 2 spice + Lady Jessica (5) = 12.
    // Harkonnen: 4 + Feyd-Rautha (6) = 10.
    let ap = BattlePlan { fighters: 5, spice: 2, leader: Some(LeaderId(3)), ..BattlePlan::default() };
    let dp = BattlePlan { fighters: 4, leader: Some(LeaderId(9)), ..BattlePlan::default() };
    let (mut s, cur) = two_sided_battle(5, 4, ap, dp);
    let order = s.storm_order.clone();

    let result = resolution::resolve(&s, &order, &cur).unwrap();
    assert_eq!(result.kind, ResultKind::Normal);
    assert_eq!(result.winner, Some(Faction::Atreides));
    assert_eq!(result.aggressor.total, 12);
    assert_eq!(result.defender.total, 10);
    assert_eq!(result.defender.forces_lost, Forces::fighters(4));
    assert_eq!(result.aggressor.forces_lost, Forces::default());
    assert_eq!(result.spice_to_winner, 0);

    let mut events = Vec::new();
    resolution::apply(&mut s, &cur, &result, &mut events).unwrap();
    let p = Placement::new(map::CIELAGO_NORTH, 1);
    assert_eq!(s.forces_at(p, Faction::Harkonnen), Forces::default());
    assert_eq!(s.forces_at(p, Faction::Atreides), Forces::fighters(5), "winner keeps forces");
    assert_eq!(s.faction(Faction::Harkonnen).dead.fighters, 4);
    assert_eq!(s.faction(Faction::Harkonnen).forces_lost_total, 4);
    assert_eq!(s.faction(Faction::Atreides).spice, 10 - 2, "committed spice is spent");
}

#[test]
fn elites_count_double() {
    let ap = BattlePlan { fighters: 2, elites: 2, ..BattlePlan::default() };
    let dp = BattlePlan { fighters: 5, ..BattlePlan::default() };
    let (s, cur) = two_sided_battle(4, 5, ap, dp);
    let result = resolution::resolve(&s, &s.storm_order, &cur).unwrap();
    assert_eq!(result.aggressor.total, 6);
    assert_eq!(result.winner, Some(Faction::Atreides));
}

#[test]
fn an_uncountered_weapon_kills_the_leader() {
    let mut s = bare_state();
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Atreides, 3);
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Harkonnen, 3);
    s.faction_mut(Faction::Atreides).hand = vec![CardKind::PoisonWeapon];
    let mut cur =
        current_battle(map::CIELAGO_NORTH, vec![1, 2], Faction::Atreides, Faction::Harkonnen);
    cur.aggressor_plan = Some(BattlePlan {
        fighters: 3,
        leader: Some(LeaderId(3)),
        offense: Some(CardKind::PoisonWeapon),
        ..BattlePlan::default()
    });
    // Feyd carries a shield, which stops projectiles but not poison.
    cur.defender_plan = Some(BattlePlan {
        fighters: 3,
        leader: Some(LeaderId(9)),
        defense: Some(CardKind::ProjectileDefense),
        ..BattlePlan::default()
    });
    let result = resolution::resolve(&s, &s.storm_order, &cur).unwrap();
    assert_eq!(result.defender.leader_killed, Some(LeaderId(9)));
    // Harkonnen: 3 + nothing, Atreides: 3 + 5.
    assert_eq!(result.winner, Some(Faction::Atreides));
    assert_eq!(result.spice_to_winner, 6, "Feyd's strength paid to the victor");
}

#[test]
fn ties_favor_the_earlier_aggressor_order() {
    let ap = BattlePlan { fighters: 5, ..BattlePlan::default() };
    let dp = BattlePlan { fighters: 5, ..BattlePlan::default() };
    let (s, cur) = two_sided_battle(5, 5, ap, dp);
    // Storm order at 0 puts Atreides before Harkonnen.
    let result = resolution::resolve(&s, &s.storm_order, &cur).unwrap();
    assert_eq!(result.winner, Some(Faction::Atreides));
}

#[test]
fn a_called_traitor_voids_the_battle() {
    let ap = BattlePlan { fighters: 5, spice: 2, leader: Some(LeaderId(3)), ..BattlePlan::default() };
    let dp = BattlePlan { fighters: 1, leader: Some(LeaderId(9)), ..BattlePlan::default() };
    let (mut s, mut cur) = two_sided_battle(5, 1, ap, dp);
    cur.betrayal_by.push(Faction::Harkonnen);
    let result = resolution::resolve(&s, &s.storm_order.clone(), &cur).unwrap();
    assert_eq!(result.kind, ResultKind::Betrayal(Faction::Harkonnen));
    assert_eq!(result.winner, Some(Faction::Harkonnen));
    assert_eq!(result.spice_to_winner, 5, "Lady Jessica's strength");
    assert_eq!(result.aggressor.leader_killed, Some(LeaderId(3)));

    let mut events = Vec::new();
    resolution::apply(&mut s, &cur, &result, &mut events).unwrap();
    assert_eq!(s.faction(Faction::Atreides).dead.fighters, 5);
    assert_eq!(s.faction(Faction::Atreides).spice, 10, "committed spice returned");
    let jessica = s.faction(Faction::Atreides).leaders.iter().find(|l| l.id == LeaderId(3));
    assert_eq!(jessica.map(|l| l.status), Some(LeaderStatus::Dead));
}

#[test]
fn dual_betrayal_kills_both_sides() {
    let ap = BattlePlan { fighters: 5, leader: Some(LeaderId(3)), ..BattlePlan::default() };
    let dp = BattlePlan { fighters: 4, leader: Some(LeaderId(9)), ..BattlePlan::default() };
    let (mut s, mut cur) = two_sided_battle(5, 4, ap, dp);
    cur.betrayal_by = vec![Faction::Atreides, Faction::Harkonnen];
    let result = resolution::resolve(&s, &s.storm_order.clone(), &cur).unwrap();
    assert_eq!(result.kind, ResultKind::DualBetrayal);
    assert_eq!(result.winner, None);

    let mut events = Vec::new();
    resolution::apply(&mut s, &cur, &result, &mut events).unwrap();
    assert_eq!(s.faction(Faction::Atreides).dead.fighters, 5);
    assert_eq!(s.faction(Faction::Harkonnen).dead.fighters, 4);
}

#[test]
fn lasgun_and_shield_annihilate_the_territory() {
    let mut s = bare_state();
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Atreides, 5);
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Harkonnen, 4);
    // Bystanding advisors in another sector of the same territory.
    s.add_forces(
        Placement::new(map::CIELAGO_NORTH, 2),
        Faction::BeneGesserit,
        Forces { fighters: 0, elites: 0, advisors: 2 },
    );
    s.spice_on_board.insert(Placement::new(map::CIELAGO_NORTH, 1), 6);
    let mut cur =
        current_battle(map::CIELAGO_NORTH, vec![1, 2], Faction::Atreides, Faction::Harkonnen);
    cur.aggressor_plan = Some(BattlePlan {
        fighters: 5,
        leader: Some(LeaderId(3)),
        offense: Some(CardKind::Lasgun),
        ..BattlePlan::default()
    });
    cur.defender_plan = Some(BattlePlan {
        fighters: 4,
        leader: Some(LeaderId(9)),
        defense: Some(CardKind::ProjectileDefense),
        ..BattlePlan::default()
    });
    let result = resolution::resolve(&s, &s.storm_order.clone(), &cur).unwrap();
    assert_eq!(result.kind, ResultKind::Annihilation);
    assert_eq!(result.winner, None);

    let mut events = Vec::new();
    resolution::apply(&mut s, &cur, &result, &mut events).unwrap();
    for sector in [1u8, 2] {
        let p = Placement::new(map::CIELAGO_NORTH, sector);
        for f in Faction::ALL {
            assert!(s.forces_at(p, f).is_empty());
        }
        assert!(!s.spice_on_board.contains_key(&p));
    }
    assert_eq!(s.faction(Faction::BeneGesserit).dead.advisors, 2);
    assert_eq!(s.faction(Faction::Atreides).dead_leaders(), vec![LeaderId(3)]);
    assert_eq!(s.faction(Faction::Harkonnen).dead_leaders(), vec![LeaderId(9)]);
}

// ── Battle phase end to end ────────────────────────────────────────────

#[test]
fn a_full_battle_runs_through_the_sub_phases() {
    let mut s = bare_state();
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Atreides, 6);
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Harkonnen, 3);

    // The aggressor picks a battle, then the foresight window opens.
    let r = BattlePhase.initialize(s).unwrap();
    assert_eq!(r.pending[0].kind, RequestKind::ChooseBattle);
    let choose = act(
        Faction::Atreides,
        RequestKind::ChooseBattle,
        ActionData::ChooseBattle { index: 0 },
    );
    let r = BattlePhase.process_step(r.state, &[choose]).unwrap();
    assert_eq!(r.pending[0].kind, RequestKind::ForesightQuestion);

    // Atreides declines foresight; no Bene Gesserit, so plans come next.
    let r = BattlePhase.process_step(r.state, &[]).unwrap();
    assert_eq!(r.pending.len(), 2);
    assert!(r.pending.iter().all(|p| p.kind == RequestKind::BattlePlan));

    let responses = vec![
        act(
            Faction::Atreides,
            RequestKind::BattlePlan,
            ActionData::BattlePlan(BattlePlan {
                fighters: 6,
                leader: Some(LeaderId(4)),
                ..BattlePlan::default()
            }),
        ),
        act(
            Faction::Harkonnen,
            RequestKind::BattlePlan,
            ActionData::BattlePlan(BattlePlan {
                fighters: 3,
                leader: Some(LeaderId(5)),
                ..BattlePlan::default()
            }),
        ),
    ];
    let r = BattlePhase.process_step(r.state, &responses).unwrap();

    // 6 + Thufir (5) = 11 beats 3 + Umman Kudu (1) = 4; no cards played,
    // the loser has no prisoners to offer the winner, phase closes.
    assert!(r.phase_complete);
    assert!(r.state.battle.is_none());
    assert!(r.events.iter().any(|e| matches!(
        e,
        GameEvent::BattleResolved { winner: Some(Faction::Atreides), .. }
    )));
    let reveals = r
        .events
        .iter()
        .filter(|e| matches!(e, GameEvent::PlanRevealed { .. }))
        .count();
    assert_eq!(reveals, 2);
    // The surviving leader is spent for the turn.
    let thufir = r.state.faction(Faction::Atreides).leaders.iter().find(|l| l.id == LeaderId(4));
    assert_eq!(thufir.map(|l| l.status), Some(LeaderStatus::UsedThisTurn));
}

#[test]
fn harkonnen_victory_offers_a_capture() {
    let mut s = bare_state();
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Atreides, 1);
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Harkonnen, 8);

    let r = BattlePhase.initialize(s).unwrap();
    // Atreides is forced through the choice, declines foresight, then
    // both sides default their plans.
    let r = BattlePhase.process_step(r.state, &[]).unwrap();
    let r = BattlePhase.process_step(r.state, &[]).unwrap();
    let r = BattlePhase.process_step(r.state, &[]).unwrap();
    assert_eq!(r.pending.len(), 1);
    assert_eq!(r.pending[0].faction, Faction::Harkonnen);
    assert_eq!(r.pending[0].kind, RequestKind::CaptureDisposition);

    let kill = act(
        Faction::Harkonnen,
        RequestKind::CaptureDisposition,
        ActionData::CaptureDisposition { kill: true },
    );
    let spice_before = r.state.faction(Faction::Harkonnen).spice;
    let r = BattlePhase.process_step(r.state, &[kill]).unwrap();
    assert!(r.phase_complete);
    assert_eq!(r.state.faction(Faction::Harkonnen).spice, spice_before + 2);
    assert!(r
        .events
        .iter()
        .any(|e| matches!(e, GameEvent::LeaderKilled { faction: Faction::Atreides, .. })));
}

#[test]
fn a_silent_foresight_commitment_is_flagged() {
    let mut s = bare_state();
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Atreides, 6);
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Harkonnen, 3);

    let r = BattlePhase.initialize(s).unwrap();
    let choose = act(
        Faction::Atreides,
        RequestKind::ChooseBattle,
        ActionData::ChooseBattle { index: 0 },
    );
    let r = BattlePhase.process_step(r.state, &[choose]).unwrap();
    let ask = act(
        Faction::Atreides,
        RequestKind::ForesightQuestion,
        ActionData::ForesightQuestion(PlanElement::Dial),
    );
    let r = BattlePhase.process_step(r.state, &[ask]).unwrap();
    assert_eq!(r.pending[0].faction, Faction::Harkonnen);
    assert_eq!(r.pending[0].kind, RequestKind::ForesightCommit);

    // No commitment arrives: the engine commits the default and says so.
    let r = BattlePhase.process_step(r.state, &[]).unwrap();
    assert!(r.events.iter().any(|e| matches!(
        e,
        GameEvent::ForcedChoice { faction: Faction::Harkonnen, kind: ForcedKind::ForesightCommit }
    )));
    assert!(r.pending.iter().all(|p| p.kind == RequestKind::BattlePlan));
}

#[test]
fn an_unanswered_capture_keeps_the_prisoner() {
    let mut s = bare_state();
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Atreides, 1);
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Harkonnen, 8);

    let r = BattlePhase.initialize(s).unwrap();
    let r = BattlePhase.process_step(r.state, &[]).unwrap();
    let r = BattlePhase.process_step(r.state, &[]).unwrap();
    let r = BattlePhase.process_step(r.state, &[]).unwrap();
    assert_eq!(r.pending[0].kind, RequestKind::CaptureDisposition);

    let r = BattlePhase.process_step(r.state, &[]).unwrap();
    assert!(r.phase_complete);
    assert!(r.events.iter().any(|e| matches!(
        e,
        GameEvent::ForcedChoice { faction: Faction::Harkonnen, kind: ForcedKind::CaptureChoice }
    )));
    assert!(r
        .state
        .faction(Faction::Atreides)
        .leaders
        .iter()
        .any(|l| l.status == LeaderStatus::Captured(Faction::Harkonnen)));
}

#[test]
fn suspended_battles_survive_serialization() {
    let mut s = bare_state();
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Atreides, 6);
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Harkonnen, 3);
    let r = BattlePhase.initialize(s).unwrap();
    let r = BattlePhase.process_step(r.state, &[]).unwrap();
    let r = BattlePhase.process_step(r.state, &[]).unwrap();
    assert!(r.pending.iter().all(|p| p.kind == RequestKind::BattlePlan));

    let json = serde_json::to_string(&r.state).unwrap();
    let restored: GameState = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, r.state);

    let a = BattlePhase.process_step(r.state, &[]).unwrap();
    let b = BattlePhase.process_step(restored, &[]).unwrap();
    assert_eq!(a.state, b.state, "resuming from a snapshot is transparent");
    assert!(a.phase_complete && b.phase_complete);
}

// ── Non-battle phases ──────────────────────────────────────────────────

#[test]
fn spice_blow_and_worm() {
    let mut s = bare_state();
    s.last_blow = Some(map::CIELAGO_NORTH);
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Harkonnen, 4);
    place(&mut s, map::CIELAGO_NORTH, 1, Faction::Fremen, 4);
    // Drawn from the back: first the worm, then the territory card.
    s.spice_deck = vec![
        SpiceCard::Territory { location: map::SOUTH_MESA, sector: 4, amount: 10 },
        SpiceCard::ShaiHulud,
    ];

    let r = SpiceBlowPhase.initialize(s).unwrap();
    assert!(r.phase_complete);
    let s = r.state;
    assert!(s.nexus_flag);
    // The worm ate the Harkonnen garrison but spared the Fremen.
    let p = Placement::new(map::CIELAGO_NORTH, 1);
    assert_eq!(s.forces_at(p, Faction::Harkonnen), Forces::default());
    assert_eq!(s.forces_at(p, Faction::Fremen), Forces::fighters(4));
    assert_eq!(
        s.spice_on_board.get(&Placement::new(map::SOUTH_MESA, 4)).copied(),
        Some(10)
    );
    assert_eq!(s.last_blow, Some(map::SOUTH_MESA));
}

#[test]
fn no_spice_lands_under_the_storm() {
    let mut s = bare_state();
    s.storm_sector = 4;
    s.spice_deck = vec![SpiceCard::Territory { location: map::SOUTH_MESA, sector: 4, amount: 10 }];
    let r = SpiceBlowPhase.initialize(s).unwrap();
    assert!(r.state.spice_on_board.is_empty());
    assert_eq!(r.state.last_blow, Some(map::SOUTH_MESA));
}

#[test]
fn charity_tops_up_the_poor() {
    let mut s = bare_state();
    s.faction_mut(Faction::Fremen).spice = 0;
    s.faction_mut(Faction::Emperor).spice = 1;
    s.faction_mut(Faction::Atreides).spice = 5;
    s.faction_mut(Faction::BeneGesserit).spice = 9;
    let r = CharityPhase.initialize(s).unwrap();
    assert_eq!(r.state.faction(Faction::Fremen).spice, 2);
    assert_eq!(r.state.faction(Faction::Emperor).spice, 2);
    assert_eq!(r.state.faction(Faction::Atreides).spice, 5);
    assert_eq!(r.state.faction(Faction::BeneGesserit).spice, 11, "always claims");
}

#[test]
fn bidding_ties_go_to_storm_order() {
    let s = bare_state();
    let r = BiddingPhase.initialize(s).unwrap();
    assert_eq!(r.pending.len(), 6, "all six start under hand limit");
    let card = r.state.bidding.as_ref().and_then(|b| b.up_for_bid);
    assert!(card.is_some());

    let bids = vec![
        act(Faction::Atreides, RequestKind::Bid, ActionData::Bid { spice: 3 }),
        act(Faction::Harkonnen, RequestKind::Bid, ActionData::Bid { spice: 3 }),
    ];
    let r = BiddingPhase.process_step(r.state, &bids).unwrap();
    // Storm order at 0 ranks Atreides ahead of Harkonnen.
    assert_eq!(r.state.faction(Faction::Atreides).hand.len(), 2);
    assert_eq!(r.state.faction(Faction::Atreides).spice, 7);
    assert_eq!(r.state.faction(Faction::Emperor).spice, 13, "auction proceeds");
    assert!(!r.phase_complete, "five more cards to auction");
}

#[test]
fn unwanted_cards_are_discarded() {
    let s = bare_state();
    let r = BiddingPhase.initialize(s).unwrap();
    let discard_before = r.state.treachery_discard.len();
    let r = BiddingPhase.process_step(r.state, &[]).unwrap();
    assert_eq!(r.state.treachery_discard.len(), discard_before + 1);
}

#[test]
fn revival_defaults_to_free_revivals() {
    let mut s = bare_state();
    s.faction_mut(Faction::Atreides).dead = Forces::fighters(5);
    let r = RevivalPhase.initialize(s).unwrap();
    assert_eq!(r.pending.len(), 1);
    let r = RevivalPhase.process_step(r.state, &[]).unwrap();
    assert!(r.phase_complete);
    let fs = r.state.faction(Faction::Atreides);
    assert_eq!(fs.dead.fighters, 3, "two free revivals taken");
    assert_eq!(fs.reserves.fighters, 12);
    assert_eq!(fs.spice, 10, "free revivals cost nothing");
}

#[test]
fn paid_revivals_cost_two_spice_each() {
    let mut s = bare_state();
    s.faction_mut(Faction::Atreides).dead = Forces::fighters(5);
    let r = RevivalPhase.initialize(s).unwrap();
    let want = act(
        Faction::Atreides,
        RequestKind::Revival,
        ActionData::Revival { fighters: 3, elites: 0, leader: None },
    );
    let r = RevivalPhase.process_step(r.state, &[want]).unwrap();
    let fs = r.state.faction(Faction::Atreides);
    assert_eq!(fs.reserves.fighters, 13);
    assert_eq!(fs.spice, 8, "one paid revival beyond the two free");
}

#[test]
fn paid_revivals_stack_on_the_free_allowance() {
    let mut s = bare_state();
    s.faction_mut(Faction::Fremen).dead = Forces::fighters(8);
    s.faction_mut(Faction::Fremen).spice = 10;
    let r = RevivalPhase.initialize(s).unwrap();
    let want = act(
        Faction::Fremen,
        RequestKind::Revival,
        ActionData::Revival { fighters: 6, elites: 0, leader: None },
    );
    let r = RevivalPhase.process_step(r.state, &[want]).unwrap();
    let fs = r.state.faction(Faction::Fremen);
    assert_eq!(fs.dead.fighters, 2, "three free plus three paid revived");
    assert_eq!(fs.reserves.fighters, 16);
    assert_eq!(fs.spice, 4, "only the three paid revivals cost spice");
}

#[test]
fn shipment_pays_guild_and_respects_occupancy() {
    let mut s = bare_state();
    place(&mut s, map::ARRAKEEN, 9, Faction::Atreides, 5);
    place(&mut s, map::ARRAKEEN, 9, Faction::Harkonnen, 5);
    let mut state = s;
    let handler = phases::ShipmentPhase;
    let r = handler.initialize(state).unwrap();
    // Storm order at 0: the Emperor ships first.
    assert_eq!(r.pending[0].faction, Faction::Emperor);
    assert_eq!(r.pending[0].kind, RequestKind::Shipment);

    // A full stronghold turns the landing away.
    let refused = act(
        Faction::Emperor,
        RequestKind::Shipment,
        ActionData::Ship { to: Placement::new(map::ARRAKEEN, 9), fighters: 5, elites: 0, as_advisors: false },
    );
    let r = handler.process_step(r.state, &[refused]).unwrap();
    assert!(r.events.iter().any(|e| matches!(
        e,
        GameEvent::OccupancyRefused { faction: Faction::Emperor, location } if *location == map::ARRAKEEN
    )));
    assert_eq!(r.pending[0].kind, RequestKind::Movement);
    state = r.state;
    assert_eq!(state.faction(Faction::Emperor).reserves.fighters, 15);

    // Passing movement hands the turn to the Guild, who ship half price.
    let r = handler.process_step(state, &[]).unwrap();
    assert_eq!(r.pending[0].faction, Faction::SpacingGuild);
    let ship = act(
        Faction::SpacingGuild,
        RequestKind::Shipment,
        ActionData::Ship { to: Placement::new(map::TUEKS_SIETCH, 4), fighters: 5, elites: 0, as_advisors: false },
    );
    let r = handler.process_step(r.state, &[ship]).unwrap();
    // 5 forces into a stronghold: 5 spice full fare, 3 at half, to the bank.
    assert_eq!(r.state.faction(Faction::SpacingGuild).spice, 5 - 3);
}

#[test]
fn collection_rate_doubles_with_a_city() {
    let mut s = bare_state();
    place(&mut s, map::THE_MINOR_ERG, 7, Faction::Fremen, 3);
    s.spice_on_board.insert(Placement::new(map::THE_MINOR_ERG, 7), 10);
    let r = CollectionPhase.initialize(s).unwrap();
    assert_eq!(r.state.faction(Faction::Fremen).spice, 3 + 6, "2 per force");

    let mut s = bare_state();
    place(&mut s, map::ARRAKEEN, 9, Faction::Atreides, 1);
    place(&mut s, map::THE_MINOR_ERG, 7, Faction::Atreides, 3);
    s.spice_on_board.insert(Placement::new(map::THE_MINOR_ERG, 7), 10);
    let r = CollectionPhase.initialize(s).unwrap();
    assert_eq!(r.state.faction(Faction::Atreides).spice, 10 + 9, "3 per force with carryalls");
}

#[test]
fn three_strongholds_win_the_game() {
    let mut s = bare_state();
    place(&mut s, map::ARRAKEEN, 9, Faction::Atreides, 1);
    place(&mut s, map::CARTHAG, 10, Faction::Atreides, 1);
    place(&mut s, map::SIETCH_TABR, 13, Faction::Atreides, 1);
    let r = MentatPausePhase.initialize(s).unwrap();
    assert_eq!(r.state.winner, Some(Faction::Atreides));
    assert!(r.events.iter().any(|e| matches!(
        e,
        GameEvent::GameWon { faction: Faction::Atreides, allied_with: None }
    )));
}

#[test]
fn allies_win_with_four_between_them() {
    let mut s = bare_state();
    s.faction_mut(Faction::Atreides).ally = Some(Faction::Fremen);
    s.faction_mut(Faction::Fremen).ally = Some(Faction::Atreides);
    place(&mut s, map::ARRAKEEN, 9, Faction::Atreides, 1);
    place(&mut s, map::CARTHAG, 10, Faction::Atreides, 1);
    place(&mut s, map::SIETCH_TABR, 13, Faction::Fremen, 1);
    place(&mut s, map::HABBANYA_SIETCH, 16, Faction::Fremen, 1);
    let r = MentatPausePhase.initialize(s).unwrap();
    assert!(r.events.iter().any(|e| matches!(
        e,
        GameEvent::GameWon { allied_with: Some(_), .. }
    )));
}

#[test]
fn spent_leaders_return_at_the_pause() {
    let mut s = bare_state();
    if let Some(l) = s.faction_mut(Faction::Atreides).leader_mut(LeaderId(1)) {
        l.status = LeaderStatus::UsedThisTurn;
    }
    let r = MentatPausePhase.initialize(s).unwrap();
    let duncan = r.state.faction(Faction::Atreides).leaders.iter().find(|l| l.id == LeaderId(1));
    assert_eq!(duncan.map(|l| l.status), Some(LeaderStatus::Available));
    assert!(r.events.iter().any(|e| matches!(
        e,
        GameEvent::LeaderReturned { leader: LeaderId(1), .. }
    )));
}

// ── Full games through the manager ─────────────────────────────────────

#[test]
fn a_silent_game_terminates_within_the_turn_limit() {
    let phase_pos = |p: Phase| Phase::ALL.iter().position(|&q| q == p).unwrap();
    let mut manager = PhaseManager::new();
    let mut out = manager.start(11).unwrap();
    let mut steps = 0u32;
    let mut last_mark = 0usize;
    while !out.game_over {
        steps += 1;
        assert!(steps < 10_000, "game failed to terminate");
        assert!(!out.pending.is_empty(), "a live game must be waiting on someone");
        // Once a phase completes, the game never suspends in it again.
        let mark = out.state.turn as usize * Phase::ALL.len() + phase_pos(out.state.phase);
        assert!(mark >= last_mark, "suspended in an already-completed phase");
        last_mark = mark;
        out = manager.process_step(out.state, &[]).unwrap();
    }
    assert!(out.state.turn <= MAX_TURNS);
    // Nobody ever ships, so the Fremen hold the most strongholds at the end.
    assert_eq!(out.state.winner, Some(Faction::Fremen));

    // Phase start and end events strictly alternate in the log.
    let mut open: Option<Phase> = None;
    for e in manager.log() {
        match e {
            GameEvent::PhaseStarted { phase } => {
                assert!(open.is_none(), "phase started while another was open");
                open = Some(*phase);
            }
            GameEvent::PhaseEnded { phase } => {
                assert_eq!(open, Some(*phase), "phase ended out of order");
                open = None;
            }
            _ => {}
        }
    }
    assert!(open.is_none(), "the final phase never ended");
}

#[test]
fn identical_seeds_replay_identically() {
    let run = |seed: u64| {
        let mut manager = PhaseManager::new();
        let mut out = manager.start(seed).unwrap();
        while !out.game_over {
            out = manager.process_step(out.state, &[]).unwrap();
        }
        out.state
    };
    assert_eq!(run(5), run(5));
}

#[test]
fn processing_a_step_never_mutates_in_place() {
    let mut manager = PhaseManager::new();
    let out = manager.start(3).unwrap();
    let snapshot = out.state.clone();
    let mut other = PhaseManager::new();
    let _ = other.process_step(out.state.clone(), &[]).unwrap();
    assert_eq!(out.state, snapshot, "old state values stay intact");
}
