// ═══════════════════════════════════════════════════════════════════════
// Non-battle phase handlers. Each is a stateless unit struct; all phase
// progress lives inside GameState so a suspended game can be serialized
// and resumed.
// ═══════════════════════════════════════════════════════════════════════

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{EngineError, EngineResult};
use crate::events::GameEvent;
use crate::invariants;
use crate::map::{self, LocationId, NUM_SECTORS};
use crate::phase::{PhaseHandler, StepResult};
use crate::requests::{
    ActionData, DecisionRequest, DecisionResponse, RequestContext, RequestKind, ResponseSet,
};
use crate::types::{
    AllianceAction, CardKind, Faction, Forces, GameState, LeaderStatus, Phase, Placement,
    ShipmentContext, ShipmentStage, SpiceCard, BiddingContext,
};

// ── Shared helpers ─────────────────────────────────────────────────────

/// Destroy part of a faction's forces at a placement. Losses go to the
/// dead pool; advisors revive later as ordinary fighters.
pub(crate) fn destroy_forces(
    state: &mut GameState,
    p: Placement,
    f: Faction,
    lost: Forces,
    events: &mut Vec<GameEvent>,
) {
    if lost.is_empty() {
        return;
    }
    let current = state.forces_at(p, f);
    state.set_forces(p, f, current.minus(lost));
    let fs = state.faction_mut(f);
    fs.dead = fs.dead.plus(lost);
    events.push(GameEvent::ForcesDestroyed { faction: f, at: p, forces: lost });
}

/// Draw from the treachery deck, folding the discard pile back in when
/// the deck runs dry.
pub(crate) fn draw_treachery(state: &mut GameState) -> Option<CardKind> {
    if state.treachery_deck.is_empty() && !state.treachery_discard.is_empty() {
        let mut rng = state.next_rng();
        let mut deck = std::mem::take(&mut state.treachery_discard);
        deck.shuffle(&mut rng);
        state.treachery_deck = deck;
    }
    state.treachery_deck.pop()
}

fn draw_spice_card(state: &mut GameState) -> Option<SpiceCard> {
    if state.spice_deck.is_empty() && !state.spice_discard.is_empty() {
        let mut rng = state.next_rng();
        let mut deck = std::mem::take(&mut state.spice_discard);
        deck.shuffle(&mut rng);
        state.spice_deck = deck;
    }
    state.spice_deck.pop()
}

/// Territories reachable from `from` in at most `range` adjacency steps.
fn reachable(from: LocationId, range: u8) -> Vec<LocationId> {
    let mut seen = vec![from];
    let mut frontier = vec![from];
    for _ in 0..range {
        let mut next = Vec::new();
        for &loc in &frontier {
            for &adj in map::location(loc).adjacent {
                if !seen.contains(&adj) {
                    seen.push(adj);
                    next.push(adj);
                }
            }
        }
        frontier = next;
    }
    seen
}

/// Shipping or moving into the open desert under the storm is refused.
fn blocked_by_storm(state: &GameState, p: Placement) -> bool {
    map::location(p.location).storm_vulnerable() && p.sector == state.storm_sector
}

// ── Storm ──────────────────────────────────────────────────────────────

pub struct StormPhase;

impl PhaseHandler for StormPhase {
    fn phase(&self) -> Phase {
        Phase::Storm
    }

    fn initialize(&self, mut state: GameState) -> EngineResult<StepResult> {
        let mut events = Vec::new();
        if state.turn == 1 {
            let mut rng = state.next_rng();
            let start = rng.gen_range(0..NUM_SECTORS);
            state.storm_sector = start;
            events.push(GameEvent::StormMoved { from: start, to: start });
        } else {
            let from = state.storm_sector;
            let distance = {
                let mut rng = state.next_rng();
                rng.gen_range(1..=6)
            };
            for step in 1..=distance {
                let sector = (from + step) % NUM_SECTORS;
                sweep_sector(&mut state, sector, &mut events);
            }
            state.storm_sector = (from + distance) % NUM_SECTORS;
            events.push(GameEvent::StormMoved { from, to: state.storm_sector });
        }
        state.storm_order = map::storm_order(state.storm_sector);
        Ok(StepResult::complete(state, events))
    }

    fn process_step(
        &self,
        state: GameState,
        _responses: &[DecisionResponse],
    ) -> EngineResult<StepResult> {
        Ok(StepResult::complete(state, Vec::new()))
    }
}

/// Apply storm damage to one sector: forces on sand are destroyed (the
/// Fremen lose only half, rounded down) and loose spice is blown away.
fn sweep_sector(state: &mut GameState, sector: u8, events: &mut Vec<GameEvent>) {
    for def in map::LOCATIONS.iter() {
        if !def.sectors.contains(&sector) || !def.storm_vulnerable() {
            continue;
        }
        let p = Placement::new(def.id, sector);
        for f in Faction::ALL {
            let present = state.forces_at(p, f);
            if present.is_empty() {
                continue;
            }
            let lost = if f == Faction::Fremen {
                take_forces(present, present.total() / 2)
            } else {
                present
            };
            destroy_forces(state, p, f, lost, events);
        }
        if let Some(amount) = state.spice_on_board.get(&p).copied() {
            state.spice_on_board.remove(&p);
            events.push(GameEvent::SpiceRemoved { at: p, amount });
        }
    }
}

/// Pick `count` tokens out of a detachment, fighters first.
pub(crate) fn take_forces(from: Forces, count: u8) -> Forces {
    let fighters = count.min(from.fighters);
    let elites = (count - fighters).min(from.elites);
    let advisors = (count - fighters - elites).min(from.advisors);
    Forces { fighters, elites, advisors }
}

// ── Spice Blow ─────────────────────────────────────────────────────────

pub struct SpiceBlowPhase;

impl PhaseHandler for SpiceBlowPhase {
    fn phase(&self) -> Phase {
        Phase::SpiceBlow
    }

    fn initialize(&self, mut state: GameState) -> EngineResult<StepResult> {
        let mut events = Vec::new();
        loop {
            let Some(card) = draw_spice_card(&mut state) else {
                break;
            };
            match card {
                SpiceCard::ShaiHulud => {
                    state.spice_discard.push(card);
                    state.nexus_flag = true;
                    let devoured = state.last_blow;
                    events.push(GameEvent::WormAppeared { devoured });
                    if let Some(loc) = devoured {
                        devour_territory(&mut state, loc, &mut events);
                    }
                }
                SpiceCard::Territory { location, sector, amount } => {
                    state.spice_discard.push(card);
                    state.last_blow = Some(location);
                    // No spice appears while the storm sits on the field.
                    if sector != state.storm_sector {
                        let p = Placement::new(location, sector);
                        let existing = state.spice_on_board.get(&p).copied().unwrap_or(0);
                        state.spice_on_board.insert(p, existing + amount);
                        events.push(GameEvent::SpiceBlow { location, sector, amount });
                    }
                    break;
                }
            }
        }
        Ok(StepResult::complete(state, events))
    }

    fn process_step(
        &self,
        state: GameState,
        _responses: &[DecisionResponse],
    ) -> EngineResult<StepResult> {
        Ok(StepResult::complete(state, Vec::new()))
    }
}

/// Shai-Hulud eats everything in a territory except the Fremen, who ride
/// the worm unharmed.
fn devour_territory(state: &mut GameState, loc: LocationId, events: &mut Vec<GameEvent>) {
    let def = map::location(loc);
    for &sector in def.sectors {
        let p = Placement::new(loc, sector);
        for f in Faction::ALL {
            if f == Faction::Fremen {
                continue;
            }
            let present = state.forces_at(p, f);
            destroy_forces(state, p, f, present, events);
        }
        if let Some(amount) = state.spice_on_board.get(&p).copied() {
            state.spice_on_board.remove(&p);
            events.push(GameEvent::SpiceRemoved { at: p, amount });
        }
    }
}

// ── Nexus ──────────────────────────────────────────────────────────────

pub struct NexusPhase;

impl PhaseHandler for NexusPhase {
    fn phase(&self) -> Phase {
        Phase::Nexus
    }

    fn initialize(&self, state: GameState) -> EngineResult<StepResult> {
        if !state.nexus_flag {
            return Ok(StepResult::complete(state, Vec::new()));
        }
        let events = vec![GameEvent::NexusCalled];
        let requests = state
            .storm_order
            .iter()
            .map(|&f| {
                let candidates = Faction::ALL
                    .iter()
                    .copied()
                    .filter(|&c| c != f && state.faction(c).ally.is_none())
                    .collect();
                DecisionRequest {
                    faction: f,
                    kind: RequestKind::Alliance,
                    prompt: "Propose an alliance, break yours, or pass".to_string(),
                    context: RequestContext::Alliance { candidates },
                }
            })
            .collect();
        Ok(StepResult::waiting(state, events, requests))
    }

    fn process_step(
        &self,
        mut state: GameState,
        responses: &[DecisionResponse],
    ) -> EngineResult<StepResult> {
        let answers = ResponseSet::new(responses);
        let mut events = Vec::new();

        // Breaks resolve before proposals so a freed faction may re-ally
        // at the same nexus.
        for &f in &state.storm_order.clone() {
            if let Some(ActionData::Alliance(AllianceAction::Break)) =
                answers.action_of(f, RequestKind::Alliance)
            {
                if let Some(other) = state.faction(f).ally {
                    state.faction_mut(f).ally = None;
                    state.faction_mut(other).ally = None;
                    events.push(GameEvent::AllianceBroken { a: f, b: other });
                }
            }
        }

        let proposal = |f: Faction| -> Option<Faction> {
            match answers.action_of(f, RequestKind::Alliance) {
                Some(ActionData::Alliance(AllianceAction::Propose(t))) => Some(*t),
                _ => None,
            }
        };
        for &a in &state.storm_order.clone() {
            if state.faction(a).ally.is_some() {
                continue;
            }
            if let Some(b) = proposal(a) {
                if proposal(b) == Some(a) && state.faction(b).ally.is_none() {
                    state.faction_mut(a).ally = Some(b);
                    state.faction_mut(b).ally = Some(a);
                    events.push(GameEvent::AllianceFormed { a, b });
                }
            }
        }

        state.nexus_flag = false;
        Ok(StepResult::complete(state, events))
    }
}

// ── Charity ────────────────────────────────────────────────────────────

pub struct CharityPhase;

impl PhaseHandler for CharityPhase {
    fn phase(&self) -> Phase {
        Phase::Charity
    }

    fn initialize(&self, mut state: GameState) -> EngineResult<StepResult> {
        let mut events = Vec::new();
        for &f in &state.storm_order.clone() {
            let spice = state.faction(f).spice;
            // The Bene Gesserit always claim the full dole.
            let amount = if f == Faction::BeneGesserit {
                2
            } else if spice <= 1 {
                2 - spice
            } else {
                0
            };
            if amount > 0 {
                state.faction_mut(f).spice += amount;
                events.push(GameEvent::CharityClaimed { faction: f, amount });
            }
        }
        Ok(StepResult::complete(state, events))
    }

    fn process_step(
        &self,
        state: GameState,
        _responses: &[DecisionResponse],
    ) -> EngineResult<StepResult> {
        Ok(StepResult::complete(state, Vec::new()))
    }
}

// ── Bidding ────────────────────────────────────────────────────────────

pub struct BiddingPhase;

impl BiddingPhase {
    fn eligible_bidders(state: &GameState) -> Vec<Faction> {
        state
            .storm_order
            .iter()
            .copied()
            .filter(|&f| state.faction(f).hand.len() < f.hand_limit())
            .collect()
    }

    /// Put the next card up and suspend on sealed bids, or finish.
    fn next_card(mut state: GameState, mut events: Vec<GameEvent>) -> EngineResult<StepResult> {
        let finished = {
            let ctx = state.bidding.as_ref().ok_or_else(|| {
                EngineError::CorruptState("bidding phase without bidding context".into())
            })?;
            ctx.card_number > ctx.cards_left
        };
        let bidders = Self::eligible_bidders(&state);
        if finished || bidders.is_empty() {
            state.bidding = None;
            return Ok(StepResult::complete(state, events));
        }
        let Some(card) = draw_treachery(&mut state) else {
            state.bidding = None;
            return Ok(StepResult::complete(state, events));
        };
        let ctx = state.bidding.as_mut().ok_or_else(|| {
            EngineError::CorruptState("bidding phase without bidding context".into())
        })?;
        ctx.up_for_bid = Some(card);
        ctx.bidders = bidders.clone();
        let (card_number, cards_left) = (ctx.card_number, ctx.cards_left);
        let requests = bidders
            .iter()
            .map(|&f| DecisionRequest {
                faction: f,
                kind: RequestKind::Bid,
                prompt: format!("Sealed bid for treachery card {card_number} of {cards_left}"),
                context: RequestContext::Bidding {
                    card_number,
                    cards_left,
                    spice: state.faction(f).spice,
                },
            })
            .collect();
        Ok(StepResult::waiting(state, events, requests))
    }
}

impl PhaseHandler for BiddingPhase {
    fn phase(&self) -> Phase {
        Phase::Bidding
    }

    fn initialize(&self, mut state: GameState) -> EngineResult<StepResult> {
        let cards_left = Self::eligible_bidders(&state).len() as u8;
        state.bidding = Some(BiddingContext {
            cards_left,
            card_number: 1,
            up_for_bid: None,
            bidders: Vec::new(),
        });
        Self::next_card(state, Vec::new())
    }

    fn process_step(
        &self,
        mut state: GameState,
        responses: &[DecisionResponse],
    ) -> EngineResult<StepResult> {
        let answers = ResponseSet::new(responses);
        let mut events = Vec::new();

        let ctx = state.bidding.clone().ok_or_else(|| {
            EngineError::CorruptState("bidding phase without bidding context".into())
        })?;
        let Some(card) = ctx.up_for_bid else {
            return Self::next_card(state, events);
        };

        // Sealed single-round auction. A missing answer bids nothing;
        // ties go to the bidder earliest in storm order.
        let mut best: Option<(Faction, u8)> = None;
        for &f in &ctx.bidders {
            let bid = match answers.action_of(f, RequestKind::Bid) {
                Some(ActionData::Bid { spice }) => (*spice).min(state.faction(f).spice),
                _ => 0,
            };
            if bid > 0 && best.map_or(true, |(_, b)| bid > b) {
                best = Some((f, bid));
            }
        }

        match best {
            Some((winner, bid)) => {
                state.faction_mut(winner).spice -= bid;
                // The Emperor banks all auction proceeds except his own.
                if winner != Faction::Emperor {
                    state.faction_mut(Faction::Emperor).spice += bid;
                }
                state.faction_mut(winner).hand.push(card);
                events.push(GameEvent::CardPurchased { faction: winner, cost: bid });
                // Harkonnen treachery: a free extra card with each purchase.
                if winner == Faction::Harkonnen
                    && state.faction(winner).hand.len() < winner.hand_limit()
                {
                    if let Some(bonus) = draw_treachery(&mut state) {
                        state.faction_mut(Faction::Harkonnen).hand.push(bonus);
                        events.push(GameEvent::CardPurchased {
                            faction: Faction::Harkonnen,
                            cost: 0,
                        });
                    }
                }
            }
            None => {
                // Nobody wanted it.
                state.treachery_discard.push(card);
            }
        }

        let ctx = state.bidding.as_mut().ok_or_else(|| {
            EngineError::CorruptState("bidding phase without bidding context".into())
        })?;
        ctx.up_for_bid = None;
        ctx.card_number += 1;
        Self::next_card(state, events)
    }
}

// ── Revival ────────────────────────────────────────────────────────────

pub struct RevivalPhase;

/// Paid revivals cost 2 spice each, at most three of them per turn on
/// top of the faction's free allowance.
const PAID_REVIVAL_LIMIT: u8 = 3;
const REVIVAL_COST: u8 = 2;

impl PhaseHandler for RevivalPhase {
    fn phase(&self) -> Phase {
        Phase::Revival
    }

    fn initialize(&self, state: GameState) -> EngineResult<StepResult> {
        let requests: Vec<DecisionRequest> = state
            .storm_order
            .iter()
            .copied()
            .filter(|&f| {
                let fs = state.faction(f);
                !fs.dead.is_empty() || !fs.dead_leaders().is_empty()
            })
            .map(|f| {
                let fs = state.faction(f);
                DecisionRequest {
                    faction: f,
                    kind: RequestKind::Revival,
                    prompt: "Revive forces from the tanks".to_string(),
                    context: RequestContext::Revival {
                        dead: fs.dead,
                        dead_leaders: fs.dead_leaders(),
                        free: f.free_revivals(),
                        spice: fs.spice,
                    },
                }
            })
            .collect();
        if requests.is_empty() {
            return Ok(StepResult::complete(state, Vec::new()));
        }
        Ok(StepResult::waiting(state, Vec::new(), requests))
    }

    fn process_step(
        &self,
        mut state: GameState,
        responses: &[DecisionResponse],
    ) -> EngineResult<StepResult> {
        let answers = ResponseSet::new(responses);
        let mut events = Vec::new();
        for &f in &state.storm_order.clone() {
            let fs = state.faction(f).clone();
            if fs.dead.is_empty() && fs.dead_leaders().is_empty() {
                continue;
            }
            let free = f.free_revivals();
            // Advisors in the tanks come back as ordinary fighters.
            let revivable_fighters = fs.dead.fighters + fs.dead.advisors;
            let (mut want_fighters, mut want_elites, leader) =
                match answers.action_of(f, RequestKind::Revival) {
                    Some(ActionData::Revival { fighters, elites, leader }) => {
                        (*fighters, *elites, *leader)
                    }
                    // Declining still takes the free revivals.
                    _ => (free.min(revivable_fighters), 0, None),
                };
            want_fighters = want_fighters.min(revivable_fighters);
            want_elites = want_elites.min(fs.dead.elites);
            // Trim to the allowance: free revivals plus at most three paid.
            let max_total = free + PAID_REVIVAL_LIMIT;
            while want_fighters + want_elites > max_total {
                if want_fighters > 0 {
                    want_fighters -= 1;
                } else {
                    want_elites -= 1;
                }
            }
            let total = want_fighters + want_elites;
            let paid = total.saturating_sub(free);
            let mut cost = paid * REVIVAL_COST;
            if cost > state.faction(f).spice {
                // Can only afford so many paid revivals.
                let affordable = state.faction(f).spice / REVIVAL_COST;
                let allowed = free + affordable;
                while want_fighters + want_elites > allowed {
                    if want_elites > 0 {
                        want_elites -= 1;
                    } else {
                        want_fighters -= 1;
                    }
                }
                cost = (want_fighters + want_elites).saturating_sub(free) * REVIVAL_COST;
            }
            if want_fighters + want_elites > 0 {
                let fs = state.faction_mut(f);
                fs.spice -= cost;
                let from_fighters = want_fighters.min(fs.dead.fighters);
                let from_advisors = want_fighters - from_fighters;
                fs.dead.fighters -= from_fighters;
                fs.dead.advisors -= from_advisors;
                fs.dead.elites -= want_elites;
                fs.reserves.fighters += want_fighters;
                fs.reserves.elites += want_elites;
                events.push(GameEvent::ForcesRevived {
                    faction: f,
                    forces: Forces { fighters: want_fighters, elites: want_elites, advisors: 0 },
                });
            }
            if let Some(id) = leader {
                let strength = crate::cards::leader(id).strength;
                let dead = state.faction(f).dead_leaders().contains(&id);
                if dead && state.faction(f).spice >= strength {
                    let fs = state.faction_mut(f);
                    fs.spice -= strength;
                    if let Some(l) = fs.leader_mut(id) {
                        l.status = LeaderStatus::Available;
                    }
                    events.push(GameEvent::LeaderRevived { faction: f, leader: id });
                }
            }
        }
        Ok(StepResult::complete(state, events))
    }
}

// ── Shipment & Movement ────────────────────────────────────────────────

pub struct ShipmentPhase;

impl ShipmentPhase {
    fn ship_request(state: &GameState, f: Faction) -> DecisionRequest {
        let fs = state.faction(f);
        DecisionRequest {
            faction: f,
            kind: RequestKind::Shipment,
            prompt: "Ship forces from your reserves".to_string(),
            context: RequestContext::Shipment { reserves: fs.reserves, spice: fs.spice },
        }
    }

    fn move_request(state: &GameState, f: Faction) -> DecisionRequest {
        let from = state
            .board
            .iter()
            .filter(|(_, stack)| stack.contains_key(&f))
            .map(|(&p, _)| p)
            .collect();
        DecisionRequest {
            faction: f,
            kind: RequestKind::Movement,
            prompt: "Move one group of forces".to_string(),
            context: RequestContext::Movement { from, range: Self::movement_range(state, f) },
        }
    }

    /// One territory per move; the Fremen know the deep desert, and a
    /// city garrison grants ornithopters.
    fn movement_range(state: &GameState, f: Faction) -> u8 {
        if state.occupies(f, map::ARRAKEEN) || state.occupies(f, map::CARTHAG) {
            3
        } else if f == Faction::Fremen {
            2
        } else {
            1
        }
    }

    fn shipment_cost(f: Faction, to: LocationId, count: u8) -> u8 {
        if f == Faction::Fremen {
            return 0;
        }
        let per_force = if map::location(to).fortified() { 1 } else { 2 };
        let full = count * per_force;
        // Guild ships at half fare, rounded up.
        if f == Faction::SpacingGuild { full.div_ceil(2) } else { full }
    }

    fn apply_shipment(
        state: &mut GameState,
        f: Faction,
        action: Option<&ActionData>,
        events: &mut Vec<GameEvent>,
    ) {
        let Some(ActionData::Ship { to, fighters, elites, as_advisors }) = action else {
            return;
        };
        let (to, mut fighters, mut elites, as_advisors) = (*to, *fighters, *elites, *as_advisors);
        let def = map::location(to.location);
        if !def.sectors.contains(&to.sector) || blocked_by_storm(state, to) {
            return;
        }
        let reserves = state.faction(f).reserves;
        fighters = fighters.min(reserves.fighters);
        elites = elites.min(reserves.elites);
        if fighters + elites == 0 {
            return;
        }
        let landing_as_advisors = as_advisors && f == Faction::BeneGesserit;
        if !landing_as_advisors && !invariants::may_enter(state, f, to.location) {
            events.push(GameEvent::OccupancyRefused { faction: f, location: to.location });
            return;
        }
        // Trim the detachment until it is affordable.
        let mut cost = Self::shipment_cost(f, to.location, fighters + elites);
        while cost > state.faction(f).spice {
            if elites > 0 {
                elites -= 1;
            } else if fighters > 0 {
                fighters -= 1;
            }
            if fighters + elites == 0 {
                return;
            }
            cost = Self::shipment_cost(f, to.location, fighters + elites);
        }
        let count = fighters + elites;
        let landed = if landing_as_advisors {
            Forces { fighters: 0, elites: 0, advisors: count }
        } else {
            Forces { fighters, elites, advisors: 0 }
        };
        let fs = state.faction_mut(f);
        fs.spice -= cost;
        fs.reserves.fighters -= fighters;
        fs.reserves.elites -= elites;
        state.add_forces(to, f, landed);
        // Landing fees line Guild pockets.
        if cost > 0 && f != Faction::SpacingGuild {
            state.faction_mut(Faction::SpacingGuild).spice += cost;
        }
        events.push(GameEvent::ForcesShipped { faction: f, to, forces: landed, cost });
    }

    fn apply_movement(
        state: &mut GameState,
        f: Faction,
        action: Option<&ActionData>,
        events: &mut Vec<GameEvent>,
    ) {
        let Some(ActionData::Move { from, to, fighters, elites, convert_advisors }) = action else {
            return;
        };
        let (from, to) = (*from, *to);
        let range = Self::movement_range(state, f);
        let to_def = map::location(to.location);
        if !to_def.sectors.contains(&to.sector)
            || blocked_by_storm(state, to)
            || blocked_by_storm(state, from)
            || !reachable(from.location, range).contains(&to.location)
        {
            return;
        }
        // Bene Gesserit may flip advisors to fighters before marching.
        let mut at_from = state.forces_at(from, f);
        let flips = (*convert_advisors).min(at_from.advisors);
        if flips > 0 && f == Faction::BeneGesserit {
            at_from.advisors -= flips;
            at_from.fighters += flips;
            state.set_forces(from, f, at_from);
            events.push(GameEvent::ForcesConverted { faction: f, at: from, count: flips });
        }
        let moving = Forces {
            fighters: (*fighters).min(at_from.fighters),
            elites: (*elites).min(at_from.elites),
            advisors: 0,
        };
        if moving.is_empty() {
            return;
        }
        if !invariants::may_enter(state, f, to.location) {
            events.push(GameEvent::OccupancyRefused { faction: f, location: to.location });
            return;
        }
        state.set_forces(from, f, at_from.minus(moving));
        state.add_forces(to, f, moving);
        events.push(GameEvent::ForcesMoved { faction: f, from, to, forces: moving });
    }
}

impl PhaseHandler for ShipmentPhase {
    fn phase(&self) -> Phase {
        Phase::Shipment
    }

    fn initialize(&self, mut state: GameState) -> EngineResult<StepResult> {
        state.shipment = Some(ShipmentContext { index: 0, stage: ShipmentStage::AwaitingShipment });
        let first = state.storm_order[0];
        let request = Self::ship_request(&state, first);
        Ok(StepResult::waiting(state, Vec::new(), vec![request]))
    }

    fn process_step(
        &self,
        mut state: GameState,
        responses: &[DecisionResponse],
    ) -> EngineResult<StepResult> {
        let answers = ResponseSet::new(responses);
        let mut events = Vec::new();
        let ctx = state.shipment.ok_or_else(|| {
            EngineError::CorruptState("shipment phase without shipment context".into())
        })?;
        let f = state.storm_order[ctx.index];

        match ctx.stage {
            ShipmentStage::AwaitingShipment => {
                Self::apply_shipment(
                    &mut state,
                    f,
                    answers.action_of(f, RequestKind::Shipment),
                    &mut events,
                );
                state.shipment =
                    Some(ShipmentContext { index: ctx.index, stage: ShipmentStage::AwaitingMovement });
                let request = Self::move_request(&state, f);
                Ok(StepResult::waiting(state, events, vec![request]))
            }
            ShipmentStage::AwaitingMovement => {
                Self::apply_movement(
                    &mut state,
                    f,
                    answers.action_of(f, RequestKind::Movement),
                    &mut events,
                );
                let next = ctx.index + 1;
                if next >= state.storm_order.len() {
                    state.shipment = None;
                    invariants::check_stronghold_occupancy(&state)?;
                    return Ok(StepResult::complete(state, events));
                }
                state.shipment =
                    Some(ShipmentContext { index: next, stage: ShipmentStage::AwaitingShipment });
                let request = Self::ship_request(&state, state.storm_order[next]);
                Ok(StepResult::waiting(state, events, vec![request]))
            }
        }
    }
}

// ── Spice Collection ───────────────────────────────────────────────────

pub struct CollectionPhase;

impl PhaseHandler for CollectionPhase {
    fn phase(&self) -> Phase {
        Phase::Collection
    }

    fn initialize(&self, mut state: GameState) -> EngineResult<StepResult> {
        let mut events = Vec::new();
        let placements: Vec<Placement> = {
            let mut ps: Vec<Placement> = state.spice_on_board.keys().copied().collect();
            ps.sort();
            ps
        };
        for p in placements {
            for &f in &state.storm_order.clone() {
                let workers = state.forces_at(p, f).combatants();
                if workers == 0 {
                    continue;
                }
                let Some(remaining) = state.spice_on_board.get(&p).copied() else {
                    break;
                };
                // Carryalls from a city garrison triple hands to three.
                let rate = if state.occupies(f, map::ARRAKEEN) || state.occupies(f, map::CARTHAG) {
                    3
                } else {
                    2
                };
                let amount = (workers.saturating_mul(rate)).min(remaining);
                if amount == 0 {
                    continue;
                }
                if remaining == amount {
                    state.spice_on_board.remove(&p);
                } else {
                    state.spice_on_board.insert(p, remaining - amount);
                }
                state.faction_mut(f).spice += amount;
                events.push(GameEvent::SpiceCollected { faction: f, at: p, amount });
            }
        }
        Ok(StepResult::complete(state, events))
    }

    fn process_step(
        &self,
        state: GameState,
        _responses: &[DecisionResponse],
    ) -> EngineResult<StepResult> {
        Ok(StepResult::complete(state, Vec::new()))
    }
}

// ── Mentat Pause ───────────────────────────────────────────────────────

pub struct MentatPausePhase;

impl MentatPausePhase {
    fn strongholds_held(state: &GameState, f: Faction) -> usize {
        map::STRONGHOLDS.iter().filter(|&&s| state.occupies(f, s)).count()
    }
}

impl PhaseHandler for MentatPausePhase {
    fn phase(&self) -> Phase {
        Phase::MentatPause
    }

    fn initialize(&self, mut state: GameState) -> EngineResult<StepResult> {
        let mut events = Vec::new();

        // Leaders who fought this turn return to the ready pool.
        for f in Faction::ALL {
            let used: Vec<_> = state
                .faction(f)
                .leaders
                .iter()
                .filter(|l| l.status == LeaderStatus::UsedThisTurn)
                .map(|l| l.id)
                .collect();
            for id in used {
                if let Some(l) = state.faction_mut(f).leader_mut(id) {
                    l.status = LeaderStatus::Available;
                }
                events.push(GameEvent::LeaderReturned { faction: f, leader: id });
            }
        }

        // Solo victory: three strongholds.
        for &f in &state.storm_order.clone() {
            if Self::strongholds_held(&state, f) >= 3 {
                state.winner = Some(f);
                events.push(GameEvent::GameWon { faction: f, allied_with: None });
                return Ok(StepResult::complete(state, events));
            }
        }
        // Allied victory: four distinct strongholds between the pair.
        for &f in &state.storm_order.clone() {
            let Some(ally) = state.faction(f).ally else { continue };
            let combined = map::STRONGHOLDS
                .iter()
                .filter(|&&s| state.occupies(f, s) || state.occupies(ally, s))
                .count();
            if combined >= 4 {
                state.winner = Some(f);
                events.push(GameEvent::GameWon { faction: f, allied_with: Some(ally) });
                return Ok(StepResult::complete(state, events));
            }
        }
        // Out of turns: most strongholds, then most spice, then order.
        if state.turn >= crate::types::MAX_TURNS {
            let best = state
                .storm_order
                .iter()
                .copied()
                .max_by_key(|&f| {
                    let held = Self::strongholds_held(&state, f);
                    let spice = state.faction(f).spice;
                    // Earlier storm order wins ties.
                    let seat = state.storm_order.iter().position(|&o| o == f).unwrap_or(usize::MAX);
                    (held, spice as usize, usize::MAX - seat)
                })
                .ok_or_else(|| EngineError::CorruptState("empty storm order".into()))?;
            state.winner = Some(best);
            events.push(GameEvent::GameWon { faction: best, allied_with: None });
        }
        Ok(StepResult::complete(state, events))
    }

    fn process_step(
        &self,
        state: GameState,
        _responses: &[DecisionResponse],
    ) -> EngineResult<StepResult> {
        Ok(StepResult::complete(state, Vec::new()))
    }
}
