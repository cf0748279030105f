// ═══════════════════════════════════════════════════════════════════════
// Core types — factions, forces, cards, the game state value, and the
// battle-phase sub-state.
//
// GameState is a value: every step boundary takes a state and returns a
// new one. The board tables use `im` persistent maps so that the old→new
// transformation clones cheaply and shares structure.
// ═══════════════════════════════════════════════════════════════════════

use im::HashMap as ImHashMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::map::{self, LocationId};

/// Turn limit. At the Mentat Pause of this turn the game is scored out.
pub const MAX_TURNS: u8 = 10;

// ── Factions ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Faction {
    Atreides,
    Harkonnen,
    Emperor,
    SpacingGuild,
    BeneGesserit,
    Fremen,
}

impl Faction {
    pub const ALL: [Faction; 6] = [
        Faction::Atreides,
        Faction::Harkonnen,
        Faction::Emperor,
        Faction::SpacingGuild,
        Faction::BeneGesserit,
        Faction::Fremen,
    ];

    /// Maximum treachery cards the faction may hold.
    pub fn hand_limit(self) -> usize {
        match self {
            Faction::Harkonnen => 8,
            _ => 4,
        }
    }

    /// Position of this faction in `ALL`, and its slot in the faction
    /// table on `GameState`.
    pub fn index(self) -> usize {
        match self {
            Faction::Atreides => 0,
            Faction::Harkonnen => 1,
            Faction::Emperor => 2,
            Faction::SpacingGuild => 3,
            Faction::BeneGesserit => 4,
            Faction::Fremen => 5,
        }
    }

    /// Free force revivals per Revival phase.
    pub fn free_revivals(self) -> u8 {
        match self {
            Faction::Atreides | Faction::Harkonnen => 2,
            Faction::Emperor | Faction::SpacingGuild | Faction::BeneGesserit => 1,
            Faction::Fremen => 3,
        }
    }
}

impl std::fmt::Display for Faction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Faction::Atreides => "Atreides",
            Faction::Harkonnen => "Harkonnen",
            Faction::Emperor => "Emperor",
            Faction::SpacingGuild => "Spacing Guild",
            Faction::BeneGesserit => "Bene Gesserit",
            Faction::Fremen => "Fremen",
        };
        write!(f, "{name}")
    }
}

// ── Turn phases ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Storm,
    SpiceBlow,
    Nexus,
    Charity,
    Bidding,
    Revival,
    Shipment,
    Battle,
    Collection,
    MentatPause,
}

impl Phase {
    pub const ALL: [Phase; 10] = [
        Phase::Storm,
        Phase::SpiceBlow,
        Phase::Nexus,
        Phase::Charity,
        Phase::Bidding,
        Phase::Revival,
        Phase::Shipment,
        Phase::Battle,
        Phase::Collection,
        Phase::MentatPause,
    ];

    /// The phase that follows this one. MentatPause wraps to Storm; the
    /// phase manager increments the turn counter on that wrap.
    pub fn next(self) -> Phase {
        match self {
            Phase::Storm => Phase::SpiceBlow,
            Phase::SpiceBlow => Phase::Nexus,
            Phase::Nexus => Phase::Charity,
            Phase::Charity => Phase::Bidding,
            Phase::Bidding => Phase::Revival,
            Phase::Revival => Phase::Shipment,
            Phase::Shipment => Phase::Battle,
            Phase::Battle => Phase::Collection,
            Phase::Collection => Phase::MentatPause,
            Phase::MentatPause => Phase::Storm,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Storm => "Storm",
            Phase::SpiceBlow => "Spice Blow",
            Phase::Nexus => "Nexus",
            Phase::Charity => "Charity",
            Phase::Bidding => "Bidding",
            Phase::Revival => "Revival",
            Phase::Shipment => "Shipment & Movement",
            Phase::Battle => "Battle",
            Phase::Collection => "Spice Collection",
            Phase::MentatPause => "Mentat Pause",
        };
        write!(f, "{name}")
    }
}

// ── Forces ─────────────────────────────────────────────────────────────

/// A force detachment. `fighters` and `elites` are combat-capable;
/// `advisors` are the Bene Gesserit non-combatant tokens and never enter
/// battle identification or resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forces {
    pub fighters: u8,
    pub elites: u8,
    pub advisors: u8,
}

impl Forces {
    pub fn fighters(n: u8) -> Forces {
        Forces { fighters: n, elites: 0, advisors: 0 }
    }

    pub fn total(self) -> u8 {
        self.fighters + self.elites + self.advisors
    }

    /// Combat-capable count (advisors excluded).
    pub fn combatants(self) -> u8 {
        self.fighters + self.elites
    }

    pub fn is_empty(self) -> bool {
        self.total() == 0
    }

    pub fn plus(self, other: Forces) -> Forces {
        Forces {
            fighters: self.fighters + other.fighters,
            elites: self.elites + other.elites,
            advisors: self.advisors + other.advisors,
        }
    }

    pub fn minus(self, other: Forces) -> Forces {
        Forces {
            fighters: self.fighters.saturating_sub(other.fighters),
            elites: self.elites.saturating_sub(other.elites),
            advisors: self.advisors.saturating_sub(other.advisors),
        }
    }
}

// ── Placement ──────────────────────────────────────────────────────────

/// A board position: territory plus storm sector within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Placement {
    pub location: LocationId,
    pub sector: u8,
}

impl Placement {
    pub fn new(location: LocationId, sector: u8) -> Placement {
        Placement { location, sector }
    }
}

impl std::fmt::Display for Placement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (sector {})", self.location, self.sector)
    }
}

// ── Leaders ────────────────────────────────────────────────────────────

/// Index into the static LEADERS roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeaderId(pub u8);

impl std::fmt::Display for LeaderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", crate::cards::leader(*self).name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaderStatus {
    Available,
    /// Fought this turn; unusable until the Mentat Pause reset.
    UsedThisTurn,
    Dead,
    Captured(Faction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderState {
    pub id: LeaderId,
    pub status: LeaderStatus,
}

// ── Treachery cards ────────────────────────────────────────────────────

/// Treachery card kinds. Individual copies are indistinguishable, so the
/// deck, hands and plan slots hold kinds directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardKind {
    ProjectileWeapon,
    PoisonWeapon,
    ProjectileDefense,
    PoisonDefense,
    Lasgun,
    Worthless,
}

impl CardKind {
    pub fn is_offense(self) -> bool {
        matches!(
            self,
            CardKind::ProjectileWeapon | CardKind::PoisonWeapon | CardKind::Lasgun | CardKind::Worthless
        )
    }

    pub fn is_defense(self) -> bool {
        matches!(
            self,
            CardKind::ProjectileDefense | CardKind::PoisonDefense | CardKind::Worthless
        )
    }

    /// The defense kind that stops this weapon, if any.
    pub fn countered_by(self) -> Option<CardKind> {
        match self {
            CardKind::ProjectileWeapon => Some(CardKind::ProjectileDefense),
            CardKind::PoisonWeapon => Some(CardKind::PoisonDefense),
            _ => None,
        }
    }
}

impl std::fmt::Display for CardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CardKind::ProjectileWeapon => "projectile weapon",
            CardKind::PoisonWeapon => "poison weapon",
            CardKind::ProjectileDefense => "shield",
            CardKind::PoisonDefense => "snooper",
            CardKind::Lasgun => "lasgun",
            CardKind::Worthless => "worthless card",
        };
        write!(f, "{name}")
    }
}

// ── Spice deck ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpiceCard {
    Territory { location: LocationId, sector: u8, amount: u8 },
    ShaiHulud,
}

// ── Faction state ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionState {
    pub name: Faction,
    pub spice: u8,
    pub reserves: Forces,
    /// Destroyed pool (the tanks). Advisors sent here revive as fighters.
    pub dead: Forces,
    pub leaders: Vec<LeaderState>,
    pub hand: Vec<CardKind>,
    /// Leaders this faction holds traitor cards for.
    pub traitors: Vec<LeaderId>,
    pub ally: Option<Faction>,
    /// Lifetime combat force losses; unlocks the Atreides battle boost.
    pub forces_lost_total: u16,
}

impl FactionState {
    /// Leaders currently usable in a battle plan.
    pub fn available_leaders(&self) -> Vec<LeaderId> {
        self.leaders
            .iter()
            .filter(|l| l.status == LeaderStatus::Available)
            .map(|l| l.id)
            .collect()
    }

    pub fn leader_mut(&mut self, id: LeaderId) -> Option<&mut LeaderState> {
        self.leaders.iter_mut().find(|l| l.id == id)
    }

    pub fn dead_leaders(&self) -> Vec<LeaderId> {
        self.leaders
            .iter()
            .filter(|l| l.status == LeaderStatus::Dead)
            .map(|l| l.id)
            .collect()
    }
}

// ── Battle phase sub-state ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BattleSubPhase {
    Choosing,
    ForesightOpportunity,
    ForesightReveal,
    VoiceOpportunity,
    CreatingPlans,
    RevealingPlans,
    BetrayalDeclaration,
    Resolution,
    WinnerDiscard,
    CaptureChoice,
}

/// One battle set: a storm-connected sector group of a territory with at
/// least two combat-capable factions present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingBattle {
    pub location: LocationId,
    pub sectors: Vec<u8>,
    pub factions: Vec<Faction>,
}

/// A committed battle plan. Immutable once revealed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattlePlan {
    pub fighters: u8,
    pub elites: u8,
    pub spice: u8,
    pub leader: Option<LeaderId>,
    pub offense: Option<CardKind>,
    pub defense: Option<CardKind>,
    /// Kwisatz Haderach boost (+2). Atreides only, after seven force losses.
    pub boost: bool,
}

impl BattlePlan {
    pub fn dialed(&self) -> u8 {
        self.fighters + self.elites
    }
}

/// One element of a hidden plan, as named by a foresight question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanElement {
    Leader,
    OffenseCard,
    DefenseCard,
    Dial,
}

/// A truthful pre-commitment to one plan element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementAnswer {
    Leader(Option<LeaderId>),
    OffenseCard(Option<CardKind>),
    DefenseCard(Option<CardKind>),
    Dial(u8),
}

impl ElementAnswer {
    pub fn element(&self) -> PlanElement {
        match self {
            ElementAnswer::Leader(_) => PlanElement::Leader,
            ElementAnswer::OffenseCard(_) => PlanElement::OffenseCard,
            ElementAnswer::DefenseCard(_) => PlanElement::DefenseCard,
            ElementAnswer::Dial(_) => PlanElement::Dial,
        }
    }
}

/// A nexus-phase alliance move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllianceAction {
    Propose(Faction),
    Break,
}

/// A Voice command binding the opponent's plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceCommand {
    MustPlay(CardKind),
    MustNotPlay(CardKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultKind {
    Normal,
    /// A traitor was called by this faction; the numeric result is void.
    Betrayal(Faction),
    /// Both sides called traitors: both leaders die, nobody wins.
    DualBetrayal,
    /// Lasgun-shield interaction: the whole location is destroyed.
    Annihilation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideOutcome {
    pub faction: Faction,
    pub total: u16,
    pub forces_lost: Forces,
    pub leader_killed: Option<LeaderId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleResult {
    pub kind: ResultKind,
    pub winner: Option<Faction>,
    pub loser: Option<Faction>,
    pub aggressor: SideOutcome,
    pub defender: SideOutcome,
    /// Spice owed to the winner for leaders killed in this battle.
    pub spice_to_winner: u8,
}

/// The battle in progress between an aggressor and one defender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentBattle {
    pub location: LocationId,
    pub sectors: Vec<u8>,
    pub aggressor: Faction,
    pub defender: Faction,
    pub foresight_question: Option<PlanElement>,
    pub foresight_answer: Option<ElementAnswer>,
    /// Voice command and the faction it binds.
    pub voice: Option<(Faction, VoiceCommand)>,
    pub aggressor_plan: Option<BattlePlan>,
    pub defender_plan: Option<BattlePlan>,
    pub betrayal_by: Vec<Faction>,
    pub result: Option<BattleResult>,
    /// Loser leader randomly offered to a capturing winner.
    pub capture_target: Option<LeaderId>,
}

impl CurrentBattle {
    pub fn opponent_of(&self, faction: Faction) -> Faction {
        if faction == self.aggressor { self.defender } else { self.aggressor }
    }

    pub fn plan_of(&self, faction: Faction) -> Option<&BattlePlan> {
        if faction == self.aggressor {
            self.aggressor_plan.as_ref()
        } else {
            self.defender_plan.as_ref()
        }
    }
}

/// Battle-phase context. Reset at phase entry, discarded at phase exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattlePhaseContext {
    pub pending: Vec<PendingBattle>,
    /// Aggressor ordering: a copy of the storm order at phase entry.
    pub order: Vec<Faction>,
    /// Index of the faction currently obligated to fight.
    pub index: usize,
    pub sub_phase: BattleSubPhase,
    /// Whether the current sub-phase has already issued its requests.
    /// Re-entry with no answer then falls back to the deterministic default.
    pub prompted: bool,
    pub current: Option<CurrentBattle>,
}

// ── Other phase contexts ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiddingContext {
    pub cards_left: u8,
    pub card_number: u8,
    pub up_for_bid: Option<CardKind>,
    pub bidders: Vec<Faction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentStage {
    AwaitingShipment,
    AwaitingMovement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentContext {
    pub index: usize,
    pub stage: ShipmentStage,
}

// ── Game state ─────────────────────────────────────────────────────────

/// JSON object keys must be strings, so placement-keyed maps serialize
/// as sorted pair lists.
mod placement_map {
    use super::Placement;
    use im::HashMap as ImHashMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, V>(map: &ImHashMap<Placement, V>, ser: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize + Clone,
    {
        let mut pairs: Vec<(&Placement, &V)> = map.iter().collect();
        pairs.sort_by_key(|&(p, _)| *p);
        pairs.serialize(ser)
    }

    pub fn deserialize<'de, D, V>(de: D) -> Result<ImHashMap<Placement, V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de> + Clone,
    {
        let pairs: Vec<(Placement, V)> = Vec::deserialize(de)?;
        Ok(pairs.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub turn: u8,
    pub phase: Phase,
    /// True once the current phase's `initialize` has run.
    pub phase_initialized: bool,

    pub storm_sector: u8,
    /// Global faction ordering, recomputed each Storm phase.
    pub storm_order: Vec<Faction>,

    /// One entry per faction, indexed by `Faction::index`. A fixed array
    /// keeps the lookup total: no faction can ever be missing.
    pub factions: [FactionState; 6],
    /// Force stacks keyed by territory+sector.
    #[serde(with = "placement_map")]
    pub board: ImHashMap<Placement, ImHashMap<Faction, Forces>>,
    #[serde(with = "placement_map")]
    pub spice_on_board: ImHashMap<Placement, u8>,

    pub treachery_deck: Vec<CardKind>,
    pub treachery_discard: Vec<CardKind>,
    pub spice_deck: Vec<SpiceCard>,
    pub spice_discard: Vec<SpiceCard>,
    /// Territory of the most recent spice blow (worm food).
    pub last_blow: Option<LocationId>,
    /// A worm appeared this turn; the Nexus phase will offer alliances.
    pub nexus_flag: bool,

    pub bidding: Option<BiddingContext>,
    pub shipment: Option<ShipmentContext>,
    pub battle: Option<BattlePhaseContext>,

    pub seed: u64,
    pub rng_counter: u64,

    pub winner: Option<Faction>,
}

impl GameState {
    pub fn faction(&self, f: Faction) -> &FactionState {
        &self.factions[f.index()]
    }

    pub fn faction_mut(&mut self, f: Faction) -> &mut FactionState {
        &mut self.factions[f.index()]
    }

    pub fn forces_at(&self, p: Placement, f: Faction) -> Forces {
        self.board
            .get(&p)
            .and_then(|stack| stack.get(&f).copied())
            .unwrap_or_default()
    }

    /// Write a faction's forces at a placement, dropping empty entries so
    /// that "no forces" and "absent" stay indistinguishable.
    pub fn set_forces(&mut self, p: Placement, f: Faction, forces: Forces) {
        let mut stack = self.board.get(&p).cloned().unwrap_or_default();
        if forces.is_empty() {
            stack.remove(&f);
        } else {
            stack.insert(f, forces);
        }
        if stack.is_empty() {
            self.board.remove(&p);
        } else {
            self.board.insert(p, stack);
        }
    }

    pub fn add_forces(&mut self, p: Placement, f: Faction, forces: Forces) {
        let current = self.forces_at(p, f);
        self.set_forces(p, f, current.plus(forces));
    }

    /// Total forces a faction has across a territory's sector group.
    pub fn forces_in_group(&self, f: Faction, location: LocationId, sectors: &[u8]) -> Forces {
        sectors.iter().fold(Forces::default(), |acc, &s| {
            acc.plus(self.forces_at(Placement::new(location, s), f))
        })
    }

    /// Combat-capable factions in a sector group, in storm order.
    pub fn combat_factions_in(&self, location: LocationId, sectors: &[u8]) -> Vec<Faction> {
        self.storm_order
            .iter()
            .copied()
            .filter(|&f| self.forces_in_group(f, location, sectors).combatants() > 0)
            .collect()
    }

    /// Whether a faction occupies (has combat forces in) a territory.
    pub fn occupies(&self, f: Faction, location: LocationId) -> bool {
        map::location(location)
            .sectors
            .iter()
            .any(|&s| self.forces_at(Placement::new(location, s), f).combatants() > 0)
    }

    pub fn allied(&self, a: Faction, b: Faction) -> bool {
        self.faction(a).ally == Some(b)
    }

    /// Draw a fresh deterministic RNG. Each draw advances the counter, so
    /// consecutive draws within one transformation stay independent while
    /// the whole run remains a pure function of the seed.
    pub fn next_rng(&mut self) -> ChaCha8Rng {
        self.rng_counter += 1;
        ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(self.rng_counter.wrapping_mul(999_983)))
    }
}
