// ═══════════════════════════════════════════════════════════════════════
// Game events — the closed vocabulary of everything observable that a
// step can do. Each step returns the events it produced; consumers render
// them (the runner logs them) but the engine never prints.
// ═══════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};

use crate::map::LocationId;
use crate::types::{BattlePlan, CardKind, Faction, Forces, LeaderId, Phase, Placement, ResultKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
}

/// What kind of decision the engine defaulted on behalf of a faction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForcedKind {
    BattleChoice,
    ForesightCommit,
    BattlePlan,
    CaptureChoice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    TurnStarted { turn: u8 },
    PhaseStarted { phase: Phase },
    PhaseEnded { phase: Phase },

    StormMoved { from: u8, to: u8 },
    SpiceBlow { location: LocationId, sector: u8, amount: u8 },
    WormAppeared { devoured: Option<LocationId> },
    NexusCalled,
    AllianceFormed { a: Faction, b: Faction },
    AllianceBroken { a: Faction, b: Faction },
    CharityClaimed { faction: Faction, amount: u8 },
    CardPurchased { faction: Faction, cost: u8 },
    CardDiscarded { faction: Faction, card: CardKind },
    ForcesRevived { faction: Faction, forces: Forces },
    LeaderRevived { faction: Faction, leader: LeaderId },
    ForcesShipped { faction: Faction, to: Placement, forces: Forces, cost: u8 },
    ForcesMoved { faction: Faction, from: Placement, to: Placement, forces: Forces },
    ForcesConverted { faction: Faction, at: Placement, count: u8 },
    ForcesDestroyed { faction: Faction, at: Placement, forces: Forces },
    SpiceCollected { faction: Faction, at: Placement, amount: u8 },
    SpiceRemoved { at: Placement, amount: u8 },

    BattleStarted { location: LocationId, aggressor: Faction, defender: Faction },
    ForesightUsed { faction: Faction, opponent: Faction },
    ForesightRevealed { faction: Faction },
    VoiceCommanded { faction: Faction, opponent: Faction },
    PlanRevealed { faction: Faction, plan: BattlePlan },
    BetrayalDeclared { faction: Faction, leader: LeaderId },
    BattleResolved {
        location: LocationId,
        kind: ResultKind,
        winner: Option<Faction>,
        aggressor_total: u16,
        defender_total: u16,
    },
    LeaderKilled { faction: Faction, leader: LeaderId },
    LeaderReturned { faction: Faction, leader: LeaderId },
    LeaderCaptured { faction: Faction, leader: LeaderId, by: Faction },

    /// A faction failed to answer a request; the engine chose for it.
    ForcedChoice { faction: Faction, kind: ForcedKind },
    /// A shipment or move was refused to keep a stronghold at two factions.
    OccupancyRefused { faction: Faction, location: LocationId },
    NoBattles,
    /// Battles remained when every possible aggressor was exhausted.
    BattlesUnresolved { count: usize },
    GameWon { faction: Faction, allied_with: Option<Faction> },
}

impl GameEvent {
    pub fn severity(&self) -> Severity {
        match self {
            GameEvent::ForcedChoice { .. }
            | GameEvent::OccupancyRefused { .. }
            | GameEvent::BattlesUnresolved { .. } => Severity::Warning,
            _ => Severity::Info,
        }
    }

    /// Human-readable rendering for logs.
    pub fn message(&self) -> String {
        match self {
            GameEvent::TurnStarted { turn } => format!("turn {turn} begins"),
            GameEvent::PhaseStarted { phase } => format!("{phase} phase begins"),
            GameEvent::PhaseEnded { phase } => format!("{phase} phase ends"),
            GameEvent::StormMoved { from, to } => {
                format!("storm moves from sector {from} to sector {to}")
            }
            GameEvent::SpiceBlow { location, sector, amount } => {
                format!("spice blow: {amount} spice at {location} (sector {sector})")
            }
            GameEvent::WormAppeared { devoured: Some(loc) } => {
                format!("Shai-Hulud appears and devours everything in {loc}")
            }
            GameEvent::WormAppeared { devoured: None } => "Shai-Hulud appears".to_string(),
            GameEvent::NexusCalled => "a nexus is called".to_string(),
            GameEvent::AllianceFormed { a, b } => format!("{a} and {b} form an alliance"),
            GameEvent::AllianceBroken { a, b } => format!("{a} and {b} break their alliance"),
            GameEvent::CharityClaimed { faction, amount } => {
                format!("{faction} claims {amount} charity spice")
            }
            GameEvent::CardPurchased { faction, cost } => {
                format!("{faction} buys a treachery card for {cost} spice")
            }
            GameEvent::CardDiscarded { faction, card } => format!("{faction} discards a {card}"),
            GameEvent::ForcesRevived { faction, forces } => {
                format!("{faction} revives {} forces", forces.total())
            }
            GameEvent::LeaderRevived { faction, leader } => {
                format!("{faction} revives {leader}")
            }
            GameEvent::ForcesShipped { faction, to, forces, cost } => {
                format!("{faction} ships {} forces to {to} for {cost} spice", forces.total())
            }
            GameEvent::ForcesMoved { faction, from, to, forces } => {
                format!("{faction} moves {} forces from {from} to {to}", forces.total())
            }
            GameEvent::ForcesConverted { faction, at, count } => {
                format!("{faction} flips {count} advisors to fighters at {at}")
            }
            GameEvent::ForcesDestroyed { faction, at, forces } => {
                format!("{faction} loses {} forces at {at}", forces.total())
            }
            GameEvent::SpiceCollected { faction, at, amount } => {
                format!("{faction} collects {amount} spice at {at}")
            }
            GameEvent::SpiceRemoved { at, amount } => {
                format!("{amount} spice at {at} is lost")
            }
            GameEvent::BattleStarted { location, aggressor, defender } => {
                format!("battle at {location}: {aggressor} attacks {defender}")
            }
            GameEvent::ForesightUsed { faction, opponent } => {
                format!("{faction} demands foresight of {opponent}'s plan")
            }
            GameEvent::ForesightRevealed { faction } => {
                format!("{faction} commits an answer to the foresight question")
            }
            GameEvent::VoiceCommanded { faction, opponent } => {
                format!("{faction} uses the Voice on {opponent}")
            }
            GameEvent::PlanRevealed { faction, plan } => format!(
                "{faction} reveals a plan: {} forces dialed, {} spice",
                plan.dialed(),
                plan.spice
            ),
            GameEvent::BetrayalDeclared { faction, leader } => {
                format!("{faction} reveals {leader} as a traitor")
            }
            GameEvent::BattleResolved { location, kind, winner, aggressor_total, defender_total } => {
                match (kind, winner) {
                    (ResultKind::Annihilation, _) => {
                        format!("lasgun and shield annihilate everything at {location}")
                    }
                    (ResultKind::DualBetrayal, _) => {
                        format!("both leaders at {location} were traitors; nobody wins")
                    }
                    (_, Some(w)) => format!(
                        "{w} wins the battle at {location} ({aggressor_total} vs {defender_total})"
                    ),
                    (_, None) => format!("the battle at {location} ends with no winner"),
                }
            }
            GameEvent::LeaderKilled { faction, leader } => {
                format!("{faction}'s leader {leader} is killed")
            }
            GameEvent::LeaderReturned { faction, leader } => {
                format!("{faction}'s leader {leader} returns to the ready pool")
            }
            GameEvent::LeaderCaptured { faction, leader, by } => {
                format!("{by} captures {faction}'s leader {leader}")
            }
            GameEvent::ForcedChoice { faction, kind } => {
                format!("{faction} did not answer; defaulting {kind:?} decision")
            }
            GameEvent::OccupancyRefused { faction, location } => {
                format!("{faction} refused entry to {location}: already held by two factions")
            }
            GameEvent::NoBattles => "no battles to fight".to_string(),
            GameEvent::BattlesUnresolved { count } => {
                format!("{count} battle(s) left unresolved with no willing aggressor")
            }
            GameEvent::GameWon { faction, allied_with: Some(ally) } => {
                format!("{faction} and {ally} win the game")
            }
            GameEvent::GameWon { faction, allied_with: None } => {
                format!("{faction} wins the game")
            }
        }
    }
}
