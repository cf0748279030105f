// ═══════════════════════════════════════════════════════════════════════
// Heuristic Agent — simple strategic rules of thumb.
// Noticeably stronger than RandomAgent without any search.
// ═══════════════════════════════════════════════════════════════════════

use crate::agent::Agent;
use dune_engine::cards;
use dune_engine::map;
use dune_engine::requests::*;
use dune_engine::types::*;
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub struct HeuristicAgent {
    faction: Faction,
    rng: ChaCha8Rng,
}

impl HeuristicAgent {
    pub fn new(faction: Faction, seed: u64) -> Self {
        HeuristicAgent {
            faction,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn strongest_leader(leaders: &[LeaderId]) -> Option<LeaderId> {
        leaders.iter().copied().max_by_key(|&id| cards::leader(id).strength)
    }

    /// Full dial, strongest leader, weapon and defense if held, and
    /// enough spice to back the dial.
    fn battle_plan(&mut self, context: &RequestContext) -> Option<ActionData> {
        let RequestContext::Battle { forces, spice, hand, leaders, boost_available, .. } = context
        else {
            return None;
        };
        let dialed = forces.fighters + forces.elites;
        let offense = hand
            .iter()
            .copied()
            .find(|c| c.is_offense() && *c != CardKind::Worthless && *c != CardKind::Lasgun);
        let defense = hand
            .iter()
            .copied()
            .find(|c| c.is_defense() && *c != CardKind::Worthless);
        Some(ActionData::BattlePlan(BattlePlan {
            fighters: forces.fighters,
            elites: forces.elites,
            spice: (*spice / 2).min(dialed),
            leader: Self::strongest_leader(leaders),
            offense,
            defense,
            boost: *boost_available,
        }))
    }

    /// Reinforce a held stronghold or grab an empty one.
    fn shipment(&mut self, context: &RequestContext) -> Option<ActionData> {
        let RequestContext::Shipment { reserves, spice } = context else {
            return None;
        };
        if reserves.combatants() < 3 || *spice < 4 {
            return None;
        }
        let target = *map::STRONGHOLDS.choose(&mut self.rng)?;
        let sector = *map::location(target).sectors.first()?;
        // Keep a third in reserve against a bad turn.
        let fighters = (reserves.fighters * 2) / 3;
        if fighters == 0 {
            return None;
        }
        Some(ActionData::Ship {
            to: Placement::new(target, sector),
            fighters,
            elites: reserves.elites,
            as_advisors: false,
        })
    }
}

impl Agent for HeuristicAgent {
    fn name(&self) -> &str {
        "Heuristic"
    }

    fn faction(&self) -> Faction {
        self.faction
    }

    fn decide(&mut self, request: &DecisionRequest) -> DecisionResponse {
        let f = self.faction;
        let kind = request.kind;
        let action = match kind {
            // Fight where the odds look best: fewest enemy bodies.
            RequestKind::ChooseBattle => match &request.context {
                RequestContext::BattleChoice { battles } if !battles.is_empty() => {
                    let index = battles
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, b)| b.factions.len())
                        .map(|(i, _)| i)
                        .unwrap_or(0);
                    Some(ActionData::ChooseBattle { index })
                }
                _ => None,
            },
            // The leader slot tells the most about the enemy plan.
            RequestKind::ForesightQuestion => {
                Some(ActionData::ForesightQuestion(PlanElement::Leader))
            }
            RequestKind::ForesightCommit => None,
            // Forbid the most dangerous card kind at random.
            RequestKind::Voice => {
                let k = if self.rng.gen_bool(0.5) {
                    CardKind::ProjectileWeapon
                } else {
                    CardKind::PoisonWeapon
                };
                Some(ActionData::Voice(VoiceCommand::MustNotPlay(k)))
            }
            RequestKind::BattlePlan => self.battle_plan(&request.context),
            // A traitor in hand is a battle already won.
            RequestKind::TraitorCall => Some(ActionData::TraitorCall { declare: true }),
            RequestKind::WinnerDiscard => Some(ActionData::WinnerDiscard {
                discard_offense: false,
                discard_defense: false,
            }),
            // Dead leaders pay better than hostages.
            RequestKind::CaptureDisposition => Some(ActionData::CaptureDisposition { kill: true }),
            RequestKind::Shipment => self.shipment(&request.context),
            RequestKind::Movement => None,
            RequestKind::Bid => match &request.context {
                RequestContext::Bidding { spice, .. } if *spice >= 4 => {
                    Some(ActionData::Bid { spice: (*spice / 3).max(1) })
                }
                _ => None,
            },
            // The free revivals plus one paid body when flush.
            RequestKind::Revival => match &request.context {
                RequestContext::Revival { dead, free, spice, dead_leaders } => {
                    let extra = u8::from(*spice >= 6);
                    let fighters = (free + extra).min(dead.fighters + dead.advisors);
                    let leader = if *spice >= 10 { dead_leaders.first().copied() } else { None };
                    Some(ActionData::Revival { fighters, elites: 0, leader })
                }
                _ => None,
            },
            // Take any willing partner.
            RequestKind::Alliance => match &request.context {
                RequestContext::Alliance { candidates } => candidates
                    .first()
                    .copied()
                    .map(|c| ActionData::Alliance(AllianceAction::Propose(c))),
                _ => None,
            },
        };
        match action {
            Some(a) => DecisionResponse::act(f, kind, a),
            None => DecisionResponse::pass(f, kind),
        }
    }
}
