// ═══════════════════════════════════════════════════════════════════════
// Random Agent — makes all decisions randomly.
// Serves as baseline and for testing engine stability.
// ═══════════════════════════════════════════════════════════════════════

use crate::agent::Agent;
use dune_engine::map;
use dune_engine::requests::*;
use dune_engine::types::*;
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub struct RandomAgent {
    faction: Faction,
    rng: ChaCha8Rng,
}

impl RandomAgent {
    pub fn new(faction: Faction, seed: u64) -> Self {
        RandomAgent {
            faction,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn random_plan(&mut self, context: &RequestContext) -> Option<ActionData> {
        let RequestContext::Battle { forces, spice, hand, leaders, boost_available, .. } = context
        else {
            return None;
        };
        let fighters = self.rng.gen_range(0..=forces.fighters);
        let elites = self.rng.gen_range(0..=forces.elites);
        let offenses: Vec<CardKind> = hand.iter().copied().filter(|c| c.is_offense()).collect();
        let defenses: Vec<CardKind> = hand.iter().copied().filter(|c| c.is_defense()).collect();
        Some(ActionData::BattlePlan(BattlePlan {
            fighters,
            elites,
            spice: self.rng.gen_range(0..=(*spice).min(4)),
            leader: leaders.choose(&mut self.rng).copied(),
            offense: if self.rng.gen_bool(0.5) { offenses.choose(&mut self.rng).copied() } else { None },
            defense: if self.rng.gen_bool(0.5) { defenses.choose(&mut self.rng).copied() } else { None },
            boost: *boost_available && self.rng.gen_bool(0.5),
        }))
    }

    fn random_shipment(&mut self, context: &RequestContext) -> Option<ActionData> {
        let RequestContext::Shipment { reserves, spice } = context else {
            return None;
        };
        if reserves.combatants() == 0 || *spice == 0 || self.rng.gen_bool(0.4) {
            return None;
        }
        // Aim for a stronghold; the engine refuses full ones anyway.
        let target = *map::STRONGHOLDS.choose(&mut self.rng)?;
        let sector = *map::location(target).sectors.first()?;
        let fighters = self.rng.gen_range(1..=reserves.fighters.max(1)).min(reserves.fighters);
        Some(ActionData::Ship {
            to: Placement::new(target, sector),
            fighters,
            elites: self.rng.gen_range(0..=reserves.elites),
            as_advisors: false,
        })
    }
}

impl Agent for RandomAgent {
    fn name(&self) -> &str {
        "Random"
    }

    fn faction(&self) -> Faction {
        self.faction
    }

    fn decide(&mut self, request: &DecisionRequest) -> DecisionResponse {
        let f = self.faction;
        let kind = request.kind;
        let action = match kind {
            RequestKind::ChooseBattle => match &request.context {
                RequestContext::BattleChoice { battles } if !battles.is_empty() => {
                    Some(ActionData::ChooseBattle { index: self.rng.gen_range(0..battles.len()) })
                }
                _ => None,
            },
            RequestKind::ForesightQuestion => {
                let elements = [
                    PlanElement::Leader,
                    PlanElement::OffenseCard,
                    PlanElement::DefenseCard,
                    PlanElement::Dial,
                ];
                if self.rng.gen_bool(0.5) {
                    elements.choose(&mut self.rng).copied().map(ActionData::ForesightQuestion)
                } else {
                    None
                }
            }
            // Passing lets the engine commit the truthful default.
            RequestKind::ForesightCommit => None,
            RequestKind::Voice => {
                let kinds = [
                    CardKind::ProjectileWeapon,
                    CardKind::PoisonWeapon,
                    CardKind::ProjectileDefense,
                    CardKind::PoisonDefense,
                ];
                kinds.choose(&mut self.rng).map(|&k| {
                    ActionData::Voice(if self.rng.gen_bool(0.5) {
                        VoiceCommand::MustNotPlay(k)
                    } else {
                        VoiceCommand::MustPlay(k)
                    })
                })
            }
            RequestKind::BattlePlan => self.random_plan(&request.context),
            RequestKind::TraitorCall => Some(ActionData::TraitorCall { declare: self.rng.gen_bool(0.8) }),
            RequestKind::WinnerDiscard => Some(ActionData::WinnerDiscard {
                discard_offense: self.rng.gen_bool(0.3),
                discard_defense: self.rng.gen_bool(0.3),
            }),
            RequestKind::CaptureDisposition => {
                Some(ActionData::CaptureDisposition { kill: self.rng.gen_bool(0.5) })
            }
            RequestKind::Shipment => self.random_shipment(&request.context),
            RequestKind::Movement => None,
            RequestKind::Bid => match &request.context {
                RequestContext::Bidding { spice, .. } if *spice > 0 => {
                    Some(ActionData::Bid { spice: self.rng.gen_range(0..=(*spice).min(4)) })
                }
                _ => None,
            },
            RequestKind::Revival => None,
            RequestKind::Alliance => None,
        };
        match action {
            Some(a) => DecisionResponse::act(f, kind, a),
            None => DecisionResponse::pass(f, kind),
        }
    }
}
