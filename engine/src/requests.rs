// ═══════════════════════════════════════════════════════════════════════
// The decision boundary — requests the engine emits when it needs input
// and responses callers feed back in. Both sides are closed enums: every
// prompt and every legal answer shape is named here.
// ═══════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};

use crate::map::LocationId;
use crate::types::{
    AllianceAction, BattlePlan, CardKind, ElementAnswer, Faction, Forces, LeaderId,
    PendingBattle, PlanElement, Placement, VoiceCommand,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    ChooseBattle,
    ForesightQuestion,
    ForesightCommit,
    Voice,
    BattlePlan,
    TraitorCall,
    WinnerDiscard,
    CaptureDisposition,
    Shipment,
    Movement,
    Bid,
    Revival,
    Alliance,
}

/// Context shipped with a request so a caller can decide without reading
/// the whole game state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestContext {
    None,
    BattleChoice {
        battles: Vec<PendingBattle>,
    },
    Battle {
        location: LocationId,
        sectors: Vec<u8>,
        opponent: Faction,
        /// This faction's forces in the battle group.
        forces: Forces,
        spice: u8,
        hand: Vec<CardKind>,
        leaders: Vec<LeaderId>,
        /// Voice command binding this faction's plan, if any.
        voice: Option<VoiceCommand>,
        /// Element answer this faction already committed to, if any.
        foresight: Option<ElementAnswer>,
        boost_available: bool,
    },
    Traitor {
        location: LocationId,
        opponent: Faction,
        /// The opponent leader this faction holds a traitor card for.
        leader: LeaderId,
    },
    Bidding {
        card_number: u8,
        cards_left: u8,
        spice: u8,
    },
    Revival {
        dead: Forces,
        dead_leaders: Vec<LeaderId>,
        free: u8,
        spice: u8,
    },
    Shipment {
        reserves: Forces,
        spice: u8,
    },
    Movement {
        /// Placements this faction currently occupies.
        from: Vec<Placement>,
        /// Movement range in territories.
        range: u8,
    },
    Alliance {
        /// Factions that may be proposed to.
        candidates: Vec<Faction>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub faction: Faction,
    pub kind: RequestKind,
    pub prompt: String,
    pub context: RequestContext,
}

/// The payload of an affirmative answer. Variants mirror RequestKind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionData {
    ChooseBattle { index: usize },
    ForesightQuestion(PlanElement),
    ForesightCommit(ElementAnswer),
    Voice(VoiceCommand),
    BattlePlan(BattlePlan),
    TraitorCall { declare: bool },
    WinnerDiscard { discard_offense: bool, discard_defense: bool },
    CaptureDisposition { kill: bool },
    Ship { to: Placement, fighters: u8, elites: u8, as_advisors: bool },
    Move { from: Placement, to: Placement, fighters: u8, elites: u8, convert_advisors: u8 },
    Bid { spice: u8 },
    Revival { fighters: u8, elites: u8, leader: Option<LeaderId> },
    Alliance(AllianceAction),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub faction: Faction,
    pub kind: RequestKind,
    pub action: Option<ActionData>,
    /// Declining the prompt. A missing response means the same thing.
    pub passed: bool,
    /// Free-form note from the deciding agent, ignored by the engine.
    pub reasoning: Option<String>,
}

impl DecisionResponse {
    pub fn pass(faction: Faction, kind: RequestKind) -> DecisionResponse {
        DecisionResponse { faction, kind, action: None, passed: true, reasoning: None }
    }

    pub fn act(faction: Faction, kind: RequestKind, action: ActionData) -> DecisionResponse {
        DecisionResponse { faction, kind, action: Some(action), passed: false, reasoning: None }
    }
}

/// Response lookup for one step. Absence and an explicit pass read the
/// same way, so handlers only ever see `Option<&ActionData>`.
pub struct ResponseSet<'a> {
    responses: &'a [DecisionResponse],
}

impl<'a> ResponseSet<'a> {
    pub fn new(responses: &'a [DecisionResponse]) -> ResponseSet<'a> {
        ResponseSet { responses }
    }

    pub fn action_of(&self, faction: Faction, kind: RequestKind) -> Option<&'a ActionData> {
        self.responses
            .iter()
            .find(|r| r.faction == faction && r.kind == kind && !r.passed)
            .and_then(|r| r.action.as_ref())
    }
}
