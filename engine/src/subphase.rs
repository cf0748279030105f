// ═══════════════════════════════════════════════════════════════════════
// Battle sub-phase router. Each sub-phase is a function in a static
// dispatch table; the runner loops through automatic sub-phases and
// stops whenever one suspends on decision requests.
//
// The `prompted` flag on the context is the suspend/resume latch: a
// handler only reads answers after it issued the matching requests in an
// earlier step, so stale responses from previous prompts are never
// misread. A missing answer to a mandatory prompt falls back to a
// deterministic default and a warning event.
// ═══════════════════════════════════════════════════════════════════════

use rand::Rng;

use crate::battle::{self, has_hostile_pair};
use crate::error::{EngineError, EngineResult};
use crate::events::{ForcedKind, GameEvent};
use crate::phase::StepResult;
use crate::requests::{
    ActionData, DecisionRequest, DecisionResponse, RequestContext, RequestKind, ResponseSet,
};
use crate::resolution;
use crate::types::{
    BattlePhaseContext, BattlePlan, BattleSubPhase, CardKind, CurrentBattle, ElementAnswer,
    Faction, GameState, LeaderStatus, PendingBattle, PlanElement, ResultKind, VoiceCommand,
};

pub enum SubStep {
    Wait(GameState, Vec<DecisionRequest>),
    Continue(GameState),
    PhaseDone(GameState),
}

type SubHandler = fn(GameState, &ResponseSet, &mut Vec<GameEvent>) -> EngineResult<SubStep>;

const ROUTES: [(BattleSubPhase, SubHandler); 10] = [
    (BattleSubPhase::Choosing, choosing),
    (BattleSubPhase::ForesightOpportunity, foresight_opportunity),
    (BattleSubPhase::ForesightReveal, foresight_reveal),
    (BattleSubPhase::VoiceOpportunity, voice_opportunity),
    (BattleSubPhase::CreatingPlans, creating_plans),
    (BattleSubPhase::RevealingPlans, revealing_plans),
    (BattleSubPhase::BetrayalDeclaration, betrayal_declaration),
    (BattleSubPhase::Resolution, resolution_step),
    (BattleSubPhase::WinnerDiscard, winner_discard),
    (BattleSubPhase::CaptureChoice, capture_choice),
];

fn route(sub: BattleSubPhase) -> EngineResult<SubHandler> {
    ROUTES
        .iter()
        .find(|(s, _)| *s == sub)
        .map(|(_, h)| *h)
        .ok_or_else(|| EngineError::CorruptState(format!("unrouted sub-phase {sub:?}")))
}

/// Drive the battle phase until it suspends or finishes.
pub fn run(mut state: GameState, responses: &[DecisionResponse]) -> EngineResult<StepResult> {
    let answers = ResponseSet::new(responses);
    let mut events = Vec::new();
    loop {
        let sub = ctx_ref(&state)?.sub_phase;
        match route(sub)?(state, &answers, &mut events)? {
            SubStep::Wait(s, requests) => return Ok(StepResult::waiting(s, events, requests)),
            SubStep::Continue(s) => state = s,
            SubStep::PhaseDone(mut s) => {
                s.battle = None;
                return Ok(StepResult::complete(s, events));
            }
        }
    }
}

fn ctx_ref(state: &GameState) -> EngineResult<&BattlePhaseContext> {
    state
        .battle
        .as_ref()
        .ok_or_else(|| EngineError::CorruptState("battle phase without battle context".into()))
}

fn take_ctx(state: &mut GameState) -> EngineResult<BattlePhaseContext> {
    state
        .battle
        .take()
        .ok_or_else(|| EngineError::CorruptState("battle phase without battle context".into()))
}

fn current_of(ctx: &BattlePhaseContext) -> EngineResult<&CurrentBattle> {
    ctx.current
        .as_ref()
        .ok_or_else(|| EngineError::CorruptState("battle sub-phase without a current battle".into()))
}

// ── Choosing ───────────────────────────────────────────────────────────

fn choosing(
    mut state: GameState,
    answers: &ResponseSet,
    events: &mut Vec<GameEvent>,
) -> EngineResult<SubStep> {
    let mut ctx = take_ctx(&mut state)?;
    battle::prune_battles(&state, &mut ctx.pending);

    // Walk the aggressor order to the first faction that still owes a
    // battle. A faction is never skipped while it has one.
    let (aggressor, eligible) = loop {
        if ctx.index >= ctx.order.len() {
            if !ctx.pending.is_empty() {
                events.push(GameEvent::BattlesUnresolved { count: ctx.pending.len() });
            }
            state.battle = Some(ctx);
            return Ok(SubStep::PhaseDone(state));
        }
        let f = ctx.order[ctx.index];
        let eligible = battle::eligible_battles(&state, &ctx.pending, f);
        if eligible.is_empty() {
            ctx.index += 1;
            ctx.prompted = false;
            continue;
        }
        break (f, eligible);
    };

    // The aggressor is always offered the choice, even with a single
    // eligible battle on the board.
    if !ctx.prompted {
        ctx.prompted = true;
        let battles = eligible.iter().map(|&i| ctx.pending[i].clone()).collect();
        let request = DecisionRequest {
            faction: aggressor,
            kind: RequestKind::ChooseBattle,
            prompt: "Choose which of your battles to fight next".to_string(),
            context: RequestContext::BattleChoice { battles },
        };
        state.battle = Some(ctx);
        return Ok(SubStep::Wait(state, vec![request]));
    }

    let pick = match answers.action_of(aggressor, RequestKind::ChooseBattle) {
        Some(ActionData::ChooseBattle { index }) if *index < eligible.len() => eligible[*index],
        _ => {
            events.push(GameEvent::ForcedChoice {
                faction: aggressor,
                kind: ForcedKind::BattleChoice,
            });
            eligible[0]
        }
    };
    ctx.prompted = false;
    let set = ctx.pending.remove(pick);
    let defender = set
        .factions
        .iter()
        .copied()
        .find(|&o| o != aggressor && !state.allied(aggressor, o))
        .ok_or(EngineError::DegenerateBattle { location: set.location })?;
    events.push(GameEvent::BattleStarted { location: set.location, aggressor, defender });
    ctx.current = Some(CurrentBattle {
        location: set.location,
        sectors: set.sectors,
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
    });
    ctx.sub_phase = BattleSubPhase::ForesightOpportunity;
    state.battle = Some(ctx);
    Ok(SubStep::Continue(state))
}

// ── Foresight ──────────────────────────────────────────────────────────

fn foresight_opportunity(
    mut state: GameState,
    answers: &ResponseSet,
    events: &mut Vec<GameEvent>,
) -> EngineResult<SubStep> {
    let mut ctx = take_ctx(&mut state)?;
    {
        let cur = current_of(&ctx)?;
        let seer = [cur.aggressor, cur.defender]
            .into_iter()
            .find(|&f| f == Faction::Atreides);
        let Some(seer) = seer else {
            ctx.sub_phase = BattleSubPhase::VoiceOpportunity;
            state.battle = Some(ctx);
            return Ok(SubStep::Continue(state));
        };
        let opponent = cur.opponent_of(seer);
        if !ctx.prompted {
            ctx.prompted = true;
            let request = DecisionRequest {
                faction: seer,
                kind: RequestKind::ForesightQuestion,
                prompt: format!("Demand foresight of one element of {opponent}'s battle plan"),
                context: RequestContext::None,
            };
            state.battle = Some(ctx);
            return Ok(SubStep::Wait(state, vec![request]));
        }
        ctx.prompted = false;
        match answers.action_of(seer, RequestKind::ForesightQuestion) {
            Some(ActionData::ForesightQuestion(element)) => {
                let element = *element;
                let cur = ctx.current.as_mut().ok_or_else(|| {
                    EngineError::CorruptState("battle sub-phase without a current battle".into())
                })?;
                cur.foresight_question = Some(element);
                events.push(GameEvent::ForesightUsed { faction: seer, opponent });
                ctx.sub_phase = BattleSubPhase::ForesightReveal;
            }
            _ => ctx.sub_phase = BattleSubPhase::VoiceOpportunity,
        }
    }
    state.battle = Some(ctx);
    Ok(SubStep::Continue(state))
}

fn foresight_reveal(
    mut state: GameState,
    answers: &ResponseSet,
    events: &mut Vec<GameEvent>,
) -> EngineResult<SubStep> {
    let mut ctx = take_ctx(&mut state)?;
    let (responder, question) = {
        let cur = current_of(&ctx)?;
        let responder = cur.opponent_of(Faction::Atreides);
        let question = cur.foresight_question.ok_or_else(|| {
            EngineError::CorruptState("foresight reveal without a question".into())
        })?;
        (responder, question)
    };
    if !ctx.prompted {
        ctx.prompted = true;
        let request = DecisionRequest {
            faction: responder,
            kind: RequestKind::ForesightCommit,
            prompt: format!("Truthfully commit the {question:?} element of your coming plan"),
            context: RequestContext::None,
        };
        state.battle = Some(ctx);
        return Ok(SubStep::Wait(state, vec![request]));
    }
    ctx.prompted = false;
    let answer = match answers.action_of(responder, RequestKind::ForesightCommit) {
        Some(ActionData::ForesightCommit(a)) if a.element() == question => *a,
        _ => {
            events.push(GameEvent::ForcedChoice {
                faction: responder,
                kind: ForcedKind::ForesightCommit,
            });
            default_commitment(&state, &ctx, responder, question)?
        }
    };
    let cur = ctx.current.as_mut().ok_or_else(|| {
        EngineError::CorruptState("battle sub-phase without a current battle".into())
    })?;
    cur.foresight_answer = Some(answer);
    events.push(GameEvent::ForesightRevealed { faction: responder });
    ctx.sub_phase = BattleSubPhase::VoiceOpportunity;
    state.battle = Some(ctx);
    Ok(SubStep::Continue(state))
}

/// The commitment a silent responder is held to: whatever the forced
/// default plan would show for the questioned element.
fn default_commitment(
    state: &GameState,
    ctx: &BattlePhaseContext,
    responder: Faction,
    question: PlanElement,
) -> EngineResult<ElementAnswer> {
    let cur = current_of(ctx)?;
    let plan = default_plan(state, cur, responder);
    Ok(match question {
        PlanElement::Leader => ElementAnswer::Leader(plan.leader),
        PlanElement::OffenseCard => ElementAnswer::OffenseCard(plan.offense),
        PlanElement::DefenseCard => ElementAnswer::DefenseCard(plan.defense),
        PlanElement::Dial => ElementAnswer::Dial(plan.dialed()),
    })
}

// ── The Voice ──────────────────────────────────────────────────────────

fn voice_opportunity(
    mut state: GameState,
    answers: &ResponseSet,
    events: &mut Vec<GameEvent>,
) -> EngineResult<SubStep> {
    let mut ctx = take_ctx(&mut state)?;
    let voicer = {
        let cur = current_of(&ctx)?;
        [cur.aggressor, cur.defender]
            .into_iter()
            .find(|&f| f == Faction::BeneGesserit)
    };
    let Some(voicer) = voicer else {
        ctx.sub_phase = BattleSubPhase::CreatingPlans;
        state.battle = Some(ctx);
        return Ok(SubStep::Continue(state));
    };
    let opponent = current_of(&ctx)?.opponent_of(voicer);
    if !ctx.prompted {
        ctx.prompted = true;
        let request = DecisionRequest {
            faction: voicer,
            kind: RequestKind::Voice,
            prompt: format!("Command {opponent} to play or not play a card kind"),
            context: RequestContext::None,
        };
        state.battle = Some(ctx);
        return Ok(SubStep::Wait(state, vec![request]));
    }
    ctx.prompted = false;
    if let Some(ActionData::Voice(cmd)) = answers.action_of(voicer, RequestKind::Voice) {
        let cmd = *cmd;
        let cur = ctx.current.as_mut().ok_or_else(|| {
            EngineError::CorruptState("battle sub-phase without a current battle".into())
        })?;
        cur.voice = Some((opponent, cmd));
        events.push(GameEvent::VoiceCommanded { faction: voicer, opponent });
    }
    ctx.sub_phase = BattleSubPhase::CreatingPlans;
    state.battle = Some(ctx);
    Ok(SubStep::Continue(state))
}

// ── Plans ──────────────────────────────────────────────────────────────

fn creating_plans(
    mut state: GameState,
    answers: &ResponseSet,
    events: &mut Vec<GameEvent>,
) -> EngineResult<SubStep> {
    let mut ctx = take_ctx(&mut state)?;
    let (aggressor, defender) = {
        let cur = current_of(&ctx)?;
        (cur.aggressor, cur.defender)
    };
    if !ctx.prompted {
        ctx.prompted = true;
        let requests = vec![
            plan_request(&state, current_of(&ctx)?, aggressor),
            plan_request(&state, current_of(&ctx)?, defender),
        ];
        state.battle = Some(ctx);
        return Ok(SubStep::Wait(state, requests));
    }
    ctx.prompted = false;
    for f in [aggressor, defender] {
        let cur_snapshot = current_of(&ctx)?.clone();
        let plan = match answers.action_of(f, RequestKind::BattlePlan) {
            Some(ActionData::BattlePlan(p)) => validate_plan(&state, &cur_snapshot, f, *p),
            _ => {
                events.push(GameEvent::ForcedChoice { faction: f, kind: ForcedKind::BattlePlan });
                default_plan(&state, &cur_snapshot, f)
            }
        };
        let cur = ctx.current.as_mut().ok_or_else(|| {
            EngineError::CorruptState("battle sub-phase without a current battle".into())
        })?;
        if f == cur.aggressor {
            cur.aggressor_plan = Some(plan);
        } else {
            cur.defender_plan = Some(plan);
        }
    }
    ctx.sub_phase = BattleSubPhase::RevealingPlans;
    state.battle = Some(ctx);
    Ok(SubStep::Continue(state))
}

fn plan_request(state: &GameState, cur: &CurrentBattle, f: Faction) -> DecisionRequest {
    let fs = state.faction(f);
    let opponent = cur.opponent_of(f);
    let voice = match cur.voice {
        Some((bound, cmd)) if bound == f => Some(cmd),
        _ => None,
    };
    let foresight = match cur.foresight_answer {
        Some(a) if cur.opponent_of(Faction::Atreides) == f => Some(a),
        _ => None,
    };
    DecisionRequest {
        faction: f,
        kind: RequestKind::BattlePlan,
        prompt: format!("Commit your battle plan against {opponent} at {}", cur.location),
        context: RequestContext::Battle {
            location: cur.location,
            sectors: cur.sectors.clone(),
            opponent,
            forces: state.forces_in_group(f, cur.location, &cur.sectors),
            spice: fs.spice,
            hand: fs.hand.clone(),
            leaders: fs.available_leaders(),
            voice,
            foresight,
            boost_available: boost_available(state, f),
        },
    }
}

fn boost_available(state: &GameState, f: Faction) -> bool {
    f == Faction::Atreides && state.faction(f).forces_lost_total >= 7
}

/// Coerce a submitted plan into legality. Every clamp is silent; the
/// plan that comes out is the plan that fights.
pub fn validate_plan(
    state: &GameState,
    cur: &CurrentBattle,
    f: Faction,
    mut plan: BattlePlan,
) -> BattlePlan {
    let group = state.forces_in_group(f, cur.location, &cur.sectors);
    let fs = state.faction(f);
    plan.fighters = plan.fighters.min(group.fighters);
    plan.elites = plan.elites.min(group.elites);
    plan.spice = plan.spice.min(fs.spice);

    let available = fs.available_leaders();
    if let Some(id) = plan.leader {
        if !available.contains(&id) {
            plan.leader = available.first().copied();
        }
    }

    let held = |c: CardKind| fs.hand.iter().filter(|&&h| h == c).count();
    if let Some(c) = plan.offense {
        if !c.is_offense() || held(c) == 0 {
            plan.offense = None;
        }
    }
    if let Some(c) = plan.defense {
        if !c.is_defense() || held(c) == 0 {
            plan.defense = None;
        }
    }
    // One physical card cannot fill both slots.
    if let (Some(o), Some(d)) = (plan.offense, plan.defense) {
        if o == d && held(o) < 2 {
            plan.defense = None;
        }
    }

    if let Some((bound, cmd)) = cur.voice {
        if bound == f {
            apply_voice(&mut plan, cmd, &held);
        }
    }

    if let Some(answer) = cur.foresight_answer {
        if cur.opponent_of(Faction::Atreides) == f {
            apply_commitment(&mut plan, answer, group, &available, &held);
        }
    }

    // Cards ride on a leader; with none available they stay home.
    if plan.leader.is_none() {
        plan.offense = None;
        plan.defense = None;
    }

    plan.boost = plan.boost && boost_available(state, f);
    plan
}

fn apply_voice(plan: &mut BattlePlan, cmd: VoiceCommand, held: &dyn Fn(CardKind) -> usize) {
    match cmd {
        VoiceCommand::MustNotPlay(k) => {
            if plan.offense == Some(k) {
                plan.offense = None;
            }
            if plan.defense == Some(k) {
                plan.defense = None;
            }
        }
        VoiceCommand::MustPlay(k) => {
            // Compliance only binds a hand that holds the card.
            if held(k) == 0 {
                return;
            }
            if k.is_defense() && !k.is_offense() {
                plan.defense = Some(k);
            } else if k.is_offense() && !k.is_defense() {
                plan.offense = Some(k);
            } else if plan.offense.is_none() {
                plan.offense = Some(k);
            } else {
                plan.defense = Some(k);
            }
        }
    }
}

/// Force the committed foresight element onto the final plan.
fn apply_commitment(
    plan: &mut BattlePlan,
    answer: ElementAnswer,
    group: crate::types::Forces,
    available: &[crate::types::LeaderId],
    held: &dyn Fn(CardKind) -> usize,
) {
    match answer {
        ElementAnswer::Leader(l) => {
            plan.leader = match l {
                Some(id) if available.contains(&id) => Some(id),
                _ => None,
            };
        }
        ElementAnswer::OffenseCard(c) => {
            plan.offense = c.filter(|&k| k.is_offense() && held(k) > 0);
        }
        ElementAnswer::DefenseCard(c) => {
            plan.defense = c.filter(|&k| k.is_defense() && held(k) > 0);
        }
        ElementAnswer::Dial(d) => {
            plan.fighters = d.min(group.fighters);
            plan.elites = (d - plan.fighters).min(group.elites);
        }
    }
}

/// The deterministic fallback plan: dial everything, lead with the first
/// ready leader, play no cards, spend no spice.
pub fn default_plan(state: &GameState, cur: &CurrentBattle, f: Faction) -> BattlePlan {
    let group = state.forces_in_group(f, cur.location, &cur.sectors);
    let raw = BattlePlan {
        fighters: group.fighters,
        elites: group.elites,
        spice: 0,
        leader: state.faction(f).available_leaders().first().copied(),
        offense: None,
        defense: None,
        boost: false,
    };
    validate_plan(state, cur, f, raw)
}

// ── Reveal and betrayal ────────────────────────────────────────────────

fn revealing_plans(
    mut state: GameState,
    _answers: &ResponseSet,
    events: &mut Vec<GameEvent>,
) -> EngineResult<SubStep> {
    let mut ctx = take_ctx(&mut state)?;
    {
        let cur = current_of(&ctx)?;
        for f in [cur.aggressor, cur.defender] {
            let plan = cur.plan_of(f).copied().ok_or_else(|| {
                EngineError::CorruptState("reveal without both plans committed".into())
            })?;
            events.push(GameEvent::PlanRevealed { faction: f, plan });
        }
    }
    let callers = traitor_callers(&state, current_of(&ctx)?);
    ctx.sub_phase = if callers.is_empty() {
        BattleSubPhase::Resolution
    } else {
        BattleSubPhase::BetrayalDeclaration
    };
    state.battle = Some(ctx);
    Ok(SubStep::Continue(state))
}

/// Sides holding a traitor card for the opposing revealed leader.
fn traitor_callers(state: &GameState, cur: &CurrentBattle) -> Vec<Faction> {
    [cur.aggressor, cur.defender]
        .into_iter()
        .filter(|&f| {
            let opponent = cur.opponent_of(f);
            cur.plan_of(opponent)
                .and_then(|p| p.leader)
                .is_some_and(|id| state.faction(f).traitors.contains(&id))
        })
        .collect()
}

fn betrayal_declaration(
    mut state: GameState,
    answers: &ResponseSet,
    events: &mut Vec<GameEvent>,
) -> EngineResult<SubStep> {
    let mut ctx = take_ctx(&mut state)?;
    let callers = traitor_callers(&state, current_of(&ctx)?);
    if !ctx.prompted {
        ctx.prompted = true;
        let cur = current_of(&ctx)?;
        let mut requests = Vec::new();
        for &f in &callers {
            let opponent = cur.opponent_of(f);
            let Some(leader) = cur.plan_of(opponent).and_then(|p| p.leader) else {
                continue;
            };
            requests.push(DecisionRequest {
                faction: f,
                kind: RequestKind::TraitorCall,
                prompt: format!("{leader} is in your pay. Reveal the betrayal?"),
                context: RequestContext::Traitor { location: cur.location, opponent, leader },
            });
        }
        state.battle = Some(ctx);
        return Ok(SubStep::Wait(state, requests));
    }
    ctx.prompted = false;
    for f in callers {
        if let Some(ActionData::TraitorCall { declare: true }) =
            answers.action_of(f, RequestKind::TraitorCall)
        {
            let cur = ctx.current.as_mut().ok_or_else(|| {
                EngineError::CorruptState("battle sub-phase without a current battle".into())
            })?;
            let opponent = cur.opponent_of(f);
            if let Some(leader) = cur.plan_of(opponent).and_then(|p| p.leader) {
                cur.betrayal_by.push(f);
                events.push(GameEvent::BetrayalDeclared { faction: f, leader });
            }
        }
    }
    ctx.sub_phase = BattleSubPhase::Resolution;
    state.battle = Some(ctx);
    Ok(SubStep::Continue(state))
}

// ── Resolution and aftermath ───────────────────────────────────────────

fn resolution_step(
    mut state: GameState,
    _answers: &ResponseSet,
    events: &mut Vec<GameEvent>,
) -> EngineResult<SubStep> {
    let mut ctx = take_ctx(&mut state)?;
    let cur = current_of(&ctx)?.clone();
    let result = resolution::resolve(&state, &ctx.order, &cur)?;
    events.push(GameEvent::BattleResolved {
        location: cur.location,
        kind: result.kind,
        winner: result.winner,
        aggressor_total: result.aggressor.total,
        defender_total: result.defender.total,
    });
    resolution::apply(&mut state, &cur, &result, events)?;
    let normal = result.kind == ResultKind::Normal;
    if let Some(c) = ctx.current.as_mut() {
        c.result = Some(result);
    }
    if normal {
        ctx.sub_phase = BattleSubPhase::WinnerDiscard;
        state.battle = Some(ctx);
        Ok(SubStep::Continue(state))
    } else {
        finish_battle(&mut state, &mut ctx, events)?;
        state.battle = Some(ctx);
        Ok(SubStep::Continue(state))
    }
}

fn winner_discard(
    mut state: GameState,
    answers: &ResponseSet,
    events: &mut Vec<GameEvent>,
) -> EngineResult<SubStep> {
    let mut ctx = take_ctx(&mut state)?;
    let cur = current_of(&ctx)?.clone();
    let result = cur
        .result
        .clone()
        .ok_or_else(|| EngineError::CorruptState("winner discard before resolution".into()))?;
    let Some(winner) = result.winner else {
        finish_battle(&mut state, &mut ctx, events)?;
        state.battle = Some(ctx);
        return Ok(SubStep::Continue(state));
    };
    let plan = cur.plan_of(winner).copied().unwrap_or_default();

    if !ctx.prompted {
        // Worthless cards served their purpose and always go.
        for card in [plan.offense, plan.defense].into_iter().flatten() {
            if card == CardKind::Worthless {
                discard_from_hand(&mut state, winner, card, events);
            }
        }
        let keepable: Vec<CardKind> = [plan.offense, plan.defense]
            .into_iter()
            .flatten()
            .filter(|&c| c != CardKind::Worthless)
            .collect();
        if keepable.is_empty() {
            advance_after_discard(&mut state, &mut ctx, &result, events)?;
            state.battle = Some(ctx);
            return Ok(SubStep::Continue(state));
        }
        ctx.prompted = true;
        let request = DecisionRequest {
            faction: winner,
            kind: RequestKind::WinnerDiscard,
            prompt: "Discard any of the cards you played, or keep them".to_string(),
            context: RequestContext::None,
        };
        state.battle = Some(ctx);
        return Ok(SubStep::Wait(state, vec![request]));
    }

    ctx.prompted = false;
    if let Some(ActionData::WinnerDiscard { discard_offense, discard_defense }) =
        answers.action_of(winner, RequestKind::WinnerDiscard)
    {
        if *discard_offense {
            if let Some(c) = plan.offense.filter(|&c| c != CardKind::Worthless) {
                discard_from_hand(&mut state, winner, c, events);
            }
        }
        if *discard_defense {
            if let Some(c) = plan.defense.filter(|&c| c != CardKind::Worthless) {
                discard_from_hand(&mut state, winner, c, events);
            }
        }
    }
    advance_after_discard(&mut state, &mut ctx, &result, events)?;
    state.battle = Some(ctx);
    Ok(SubStep::Continue(state))
}

fn discard_from_hand(
    state: &mut GameState,
    f: Faction,
    card: CardKind,
    events: &mut Vec<GameEvent>,
) {
    if let Some(pos) = state.faction(f).hand.iter().position(|&c| c == card) {
        state.faction_mut(f).hand.remove(pos);
        state.treachery_discard.push(card);
        events.push(GameEvent::CardDiscarded { faction: f, card });
    }
}

/// After the winner settles its cards, a Harkonnen victor may take a
/// prisoner; otherwise the battle closes out.
fn advance_after_discard(
    state: &mut GameState,
    ctx: &mut BattlePhaseContext,
    result: &crate::types::BattleResult,
    events: &mut Vec<GameEvent>,
) -> EngineResult<()> {
    let capture = result.winner == Some(Faction::Harkonnen)
        && result
            .loser
            .is_some_and(|l| !state.faction(l).available_leaders().is_empty());
    if capture {
        ctx.sub_phase = BattleSubPhase::CaptureChoice;
    } else {
        finish_battle(state, ctx, events)?;
    }
    Ok(())
}

fn capture_choice(
    mut state: GameState,
    answers: &ResponseSet,
    events: &mut Vec<GameEvent>,
) -> EngineResult<SubStep> {
    let mut ctx = take_ctx(&mut state)?;
    let cur = current_of(&ctx)?.clone();
    let loser = cur
        .result
        .as_ref()
        .and_then(|r| r.loser)
        .ok_or_else(|| EngineError::CorruptState("capture choice without a loser".into()))?;

    if !ctx.prompted {
        let candidates = state.faction(loser).available_leaders();
        if candidates.is_empty() {
            finish_battle(&mut state, &mut ctx, events)?;
            state.battle = Some(ctx);
            return Ok(SubStep::Continue(state));
        }
        let pick = {
            let mut rng = state.next_rng();
            candidates[rng.gen_range(0..candidates.len())]
        };
        if let Some(c) = ctx.current.as_mut() {
            c.capture_target = Some(pick);
        }
        ctx.prompted = true;
        let request = DecisionRequest {
            faction: Faction::Harkonnen,
            kind: RequestKind::CaptureDisposition,
            prompt: format!("You hold {pick} prisoner. Kill for 2 spice, or keep?"),
            context: RequestContext::Traitor { location: cur.location, opponent: loser, leader: pick },
        };
        state.battle = Some(ctx);
        return Ok(SubStep::Wait(state, vec![request]));
    }

    ctx.prompted = false;
    let target = cur
        .capture_target
        .ok_or_else(|| EngineError::CorruptState("capture choice without a target".into()))?;
    let kill = match answers.action_of(Faction::Harkonnen, RequestKind::CaptureDisposition) {
        Some(ActionData::CaptureDisposition { kill }) => *kill,
        // No answer: the prisoner is kept, flagged as a substituted choice.
        _ => {
            events.push(GameEvent::ForcedChoice {
                faction: Faction::Harkonnen,
                kind: ForcedKind::CaptureChoice,
            });
            false
        }
    };
    if kill {
        if let Some(l) = state.faction_mut(loser).leader_mut(target) {
            l.status = LeaderStatus::Dead;
        }
        state.faction_mut(Faction::Harkonnen).spice += 2;
        events.push(GameEvent::LeaderKilled { faction: loser, leader: target });
    } else {
        if let Some(l) = state.faction_mut(loser).leader_mut(target) {
            l.status = LeaderStatus::Captured(Faction::Harkonnen);
        }
        events.push(GameEvent::LeaderCaptured {
            faction: loser,
            leader: target,
            by: Faction::Harkonnen,
        });
    }
    finish_battle(&mut state, &mut ctx, events)?;
    state.battle = Some(ctx);
    Ok(SubStep::Continue(state))
}

/// Close out the current battle: spend the surviving leaders, requeue the
/// territory if hostiles remain there, and hand control back to Choosing.
fn finish_battle(
    state: &mut GameState,
    ctx: &mut BattlePhaseContext,
    _events: &mut [GameEvent],
) -> EngineResult<()> {
    let cur = ctx
        .current
        .take()
        .ok_or_else(|| EngineError::CorruptState("finishing a battle that never started".into()))?;
    for (f, plan) in [(cur.aggressor, cur.aggressor_plan), (cur.defender, cur.defender_plan)] {
        if let Some(id) = plan.and_then(|p| p.leader) {
            if let Some(l) = state.faction_mut(f).leader_mut(id) {
                if l.status == LeaderStatus::Available {
                    l.status = LeaderStatus::UsedThisTurn;
                }
            }
        }
    }
    let survivors = state.combat_factions_in(cur.location, &cur.sectors);
    if has_hostile_pair(state, &survivors) {
        ctx.pending.push(PendingBattle {
            location: cur.location,
            sectors: cur.sectors,
            factions: survivors,
        });
    }
    crate::invariants::check_stronghold_occupancy(state)?;
    ctx.sub_phase = BattleSubPhase::Choosing;
    ctx.prompted = false;
    Ok(())
}
