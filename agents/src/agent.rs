// ═══════════════════════════════════════════════════════════════════════
// Agent trait — interface that all decision-making agents implement.
//
// KEY DESIGN PRINCIPLE:
//   Agents receive the DecisionRequest the engine emitted, not the raw
//   GameState. The request carries exactly the information the faction
//   is entitled to act on (its own hand, its forces in the battle, the
//   opponent's identity) and nothing more, so information hiding is
//   enforced at the boundary.
// ═══════════════════════════════════════════════════════════════════════

use dune_engine::requests::{DecisionRequest, DecisionResponse};
use dune_engine::types::Faction;

/// Trait that all agents implement. One request in, one response out;
/// passing is always legal.
pub trait Agent: Send + Sync {
    /// Human-readable name for this agent (e.g. "Random", "Heuristic").
    fn name(&self) -> &str;

    /// The faction this agent is playing.
    fn faction(&self) -> Faction;

    /// Answer one decision request.
    fn decide(&mut self, request: &DecisionRequest) -> DecisionResponse;
}
