// Fatal engine errors. Rule-level problems (an illegal plan, a missing
// answer) are coerced or defaulted with a warning event; an Err from the
// engine means the state itself is broken and the game must stop.

use thiserror::Error;

use crate::map::LocationId;
use crate::types::Faction;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// More than two factions' combat forces in a fortified territory.
    #[error("occupancy violation at {location}: {factions:?} all hold combat forces")]
    OccupancyViolation {
        location: LocationId,
        sectors: Vec<u8>,
        factions: Vec<Faction>,
    },

    /// A battle set with fewer than two combat-capable factions.
    #[error("degenerate battle at {location}")]
    DegenerateBattle { location: LocationId },

    /// Internal bookkeeping no longer adds up.
    #[error("corrupt state: {0}")]
    CorruptState(String),
}
