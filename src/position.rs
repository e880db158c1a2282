use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a point, facet or volume cell relative to the cut surface.
///
/// `Undecided` is the only non-terminal state: once resolved, a position never changes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Position {
    #[default]
    Undecided,
    Inside,
    Outside,
    OnCutSurface,
}

/// Outcome of a position update.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The position went from `Undecided` to a resolved state.
    Resolved,
    /// Nothing changed, either because the value was already set or `Undecided` was requested.
    Unchanged,
}

impl Position {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Position::Undecided)
    }

    /// Inside or outside, i.e. a position that can be propagated to neighbors.
    pub fn is_volumetric(&self) -> bool {
        matches!(self, Position::Inside | Position::Outside)
    }

    /// Applies the state machine `Undecided -> {Inside, Outside, OnCutSurface}`.
    ///
    /// Returns `Err(current)` if a different resolved position is requested.
    pub fn transition(&mut self, requested: Position) -> Result<Transition, Position> {
        match (*self, requested) {
            (_, Position::Undecided) => Ok(Transition::Unchanged),
            (Position::Undecided, requested) => {
                *self = requested;
                Ok(Transition::Resolved)
            }
            (current, requested) if current == requested => Ok(Transition::Unchanged),
            (current, _) => Err(current),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Position::Undecided => "undecided",
            Position::Inside => "inside",
            Position::Outside => "outside",
            Position::OnCutSurface => "oncutsurface",
        };
        write!(f, "{}", name)
    }
}
