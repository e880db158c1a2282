use crate::mesh::{ElementId, LineId, PointPair, SideId};
use std::collections::BTreeSet;

/// A straight segment between two cut points.
#[derive(Debug, Clone)]
pub struct Line {
    id: LineId,
    points: PointPair,
    pub(crate) sides: BTreeSet<SideId>,
    pub(crate) elements: BTreeSet<ElementId>,
}

impl Line {
    pub(crate) fn new(id: LineId, points: PointPair) -> Self {
        Self {
            id,
            points,
            sides: BTreeSet::new(),
            elements: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> LineId {
        self.id
    }

    pub fn points(&self) -> PointPair {
        self.points
    }

    /// Sides the line lies on.
    pub fn sides(&self) -> &BTreeSet<SideId> {
        &self.sides
    }

    /// Elements the line was created in.
    pub fn elements(&self) -> &BTreeSet<ElementId> {
        &self.elements
    }

    pub fn is_in_element(&self, element: ElementId) -> bool {
        self.elements.contains(&element)
    }
}
