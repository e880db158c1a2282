use crate::mesh::{EdgeId, ElementId, FacetId, LineId, Mesh, NodeId, PointId, SideId};
use crate::position::Position;
use nalgebra::Point3;
use std::collections::BTreeSet;

/// A location shared by nodes, edges, sides, lines and facets.
#[derive(Debug, Clone)]
pub struct Point {
    id: PointId,
    coordinates: Point3<f64>,
    pub(crate) position: Position,
    pub(crate) facets: BTreeSet<FacetId>,
    /// Edges the point lies on, including edges it is an end point of.
    pub(crate) edges: BTreeSet<EdgeId>,
    /// Sides the point lies on.
    pub(crate) sides: BTreeSet<SideId>,
    /// Elements the point was found inside of.
    pub(crate) elements: BTreeSet<ElementId>,
    pub(crate) lines: BTreeSet<LineId>,
}

impl Point {
    pub(crate) fn new(id: PointId, coordinates: Point3<f64>) -> Self {
        Self {
            id,
            coordinates,
            position: Position::Undecided,
            facets: BTreeSet::new(),
            edges: BTreeSet::new(),
            sides: BTreeSet::new(),
            elements: BTreeSet::new(),
            lines: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> PointId {
        self.id
    }

    pub fn coordinates(&self) -> &Point3<f64> {
        &self.coordinates
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn facets(&self) -> &BTreeSet<FacetId> {
        &self.facets
    }

    pub fn edges(&self) -> &BTreeSet<EdgeId> {
        &self.edges
    }

    pub fn sides(&self) -> &BTreeSet<SideId> {
        &self.sides
    }

    pub fn elements(&self) -> &BTreeSet<ElementId> {
        &self.elements
    }

    pub fn lines(&self) -> &BTreeSet<LineId> {
        &self.lines
    }

    /// Whether the point lies on the given side.
    pub fn is_cut(&self, side: SideId) -> bool {
        self.sides.contains(&side)
    }
}

impl Mesh {
    /// Whether the point was found inside the element or lies on one of its sides.
    pub fn point_is_cut_by_element(&self, point: PointId, element: ElementId) -> bool {
        let p = self.point(point);
        p.elements.contains(&element)
            || self
                .element(element)
                .sides()
                .iter()
                .any(|side| p.sides.contains(side))
    }

    /// An edge of the point whose cut point closest to the point lies on `side`, together with
    /// that cut point.
    pub fn point_common_cut_edge(&self, point: PointId, side: SideId) -> Option<(EdgeId, PointId)> {
        self.point(point).edges.iter().find_map(|edge| {
            let next = self.edge_next_point(*edge, point)?;
            self.point(next).is_cut(side).then_some((*edge, next))
        })
    }

    /// Whether the point is the point of one of the given nodes.
    pub fn point_is_nodal(&self, point: PointId, nodes: &[NodeId]) -> bool {
        nodes.iter().any(|node| self.node(*node).point() == point)
    }
}
