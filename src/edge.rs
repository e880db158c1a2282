use crate::mesh::{EdgeId, ElementId, Mesh, NodeId, PointId, SideId};
use std::collections::BTreeSet;
use xcut_geometry::LineSegment3d;

/// A straight edge between two nodes, carrying the points that lie on it.
#[derive(Debug, Clone)]
pub struct Edge {
    id: EdgeId,
    nodes: [NodeId; 2],
    /// Points on the edge ordered from the first to the second node, end points included.
    pub(crate) points: Vec<PointId>,
    pub(crate) sides: BTreeSet<SideId>,
}

impl Edge {
    pub(crate) fn new(id: EdgeId, nodes: [NodeId; 2], end_points: [PointId; 2]) -> Self {
        Self {
            id,
            nodes,
            points: end_points.to_vec(),
            sides: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn nodes(&self) -> [NodeId; 2] {
        self.nodes
    }

    pub fn points(&self) -> &[PointId] {
        &self.points
    }

    pub fn end_points(&self) -> [PointId; 2] {
        let n = self.points.len();
        [self.points[0], self.points[n - 1]]
    }

    pub fn sides(&self) -> &BTreeSet<SideId> {
        &self.sides
    }

    /// Points strictly between the end points.
    pub fn cut_points(&self) -> &[PointId] {
        let n = self.points.len();
        &self.points[1..n - 1]
    }
}

impl Mesh {
    pub fn edge_segment(&self, edge: EdgeId) -> LineSegment3d<f64> {
        let [a, b] = self.edge(edge).end_points();
        LineSegment3d::from_end_points([*self.point(a).coordinates(), *self.point(b).coordinates()])
    }

    /// The point next to the end point `point` along the edge, or `None` if `point` is not an
    /// end point of the edge.
    pub fn edge_next_point(&self, edge: EdgeId, point: PointId) -> Option<PointId> {
        let points = &self.edge(edge).points;
        if points.first() == Some(&point) {
            points.get(1).copied()
        } else if points.last() == Some(&point) {
            points.len().checked_sub(2).map(|i| points[i])
        } else {
            None
        }
    }

    /// The ordered points of the edge that lie inside the element or on its boundary.
    ///
    /// Consecutive points of the result bound the parts of the edge inside the element.
    pub fn edge_cut_points_inside(&self, edge: EdgeId, element: ElementId) -> Vec<PointId> {
        self.edge(edge)
            .points
            .iter()
            .copied()
            .filter(|point| self.point_is_cut_by_element(*point, element))
            .collect()
    }
}
