//! The arena owning every entity of a cutting pass.
use crate::edge::Edge;
use crate::element::Element;
use crate::error::{CutError, PositionedEntity};
use crate::facet::Facet;
use crate::integration_cell::{BoundaryCell, IntegrationCell};
use crate::line::Line;
use crate::node::Node;
use crate::options::CutOptions;
use crate::point::Point;
use crate::position::{Position, Transition};
use crate::shape::{ElementShape, SideShape};
use crate::side::Side;
use crate::volume_cell::VolumeCell;
use log::debug;
use nalgebra::Point3;
use rstar::primitives::GeomWithData;
use rstar::RTree;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

macro_rules! entity_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
            pub struct $name(pub usize);

            impl $name {
                pub fn index(&self) -> usize {
                    self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

entity_id!(
    PointId,
    NodeId,
    EdgeId,
    SideId,
    LineId,
    FacetId,
    ElementId,
    VolumeCellId,
    IntegrationCellId,
    BoundaryCellId,
);

/// A line key: the two end points of a line in ascending order.
pub type PointPair = [PointId; 2];

pub fn point_pair(a: PointId, b: PointId) -> PointPair {
    if a <= b {
        [a, b]
    } else {
        [b, a]
    }
}

/// Owns points, nodes, edges, sides, lines, facets, elements and cells.
///
/// Entities refer to each other only through typed indices into the arenas of the mesh.
#[derive(Default)]
pub struct Mesh {
    options: CutOptions,
    pub(crate) points: Vec<Point>,
    point_index: RTree<GeomWithData<[f64; 3], PointId>>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) edges: Vec<Edge>,
    edge_index: FxHashMap<[NodeId; 2], EdgeId>,
    pub(crate) sides: Vec<Side>,
    side_index: FxHashMap<Vec<NodeId>, SideId>,
    pub(crate) lines: Vec<Line>,
    line_index: FxHashMap<PointPair, LineId>,
    pub(crate) facets: Vec<Facet>,
    pub(crate) elements: Vec<Element>,
    pub(crate) volume_cells: Vec<VolumeCell>,
    pub(crate) integration_cells: Vec<IntegrationCell>,
    pub(crate) boundary_cells: Vec<BoundaryCell>,
    pub(crate) level_set_side: Option<SideId>,
    pub(crate) level_set_values: FxHashMap<NodeId, f64>,
}

impl Mesh {
    pub fn new(options: CutOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn options(&self) -> &CutOptions {
        &self.options
    }

    pub fn point(&self, id: PointId) -> &Point {
        &self.points[id.0]
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0]
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn side(&self, id: SideId) -> &Side {
        &self.sides[id.0]
    }

    pub fn sides(&self) -> &[Side] {
        &self.sides
    }

    pub fn line(&self, id: LineId) -> &Line {
        &self.lines[id.0]
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn facet(&self, id: FacetId) -> &Facet {
        &self.facets[id.0]
    }

    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }

    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.0]
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn volume_cell(&self, id: VolumeCellId) -> &VolumeCell {
        &self.volume_cells[id.0]
    }

    pub fn volume_cells(&self) -> &[VolumeCell] {
        &self.volume_cells
    }

    pub fn integration_cell(&self, id: IntegrationCellId) -> &IntegrationCell {
        &self.integration_cells[id.0]
    }

    pub fn integration_cells(&self) -> &[IntegrationCell] {
        &self.integration_cells
    }

    pub fn boundary_cell(&self, id: BoundaryCellId) -> &BoundaryCell {
        &self.boundary_cells[id.0]
    }

    pub fn boundary_cells(&self) -> &[BoundaryCell] {
        &self.boundary_cells
    }

    pub fn element_ids(&self) -> impl '_ + Iterator<Item = ElementId> {
        (0..self.elements.len()).map(ElementId)
    }

    pub fn node_ids(&self) -> impl '_ + Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Returns the point at `x`, merging it with an existing point within the point tolerance.
    pub fn new_point(&mut self, x: &Point3<f64>) -> PointId {
        let query = [x.x, x.y, x.z];
        let radius = self.options.point_tolerance;
        let existing = self
            .point_index
            .locate_within_distance(query, radius * radius)
            .min_by(|a, b| {
                let da = (self.points[a.data.0].coordinates() - x).norm_squared();
                let db = (self.points[b.data.0].coordinates() - x).norm_squared();
                da.total_cmp(&db)
            })
            .map(|geom| geom.data);
        if let Some(id) = existing {
            return id;
        }

        let id = PointId(self.points.len());
        self.points.push(Point::new(id, *x));
        self.point_index.insert(GeomWithData::new(query, id));
        id
    }

    pub fn new_node(&mut self, external_id: i64, x: &Point3<f64>) -> NodeId {
        let point = self.new_point(x);
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(id, external_id, point));
        id
    }

    /// Returns the edge between the two nodes, creating it if necessary.
    pub fn new_edge(&mut self, a: NodeId, b: NodeId) -> EdgeId {
        let key = if a <= b { [a, b] } else { [b, a] };
        if let Some(&id) = self.edge_index.get(&key) {
            return id;
        }

        let id = EdgeId(self.edges.len());
        let points = [self.nodes[a.0].point(), self.nodes[b.0].point()];
        self.edges.push(Edge::new(id, [a, b], points));
        self.edge_index.insert(key, id);
        for node in [a, b] {
            self.nodes[node.0].edges.insert(id);
        }
        for point in points {
            self.points[point.0].edges.insert(id);
        }
        id
    }

    /// Returns the side spanned by the given nodes, creating it if necessary.
    ///
    /// Element sides with the same node set are shared between neighboring elements.
    pub fn new_side(
        &mut self,
        nodes: Vec<NodeId>,
        shape: SideShape,
        cutter: bool,
        external_id: Option<i64>,
    ) -> Result<SideId, CutError> {
        if nodes.len() != shape.num_nodes() {
            return Err(CutError::InvalidInput(format!(
                "side of shape {:?} needs {} nodes, got {}",
                shape,
                shape.num_nodes(),
                nodes.len()
            )));
        }
        let mut key = nodes.clone();
        key.sort_unstable();
        if !cutter {
            if let Some(&id) = self.side_index.get(&key) {
                return Ok(id);
            }
        }

        let id = SideId(self.sides.len());
        let edges: Vec<_> = nodes
            .iter()
            .zip(nodes.iter().cycle().skip(1))
            .map(|(a, b)| self.new_edge(*a, *b))
            .collect();
        for edge in &edges {
            self.edges[edge.0].sides.insert(id);
        }
        let points: Vec<_> = nodes.iter().map(|n| self.nodes[n.0].point()).collect();
        self.sides
            .push(Side::new(id, shape, nodes, edges.clone(), cutter, external_id));
        for point in points {
            self.point_add_side(point, id);
            if cutter {
                self.set_point_position(point, Position::OnCutSurface)?;
            }
        }
        // Points already lying on the edges now lie on the new side as well
        for edge in edges {
            for point in self.edges[edge.0].points().to_vec() {
                self.point_add_side(point, id);
            }
        }
        if !cutter {
            self.side_index.insert(key, id);
        }
        Ok(id)
    }

    pub fn new_element(
        &mut self,
        external_id: i64,
        shape: ElementShape,
        nodes: Vec<NodeId>,
    ) -> Result<ElementId, CutError> {
        if nodes.len() != shape.num_nodes() {
            return Err(CutError::InvalidInput(format!(
                "element {} of shape {:?} needs {} nodes, got {}",
                external_id,
                shape,
                shape.num_nodes(),
                nodes.len()
            )));
        }
        let id = ElementId(self.elements.len());
        let mut sides = Vec::with_capacity(shape.faces().len());
        for face in shape.faces() {
            let side_nodes: Vec<_> = face.iter().map(|i| nodes[*i]).collect();
            let side_shape = SideShape::from_num_nodes(side_nodes.len())
                .ok_or_else(|| CutError::InvalidInput(format!("face with {} nodes", side_nodes.len())))?;
            let side = self.new_side(side_nodes, side_shape, false, None)?;
            self.sides[side.0].elements.insert(id);
            sides.push(side);
        }
        for node in &nodes {
            self.nodes[node.0].elements.insert(id);
        }
        self.elements
            .push(Element::new(id, external_id, shape, nodes, sides));
        Ok(id)
    }

    /// Returns the line between the two points, creating it if necessary.
    ///
    /// A line lies on every side containing both of its points. Returns `None` for
    /// coincident points.
    pub fn new_line(&mut self, a: PointId, b: PointId, element: Option<ElementId>) -> Option<LineId> {
        if a == b {
            return None;
        }
        let key = point_pair(a, b);
        let id = match self.line_index.get(&key) {
            Some(&id) => id,
            None => {
                let id = LineId(self.lines.len());
                self.lines.push(Line::new(id, key));
                self.line_index.insert(key, id);
                for point in key {
                    self.points[point.0].lines.insert(id);
                }
                debug!("New line {} between points {} and {}", id, a, b);
                id
            }
        };
        let common_sides: Vec<_> = self.points[a.0]
            .sides
            .intersection(&self.points[b.0].sides)
            .copied()
            .collect();
        for side in common_sides {
            self.lines[id.0].sides.insert(side);
            self.sides[side.0].lines.insert(id);
        }
        if let Some(element) = element {
            self.lines[id.0].elements.insert(element);
        }
        Some(id)
    }

    pub fn new_facet(&mut self, points: Vec<PointId>, parent: SideId) -> FacetId {
        let id = FacetId(self.facets.len());
        let (cut_side, position) = if self.sides[parent.0].is_cutter() {
            (Some(parent), Position::OnCutSurface)
        } else {
            (None, Position::Undecided)
        };
        for point in &points {
            self.points[point.0].facets.insert(id);
        }
        self.facets
            .push(Facet::new(id, points, parent, cut_side, position));
        id
    }

    pub fn new_volume_cell(
        &mut self,
        element: ElementId,
        facets: BTreeSet<FacetId>,
        lines: BTreeMap<PointPair, BTreeSet<FacetId>>,
    ) -> VolumeCellId {
        let id = VolumeCellId(self.volume_cells.len());
        for facet in &facets {
            self.facets[facet.0].cells.insert(id);
        }
        self.volume_cells
            .push(VolumeCell::new(id, element, facets, lines));
        self.elements[element.0].cells.insert(id);
        id
    }

    pub(crate) fn point_add_side(&mut self, point: PointId, side: SideId) {
        self.points[point.0].sides.insert(side);
        self.sides[side.0].points.insert(point);
    }

    /// Registers the point on the edge and on every side containing the edge.
    pub fn point_add_edge(&mut self, point: PointId, edge: EdgeId) {
        self.points[point.0].edges.insert(edge);
        for side in self.edges[edge.0].sides().clone() {
            self.point_add_side(point, side);
        }
    }

    pub fn point_add_element(&mut self, point: PointId, element: ElementId) {
        self.points[point.0].elements.insert(element);
    }

    /// Inserts a cut point into the ordered point sequence of the edge.
    pub fn edge_add_cut_point(&mut self, edge: EdgeId, point: PointId) {
        let [a, b] = self.edges[edge.0].end_points();
        let (xa, xb) = (*self.points[a.0].coordinates(), *self.points[b.0].coordinates());
        let parameter = |x: &Point3<f64>| (x - xa).dot(&(xb - xa));
        if !self.edges[edge.0].points.contains(&point) {
            let t = parameter(self.points[point.0].coordinates());
            let points = &self.edges[edge.0].points;
            let index = points.partition_point(|p| parameter(self.points[p.0].coordinates()) < t);
            self.edges[edge.0].points.insert(index, point);
        }
        self.point_add_edge(point, edge);
    }

    pub fn set_point_position(&mut self, point: PointId, position: Position) -> Result<Transition, CutError> {
        self.points[point.0]
            .position
            .transition(position)
            .map_err(|current| CutError::ConflictingPosition {
                entity: PositionedEntity::Point(point),
                current,
                requested: position,
            })
    }

    /// Sets the position of a facet.
    ///
    /// Inside and outside positions are pushed to the undecided points of the facet. A point of
    /// the facet already on the other side of the cut surface is a conflict, and nothing is
    /// changed.
    pub fn set_facet_position(&mut self, facet: FacetId, position: Position) -> Result<Transition, CutError> {
        if position.is_volumetric() {
            let conflict = self.facets[facet.0]
                .points()
                .iter()
                .map(|point| (*point, self.points[point.0].position()))
                .find(|(_, current)| current.is_volumetric() && *current != position);
            if let Some((point, current)) = conflict {
                return Err(CutError::ConflictingPosition {
                    entity: PositionedEntity::Point(point),
                    current,
                    requested: position,
                });
            }
        }
        let transition = self.facets[facet.0]
            .position
            .transition(position)
            .map_err(|current| CutError::ConflictingPosition {
                entity: PositionedEntity::Facet(facet),
                current,
                requested: position,
            })?;
        if transition == Transition::Resolved && position.is_volumetric() {
            for point in self.facets[facet.0].points().to_vec() {
                if self.points[point.0].position() == Position::Undecided {
                    self.set_point_position(point, position)?;
                }
            }
        }
        Ok(transition)
    }

    pub fn set_volume_cell_position(
        &mut self,
        cell: VolumeCellId,
        position: Position,
    ) -> Result<Transition, CutError> {
        self.volume_cells[cell.0]
            .position
            .transition(position)
            .map_err(|current| CutError::ConflictingPosition {
                entity: PositionedEntity::VolumeCell(cell),
                current,
                requested: position,
            })
    }
}
