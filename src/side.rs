//! Sides of elements and of the cut surface, and their mutual intersection.
use crate::error::CutError;
use crate::mesh::{EdgeId, ElementId, FacetId, LineId, Mesh, NodeId, PointId, SideId};
use crate::newton::map_physical_coordinates;
use crate::position::Position;
use crate::shape::{SideGeometry, SideShape};
use itertools::Itertools;
use log::debug;
use nalgebra::{Point2, Point3, Vector3};
use std::collections::{BTreeMap, BTreeSet};
use xcut_geometry::planar::extract_faces;
use xcut_geometry::{PlanarFrame, PlanarPolygon3d, SegmentPolygonIntersection};

/// A planar face, either of a background element or of the cut surface.
///
/// The zero level set of a nodal field is represented by a single cutter side without shape,
/// nodes or edges.
#[derive(Debug, Clone)]
pub struct Side {
    id: SideId,
    shape: Option<SideShape>,
    nodes: Vec<NodeId>,
    edges: Vec<EdgeId>,
    cutter: bool,
    external_id: Option<i64>,
    /// Background elements this side bounds.
    pub(crate) elements: BTreeSet<ElementId>,
    /// Points lying on the side, corners included.
    pub(crate) points: BTreeSet<PointId>,
    pub(crate) lines: BTreeSet<LineId>,
    pub(crate) facets: Vec<FacetId>,
    pub(crate) facets_built: bool,
    /// Lines of this cutter side inside each element it cuts.
    pub(crate) element_lines: BTreeMap<ElementId, Vec<LineId>>,
}

impl Side {
    pub(crate) fn new(
        id: SideId,
        shape: SideShape,
        nodes: Vec<NodeId>,
        edges: Vec<EdgeId>,
        cutter: bool,
        external_id: Option<i64>,
    ) -> Self {
        Self {
            id,
            shape: Some(shape),
            nodes,
            edges,
            cutter,
            external_id,
            elements: BTreeSet::new(),
            points: BTreeSet::new(),
            lines: BTreeSet::new(),
            facets: Vec::new(),
            facets_built: false,
            element_lines: BTreeMap::new(),
        }
    }

    pub(crate) fn level_set(id: SideId) -> Self {
        Self {
            id,
            shape: None,
            nodes: Vec::new(),
            edges: Vec::new(),
            cutter: true,
            external_id: None,
            elements: BTreeSet::new(),
            points: BTreeSet::new(),
            lines: BTreeSet::new(),
            facets: Vec::new(),
            facets_built: false,
            element_lines: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> SideId {
        self.id
    }

    /// The shape of the side, `None` for the level-set side.
    pub fn shape(&self) -> Option<SideShape> {
        self.shape
    }

    pub fn is_level_set(&self) -> bool {
        self.shape.is_none()
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    /// Whether the side belongs to the cut surface.
    pub fn is_cutter(&self) -> bool {
        self.cutter
    }

    pub fn external_id(&self) -> Option<i64> {
        self.external_id
    }

    pub fn elements(&self) -> &BTreeSet<ElementId> {
        &self.elements
    }

    pub fn points(&self) -> &BTreeSet<PointId> {
        &self.points
    }

    pub fn lines(&self) -> &BTreeSet<LineId> {
        &self.lines
    }

    pub fn facets(&self) -> &[FacetId] {
        &self.facets
    }

    pub fn element_lines(&self, element: ElementId) -> &[LineId] {
        self.element_lines
            .get(&element)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl Mesh {
    pub fn side_vertices(&self, side: SideId) -> Vec<Point3<f64>> {
        self.side(side)
            .nodes()
            .iter()
            .map(|node| *self.point(self.node(*node).point()).coordinates())
            .collect()
    }

    pub fn side_polygon(&self, side: SideId) -> PlanarPolygon3d<f64> {
        PlanarPolygon3d::from_vertices(self.side_vertices(side))
    }

    fn side_frame(&self, side: SideId) -> Result<PlanarFrame<f64>, CutError> {
        self.side_polygon(side)
            .frame()
            .ok_or_else(|| CutError::InvalidInput(format!("side {} is degenerate", side)))
    }

    /// A side is cut if any point other than its corners lies on it.
    pub fn side_is_cut(&self, side: SideId) -> bool {
        let s = self.side(side);
        s.points
            .iter()
            .any(|point| !self.point_is_nodal(*point, s.nodes()))
    }

    /// Intersects the edges of `side` with `other`.
    ///
    /// Every intersection becomes a point on the edge, on all sides of the edge and on
    /// `other`. Returns whether any intersection was found.
    pub fn side_find_cut_points(&mut self, element: ElementId, side: SideId, other: SideId) -> Result<bool, CutError> {
        let tolerance = self.options().point_tolerance;
        let polygon = self.side_polygon(other);
        let mut cut = false;
        for edge in self.side(side).edges().to_vec() {
            let segment = self.edge_segment(edge);
            let hits = match polygon.intersect_segment(&segment, tolerance) {
                SegmentPolygonIntersection::Disjoint => Vec::new(),
                SegmentPolygonIntersection::Point { point, .. } => vec![point],
                SegmentPolygonIntersection::Coplanar => polygon.intersect_coplanar_segment(&segment, tolerance),
            };
            for x in hits {
                let point = self.new_point(&x);
                self.edge_add_cut_point(edge, point);
                self.point_add_side(point, other);
                self.set_point_position(point, Position::OnCutSurface)?;
                cut = true;
            }
        }
        if cut {
            debug!(
                "Side {} cuts side {} in element {}",
                side,
                other,
                self.element(element).external_id()
            );
        }
        Ok(cut)
    }

    /// Creates the lines along which `side` and `other` intersect.
    ///
    /// The points lying on both sides are ordered along the intersection direction of the
    /// two planes, and consecutive points whose midpoint lies on both sides become lines.
    /// Coplanar sides produce no lines.
    pub fn side_find_cut_lines(&mut self, element: ElementId, side: SideId, other: SideId) -> Result<bool, CutError> {
        let tolerance = self.options().point_tolerance;
        let common: Vec<PointId> = self
            .side(side)
            .points
            .intersection(&self.side(other).points)
            .copied()
            .collect();
        if common.len() < 2 {
            return Ok(false);
        }

        let (polygon, other_polygon) = (self.side_polygon(side), self.side_polygon(other));
        let (Some(plane), Some(other_plane)) = (polygon.plane(), other_polygon.plane()) else {
            return Err(CutError::InvalidInput(format!(
                "cannot intersect degenerate sides {} and {}",
                side, other
            )));
        };
        let Some(direction) = plane.intersection_direction(&other_plane, tolerance) else {
            return Ok(false);
        };

        let sorted = common
            .into_iter()
            .map(|point| (direction.dot(&self.point(point).coordinates().coords), point))
            .sorted_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(_, point)| point)
            .collect_vec();

        let mut cut = false;
        for (a, b) in sorted.into_iter().tuple_windows() {
            let midpoint = Point3::from((self.point(a).coordinates().coords + self.point(b).coordinates().coords) / 2.0);
            if polygon.contains_point(&midpoint, tolerance) && other_polygon.contains_point(&midpoint, tolerance) {
                self.new_line(a, b, Some(element));
                cut = true;
            }
        }
        Ok(cut)
    }

    /// Local coordinates `(r, s, t)` of `x` with respect to the side.
    ///
    /// `(r, s)` are the reference coordinates of the projection of `x` onto the side, and `t` is
    /// the signed distance along the unit normal of the side (positive on the outside).
    pub fn side_local_coordinates(&self, side: SideId, x: &Point3<f64>) -> Result<Vector3<f64>, CutError> {
        let shape = self
            .side(side)
            .shape()
            .ok_or_else(|| CutError::InvalidInput(format!("side {} has no local coordinates", side)))?;
        let vertices = self.side_vertices(side);
        let normal = self
            .side_polygon(side)
            .normal()
            .ok_or_else(|| CutError::InvalidInput(format!("side {} is degenerate", side)))?;
        let geometry = SideGeometry::new(shape, &vertices, normal.into_inner());
        map_physical_coordinates(&geometry, x, self.options().newton_settings()).map_err(|err| {
            CutError::InvalidInput(format!("local coordinates on side {} failed: {}", side, err))
        })
    }

    /// Whether all the points lie on the side, either registered on it or as corners of its
    /// facets.
    pub fn side_on_side(&self, side: SideId, points: &BTreeSet<PointId>) -> bool {
        let s = self.side(side);
        points.iter().all(|point| {
            s.points.contains(point)
                || s.facets
                    .iter()
                    .any(|facet| self.facet(*facet).contains(*point))
        })
    }

    /// Records the lines of the cutter side that lie inside the element.
    pub fn side_create_line_segment(&mut self, side: SideId, element: ElementId) {
        let lines: Vec<_> = self
            .side(side)
            .lines
            .iter()
            .copied()
            .filter(|line| self.line(*line).is_in_element(element))
            .collect();
        self.sides[side.0].element_lines.insert(element, lines);
    }

    /// Points shared between `side` and the cutter side `other` that lie on an edge of
    /// either side.
    pub fn side_get_cut_points(&self, side: SideId, other: SideId) -> BTreeSet<PointId> {
        let on_edges = |s: SideId, point: &PointId| {
            self.side(s)
                .edges()
                .iter()
                .any(|edge| self.edge(*edge).points().contains(point))
        };
        self.side(side)
            .points
            .intersection(&self.side(other).points)
            .copied()
            .filter(|point| on_edges(side, point) || on_edges(other, point))
            .collect()
    }

    /// The boundary of the side as a closed loop of points, following the node order.
    pub fn side_boundary_loop(&self, side: SideId) -> Vec<PointId> {
        let s = self.side(side);
        let mut boundary = Vec::new();
        for (edge, node) in s.edges().iter().zip(s.nodes()) {
            let e = self.edge(*edge);
            let points = e.points();
            if e.nodes()[0] == *node {
                boundary.extend_from_slice(&points[..points.len() - 1]);
            } else {
                boundary.extend(points[1..].iter().rev());
            }
        }
        boundary
    }

    /// Whether both points of the line lie on the same edge of the side.
    fn side_line_on_boundary(&self, side: SideId, line: LineId) -> bool {
        let [a, b] = self.line(line).points();
        self.side(side).edges().iter().any(|edge| {
            let points = self.edge(*edge).points();
            points.contains(&a) && points.contains(&b)
        })
    }

    /// Lines across the side that it shares with cutter sides.
    fn side_cut_lines(&self, side: SideId) -> Vec<LineId> {
        self.side(side)
            .lines
            .iter()
            .copied()
            .filter(|line| {
                self.line(*line)
                    .sides()
                    .iter()
                    .any(|s| self.side(*s).is_cutter())
            })
            .filter(|line| !self.side_line_on_boundary(side, *line))
            .collect()
    }

    /// Builds the facets of an element side.
    ///
    /// A side without cut lines becomes a single facet. Otherwise its boundary and the cut lines
    /// of every cutter side are split into faces. Facets are built once and shared by the
    /// elements on both sides.
    pub fn side_make_facets(&mut self, side: SideId) -> Result<Vec<FacetId>, CutError> {
        if self.side(side).facets_built {
            return Ok(self.side(side).facets.clone());
        }

        let boundary = self.side_boundary_loop(side);
        let cut_lines = self.side_cut_lines(side);
        let facets = if cut_lines.is_empty() {
            vec![self.new_facet(boundary, side)]
        } else {
            let boundary_segments = boundary
                .iter()
                .copied()
                .circular_tuple_windows()
                .map(|(a, b)| [a, b]);
            let segments = boundary_segments
                .chain(cut_lines.iter().map(|line| self.line(*line).points()))
                .collect_vec();
            let faces = self.split_into_faces(side, &segments)?;
            if faces.is_empty() {
                vec![self.new_facet(boundary, side)]
            } else {
                faces
                    .into_iter()
                    .map(|face| self.new_facet(face, side))
                    .collect()
            }
        };
        debug!("Side {} split into {} facet(s)", side, facets.len());

        let s = &mut self.sides[side.0];
        s.facets = facets.clone();
        s.facets_built = true;
        Ok(facets)
    }

    /// Builds the facets of the part of a cutter side that lies inside the element.
    ///
    /// A face covering a facet of an element side does not become a new facet. The facet of the
    /// element side is marked as lying on the cutter side instead.
    pub fn side_make_internal_facets(&mut self, side: SideId, element: ElementId) -> Result<Vec<FacetId>, CutError> {
        let segments = self
            .side(side)
            .element_lines(element)
            .iter()
            .map(|line| self.line(*line).points())
            .collect_vec();
        if segments.is_empty() {
            return Ok(Vec::new());
        }
        let faces = self.split_into_faces(side, &segments)?;
        let mut facets = Vec::with_capacity(faces.len());
        for face in faces {
            let points: BTreeSet<PointId> = face.iter().copied().collect();
            match self.element_facet_on_side(element, &points) {
                Some(facet) => {
                    self.facet_set_cut_side(facet, side)?;
                    facets.push(facet);
                }
                None => facets.push(self.new_facet(face, side)),
            }
        }
        Ok(facets)
    }

    /// Splits the planar graph formed by `segments` in the plane of `side` into faces,
    /// oriented counter-clockwise with respect to the side normal.
    fn split_into_faces(&self, side: SideId, segments: &[[PointId; 2]]) -> Result<Vec<Vec<PointId>>, CutError> {
        let frame = self.side_frame(side)?;
        let points: Vec<PointId> = segments
            .iter()
            .flatten()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let local_index: BTreeMap<PointId, usize> = points.iter().enumerate().map(|(i, p)| (*p, i)).collect();
        let vertices: Vec<Point2<f64>> = points
            .iter()
            .map(|point| frame.to_local(self.point(*point).coordinates()))
            .collect();
        let local_segments = segments
            .iter()
            .map(|[a, b]| [local_index[a], local_index[b]])
            .collect_vec();
        let tolerance = self.options().point_tolerance;
        let faces = extract_faces(&vertices, &local_segments, tolerance * tolerance);
        Ok(faces
            .into_iter()
            .map(|face| face.into_iter().map(|i| points[i]).collect())
            .collect())
    }
}
