//! Background elements and the per-element cutting pipeline.
use crate::error::CutError;
use crate::mesh::{
    BoundaryCellId, ElementId, FacetId, IntegrationCellId, Mesh, NodeId, PointId, PointPair, SideId, VolumeCellId,
};
use crate::newton::map_physical_coordinates;
use crate::position::Position;
use crate::shape::{ElementGeometry, ElementShape};
use itertools::Itertools;
use log::{debug, warn};
use nalgebra::{Point3, Vector3};
use std::collections::{BTreeMap, BTreeSet};
use xcut_geometry::{point_in_closed_surface, AxisAlignedBoundingBox3d};

/// A linear background cell.
#[derive(Debug, Clone)]
pub struct Element {
    id: ElementId,
    external_id: i64,
    shape: ElementShape,
    nodes: Vec<NodeId>,
    sides: Vec<SideId>,
    /// Cutter sides that cut the element.
    pub(crate) cut_faces: BTreeSet<SideId>,
    pub(crate) facets: BTreeSet<FacetId>,
    pub(crate) facets_built: bool,
    pub(crate) cells: BTreeSet<VolumeCellId>,
}

impl Element {
    pub(crate) fn new(
        id: ElementId,
        external_id: i64,
        shape: ElementShape,
        nodes: Vec<NodeId>,
        sides: Vec<SideId>,
    ) -> Self {
        Self {
            id,
            external_id,
            shape,
            nodes,
            sides,
            cut_faces: BTreeSet::new(),
            facets: BTreeSet::new(),
            facets_built: false,
            cells: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn external_id(&self) -> i64 {
        self.external_id
    }

    pub fn shape(&self) -> ElementShape {
        self.shape
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn sides(&self) -> &[SideId] {
        &self.sides
    }

    pub fn cut_faces(&self) -> &BTreeSet<SideId> {
        &self.cut_faces
    }

    pub fn facets(&self) -> &BTreeSet<FacetId> {
        &self.facets
    }

    pub fn volume_cells(&self) -> &BTreeSet<VolumeCellId> {
        &self.cells
    }

    /// Whether the side is one of the element's own sides.
    pub fn owns_side(&self, side: SideId) -> bool {
        self.sides.contains(&side)
    }
}

impl Mesh {
    pub fn element_vertices(&self, element: ElementId) -> Vec<Point3<f64>> {
        self.element(element)
            .nodes()
            .iter()
            .map(|node| *self.point(self.node(*node).point()).coordinates())
            .collect()
    }

    pub fn element_bounding_box(&self, element: ElementId) -> Option<AxisAlignedBoundingBox3d<f64>> {
        AxisAlignedBoundingBox3d::from_points(&self.element_vertices(element))
    }

    /// Reference coordinates of the physical point `x` in the element.
    pub fn element_local_coordinates(&self, element: ElementId, x: &Point3<f64>) -> Result<Vector3<f64>, CutError> {
        let vertices = self.element_vertices(element);
        let geometry = ElementGeometry::new(self.element(element).shape(), &vertices);
        map_physical_coordinates(&geometry, x, self.options().newton_settings())
            .map_err(|source| CutError::InverseMapping { element, source })
    }

    /// Tests whether the point lies inside the element or on its boundary.
    ///
    /// Points outside the (slightly grown) bounding box are rejected without inverse mapping.
    /// A failing inverse map counts as outside.
    pub fn element_point_inside(&self, element: ElementId, point: PointId) -> bool {
        let x = self.point(point).coordinates();
        let tolerance = self.options().point_tolerance;
        let in_box = self
            .element_bounding_box(element)
            .map(|aabb| aabb.grow_uniformly(tolerance).contains_point(x))
            .unwrap_or(false);
        if !in_box {
            return false;
        }

        match self.element_local_coordinates(element, x) {
            Ok(xi) => self
                .element(element)
                .shape()
                .contains_reference_point(&xi, self.options().reference_tolerance),
            Err(err) => {
                debug!("Point {} treated as outside: {}", point, err);
                false
            }
        }
    }

    /// Cuts the element with the cutter side.
    ///
    /// Registers cut points, cut lines and the line segment of the cutter side inside the
    /// element. Returns whether the element is cut.
    pub fn cut_element(&mut self, element: ElementId, side: SideId) -> Result<bool, CutError> {
        if self.element(element).facets_built {
            return Err(CutError::PhaseViolation { element });
        }
        let mut cut = false;

        // Cutter nodes inside the element
        for node in self.side(side).nodes().to_vec() {
            let point = self.node(node).point();
            if self.point_is_cut_by_element(point, element) {
                cut = true;
            } else if self.element_point_inside(element, point) {
                self.point_add_element(point, element);
                cut = true;
            }
        }

        let own_sides = self.element(element).sides().to_vec();
        for &s in &own_sides {
            let forward = self.side_find_cut_points(element, s, side)?;
            let reverse = self.side_find_cut_points(element, side, s)?;
            cut |= forward || reverse;
        }
        for &s in &own_sides {
            let forward = self.side_find_cut_lines(element, s, side)?;
            let reverse = self.side_find_cut_lines(element, side, s)?;
            cut |= forward || reverse;
        }

        // Parts of cutter edges inside the element
        for edge in self.side(side).edges().to_vec() {
            let inside = self.edge_cut_points_inside(edge, element);
            for (a, b) in inside.into_iter().tuple_windows() {
                cut |= self.new_line(a, b, Some(element)).is_some();
            }
        }

        if cut {
            self.side_create_line_segment(side, element);
            self.elements[element.0].cut_faces.insert(side);
        }
        debug!(
            "Cutter side {} {} element {}",
            side,
            if cut { "cuts" } else { "misses" },
            self.element(element).external_id()
        );
        Ok(cut)
    }

    /// Builds the facets of the element: the (possibly split) facets of its own sides and the
    /// internal facets of every cutter side that cuts it. Does nothing if already built.
    pub fn element_make_facets(&mut self, element: ElementId) -> Result<(), CutError> {
        if self.element(element).facets_built {
            return Ok(());
        }
        let mut facets = BTreeSet::new();
        for side in self.element(element).sides().to_vec() {
            facets.extend(self.side_make_facets(side)?);
        }
        for cut_side in self.element(element).cut_faces().clone() {
            self.side_create_line_segment(cut_side, element);
            let internal = if self.side(cut_side).is_level_set() {
                self.level_set_make_internal_facets(cut_side, element)?
            } else {
                self.side_make_internal_facets(cut_side, element)?
            };
            facets.extend(internal);
        }

        let e = &mut self.elements[element.0];
        e.facets = facets;
        e.facets_built = true;
        Ok(())
    }

    /// Classifies the undecided corner points of the element from the cutter sides that cut
    /// their facets.
    ///
    /// A corner point takes its position from the cut point closest to it along one of its
    /// edges. A corner point already classified inside or outside is pushed to its facets
    /// instead. The level-set side classifies corner points when it cuts the element.
    pub fn element_find_node_positions(&mut self, element: ElementId) -> Result<(), CutError> {
        let cut_faces = self.element(element).cut_faces().clone();

        for node in self.element(element).nodes().to_vec() {
            let point = self.node(node).point();
            let position = self.point(point).position();
            if position == Position::Undecided {
                'facets: for facet in self.point(point).facets().clone() {
                    for &cut_side in &cut_faces {
                        if self.side(cut_side).is_level_set() || !self.facet_is_cut_side(facet, cut_side) {
                            continue;
                        }
                        if self.point(point).is_cut(cut_side) {
                            self.set_point_position(point, Position::OnCutSurface)?;
                            break 'facets;
                        }
                        let Some((_, cut_point)) = self.point_common_cut_edge(point, cut_side) else {
                            continue;
                        };
                        if let Some(position) = self.position_behind_cut_point(point, cut_point, &cut_faces)? {
                            self.set_point_position(point, position)?;
                            break 'facets;
                        }
                    }
                }
                if self.point(point).position() == Position::Undecided {
                    debug!(
                        "Point {} of element {} still undecided",
                        point,
                        self.element(element).external_id()
                    );
                }
            } else if position.is_volumetric() {
                for facet in self.point(point).facets().clone() {
                    if !self.facet_on_cut_side(facet) {
                        self.set_facet_position(facet, position)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// The side of the cut surface `point` lies on, seen from the cutter sides through
    /// `cut_point`.
    ///
    /// Sides whose plane contains `point` are ignored. Returns `None` if no side decides or if
    /// the sides disagree, which happens at a kink of the cut surface.
    fn position_behind_cut_point(
        &self,
        point: PointId,
        cut_point: PointId,
        cut_faces: &BTreeSet<SideId>,
    ) -> Result<Option<Position>, CutError> {
        let minimal_tolerance = self.options().minimal_tolerance;
        let x = *self.point(point).coordinates();
        let mut found = None;
        for &side in cut_faces {
            if self.side(side).is_level_set() || !self.point(cut_point).is_cut(side) {
                continue;
            }
            let t = self.side_local_coordinates(side, &x)?.z;
            if t.abs() <= minimal_tolerance {
                continue;
            }
            let position = if t > 0.0 { Position::Outside } else { Position::Inside };
            if found.map_or(false, |other| other != position) {
                return Ok(None);
            }
            found = Some(position);
        }
        Ok(found)
    }

    /// Groups the facets of the element into closed volume cells.
    ///
    /// Starting from every facet on an own side that is not yet part of a cell, facets are
    /// collected across shared lines. Where more than two facets share a line, the single
    /// uncollected facet that does not lie on an own side is followed; if there are several
    /// such facets none is followed. Every collected volume must be closed.
    pub fn element_make_volume_cells(&mut self, element: ElementId) -> Result<(), CutError> {
        let facets: Vec<FacetId> = self.element(element).facets().iter().copied().collect();
        let lines = self.facet_lines(facets.iter().copied());

        let mut done = BTreeSet::new();
        let mut owned_cells = Vec::new();
        for &facet in &facets {
            if done.contains(&facet) || !self.element(element).owns_side(self.facet(facet).parent_side()) {
                continue;
            }
            let collected = self.collect_volume(element, facet, &lines);
            let volume_lines = self.closed_volume_lines(element, &collected)?;
            done.extend(collected.iter().copied());
            owned_cells.push(self.new_volume_cell(element, collected, volume_lines));
        }

        // Closed cut surfaces floating inside the element
        let mut floating: BTreeSet<FacetId> = facets.iter().copied().filter(|f| !done.contains(f)).collect();
        while let Some(start) = floating.pop_first() {
            let mut stack = vec![start];
            let mut collected = BTreeSet::new();
            while let Some(f) = stack.pop() {
                if !collected.insert(f) {
                    continue;
                }
                for line in self.facet(f).lines() {
                    if let Some(sharing) = lines.get(&line) {
                        stack.extend(sharing.iter().copied().filter(|g| floating.remove(g)));
                    }
                }
            }
            let volume_lines = self.closed_volume_lines(element, &collected)?;
            let hole = self.new_volume_cell(element, collected.clone(), volume_lines.clone());
            debug!(
                "Floating volume cell {} in element {}",
                hole,
                self.element(element).external_id()
            );
            if let Some(enclosing) = self.find_enclosing_cell(&owned_cells, &collected) {
                self.attach_hole(enclosing, &collected, volume_lines);
            } else {
                warn!(
                    "No volume cell of element {} encloses floating cell {}",
                    self.element(element).external_id(),
                    hole
                );
            }
        }
        Ok(())
    }

    /// Maps every line to the facets it bounds.
    pub(crate) fn facet_lines(
        &self,
        facets: impl IntoIterator<Item = FacetId>,
    ) -> BTreeMap<PointPair, BTreeSet<FacetId>> {
        let mut lines: BTreeMap<PointPair, BTreeSet<FacetId>> = BTreeMap::new();
        for facet in facets {
            for line in self.facet(facet).lines() {
                lines.entry(line).or_default().insert(facet);
            }
        }
        lines
    }

    fn collect_volume(
        &self,
        element: ElementId,
        start: FacetId,
        lines: &BTreeMap<PointPair, BTreeSet<FacetId>>,
    ) -> BTreeSet<FacetId> {
        let e = self.element(element);
        let mut stack = vec![start];
        let mut collected = BTreeSet::new();
        while let Some(facet) = stack.pop() {
            if !collected.insert(facet) {
                continue;
            }
            for line in self.facet(facet).lines() {
                let Some(sharing) = lines.get(&line) else {
                    continue;
                };
                if sharing.len() == 2 {
                    stack.extend(sharing.iter().copied().filter(|f| !collected.contains(f)));
                } else {
                    let mut candidates = sharing
                        .iter()
                        .copied()
                        .filter(|f| !collected.contains(f) && !e.owns_side(self.facet(*f).parent_side()));
                    // Ambiguous matches are ignored, the closure check catches a volume that
                    // does not close without them
                    if let (Some(found), None) = (candidates.next(), candidates.next()) {
                        stack.push(found);
                    }
                }
            }
        }
        collected
    }

    /// The lines of the facet set, each of which must be shared by exactly two facets.
    fn closed_volume_lines(
        &self,
        element: ElementId,
        facets: &BTreeSet<FacetId>,
    ) -> Result<BTreeMap<PointPair, BTreeSet<FacetId>>, CutError> {
        let volume_lines = self.facet_lines(facets.iter().copied());
        if let Some((line, sharing)) = volume_lines.iter().find(|(_, sharing)| sharing.len() != 2) {
            return Err(CutError::UnclosedVolumeCell {
                element,
                line: *line,
                count: sharing.len(),
            });
        }
        Ok(volume_lines)
    }

    fn find_enclosing_cell(&self, candidates: &[VolumeCellId], hole: &BTreeSet<FacetId>) -> Option<VolumeCellId> {
        let x = hole
            .iter()
            .next()
            .and_then(|facet| self.facet_polygon(*facet).centroid())?;
        candidates.iter().copied().find(|cell| {
            let triangles = self.volume_cell_triangles(*cell);
            point_in_closed_surface(&x, triangles.iter().map(|[a, b, c]| [a, b, c]))
        })
    }

    fn attach_hole(
        &mut self,
        cell: VolumeCellId,
        hole: &BTreeSet<FacetId>,
        lines: BTreeMap<PointPair, BTreeSet<FacetId>>,
    ) {
        for facet in hole {
            self.facets[facet.0].cells.insert(cell);
        }
        let vc = &mut self.volume_cells[cell.0];
        vc.facets.extend(hole.iter().copied());
        for (line, facets) in lines {
            vc.lines.entry(line).or_default().extend(facets);
        }
    }

    /// An element is cut if a cutter side cut it or any of its sides carries cut points.
    pub fn element_is_cut(&self, element: ElementId) -> bool {
        let e = self.element(element);
        !e.cut_faces().is_empty() || e.sides().iter().any(|side| self.side_is_cut(*side))
    }

    /// The own side of the element all the points lie on.
    pub fn element_on_side(&self, element: ElementId, points: &BTreeSet<PointId>) -> Option<SideId> {
        self.element(element)
            .sides()
            .iter()
            .copied()
            .find(|side| self.side_on_side(*side, points))
    }

    /// The facet of an own side of the element with exactly the given corner points.
    pub fn element_facet_on_side(&self, element: ElementId, points: &BTreeSet<PointId>) -> Option<FacetId> {
        let side = self.element_on_side(element, points)?;
        self.side(side).facets().iter().copied().find(|facet| {
            let corners = self.facet(*facet).points();
            corners.len() == points.len() && corners.iter().all(|point| points.contains(point))
        })
    }

    pub fn element_integration_cells(&self, element: ElementId) -> Vec<IntegrationCellId> {
        self.element(element)
            .volume_cells()
            .iter()
            .flat_map(|cell| self.volume_cell(*cell).integration_cells().iter().copied())
            .collect()
    }

    /// Boundary cells on the facets of the cutter sides that cut the element.
    pub fn element_boundary_cells(&self, element: ElementId) -> Vec<BoundaryCellId> {
        let e = self.element(element);
        e.facets()
            .iter()
            .map(|facet| self.facet(*facet))
            .filter(|facet| facet.cut_side().map_or(false, |side| e.cut_faces().contains(&side)))
            .filter_map(|facet| facet.boundary_cell())
            .collect()
    }

    /// Points where the cutter sides of the element meet its sides.
    pub fn element_cut_points(&self, element: ElementId) -> BTreeSet<PointId> {
        let e = self.element(element);
        e.sides()
            .iter()
            .cartesian_product(e.cut_faces())
            .flat_map(|(side, other)| self.side_get_cut_points(*side, *other))
            .collect()
    }
}
