use crate::error::{CutError, PositionedEntity};
use crate::mesh::{BoundaryCellId, ElementId, FacetId, IntegrationCellId, Mesh, PointId, PointPair, VolumeCellId};
use crate::position::{Position, Transition};
use log::debug;
use nalgebra::{Point3, Vector3};
use std::collections::{BTreeMap, BTreeSet};
use xcut_geometry::PlanarPolygon3d;

pub type VolumeCellSet = BTreeSet<VolumeCellId>;

/// A closed region of an element bounded by facets.
#[derive(Debug, Clone)]
pub struct VolumeCell {
    id: VolumeCellId,
    element: ElementId,
    pub(crate) facets: BTreeSet<FacetId>,
    /// Boundary lines and the facets of the cell sharing them.
    pub(crate) lines: BTreeMap<PointPair, BTreeSet<FacetId>>,
    pub(crate) position: Position,
    pub(crate) integration_cells: Vec<IntegrationCellId>,
    pub(crate) boundary_cells: Vec<BoundaryCellId>,
}

impl VolumeCell {
    pub(crate) fn new(
        id: VolumeCellId,
        element: ElementId,
        facets: BTreeSet<FacetId>,
        lines: BTreeMap<PointPair, BTreeSet<FacetId>>,
    ) -> Self {
        Self {
            id,
            element,
            facets,
            lines,
            position: Position::Undecided,
            integration_cells: Vec::new(),
            boundary_cells: Vec::new(),
        }
    }

    pub fn id(&self) -> VolumeCellId {
        self.id
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn facets(&self) -> &BTreeSet<FacetId> {
        &self.facets
    }

    pub fn lines(&self) -> &BTreeMap<PointPair, BTreeSet<FacetId>> {
        &self.lines
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn integration_cells(&self) -> &[IntegrationCellId] {
        &self.integration_cells
    }

    pub fn boundary_cells(&self) -> &[BoundaryCellId] {
        &self.boundary_cells
    }
}

impl Mesh {
    /// Whether the point is a corner of one of the facets of the cell.
    pub fn volume_cell_contains(&self, cell: VolumeCellId, point: PointId) -> bool {
        self.volume_cell(cell)
            .facets()
            .iter()
            .any(|facet| self.facet(*facet).contains(point))
    }

    pub fn volume_cell_points(&self, cell: VolumeCellId) -> BTreeSet<PointId> {
        self.volume_cell(cell)
            .facets()
            .iter()
            .flat_map(|facet| self.facet(*facet).points().iter().copied())
            .collect()
    }

    /// Mean of the corner points of the cell.
    pub fn volume_cell_centroid(&self, cell: VolumeCellId) -> Point3<f64> {
        let points = self.volume_cell_points(cell);
        let sum = points
            .iter()
            .fold(Vector3::zeros(), |sum, point| sum + self.point(*point).coordinates().coords);
        Point3::from(sum / points.len().max(1) as f64)
    }

    /// Fan triangulation of the facets of the cell.
    pub fn volume_cell_triangles(&self, cell: VolumeCellId) -> Vec<[Point3<f64>; 3]> {
        let mut triangles = Vec::new();
        for facet in self.volume_cell(cell).facets() {
            let points = self.facet(*facet).points();
            let x = |i: usize| *self.point(points[i]).coordinates();
            for i in 1..points.len().saturating_sub(1) {
                triangles.push([x(0), x(i), x(i + 1)]);
            }
        }
        triangles
    }

    /// Cells reachable from `cell` through shared facets.
    ///
    /// Only facets that do not lie on the cut surface connect cells. If `point` is given, only
    /// facets containing it connect cells. The search is restricted to `cells` and skips cells
    /// in `done`. The result includes `cell` itself unless it is excluded.
    pub fn volume_cell_neighbors(
        &self,
        cell: VolumeCellId,
        point: Option<PointId>,
        cells: &VolumeCellSet,
        done: &VolumeCellSet,
    ) -> VolumeCellSet {
        let mut connected = VolumeCellSet::new();
        if !cells.contains(&cell) || done.contains(&cell) {
            return connected;
        }
        let mut stack = vec![cell];
        while let Some(current) = stack.pop() {
            if !connected.insert(current) {
                continue;
            }
            for facet in self.volume_cell(current).facets() {
                let f = self.facet(*facet);
                if self.facet_on_cut_side(*facet) || point.map_or(false, |p| !f.contains(p)) {
                    continue;
                }
                stack.extend(
                    f.cells()
                        .iter()
                        .copied()
                        .filter(|other| cells.contains(other) && !done.contains(other) && !connected.contains(other)),
                );
            }
        }
        connected
    }

    /// Propagates positions between volume cells, their facets and points until nothing
    /// changes.
    ///
    /// Cells that remain undecided are classified geometrically: by the orientation of a
    /// bounding cut facet relative to the normal of its cutter side, or else by the side of the
    /// first cutter side of their element their centroid lies on. Cells without any cut get the
    /// default position.
    pub fn find_facet_positions(&mut self) -> Result<(), CutError> {
        loop {
            self.propagate_positions()?;
            let undecided = (0..self.volume_cells.len())
                .map(VolumeCellId)
                .find(|cell| self.volume_cell(*cell).position() == Position::Undecided);
            let Some(cell) = undecided else {
                return Ok(());
            };
            let position = self
                .classify_volume_cell(cell)
                .unwrap_or(self.options().default_position);
            debug!("Volume cell {} classified as {}", cell, position);
            self.set_volume_cell_position(cell, position)?;
        }
    }

    fn propagate_positions(&mut self) -> Result<(), CutError> {
        let mut changed = true;
        while changed {
            changed = false;
            for cell in (0..self.volume_cells.len()).map(VolumeCellId) {
                if self.volume_cell(cell).position() == Position::Undecided {
                    if let Some(position) = self.volume_cell_known_position(cell)? {
                        self.set_volume_cell_position(cell, position)?;
                        changed = true;
                    }
                }
                let position = self.volume_cell(cell).position();
                if position.is_volumetric() {
                    for facet in self.volume_cell(cell).facets().clone() {
                        if !self.facet_on_cut_side(facet)
                            && self.set_facet_position(facet, position)? == Transition::Resolved
                        {
                            changed = true;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// The position of the classified facets and points of the cell off the cut surface.
    ///
    /// All of them have to agree.
    fn volume_cell_known_position(&self, cell: VolumeCellId) -> Result<Option<Position>, CutError> {
        let facets = self
            .volume_cell(cell)
            .facets()
            .iter()
            .filter(|facet| !self.facet_on_cut_side(**facet));
        let facet_positions = facets.clone().map(|facet| self.facet(*facet).position());
        let point_positions = facets
            .flat_map(|facet| self.facet(*facet).points().iter())
            .map(|point| self.point(*point).position());

        let mut known = None;
        for position in facet_positions.chain(point_positions).filter(Position::is_volumetric) {
            match known {
                None => known = Some(position),
                Some(current) if current != position => {
                    return Err(CutError::ConflictingPosition {
                        entity: PositionedEntity::VolumeCell(cell),
                        current,
                        requested: position,
                    });
                }
                Some(_) => {}
            }
        }
        Ok(known)
    }

    /// Classifies the cell from its cut facets.
    ///
    /// An oriented facet loop points away from the cell, so a cell whose cut facet points along
    /// the outward normal of the cut surface lies behind it, i.e. inside.
    fn classify_volume_cell(&self, cell: VolumeCellId) -> Option<Position> {
        let tolerance = self.options().minimal_tolerance;
        let element = self.volume_cell(cell).element();
        let from_cut_facets = self
            .volume_cell_oriented_loops(cell)
            .into_iter()
            .find_map(|(facet, points)| {
                let normal = self.facet_cut_normal(facet, element)?;
                let vertices = points.iter().map(|p| *self.point(*p).coordinates()).collect();
                let area = PlanarPolygon3d::from_vertices(vertices).area_vector();
                let alignment = area.dot(&normal.into_inner());
                if alignment.abs() <= tolerance * area.norm() {
                    None
                } else if alignment > 0.0 {
                    Some(Position::Inside)
                } else {
                    Some(Position::Outside)
                }
            });
        from_cut_facets.or_else(|| {
            let centroid = self.volume_cell_centroid(cell);
            self.element(element).cut_faces().iter().find_map(|side| {
                let distance = self.side_polygon(*side).plane()?.signed_distance(&centroid);
                if distance.abs() <= tolerance {
                    None
                } else if distance > 0.0 {
                    Some(Position::Outside)
                } else {
                    Some(Position::Inside)
                }
            })
        })
    }
}
