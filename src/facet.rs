use crate::error::CutError;
use crate::mesh::{point_pair, BoundaryCellId, ElementId, FacetId, Mesh, PointId, PointPair, SideId, VolumeCellId};
use crate::position::Position;
use itertools::Itertools;
use log::debug;
use nalgebra::{Unit, Vector3};
use std::collections::BTreeSet;
use xcut_geometry::PlanarPolygon3d;

/// A planar polygon bounding one or more volume cells.
///
/// Facets on element sides are shared by the two elements adjacent to the side. Facets on
/// cutter sides (cut facets) are shared by the volume cells on both sides of the cut. A facet of
/// an element side covered by a cutter side is a cut facet as well.
#[derive(Debug, Clone)]
pub struct Facet {
    id: FacetId,
    points: Vec<PointId>,
    parent: SideId,
    /// The cutter side the facet lies on.
    pub(crate) cut_side: Option<SideId>,
    pub(crate) position: Position,
    pub(crate) cells: BTreeSet<VolumeCellId>,
    pub(crate) boundary_cell: Option<BoundaryCellId>,
}

impl Facet {
    pub(crate) fn new(
        id: FacetId,
        points: Vec<PointId>,
        parent: SideId,
        cut_side: Option<SideId>,
        position: Position,
    ) -> Self {
        Self {
            id,
            points,
            parent,
            cut_side,
            position,
            cells: BTreeSet::new(),
            boundary_cell: None,
        }
    }

    pub fn id(&self) -> FacetId {
        self.id
    }

    /// Corner points as a closed loop.
    pub fn points(&self) -> &[PointId] {
        &self.points
    }

    pub fn parent_side(&self) -> SideId {
        self.parent
    }

    pub fn cut_side(&self) -> Option<SideId> {
        self.cut_side
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn cells(&self) -> &BTreeSet<VolumeCellId> {
        &self.cells
    }

    pub fn boundary_cell(&self) -> Option<BoundaryCellId> {
        self.boundary_cell
    }

    pub fn contains(&self, point: PointId) -> bool {
        self.points.contains(&point)
    }

    /// The boundary lines of the facet as point pairs.
    pub fn lines(&self) -> impl '_ + Iterator<Item = PointPair> {
        self.points
            .iter()
            .circular_tuple_windows()
            .map(|(a, b)| point_pair(*a, *b))
    }
}

impl Mesh {
    /// Whether the facet lies on the cut surface.
    pub fn facet_on_cut_side(&self, facet: FacetId) -> bool {
        self.facet(facet).cut_side().is_some()
    }

    /// Marks a facet of an element side as covered by the cutter side `side`.
    pub fn facet_set_cut_side(&mut self, facet: FacetId, side: SideId) -> Result<(), CutError> {
        self.set_facet_position(facet, Position::OnCutSurface)?;
        let f = &mut self.facets[facet.0];
        if f.cut_side.is_none() {
            debug!("Facet {} lies on cutter side {}", facet, side);
            f.cut_side = Some(side);
        }
        Ok(())
    }

    /// Whether `side` cuts the facet, i.e. more than one facet point lies on a side that is
    /// not the parent of the facet.
    pub fn facet_is_cut_side(&self, facet: FacetId, side: SideId) -> bool {
        let f = self.facet(facet);
        if f.parent_side() == side {
            return false;
        }
        f.points()
            .iter()
            .filter(|point| self.point(**point).is_cut(side))
            .count()
            > 1
    }

    pub fn facet_polygon(&self, facet: FacetId) -> PlanarPolygon3d<f64> {
        let vertices = self
            .facet(facet)
            .points()
            .iter()
            .map(|point| *self.point(*point).coordinates())
            .collect();
        PlanarPolygon3d::from_vertices(vertices)
    }

    pub fn facet_area(&self, facet: FacetId) -> f64 {
        self.facet_polygon(facet).area()
    }

    /// Unit normal of the cut surface at a cut facet of the element, pointing to the outside.
    ///
    /// Cutter sides carry their own normal. On the level-set side the facet normal is turned
    /// towards growing values.
    pub fn facet_cut_normal(&self, facet: FacetId, element: ElementId) -> Option<Unit<Vector3<f64>>> {
        let side = self.facet(facet).cut_side()?;
        if !self.side(side).is_level_set() {
            return self.side_polygon(side).normal();
        }
        let normal = self.facet_polygon(facet).normal()?;
        let direction = self.level_set_direction(element, self.facet(facet).points());
        if normal.dot(&direction) < 0.0 {
            Some(Unit::new_unchecked(-normal.into_inner()))
        } else {
            Some(normal)
        }
    }
}
