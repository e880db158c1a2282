//! Integration cells (tetrahedra filling a volume cell) and boundary cells (polygons on the
//! cut surface).
use crate::mesh::{point_pair, BoundaryCellId, ElementId, FacetId, IntegrationCellId, Mesh, PointId, VolumeCellId};
use itertools::Itertools;
use nalgebra::{Unit, Vector3};
use std::collections::{BTreeMap, BTreeSet};
use xcut_geometry::{signed_tetrahedron_volume, PlanarPolygon3d};

/// A tetrahedron of a volume cell.
///
/// The volume is signed: tetrahedra covering a hole of the cell count negatively, so that the
/// volumes of all integration cells of a volume cell add up to its volume.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationCell {
    id: IntegrationCellId,
    cell: VolumeCellId,
    points: [PointId; 4],
    volume: f64,
}

impl IntegrationCell {
    pub fn id(&self) -> IntegrationCellId {
        self.id
    }

    pub fn volume_cell(&self) -> VolumeCellId {
        self.cell
    }

    pub fn points(&self) -> [PointId; 4] {
        self.points
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }
}

/// A polygon of the cut surface bounding one or two volume cells.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryCell {
    id: BoundaryCellId,
    facet: FacetId,
    points: Vec<PointId>,
    normal: Unit<Vector3<f64>>,
    area: f64,
}

impl BoundaryCell {
    pub fn id(&self) -> BoundaryCellId {
        self.id
    }

    pub fn facet(&self) -> FacetId {
        self.facet
    }

    pub fn points(&self) -> &[PointId] {
        &self.points
    }

    /// Unit normal of the cutter side, pointing to the outside.
    pub fn normal(&self) -> &Unit<Vector3<f64>> {
        &self.normal
    }

    pub fn area(&self) -> f64 {
        self.area
    }
}

impl Mesh {
    /// The facet loops of the cell, oriented so that the outer boundary points outwards and
    /// the boundaries of holes point into the holes.
    pub fn volume_cell_oriented_facets(&self, cell: VolumeCellId) -> Vec<Vec<PointId>> {
        self.volume_cell_oriented_loops(cell).into_values().collect()
    }

    /// The oriented loop of every facet of the cell. Every loop points away from the cell.
    pub(crate) fn volume_cell_oriented_loops(&self, cell: VolumeCellId) -> BTreeMap<FacetId, Vec<PointId>> {
        let vc = self.volume_cell(cell);
        let mut loops: BTreeMap<FacetId, Vec<PointId>> = BTreeMap::new();
        let mut components: Vec<Vec<FacetId>> = Vec::new();

        for &start in vc.facets() {
            if loops.contains_key(&start) {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![start];
            loops.insert(start, self.facet(start).points().to_vec());
            while let Some(facet) = stack.pop() {
                component.push(facet);
                let directed: Vec<(PointId, PointId)> = loops[&facet].iter().copied().circular_tuple_windows().collect();
                for (a, b) in directed {
                    let Some(sharing) = vc.lines().get(&point_pair(a, b)) else {
                        continue;
                    };
                    for &other in sharing {
                        if loops.contains_key(&other) {
                            continue;
                        }
                        // A neighbor traverses the shared line in the opposite direction
                        let mut points = self.facet(other).points().to_vec();
                        let same_direction = points
                            .iter()
                            .copied()
                            .circular_tuple_windows()
                            .any(|edge: (PointId, PointId)| edge == (a, b));
                        if same_direction {
                            points.reverse();
                        }
                        loops.insert(other, points);
                        stack.push(other);
                    }
                }
            }
            components.push(component);
        }

        let signed_volume = |component: &[FacetId], loops: &BTreeMap<FacetId, Vec<PointId>>| {
            component
                .iter()
                .map(|facet| self.loop_volume(&loops[facet]))
                .sum::<f64>()
        };

        // Make every component point outwards, then turn all but the largest one into holes
        let volumes: Vec<f64> = components
            .iter()
            .map(|component| signed_volume(component, &loops))
            .collect();
        let outer = volumes
            .iter()
            .map(|v| v.abs())
            .position_max_by(|a, b| a.total_cmp(b));
        for (i, (component, volume)) in components.iter().zip(&volumes).enumerate() {
            let outwards = *volume >= 0.0;
            if outwards != (Some(i) == outer) {
                for facet in component {
                    if let Some(points) = loops.get_mut(facet) {
                        points.reverse();
                    }
                }
            }
        }

        loops
    }

    /// Signed volume of the cell, holes excluded.
    pub fn volume_cell_volume(&self, cell: VolumeCellId) -> f64 {
        self.volume_cell_oriented_facets(cell)
            .iter()
            .map(|points| self.loop_volume(points))
            .sum()
    }

    /// Contribution of an oriented facet loop to the enclosed volume (divergence theorem).
    fn loop_volume(&self, points: &[PointId]) -> f64 {
        let polygon = PlanarPolygon3d::from_vertices(points.iter().map(|p| *self.point(*p).coordinates()).collect());
        let vertices = polygon.vertices();
        if vertices.is_empty() {
            return 0.0;
        }
        // Measured from the vertex mean so non-planar loops give the same volume either way round
        let center = vertices.iter().fold(Vector3::zeros(), |sum, x| sum + x.coords) / vertices.len() as f64;
        polygon.area_vector().dot(&center) / 3.0
    }

    /// Splits the cell into tetrahedra fanned from its smallest point.
    ///
    /// The volumes of the tetrahedra are signed and add up to the volume of the cell. On a
    /// non-convex cell some tetrahedra are inverted or reach outside the cell, so they are only
    /// valid as quadrature domains for integrands that extend smoothly beyond the cell.
    pub fn volume_cell_create_integration_cells(&mut self, cell: VolumeCellId) {
        let loops = self.volume_cell_oriented_facets(cell);
        let Some(apex) = loops.iter().flatten().copied().min() else {
            return;
        };
        let x_apex = *self.point(apex).coordinates();
        let mut tets = Vec::new();
        for points in &loops {
            if points.contains(&apex) {
                continue;
            }
            for i in 1..points.len().saturating_sub(1) {
                let [a, b, c] = [points[0], points[i], points[i + 1]];
                let [xa, xb, xc] = [a, b, c].map(|p| *self.point(p).coordinates());
                // Outward triangles see the apex from behind
                let volume = -signed_tetrahedron_volume(&xa, &xb, &xc, &x_apex);
                tets.push(([apex, a, b, c], volume));
            }
        }
        for (points, volume) in tets {
            let id = IntegrationCellId(self.integration_cells.len());
            self.integration_cells.push(IntegrationCell {
                id,
                cell,
                points,
                volume,
            });
            self.volume_cells[cell.0].integration_cells.push(id);
        }
    }

    /// Attaches a boundary cell to every cut facet of the cell, creating it on first use.
    ///
    /// The points of a boundary cell run counter-clockwise around the normal of its cutter side.
    pub fn volume_cell_create_boundary_cells(&mut self, cell: VolumeCellId) {
        let element = self.volume_cell(cell).element();
        let cut_facets: Vec<FacetId> = self
            .volume_cell(cell)
            .facets()
            .iter()
            .copied()
            .filter(|facet| self.facet_on_cut_side(*facet))
            .collect();
        for facet in cut_facets {
            let id = match self.facet(facet).boundary_cell() {
                Some(id) => id,
                None => {
                    let Some(normal) = self.facet_cut_normal(facet, element) else {
                        continue;
                    };
                    let mut points = self.facet(facet).points().to_vec();
                    if self.facet_polygon(facet).area_vector().dot(&normal.into_inner()) < 0.0 {
                        points.reverse();
                    }
                    let id = BoundaryCellId(self.boundary_cells.len());
                    self.boundary_cells.push(BoundaryCell {
                        id,
                        facet,
                        points,
                        normal,
                        area: self.facet_area(facet),
                    });
                    self.facets[facet.0].boundary_cell = Some(id);
                    id
                }
            };
            self.volume_cells[cell.0].boundary_cells.push(id);
        }
    }

    /// Creates the integration and boundary cells of every volume cell of the element.
    pub fn element_create_integration_cells(&mut self, element: ElementId) {
        let cells: BTreeSet<_> = self.element(element).volume_cells().clone();
        for cell in cells {
            if self.volume_cell(cell).integration_cells().is_empty() {
                self.volume_cell_create_integration_cells(cell);
                self.volume_cell_create_boundary_cells(cell);
            }
        }
    }
}
