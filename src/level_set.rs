//! Cutting by the zero level of a scalar field given at the nodes of the background mesh.
//!
//! The field is interpolated linearly along element edges. Its roots become cut points, the cut
//! points on the boundary of each element side are joined into lines, and the lines inside an
//! element close into the facets of a single level-set side. From there on the level-set side
//! takes part in facet, volume cell and dof set construction like any cutter side.
use crate::error::CutError;
use crate::mesh::{EdgeId, ElementId, FacetId, Mesh, NodeId, PointId, SideId};
use crate::position::Position;
use crate::side::Side;
use itertools::Itertools;
use log::debug;
use nalgebra::{Point3, Vector3};
use std::collections::{BTreeMap, BTreeSet};
use xcut_geometry::PlanarPolygon3d;

impl Mesh {
    /// The cutter side standing for the zero level set, created on first use.
    pub fn level_set_side(&mut self) -> SideId {
        if let Some(side) = self.level_set_side {
            return side;
        }
        let id = SideId(self.sides.len());
        self.sides.push(Side::level_set(id));
        self.level_set_side = Some(id);
        id
    }

    pub fn level_set_value(&self, node: NodeId) -> Option<f64> {
        self.level_set_values.get(&node).copied()
    }

    /// Assigns the level-set value of a node. A node shared by several elements must get the
    /// same value from each of them.
    pub fn set_level_set_value(&mut self, node: NodeId, value: f64) -> Result<(), CutError> {
        match self.level_set_value(node) {
            Some(current) if current != value => Err(CutError::InvalidInput(format!(
                "node {} has level-set values {} and {}",
                self.node(node).external_id(),
                current,
                value
            ))),
            Some(_) => Ok(()),
            None => {
                self.level_set_values.insert(node, value);
                Ok(())
            }
        }
    }

    fn node_level_set_value(&self, node: NodeId) -> Result<f64, CutError> {
        self.level_set_value(node).ok_or_else(|| {
            CutError::InvalidInput(format!("node {} has no level-set value", self.node(node).external_id()))
        })
    }

    fn level_set_position(&self, value: f64) -> Position {
        if value.abs() <= self.options().minimal_tolerance {
            Position::OnCutSurface
        } else if value < 0.0 {
            Position::Inside
        } else {
            Position::Outside
        }
    }

    /// Cuts the element by the zero level set of the nodal field.
    ///
    /// Corner points are classified by the sign of their values, roots on the element edges
    /// become cut points, and the cut points of every element side are joined into lines.
    /// Returns whether the element is cut.
    pub fn cut_element_level_set(&mut self, element: ElementId) -> Result<bool, CutError> {
        if self.element(element).facets_built {
            return Err(CutError::PhaseViolation { element });
        }
        let level_set = self.level_set_side();

        for node in self.element(element).nodes().to_vec() {
            let point = self.node(node).point();
            let position = self.level_set_position(self.node_level_set_value(node)?);
            if position == Position::OnCutSurface {
                self.point_add_side(point, level_set);
            }
            self.set_point_position(point, position)?;
        }

        let edges: BTreeSet<EdgeId> = self
            .element(element)
            .sides()
            .iter()
            .flat_map(|side| self.side(*side).edges().iter().copied())
            .collect();
        for edge in edges {
            let [a, b] = self.edge(edge).nodes();
            let (fa, fb) = (self.node_level_set_value(a)?, self.node_level_set_value(b)?);
            let (pa, pb) = (self.level_set_position(fa), self.level_set_position(fb));
            if !(pa.is_volumetric() && pb.is_volumetric() && pa != pb) {
                continue;
            }
            let xa = *self.point(self.node(a).point()).coordinates();
            let xb = *self.point(self.node(b).point()).coordinates();
            let point = self.new_point(&(xa + (xb - xa) * (fa / (fa - fb))));
            // A root merged into a corner point leaves the edge uncut
            if self.edge(edge).end_points().contains(&point) {
                continue;
            }
            self.edge_add_cut_point(edge, point);
            self.point_add_side(point, level_set);
            self.set_point_position(point, Position::OnCutSurface)?;
        }

        let mut cut = false;
        for side in self.element(element).sides().to_vec() {
            cut |= self.side_find_level_set_lines(element, side, level_set);
        }
        if cut {
            self.side_create_line_segment(level_set, element);
            self.elements[element.0].cut_faces.insert(level_set);
        }
        debug!(
            "Zero level set {} element {}",
            if cut { "cuts" } else { "misses" },
            self.element(element).external_id()
        );
        Ok(cut)
    }

    /// Joins the level-set cut points on the boundary of an element side into lines.
    ///
    /// Consecutive cut points along the boundary are joined if the corners between them lie on
    /// the isolated side of the zero level, or if there are no corners between them. A side with
    /// four or more cut points is a saddle: the corners whose sign differs from the mean corner
    /// value are cut off. Otherwise the inside corners are.
    fn side_find_level_set_lines(&mut self, element: ElementId, side: SideId, level_set: SideId) -> bool {
        let boundary = self.side_boundary_loop(side);
        let cuts: Vec<usize> = boundary
            .iter()
            .positions(|point| self.point(*point).is_cut(level_set))
            .collect();
        if cuts.len() < 2 {
            return false;
        }
        let signs: BTreeSet<Position> = boundary
            .iter()
            .map(|point| self.point(*point).position())
            .filter(Position::is_volumetric)
            .collect();
        let values: Vec<f64> = self
            .side(side)
            .nodes()
            .iter()
            .filter_map(|node| self.level_set_value(*node))
            .collect();
        let mean = values.iter().sum::<f64>() / values.len().max(1) as f64;
        let isolated = if cuts.len() >= 4 && mean < 0.0 {
            Position::Outside
        } else {
            Position::Inside
        };

        let n = boundary.len();
        let mut joins = Vec::new();
        for (&i, &j) in cuts.iter().circular_tuple_windows() {
            let arc: Vec<Position> = (1..)
                .map(|k| (i + k) % n)
                .take_while(|k| *k != j)
                .map(|k| self.point(boundary[k]).position())
                .filter(Position::is_volumetric)
                .collect();
            let join = arc.is_empty() || (signs.len() == 2 && arc.iter().all(|position| *position == isolated));
            if join {
                joins.push((boundary[i], boundary[j]));
            }
        }

        let mut cut = false;
        for (a, b) in joins {
            cut |= self.new_line(a, b, Some(element)).is_some();
        }
        cut
    }

    /// Builds the facets of the level-set side inside the element from the closed loops of its
    /// lines.
    ///
    /// Every loop becomes one facet, oriented towards growing values. A loop covering a facet of
    /// an element side marks that facet instead. A single line where the zero level only touches
    /// an element edge is skipped.
    pub fn level_set_make_internal_facets(&mut self, side: SideId, element: ElementId) -> Result<Vec<FacetId>, CutError> {
        let mut adjacency: BTreeMap<PointId, Vec<PointId>> = BTreeMap::new();
        for line in self.side(side).element_lines(element) {
            let [a, b] = self.line(*line).points();
            adjacency.entry(a).or_default().push(b);
            adjacency.entry(b).or_default().push(a);
        }

        let mut loops = Vec::new();
        let mut visited = BTreeSet::new();
        for (&start, neighbors) in &adjacency {
            if visited.contains(&start) {
                continue;
            }
            let touching = neighbors.len() == 1
                && adjacency
                    .get(&neighbors[0])
                    .map_or(false, |other| other.len() == 1);
            if touching {
                visited.insert(start);
                visited.extend(neighbors.iter().copied());
                continue;
            }

            let mut points = Vec::new();
            let (mut previous, mut current) = (None, start);
            loop {
                let next = match adjacency.get(&current).map(Vec::as_slice) {
                    Some(&[first, second]) => {
                        if Some(first) == previous {
                            second
                        } else {
                            first
                        }
                    }
                    _ => return Err(CutError::OpenLevelSet { element }),
                };
                visited.insert(current);
                points.push(current);
                previous = Some(current);
                current = next;
                if current == start {
                    break;
                }
                if visited.contains(&current) {
                    return Err(CutError::OpenLevelSet { element });
                }
            }
            loops.push(points);
        }

        let mut facets = Vec::with_capacity(loops.len());
        for mut points in loops {
            let direction = self.level_set_direction(element, &points);
            let vertices = points
                .iter()
                .map(|point| *self.point(*point).coordinates())
                .collect();
            if PlanarPolygon3d::from_vertices(vertices)
                .area_vector()
                .dot(&direction)
                < 0.0
            {
                points.reverse();
            }
            let corners: BTreeSet<PointId> = points.iter().copied().collect();
            match self.element_facet_on_side(element, &corners) {
                Some(facet) => {
                    self.facet_set_cut_side(facet, side)?;
                    facets.push(facet);
                }
                None => facets.push(self.new_facet(points, side)),
            }
        }
        debug!(
            "Zero level set forms {} facet(s) in element {}",
            facets.len(),
            self.element(element).external_id()
        );
        Ok(facets)
    }

    /// Direction in which the field grows across the zero level through the given points.
    ///
    /// Every root on an edge contributes the edge direction towards its larger value. If none
    /// of the points is a root, the least-squares gradient over the element nodes is used.
    pub fn level_set_direction(&self, element: ElementId, points: &[PointId]) -> Vector3<f64> {
        let mut direction = Vector3::zeros();
        for point in points {
            for edge in self.point(*point).edges() {
                if self.edge(*edge).end_points().contains(point) {
                    continue;
                }
                let [a, b] = self.edge(*edge).nodes();
                let (Some(fa), Some(fb)) = (self.level_set_value(a), self.level_set_value(b)) else {
                    continue;
                };
                let xa = self.point(self.node(a).point()).coordinates();
                let xb = self.point(self.node(b).point()).coordinates();
                direction += if fb > fa { xb - xa } else { xa - xb };
            }
        }
        if direction.norm_squared() > 0.0 {
            return direction;
        }

        let nodes: Vec<(Point3<f64>, f64)> = self
            .element(element)
            .nodes()
            .iter()
            .filter_map(|node| {
                let value = self.level_set_value(*node)?;
                Some((*self.point(self.node(*node).point()).coordinates(), value))
            })
            .collect();
        let center = nodes
            .iter()
            .fold(Vector3::zeros(), |sum, (x, _)| sum + x.coords)
            / nodes.len().max(1) as f64;
        nodes
            .iter()
            .fold(Vector3::zeros(), |sum, (x, value)| sum + (x.coords - center) * *value)
    }
}
