//! Driver running the three cutting phases over a background mesh and a cut surface.
use crate::error::CutError;
use crate::mesh::{ElementId, Mesh, NodeId, SideId};
use crate::options::CutOptions;
use crate::shape::{CellType, ElementShape, SideShape};
use eyre::WrapErr;
use log::{error, info};
use nalgebra::Point3;
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::convert::TryFrom;

/// Cuts a background mesh with a cut surface.
///
/// Background elements and cutter sides are registered with external ids and coordinates.
/// [`cut`](Self::cut) then runs the pipeline:
///
/// 1. every element is cut with every cutter side whose bounding box overlaps it,
/// 2. facets, node positions, volume cells, cell positions and integration cells are built,
/// 3. dof sets are resolved for every background node.
///
/// An element whose processing fails is excluded from the later phases, as are nodes touching
/// it. The remaining elements are processed as usual and the failures are reported at the end.
#[derive(Default)]
pub struct MeshIntersection {
    mesh: Mesh,
    nodes: FxHashMap<i64, NodeId>,
    cut_nodes: FxHashMap<i64, NodeId>,
    elements: BTreeMap<i64, ElementId>,
    cut_sides: BTreeMap<i64, SideId>,
    level_set_elements: BTreeSet<ElementId>,
    failed: BTreeSet<ElementId>,
    errors: Vec<(ElementId, CutError)>,
    cut_done: bool,
}

impl MeshIntersection {
    pub fn new(options: CutOptions) -> Self {
        Self {
            mesh: Mesh::new(options),
            ..Default::default()
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn options(&self) -> &CutOptions {
        self.mesh.options()
    }

    pub fn into_mesh(self) -> Mesh {
        self.mesh
    }

    pub fn element_id(&self, external_id: i64) -> Option<ElementId> {
        self.elements.get(&external_id).copied()
    }

    pub fn node_id(&self, external_id: i64) -> Option<NodeId> {
        self.nodes.get(&external_id).copied()
    }

    pub fn cut_side_id(&self, external_id: i64) -> Option<SideId> {
        self.cut_sides.get(&external_id).copied()
    }

    /// Elements whose processing failed during the last call to [`cut`](Self::cut).
    pub fn failed_elements(&self) -> impl '_ + Iterator<Item = ElementId> {
        self.failed.iter().copied()
    }

    pub fn add_element(
        &mut self,
        external_id: i64,
        node_ids: &[i64],
        coordinates: &[Point3<f64>],
        cell_type: CellType,
    ) -> Result<ElementId, CutError> {
        self.check_not_cut()?;
        let shape = ElementShape::try_from(cell_type)?;
        check_node_input(node_ids, coordinates)?;
        if self.elements.contains_key(&external_id) {
            return Err(CutError::InvalidInput(format!("duplicate element id {}", external_id)));
        }
        let nodes = node_ids
            .iter()
            .zip(coordinates)
            .map(|(id, x)| *self.nodes.entry(*id).or_insert_with(|| self.mesh.new_node(*id, x)))
            .collect();
        let element = self.mesh.new_element(external_id, shape, nodes)?;
        self.elements.insert(external_id, element);
        Ok(element)
    }

    /// Adds a background element cut by the zero level of the given nodal values.
    ///
    /// Negative values lie inside. Nodes shared with other level-set elements must carry the
    /// same value.
    pub fn add_level_set_element(
        &mut self,
        external_id: i64,
        node_ids: &[i64],
        coordinates: &[Point3<f64>],
        values: &[f64],
        cell_type: CellType,
    ) -> Result<ElementId, CutError> {
        if values.len() != node_ids.len() {
            return Err(CutError::InvalidInput(format!(
                "{} level-set values for {} nodes",
                values.len(),
                node_ids.len()
            )));
        }
        let element = self.add_element(external_id, node_ids, coordinates, cell_type)?;
        for (node, value) in self.mesh.element(element).nodes().to_vec().into_iter().zip(values) {
            self.mesh.set_level_set_value(node, *value)?;
        }
        self.level_set_elements.insert(element);
        Ok(element)
    }

    pub fn add_cut_side(
        &mut self,
        external_id: i64,
        node_ids: &[i64],
        coordinates: &[Point3<f64>],
        cell_type: CellType,
    ) -> Result<SideId, CutError> {
        self.check_not_cut()?;
        let shape = SideShape::try_from(cell_type)?;
        check_node_input(node_ids, coordinates)?;
        if self.cut_sides.contains_key(&external_id) {
            return Err(CutError::InvalidInput(format!("duplicate cut side id {}", external_id)));
        }
        let nodes = node_ids
            .iter()
            .zip(coordinates)
            .map(|(id, x)| *self.cut_nodes.entry(*id).or_insert_with(|| self.mesh.new_node(*id, x)))
            .collect();
        let side = self.mesh.new_side(nodes, shape, true, Some(external_id))?;
        self.cut_sides.insert(external_id, side);
        Ok(side)
    }

    fn check_not_cut(&self) -> Result<(), CutError> {
        if self.cut_done {
            Err(CutError::InvalidInput("the mesh has already been cut".to_string()))
        } else {
            Ok(())
        }
    }

    /// Runs all three phases.
    ///
    /// Returns an error describing the failed elements if any element could not be processed.
    pub fn cut(&mut self) -> eyre::Result<()> {
        self.check_not_cut()?;
        self.cut_done = true;
        let elements: Vec<ElementId> = self.elements.values().copied().collect();
        let tolerance = self.options().point_tolerance;

        // Phase 1
        let level_set_elements: Vec<ElementId> = self.level_set_elements.iter().copied().collect();
        self.run_phase(&level_set_elements, |mesh, element| {
            mesh.cut_element_level_set(element).map(|_| ())
        });
        let cutters: Vec<_> = self
            .cut_sides
            .values()
            .filter_map(|side| {
                self.mesh
                    .side_polygon(*side)
                    .bounding_box()
                    .map(|aabb| (*side, aabb.grow_uniformly(tolerance)))
            })
            .collect();
        self.run_phase(&elements, |mesh, element| {
            let Some(aabb) = mesh.element_bounding_box(element) else {
                return Ok(());
            };
            for (side, side_aabb) in &cutters {
                if side_aabb.intersects(&aabb) {
                    mesh.cut_element(element, *side)?;
                }
            }
            Ok(())
        });
        let num_cut = elements
            .iter()
            .filter(|element| !self.mesh.element(**element).cut_faces().is_empty())
            .count();
        info!(
            "Cut {} of {} element(s) with {} cutter side(s) and {} level-set element(s)",
            num_cut,
            elements.len(),
            cutters.len(),
            level_set_elements.len()
        );

        // Phase 2
        for node in self.nodes.values() {
            self.mesh.node_register_cuts(*node);
        }
        self.run_phase(&elements, |mesh, element| mesh.element_make_facets(element));
        self.run_phase(&elements, |mesh, element| mesh.element_find_node_positions(element));
        self.run_phase(&elements, |mesh, element| mesh.element_make_volume_cells(element));
        self.mesh
            .find_facet_positions()
            .wrap_err("Failed to classify volume cells")?;
        for element in &elements {
            if !self.failed.contains(element) {
                self.mesh.element_create_integration_cells(*element);
            }
        }
        info!(
            "Created {} volume cell(s), {} integration cell(s) and {} boundary cell(s)",
            self.mesh.volume_cells().len(),
            self.mesh.integration_cells().len(),
            self.mesh.boundary_cells().len()
        );

        // Phase 3
        let include_inner = self.options().include_inner;
        self.mesh.find_dof_sets_new_all(include_inner, &self.failed);

        self.failure_report()
    }

    fn run_phase<F>(&mut self, elements: &[ElementId], mut f: F)
    where
        F: FnMut(&mut Mesh, ElementId) -> Result<(), CutError>,
    {
        for &element in elements {
            if self.failed.contains(&element) {
                continue;
            }
            if let Err(err) = f(&mut self.mesh, element) {
                error!(
                    "Failed to cut element {}: {}",
                    self.mesh.element(element).external_id(),
                    err
                );
                self.failed.insert(element);
                self.errors.push((element, err));
            }
        }
    }

    fn failure_report(&mut self) -> eyre::Result<()> {
        let errors = std::mem::take(&mut self.errors);
        let ids: Vec<i64> = errors
            .iter()
            .map(|(element, _)| self.mesh.element(*element).external_id())
            .collect();
        // The first failure becomes the source of the report, the others are listed by id
        let Some((element, err)) = errors.into_iter().next() else {
            return Ok(());
        };
        Err(eyre::Report::new(err)
            .wrap_err(format!("Failed to cut element {}", self.mesh.element(element).external_id()))
            .wrap_err(format!("Cutting failed for {} element(s): {:?}", ids.len(), ids)))
    }
}

fn check_node_input(node_ids: &[i64], coordinates: &[Point3<f64>]) -> Result<(), CutError> {
    if node_ids.len() == coordinates.len() {
        Ok(())
    } else {
        Err(CutError::InvalidInput(format!(
            "got {} node ids but {} coordinates",
            node_ids.len(),
            coordinates.len()
        )))
    }
}
