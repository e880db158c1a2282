//! Mesh nodes and the resolution of their degree-of-freedom sets.
//!
//! A node touched by several disconnected regions carries one dof set per region. A dof set
//! groups the volume cells, across all elements around the node, that are connected through
//! non-cut facets and therefore share the same unknown.
use crate::error::CutError;
use crate::mesh::{EdgeId, ElementId, Mesh, NodeId, PointId, VolumeCellId};
use crate::position::Position;
use crate::volume_cell::VolumeCellSet;
use log::{info, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum DofSetState {
    #[default]
    Uninitialized,
    Partitioned,
}

/// Dof sets of the cell-set based construction: each dof set is a collection of cell sets.
pub type DofCellSets = Vec<BTreeSet<VolumeCellSet>>;

#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    external_id: i64,
    point: PointId,
    pub(crate) edges: BTreeSet<EdgeId>,
    pub(crate) elements: BTreeSet<ElementId>,
    pub(crate) dofsets: Vec<VolumeCellSet>,
    pub(crate) dof_cellsets: DofCellSets,
    pub(crate) state: DofSetState,
}

impl Node {
    pub(crate) fn new(id: NodeId, external_id: i64, point: PointId) -> Self {
        Self {
            id,
            external_id,
            point,
            edges: BTreeSet::new(),
            elements: BTreeSet::new(),
            dofsets: Vec::new(),
            dof_cellsets: Vec::new(),
            state: DofSetState::Uninitialized,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn external_id(&self) -> i64 {
        self.external_id
    }

    pub fn point(&self) -> PointId {
        self.point
    }

    pub fn edges(&self) -> &BTreeSet<EdgeId> {
        &self.edges
    }

    pub fn elements(&self) -> &BTreeSet<ElementId> {
        &self.elements
    }

    pub fn dofsets(&self) -> &[VolumeCellSet] {
        &self.dofsets
    }

    pub fn dof_cellsets(&self) -> &DofCellSets {
        &self.dof_cellsets
    }

    pub fn dof_set_state(&self) -> DofSetState {
        self.state
    }

    pub fn num_dof_sets(&self) -> usize {
        match self.state {
            DofSetState::Uninitialized => 0,
            DofSetState::Partitioned => self.dof_cellsets.len().max(self.dofsets.len()),
        }
    }
}

impl Mesh {
    pub fn node_position(&self, node: NodeId) -> Position {
        self.point(self.node(node).point()).position()
    }

    /// A node on the cut surface is registered as cut point on each of its edges.
    pub fn node_register_cuts(&mut self, node: NodeId) {
        if self.node_position(node) == Position::OnCutSurface {
            let point = self.node(node).point();
            for edge in self.node(node).edges().clone() {
                self.point_add_edge(point, edge);
            }
        }
    }

    /// Appends to `nodal_cell_sets[node]` every cell set with a cell containing the node.
    pub fn node_assign_nodal_cell_set(
        &self,
        node: NodeId,
        cell_sets: &[VolumeCellSet],
        nodal_cell_sets: &mut BTreeMap<NodeId, Vec<VolumeCellSet>>,
    ) {
        let point = self.node(node).point();
        for cell_set in cell_sets {
            if cell_set
                .iter()
                .any(|cell| self.volume_cell_contains(*cell, point))
            {
                nodal_cell_sets
                    .entry(node)
                    .or_default()
                    .push(cell_set.clone());
            }
        }
    }

    /// Builds the dof sets of the node from the volume cells of its elements.
    ///
    /// Unless `include_inner` is set, only outside cells are considered.
    pub fn node_find_dof_sets(&mut self, node: NodeId, include_inner: bool) {
        let dofsets = self.compute_dof_sets(node, include_inner);
        let n = &mut self.nodes[node.0];
        n.dofsets = dofsets;
        n.state = DofSetState::Partitioned;
    }

    fn compute_dof_sets(&self, node: NodeId, include_inner: bool) -> Vec<VolumeCellSet> {
        let accept = |cell: &VolumeCellId| include_inner || self.volume_cell(*cell).position() == Position::Outside;

        let mut cells = VolumeCellSet::new();
        let mut nodal_cells: BTreeMap<NodeId, VolumeCellSet> = BTreeMap::new();
        for element in self.node(node).elements() {
            let e = self.element(*element);
            cells.extend(e.volume_cells().iter().copied().filter(accept));
            for n in e.nodes() {
                let point = self.node(*n).point();
                let containing = e
                    .volume_cells()
                    .iter()
                    .copied()
                    .filter(accept)
                    .filter(|cell| self.volume_cell_contains(*cell, point));
                nodal_cells.entry(*n).or_default().extend(containing);
            }
        }

        let mut done = VolumeCellSet::new();
        let mut dofsets = Vec::new();
        let own = nodal_cells.remove(&node).unwrap_or_default();
        let point = self.node(node).point();
        dofsets.extend(self.build_dof_cell_sets(Some(point), &cells, &own, &mut done));
        for (n, nodal) in &nodal_cells {
            let point = self.node(*n).point();
            dofsets.extend(self.build_dof_cell_sets(Some(point), &cells, nodal, &mut done));
        }
        // Interior volumes not connected to any node
        dofsets.extend(self.build_dof_cell_sets(None, &cells, &cells, &mut done));
        dofsets
    }

    /// Groups the not yet assigned `nodal_cells` into connected sets of `cells`.
    pub fn build_dof_cell_sets(
        &self,
        point: Option<PointId>,
        cells: &VolumeCellSet,
        nodal_cells: &VolumeCellSet,
        done: &mut VolumeCellSet,
    ) -> Vec<VolumeCellSet> {
        let mut dofsets = Vec::new();
        for cell in nodal_cells {
            if done.contains(cell) {
                continue;
            }
            let connected = self.volume_cell_neighbors(*cell, point, cells, done);
            if !connected.is_empty() {
                done.extend(connected.iter().copied());
                dofsets.push(connected);
            }
        }
        dofsets
    }

    /// Index of the dof set containing the cell.
    pub fn node_dof_set_number(&self, node: NodeId, cell: VolumeCellId) -> Result<usize, CutError> {
        let n = self.node(node);
        if n.state == DofSetState::Uninitialized {
            return Err(CutError::DofSetsNotBuilt { node });
        }
        let mut found = None;
        for (i, cells) in n.dofsets().iter().enumerate() {
            if cells.contains(&cell) {
                match found {
                    None => found = Some(i),
                    Some(first) => {
                        return Err(CutError::NonUniqueDofSet {
                            node,
                            cell,
                            first,
                            second: i,
                        })
                    }
                }
            }
        }
        found.ok_or(CutError::DofSetNotFound { node, cell })
    }

    /// Builds the dof sets of the node from cell sets.
    ///
    /// `nodal_cell_sets` holds, for the node and its neighbors, the cell sets containing
    /// that node. The node's own cell sets are processed first, then those of the neighbors
    /// in ascending order, then any cell sets not touching a node.
    pub fn node_find_dof_sets_new(
        &mut self,
        node: NodeId,
        nodal_cell_sets: BTreeMap<NodeId, Vec<VolumeCellSet>>,
        cell_sets: &[VolumeCellSet],
    ) {
        let dof_cellsets = self.compute_dof_sets_new(node, nodal_cell_sets, cell_sets);
        let n = &mut self.nodes[node.0];
        n.dof_cellsets = dof_cellsets;
        n.state = DofSetState::Partitioned;
    }

    fn compute_dof_sets_new(
        &self,
        node: NodeId,
        mut nodal_cell_sets: BTreeMap<NodeId, Vec<VolumeCellSet>>,
        cell_sets: &[VolumeCellSet],
    ) -> DofCellSets {
        let cells: VolumeCellSet = cell_sets.iter().flatten().copied().collect();
        let mut done = VolumeCellSet::new();
        let mut dof_cellsets = DofCellSets::new();

        let own = nodal_cell_sets.remove(&node).unwrap_or_default();
        let point = self.node(node).point();
        dof_cellsets.extend(self.build_dof_cell_sets_new(Some(point), cell_sets, &cells, &own, &mut done));
        for (n, sets) in &nodal_cell_sets {
            let point = self.node(*n).point();
            dof_cellsets.extend(self.build_dof_cell_sets_new(Some(point), cell_sets, &cells, sets, &mut done));
        }
        dof_cellsets.extend(self.build_dof_cell_sets_new(None, cell_sets, &cells, cell_sets, &mut done));
        dof_cellsets
    }

    /// Groups connected cells and records, for each group, the cell sets it touches.
    pub fn build_dof_cell_sets_new(
        &self,
        point: Option<PointId>,
        cell_sets: &[VolumeCellSet],
        cells: &VolumeCellSet,
        nodal_cell_sets: &[VolumeCellSet],
        done: &mut VolumeCellSet,
    ) -> DofCellSets {
        let mut dof_cellsets = DofCellSets::new();
        for cell in nodal_cell_sets.iter().flatten() {
            if done.contains(cell) {
                continue;
            }
            let connected = self.volume_cell_neighbors(*cell, point, cells, done);
            if connected.is_empty() {
                continue;
            }
            let connected_sets: BTreeSet<VolumeCellSet> = cell_sets
                .iter()
                .filter(|set| set.iter().any(|c| connected.contains(c)))
                .cloned()
                .collect();
            done.extend(connected.iter().copied());
            dof_cellsets.push(connected_sets);
        }
        dof_cellsets
    }

    /// Index of the dof set containing the first cell of `cells`.
    ///
    /// Returns `Ok(None)` if the cell is in none of the dof sets of the node.
    pub fn node_dof_set_number_new(&self, node: NodeId, cells: &VolumeCellSet) -> Result<Option<usize>, CutError> {
        let n = self.node(node);
        if n.state == DofSetState::Uninitialized {
            return Err(CutError::DofSetsNotBuilt { node });
        }
        let cell = *cells
            .iter()
            .next()
            .ok_or(CutError::EmptyCellSet { node })?;

        let mut found = None;
        for (i, cell_sets) in n.dof_cellsets().iter().enumerate() {
            for set in cell_sets {
                if set.contains(&cell) {
                    match found {
                        None => found = Some(i),
                        Some(first) => {
                            return Err(CutError::NonUniqueDofSet {
                                node,
                                cell,
                                first,
                                second: i,
                            })
                        }
                    }
                }
            }
        }
        if found.is_none() {
            warn!("dofset not found for node {} and volume cell {}", n.external_id(), cell);
        }
        Ok(found)
    }

    /// Clears the dof sets so that they are rebuilt.
    pub fn node_reset(&mut self, node: NodeId) {
        let n = &mut self.nodes[node.0];
        n.dofsets.clear();
        n.dof_cellsets.clear();
        n.state = DofSetState::Uninitialized;
    }

    /// Builds the cell-set based dof sets of every background node.
    ///
    /// Each volume cell forms its own cell set. Nodes touching an element in `skip` are left
    /// uninitialized. The dof sets are computed in parallel.
    pub fn find_dof_sets_new_all(&mut self, include_inner: bool, skip: &BTreeSet<ElementId>) {
        let nodes: Vec<NodeId> = self
            .node_ids()
            .filter(|node| {
                let elements = self.node(*node).elements();
                !elements.is_empty() && elements.is_disjoint(skip)
            })
            .collect();

        let results: Vec<(NodeId, DofCellSets)> = nodes
            .par_iter()
            .map(|&node| {
                let (nodal_cell_sets, cell_sets) = self.node_cell_sets(node, include_inner);
                (node, self.compute_dof_sets_new(node, nodal_cell_sets, &cell_sets))
            })
            .collect();

        let multiple = results.iter().filter(|(_, sets)| sets.len() > 1).count();
        for (node, dof_cellsets) in results {
            let n = &mut self.nodes[node.0];
            n.dof_cellsets = dof_cellsets;
            n.state = DofSetState::Partitioned;
        }
        info!("Built dof sets for {} node(s), {} with multiple dof sets", nodes.len(), multiple);
    }

    /// Cell sets of the elements around the node, and the nodal cell sets of every node of
    /// these elements.
    fn node_cell_sets(
        &self,
        node: NodeId,
        include_inner: bool,
    ) -> (BTreeMap<NodeId, Vec<VolumeCellSet>>, Vec<VolumeCellSet>) {
        let elements = self.node(node).elements();
        let cell_sets: Vec<VolumeCellSet> = elements
            .iter()
            .flat_map(|element| self.element(*element).volume_cells().iter().copied())
            .filter(|cell| include_inner || self.volume_cell(*cell).position() == Position::Outside)
            .map(|cell| VolumeCellSet::from([cell]))
            .collect();

        let neighbors: BTreeSet<NodeId> = elements
            .iter()
            .flat_map(|element| self.element(*element).nodes().iter().copied())
            .collect();
        let mut nodal_cell_sets = BTreeMap::new();
        for neighbor in neighbors {
            self.node_assign_nodal_cell_set(neighbor, &cell_sets, &mut nodal_cell_sets);
        }
        (nodal_cell_sets, cell_sets)
    }
}
