//! Errors reported by the cutting kernel.
use crate::mesh::{ElementId, NodeId, PointId, VolumeCellId};
use crate::newton::NewtonError;
use crate::position::Position;
use crate::shape::CellType;
use thiserror::Error;

/// The entity whose classification was about to be overwritten.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PositionedEntity {
    Point(PointId),
    Facet(crate::mesh::FacetId),
    VolumeCell(VolumeCellId),
}

#[derive(Debug, Error)]
pub enum CutError {
    /// A boundary line of a collected volume cell is not shared by exactly two of its facets.
    #[error("not properly closed line in volume cell of element {element}: line {line:?} is shared by {count} facet(s)")]
    UnclosedVolumeCell {
        element: ElementId,
        line: [PointId; 2],
        count: usize,
    },

    #[error("volume dofset not unique for node {node}: cell {cell} is in dof sets {first} and {second}")]
    NonUniqueDofSet {
        node: NodeId,
        cell: VolumeCellId,
        first: usize,
        second: usize,
    },

    #[error("volume dofset not found for cell {cell} at node {node}")]
    DofSetNotFound { node: NodeId, cell: VolumeCellId },

    #[error("cannot look up the dof set of an empty cell set at node {node}")]
    EmptyCellSet { node: NodeId },

    #[error("dof sets of node {node} have not been built")]
    DofSetsNotBuilt { node: NodeId },

    #[error("unsupported cell type {0:?}, only linear cells can be cut")]
    UnsupportedShape(CellType),

    #[error("conflicting position for {entity:?}: {current:?} cannot become {requested:?}")]
    ConflictingPosition {
        entity: PositionedEntity,
        current: Position,
        requested: Position,
    },

    #[error("the zero level set does not form closed loops in element {element}")]
    OpenLevelSet { element: ElementId },

    #[error("element {element} cannot be cut after its facets were built")]
    PhaseViolation { element: ElementId },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to compute local coordinates in element {element}")]
    InverseMapping {
        element: ElementId,
        #[source]
        source: NewtonError,
    },
}
