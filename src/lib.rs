//! A mesh-cutting kernel for extended finite element methods.
//!
//! A background mesh of linear volume elements is cut by a surface made of planar cutter
//! sides. The kernel computes the intersection points and lines, splits element sides into
//! facets, groups facets into volume cells, classifies every cell as inside or outside of the
//! cut surface and resolves the degree-of-freedom sets of nodes touched by several regions.
//!
//! [`MeshIntersection`] runs the complete pipeline. The individual steps are available as
//! methods on [`Mesh`](mesh::Mesh).
pub mod edge;
pub mod element;
pub mod error;
pub mod facet;
pub mod integration_cell;
pub mod intersection;
pub mod level_set;
pub mod line;
pub mod mesh;
pub mod newton;
pub mod node;
pub mod options;
pub mod point;
pub mod position;
pub mod shape;
pub mod side;
pub mod volume_cell;

pub mod geometry {
    pub use xcut_geometry::*;
}

#[cfg(feature = "proptest-support")]
pub mod proptest;

pub use error::CutError;
pub use intersection::MeshIntersection;
pub use options::CutOptions;
pub use position::Position;

pub extern crate nalgebra;
