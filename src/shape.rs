//! Reference shapes of background cells and cutter sides.
//!
//! Basis functions, reference-domain tests and face tables are provided per shape and
//! dispatched through closed enums, so a single Newton routine serves every shape.
use crate::error::CutError;
use nalgebra::{Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// Cell types a discretization may hand to the kernel.
///
/// Only the linear volume and surface types can be cut. The remaining types are recognized so
/// that they can be rejected with a diagnosable error.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    Line2,
    Tri3,
    Tri6,
    Quad4,
    Quad8,
    Quad9,
    Tet4,
    Tet10,
    Hex8,
    Hex20,
    Hex27,
    Wedge6,
    Wedge15,
    Pyramid5,
}

/// Linear volume shapes of background elements.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementShape {
    Tet4,
    Hex8,
    Wedge6,
    Pyramid5,
}

/// Linear (planar) side shapes, used both for element faces and cutter sides.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SideShape {
    Tri3,
    Quad4,
}

impl TryFrom<CellType> for ElementShape {
    type Error = CutError;

    fn try_from(cell_type: CellType) -> Result<Self, Self::Error> {
        match cell_type {
            CellType::Tet4 => Ok(ElementShape::Tet4),
            CellType::Hex8 => Ok(ElementShape::Hex8),
            CellType::Wedge6 => Ok(ElementShape::Wedge6),
            CellType::Pyramid5 => Ok(ElementShape::Pyramid5),
            other => Err(CutError::UnsupportedShape(other)),
        }
    }
}

impl TryFrom<CellType> for SideShape {
    type Error = CutError;

    fn try_from(cell_type: CellType) -> Result<Self, Self::Error> {
        match cell_type {
            CellType::Tri3 => Ok(SideShape::Tri3),
            CellType::Quad4 => Ok(SideShape::Quad4),
            other => Err(CutError::UnsupportedShape(other)),
        }
    }
}

impl From<ElementShape> for CellType {
    fn from(shape: ElementShape) -> Self {
        match shape {
            ElementShape::Tet4 => CellType::Tet4,
            ElementShape::Hex8 => CellType::Hex8,
            ElementShape::Wedge6 => CellType::Wedge6,
            ElementShape::Pyramid5 => CellType::Pyramid5,
        }
    }
}

impl From<SideShape> for CellType {
    fn from(shape: SideShape) -> Self {
        match shape {
            SideShape::Tri3 => CellType::Tri3,
            SideShape::Quad4 => CellType::Quad4,
        }
    }
}

const HEX8_REFERENCE_COORDS: [[f64; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];

const QUAD4_REFERENCE_COORDS: [[f64; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

// Faces are oriented counter-clockwise when seen from outside the element.
const TET4_FACES: [&[usize]; 4] = [&[0, 2, 1], &[0, 1, 3], &[1, 2, 3], &[0, 3, 2]];
const HEX8_FACES: [&[usize]; 6] = [
    &[3, 2, 1, 0],
    &[0, 1, 5, 4],
    &[1, 2, 6, 5],
    &[2, 3, 7, 6],
    &[4, 7, 3, 0],
    &[5, 6, 7, 4],
];
const WEDGE6_FACES: [&[usize]; 5] = [&[0, 2, 1], &[3, 4, 5], &[0, 1, 4, 3], &[1, 2, 5, 4], &[2, 0, 3, 5]];
const PYRAMID5_FACES: [&[usize]; 5] = [&[0, 3, 2, 1], &[0, 1, 4], &[1, 2, 4], &[2, 3, 4], &[3, 0, 4]];

impl ElementShape {
    pub fn num_nodes(&self) -> usize {
        match self {
            ElementShape::Tet4 => 4,
            ElementShape::Hex8 => 8,
            ElementShape::Wedge6 => 6,
            ElementShape::Pyramid5 => 5,
        }
    }

    /// Local node indices of each face.
    pub fn faces(&self) -> &'static [&'static [usize]] {
        match self {
            ElementShape::Tet4 => &TET4_FACES,
            ElementShape::Hex8 => &HEX8_FACES,
            ElementShape::Wedge6 => &WEDGE6_FACES,
            ElementShape::Pyramid5 => &PYRAMID5_FACES,
        }
    }

    /// A point well inside the reference domain, used as initial guess for inverse mapping.
    pub fn reference_center(&self) -> Vector3<f64> {
        match self {
            ElementShape::Tet4 => Vector3::new(0.25, 0.25, 0.25),
            ElementShape::Hex8 => Vector3::zeros(),
            ElementShape::Wedge6 => Vector3::new(1.0 / 3.0, 1.0 / 3.0, 0.0),
            ElementShape::Pyramid5 => Vector3::new(0.0, 0.0, 0.25),
        }
    }

    pub fn contains_reference_point(&self, xi: &Vector3<f64>, tolerance: f64) -> bool {
        let (r, s, t) = (xi.x, xi.y, xi.z);
        match self {
            ElementShape::Tet4 => r >= -tolerance && s >= -tolerance && t >= -tolerance && r + s + t <= 1.0 + tolerance,
            ElementShape::Hex8 => xi.iter().all(|x_i| x_i.abs() <= 1.0 + tolerance),
            ElementShape::Wedge6 => {
                r >= -tolerance && s >= -tolerance && r + s <= 1.0 + tolerance && t.abs() <= 1.0 + tolerance
            }
            ElementShape::Pyramid5 => {
                t >= -tolerance
                    && t <= 1.0 + tolerance
                    && r.abs() <= 1.0 - t + tolerance
                    && s.abs() <= 1.0 - t + tolerance
            }
        }
    }

    pub fn evaluate_basis(&self, xi: &Vector3<f64>) -> Vec<f64> {
        let (r, s, t) = (xi.x, xi.y, xi.z);
        match self {
            ElementShape::Tet4 => vec![1.0 - r - s - t, r, s, t],
            ElementShape::Hex8 => HEX8_REFERENCE_COORDS
                .iter()
                .map(|[ri, si, ti]| (1.0 + ri * r) * (1.0 + si * s) * (1.0 + ti * t) / 8.0)
                .collect(),
            ElementShape::Wedge6 => {
                let tri = [1.0 - r - s, r, s];
                let bottom = tri.iter().map(|l| l * (1.0 - t) / 2.0);
                let top = tri.iter().map(|l| l * (1.0 + t) / 2.0);
                bottom.chain(top).collect()
            }
            ElementShape::Pyramid5 => {
                let c = pyramid_regularized_height(t);
                let mut phi: Vec<f64> = QUAD4_REFERENCE_COORDS
                    .iter()
                    .map(|[ri, si]| (c + ri * r) * (c + si * s) / (4.0 * c))
                    .collect();
                phi.push(t);
                phi
            }
        }
    }

    /// Gradients of the basis functions with respect to reference coordinates.
    pub fn gradients(&self, xi: &Vector3<f64>) -> Vec<Vector3<f64>> {
        let (r, s, t) = (xi.x, xi.y, xi.z);
        match self {
            ElementShape::Tet4 => vec![
                Vector3::new(-1.0, -1.0, -1.0),
                Vector3::x(),
                Vector3::y(),
                Vector3::z(),
            ],
            ElementShape::Hex8 => HEX8_REFERENCE_COORDS
                .iter()
                .map(|[ri, si, ti]| {
                    Vector3::new(
                        ri * (1.0 + si * s) * (1.0 + ti * t),
                        (1.0 + ri * r) * si * (1.0 + ti * t),
                        (1.0 + ri * r) * (1.0 + si * s) * ti,
                    ) / 8.0
                })
                .collect(),
            ElementShape::Wedge6 => {
                let tri = [1.0 - r - s, r, s];
                let tri_gradients = [[-1.0, -1.0], [1.0, 0.0], [0.0, 1.0]];
                let bottom = tri
                    .iter()
                    .zip(&tri_gradients)
                    .map(|(l, [dr, ds])| Vector3::new(dr * (1.0 - t), ds * (1.0 - t), -l) / 2.0);
                let top = tri
                    .iter()
                    .zip(&tri_gradients)
                    .map(|(l, [dr, ds])| Vector3::new(dr * (1.0 + t), ds * (1.0 + t), *l) / 2.0);
                bottom.chain(top).collect()
            }
            ElementShape::Pyramid5 => {
                let c = pyramid_regularized_height(t);
                let mut gradients: Vec<_> = QUAD4_REFERENCE_COORDS
                    .iter()
                    .map(|[ri, si]| {
                        let a = c + ri * r;
                        let b = c + si * s;
                        Vector3::new(
                            ri * b / (4.0 * c),
                            si * a / (4.0 * c),
                            (a * b - (a + b) * c) / (4.0 * c * c),
                        )
                    })
                    .collect();
                gradients.push(Vector3::z());
                gradients
            }
        }
    }
}

/// `1 - t`, kept away from zero at the apex of the pyramid.
fn pyramid_regularized_height(t: f64) -> f64 {
    let c = 1.0 - t;
    if c.abs() < 1e-12 {
        1e-12_f64.copysign(c)
    } else {
        c
    }
}

impl SideShape {
    pub fn num_nodes(&self) -> usize {
        match self {
            SideShape::Tri3 => 3,
            SideShape::Quad4 => 4,
        }
    }

    pub fn from_num_nodes(num_nodes: usize) -> Option<Self> {
        match num_nodes {
            3 => Some(SideShape::Tri3),
            4 => Some(SideShape::Quad4),
            _ => None,
        }
    }

    pub fn reference_center(&self) -> Vector3<f64> {
        match self {
            SideShape::Tri3 => Vector3::new(1.0 / 3.0, 1.0 / 3.0, 0.0),
            SideShape::Quad4 => Vector3::zeros(),
        }
    }

    /// Tests the in-plane reference coordinates `(r, s)` of `xi`.
    pub fn contains_reference_point(&self, xi: &Vector3<f64>, tolerance: f64) -> bool {
        let (r, s) = (xi.x, xi.y);
        match self {
            SideShape::Tri3 => r >= -tolerance && s >= -tolerance && r + s <= 1.0 + tolerance,
            SideShape::Quad4 => r.abs() <= 1.0 + tolerance && s.abs() <= 1.0 + tolerance,
        }
    }

    pub fn evaluate_basis(&self, r: f64, s: f64) -> Vec<f64> {
        match self {
            SideShape::Tri3 => vec![1.0 - r - s, r, s],
            SideShape::Quad4 => QUAD4_REFERENCE_COORDS
                .iter()
                .map(|[ri, si]| (1.0 + ri * r) * (1.0 + si * s) / 4.0)
                .collect(),
        }
    }

    /// Gradients `(d/dr, d/ds)` of the basis functions.
    pub fn gradients(&self, r: f64, s: f64) -> Vec<[f64; 2]> {
        match self {
            SideShape::Tri3 => vec![[-1.0, -1.0], [1.0, 0.0], [0.0, 1.0]],
            SideShape::Quad4 => QUAD4_REFERENCE_COORDS
                .iter()
                .map(|[ri, si]| [ri * (1.0 + si * s) / 4.0, (1.0 + ri * r) * si / 4.0])
                .collect(),
        }
    }
}

/// A map from reference coordinates to physical coordinates.
pub trait ReferenceMap {
    fn map_reference_coords(&self, xi: &Vector3<f64>) -> Point3<f64>;

    fn reference_jacobian(&self, xi: &Vector3<f64>) -> Matrix3<f64>;

    /// Representative length scale, used to make tolerances relative.
    fn diameter(&self) -> f64;

    fn initial_guess(&self) -> Vector3<f64>;
}

/// Physical realization of an element shape.
#[derive(Debug, Clone)]
pub struct ElementGeometry<'a> {
    shape: ElementShape,
    vertices: &'a [Point3<f64>],
}

impl<'a> ElementGeometry<'a> {
    pub fn new(shape: ElementShape, vertices: &'a [Point3<f64>]) -> Self {
        assert_eq!(vertices.len(), shape.num_nodes(), "Vertex count must match shape");
        Self { shape, vertices }
    }

    pub fn shape(&self) -> ElementShape {
        self.shape
    }
}

impl ReferenceMap for ElementGeometry<'_> {
    fn map_reference_coords(&self, xi: &Vector3<f64>) -> Point3<f64> {
        let phi = self.shape.evaluate_basis(xi);
        let x = self
            .vertices
            .iter()
            .zip(phi)
            .fold(Vector3::zeros(), |x, (v, phi_i)| x + v.coords * phi_i);
        Point3::from(x)
    }

    fn reference_jacobian(&self, xi: &Vector3<f64>) -> Matrix3<f64> {
        self.vertices
            .iter()
            .zip(self.shape.gradients(xi))
            .fold(Matrix3::zeros(), |j, (v, grad)| j + v.coords * grad.transpose())
    }

    fn diameter(&self) -> f64 {
        diameter(self.vertices)
    }

    fn initial_guess(&self) -> Vector3<f64> {
        self.shape.reference_center()
    }
}

/// Physical realization of a planar side, extruded along its unit normal.
///
/// The third reference coordinate is the signed distance along the normal, so that the
/// inverse map yields `(r, s, t)` with `t` the distance of the point from the side.
#[derive(Debug, Clone)]
pub struct SideGeometry<'a> {
    shape: SideShape,
    vertices: &'a [Point3<f64>],
    normal: Vector3<f64>,
}

impl<'a> SideGeometry<'a> {
    pub fn new(shape: SideShape, vertices: &'a [Point3<f64>], normal: Vector3<f64>) -> Self {
        assert_eq!(vertices.len(), shape.num_nodes(), "Vertex count must match shape");
        Self {
            shape,
            vertices,
            normal,
        }
    }
}

impl ReferenceMap for SideGeometry<'_> {
    fn map_reference_coords(&self, xi: &Vector3<f64>) -> Point3<f64> {
        let phi = self.shape.evaluate_basis(xi.x, xi.y);
        let x = self
            .vertices
            .iter()
            .zip(phi)
            .fold(Vector3::zeros(), |x, (v, phi_i)| x + v.coords * phi_i);
        Point3::from(x + self.normal * xi.z)
    }

    fn reference_jacobian(&self, xi: &Vector3<f64>) -> Matrix3<f64> {
        let mut j = Matrix3::zeros();
        for (v, [dr, ds]) in self.vertices.iter().zip(self.shape.gradients(xi.x, xi.y)) {
            let mut column = j.column_mut(0);
            column += v.coords * dr;
            let mut column = j.column_mut(1);
            column += v.coords * ds;
        }
        j.set_column(2, &self.normal);
        j
    }

    fn diameter(&self) -> f64 {
        diameter(self.vertices)
    }

    fn initial_guess(&self) -> Vector3<f64> {
        self.shape.reference_center()
    }
}

fn diameter(vertices: &[Point3<f64>]) -> f64 {
    let mut d2 = 0.0_f64;
    for (i, a) in vertices.iter().enumerate() {
        for b in &vertices[i + 1..] {
            d2 = d2.max((b - a).norm_squared());
        }
    }
    d2.sqrt()
}
