use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{Point3, Vector3};
use proptest::prelude::*;
use std::convert::TryFrom;
use xcut::geometry::PlanarPolygon3d;
use xcut::shape::{CellType, ElementGeometry, ElementShape, ReferenceMap, SideShape};
use xcut::CutError;

const SHAPES: [ElementShape; 4] = [
    ElementShape::Tet4,
    ElementShape::Hex8,
    ElementShape::Wedge6,
    ElementShape::Pyramid5,
];

fn reference_vertices(shape: ElementShape) -> Vec<Point3<f64>> {
    let coords: &[[f64; 3]] = match shape {
        ElementShape::Tet4 => &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        ElementShape::Hex8 => &[
            [-1.0, -1.0, -1.0],
            [1.0, -1.0, -1.0],
            [1.0, 1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [-1.0, -1.0, 1.0],
            [1.0, -1.0, 1.0],
            [1.0, 1.0, 1.0],
            [-1.0, 1.0, 1.0],
        ],
        ElementShape::Wedge6 => &[
            [0.0, 0.0, -1.0],
            [1.0, 0.0, -1.0],
            [0.0, 1.0, -1.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [0.0, 1.0, 1.0],
        ],
        ElementShape::Pyramid5 => &[
            [-1.0, -1.0, 0.0],
            [1.0, -1.0, 0.0],
            [1.0, 1.0, 0.0],
            [-1.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ],
    };
    coords.iter().map(|[x, y, z]| Point3::new(*x, *y, *z)).collect()
}

#[test]
fn basis_functions_are_nodal() {
    for shape in SHAPES {
        for (j, x_j) in reference_vertices(shape).iter().enumerate() {
            let phi = shape.evaluate_basis(&x_j.coords);
            assert_eq!(phi.len(), shape.num_nodes());
            for (i, phi_i) in phi.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_scalar_eq!(*phi_i, expected, comp = abs, tol = 1e-10);
            }
        }
    }
}

#[test]
fn faces_are_oriented_outwards() {
    for shape in SHAPES {
        let vertices = reference_vertices(shape);
        let centroid = Point3::from(vertices.iter().map(|x| x.coords).sum::<Vector3<f64>>() / vertices.len() as f64);
        for face in shape.faces() {
            let polygon = PlanarPolygon3d::from_vertices(face.iter().map(|i| vertices[*i]).collect());
            let normal = polygon.normal().unwrap();
            let face_centroid = polygon.centroid().unwrap();
            assert!(normal.dot(&(face_centroid - centroid)) > 0.0, "{:?} face {:?} points inwards", shape, face);
        }
    }
}

#[test]
fn reference_center_is_inside() {
    for shape in SHAPES {
        assert!(shape.contains_reference_point(&shape.reference_center(), 0.0));
    }
    assert!(!ElementShape::Tet4.contains_reference_point(&Vector3::new(0.5, 0.5, 0.5), 1e-10));
    assert!(!ElementShape::Hex8.contains_reference_point(&Vector3::new(0.0, 1.1, 0.0), 1e-10));
    assert!(ElementShape::Hex8.contains_reference_point(&Vector3::new(0.0, 1.0 + 1e-12, 0.0), 1e-10));
    assert!(!ElementShape::Pyramid5.contains_reference_point(&Vector3::new(0.9, 0.0, 0.5), 1e-10));
}

#[test]
fn only_linear_cells_are_accepted() {
    assert_eq!(ElementShape::try_from(CellType::Hex8).unwrap(), ElementShape::Hex8);
    assert_eq!(SideShape::try_from(CellType::Tri3).unwrap(), SideShape::Tri3);
    assert!(matches!(
        ElementShape::try_from(CellType::Hex20),
        Err(CutError::UnsupportedShape(CellType::Hex20))
    ));
    assert!(matches!(
        ElementShape::try_from(CellType::Quad4),
        Err(CutError::UnsupportedShape(CellType::Quad4))
    ));
    assert!(matches!(
        SideShape::try_from(CellType::Quad9),
        Err(CutError::UnsupportedShape(CellType::Quad9))
    ));
    for shape in SHAPES {
        assert_eq!(ElementShape::try_from(CellType::from(shape)).unwrap(), shape);
    }
}

#[test]
fn side_shape_from_node_count() {
    assert_eq!(SideShape::from_num_nodes(3), Some(SideShape::Tri3));
    assert_eq!(SideShape::from_num_nodes(4), Some(SideShape::Quad4));
    assert_eq!(SideShape::from_num_nodes(5), None);
}

fn point_in_hex_ref_domain() -> impl Strategy<Value = Vector3<f64>> {
    let r = -0.9..=0.9;
    [r.clone(), r.clone(), r].prop_map(|[x, y, z]| Vector3::new(x, y, z))
}

proptest! {
    #[test]
    fn basis_functions_sum_to_one(xi in point_in_hex_ref_domain()) {
        for shape in SHAPES {
            let xi = Vector3::new(xi.x.abs() / 2.0, xi.y.abs() / 2.0, xi.z.abs() / 2.0);
            let sum: f64 = shape.evaluate_basis(&xi).iter().sum();
            prop_assert!((sum - 1.0).abs() <= 1e-12);
            let gradient_sum: Vector3<f64> = shape.gradients(&xi).iter().sum();
            prop_assert!(gradient_sum.norm() <= 1e-12);
        }
    }

    #[test]
    fn jacobian_matches_finite_differences(xi in point_in_hex_ref_domain()) {
        let vertices: Vec<_> = reference_vertices(ElementShape::Hex8)
            .iter()
            .enumerate()
            .map(|(i, x)| x * 2.0 + Vector3::new(0.1 * i as f64, -0.05 * i as f64, 0.02 * (i * i) as f64))
            .collect();
        let geometry = ElementGeometry::new(ElementShape::Hex8, &vertices);
        let j = geometry.reference_jacobian(&xi);
        let h = 1e-6;
        for k in 0..3 {
            let mut dxi = Vector3::zeros();
            dxi[k] = h;
            let column = (geometry.map_reference_coords(&(xi + dxi)) - geometry.map_reference_coords(&(xi - dxi))) / (2.0 * h);
            assert_matrix_eq!(j.column(k), column, comp = abs, tol = 1e-8);
        }
    }
}
