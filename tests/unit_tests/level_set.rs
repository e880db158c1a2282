use crate::cells_with_position;
use matrixcompare::assert_scalar_eq;
use nalgebra::{Point3, Vector3};
use xcut::mesh::{ElementId, Mesh};
use xcut::proptest::unit_cube_vertices;
use xcut::shape::{CellType, ElementShape};
use xcut::{CutError, CutOptions, MeshIntersection, Position};

fn add_level_set_hex8<F>(
    intersection: &mut MeshIntersection,
    id: i64,
    node_ids: [i64; 8],
    offset: Vector3<f64>,
    field: F,
) -> ElementId
where
    F: Fn(&Point3<f64>) -> f64,
{
    let vertices = unit_cube_vertices().map(|x| x + offset);
    let values = vertices.map(|x| field(&x));
    intersection
        .add_level_set_element(id, &node_ids, &vertices, &values, CellType::Hex8)
        .unwrap()
}

fn cut_unit_hex8<F: Fn(&Point3<f64>) -> f64>(field: F) -> (MeshIntersection, ElementId) {
    let mut intersection = MeshIntersection::new(CutOptions::default());
    let element = add_level_set_hex8(&mut intersection, 1, [1, 2, 3, 4, 5, 6, 7, 8], Vector3::zeros(), field);
    intersection.cut().unwrap();
    (intersection, element)
}

#[test]
fn horizontal_zero_level_splits_hex_in_half() {
    let (intersection, element) = cut_unit_hex8(|x| x.z - 0.5);
    let mesh = intersection.mesh();
    assert!(mesh.element_is_cut(element));

    let inside = cells_with_position(&intersection, element, Position::Inside);
    let outside = cells_with_position(&intersection, element, Position::Outside);
    assert_eq!((inside.len(), outside.len()), (1, 1));
    assert_scalar_eq!(mesh.volume_cell_volume(inside[0]), 0.5, comp = abs, tol = 1e-12);
    assert_scalar_eq!(mesh.volume_cell_volume(outside[0]), 0.5, comp = abs, tol = 1e-12);
    assert!(mesh.volume_cell_centroid(inside[0]).z < 0.5);

    let cut_points = mesh.element_cut_points(element);
    assert_eq!(cut_points.len(), 4);
    for point in &cut_points {
        assert_scalar_eq!(mesh.point(*point).coordinates().z, 0.5, comp = abs, tol = 1e-14);
    }

    let boundary_cells = mesh.element_boundary_cells(element);
    assert_eq!(boundary_cells.len(), 1);
    let boundary_cell = mesh.boundary_cell(boundary_cells[0]);
    assert_scalar_eq!(boundary_cell.area(), 1.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(boundary_cell.normal().z, 1.0, comp = abs, tol = 1e-12);
}

#[test]
fn oblique_zero_level_cuts_a_hexagon() {
    let (intersection, element) = cut_unit_hex8(|x| x.x + x.y + x.z - 1.5);
    let mesh = intersection.mesh();

    assert_eq!(mesh.element_cut_points(element).len(), 6);
    let inside = cells_with_position(&intersection, element, Position::Inside);
    let outside = cells_with_position(&intersection, element, Position::Outside);
    assert_eq!((inside.len(), outside.len()), (1, 1));
    assert_scalar_eq!(mesh.volume_cell_volume(inside[0]), 0.5, comp = abs, tol = 1e-12);
    assert_scalar_eq!(mesh.volume_cell_volume(outside[0]), 0.5, comp = abs, tol = 1e-12);

    let boundary_cells = mesh.element_boundary_cells(element);
    assert_eq!(boundary_cells.len(), 1);
    let boundary_cell = mesh.boundary_cell(boundary_cells[0]);
    assert_scalar_eq!(boundary_cell.area(), 3.0 * 3.0_f64.sqrt() / 4.0, comp = abs, tol = 1e-12);
    let expected = Vector3::repeat(1.0).normalize();
    assert_scalar_eq!(boundary_cell.normal().dot(&expected), 1.0, comp = abs, tol = 1e-12);
}

#[test]
fn saddle_cuts_off_two_inside_corners() {
    let (intersection, element) = cut_unit_hex8(|x| (x.x - 0.5) * (x.y - 0.5));
    let mesh = intersection.mesh();

    assert_eq!(mesh.element(element).volume_cells().len(), 3);
    let inside = cells_with_position(&intersection, element, Position::Inside);
    let outside = cells_with_position(&intersection, element, Position::Outside);
    assert_eq!((inside.len(), outside.len()), (2, 1));
    for cell in inside {
        assert_scalar_eq!(mesh.volume_cell_volume(cell), 0.125, comp = abs, tol = 1e-12);
        assert_eq!(mesh.volume_cell(cell).boundary_cells().len(), 1);
    }
    assert_scalar_eq!(mesh.volume_cell_volume(outside[0]), 0.75, comp = abs, tol = 1e-12);
    assert_eq!(mesh.volume_cell(outside[0]).boundary_cells().len(), 2);
}

#[test]
fn zero_level_on_element_face_leaves_a_single_cell() {
    let (intersection, element) = cut_unit_hex8(|x| x.z);
    let mesh = intersection.mesh();

    let cells: Vec<_> = mesh.element(element).volume_cells().iter().copied().collect();
    assert_eq!(cells.len(), 1);
    assert_eq!(mesh.volume_cell(cells[0]).position(), Position::Outside);
    assert_scalar_eq!(mesh.volume_cell_volume(cells[0]), 1.0, comp = abs, tol = 1e-12);
    assert_eq!(mesh.element(element).facets().len(), 6);
    for id in 1..=4 {
        let node = intersection.node_id(id).unwrap();
        assert_eq!(mesh.node_position(node), Position::OnCutSurface);
    }

    let boundary_cells = mesh.element_boundary_cells(element);
    assert_eq!(boundary_cells.len(), 1);
    assert_scalar_eq!(mesh.boundary_cell(boundary_cells[0]).normal().z, 1.0, comp = abs, tol = 1e-12);
}

#[test]
fn neighbors_share_the_split_common_face() {
    let field = |x: &Point3<f64>| x.z - 0.25;
    let mut intersection = MeshIntersection::new(CutOptions::default());
    let left = add_level_set_hex8(&mut intersection, 1, [1, 2, 3, 4, 5, 6, 7, 8], Vector3::zeros(), field);
    let right = add_level_set_hex8(&mut intersection, 2, [2, 9, 10, 3, 6, 11, 12, 7], Vector3::x(), field);
    intersection.cut().unwrap();

    let mesh = intersection.mesh();
    for element in [left, right] {
        let inside = cells_with_position(&intersection, element, Position::Inside);
        assert_eq!(inside.len(), 1);
        assert_scalar_eq!(mesh.volume_cell_volume(inside[0]), 0.25, comp = abs, tol = 1e-12);
        assert_eq!(mesh.element(element).volume_cells().len(), 2);
    }

    let node = mesh.node(intersection.node_id(2).unwrap());
    assert_eq!(node.num_dof_sets(), 2);
}

#[test]
fn level_set_input_is_checked() {
    let mut intersection = MeshIntersection::new(CutOptions::default());
    let vertices = unit_cube_vertices();
    let result = intersection.add_level_set_element(1, &[1, 2, 3, 4, 5, 6, 7, 8], &vertices, &[1.0; 7], CellType::Hex8);
    assert!(matches!(result, Err(CutError::InvalidInput(_))));

    add_level_set_hex8(&mut intersection, 1, [1, 2, 3, 4, 5, 6, 7, 8], Vector3::zeros(), |x| x.x - 0.5);
    let shifted = vertices.map(|x| x + Vector3::x());
    let values = [2.0; 8];
    let result = intersection.add_level_set_element(2, &[2, 9, 10, 3, 6, 11, 12, 7], &shifted, &values, CellType::Hex8);
    assert!(matches!(result, Err(CutError::InvalidInput(_))));
}

#[test]
fn level_set_cut_needs_values_and_unbuilt_facets() {
    let mut mesh = Mesh::new(CutOptions::default());
    let nodes: Vec<_> = unit_cube_vertices()
        .iter()
        .enumerate()
        .map(|(i, x)| mesh.new_node(i as i64, x))
        .collect();
    let element = mesh.new_element(1, ElementShape::Hex8, nodes.clone()).unwrap();

    let result = mesh.cut_element_level_set(element);
    assert!(matches!(result, Err(CutError::InvalidInput(_))));

    for node in &nodes {
        let z = mesh.point(mesh.node(*node).point()).coordinates().z;
        mesh.set_level_set_value(*node, z + 1.0).unwrap();
    }
    assert!(!mesh.cut_element_level_set(element).unwrap());
    assert!(mesh.element(element).cut_faces().is_empty());

    mesh.element_make_facets(element).unwrap();
    let result = mesh.cut_element_level_set(element);
    assert!(matches!(result, Err(CutError::PhaseViolation { .. })));
}
