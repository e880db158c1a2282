use crate::{add_horizontal_cutter, add_unit_hex8, cells_with_position};
use matrixcompare::assert_scalar_eq;
use nalgebra::{Point3, Vector3};
use std::collections::BTreeSet;
use xcut::mesh::Mesh;
use xcut::shape::{CellType, ElementShape, SideShape};
use xcut::{CutError, CutOptions, MeshIntersection, Position};

#[test]
fn hex8_cut_by_horizontal_plane_yields_two_cells() {
    let mut intersection = MeshIntersection::new(CutOptions::default());
    add_unit_hex8(&mut intersection, 1, [1, 2, 3, 4, 5, 6, 7, 8], Vector3::zeros());
    add_horizontal_cutter(&mut intersection, 100, 0.5, [-1.0, -1.0], [2.0, 2.0]);
    intersection.cut().unwrap();

    let mesh = intersection.mesh();
    let element = intersection.element_id(1).unwrap();
    assert!(mesh.element_is_cut(element));

    let cut_points = mesh.element_cut_points(element);
    assert_eq!(cut_points.len(), 4);
    for point in &cut_points {
        assert_scalar_eq!(mesh.point(*point).coordinates().z, 0.5, comp = abs, tol = 1e-14);
        assert_eq!(mesh.point(*point).position(), Position::OnCutSurface);
    }

    let inside = cells_with_position(&intersection, element, Position::Inside);
    let outside = cells_with_position(&intersection, element, Position::Outside);
    assert_eq!(inside.len(), 1);
    assert_eq!(outside.len(), 1);
    assert_eq!(mesh.element(element).volume_cells().len(), 2);

    for cell in [inside[0], outside[0]] {
        assert_scalar_eq!(mesh.volume_cell_volume(cell), 0.5, comp = abs, tol = 1e-12);
        let integrated: f64 = mesh
            .volume_cell(cell)
            .integration_cells()
            .iter()
            .map(|ic| mesh.integration_cell(*ic).volume())
            .sum();
        assert_scalar_eq!(integrated, 0.5, comp = abs, tol = 1e-12);
        assert_eq!(mesh.volume_cell(cell).boundary_cells().len(), 1);
    }
    assert!(mesh.volume_cell_centroid(inside[0]).z < 0.5);
    assert!(mesh.volume_cell_centroid(outside[0]).z > 0.5);

    // Both cells share the boundary cell on the cut square
    let boundary_cells = mesh.element_boundary_cells(element);
    assert_eq!(boundary_cells.len(), 1);
    let boundary_cell = mesh.boundary_cell(boundary_cells[0]);
    assert_scalar_eq!(boundary_cell.area(), 1.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(boundary_cell.normal().z, 1.0, comp = abs, tol = 1e-12);
    assert_eq!(mesh.volume_cell(inside[0]).boundary_cells(), mesh.volume_cell(outside[0]).boundary_cells());

    for id in 1..=4 {
        let node = intersection.node_id(id).unwrap();
        assert_eq!(mesh.node_position(node), Position::Inside);
    }
    for id in 5..=8 {
        let node = intersection.node_id(id).unwrap();
        assert_eq!(mesh.node_position(node), Position::Outside);
    }
}

#[test]
fn hex8_lateral_sides_are_split_in_two_facets() {
    let mut intersection = MeshIntersection::new(CutOptions::default());
    add_unit_hex8(&mut intersection, 1, [1, 2, 3, 4, 5, 6, 7, 8], Vector3::zeros());
    let cutter = add_horizontal_cutter(&mut intersection, 100, 0.25, [-1.0, -1.0], [2.0, 2.0]);
    intersection.cut().unwrap();

    let mesh = intersection.mesh();
    let element = intersection.element_id(1).unwrap();
    let e = mesh.element(element);
    for side in e.sides() {
        let normal = mesh.side_polygon(*side).normal().unwrap();
        let expected = if normal.z.abs() > 0.5 { 1 } else { 2 };
        assert_eq!(mesh.side(*side).facets().len(), expected);
        assert_eq!(mesh.side_is_cut(*side), expected == 2);
    }
    let internal: Vec<_> = e
        .facets()
        .iter()
        .filter(|facet| mesh.facet(**facet).parent_side() == cutter)
        .collect();
    assert_eq!(internal.len(), 1);
    assert_eq!(mesh.facet(*internal[0]).position(), Position::OnCutSurface);
    assert_eq!(e.facets().len(), 2 + 4 * 2 + 1);

    let inside = cells_with_position(&intersection, element, Position::Inside);
    assert_scalar_eq!(mesh.volume_cell_volume(inside[0]), 0.25, comp = abs, tol = 1e-12);
}

#[test]
fn tet4_touched_at_apex_is_a_single_inside_cell() {
    let mut intersection = MeshIntersection::new(CutOptions::default());
    let vertices = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(0.0, 0.0, 1.0),
    ];
    intersection
        .add_element(1, &[1, 2, 3, 4], &vertices, CellType::Tet4)
        .unwrap();
    add_horizontal_cutter(&mut intersection, 100, 1.0, [-1.0, -1.0], [2.0, 2.0]);
    intersection.cut().unwrap();

    let mesh = intersection.mesh();
    let element = intersection.element_id(1).unwrap();
    assert!(mesh.element_is_cut(element));

    let apex = intersection.node_id(4).unwrap();
    assert_eq!(mesh.node_position(apex), Position::OnCutSurface);

    let cells: Vec<_> = mesh.element(element).volume_cells().iter().copied().collect();
    assert_eq!(cells.len(), 1);
    assert_eq!(mesh.volume_cell(cells[0]).position(), Position::Inside);
    assert_eq!(mesh.volume_cell(cells[0]).facets().len(), 4);
    assert!(mesh.volume_cell(cells[0]).boundary_cells().is_empty());
    assert_scalar_eq!(mesh.volume_cell_volume(cells[0]), 1.0 / 6.0, comp = abs, tol = 1e-14);

    let integration_cells = mesh.element_integration_cells(element);
    assert_eq!(integration_cells.len(), 1);
    assert_scalar_eq!(
        mesh.integration_cell(integration_cells[0]).volume(),
        1.0 / 6.0,
        comp = abs,
        tol = 1e-14
    );
}

#[test]
fn element_far_from_cutter_is_not_cut() {
    let mut mesh = Mesh::new(CutOptions::default());
    let nodes: Vec<_> = xcut::proptest::unit_cube_vertices()
        .iter()
        .enumerate()
        .map(|(i, x)| mesh.new_node(i as i64, x))
        .collect();
    let element = mesh.new_element(1, ElementShape::Hex8, nodes).unwrap();
    let cutter_nodes = [
        Point3::new(10.0, 10.0, 10.0),
        Point3::new(11.0, 10.0, 10.0),
        Point3::new(11.0, 11.0, 10.0),
        Point3::new(10.0, 11.0, 10.0),
    ]
    .iter()
    .enumerate()
    .map(|(i, x)| mesh.new_node(100 + i as i64, x))
    .collect();
    let cutter = mesh
        .new_side(cutter_nodes, SideShape::Quad4, true, Some(100))
        .unwrap();

    assert!(!mesh.cut_element(element, cutter).unwrap());
    assert!(mesh.element(element).cut_faces().is_empty());

    mesh.element_make_facets(element).unwrap();
    mesh.element_find_node_positions(element).unwrap();
    mesh.element_make_volume_cells(element).unwrap();
    mesh.find_facet_positions().unwrap();

    assert!(!mesh.element_is_cut(element));
    let cells: Vec<_> = mesh.element(element).volume_cells().iter().copied().collect();
    assert_eq!(cells.len(), 1);
    assert_eq!(mesh.volume_cell(cells[0]).position(), Position::Outside);
    assert_eq!(mesh.volume_cell(cells[0]).facets().len(), 6);
}

#[test]
fn uncut_cell_takes_configured_default_position() {
    let options = CutOptions::default().with_default_position(Position::Inside);
    let mut intersection = MeshIntersection::new(options);
    add_unit_hex8(&mut intersection, 1, [1, 2, 3, 4, 5, 6, 7, 8], Vector3::zeros());
    add_horizontal_cutter(&mut intersection, 100, 5.0, [-1.0, -1.0], [2.0, 2.0]);
    intersection.cut().unwrap();

    let element = intersection.element_id(1).unwrap();
    let inside = cells_with_position(&intersection, element, Position::Inside);
    assert_eq!(inside.len(), 1);
}

#[test]
fn cutting_after_facets_are_built_is_rejected() {
    let mut mesh = Mesh::new(CutOptions::default());
    let nodes: Vec<_> = xcut::proptest::unit_cube_vertices()
        .iter()
        .enumerate()
        .map(|(i, x)| mesh.new_node(i as i64, x))
        .collect();
    let element = mesh.new_element(1, ElementShape::Hex8, nodes).unwrap();
    let cutter_nodes = [
        Point3::new(-1.0, -1.0, 0.5),
        Point3::new(2.0, -1.0, 0.5),
        Point3::new(2.0, 2.0, 0.5),
        Point3::new(-1.0, 2.0, 0.5),
    ]
    .iter()
    .enumerate()
    .map(|(i, x)| mesh.new_node(100 + i as i64, x))
    .collect();
    let cutter = mesh
        .new_side(cutter_nodes, SideShape::Quad4, true, Some(100))
        .unwrap();

    mesh.element_make_facets(element).unwrap();
    let result = mesh.cut_element(element, cutter);
    assert!(matches!(result, Err(CutError::PhaseViolation { .. })));
}

#[test]
fn cutter_node_inside_element_is_registered() {
    // A small cutter side lying entirely inside the element
    let mut mesh = Mesh::new(CutOptions::default());
    let nodes: Vec<_> = xcut::proptest::unit_cube_vertices()
        .iter()
        .enumerate()
        .map(|(i, x)| mesh.new_node(i as i64, x))
        .collect();
    let element = mesh.new_element(1, ElementShape::Hex8, nodes).unwrap();
    let cutter_nodes: Vec<_> = [
        Point3::new(0.25, 0.25, 0.5),
        Point3::new(0.75, 0.25, 0.5),
        Point3::new(0.5, 0.75, 0.5),
    ]
    .iter()
    .enumerate()
    .map(|(i, x)| mesh.new_node(100 + i as i64, x))
    .collect();
    let cutter = mesh
        .new_side(cutter_nodes.clone(), SideShape::Tri3, true, Some(100))
        .unwrap();

    assert!(mesh.cut_element(element, cutter).unwrap());
    for node in cutter_nodes {
        let point = mesh.node(node).point();
        assert!(mesh.point_is_cut_by_element(point, element));
    }
    // The three cutter edges lie inside the element
    assert_eq!(mesh.side(cutter).element_lines(element).len(), 3);
}

#[test]
fn tet4_point_inside_uses_reference_coordinates() {
    let mut mesh = Mesh::new(CutOptions::default());
    let vertices = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
        Point3::new(0.0, 2.0, 0.0),
        Point3::new(0.0, 0.0, 2.0),
    ];
    let nodes: Vec<_> = vertices
        .iter()
        .enumerate()
        .map(|(i, x)| mesh.new_node(i as i64, x))
        .collect();
    let element = mesh.new_element(1, ElementShape::Tet4, nodes).unwrap();

    let inside = mesh.new_point(&Point3::new(0.4, 0.4, 0.4));
    // Inside the bounding box but outside the tetrahedron
    let outside = mesh.new_point(&Point3::new(1.5, 1.5, 1.5));
    let on_face = mesh.new_point(&Point3::new(1.0, 1.0, 0.0));
    assert!(mesh.element_point_inside(element, inside));
    assert!(!mesh.element_point_inside(element, outside));
    assert!(mesh.element_point_inside(element, on_face));

    let xi = mesh
        .element_local_coordinates(element, &Point3::new(0.4, 0.4, 0.4))
        .unwrap();
    assert_scalar_eq!(xi.x, 0.2, comp = abs, tol = 1e-12);
    assert_scalar_eq!(xi.y, 0.2, comp = abs, tol = 1e-12);
    assert_scalar_eq!(xi.z, 0.2, comp = abs, tol = 1e-12);
}

#[test]
fn points_within_tolerance_are_merged() {
    let mut mesh = Mesh::new(CutOptions::default());
    let a = mesh.new_point(&Point3::new(1.0, 2.0, 3.0));
    let b = mesh.new_point(&Point3::new(1.0 + 1e-12, 2.0, 3.0));
    let c = mesh.new_point(&Point3::new(1.0 + 1e-6, 2.0, 3.0));
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(mesh.points().len(), 2);
}

#[test]
fn neighboring_elements_share_sides_and_edges() {
    let mut intersection = MeshIntersection::new(CutOptions::default());
    let left = add_unit_hex8(&mut intersection, 1, [1, 2, 3, 4, 5, 6, 7, 8], Vector3::zeros());
    let right = add_unit_hex8(&mut intersection, 2, [2, 9, 10, 3, 6, 11, 12, 7], Vector3::x());

    let mesh = intersection.mesh();
    assert_eq!(mesh.nodes().len(), 12);
    assert_eq!(mesh.sides().len(), 11);
    assert_eq!(mesh.edges().len(), 20);
    let shared: Vec<_> = mesh
        .element(left)
        .sides()
        .iter()
        .filter(|side| mesh.element(right).sides().contains(*side))
        .collect();
    assert_eq!(shared.len(), 1);
    assert_eq!(mesh.side(*shared[0]).elements().len(), 2);
}

#[test]
fn cutter_on_element_face_leaves_a_single_cell() {
    let mut intersection = MeshIntersection::new(CutOptions::default());
    let element = add_unit_hex8(&mut intersection, 1, [1, 2, 3, 4, 5, 6, 7, 8], Vector3::zeros());
    let cutter = add_horizontal_cutter(&mut intersection, 100, 1.0, [-1.0, -1.0], [2.0, 2.0]);
    intersection.cut().unwrap();

    let mesh = intersection.mesh();
    let cells: Vec<_> = mesh.element(element).volume_cells().iter().copied().collect();
    assert_eq!(cells.len(), 1);
    assert_eq!(mesh.volume_cell(cells[0]).position(), Position::Inside);
    assert_scalar_eq!(mesh.volume_cell_volume(cells[0]), 1.0, comp = abs, tol = 1e-12);

    // The top face is the cut facet, no facet is added on the cutter
    assert_eq!(mesh.element(element).facets().len(), 6);
    assert!(mesh
        .element(element)
        .facets()
        .iter()
        .all(|facet| mesh.facet(*facet).parent_side() != cutter));

    let boundary_cells = mesh.element_boundary_cells(element);
    assert_eq!(boundary_cells.len(), 1);
    let boundary_cell = mesh.boundary_cell(boundary_cells[0]);
    assert_scalar_eq!(boundary_cell.area(), 1.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(boundary_cell.normal().z, 1.0, comp = abs, tol = 1e-12);
}

#[test]
fn element_finds_the_side_and_facet_holding_points() {
    let mut intersection = MeshIntersection::new(CutOptions::default());
    let element = add_unit_hex8(&mut intersection, 1, [1, 2, 3, 4, 5, 6, 7, 8], Vector3::zeros());
    add_horizontal_cutter(&mut intersection, 100, 0.5, [-1.0, -1.0], [2.0, 2.0]);
    intersection.cut().unwrap();

    let mesh = intersection.mesh();
    let point = |id| mesh.node(intersection.node_id(id).unwrap()).point();
    let top: BTreeSet<_> = [5, 6, 7, 8].map(point).into_iter().collect();
    let side = mesh.element_on_side(element, &top).unwrap();
    assert!(mesh.element(element).owns_side(side));
    let facet = mesh.element_facet_on_side(element, &top).unwrap();
    assert_eq!(mesh.facet(facet).parent_side(), side);

    // Corners of the split front side plus a cut point lie on one side but on no single facet
    let cut_point = mesh
        .element_cut_points(element)
        .into_iter()
        .find(|p| {
            let x = mesh.point(*p).coordinates();
            x.x.abs() < 1e-12 && x.y.abs() < 1e-12
        })
        .unwrap();
    let front: BTreeSet<_> = [point(1), point(2), point(5), point(6)].into_iter().collect();
    assert!(mesh.element_on_side(element, &front).is_some());
    assert!(mesh.element_facet_on_side(element, &front).is_none());
    let lower: BTreeSet<_> = [point(1), point(2), cut_point].into_iter().collect();
    assert!(mesh.element_on_side(element, &lower).is_some());

    let diagonal: BTreeSet<_> = [point(1), point(7)].into_iter().collect();
    assert!(mesh.element_on_side(element, &diagonal).is_none());
}

#[test]
fn wedge6_cut_halfway_up() {
    let mut intersection = MeshIntersection::new(CutOptions::default());
    let vertices = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(0.0, 0.0, 1.0),
        Point3::new(1.0, 0.0, 1.0),
        Point3::new(0.0, 1.0, 1.0),
    ];
    let element = intersection
        .add_element(1, &[1, 2, 3, 4, 5, 6], &vertices, CellType::Wedge6)
        .unwrap();
    add_horizontal_cutter(&mut intersection, 100, 0.5, [-1.0, -1.0], [2.0, 2.0]);
    intersection.cut().unwrap();

    let mesh = intersection.mesh();
    let inside = cells_with_position(&intersection, element, Position::Inside);
    let outside = cells_with_position(&intersection, element, Position::Outside);
    assert_eq!((inside.len(), outside.len()), (1, 1));
    assert_scalar_eq!(mesh.volume_cell_volume(inside[0]), 0.25, comp = abs, tol = 1e-12);
    assert_scalar_eq!(mesh.volume_cell_volume(outside[0]), 0.25, comp = abs, tol = 1e-12);

    let boundary_cells = mesh.element_boundary_cells(element);
    assert_eq!(boundary_cells.len(), 1);
    assert_scalar_eq!(mesh.boundary_cell(boundary_cells[0]).area(), 0.5, comp = abs, tol = 1e-12);
}

#[test]
fn pyramid5_cut_halfway_up() {
    let mut intersection = MeshIntersection::new(CutOptions::default());
    let vertices = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(0.5, 0.5, 1.0),
    ];
    let element = intersection
        .add_element(1, &[1, 2, 3, 4, 5], &vertices, CellType::Pyramid5)
        .unwrap();
    add_horizontal_cutter(&mut intersection, 100, 0.5, [-1.0, -1.0], [2.0, 2.0]);
    intersection.cut().unwrap();

    let mesh = intersection.mesh();
    let inside = cells_with_position(&intersection, element, Position::Inside);
    let outside = cells_with_position(&intersection, element, Position::Outside);
    assert_eq!((inside.len(), outside.len()), (1, 1));
    assert_scalar_eq!(mesh.volume_cell_volume(inside[0]), 7.0 / 24.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(mesh.volume_cell_volume(outside[0]), 1.0 / 24.0, comp = abs, tol = 1e-12);

    let apex = intersection.node_id(5).unwrap();
    assert_eq!(mesh.node_position(apex), Position::Outside);
}
