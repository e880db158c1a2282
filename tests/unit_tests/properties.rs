use crate::add_unit_hex8;
use matrixcompare::assert_scalar_eq;
use nalgebra::{Point3, Vector3};
use proptest::prelude::*;
use std::collections::BTreeSet;
use xcut::geometry::{signed_tetrahedron_volume, Plane};
use xcut::mesh::{ElementId, Mesh, PointId, SideId};
use xcut::proptest::{plane_quad, tet4_vertices, unit_cube_cut_plane, unit_cube_vertices};
use xcut::shape::{CellType, ElementShape, SideShape};
use xcut::{CutOptions, MeshIntersection, Position};

fn cut_unit_cube(plane: &Plane<f64>) -> (MeshIntersection, ElementId) {
    let mut intersection = MeshIntersection::new(CutOptions::default());
    let element = add_unit_hex8(&mut intersection, 1, [1, 2, 3, 4, 5, 6, 7, 8], Vector3::zeros());
    let quad = plane_quad(plane, 3.0);
    intersection
        .add_cut_side(100, &[101, 102, 103, 104], &quad, CellType::Quad4)
        .unwrap();
    intersection.cut().unwrap();
    (intersection, element)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn plane_splits_unit_cube_into_inside_and_outside_cell(plane in unit_cube_cut_plane()) {
        let (intersection, element) = cut_unit_cube(&plane);
        let mesh = intersection.mesh();
        let cells: Vec<_> = mesh.element(element).volume_cells().iter().copied().collect();
        prop_assert_eq!(cells.len(), 2);

        let positions: Vec<_> = cells.iter().map(|cell| mesh.volume_cell(*cell).position()).collect();
        prop_assert!(positions.contains(&Position::Inside));
        prop_assert!(positions.contains(&Position::Outside));

        let mut total = 0.0;
        for cell in &cells {
            let volume = mesh.volume_cell_volume(*cell);
            prop_assert!(volume > 0.0);
            total += volume;

            let integrated: f64 = mesh
                .volume_cell(*cell)
                .integration_cells()
                .iter()
                .map(|ic| mesh.integration_cell(*ic).volume())
                .sum();
            assert_scalar_eq!(integrated, volume, comp = abs, tol = 1e-10);

            let distance = plane.signed_distance(&mesh.volume_cell_centroid(*cell));
            match mesh.volume_cell(*cell).position() {
                Position::Inside => prop_assert!(distance < 0.0),
                Position::Outside => prop_assert!(distance > 0.0),
                other => prop_assert!(false, "unexpected position {}", other),
            }
        }
        assert_scalar_eq!(total, 1.0, comp = abs, tol = 1e-10);
    }

    #[test]
    fn volume_cells_are_closed(plane in unit_cube_cut_plane()) {
        let (intersection, element) = cut_unit_cube(&plane);
        let mesh = intersection.mesh();
        for cell in mesh.element(element).volume_cells() {
            for (line, facets) in mesh.volume_cell(*cell).lines() {
                prop_assert_eq!(facets.len(), 2, "line {:?} of cell {}", line, cell);
            }
            // The cut polygon bounds both cells
            prop_assert_eq!(mesh.volume_cell(*cell).boundary_cells().len(), 1);
        }
        let facets: usize = mesh
            .element(element)
            .volume_cells()
            .iter()
            .map(|cell| mesh.volume_cell(*cell).facets().len())
            .sum();
        // Every facet bounds one cell, except the internal one which bounds both
        prop_assert_eq!(facets, mesh.element(element).facets().len() + 1);
    }

    #[test]
    fn lines_lie_on_all_their_sides(plane in unit_cube_cut_plane()) {
        let (intersection, _) = cut_unit_cube(&plane);
        let mesh = intersection.mesh();
        for line in mesh.lines() {
            let [a, b] = line.points();
            prop_assert!(!line.sides().is_empty());
            for side in line.sides() {
                prop_assert!(mesh.side(*side).points().contains(&a));
                prop_assert!(mesh.side(*side).points().contains(&b));
                prop_assert!(mesh.side(*side).lines().contains(&line.id()));
            }
        }
    }

    #[test]
    fn finding_node_positions_twice_changes_nothing(plane in unit_cube_cut_plane()) {
        let (intersection, element) = cut_unit_cube(&plane);
        let mut mesh = intersection.into_mesh();
        let before: Vec<_> = mesh.points().iter().map(|point| point.position()).collect();
        mesh.element_find_node_positions(element).unwrap();
        let after: Vec<_> = mesh.points().iter().map(|point| point.position()).collect();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn cut_points_lie_on_both_sides(plane in unit_cube_cut_plane(), half_width in 0.3..1.5) {
        let mut mesh = Mesh::new(CutOptions::default());
        let nodes: Vec<_> = unit_cube_vertices()
            .iter()
            .enumerate()
            .map(|(i, x)| mesh.new_node(i as i64, x))
            .collect();
        let element = mesh.new_element(1, ElementShape::Hex8, nodes).unwrap();
        let cutter_nodes = plane_quad(&plane, half_width)
            .iter()
            .enumerate()
            .map(|(i, x)| mesh.new_node(100 + i as i64, x))
            .collect();
        let cutter = mesh.new_side(cutter_nodes, SideShape::Quad4, true, Some(100)).unwrap();

        let tolerance = 1e-8;
        for side in mesh.element(element).sides().to_vec() {
            mesh.side_find_cut_points(element, side, cutter).unwrap();
            mesh.side_find_cut_points(element, cutter, side).unwrap();

            let cut_points = mesh.side_get_cut_points(side, cutter);
            prop_assert_eq!(&cut_points, &mesh.side_get_cut_points(cutter, side));

            // Side edges cut by the cutter and cutter edges cut by the side give the same points
            let edge_cut_points = |mesh: &Mesh, s: SideId, other: SideId| -> BTreeSet<PointId> {
                mesh.side(s)
                    .edges()
                    .iter()
                    .flat_map(|edge| mesh.edge(*edge).points().iter().copied())
                    .filter(|point| mesh.point(*point).is_cut(other))
                    .collect()
            };
            let by_cutter = edge_cut_points(&mesh, side, cutter);
            let by_side = edge_cut_points(&mesh, cutter, side);
            let union: BTreeSet<PointId> = by_cutter.union(&by_side).copied().collect();
            prop_assert_eq!(&cut_points, &union);

            let side_polygon = mesh.side_polygon(side);
            let cutter_polygon = mesh.side_polygon(cutter);
            for point in cut_points {
                let x = mesh.point(point).coordinates();
                prop_assert!(side_polygon.contains_point(x, tolerance));
                prop_assert!(cutter_polygon.contains_point(x, tolerance));
            }
        }
    }

    #[test]
    fn plane_through_tet4_centroid_preserves_volume(vertices in tet4_vertices(), normal in xcut::geometry::proptest::unit_vector3()) {
        let [a, b, c, d] = vertices;
        let centroid = Point3::from((a.coords + b.coords + c.coords + d.coords) / 4.0);
        let plane = Plane::from_point_and_normal(centroid, normal);
        let diameter = [b - a, c - a, d - a, c - b, d - b, d - c]
            .iter()
            .map(|e| e.norm())
            .fold(0.0, f64::max);

        let mut intersection = MeshIntersection::new(CutOptions::default());
        let element = intersection
            .add_element(1, &[1, 2, 3, 4], &vertices, CellType::Tet4)
            .unwrap();
        intersection
            .add_cut_side(100, &[101, 102, 103, 104], &plane_quad(&plane, 2.0 * diameter), CellType::Quad4)
            .unwrap();
        intersection.cut().unwrap();

        let mesh = intersection.mesh();
        let cells = mesh.element(element).volume_cells();
        prop_assert_eq!(cells.len(), 2);
        let total: f64 = cells.iter().map(|cell| mesh.volume_cell_volume(*cell)).sum();
        let expected = signed_tetrahedron_volume(&a, &b, &c, &d);
        assert_scalar_eq!(total, expected, comp = abs, tol = 1e-9 * expected.max(1.0));
    }

    #[test]
    fn tet4_contains_its_centroid(vertices in tet4_vertices()) {
        let mut mesh = Mesh::new(CutOptions::default());
        let nodes: Vec<_> = vertices
            .iter()
            .enumerate()
            .map(|(i, x)| mesh.new_node(i as i64, x))
            .collect();
        let element = mesh.new_element(1, ElementShape::Tet4, nodes).unwrap();
        let [a, b, c, d] = vertices;
        let centroid = Point3::from((a.coords + b.coords + c.coords + d.coords) / 4.0);
        let extent = mesh.element_bounding_box(element).unwrap().max_extent();

        let inside = mesh.new_point(&centroid);
        let outside = mesh.new_point(&(centroid + Vector3::x() * 2.0 * extent));
        prop_assert!(mesh.element_point_inside(element, inside));
        prop_assert!(!mesh.element_point_inside(element, outside));
    }
}
