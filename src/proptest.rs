//! Proptest strategies for elements and cut surfaces.
use crate::geometry::proptest::{point3, unit_vector3};
use crate::geometry::Plane;
use ::proptest::prelude::*;
use nalgebra::{Point3, Vector3};

/// Corner coordinates of the unit cube in hex8 node order.
pub fn unit_cube_vertices() -> [Point3<f64>; 8] {
    [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(0.0, 0.0, 1.0),
        Point3::new(1.0, 0.0, 1.0),
        Point3::new(1.0, 1.0, 1.0),
        Point3::new(0.0, 1.0, 1.0),
    ]
}

/// A square on the plane, centered at the plane point and counter-clockwise with respect to
/// the plane normal.
pub fn plane_quad(plane: &Plane<f64>, half_width: f64) -> [Point3<f64>; 4] {
    let normal = plane.normal();
    let helper = if normal.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
    let u = normal.cross(&helper).normalize() * half_width;
    let v = normal.cross(&u);
    let c = plane.point();
    [c - u - v, c + u - v, c + u + v, c - u + v]
}

/// Positively oriented tetrahedra: the fourth vertex lies on the side of the first three
/// that they face counter-clockwise.
pub fn tet4_vertices() -> impl Strategy<Value = [Point3<f64>; 4]> {
    [point3(), point3(), point3()]
        .prop_filter("Triangle too small", |[a, b, c]| (b - a).cross(&(c - a)).norm() > 1e-2)
        .prop_flat_map(|triangle| {
            // The apex is placed above the centroid, offset along the triangle sides
            let range = -1.0..1.0;
            (Just(triangle), [range.clone(), range], 0.5..10.0)
        })
        .prop_map(|([a, b, c], [s, t], height)| {
            let normal = (b - a).cross(&(c - a)).normalize();
            let centroid = Point3::from((a.coords + b.coords + c.coords) / 3.0);
            let apex = centroid + (b - a) * s + (c - a) * t + normal * height;
            [a, b, c, apex]
        })
}

/// Planes passing through the interior of the unit cube.
pub fn unit_cube_cut_plane() -> impl Strategy<Value = Plane<f64>> {
    let range = 0.1..0.9;
    ([range.clone(), range.clone(), range], unit_vector3())
        .prop_map(|([x, y, z], normal)| Plane::from_point_and_normal(Point3::new(x, y, z), normal))
}
