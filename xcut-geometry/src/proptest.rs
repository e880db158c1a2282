//! Proptest strategies for geometric primitives.
use crate::{PlanarPolygon3d, Plane};
use nalgebra::{Point3, Unit, Vector3};
use proptest::prelude::*;
use std::f64::consts::PI;

pub fn point3() -> impl Strategy<Value = Point3<f64>> {
    // Pick a reasonably small range to pick coordinates from,
    // otherwise we can easily get floating point numbers that are
    // so ridiculously large as to break anything we might want to do with them
    let range = -10.0..10.0;
    [range.clone(), range.clone(), range].prop_map(|[x, y, z]| Point3::new(x, y, z))
}

pub fn unit_vector3() -> impl Strategy<Value = Unit<Vector3<f64>>> {
    let range = -1.0..1.0;
    [range.clone(), range.clone(), range]
        .prop_filter_map("Vector too short to normalize", |[x, y, z]| {
            Unit::try_new(Vector3::new(x, y, z), 1e-3)
        })
}

pub fn plane() -> impl Strategy<Value = Plane<f64>> {
    (point3(), unit_vector3()).prop_map(|(point, normal)| Plane::from_point_and_normal(point, normal))
}

/// Convex polygons obtained by sampling angles on a circle in an arbitrary plane.
///
/// The vertices are counter-clockwise with respect to the returned normal.
pub fn convex_polygon3d() -> impl Strategy<Value = (PlanarPolygon3d<f64>, Unit<Vector3<f64>>)> {
    let angles = proptest::collection::btree_set(0..64u32, 3..8);
    (point3(), unit_vector3(), 0.5..5.0, angles).prop_map(|(center, normal, radius, angles)| {
        let helper = if normal.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
        let u = normal.cross(&helper).normalize();
        let v = normal.cross(&u);
        let vertices = angles
            .into_iter()
            .map(|k| {
                let theta = 2.0 * PI * f64::from(k) / 64.0;
                center + (u * theta.cos() + v * theta.sin()) * radius
            })
            .collect();
        (PlanarPolygon3d::from_vertices(vertices), normal)
    })
}
