use crate::PlanarPolygon3d;
use nalgebra::{Point3, RealField, Vector3};
use numeric_literals::replace_float_literals;

/// Signed volume of the tetrahedron `abcd`, positive if `d` lies on the side of `abc` that
/// a counter-clockwise oriented `abc` faces.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn signed_tetrahedron_volume<T: RealField>(a: &Point3<T>, b: &Point3<T>, c: &Point3<T>, d: &Point3<T>) -> T {
    let ab = b - a;
    let ac = c - a;
    let ad = d - a;
    ab.cross(&ac).dot(&ad) / 6.0
}

#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn compute_polyhedron_volume_from_faces<'a, T>(boundary_faces: impl IntoIterator<Item = &'a PlanarPolygon3d<T>>) -> T
where
    T: RealField,
{
    // We use the formula given on the Wikipedia page for Polyhedra:
    // https://en.wikipedia.org/wiki/Polyhedron#Volume
    //
    // Faces must be consistently oriented (all outwards or all inwards).
    let mut volume = T::zero();
    for face in boundary_faces {
        // Ignore degenerate faces consisting of less than three vertices
        if face.num_vertices() > 2 {
            let x0 = &face.vertices()[0];
            volume += face.area_vector().dot(&x0.coords);
        }
    }

    volume.abs() / 3.0
}

/// Möller–Trumbore ray/triangle intersection.
///
/// Returns the ray parameter of the hit if the ray starting at `origin` hits the triangle
/// in front of the origin.
pub fn ray_triangle_intersection<T: RealField>(
    origin: &Point3<T>,
    direction: &Vector3<T>,
    [a, b, c]: [&Point3<T>; 3],
) -> Option<T> {
    let eps = T::default_epsilon();
    let e1 = b - a;
    let e2 = c - a;
    let p = direction.cross(&e2);
    let det = e1.dot(&p);
    if det.clone().abs() < eps {
        return None;
    }
    let inv_det = T::one() / det;
    let s = origin - a;
    let u = s.dot(&p) * inv_det.clone();
    if u < T::zero() || u > T::one() {
        return None;
    }
    let q = s.cross(&e1);
    let v = direction.dot(&q) * inv_det.clone();
    if v < T::zero() || u + v.clone() > T::one() {
        return None;
    }
    let t = e2.dot(&q) * inv_det;
    (t > eps).then_some(t)
}

/// Parity test for a point against a closed, triangulated surface.
///
/// The orientation of the triangles is irrelevant. The ray direction is fixed and skewed so
/// that hits on shared triangle edges are unlikely for axis-aligned input.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn point_in_closed_surface<'a, T, I>(point: &Point3<T>, triangles: I) -> bool
where
    T: RealField,
    I: IntoIterator<Item = [&'a Point3<T>; 3]>,
{
    let direction = Vector3::new(0.5773502691896258, 0.6172133998483676, 0.5345224838248488);
    let crossings = triangles
        .into_iter()
        .filter(|triangle| ray_triangle_intersection(point, &direction, *triangle).is_some())
        .count();
    crossings % 2 == 1
}
