use crate::Plane;
use nalgebra::{Point3, RealField, Scalar, Vector3};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LineSegment3d<T: Scalar> {
    end_points: [Point3<T>; 2],
}

impl<T: Scalar> LineSegment3d<T> {
    pub fn from_end_points(end_points: [Point3<T>; 2]) -> Self {
        Self { end_points }
    }

    pub fn start(&self) -> &Point3<T> {
        &self.end_points[0]
    }

    pub fn end(&self) -> &Point3<T> {
        &self.end_points[1]
    }
}

impl<T: RealField> LineSegment3d<T> {
    pub fn direction(&self) -> Vector3<T> {
        &self.end_points[1] - &self.end_points[0]
    }

    pub fn length(&self) -> T {
        self.direction().norm()
    }

    pub fn midpoint(&self) -> Point3<T> {
        self.point_from_parameter(T::from_f64(0.5).unwrap())
    }

    pub fn project_point_parametric(&self, point: &Point3<T>) -> T {
        let a = &self.end_points[0].coords;
        let d = self.direction();
        let d2 = d.magnitude_squared();
        if d2 == T::zero() {
            // If the endpoints are the same, the segment collapses to a single point,
            // in which case e.g. t == 0 gives the correct solution.
            T::zero()
        } else {
            (&point.coords - a).dot(&d) / d2
        }
    }

    pub fn project_point(&self, point: &Point3<T>) -> Point3<T> {
        let t = self.project_point_parametric(point);
        if t <= T::zero() {
            self.end_points[0].clone()
        } else if t >= T::one() {
            self.end_points[1].clone()
        } else {
            self.point_from_parameter(t)
        }
    }

    pub fn distance_to_point(&self, point: &Point3<T>) -> T {
        (self.project_point(point) - point).norm()
    }

    pub fn point_from_parameter(&self, t: T) -> Point3<T> {
        let a = &self.end_points[0];
        let b = &self.end_points[1];
        Point3::from(&a.coords * (T::one() - t.clone()) + &b.coords * t)
    }

    /// Parameters of the closest points between the supporting lines of two segments.
    ///
    /// Returns `None` for (nearly) parallel segments. The parameters are not clamped.
    pub fn closest_parameters(&self, other: &LineSegment3d<T>) -> Option<(T, T)> {
        let d1 = self.direction();
        let d2 = other.direction();
        let r = &self.end_points[0] - &other.end_points[0];
        let a = d1.magnitude_squared();
        let e = d2.magnitude_squared();
        let b = d1.dot(&d2);
        let c = d1.dot(&r);
        let f = d2.dot(&r);
        let denom = a.clone() * e.clone() - b.clone() * b.clone();
        if denom.clone().abs() <= T::default_epsilon() * a.clone() * e.clone() {
            return None;
        }
        let s = (b.clone() * f.clone() - c.clone() * e.clone()) / denom.clone();
        let t = (a * f - b * c) / denom;
        Some((s, t))
    }

    /// Parameter of the intersection of the supporting line with the plane.
    ///
    /// Returns `None` if the segment is parallel to the plane. The parameter is not
    /// clamped to `[0, 1]`.
    pub fn intersect_plane_parametric(&self, plane: &Plane<T>) -> Option<T> {
        let d0 = plane.signed_distance(&self.end_points[0]);
        let d1 = plane.signed_distance(&self.end_points[1]);
        let denom = d0.clone() - d1;
        if denom == T::zero() {
            None
        } else {
            Some(d0 / denom)
        }
    }
}
