use crate::{AxisAlignedBoundingBox3d, LineSegment3d, Plane};
use itertools::Itertools;
use nalgebra::{Point2, Point3, RealField, Scalar, Unit, Vector3};
use numeric_literals::replace_float_literals;

/// A planar, convex polygon in 3D.
///
/// Vertices are ordered counter-clockwise with respect to the polygon normal. The
/// polygon is not required to be exactly planar; the plane is the best fit given by
/// Newell's method.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarPolygon3d<T: Scalar> {
    vertices: Vec<Point3<T>>,
}

/// Orthonormal frame in the plane of a polygon, used to project it into 2D.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarFrame<T: Scalar> {
    origin: Point3<T>,
    u: Unit<Vector3<T>>,
    v: Unit<Vector3<T>>,
    normal: Unit<Vector3<T>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentPolygonIntersection<T: Scalar> {
    Disjoint,
    /// The segment crosses (or touches) the polygon in a single point.
    Point { parameter: T, point: Point3<T> },
    /// The segment lies in the plane of the polygon.
    Coplanar,
}

impl<T: Scalar> PlanarPolygon3d<T> {
    pub fn from_vertices(vertices: Vec<Point3<T>>) -> Self {
        Self { vertices }
    }

    pub fn vertices(&self) -> &[Point3<T>] {
        &self.vertices
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Iterates over the edges of the polygon, including the closing edge.
    pub fn edges(&self) -> impl '_ + Iterator<Item = LineSegment3d<T>> {
        self.vertices
            .iter()
            .chain(self.vertices.first())
            .tuple_windows()
            .map(|(a, b)| LineSegment3d::from_end_points([a.clone(), b.clone()]))
    }
}

impl<T: RealField> PlanarPolygon3d<T> {
    /// Vector normal to the polygon whose magnitude is the polygon area.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn area_vector(&self) -> Vector3<T> {
        let mut area_vector = Vector3::zeros();
        for (a, b) in self.vertices.iter().chain(self.vertices.first()).tuple_windows() {
            // Newell's method
            area_vector.x += (a.y.clone() - b.y.clone()) * (a.z.clone() + b.z.clone());
            area_vector.y += (a.z.clone() - b.z.clone()) * (a.x.clone() + b.x.clone());
            area_vector.z += (a.x.clone() - b.x.clone()) * (a.y.clone() + b.y.clone());
        }
        area_vector * 0.5
    }

    pub fn area(&self) -> T {
        self.area_vector().norm()
    }

    pub fn normal(&self) -> Option<Unit<Vector3<T>>> {
        Unit::try_new(self.area_vector(), T::default_epsilon())
    }

    pub fn centroid(&self) -> Option<Point3<T>> {
        if self.vertices.is_empty() {
            return None;
        }
        let n = T::from_usize(self.vertices.len()).unwrap();
        let sum = self
            .vertices
            .iter()
            .fold(Vector3::zeros(), |acc, v| acc + &v.coords);
        Some(Point3::from(sum / n))
    }

    pub fn plane(&self) -> Option<Plane<T>> {
        let normal = self.normal()?;
        Some(Plane::from_point_and_normal(self.centroid()?, normal))
    }

    pub fn bounding_box(&self) -> Option<AxisAlignedBoundingBox3d<T>> {
        AxisAlignedBoundingBox3d::from_points(&self.vertices)
    }

    pub fn frame(&self) -> Option<PlanarFrame<T>> {
        let normal = self.normal()?;
        let origin = self.vertices.first()?.clone();
        // The first edge that is not degenerate gives the in-plane axis
        let u = self
            .vertices
            .iter()
            .skip(1)
            .map(|v| v - &origin)
            .map(|e| &e - normal.as_ref() * normal.dot(&e))
            .find_map(|e| Unit::try_new(e, T::default_epsilon()))?;
        let v = Unit::new_normalize(normal.cross(u.as_ref()));
        Some(PlanarFrame { origin, u, v, normal })
    }

    /// Tests whether the point lies on the (convex) polygon, up to the given tolerance.
    pub fn contains_point(&self, point: &Point3<T>, tolerance: T) -> bool {
        let Some(normal) = self.normal() else {
            return false;
        };
        let x0 = &self.vertices[0];
        if normal.dot(&(point - x0)).abs() > tolerance {
            return false;
        }
        self.edges().all(|edge| {
            let e = edge.direction();
            let length = e.norm();
            if length == T::zero() {
                return true;
            }
            // Positive towards the interior for a counter-clockwise polygon
            let inward = normal.cross(&e) / length;
            inward.dot(&(point - edge.start())) >= -tolerance.clone()
        })
    }

    /// Intersects a line segment with the polygon.
    ///
    /// End points closer to the polygon plane than `tolerance` are snapped onto it, so an
    /// end point touching the polygon is reported with parameter exactly `0` or `1`.
    pub fn intersect_segment(&self, segment: &LineSegment3d<T>, tolerance: T) -> SegmentPolygonIntersection<T> {
        let Some(plane) = self.plane() else {
            return SegmentPolygonIntersection::Disjoint;
        };
        let d0 = plane.signed_distance(segment.start());
        let d1 = plane.signed_distance(segment.end());
        let on0 = d0.clone().abs() <= tolerance;
        let on1 = d1.clone().abs() <= tolerance;

        if on0 && on1 {
            return SegmentPolygonIntersection::Coplanar;
        }

        let (parameter, point) = if on0 {
            (T::zero(), segment.start().clone())
        } else if on1 {
            (T::one(), segment.end().clone())
        } else if d0.clone().signum() == d1.clone().signum() {
            return SegmentPolygonIntersection::Disjoint;
        } else {
            let t = d0.clone() / (d0 - d1);
            (t.clone(), segment.point_from_parameter(t))
        };

        if self.contains_point(&point, tolerance) {
            SegmentPolygonIntersection::Point { parameter, point }
        } else {
            SegmentPolygonIntersection::Disjoint
        }
    }

    /// Points where a segment lying in the plane of the polygon enters or leaves it.
    ///
    /// These are the end points of the segment that lie on the polygon and the crossings of
    /// the segment with the polygon boundary.
    pub fn intersect_coplanar_segment(&self, segment: &LineSegment3d<T>, tolerance: T) -> Vec<Point3<T>> {
        let mut hits = Vec::new();
        for end in [segment.start(), segment.end()] {
            if self.contains_point(end, tolerance.clone()) {
                hits.push(end.clone());
            }
        }

        let length = segment.length();
        for edge in self.edges() {
            let Some((s, t)) = segment.closest_parameters(&edge) else {
                continue;
            };
            let s_slack = tolerance.clone() / length.clone();
            let t_slack = tolerance.clone() / edge.length();
            let in_range = |p: &T, slack: &T| *p >= -slack.clone() && *p <= T::one() + slack.clone();
            if !in_range(&s, &s_slack) || !in_range(&t, &t_slack) {
                continue;
            }
            let x = segment.point_from_parameter(s.clamp(T::zero(), T::one()));
            let y = edge.point_from_parameter(t.clamp(T::zero(), T::one()));
            let is_new = hits.iter().all(|hit| (hit - &x).norm() > tolerance);
            if (&x - y).norm() <= tolerance && is_new {
                hits.push(x);
            }
        }
        hits
    }
}

impl<T: RealField> PlanarFrame<T> {
    pub fn normal(&self) -> &Unit<Vector3<T>> {
        &self.normal
    }

    pub fn to_local(&self, point: &Point3<T>) -> Point2<T> {
        let d = point - &self.origin;
        Point2::new(self.u.dot(&d), self.v.dot(&d))
    }

    pub fn to_global(&self, point: &Point2<T>) -> Point3<T> {
        &self.origin + self.u.as_ref() * point.x.clone() + self.v.as_ref() * point.y.clone()
    }
}
