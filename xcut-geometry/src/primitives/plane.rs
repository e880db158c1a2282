use nalgebra::{Point3, RealField, Scalar, Unit, Vector3};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Plane<T: Scalar> {
    point: Point3<T>,
    normal: Unit<Vector3<T>>,
}

impl<T> Plane<T>
where
    T: RealField,
{
    pub fn normal(&self) -> &Unit<Vector3<T>> {
        &self.normal
    }

    pub fn point(&self) -> &Point3<T> {
        &self.point
    }

    pub fn from_point_and_normal(point: Point3<T>, normal: Unit<Vector3<T>>) -> Self {
        Self { point, normal }
    }

    pub fn flipped(&self) -> Self {
        Self {
            point: self.point.clone(),
            normal: Unit::new_unchecked(-self.normal.clone().into_inner()),
        }
    }

    /// Signed distance from the plane, positive on the side the normal points to.
    pub fn signed_distance(&self, point: &Point3<T>) -> T {
        self.normal.dot(&(point - &self.point))
    }

    pub fn project_point(&self, point: &Point3<T>) -> Point3<T> {
        point - self.normal.as_ref() * self.signed_distance(point)
    }

    /// Direction of the intersection line of two planes, or `None` if they are parallel.
    pub fn intersection_direction(&self, other: &Plane<T>, tolerance: T) -> Option<Unit<Vector3<T>>> {
        let dir = self.normal.cross(other.normal.as_ref());
        Unit::try_new(dir, tolerance)
    }
}
