use glam::{Mat4, Vec3};

/// Axis-aligned bounding box. Always recomputed from geometry on demand,
/// never stored across a transform change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(point1: Vec3, point2: Vec3) -> Aabb {
        let min = point1.min(point2);
        let max = point1.max(point2);
        Aabb { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Aabb> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut aabb = Aabb {
            min: first,
            max: first,
        };

        for point in points {
            aabb.extend(point);
        }

        Some(aabb)
    }

    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn max_dimension(&self) -> f32 {
        self.size().max_element()
    }

    pub fn corners(&self) -> [Vec3; 8] {
        [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ]
    }

    /// Bounds of the transformed box: transform all 8 corners and re-take
    /// the min/max, since a rotated AABB is no longer axis-aligned.
    pub fn transform(&self, matrix: &Mat4) -> Aabb {
        let corners = self.corners().map(|corner| matrix.transform_point3(corner));

        Aabb::from_points(corners).unwrap()
    }

    #[allow(dead_code)]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn new_orders_corners() {
        let aabb = Aabb::new(Vec3::new(1.0, -2.0, 3.0), Vec3::new(-1.0, 2.0, -3.0));
        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn center_and_size() {
        let aabb = Aabb::new(Vec3::new(0.0, 10.0, -4.0), Vec3::new(2.0, 30.0, 4.0));
        assert_eq!(aabb.center(), Vec3::new(1.0, 20.0, 0.0));
        assert_eq!(aabb.size(), Vec3::new(2.0, 20.0, 8.0));
        assert_relative_eq!(aabb.max_dimension(), 20.0);
    }

    #[test]
    fn from_points_of_empty_iterator() {
        assert_eq!(Aabb::from_points(std::iter::empty()), None);
    }

    #[test]
    fn transform_scales_and_translates() {
        let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let matrix =
            Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)) * Mat4::from_scale(Vec3::splat(2.0));
        let transformed = aabb.transform(&matrix);

        assert_relative_eq!(transformed.min.x, 3.0);
        assert_relative_eq!(transformed.max.x, 7.0);
        assert_relative_eq!(transformed.min.y, -2.0);
        assert_relative_eq!(transformed.max.y, 2.0);
    }

    #[test]
    fn transform_with_rotation_stays_axis_aligned() {
        let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let matrix = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_4);
        let transformed = aabb.transform(&matrix);

        // A unit cube rotated 45 degrees around Y widens to sqrt(2) in x/z.
        assert_relative_eq!(transformed.max.x, 2.0_f32.sqrt(), epsilon = 1e-5);
        assert_relative_eq!(transformed.max.z, 2.0_f32.sqrt(), epsilon = 1e-5);
        assert_relative_eq!(transformed.max.y, 1.0);
    }
}
