// Axis-aligned boxes used for first-person collision.

use crate::domain::math::{Ray, Vec3};
use crate::domain::object::ObjectId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center(center: Vec3, half: Vec3) -> Self {
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Strict intersection: boxes that only touch do not intersect.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }

    /// Distance along `ray` to the first hit, using the slab test.
    pub fn ray_hit(&self, ray: &Ray) -> Option<f32> {
        let mut t_min = 0.0f32;
        let mut t_max = f32::INFINITY;
        let axes = [
            (ray.origin.x, ray.direction.x, self.min.x, self.max.x),
            (ray.origin.y, ray.direction.y, self.min.y, self.max.y),
            (ray.origin.z, ray.direction.z, self.min.z, self.max.z),
        ];
        for (origin, dir, lo, hi) in axes {
            if dir.abs() <= f32::EPSILON {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / dir;
            let (t0, t1) = {
                let a = (lo - origin) * inv;
                let b = (hi - origin) * inv;
                if a < b { (a, b) } else { (b, a) }
            };
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

/// Who registered a collider, so each producer can clear only its own boxes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColliderSource {
    City,
    Object(ObjectId),
}

#[derive(Debug, Clone)]
pub struct Collider {
    pub source: ColliderSource,
    pub aabb: Aabb,
}

/// Flat list of solid boxes. Small enough that a linear scan per axis test is fine.
#[derive(Debug, Default)]
pub struct CollisionField {
    colliders: Vec<Collider>,
}

impl CollisionField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source: ColliderSource, aabb: Aabb) {
        self.colliders.push(Collider { source, aabb });
    }

    /// Replaces every collider registered by `source` with `aabb`.
    pub fn set(&mut self, source: ColliderSource, aabb: Aabb) {
        self.clear_source(&source);
        self.add(source, aabb);
    }

    pub fn clear_source(&mut self, source: &ColliderSource) {
        self.colliders.retain(|c| &c.source != source);
    }

    pub fn clear(&mut self) {
        self.colliders.clear();
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    pub fn count_from(&self, source: &ColliderSource) -> usize {
        self.colliders.iter().filter(|c| &c.source == source).count()
    }

    pub fn intersects(&self, volume: &Aabb) -> bool {
        self.colliders.iter().any(|c| c.aabb.intersects(volume))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box_at(x: f32) -> Aabb {
        Aabb::from_center(Vec3::new(x, 0.5, 0.0), Vec3::splat(0.5))
    }

    #[test]
    fn touching_boxes_do_not_intersect() {
        assert!(!unit_box_at(0.0).intersects(&unit_box_at(1.0)));
        assert!(unit_box_at(0.0).intersects(&unit_box_at(0.9)));
    }

    #[test]
    fn ray_hits_box_in_front_and_misses_box_behind() {
        let ray = Ray {
            origin: Vec3::new(-5.0, 0.5, 0.0),
            direction: Vec3::new(1.0, 0.0, 0.0),
        };
        let t = unit_box_at(0.0).ray_hit(&ray).expect("hit");
        assert!((t - 4.5).abs() < 1e-5);
        assert!(unit_box_at(-10.0).ray_hit(&ray).is_none());
    }

    #[test]
    fn clearing_a_source_keeps_other_colliders() {
        let mut field = CollisionField::new();
        field.add(ColliderSource::City, unit_box_at(0.0));
        field.add(ColliderSource::City, unit_box_at(3.0));
        field.add(ColliderSource::Object(ObjectId::from("a")), unit_box_at(6.0));

        field.clear_source(&ColliderSource::City);

        assert_eq!(field.len(), 1);
        assert!(field.intersects(&unit_box_at(6.2)));
        assert!(!field.intersects(&unit_box_at(0.0)));
    }

    #[test]
    fn setting_an_object_collider_replaces_the_previous_box() {
        let mut field = CollisionField::new();
        let source = ColliderSource::Object(ObjectId::from("a"));
        field.set(source.clone(), unit_box_at(0.0));
        field.set(source.clone(), unit_box_at(10.0));

        assert_eq!(field.count_from(&source), 1);
        assert!(!field.intersects(&unit_box_at(0.0)));
    }
}
