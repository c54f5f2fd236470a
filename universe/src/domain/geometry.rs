// Procedural shape descriptors per object kind.

use crate::domain::collision::Aabb;
use crate::domain::math::Vec3;
use crate::domain::object::{KindProps, ObjectKind, ObjectProps};

/// Primitive mesh the renderer should build. Dimensions are for scale 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Sphere { radius: f32, segments: u32 },
    Box { width: f32, height: f32, depth: f32 },
    Cone { radius: f32, height: f32, segments: u32 },
    Cylinder { radius: f32, height: f32, segments: u32 },
    Torus { radius: f32, tube: f32, segments: u32 },
    Capsule { radius: f32, height: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeDescriptor {
    pub primitive: Primitive,
    /// Whether the renderer adds a translucent glow shell.
    pub glow: bool,
    /// Idle spin in radians per second (0 for static shapes).
    pub spin: f32,
}

impl ShapeDescriptor {
    /// Half extents of the unscaled shape's bounding box.
    pub fn half_extents(&self) -> Vec3 {
        match self.primitive {
            Primitive::Sphere { radius, .. } => Vec3::splat(radius),
            Primitive::Box {
                width,
                height,
                depth,
            } => Vec3::new(width / 2.0, height / 2.0, depth / 2.0),
            Primitive::Cone { radius, height, .. } | Primitive::Cylinder { radius, height, .. } => {
                Vec3::new(radius, height / 2.0, radius)
            }
            Primitive::Torus { radius, tube, .. } => Vec3::new(radius + tube, tube, radius + tube),
            Primitive::Capsule { radius, height } => Vec3::new(radius, height / 2.0, radius),
        }
    }
}

/// Maps an object kind to its shape. Pure and stateless.
pub struct GeometryCatalog;

impl GeometryCatalog {
    pub fn shape(kind: ObjectKind) -> ShapeDescriptor {
        let (primitive, glow, spin) = match kind {
            ObjectKind::Sphere => (
                Primitive::Sphere {
                    radius: 1.0,
                    segments: 16,
                },
                false,
                0.0,
            ),
            ObjectKind::Cube | ObjectKind::Building => (
                Primitive::Box {
                    width: 1.0,
                    height: 1.0,
                    depth: 1.0,
                },
                false,
                if kind == ObjectKind::Cube { 0.6 } else { 0.0 },
            ),
            ObjectKind::Pyramid | ObjectKind::Monument => (
                Primitive::Cone {
                    radius: 0.7,
                    height: 1.2,
                    segments: 4,
                },
                false,
                0.0,
            ),
            ObjectKind::Torus | ObjectKind::Portal => (
                Primitive::Torus {
                    radius: 0.8,
                    tube: 0.25,
                    segments: 24,
                },
                kind == ObjectKind::Portal,
                0.0,
            ),
            ObjectKind::Cylinder => (
                Primitive::Cylinder {
                    radius: 0.5,
                    height: 1.0,
                    segments: 16,
                },
                false,
                0.0,
            ),
            ObjectKind::Node => (
                Primitive::Sphere {
                    radius: 0.3,
                    segments: 12,
                },
                true,
                0.0,
            ),
            ObjectKind::FileCard | ObjectKind::FolderCard => (
                Primitive::Box {
                    width: 0.6,
                    height: 1.0,
                    depth: 0.1,
                },
                false,
                0.0,
            ),
            ObjectKind::Avatar => (
                Primitive::Capsule {
                    radius: 0.3,
                    height: 1.8,
                },
                false,
                0.0,
            ),
        };
        ShapeDescriptor {
            primitive,
            glow,
            spin,
        }
    }

    /// World-space bounds of an object at `position` with the given properties.
    pub fn bounds(kind: ObjectKind, position: Vec3, props: &ObjectProps) -> Aabb {
        let mut half = Self::shape(kind).half_extents();
        let scale = props.scale.axes();
        half = Vec3::new(half.x * scale.x, half.y * scale.y, half.z * scale.z);
        if let KindProps::Building { height } = props.detail {
            half.y = height / 2.0;
        }
        Aabb::from_center(position, half)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::object::{Rgb, Scale};

    #[test]
    fn every_kind_has_positive_extents() {
        let kinds = [
            ObjectKind::Sphere,
            ObjectKind::Cube,
            ObjectKind::Pyramid,
            ObjectKind::Torus,
            ObjectKind::Cylinder,
            ObjectKind::Node,
            ObjectKind::Building,
            ObjectKind::Monument,
            ObjectKind::Portal,
            ObjectKind::FileCard,
            ObjectKind::FolderCard,
            ObjectKind::Avatar,
        ];
        for kind in kinds {
            let half = GeometryCatalog::shape(kind).half_extents();
            assert!(half.x > 0.0 && half.y > 0.0 && half.z > 0.0, "{kind:?}");
        }
    }

    #[test]
    fn per_axis_scale_stretches_bounds() {
        let props = ObjectProps::primitive(
            Rgb(0),
            Scale::PerAxis(Vec3::new(5.0, 10.0, 5.0)),
        );
        let bounds = GeometryCatalog::bounds(ObjectKind::Cube, Vec3::new(0.0, 5.0, 0.0), &props);
        assert_eq!(bounds.min, Vec3::new(-2.5, 0.0, -2.5));
        assert_eq!(bounds.max, Vec3::new(2.5, 10.0, 2.5));
    }
}
