//! Screen-space tap to scene entity routing.
//!
//! The router is stateless: it casts a ray through the tapped point against
//! every collider in the scene and returns the nearest hit. Deciding whether
//! the hit entity is interesting is the caller's job.

use glam::{Affine3A, Vec2, Vec3};
use log::debug;

use crate::scene::{Collider, EntityId, Pose, SceneGraph};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Option<Self> {
        let direction = direction.try_normalize()?;
        Some(Self { origin, direction })
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Anything that can turn a 2D viewport point into a world-space ray.
pub trait ScreenRays {
    fn ray_through(&self, point: Vec2) -> Option<Ray>;
}

/// Perspective camera looking down its local -Z with +Y up. Viewport points
/// have their origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinholeCamera {
    pub pose: Pose,
    /// Vertical field of view in radians.
    pub vertical_fov: f32,
    pub viewport: Vec2,
}

impl ScreenRays for PinholeCamera {
    fn ray_through(&self, point: Vec2) -> Option<Ray> {
        if self.viewport.x <= 0.0 || self.viewport.y <= 0.0 {
            return None;
        }
        if point.x < 0.0 || point.y < 0.0 || point.x > self.viewport.x || point.y > self.viewport.y {
            return None;
        }
        let ndc = Vec2::new(
            point.x / self.viewport.x * 2.0 - 1.0,
            1.0 - point.y / self.viewport.y * 2.0,
        );
        let half_height = (self.vertical_fov * 0.5).tan();
        let aspect = self.viewport.x / self.viewport.y;
        let local = Vec3::new(ndc.x * half_height * aspect, ndc.y * half_height, -1.0);
        Ray::new(self.pose.translation, self.pose.rotation * local)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub entity: EntityId,
    pub distance: f32,
    pub point: Vec3,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HitRouter;

impl HitRouter {
    /// Nearest entity under `point`, if any.
    pub fn route(&self, point: Vec2, view: &impl ScreenRays, scene: &SceneGraph) -> Option<EntityId> {
        let ray = view.ray_through(point)?;
        let hit = self.cast(&ray, scene);
        debug!("tap at {point:?} -> {:?}", hit.map(|h| h.entity));
        hit.map(|h| h.entity)
    }

    /// Nearest intersection along `ray`. Equal distances keep the entity
    /// created first.
    pub fn cast(&self, ray: &Ray, scene: &SceneGraph) -> Option<Hit> {
        let mut best: Option<Hit> = None;
        for (entity, node) in scene.iter() {
            let Some(collider) = node.collider.as_ref() else {
                continue;
            };
            let Some(world) = scene.world_transform(entity) else {
                continue;
            };
            let Some(distance) = intersect(ray, &world, collider) else {
                continue;
            };
            if best.is_none_or(|b| distance < b.distance) {
                best = Some(Hit {
                    entity,
                    distance,
                    point: ray.at(distance),
                });
            }
        }
        best
    }
}

fn intersect(ray: &Ray, world: &Affine3A, collider: &Collider) -> Option<f32> {
    // Poses are rigid, so distances in the local frame equal world distances.
    let inverse = world.inverse();
    let origin = inverse.transform_point3(ray.origin);
    let direction = inverse.transform_vector3(ray.direction);
    match *collider {
        Collider::Cuboid { half_extents } => ray_box(origin, direction, half_extents),
        Collider::Plane { half_size } => ray_plane(origin, direction, half_size),
    }
}

/// Slab test against an origin-centred box.
fn ray_box(origin: Vec3, direction: Vec3, half: Vec3) -> Option<f32> {
    let mut t_min = 0.0f32;
    let mut t_max = f32::INFINITY;
    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        let h = half[axis];
        if d.abs() < f32::EPSILON {
            if o < -h || o > h {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let mut t0 = (-h - o) * inv;
        let mut t1 = (h - o) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }
    Some(t_min)
}

/// Double-sided test against the y = 0 plane bounded by `half` in x/z.
fn ray_plane(origin: Vec3, direction: Vec3, half: Vec2) -> Option<f32> {
    if direction.y.abs() < f32::EPSILON {
        return None;
    }
    let t = -origin.y / direction.y;
    if t < 0.0 {
        return None;
    }
    let p = origin + direction * t;
    (p.x.abs() <= half.x && p.z.abs() <= half.y).then_some(t)
}
