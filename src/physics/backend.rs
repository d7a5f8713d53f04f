//! The seam between the component layer and the rigid-body dynamics engine.
//!
//! Everything the engine owns (bodies, colliders, joints, broadphase, solver)
//! sits behind [`DynamicsBackend`]. The component layer only ever holds the
//! opaque [`BodyHandle`] and [`ConstraintHandle`] values handed out here.

use glam::{Quat, Vec3};

use crate::ecs::components::physics::{Collider, RigidBodyConfig, RigidBodyType};
use crate::ecs::components::transform::Transform;

use super::error::Result;

/// Opaque handle to a body owned by a [`DynamicsBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub(crate) u64);

/// Opaque handle to a constraint owned by a [`DynamicsBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintHandle(pub(crate) u64);

/// Collision group and mask bits. Two bodies interact when each one's group
/// intersects the other's mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionFilter {
    pub group: u32,
    pub mask: u32,
}

impl CollisionFilter {
    pub const ALL: Self = Self {
        group: u32::MAX,
        mask: u32::MAX,
    };

    pub const fn new(group: u32, mask: u32) -> Self {
        Self { group, mask }
    }

    pub fn interacts_with(&self, other: &CollisionFilter) -> bool {
        (self.group & other.mask) != 0 && (other.group & self.mask) != 0
    }
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self::ALL
    }
}

/// Everything the engine needs to build one body with one collider.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    pub body_type: RigidBodyType,
    pub position: Vec3,
    pub rotation: Quat,
    pub collider: Collider,
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub linear_factor: Vec3,
    pub angular_factor: Vec3,
    pub friction: f32,
    pub restitution: f32,
}

impl BodyDesc {
    /// Describe a body for `config`, placed at `transform`.
    ///
    /// Mass, damping and motion factors are only carried over for movable
    /// body types; static bodies get neutral values.
    pub fn from_config(config: &RigidBodyConfig, collider: &Collider, transform: &Transform) -> Self {
        let movable = config.body_type.is_movable();
        Self {
            body_type: config.body_type,
            position: transform.position,
            rotation: transform.rotation,
            collider: collider.clone(),
            mass: if config.body_type == RigidBodyType::Dynamic {
                config.mass
            } else {
                0.0
            },
            linear_damping: if movable { config.linear_damping } else { 0.0 },
            angular_damping: if movable { config.angular_damping } else { 0.0 },
            linear_factor: if movable { config.linear_factor } else { Vec3::ONE },
            angular_factor: if movable { config.angular_factor } else { Vec3::ONE },
            friction: config.friction,
            restitution: config.restitution,
        }
    }

    /// A body flagged to detect overlap without any collision response.
    pub fn is_no_response(&self) -> bool {
        self.collider.is_sensor
    }
}

/// Joint between two bodies. Anchors are in each body's local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointDesc {
    Fixed {
        anchor_a: Vec3,
        anchor_b: Vec3,
    },
    Spherical {
        anchor_a: Vec3,
        anchor_b: Vec3,
    },
    Revolute {
        axis: Vec3,
        anchor_a: Vec3,
        anchor_b: Vec3,
    },
}

/// One contact point of a manifold. Normal points from A toward B in world space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ManifoldPoint {
    pub local_point_a: Vec3,
    pub local_point_b: Vec3,
    pub point_a: Vec3,
    pub point_b: Vec3,
    pub normal: Vec3,
    pub impulse: f32,
}

/// Contact manifold between two bodies. Its points live in the owning
/// [`ManifoldBuffer`]. Trigger pairs carry no points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Manifold {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    first_point: usize,
    point_count: usize,
}

impl Manifold {
    pub fn point_count(&self) -> usize {
        self.point_count
    }
}

/// Snapshot of every manifold produced by the last step. Reused across frames.
#[derive(Debug, Clone, Default)]
pub struct ManifoldBuffer {
    manifolds: Vec<Manifold>,
    points: Vec<ManifoldPoint>,
}

impl ManifoldBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.manifolds.clear();
        self.points.clear();
    }

    /// Append a manifold between `body_a` and `body_b` with the given points.
    pub fn push(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        points: impl IntoIterator<Item = ManifoldPoint>,
    ) {
        let first_point = self.points.len();
        self.points.extend(points);
        self.manifolds.push(Manifold {
            body_a,
            body_b,
            first_point,
            point_count: self.points.len() - first_point,
        });
    }

    pub fn manifolds(&self) -> &[Manifold] {
        &self.manifolds
    }

    pub fn points(&self, manifold: &Manifold) -> &[ManifoldPoint] {
        &self.points[manifold.first_point..manifold.first_point + manifold.point_count]
    }

    pub fn len(&self) -> usize {
        self.manifolds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifolds.is_empty()
    }
}

/// Closest hit of a ray test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub body: BodyHandle,
    pub point: Vec3,
    pub normal: Vec3,
    /// Fraction along the ray in `[0, 1]`.
    pub fraction: f32,
}

/// Rigid-body dynamics engine as seen by the component layer.
///
/// Bodies are created detached. [`DynamicsBackend::add_body`] makes one take
/// part in the simulation and [`DynamicsBackend::remove_body`] takes it out
/// again without freeing it. [`DynamicsBackend::destroy_body`] frees it.
pub trait DynamicsBackend {
    fn create_body(&mut self, desc: &BodyDesc) -> Result<BodyHandle>;

    /// Free a body, removing it from the simulation first if needed.
    /// Returns false for unknown handles.
    fn destroy_body(&mut self, body: BodyHandle) -> bool;

    fn add_body(&mut self, body: BodyHandle, filter: CollisionFilter) -> Result<()>;

    /// Returns false if the body was not in the simulation.
    fn remove_body(&mut self, body: BodyHandle) -> bool;

    fn add_constraint(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        joint: &JointDesc,
    ) -> Result<ConstraintHandle>;

    fn remove_constraint(&mut self, constraint: ConstraintHandle) -> bool;

    fn set_gravity(&mut self, gravity: Vec3);

    /// Advance the simulation by exactly `dt` seconds.
    fn step(&mut self, dt: f32);

    /// Write the manifolds of the last step into `out`. `out` is cleared first.
    fn collect_manifolds(&self, out: &mut ManifoldBuffer);

    /// Whether the body is awake.
    fn is_active(&self, body: BodyHandle) -> bool;

    /// Whether the body detects overlap without producing collision response.
    fn is_no_response(&self, body: BodyHandle) -> bool;

    /// World-space pose of a body.
    fn body_pose(&self, body: BodyHandle) -> Option<(Vec3, Quat)>;

    /// Pose a kinematic body moves to during the next step.
    fn set_kinematic_target(&mut self, body: BodyHandle, position: Vec3, rotation: Quat);

    /// Place a body at a pose immediately, waking it.
    fn teleport(&mut self, body: BodyHandle, position: Vec3, rotation: Quat) -> Result<()>;

    fn apply_force(&mut self, body: BodyHandle, force: Vec3) -> Result<()>;

    fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec3) -> Result<()>;

    fn apply_torque(&mut self, body: BodyHandle, torque: Vec3) -> Result<()>;

    fn apply_torque_impulse(&mut self, body: BodyHandle, impulse: Vec3) -> Result<()>;

    fn linear_velocity(&self, body: BodyHandle) -> Option<Vec3>;

    fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec3) -> Result<()>;

    fn angular_velocity(&self, body: BodyHandle) -> Option<Vec3>;

    fn set_angular_velocity(&mut self, body: BodyHandle, velocity: Vec3) -> Result<()>;

    /// Closest hit between two world-space points.
    fn cast_ray(&self, from: Vec3, to: Vec3) -> Option<RayHit>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::physics::ColliderShape;

    #[test]
    fn test_filter_interaction() {
        let dynamic = CollisionFilter::new(1, 0xFFFF);
        let fixed = CollisionFilter::new(2, 0xFFFF ^ 2);
        assert!(dynamic.interacts_with(&fixed));
        assert!(!fixed.interacts_with(&fixed));
        assert!(CollisionFilter::default().interacts_with(&dynamic));
    }

    #[test]
    fn test_manifold_buffer_slices_points() {
        let mut buffer = ManifoldBuffer::new();
        let a = BodyHandle(1);
        let b = BodyHandle(2);
        let p = |x: f32| ManifoldPoint {
            point_a: Vec3::splat(x),
            ..Default::default()
        };

        buffer.push(a, b, [p(1.0), p(2.0)]);
        buffer.push(b, a, []);
        buffer.push(a, a, [p(3.0)]);

        assert_eq!(buffer.len(), 3);
        let m = buffer.manifolds();
        assert_eq!(buffer.points(&m[0]).len(), 2);
        assert_eq!(buffer.points(&m[0])[1].point_a, Vec3::splat(2.0));
        assert_eq!(m[1].point_count(), 0);
        assert!(buffer.points(&m[1]).is_empty());
        assert_eq!(buffer.points(&m[2])[0].point_a, Vec3::splat(3.0));

        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_static_desc_ignores_motion_fields() {
        let mut config = RigidBodyConfig::fixed();
        config.mass = 5.0;
        config.linear_damping = 0.3;
        config.linear_factor = Vec3::ZERO;
        let collider = Collider::new(ColliderShape::Sphere { radius: 1.0 });
        let desc = BodyDesc::from_config(&config, &collider, &Transform::identity());
        assert_eq!(desc.mass, 0.0);
        assert_eq!(desc.linear_damping, 0.0);
        assert_eq!(desc.linear_factor, Vec3::ONE);

        let mut config = RigidBodyConfig::dynamic(5.0);
        config.linear_damping = 0.3;
        let desc = BodyDesc::from_config(&config, &collider, &Transform::from_position(Vec3::Y));
        assert_eq!(desc.mass, 5.0);
        assert_eq!(desc.linear_damping, 0.3);
        assert_eq!(desc.position, Vec3::Y);
        assert!(!desc.is_no_response());
    }
}
