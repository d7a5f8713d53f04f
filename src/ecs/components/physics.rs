//! Physics components for ECS entities.

use glam::Vec3;

use crate::physics::backend::{BodyHandle, CollisionFilter};
use crate::physics::error::ConfigError;

/// Collision group bits. A body collides with another when each one's group
/// intersects the other's mask.
pub mod groups {
    pub const BODYGROUP_NONE: u32 = 0;
    pub const BODYGROUP_DEFAULT: u32 = 1;
    pub const BODYGROUP_DYNAMIC: u32 = 1;
    pub const BODYGROUP_STATIC: u32 = 2;
    pub const BODYGROUP_KINEMATIC: u32 = 4;
    pub const BODYGROUP_ENGINE_1: u32 = 8;
    pub const BODYGROUP_TRIGGER: u32 = 16;
    pub const BODYGROUP_ENGINE_2: u32 = 32;
    pub const BODYGROUP_ENGINE_3: u32 = 64;
    pub const BODYGROUP_USER_1: u32 = 128;
    pub const BODYGROUP_USER_2: u32 = 256;
    pub const BODYGROUP_USER_3: u32 = 512;
    pub const BODYGROUP_USER_4: u32 = 1024;
    pub const BODYGROUP_USER_5: u32 = 2048;
    pub const BODYGROUP_USER_6: u32 = 4096;
    pub const BODYGROUP_USER_7: u32 = 8192;
    pub const BODYGROUP_USER_8: u32 = 16384;

    pub const BODYMASK_NONE: u32 = 0;
    pub const BODYMASK_ALL: u32 = 65535;
    pub const BODYMASK_STATIC: u32 = 2;
    pub const BODYMASK_NOT_STATIC: u32 = 65535 ^ 2;
    pub const BODYMASK_NOT_STATIC_KINEMATIC: u32 = 65535 ^ (2 | 4);
}

/// Rigid body type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RigidBodyType {
    /// Immovable, infinite mass.
    #[default]
    Static,
    /// Affected by forces and collisions.
    Dynamic,
    /// Position controlled by the entity transform, but pushes dynamic bodies.
    Kinematic,
}

impl RigidBodyType {
    /// Group and mask a body of this type gets unless configured otherwise.
    pub fn default_filter(self) -> CollisionFilter {
        use groups::*;
        match self {
            RigidBodyType::Static => CollisionFilter::new(BODYGROUP_STATIC, BODYMASK_NOT_STATIC),
            RigidBodyType::Dynamic => CollisionFilter::new(BODYGROUP_DYNAMIC, BODYMASK_ALL),
            RigidBodyType::Kinematic => CollisionFilter::new(BODYGROUP_KINEMATIC, BODYMASK_ALL),
        }
    }

    /// Whether mass, damping and motion factors apply to this type.
    pub fn is_movable(self) -> bool {
        self != RigidBodyType::Static
    }
}

/// Rigid body configuration. Every recognized property is a field here;
/// [`RigidBodyConfig::validate`] runs before a body is built from it.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBodyConfig {
    pub enabled: bool,
    pub body_type: RigidBodyType,
    /// Mass in kilograms. Dynamic bodies only.
    pub mass: f32,
    /// Linear damping factor in `[0, 1]`. Dynamic and kinematic bodies only.
    pub linear_damping: f32,
    /// Angular damping factor in `[0, 1]`. Dynamic and kinematic bodies only.
    pub angular_damping: f32,
    /// Per-axis scale on linear motion. A zero component locks that axis.
    pub linear_factor: Vec3,
    /// Per-axis scale on angular motion. A zero component locks that axis.
    pub angular_factor: Vec3,
    pub friction: f32,
    pub restitution: f32,
    pub group: u32,
    pub mask: u32,
}

impl Default for RigidBodyConfig {
    fn default() -> Self {
        let filter = RigidBodyType::Static.default_filter();
        Self {
            enabled: true,
            body_type: RigidBodyType::Static,
            mass: 1.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            linear_factor: Vec3::ONE,
            angular_factor: Vec3::ONE,
            friction: 0.5,
            restitution: 0.0,
            group: filter.group,
            mask: filter.mask,
        }
    }
}

impl RigidBodyConfig {
    /// Configuration for a dynamic body with the given mass.
    pub fn dynamic(mass: f32) -> Self {
        let mut config = Self::default();
        config.set_body_type(RigidBodyType::Dynamic);
        config.mass = mass;
        config
    }

    /// Configuration for a static body.
    pub fn fixed() -> Self {
        Self::default()
    }

    /// Configuration for a kinematic body.
    pub fn kinematic() -> Self {
        let mut config = Self::default();
        config.set_body_type(RigidBodyType::Kinematic);
        config
    }

    /// Change the body type. Group and mask are reset to the type's defaults.
    pub fn set_body_type(&mut self, body_type: RigidBodyType) {
        let filter = body_type.default_filter();
        self.body_type = body_type;
        self.group = filter.group;
        self.mask = filter.mask;
    }

    /// Collision filter built from `group` and `mask`.
    pub fn filter(&self) -> CollisionFilter {
        CollisionFilter::new(self.group, self.mask)
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.mass.is_finite() || self.mass < 0.0 {
            return Err(ConfigError::InvalidMass(self.mass));
        }
        if self.body_type == RigidBodyType::Dynamic && self.mass == 0.0 {
            return Err(ConfigError::ZeroDynamicMass);
        }
        for (field, value) in [
            ("linear_damping", self.linear_damping),
            ("angular_damping", self.angular_damping),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::DampingOutOfRange { field, value });
            }
        }
        for (field, factor) in [
            ("linear_factor", self.linear_factor),
            ("angular_factor", self.angular_factor),
        ] {
            if !factor.is_finite() {
                return Err(ConfigError::NonFiniteFactor { field });
            }
        }
        if !self.friction.is_finite() || self.friction < 0.0 {
            return Err(ConfigError::InvalidFriction(self.friction));
        }
        if !self.restitution.is_finite() || self.restitution < 0.0 {
            return Err(ConfigError::InvalidRestitution(self.restitution));
        }
        Ok(())
    }
}

/// Rigid body component. Owns at most one simulation body.
#[derive(Debug, Clone)]
pub struct RigidBodyComponent {
    pub(crate) config: RigidBodyConfig,
    pub(crate) body: Option<BodyHandle>,
    pub(crate) in_simulation: bool,
}

impl RigidBodyComponent {
    pub(crate) fn new(config: RigidBodyConfig) -> Self {
        Self {
            config,
            body: None,
            in_simulation: false,
        }
    }

    pub fn config(&self) -> &RigidBodyConfig {
        &self.config
    }

    pub fn body_type(&self) -> RigidBodyType {
        self.config.body_type
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Handle of the simulation body, if one has been created.
    pub fn body(&self) -> Option<BodyHandle> {
        self.body
    }

    /// Whether the body is currently registered with the simulation world.
    pub fn in_simulation(&self) -> bool {
        self.in_simulation
    }
}

/// Collider shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ColliderShape {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
    Capsule { radius: f32, half_height: f32 },
    Cylinder { radius: f32, half_height: f32 },
    ConvexHull { points: Vec<Vec3> },
}

/// Collision shape component. Required before a body can be built.
#[derive(Debug, Clone, PartialEq)]
pub struct Collider {
    pub shape: ColliderShape,
    /// Offset from the entity's transform origin.
    pub offset: Vec3,
    /// If true, the body detects overlaps but produces no collision response
    /// and the entity acts as a trigger volume.
    pub is_sensor: bool,
}

impl Collider {
    pub fn new(shape: ColliderShape) -> Self {
        Self {
            shape,
            offset: Vec3::ZERO,
            is_sensor: false,
        }
    }

    /// Trigger volume with the given shape.
    pub fn sensor(shape: ColliderShape) -> Self {
        Self {
            shape,
            offset: Vec3::ZERO,
            is_sensor: true,
        }
    }
}

impl Default for Collider {
    fn default() -> Self {
        Self::new(ColliderShape::Sphere { radius: 0.5 })
    }
}

/// Marker for a disabled entity. Bodies of disabled entities are not synchronized.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disabled;
