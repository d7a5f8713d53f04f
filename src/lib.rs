//! Rein rigid-body component layer
//!
//! Binds per-entity rigid-body configuration to a shared simulation world,
//! steps that world once per frame and turns the engine's contact manifolds
//! into entity-level collision and trigger events.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! 1. **ecs** - hecs components (transform, rigid body, collider, listeners)
//! 2. **physics::backend** - the seam to the external dynamics engine
//! 3. **physics::rapier** - rapier3d implementation of that seam (feature = "rapier")
//! 4. **physics** - world adapter, pools, collision registry
//! 5. **physics::system** - per-frame update, lifecycle and raycasts

pub mod ecs;
pub mod physics;

pub use ecs::prelude::*;

pub use physics::backend::{
    BodyDesc, BodyHandle, CollisionFilter, ConstraintHandle, DynamicsBackend, JointDesc,
    Manifold, ManifoldBuffer, ManifoldPoint, RayHit,
};
pub use physics::contact::{ContactPoint, ContactResult, RaycastResult, SingleContactResult};
pub use physics::error::{ConfigError, PhysicsError};
pub use physics::system::RigidBodySystem;
pub use physics::{PhysicsConfig, PhysicsWorld};

#[cfg(feature = "rapier")]
pub use physics::rapier::RapierBackend;

// Re-export glam and hecs for convenience
pub use glam;
pub use hecs;
