//! Rigid-body simulation layer on top of an external dynamics engine.
//!
//! # Architecture
//!
//! Every frame [`system::RigidBodySystem::update`] runs:
//!
//! 1. Reap bodies of despawned entities, create pending bodies, add or
//!    remove bodies whose component or entity was enabled or disabled
//! 2. Step the dynamics world (fixed timestep, clamped substeps)
//! 3. Synchronize transforms (dynamic: body to entity, kinematic: entity to body)
//! 4. Snapshot contact manifolds and fire trigger/collision events
//! 5. Reconcile collision state and fire end/leave events
//! 6. Reset object pools, apply deferred listener commands

pub mod backend;
pub mod collisions;
pub mod contact;
pub mod error;
pub mod lifecycle;
pub mod motion;
pub mod pool;
#[cfg(feature = "rapier")]
pub mod rapier;
#[cfg(test)]
pub(crate) mod scripted;
pub mod system;

use glam::Vec3;

use self::backend::{BodyHandle, CollisionFilter, ConstraintHandle, DynamicsBackend, JointDesc};
use self::error::{ConfigError, Result};

/// Configuration for the physics simulation.
#[derive(Debug, Clone)]
pub struct PhysicsConfig {
    /// Gravity vector. Default: (0, -9.81, 0).
    pub gravity: Vec3,
    /// Fixed timestep for physics updates in seconds. Default: 1/60.
    pub fixed_timestep: f64,
    /// Maximum number of sub-steps per frame. Default: 10.
    /// Zero runs a single variable step of the frame time instead.
    pub max_substeps: u32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            fixed_timestep: 1.0 / 60.0,
            max_substeps: 10,
        }
    }
}

impl PhysicsConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !self.fixed_timestep.is_finite() || self.fixed_timestep <= 0.0 {
            return Err(ConfigError::InvalidTimestep(self.fixed_timestep));
        }
        Ok(())
    }
}

/// The simulation world: owns the dynamics engine, gravity and step timing.
pub struct PhysicsWorld {
    config: PhysicsConfig,
    accumulator: f64,
    backend: Box<dyn DynamicsBackend>,
}

impl PhysicsWorld {
    /// Create a physics world driving `backend`. Gravity is pushed to the
    /// engine right away.
    /// Create a world driving `backend`. An invalid fixed timestep is
    /// replaced by the default one.
    pub fn new(mut config: PhysicsConfig, mut backend: Box<dyn DynamicsBackend>) -> Self {
        if let Err(err) = config.validate() {
            let fallback = PhysicsConfig::default().fixed_timestep;
            tracing::warn!(%err, fallback, "invalid physics config, using default timestep");
            config.fixed_timestep = fallback;
        }
        backend.set_gravity(config.gravity);
        Self {
            config,
            accumulator: 0.0,
            backend,
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn fixed_timestep(&self) -> f64 {
        self.config.fixed_timestep
    }

    pub fn max_substeps(&self) -> u32 {
        self.config.max_substeps
    }

    pub fn set_fixed_timestep(&mut self, fixed_timestep: f64) -> Result<()> {
        let config = PhysicsConfig {
            fixed_timestep,
            ..self.config.clone()
        };
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn set_max_substeps(&mut self, max_substeps: u32) {
        self.config.max_substeps = max_substeps;
    }

    /// Register a created body with the simulation. Without a filter the body
    /// collides with every group.
    pub fn add_body(
        &mut self,
        body: BodyHandle,
        filter: Option<CollisionFilter>,
    ) -> Result<BodyHandle> {
        self.backend.add_body(body, filter.unwrap_or_default())?;
        Ok(body)
    }

    /// Take a body out of the simulation. The body itself stays allocated.
    pub fn remove_body(&mut self, body: BodyHandle) -> bool {
        self.backend.remove_body(body)
    }

    pub fn add_constraint(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        joint: &JointDesc,
    ) -> Result<ConstraintHandle> {
        self.backend.add_constraint(body_a, body_b, joint)
    }

    pub fn remove_constraint(&mut self, constraint: ConstraintHandle) -> bool {
        self.backend.remove_constraint(constraint)
    }

    pub fn gravity(&self) -> Vec3 {
        self.config.gravity
    }

    /// Set gravity. Takes effect on the next step.
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.config.gravity = gravity;
        self.backend.set_gravity(gravity);
    }

    pub fn set_gravity_xyz(&mut self, x: f32, y: f32, z: f32) {
        self.set_gravity(Vec3::new(x, y, z));
    }

    /// Step the physics simulation forward by `delta_time` seconds.
    ///
    /// Uses a fixed timestep accumulator; at most `max_substeps` engine steps
    /// run per call. Returns the number of engine steps taken.
    pub fn step(&mut self, delta_time: f64) -> u32 {
        if self.config.max_substeps == 0 {
            if delta_time <= 0.0 {
                return 0;
            }
            self.backend.step(delta_time as f32);
            return 1;
        }

        self.accumulator += delta_time;

        let mut substeps = 0u32;
        while self.accumulator >= self.config.fixed_timestep && substeps < self.config.max_substeps
        {
            self.backend.step(self.config.fixed_timestep as f32);
            self.accumulator -= self.config.fixed_timestep;
            substeps += 1;
        }

        // Clamp accumulator to avoid spiral of death
        if self.accumulator > self.config.fixed_timestep * self.config.max_substeps as f64 {
            self.accumulator = 0.0;
        }

        tracing::trace!(substeps, accumulator = self.accumulator, "physics step");
        substeps
    }

    pub(crate) fn backend(&self) -> &dyn DynamicsBackend {
        self.backend.as_ref()
    }

    pub(crate) fn backend_mut(&mut self) -> &mut dyn DynamicsBackend {
        self.backend.as_mut()
    }
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("config", &self.config)
            .field("accumulator", &self.accumulator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::physics::{Collider, RigidBodyConfig};
    use crate::ecs::components::transform::Transform;
    use crate::physics::backend::BodyDesc;
    use crate::physics::scripted::ScriptedBackend;

    fn world_with(config: PhysicsConfig) -> (PhysicsWorld, ScriptedBackend) {
        let backend = ScriptedBackend::new();
        let world = PhysicsWorld::new(config, Box::new(backend.clone()));
        (world, backend)
    }

    #[test]
    fn test_physics_config_default() {
        let config = PhysicsConfig::default();
        assert_eq!(config.gravity, Vec3::new(0.0, -9.81, 0.0));
        assert!((config.fixed_timestep - 1.0 / 60.0).abs() < 1e-10);
        assert_eq!(config.max_substeps, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_timestep_falls_back_to_default() {
        let config = PhysicsConfig {
            fixed_timestep: 0.0,
            max_substeps: 4,
            ..Default::default()
        };
        let (mut world, backend) = world_with(config);
        let default_step = PhysicsConfig::default().fixed_timestep;
        assert_eq!(world.fixed_timestep(), default_step);

        assert_eq!(world.step(default_step), 1);
        assert_eq!(backend.state().steps, vec![default_step as f32]);
    }

    #[test]
    fn test_gravity_pushed_immediately() {
        let (mut world, backend) = world_with(PhysicsConfig::default());
        assert_eq!(backend.state().gravity, Vec3::new(0.0, -9.81, 0.0));

        world.set_gravity_xyz(0.0, -1.62, 0.0);
        assert_eq!(world.gravity(), Vec3::new(0.0, -1.62, 0.0));
        assert_eq!(backend.state().gravity, Vec3::new(0.0, -1.62, 0.0));

        world.set_gravity(Vec3::ZERO);
        assert_eq!(backend.state().gravity, Vec3::ZERO);
    }

    #[test]
    fn test_step_accumulates_fixed_steps() {
        let config = PhysicsConfig {
            fixed_timestep: 0.25,
            max_substeps: 4,
            ..Default::default()
        };
        let (mut world, backend) = world_with(config);

        assert_eq!(world.step(0.1), 0);
        assert_eq!(world.step(0.1), 0);
        assert_eq!(world.step(0.1), 1);
        assert_eq!(world.step(0.5), 2);
        assert_eq!(backend.state().steps, vec![0.25, 0.25, 0.25]);
    }

    #[test]
    fn test_step_clamps_frame_spikes() {
        let config = PhysicsConfig {
            fixed_timestep: 0.25,
            max_substeps: 2,
            ..Default::default()
        };
        let (mut world, backend) = world_with(config);

        // 10 seconds of frame time advances at most 2 * 0.25
        assert_eq!(world.step(10.0), 2);
        // leftover time was dropped, not carried into the next frame
        assert_eq!(world.step(0.0), 0);
        assert_eq!(backend.state().steps.len(), 2);
    }

    #[test]
    fn test_zero_substeps_runs_variable_step() {
        let config = PhysicsConfig {
            max_substeps: 0,
            ..Default::default()
        };
        let (mut world, backend) = world_with(config);
        assert_eq!(world.step(0.5), 1);
        assert_eq!(world.step(0.0), 0);
        assert_eq!(backend.state().steps, vec![0.5]);
    }

    #[test]
    fn test_set_fixed_timestep_validates() {
        let (mut world, _) = world_with(PhysicsConfig::default());
        assert_eq!(
            world.set_fixed_timestep(0.0),
            Err(ConfigError::InvalidTimestep(0.0).into())
        );
        assert!(world.set_fixed_timestep(0.01).is_ok());
        assert_eq!(world.fixed_timestep(), 0.01);
    }

    #[test]
    fn test_add_and_remove_body() {
        let (mut world, backend) = world_with(PhysicsConfig::default());
        let desc = BodyDesc::from_config(
            &RigidBodyConfig::dynamic(1.0),
            &Collider::default(),
            &Transform::identity(),
        );
        let body = world.backend_mut().create_body(&desc).unwrap();

        assert_eq!(world.add_body(body, None), Ok(body));
        assert_eq!(backend.state().body(body).filter, CollisionFilter::ALL);
        assert!(backend.state().body(body).in_world);

        assert!(world.remove_body(body));
        assert!(!world.remove_body(body));
        assert!(!backend.state().body(body).in_world);

        let filter = CollisionFilter::new(2, 1);
        world.add_body(body, Some(filter)).unwrap();
        assert_eq!(backend.state().body(body).filter, filter);
    }

    #[test]
    fn test_constraints() {
        let (mut world, backend) = world_with(PhysicsConfig::default());
        let desc = BodyDesc::from_config(
            &RigidBodyConfig::dynamic(1.0),
            &Collider::default(),
            &Transform::identity(),
        );
        let a = world.backend_mut().create_body(&desc).unwrap();
        let b = world.backend_mut().create_body(&desc).unwrap();

        let joint = JointDesc::Spherical {
            anchor_a: Vec3::X,
            anchor_b: Vec3::NEG_X,
        };
        let handle = world.add_constraint(a, b, &joint).unwrap();
        assert_eq!(backend.state().constraints.len(), 1);

        assert!(world.remove_constraint(handle));
        assert!(!world.remove_constraint(handle));
        assert!(backend.state().constraints.is_empty());
    }
}
