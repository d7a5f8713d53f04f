//! Forces, impulses and velocities of an entity's body.

use glam::{Quat, Vec3};
use hecs::{Entity, World};

use crate::ecs::components::physics::RigidBodyComponent;
use crate::ecs::components::transform::Transform;

use super::backend::{BodyHandle, DynamicsBackend};
use super::error::{PhysicsError, Result};
use super::system::RigidBodySystem;

impl RigidBodySystem {
    fn body_and_backend(
        &mut self,
        world: &World,
        entity: Entity,
    ) -> Result<(BodyHandle, &mut dyn DynamicsBackend)> {
        let body = world
            .get::<&RigidBodyComponent>(entity)
            .map_err(|_| PhysicsError::MissingComponent(entity))?
            .body()
            .ok_or(PhysicsError::NoBody(entity))?;
        let physics = self
            .physics
            .as_mut()
            .ok_or(PhysicsError::EngineUnavailable)?;
        Ok((body, physics.backend_mut()))
    }

    fn body_of(&self, world: &World, entity: Entity) -> Option<(BodyHandle, &dyn DynamicsBackend)> {
        let body = world.get::<&RigidBodyComponent>(entity).ok()?.body()?;
        Some((body, self.physics.as_ref()?.backend()))
    }

    /// Apply a force at the center of mass for the next step.
    pub fn apply_force(&mut self, world: &World, entity: Entity, force: Vec3) -> Result<()> {
        let (body, backend) = self.body_and_backend(world, entity)?;
        backend.apply_force(body, force)
    }

    /// Apply an instantaneous impulse at the center of mass.
    pub fn apply_impulse(&mut self, world: &World, entity: Entity, impulse: Vec3) -> Result<()> {
        let (body, backend) = self.body_and_backend(world, entity)?;
        backend.apply_impulse(body, impulse)
    }

    pub fn apply_torque(&mut self, world: &World, entity: Entity, torque: Vec3) -> Result<()> {
        let (body, backend) = self.body_and_backend(world, entity)?;
        backend.apply_torque(body, torque)
    }

    pub fn apply_torque_impulse(
        &mut self,
        world: &World,
        entity: Entity,
        impulse: Vec3,
    ) -> Result<()> {
        let (body, backend) = self.body_and_backend(world, entity)?;
        backend.apply_torque_impulse(body, impulse)
    }

    pub fn linear_velocity(&self, world: &World, entity: Entity) -> Option<Vec3> {
        let (body, backend) = self.body_of(world, entity)?;
        backend.linear_velocity(body)
    }

    pub fn set_linear_velocity(
        &mut self,
        world: &World,
        entity: Entity,
        velocity: Vec3,
    ) -> Result<()> {
        let (body, backend) = self.body_and_backend(world, entity)?;
        backend.set_linear_velocity(body, velocity)
    }

    pub fn angular_velocity(&self, world: &World, entity: Entity) -> Option<Vec3> {
        let (body, backend) = self.body_of(world, entity)?;
        backend.angular_velocity(body)
    }

    pub fn set_angular_velocity(
        &mut self,
        world: &World,
        entity: Entity,
        velocity: Vec3,
    ) -> Result<()> {
        let (body, backend) = self.body_and_backend(world, entity)?;
        backend.set_angular_velocity(body, velocity)
    }

    /// Move the body and the entity's transform to a new pose immediately.
    pub fn teleport(
        &mut self,
        world: &mut World,
        entity: Entity,
        position: Vec3,
        rotation: Quat,
    ) -> Result<()> {
        let (body, backend) = self.body_and_backend(world, entity)?;
        backend.teleport(body, position, rotation)?;
        if let Ok(mut transform) = world.get::<&mut Transform>(entity) {
            transform.position = position;
            transform.rotation = rotation;
        }
        Ok(())
    }
}
