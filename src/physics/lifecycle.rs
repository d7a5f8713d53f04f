//! Creation, cloning and removal of rigid body components.
//!
//! A component owns at most one body. The body is created as soon as an
//! engine exists and the entity has a [`Collider`]; until then the component
//! only holds its configuration and the next update retries.

use hecs::{Entity, World};

use crate::ecs::components::physics::{Collider, Disabled, RigidBodyComponent, RigidBodyConfig};
use crate::ecs::components::transform::Transform;

#[cfg(feature = "serde")]
use crate::ecs::components::data::RigidBodyData;

use super::backend::{BodyDesc, BodyHandle};
use super::error::{PhysicsError, Result};
use super::system::RigidBodySystem;

impl RigidBodySystem {
    /// Attach a rigid body component to `entity`. A component already on the
    /// entity is replaced and its body released.
    pub fn add_component(
        &mut self,
        world: &mut World,
        entity: Entity,
        config: RigidBodyConfig,
    ) -> Result<()> {
        config.validate()?;
        if !world.contains(entity) {
            return Err(PhysicsError::NoSuchEntity(entity));
        }
        self.release_body(world, entity);
        world
            .insert_one(entity, RigidBodyComponent::new(config))
            .map_err(|_| PhysicsError::NoSuchEntity(entity))?;
        self.create_body(world, entity)?;
        Ok(())
    }

    /// Attach a component from serialized properties.
    #[cfg(feature = "serde")]
    pub fn initialize_component_data(
        &mut self,
        world: &mut World,
        entity: Entity,
        data: &RigidBodyData,
    ) -> Result<()> {
        let config = data.into_config()?;
        self.add_component(world, entity, config)
    }

    /// Give `target` a component with the same configuration as `source`'s.
    /// The clone gets a body of its own.
    pub fn clone_component(
        &mut self,
        world: &mut World,
        source: Entity,
        target: Entity,
    ) -> Result<()> {
        let config = world
            .get::<&RigidBodyComponent>(source)
            .map_err(|_| PhysicsError::MissingComponent(source))?
            .config()
            .clone();
        self.add_component(world, target, config)
    }

    /// Release the body and detach the component. Returns false if the entity
    /// had no component.
    pub fn remove_component(&mut self, world: &mut World, entity: Entity) -> bool {
        self.release_body(world, entity);
        world.remove_one::<RigidBodyComponent>(entity).is_ok()
    }

    /// Take the entity's body out of the world and destroy it. The component
    /// stays attached without a body. Calling this twice is a no-op.
    pub fn release_body(&mut self, world: &mut World, entity: Entity) -> bool {
        let body = match world.get::<&mut RigidBodyComponent>(entity) {
            Ok(mut component) => {
                component.in_simulation = false;
                component.body.take()
            }
            Err(_) => None,
        };
        match body {
            Some(body) => {
                self.destroy_body(body);
                true
            }
            None => false,
        }
    }

    /// Enable or disable the component. Disabled bodies leave the simulation
    /// but stay allocated.
    pub fn set_enabled(&mut self, world: &mut World, entity: Entity, enabled: bool) -> Result<()> {
        let entity_disabled = world.satisfies::<&Disabled>(entity).unwrap_or(false);
        let mut component = world
            .get::<&mut RigidBodyComponent>(entity)
            .map_err(|_| PhysicsError::MissingComponent(entity))?;
        component.config.enabled = enabled;

        let (Some(physics), Some(body)) = (self.physics.as_mut(), component.body) else {
            return Ok(());
        };
        if enabled && !entity_disabled && !component.in_simulation {
            physics.add_body(body, Some(component.config.filter()))?;
            component.in_simulation = true;
        } else if !enabled && component.in_simulation {
            physics.remove_body(body);
            component.in_simulation = false;
        }
        Ok(())
    }

    /// Replace the component's configuration and rebuild its body.
    pub fn set_config(
        &mut self,
        world: &mut World,
        entity: Entity,
        config: RigidBodyConfig,
    ) -> Result<()> {
        config.validate()?;
        if !world.satisfies::<&RigidBodyComponent>(entity).unwrap_or(false) {
            return Err(PhysicsError::MissingComponent(entity));
        }
        self.release_body(world, entity);
        if let Ok(mut component) = world.get::<&mut RigidBodyComponent>(entity) {
            component.config = config;
        }
        self.create_body(world, entity)?;
        Ok(())
    }

    /// Create bodies for components that could not get one yet.
    pub(crate) fn create_pending_bodies(&mut self, world: &mut World) {
        let pending: Vec<Entity> = world
            .query_mut::<(&RigidBodyComponent, &Collider)>()
            .into_iter()
            .filter(|(_, (component, _))| component.body.is_none())
            .map(|(entity, _)| entity)
            .collect();

        for entity in pending {
            if let Err(err) = self.create_body(world, entity) {
                tracing::warn!(?entity, %err, "failed to create rigid body");
            }
        }
    }

    /// Add or remove bodies so that simulation membership follows the
    /// component's `enabled` flag and the entity's [`Disabled`] marker.
    pub(crate) fn sync_membership(&mut self, world: &mut World) {
        let Some(physics) = self.physics.as_mut() else {
            return;
        };
        for (entity, (component, disabled)) in
            world.query_mut::<(&mut RigidBodyComponent, Option<&Disabled>)>()
        {
            let Some(body) = component.body else {
                continue;
            };
            let wanted = component.config.enabled && disabled.is_none();
            if wanted && !component.in_simulation {
                match physics.add_body(body, Some(component.config.filter())) {
                    Ok(_) => component.in_simulation = true,
                    Err(err) => {
                        tracing::warn!(?entity, %err, "failed to add rigid body to the world")
                    }
                }
            } else if !wanted && component.in_simulation {
                physics.remove_body(body);
                component.in_simulation = false;
            }
        }
    }

    /// Remove and destroy bodies whose owner was despawned or lost its component.
    pub(crate) fn reap_orphans(&mut self, world: &World) {
        let orphans: Vec<BodyHandle> = self
            .owners
            .iter()
            .filter(|(body, entity)| {
                world
                    .get::<&RigidBodyComponent>(**entity)
                    .map_or(true, |component| component.body != Some(**body))
            })
            .map(|(body, _)| *body)
            .collect();

        for body in orphans {
            tracing::debug!(?body, "reaping orphaned rigid body");
            self.destroy_body(body);
        }
    }

    /// Build the entity's body from its component, collider and transform,
    /// and add it to the simulation unless disabled.
    fn create_body(&mut self, world: &mut World, entity: Entity) -> Result<Option<BodyHandle>> {
        let Some(physics) = self.physics.as_mut() else {
            return Ok(None);
        };

        let desc = {
            let component = world
                .get::<&RigidBodyComponent>(entity)
                .map_err(|_| PhysicsError::MissingComponent(entity))?;
            if let Some(body) = component.body {
                return Ok(Some(body));
            }
            let Ok(collider) = world.get::<&Collider>(entity) else {
                return Ok(None);
            };
            let transform = world
                .get::<&Transform>(entity)
                .map(|t| *t)
                .unwrap_or_default();
            BodyDesc::from_config(component.config(), &collider, &transform)
        };

        let body = physics.backend_mut().create_body(&desc)?;
        let entity_disabled = world.satisfies::<&Disabled>(entity).unwrap_or(false);

        let mut component = world
            .get::<&mut RigidBodyComponent>(entity)
            .map_err(|_| PhysicsError::MissingComponent(entity))?;
        if component.config.enabled && !entity_disabled {
            if let Err(err) = physics.add_body(body, Some(component.config.filter())) {
                physics.backend_mut().destroy_body(body);
                return Err(err);
            }
            component.in_simulation = true;
        }
        component.body = Some(body);
        self.owners.insert(body, entity);

        tracing::debug!(?entity, ?body, body_type = ?desc.body_type, "created rigid body");
        Ok(Some(body))
    }

    /// Remove a body from the world, then free it.
    fn destroy_body(&mut self, body: BodyHandle) {
        self.owners.remove(&body);
        if let Some(physics) = self.physics.as_mut() {
            physics.remove_body(body);
            physics.backend_mut().destroy_body(body);
        }
    }
}
