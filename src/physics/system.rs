//! Per-frame update of rigid body components and collision event dispatch.

use std::collections::HashMap;

use glam::Vec3;
use hecs::{CommandBuffer, Entity, World};

use crate::ecs::components::events::{CollisionEvent, CollisionListeners, EventKind};
use crate::ecs::components::physics::{Collider, Disabled, RigidBodyComponent, RigidBodyType};
use crate::ecs::components::transform::Transform;

use super::backend::{BodyHandle, DynamicsBackend, Manifold, ManifoldBuffer};
use super::collisions::CollisionRegistry;
use super::contact::{ContactPoint, ContactResult, RaycastResult, SingleContactResult};
use super::pool::ObjectPool;
use super::{PhysicsConfig, PhysicsWorld};

/// Global contact listener, called once per contact point.
pub type ContactListener =
    Box<dyn FnMut(&SingleContactResult, &mut CommandBuffer) + Send + Sync + 'static>;

const COLLISION_EVENTS: [EventKind; 3] = [
    EventKind::CollisionStart,
    EventKind::CollisionEnd,
    EventKind::Contact,
];

const TRIGGER_EVENTS: [EventKind; 2] = [EventKind::TriggerEnter, EventKind::TriggerLeave];

/// Owns the simulation world and drives every [`RigidBodyComponent`].
///
/// Call [`RigidBodySystem::update`] once per frame with the elapsed time.
/// Without a dynamics engine the system keeps component data but never
/// simulates anything.
pub struct RigidBodySystem {
    pub(crate) physics: Option<PhysicsWorld>,
    pub(crate) owners: HashMap<BodyHandle, Entity>,
    collisions: CollisionRegistry,
    frame_collisions: CollisionRegistry,
    contact_points: ObjectPool<ContactPoint>,
    contact_results: ObjectPool<ContactResult>,
    single_contacts: ObjectPool<SingleContactResult>,
    contact_listeners: Vec<ContactListener>,
    manifolds: ManifoldBuffer,
    forward: Vec<usize>,
    reverse: Vec<usize>,
    ended: Vec<(Entity, Entity)>,
    commands: CommandBuffer,
}

impl RigidBodySystem {
    /// Create a system driving `backend`. With `None` no world is created and
    /// [`RigidBodySystem::update`] does nothing.
    pub fn new(config: PhysicsConfig, backend: Option<Box<dyn DynamicsBackend>>) -> Self {
        let physics = match backend {
            Some(backend) => Some(PhysicsWorld::new(config, backend)),
            None => {
                tracing::warn!("no dynamics engine available, rigid body simulation is disabled");
                None
            }
        };
        Self {
            physics,
            owners: HashMap::new(),
            collisions: CollisionRegistry::new(),
            frame_collisions: CollisionRegistry::new(),
            contact_points: ObjectPool::new(1),
            contact_results: ObjectPool::new(1),
            single_contacts: ObjectPool::new(1),
            contact_listeners: Vec::new(),
            manifolds: ManifoldBuffer::new(),
            forward: Vec::new(),
            reverse: Vec::new(),
            ended: Vec::new(),
            commands: CommandBuffer::new(),
        }
    }

    /// Create a system with the engine compiled into this crate, if any.
    pub fn with_default_backend(config: PhysicsConfig) -> Self {
        #[cfg(feature = "rapier")]
        let backend: Option<Box<dyn DynamicsBackend>> =
            Some(Box::new(super::rapier::RapierBackend::new()));
        #[cfg(not(feature = "rapier"))]
        let backend: Option<Box<dyn DynamicsBackend>> = None;
        Self::new(config, backend)
    }

    /// Whether a simulation world exists.
    pub fn is_simulating(&self) -> bool {
        self.physics.is_some()
    }

    pub fn physics(&self) -> Option<&PhysicsWorld> {
        self.physics.as_ref()
    }

    pub fn physics_mut(&mut self) -> Option<&mut PhysicsWorld> {
        self.physics.as_mut()
    }

    /// Entity owning a body.
    pub fn owner(&self, body: BodyHandle) -> Option<Entity> {
        self.owners.get(&body).copied()
    }

    /// Pairings confirmed as touching by the last completed update.
    pub fn active_collisions(&self) -> &CollisionRegistry {
        &self.collisions
    }

    /// Register a global contact listener. It receives every contact point
    /// of every colliding pair, before any per-entity event of that pair.
    pub fn on_contact<F>(&mut self, listener: F)
    where
        F: FnMut(&SingleContactResult, &mut CommandBuffer) + Send + Sync + 'static,
    {
        self.contact_listeners.push(Box::new(listener));
    }

    pub fn clear_contact_listeners(&mut self) {
        self.contact_listeners.clear();
    }

    /// Advance the simulation by `delta_time` seconds and dispatch collision events.
    pub fn update(&mut self, world: &mut World, delta_time: f64) {
        if self.physics.is_none() {
            return;
        }

        self.reap_orphans(world);
        self.create_pending_bodies(world);
        self.sync_membership(world);

        let Some(physics) = self.physics.as_mut() else {
            return;
        };
        physics.step(delta_time);
        sync_transforms(physics.backend_mut(), world);

        self.frame_collisions.clear();
        let mut manifolds = std::mem::take(&mut self.manifolds);
        physics.backend().collect_manifolds(&mut manifolds);
        tracing::trace!(manifolds = manifolds.len(), "collected contact manifolds");

        for manifold in manifolds.manifolds() {
            self.process_manifold(world, &manifolds, manifold);
        }
        self.manifolds = manifolds;

        self.reconcile(world);

        self.contact_points.free_all();
        self.contact_results.free_all();
        self.single_contacts.free_all();

        self.commands.run_on(world);
        self.reap_orphans(world);
    }

    fn process_manifold(&mut self, world: &World, manifolds: &ManifoldBuffer, manifold: &Manifold) {
        let (Some(a), Some(b)) = (self.owner(manifold.body_a), self.owner(manifold.body_b)) else {
            tracing::debug!(
                body_a = ?manifold.body_a,
                body_b = ?manifold.body_b,
                "skipping manifold with unresolved owner"
            );
            return;
        };
        let Some(physics) = self.physics.as_ref() else {
            return;
        };
        let no_response_a = physics.backend().is_no_response(manifold.body_a);
        let no_response_b = physics.backend().is_no_response(manifold.body_b);

        if no_response_a || no_response_b {
            for (entity, other, other_no_response) in [(a, b, no_response_b), (b, a, no_response_a)] {
                if listens(world, entity, &TRIGGER_EVENTS) {
                    self.frame_collisions.insert(entity, other);
                    let is_new = self.collisions.insert(entity, other);
                    if is_new && !other_no_response {
                        fire(world, entity, &CollisionEvent::TriggerEnter(other), &mut self.commands);
                    }
                }
            }
            return;
        }

        let points = manifolds.points(manifold);
        if points.is_empty() {
            return;
        }

        let global = !self.contact_listeners.is_empty();
        let a_listens = listens(world, a, &COLLISION_EVENTS);
        let b_listens = listens(world, b, &COLLISION_EVENTS);
        if !(global || a_listens || b_listens) {
            return;
        }

        self.forward.clear();
        self.reverse.clear();
        for point in points {
            let slot = self.contact_points.allocate();
            if let Some(contact) = self.contact_points.get_mut(slot) {
                *contact = ContactPoint::forward(point);
            }
            self.forward.push(slot);

            if a_listens || b_listens {
                let slot = self.contact_points.allocate();
                if let Some(contact) = self.contact_points.get_mut(slot) {
                    *contact = ContactPoint::reverse(point);
                }
                self.reverse.push(slot);
            }

            if global {
                let slot = self.single_contacts.allocate();
                if let Some(single) = self.single_contacts.get_mut(slot) {
                    single.set(a, b, point);
                }
                if let Some(single) = self.single_contacts.get(slot) {
                    for listener in &mut self.contact_listeners {
                        listener(single, &mut self.commands);
                    }
                }
            }
        }

        if a_listens {
            self.deliver_contacts(world, a, b, false);
        }
        if b_listens {
            self.deliver_contacts(world, b, a, true);
        }
    }

    /// Build `entity`'s view of the current manifold, fire `contact` and, for
    /// a new pairing, `collisionstart`.
    fn deliver_contacts(&mut self, world: &World, entity: Entity, other: Entity, reverse: bool) {
        let slot = self.contact_results.allocate();
        let slots = if reverse { &self.reverse } else { &self.forward };
        let contact_points = &self.contact_points;
        if let Some(result) = self.contact_results.get_mut(slot) {
            result.set(
                other,
                slots.iter().filter_map(|&s| contact_points.get(s).copied()),
            );
        }
        let Some(result) = self.contact_results.get(slot) else {
            return;
        };

        fire(world, entity, &CollisionEvent::Contact(result), &mut self.commands);

        self.frame_collisions.insert(entity, other);
        if self.collisions.insert(entity, other) {
            fire(world, entity, &CollisionEvent::CollisionStart(result), &mut self.commands);
        }
    }

    /// Drop pairings that were not reported this step and fire end/leave events.
    fn reconcile(&mut self, world: &World) {
        let mut ended = std::mem::take(&mut self.ended);
        ended.clear();
        self.collisions.drain_ended(&self.frame_collisions, &mut ended);

        for &(entity, other) in &ended {
            if is_trigger(world, entity) {
                fire(world, entity, &CollisionEvent::TriggerLeave(other), &mut self.commands);
            } else if !is_trigger(world, other)
                && has_component(world, entity)
                && has_component(world, other)
            {
                fire(world, entity, &CollisionEvent::CollisionEnd(other), &mut self.commands);
            }
        }

        self.ended = ended;
    }

    /// Closest hit between two world-space points.
    pub fn raycast_first(&self, start: Vec3, end: Vec3) -> Option<RaycastResult> {
        let physics = self.physics.as_ref()?;
        let hit = physics.backend().cast_ray(start, end)?;
        let Some(entity) = self.owner(hit.body) else {
            tracing::debug!(body = ?hit.body, "raycast hit a body without owner");
            return None;
        };
        Some(RaycastResult {
            entity,
            point: hit.point,
            normal: hit.normal,
            hit_fraction: hit.fraction,
        })
    }

    /// Callback form of [`RigidBodySystem::raycast_first`]. The callback runs
    /// exactly once on a hit and never on a miss. Returns whether it ran.
    pub fn raycast_first_with<F>(&self, start: Vec3, end: Vec3, callback: F) -> bool
    where
        F: FnOnce(&RaycastResult),
    {
        match self.raycast_first(start, end) {
            Some(result) => {
                callback(&result);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for RigidBodySystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RigidBodySystem")
            .field("physics", &self.physics)
            .field("bodies", &self.owners.len())
            .field("collisions", &self.collisions)
            .field("contact_listeners", &self.contact_listeners.len())
            .finish_non_exhaustive()
    }
}

/// Dynamic bodies write their pose to the entity, kinematic bodies follow it.
fn sync_transforms(backend: &mut dyn DynamicsBackend, world: &mut World) {
    for (_, (component, transform)) in
        world.query_mut::<hecs::Without<(&RigidBodyComponent, &mut Transform), &Disabled>>()
    {
        if !component.enabled() || !component.in_simulation() {
            continue;
        }
        let Some(body) = component.body() else {
            continue;
        };
        if !backend.is_active(body) {
            continue;
        }
        match component.body_type() {
            RigidBodyType::Dynamic => {
                if let Some((position, rotation)) = backend.body_pose(body) {
                    transform.position = position;
                    transform.rotation = rotation;
                }
            }
            RigidBodyType::Kinematic => {
                backend.set_kinematic_target(body, transform.position, transform.rotation);
            }
            RigidBodyType::Static => {}
        }
    }
}

fn fire(world: &World, entity: Entity, event: &CollisionEvent<'_>, commands: &mut CommandBuffer) {
    if let Ok(mut listeners) = world.get::<&mut CollisionListeners>(entity) {
        listeners.fire(event, commands);
    }
}

fn listens(world: &World, entity: Entity, kinds: &[EventKind]) -> bool {
    world
        .get::<&CollisionListeners>(entity)
        .is_ok_and(|listeners| listeners.has_any(kinds))
}

fn is_trigger(world: &World, entity: Entity) -> bool {
    world
        .get::<&Collider>(entity)
        .is_ok_and(|collider| collider.is_sensor)
}

fn has_component(world: &World, entity: Entity) -> bool {
    world.satisfies::<&RigidBodyComponent>(entity).unwrap_or(false)
}
