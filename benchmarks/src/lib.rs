//! Shared setup helpers for rein-rigidbody benchmarks.
//!
//! ## Running
//!
//!   cargo bench --manifest-path benchmarks/Cargo.toml --bench update
//!
//! Filter by group:
//!   cargo bench --manifest-path benchmarks/Cargo.toml --bench update -- pipeline

use glam::Vec3;
use rein_rigidbody::ecs::components::events::{CollisionListeners, EventKind};
use rein_rigidbody::ecs::components::physics::{Collider, ColliderShape, RigidBodyConfig};
use rein_rigidbody::ecs::components::transform::Transform;
use rein_rigidbody::{PhysicsConfig, RigidBodySystem};

pub const DT: f64 = 1.0 / 60.0;

/// Static ground slab whose top face is at y = 0.
pub fn spawn_ground(system: &mut RigidBodySystem, world: &mut hecs::World) -> hecs::Entity {
    let entity = world.spawn((
        Transform::from_position(Vec3::new(0.0, -0.5, 0.0)),
        Collider::new(ColliderShape::Box {
            half_extents: Vec3::new(200.0, 0.5, 200.0),
        }),
    ));
    system
        .add_component(world, entity, RigidBodyConfig::fixed())
        .expect("ground body");
    entity
}

/// Ground plus `n` dynamic spheres stacked in a grid of columns.
///
/// With `listen` set every sphere carries collision listeners so the
/// per-entity event path is exercised.
pub fn setup_scene(n: usize, listen: bool) -> (hecs::World, RigidBodySystem) {
    let mut world = hecs::World::new();
    let mut system = RigidBodySystem::with_default_backend(PhysicsConfig::default());
    spawn_ground(&mut system, &mut world);

    let cols = (n as f32).sqrt().ceil() as usize;
    for i in 0..n {
        let x = (i % cols) as f32 * 1.5;
        let z = (i / cols) as f32 * 1.5;
        let y = 1.0 + (i % 3) as f32 * 1.2;

        let entity = world.spawn((
            Transform::from_position(Vec3::new(x, y, z)),
            Collider::new(ColliderShape::Sphere { radius: 0.5 }),
        ));
        system
            .add_component(&mut world, entity, RigidBodyConfig::dynamic(1.0))
            .expect("sphere body");

        if listen {
            let listeners = CollisionListeners::new()
                .with(EventKind::CollisionStart, |_, _| {})
                .with(EventKind::Contact, |_, _| {})
                .with(EventKind::CollisionEnd, |_, _| {});
            world.insert_one(entity, listeners).expect("entity just spawned");
        }
    }
    (world, system)
}

/// Step a scene `frames` times.
pub fn run_frames(world: &mut hecs::World, system: &mut RigidBodySystem, frames: usize) {
    for _ in 0..frames {
        system.update(world, DT);
    }
}
