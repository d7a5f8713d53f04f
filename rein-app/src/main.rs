//! Headless demo: balls dropped onto a ground slab through a trigger zone.
//!
//!   RUST_LOG=info cargo run --manifest-path rein-app/Cargo.toml

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Context;
use glam::Vec3;
use rein_rigidbody::ecs::components::events::{CollisionEvent, CollisionListeners, EventKind};
use rein_rigidbody::ecs::components::physics::{Collider, ColliderShape, RigidBodyConfig};
use rein_rigidbody::ecs::components::transform::Transform;
use rein_rigidbody::{PhysicsConfig, RigidBodySystem};

const FRAME_TIME: f64 = 1.0 / 60.0;
const FRAMES: usize = 240;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut world = hecs::World::new();
    let mut system = RigidBodySystem::with_default_backend(PhysicsConfig::default());
    anyhow::ensure!(system.is_simulating(), "no dynamics engine compiled in");

    // Ground
    let ground = world.spawn((
        Transform::from_position(Vec3::new(0.0, -0.5, 0.0)),
        Collider::new(ColliderShape::Box {
            half_extents: Vec3::new(20.0, 0.5, 20.0),
        }),
    ));
    system.add_component(&mut world, ground, RigidBodyConfig::fixed())?;

    // Trigger zone halfway down
    let zone = world.spawn((
        Transform::from_position(Vec3::new(0.0, 3.0, 0.0)),
        Collider::sensor(ColliderShape::Box {
            half_extents: Vec3::new(4.0, 0.5, 4.0),
        }),
        CollisionListeners::new()
            .with(EventKind::TriggerEnter, |event, _| {
                log::info!("zone entered by {:?}", event.other());
            })
            .with(EventKind::TriggerLeave, |event, _| {
                log::info!("zone left by {:?}", event.other());
            }),
    ));
    system.add_component(&mut world, zone, RigidBodyConfig::fixed())?;

    // Balls
    let landed = Arc::new(AtomicUsize::new(0));
    let mut balls = Vec::new();
    for i in 0..5 {
        let landed = landed.clone();
        let listeners = CollisionListeners::new()
            .with(EventKind::CollisionStart, move |event, _| {
                if let CollisionEvent::CollisionStart(result) = event {
                    landed.fetch_add(1, Ordering::Relaxed);
                    log::info!(
                        "ball {i} hit {:?} at {} points",
                        result.other,
                        result.contacts.len()
                    );
                }
            })
            .with(EventKind::CollisionEnd, move |event, _| {
                log::info!("ball {i} separated from {:?}", event.other());
            });

        let ball = world.spawn((
            Transform::from_position(Vec3::new(i as f32 * 1.5 - 3.0, 6.0 + i as f32, 0.0)),
            Collider::new(ColliderShape::Sphere { radius: 0.5 }),
            listeners,
        ));
        system.add_component(&mut world, ball, RigidBodyConfig::dynamic(1.0))?;
        balls.push(ball);
    }

    let contacts = Arc::new(AtomicUsize::new(0));
    {
        let contacts = contacts.clone();
        system.on_contact(move |_, _| {
            contacts.fetch_add(1, Ordering::Relaxed);
        });
    }

    // Kick the first ball sideways once it is simulated
    let first = *balls.first().context("no balls spawned")?;
    system.apply_impulse(&world, first, Vec3::new(2.0, 0.0, 0.0))?;

    for _ in 0..FRAMES {
        system.update(&mut world, FRAME_TIME);
    }

    for &ball in &balls {
        let position = world.get::<&Transform>(ball)?.position;
        log::info!("{ball:?} rests at {position}");
    }

    let probe = system
        .raycast_first(Vec3::new(0.0, 20.0, 0.0), Vec3::new(0.0, -20.0, 0.0))
        .context("raycast missed the scene")?;
    log::info!(
        "raycast hit {:?} at {} (fraction {:.3})",
        probe.entity,
        probe.point,
        probe.hit_fraction
    );

    println!(
        "{} collisions started, {} contact points reported over {FRAMES} frames",
        landed.load(Ordering::Relaxed),
        contacts.load(Ordering::Relaxed)
    );
    Ok(())
}
