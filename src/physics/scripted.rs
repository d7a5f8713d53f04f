//! Deterministic dynamics backend for tests.
//!
//! Nothing is simulated: tests script poses, manifolds and ray hits through
//! the shared [`ScriptState`] and inspect what the component layer asked for.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::{Quat, Vec3};
use parking_lot::{Mutex, MutexGuard};

use crate::ecs::components::physics::RigidBodyType;

use super::backend::{
    BodyDesc, BodyHandle, CollisionFilter, ConstraintHandle, DynamicsBackend, JointDesc,
    ManifoldBuffer, ManifoldPoint, RayHit,
};
use super::error::{PhysicsError, Result};

#[derive(Debug, Clone)]
pub(crate) struct ScriptedBody {
    pub desc: BodyDesc,
    pub in_world: bool,
    pub filter: CollisionFilter,
    pub position: Vec3,
    pub rotation: Quat,
    pub active: bool,
    pub kinematic_target: Option<(Vec3, Quat)>,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub force: Vec3,
    pub torque: Vec3,
}

#[derive(Debug, Clone)]
pub(crate) struct ScriptedManifold {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub points: Vec<ManifoldPoint>,
}

#[derive(Debug, Default)]
pub(crate) struct ScriptState {
    pub bodies: BTreeMap<BodyHandle, ScriptedBody>,
    pub constraints: BTreeMap<ConstraintHandle, (BodyHandle, BodyHandle, JointDesc)>,
    pub gravity: Vec3,
    /// Every `dt` passed to `step`.
    pub steps: Vec<f32>,
    /// Manifolds reported after every step until replaced.
    pub manifolds: Vec<ScriptedManifold>,
    pub ray_hit: Option<RayHit>,
    pub rays_cast: usize,
    pub destroyed: usize,
    next_id: u64,
}

impl ScriptState {
    pub fn body(&self, handle: BodyHandle) -> &ScriptedBody {
        self.bodies.get(&handle).expect("unknown scripted body")
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> &mut ScriptedBody {
        self.bodies.get_mut(&handle).expect("unknown scripted body")
    }

    /// Report a manifold between two bodies with `count` contact points.
    pub fn touch(&mut self, body_a: BodyHandle, body_b: BodyHandle, count: usize) {
        let points = (0..count)
            .map(|i| {
                let x = i as f32;
                ManifoldPoint {
                    local_point_a: Vec3::new(x, -0.5, 0.0),
                    local_point_b: Vec3::new(x, 0.5, 0.0),
                    point_a: Vec3::new(x, 0.5, 0.0),
                    point_b: Vec3::new(x, 0.49, 0.0),
                    normal: Vec3::NEG_Y,
                    impulse: 1.0 + x,
                }
            })
            .collect();
        self.manifolds.push(ScriptedManifold {
            body_a,
            body_b,
            points,
        });
    }

    pub fn separate_all(&mut self) {
        self.manifolds.clear();
    }
}

/// Cloneable handle to a scripted engine. Clones share state.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedBackend {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock()
    }
}

impl DynamicsBackend for ScriptedBackend {
    fn create_body(&mut self, desc: &BodyDesc) -> Result<BodyHandle> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let handle = BodyHandle(state.next_id);
        state.bodies.insert(
            handle,
            ScriptedBody {
                desc: desc.clone(),
                in_world: false,
                filter: CollisionFilter::ALL,
                position: desc.position,
                rotation: desc.rotation,
                active: true,
                kinematic_target: None,
                linear_velocity: Vec3::ZERO,
                angular_velocity: Vec3::ZERO,
                force: Vec3::ZERO,
                torque: Vec3::ZERO,
            },
        );
        Ok(handle)
    }

    fn destroy_body(&mut self, body: BodyHandle) -> bool {
        let mut state = self.state.lock();
        if state.bodies.remove(&body).is_some() {
            state.destroyed += 1;
            true
        } else {
            false
        }
    }

    fn add_body(&mut self, body: BodyHandle, filter: CollisionFilter) -> Result<()> {
        let mut state = self.state.lock();
        let scripted = state
            .bodies
            .get_mut(&body)
            .ok_or(PhysicsError::UnknownBody(body))?;
        scripted.in_world = true;
        scripted.filter = filter;
        Ok(())
    }

    fn remove_body(&mut self, body: BodyHandle) -> bool {
        let mut state = self.state.lock();
        match state.bodies.get_mut(&body) {
            Some(scripted) if scripted.in_world => {
                scripted.in_world = false;
                true
            }
            _ => false,
        }
    }

    fn add_constraint(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        joint: &JointDesc,
    ) -> Result<ConstraintHandle> {
        let mut state = self.state.lock();
        for body in [body_a, body_b] {
            if !state.bodies.contains_key(&body) {
                return Err(PhysicsError::UnknownBody(body));
            }
        }
        state.next_id += 1;
        let handle = ConstraintHandle(state.next_id);
        state.constraints.insert(handle, (body_a, body_b, *joint));
        Ok(handle)
    }

    fn remove_constraint(&mut self, constraint: ConstraintHandle) -> bool {
        self.state.lock().constraints.remove(&constraint).is_some()
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.state.lock().gravity = gravity;
    }

    fn step(&mut self, dt: f32) {
        let mut state = self.state.lock();
        state.steps.push(dt);
        for body in state.bodies.values_mut().filter(|b| b.in_world) {
            match body.desc.body_type {
                RigidBodyType::Kinematic => {
                    if let Some((position, rotation)) = body.kinematic_target.take() {
                        body.position = position;
                        body.rotation = rotation;
                    }
                }
                RigidBodyType::Dynamic => {
                    body.position += body.linear_velocity * dt;
                }
                RigidBodyType::Static => {}
            }
        }
    }

    fn collect_manifolds(&self, out: &mut ManifoldBuffer) {
        out.clear();
        let state = self.state.lock();
        for manifold in &state.manifolds {
            let in_world = |h: &BodyHandle| state.bodies.get(h).is_some_and(|b| b.in_world);
            if in_world(&manifold.body_a) && in_world(&manifold.body_b) {
                out.push(
                    manifold.body_a,
                    manifold.body_b,
                    manifold.points.iter().copied(),
                );
            }
        }
    }

    fn is_active(&self, body: BodyHandle) -> bool {
        self.state.lock().bodies.get(&body).is_some_and(|b| b.active)
    }

    fn is_no_response(&self, body: BodyHandle) -> bool {
        self.state
            .lock()
            .bodies
            .get(&body)
            .is_some_and(|b| b.desc.is_no_response())
    }

    fn body_pose(&self, body: BodyHandle) -> Option<(Vec3, Quat)> {
        self.state
            .lock()
            .bodies
            .get(&body)
            .map(|b| (b.position, b.rotation))
    }

    fn set_kinematic_target(&mut self, body: BodyHandle, position: Vec3, rotation: Quat) {
        if let Some(b) = self.state.lock().bodies.get_mut(&body) {
            b.kinematic_target = Some((position, rotation));
        }
    }

    fn teleport(&mut self, body: BodyHandle, position: Vec3, rotation: Quat) -> Result<()> {
        let mut state = self.state.lock();
        let b = state
            .bodies
            .get_mut(&body)
            .ok_or(PhysicsError::UnknownBody(body))?;
        b.position = position;
        b.rotation = rotation;
        b.active = true;
        Ok(())
    }

    fn apply_force(&mut self, body: BodyHandle, force: Vec3) -> Result<()> {
        self.with_body(body, |b| b.force += force)
    }

    fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec3) -> Result<()> {
        self.with_body(body, |b| b.linear_velocity += impulse / b.desc.mass.max(f32::EPSILON))
    }

    fn apply_torque(&mut self, body: BodyHandle, torque: Vec3) -> Result<()> {
        self.with_body(body, |b| b.torque += torque)
    }

    fn apply_torque_impulse(&mut self, body: BodyHandle, impulse: Vec3) -> Result<()> {
        self.with_body(body, |b| b.angular_velocity += impulse)
    }

    fn linear_velocity(&self, body: BodyHandle) -> Option<Vec3> {
        self.state.lock().bodies.get(&body).map(|b| b.linear_velocity)
    }

    fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec3) -> Result<()> {
        self.with_body(body, |b| b.linear_velocity = velocity)
    }

    fn angular_velocity(&self, body: BodyHandle) -> Option<Vec3> {
        self.state.lock().bodies.get(&body).map(|b| b.angular_velocity)
    }

    fn set_angular_velocity(&mut self, body: BodyHandle, velocity: Vec3) -> Result<()> {
        self.with_body(body, |b| b.angular_velocity = velocity)
    }

    fn cast_ray(&self, _from: Vec3, _to: Vec3) -> Option<RayHit> {
        let mut state = self.state.lock();
        state.rays_cast += 1;
        let hit = state.ray_hit?;
        state
            .bodies
            .get(&hit.body)
            .is_some_and(|b| b.in_world)
            .then_some(hit)
    }
}

impl ScriptedBackend {
    fn with_body(&mut self, body: BodyHandle, f: impl FnOnce(&mut ScriptedBody)) -> Result<()> {
        let mut state = self.state.lock();
        let b = state
            .bodies
            .get_mut(&body)
            .ok_or(PhysicsError::UnknownBody(body))?;
        f(b);
        Ok(())
    }
}
