//! [`DynamicsBackend`] on top of rapier3d.
//!
//! Each body is one rapier rigid body with one attached collider. A body that
//! is created but not in the simulation keeps its rapier objects outside the
//! sets, so removing and re-adding it preserves its state.

use std::collections::HashMap;

use glam::{Quat, Vec3};
use rapier3d::na::{Quaternion, Translation3, UnitQuaternion};
use rapier3d::prelude::*;

use crate::ecs::components::physics::{ColliderShape, RigidBodyType as BodyType};

use super::backend::{
    BodyDesc, BodyHandle, CollisionFilter, ConstraintHandle, DynamicsBackend, JointDesc,
    ManifoldBuffer, ManifoldPoint, RayHit,
};
use super::error::{PhysicsError, Result};

enum Slot {
    Detached {
        body: RigidBody,
        collider: Collider,
    },
    Attached {
        body: RigidBodyHandle,
        collider: ColliderHandle,
    },
}

struct RapierBody {
    slot: Slot,
    no_response: bool,
}

/// Rapier-backed dynamics world.
pub struct RapierBackend {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,

    bodies: HashMap<BodyHandle, RapierBody>,
    collider_owners: HashMap<ColliderHandle, BodyHandle>,
    joints: HashMap<ConstraintHandle, ImpulseJointHandle>,
    next_handle: u64,
}

impl RapierBackend {
    pub fn new() -> Self {
        Self {
            gravity: vector![0.0, -9.81, 0.0],
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            bodies: HashMap::new(),
            collider_owners: HashMap::new(),
            joints: HashMap::new(),
            next_handle: 1,
        }
    }

    fn rigid_body(&self, body: BodyHandle) -> Option<&RigidBody> {
        match &self.bodies.get(&body)?.slot {
            Slot::Detached { body, .. } => Some(body),
            Slot::Attached { body, .. } => self.rigid_body_set.get(*body),
        }
    }

    fn rigid_body_mut(&mut self, body: BodyHandle) -> Result<&mut RigidBody> {
        let entry = self
            .bodies
            .get_mut(&body)
            .ok_or(PhysicsError::UnknownBody(body))?;
        match &mut entry.slot {
            Slot::Detached { body, .. } => Ok(body),
            Slot::Attached { body: handle, .. } => self
                .rigid_body_set
                .get_mut(*handle)
                .ok_or(PhysicsError::UnknownBody(body)),
        }
    }

    fn attached_handle(&self, body: BodyHandle) -> Result<RigidBodyHandle> {
        match &self
            .bodies
            .get(&body)
            .ok_or(PhysicsError::UnknownBody(body))?
            .slot
        {
            Slot::Attached { body, .. } => Ok(*body),
            Slot::Detached { .. } => Err(PhysicsError::BodyNotInWorld(body)),
        }
    }

    fn owner_of(&self, collider: ColliderHandle) -> Option<BodyHandle> {
        self.collider_owners.get(&collider).copied()
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_handle;
        self.next_handle += 1;
        id
    }
}

impl Default for RapierBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn to_vector(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

fn to_point(v: Vec3) -> Point<Real> {
    point![v.x, v.y, v.z]
}

fn to_isometry(position: Vec3, rotation: Quat) -> Isometry<Real> {
    let rotation = UnitQuaternion::from_quaternion(Quaternion::new(
        rotation.w, rotation.x, rotation.y, rotation.z,
    ));
    Isometry::from_parts(Translation3::new(position.x, position.y, position.z), rotation)
}

fn from_vector(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

fn from_isometry(iso: &Isometry<Real>) -> (Vec3, Quat) {
    let c = iso.rotation.coords;
    (
        from_vector(&iso.translation.vector),
        Quat::from_xyzw(c.x, c.y, c.z, c.w),
    )
}

fn build_shape(shape: &ColliderShape) -> Result<SharedShape> {
    Ok(match shape {
        ColliderShape::Sphere { radius } => SharedShape::ball(*radius),
        ColliderShape::Box { half_extents } => {
            SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z)
        }
        ColliderShape::Capsule {
            radius,
            half_height,
        } => SharedShape::capsule_y(*half_height, *radius),
        ColliderShape::Cylinder {
            radius,
            half_height,
        } => SharedShape::cylinder(*half_height, *radius),
        ColliderShape::ConvexHull { points } => {
            let points: Vec<Point<Real>> = points.iter().map(|p| to_point(*p)).collect();
            SharedShape::convex_hull(&points).ok_or(PhysicsError::InvalidShape(
                "convex hull needs at least four non-coplanar points",
            ))?
        }
    })
}

/// Axes whose motion factor is zero are locked.
fn locked_axes(desc: &BodyDesc) -> LockedAxes {
    let mut axes = LockedAxes::empty();
    let flags = [
        (desc.linear_factor.x, LockedAxes::TRANSLATION_LOCKED_X),
        (desc.linear_factor.y, LockedAxes::TRANSLATION_LOCKED_Y),
        (desc.linear_factor.z, LockedAxes::TRANSLATION_LOCKED_Z),
        (desc.angular_factor.x, LockedAxes::ROTATION_LOCKED_X),
        (desc.angular_factor.y, LockedAxes::ROTATION_LOCKED_Y),
        (desc.angular_factor.z, LockedAxes::ROTATION_LOCKED_Z),
    ];
    for (factor, flag) in flags {
        if factor == 0.0 {
            axes |= flag;
        }
    }
    axes
}

fn interaction_groups(filter: CollisionFilter) -> InteractionGroups {
    InteractionGroups::new(
        Group::from_bits_truncate(filter.group),
        Group::from_bits_truncate(filter.mask),
    )
}

impl DynamicsBackend for RapierBackend {
    fn create_body(&mut self, desc: &BodyDesc) -> Result<BodyHandle> {
        let shape = build_shape(&desc.collider.shape)?;

        let builder = match desc.body_type {
            BodyType::Static => RigidBodyBuilder::fixed(),
            BodyType::Dynamic => RigidBodyBuilder::dynamic(),
            BodyType::Kinematic => RigidBodyBuilder::kinematic_position_based().can_sleep(false),
        };
        let body = builder
            .position(to_isometry(desc.position, desc.rotation))
            .linear_damping(desc.linear_damping)
            .angular_damping(desc.angular_damping)
            .locked_axes(locked_axes(desc))
            .build();

        let mut collider = ColliderBuilder::new(shape)
            .translation(to_vector(desc.collider.offset))
            .friction(desc.friction)
            .restitution(desc.restitution)
            .sensor(desc.collider.is_sensor);
        if desc.body_type == BodyType::Dynamic {
            collider = collider.mass(desc.mass);
        }

        let handle = BodyHandle(self.next_id());
        self.bodies.insert(
            handle,
            RapierBody {
                slot: Slot::Detached {
                    body,
                    collider: collider.build(),
                },
                no_response: desc.collider.is_sensor,
            },
        );
        Ok(handle)
    }

    fn destroy_body(&mut self, body: BodyHandle) -> bool {
        self.remove_body(body);
        self.bodies.remove(&body).is_some()
    }

    fn add_body(&mut self, body: BodyHandle, filter: CollisionFilter) -> Result<()> {
        let entry = self
            .bodies
            .get_mut(&body)
            .ok_or(PhysicsError::UnknownBody(body))?;
        let groups = interaction_groups(filter);

        let slot = std::mem::replace(
            &mut entry.slot,
            Slot::Attached {
                body: RigidBodyHandle::invalid(),
                collider: ColliderHandle::invalid(),
            },
        );
        entry.slot = match slot {
            Slot::Detached {
                body: rigid_body,
                mut collider,
            } => {
                collider.set_collision_groups(groups);
                let body_handle = self.rigid_body_set.insert(rigid_body);
                let collider_handle = self.collider_set.insert_with_parent(
                    collider,
                    body_handle,
                    &mut self.rigid_body_set,
                );
                self.collider_owners.insert(collider_handle, body);
                Slot::Attached {
                    body: body_handle,
                    collider: collider_handle,
                }
            }
            attached @ Slot::Attached { collider, .. } => {
                if let Some(c) = self.collider_set.get_mut(collider) {
                    c.set_collision_groups(groups);
                }
                attached
            }
        };
        Ok(())
    }

    fn remove_body(&mut self, body: BodyHandle) -> bool {
        let Some(entry) = self.bodies.get_mut(&body) else {
            return false;
        };
        let Slot::Attached {
            body: body_handle,
            collider: collider_handle,
        } = entry.slot
        else {
            return false;
        };

        self.collider_owners.remove(&collider_handle);
        let collider = self.collider_set.remove(
            collider_handle,
            &mut self.island_manager,
            &mut self.rigid_body_set,
            false,
        );
        let rigid_body = self.rigid_body_set.remove(
            body_handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );

        match (rigid_body, collider) {
            (Some(rigid_body), Some(collider)) => {
                entry.slot = Slot::Detached {
                    body: rigid_body,
                    collider,
                };
                true
            }
            _ => {
                tracing::warn!(?body, "rapier lost track of a body, dropping it");
                self.bodies.remove(&body);
                false
            }
        }
    }

    fn add_constraint(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        joint: &JointDesc,
    ) -> Result<ConstraintHandle> {
        let handle_a = self.attached_handle(body_a)?;
        let handle_b = self.attached_handle(body_b)?;

        let generic: GenericJoint = match joint {
            JointDesc::Fixed { anchor_a, anchor_b } => FixedJointBuilder::new()
                .local_anchor1(to_point(*anchor_a))
                .local_anchor2(to_point(*anchor_b))
                .build()
                .into(),
            JointDesc::Spherical { anchor_a, anchor_b } => SphericalJointBuilder::new()
                .local_anchor1(to_point(*anchor_a))
                .local_anchor2(to_point(*anchor_b))
                .build()
                .into(),
            JointDesc::Revolute {
                axis,
                anchor_a,
                anchor_b,
            } => RevoluteJointBuilder::new(UnitVector::new_normalize(to_vector(*axis)))
                .local_anchor1(to_point(*anchor_a))
                .local_anchor2(to_point(*anchor_b))
                .build()
                .into(),
        };

        let joint_handle = self
            .impulse_joint_set
            .insert(handle_a, handle_b, generic, true);
        let handle = ConstraintHandle(self.next_id());
        self.joints.insert(handle, joint_handle);
        Ok(handle)
    }

    fn remove_constraint(&mut self, constraint: ConstraintHandle) -> bool {
        self.joints
            .remove(&constraint)
            .and_then(|joint| self.impulse_joint_set.remove(joint, true))
            .is_some()
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = to_vector(gravity);
    }

    fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;

        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    fn collect_manifolds(&self, out: &mut ManifoldBuffer) {
        out.clear();

        for pair in self.narrow_phase.contact_pairs() {
            if !pair.has_any_active_contact {
                continue;
            }
            let (Some(body_a), Some(body_b)) =
                (self.owner_of(pair.collider1), self.owner_of(pair.collider2))
            else {
                continue;
            };
            let (Some(collider_a), Some(collider_b)) = (
                self.collider_set.get(pair.collider1),
                self.collider_set.get(pair.collider2),
            ) else {
                continue;
            };
            let (Some(rb_a), Some(rb_b)) = (self.rigid_body(body_a), self.rigid_body(body_b))
            else {
                continue;
            };

            let (iso_a, iso_b) = (collider_a.position(), collider_b.position());
            let (body_iso_a, body_iso_b) = (rb_a.position(), rb_b.position());

            let points = pair
                .manifolds
                .iter()
                .filter(|manifold| !manifold.data.solver_contacts.is_empty())
                .flat_map(|manifold| {
                    let normal = from_vector(&manifold.data.normal);
                    manifold.points.iter().map(move |contact| {
                        let world_a = iso_a * contact.local_p1;
                        let world_b = iso_b * contact.local_p2;
                        let local_a = body_iso_a.inverse_transform_point(&world_a);
                        let local_b = body_iso_b.inverse_transform_point(&world_b);
                        ManifoldPoint {
                            local_point_a: from_vector(&local_a.coords),
                            local_point_b: from_vector(&local_b.coords),
                            point_a: from_vector(&world_a.coords),
                            point_b: from_vector(&world_b.coords),
                            normal,
                            impulse: contact.data.impulse,
                        }
                    })
                });
            out.push(body_a, body_b, points);
        }

        for (collider1, collider2, intersecting) in self.narrow_phase.intersection_pairs() {
            if !intersecting {
                continue;
            }
            if let (Some(body_a), Some(body_b)) = (self.owner_of(collider1), self.owner_of(collider2))
            {
                out.push(body_a, body_b, []);
            }
        }
    }

    fn is_active(&self, body: BodyHandle) -> bool {
        match self.bodies.get(&body).map(|b| &b.slot) {
            Some(Slot::Attached { body, .. }) => self
                .rigid_body_set
                .get(*body)
                .is_some_and(|rb| !rb.is_sleeping()),
            _ => false,
        }
    }

    fn is_no_response(&self, body: BodyHandle) -> bool {
        self.bodies.get(&body).is_some_and(|b| b.no_response)
    }

    fn body_pose(&self, body: BodyHandle) -> Option<(Vec3, Quat)> {
        self.rigid_body(body).map(|rb| from_isometry(rb.position()))
    }

    fn set_kinematic_target(&mut self, body: BodyHandle, position: Vec3, rotation: Quat) {
        if let Ok(rb) = self.rigid_body_mut(body) {
            rb.set_next_kinematic_position(to_isometry(position, rotation));
        }
    }

    fn teleport(&mut self, body: BodyHandle, position: Vec3, rotation: Quat) -> Result<()> {
        let rb = self.rigid_body_mut(body)?;
        rb.set_position(to_isometry(position, rotation), true);
        Ok(())
    }

    fn apply_force(&mut self, body: BodyHandle, force: Vec3) -> Result<()> {
        self.rigid_body_mut(body)?.add_force(to_vector(force), true);
        Ok(())
    }

    fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec3) -> Result<()> {
        self.rigid_body_mut(body)?
            .apply_impulse(to_vector(impulse), true);
        Ok(())
    }

    fn apply_torque(&mut self, body: BodyHandle, torque: Vec3) -> Result<()> {
        self.rigid_body_mut(body)?.add_torque(to_vector(torque), true);
        Ok(())
    }

    fn apply_torque_impulse(&mut self, body: BodyHandle, impulse: Vec3) -> Result<()> {
        self.rigid_body_mut(body)?
            .apply_torque_impulse(to_vector(impulse), true);
        Ok(())
    }

    fn linear_velocity(&self, body: BodyHandle) -> Option<Vec3> {
        self.rigid_body(body).map(|rb| from_vector(rb.linvel()))
    }

    fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec3) -> Result<()> {
        self.rigid_body_mut(body)?
            .set_linvel(to_vector(velocity), true);
        Ok(())
    }

    fn angular_velocity(&self, body: BodyHandle) -> Option<Vec3> {
        self.rigid_body(body).map(|rb| from_vector(rb.angvel()))
    }

    fn set_angular_velocity(&mut self, body: BodyHandle, velocity: Vec3) -> Result<()> {
        self.rigid_body_mut(body)?
            .set_angvel(to_vector(velocity), true);
        Ok(())
    }

    fn cast_ray(&self, from: Vec3, to: Vec3) -> Option<RayHit> {
        let dir = to - from;
        if dir.length_squared() <= f32::EPSILON {
            return None;
        }
        let ray = Ray::new(to_point(from), to_vector(dir));
        let (collider, hit) = self.query_pipeline.cast_ray_and_get_normal(
            &self.rigid_body_set,
            &self.collider_set,
            &ray,
            1.0,
            true,
            QueryFilter::default(),
        )?;
        let body = self.owner_of(collider)?;
        Some(RayHit {
            body,
            point: from + dir * hit.time_of_impact,
            normal: from_vector(&hit.normal),
            fraction: hit.time_of_impact,
        })
    }
}
