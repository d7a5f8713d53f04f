//! Contact data delivered to collision listeners.
//!
//! Contact points and results are pooled by the system and only valid for the
//! step that produced them.

use glam::Vec3;

use super::backend::ManifoldPoint;

/// A contact point seen from one of the two bodies.
///
/// `local_point`/`point` lie on the listening entity's body, `*_other` on the
/// other body. `normal` is the manifold normal in world space and is the same
/// vector for both viewpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContactPoint {
    pub local_point: Vec3,
    pub local_point_other: Vec3,
    pub point: Vec3,
    pub point_other: Vec3,
    pub normal: Vec3,
    /// Impulse applied by the solver at this point.
    pub impulse: f32,
}

impl ContactPoint {
    /// Viewpoint of body A.
    pub fn forward(p: &ManifoldPoint) -> Self {
        Self {
            local_point: p.local_point_a,
            local_point_other: p.local_point_b,
            point: p.point_a,
            point_other: p.point_b,
            normal: p.normal,
            impulse: p.impulse,
        }
    }

    /// Viewpoint of body B.
    pub fn reverse(p: &ManifoldPoint) -> Self {
        Self {
            local_point: p.local_point_b,
            local_point_other: p.local_point_a,
            point: p.point_b,
            point_other: p.point_a,
            normal: p.normal,
            impulse: p.impulse,
        }
    }
}

/// One contact point between two entities, delivered to global contact listeners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingleContactResult {
    pub a: hecs::Entity,
    pub b: hecs::Entity,
    pub local_point_a: Vec3,
    pub local_point_b: Vec3,
    pub point_a: Vec3,
    pub point_b: Vec3,
    pub normal: Vec3,
    pub impulse: f32,
}

impl SingleContactResult {
    pub(crate) fn set(&mut self, a: hecs::Entity, b: hecs::Entity, p: &ManifoldPoint) {
        self.a = a;
        self.b = b;
        self.local_point_a = p.local_point_a;
        self.local_point_b = p.local_point_b;
        self.point_a = p.point_a;
        self.point_b = p.point_b;
        self.normal = p.normal;
        self.impulse = p.impulse;
    }
}

impl Default for SingleContactResult {
    fn default() -> Self {
        Self {
            a: hecs::Entity::DANGLING,
            b: hecs::Entity::DANGLING,
            local_point_a: Vec3::ZERO,
            local_point_b: Vec3::ZERO,
            point_a: Vec3::ZERO,
            point_b: Vec3::ZERO,
            normal: Vec3::ZERO,
            impulse: 0.0,
        }
    }
}

/// Every contact point between the listening entity and `other` in one step.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactResult {
    pub other: hecs::Entity,
    pub contacts: Vec<ContactPoint>,
}

impl ContactResult {
    /// Overwrite this result in place, keeping the contact storage.
    pub(crate) fn set(
        &mut self,
        other: hecs::Entity,
        contacts: impl IntoIterator<Item = ContactPoint>,
    ) {
        self.other = other;
        self.contacts.clear();
        self.contacts.extend(contacts);
    }
}

impl Default for ContactResult {
    fn default() -> Self {
        Self {
            other: hecs::Entity::DANGLING,
            contacts: Vec::new(),
        }
    }
}

/// Closest hit of a raycast, resolved to the owning entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastResult {
    pub entity: hecs::Entity,
    /// World-space hit point.
    pub point: Vec3,
    /// World-space surface normal at the hit point.
    pub normal: Vec3,
    /// Fraction along the ray in `[0, 1]`.
    pub hit_fraction: f32,
}
