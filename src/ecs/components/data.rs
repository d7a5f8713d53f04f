//! Serialized rigid body properties.

use std::sync::Once;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::physics::{RigidBodyConfig, RigidBodyType};
use crate::physics::error::ConfigError;

static BODY_TYPE_DEPRECATION: Once = Once::new();

/// Rigid body properties as found in scene files.
///
/// Only the fields below are read; anything else in the source is ignored.
/// Factors are `[x, y, z]` arrays. The legacy `bodyType` key is still
/// accepted and takes precedence over `type`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RigidBodyData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub body_type: Option<RigidBodyType>,
    #[serde(rename = "bodyType", skip_serializing)]
    pub legacy_body_type: Option<RigidBodyType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mass: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linear_damping: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angular_damping: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linear_factor: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angular_factor: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friction: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restitution: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<u32>,
}

impl RigidBodyData {
    /// Body type after applying the legacy key.
    pub fn resolved_body_type(&self) -> Option<RigidBodyType> {
        if let Some(legacy) = self.legacy_body_type {
            BODY_TYPE_DEPRECATION.call_once(|| {
                tracing::warn!("rigid body property 'bodyType' is deprecated, use 'type' instead");
            });
            return Some(legacy);
        }
        self.body_type
    }

    /// Build a validated configuration. Missing fields keep their defaults;
    /// group and mask default to the body type's values.
    pub fn into_config(&self) -> Result<RigidBodyConfig, ConfigError> {
        let mut config = RigidBodyConfig::default();
        if let Some(body_type) = self.resolved_body_type() {
            config.set_body_type(body_type);
        }
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(mass) = self.mass {
            config.mass = mass;
        }
        if let Some(damping) = self.linear_damping {
            config.linear_damping = damping;
        }
        if let Some(damping) = self.angular_damping {
            config.angular_damping = damping;
        }
        if let Some(factor) = self.linear_factor {
            config.linear_factor = factor;
        }
        if let Some(factor) = self.angular_factor {
            config.angular_factor = factor;
        }
        if let Some(friction) = self.friction {
            config.friction = friction;
        }
        if let Some(restitution) = self.restitution {
            config.restitution = restitution;
        }
        if let Some(group) = self.group {
            config.group = group;
        }
        if let Some(mask) = self.mask {
            config.mask = mask;
        }
        config.validate()?;
        Ok(config)
    }
}

impl From<&RigidBodyConfig> for RigidBodyData {
    fn from(config: &RigidBodyConfig) -> Self {
        Self {
            enabled: Some(config.enabled),
            body_type: Some(config.body_type),
            legacy_body_type: None,
            mass: Some(config.mass),
            linear_damping: Some(config.linear_damping),
            angular_damping: Some(config.angular_damping),
            linear_factor: Some(config.linear_factor),
            angular_factor: Some(config.angular_factor),
            friction: Some(config.friction),
            restitution: Some(config.restitution),
            group: Some(config.group),
            mask: Some(config.mask),
        }
    }
}
