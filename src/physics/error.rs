//! Error types for the rigid-body layer.

use thiserror::Error;

use super::backend::BodyHandle;

/// Errors from the dynamics world and the component lifecycle.
#[derive(Debug, Error, PartialEq)]
pub enum PhysicsError {
    #[error("no dynamics engine is available")]
    EngineUnavailable,

    #[error("unknown body {0:?}")]
    UnknownBody(BodyHandle),

    #[error("body {0:?} is not in the simulation world")]
    BodyNotInWorld(BodyHandle),

    #[error("entity {0:?} has no rigid body component")]
    MissingComponent(hecs::Entity),

    #[error("entity {0:?} has no simulation body")]
    NoBody(hecs::Entity),

    #[error("entity {0:?} does not exist")]
    NoSuchEntity(hecs::Entity),

    #[error("invalid collider shape: {0}")]
    InvalidShape(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Rejected rigid body configuration values.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("mass must be finite and non-negative, got {0}")]
    InvalidMass(f32),

    #[error("dynamic bodies need a positive mass")]
    ZeroDynamicMass,

    #[error("{field} must be within [0, 1], got {value}")]
    DampingOutOfRange { field: &'static str, value: f32 },

    #[error("{field} has a non-finite component")]
    NonFiniteFactor { field: &'static str },

    #[error("friction must be finite and non-negative, got {0}")]
    InvalidFriction(f32),

    #[error("restitution must be finite and non-negative, got {0}")]
    InvalidRestitution(f32),

    #[error("fixed timestep must be positive, got {0}")]
    InvalidTimestep(f64),
}

pub type Result<T> = std::result::Result<T, PhysicsError>;
