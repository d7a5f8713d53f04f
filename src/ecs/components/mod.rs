//! ECS components (transform, rigid body, collider, collision listeners).

#[cfg(feature = "serde")]
pub mod data;
pub mod events;
pub mod physics;
pub mod transform;

#[cfg(feature = "serde")]
pub use data::*;
pub use events::*;
pub use physics::*;
pub use transform::*;
