//! Entity cells and caller-owned staging.

mod cell;
mod id;
mod stage;

pub use cell::Entity;
pub use id::EntityId;
pub use stage::Stage;
