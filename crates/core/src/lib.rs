//! Decision core of the irrigation controller.
//!
//! Everything in this crate is synchronous and driven by the caller's clock:
//! each operation that depends on time takes an explicit `Instant`, and all
//! hardware access goes through the port traits in [`hw`].  The hub binary
//! owns the async runtime, persistence and the HTTP surface.

pub mod alert;
pub mod controller;
pub mod env;
pub mod error;
pub mod hw;
pub mod policy;
pub mod registry;
pub mod scheduler;
pub mod sensor;

pub use controller::{Controller, ControllerEvent, Settings};
pub use error::ControlError;
pub use registry::{Plant, PlantId, PlantRecord, PlantRegistry};

/// Number of physical sensor + pump slots.
pub const MAX_ZONES: usize = 4;
