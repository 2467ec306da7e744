//! Service layer: the `Verifier` implementation and the machinery behind it.

pub mod client;
pub mod dispatcher;
mod monitor;
pub mod pending;
pub mod registry;
mod session;
pub mod stats;

pub use client::VerifierClient;
pub use dispatcher::EventDispatcher;
pub use pending::PendingResponses;
pub use registry::{ConnectionRegistry, RegistryEntry};
pub use stats::{StatsSnapshot, VerifierStats};
