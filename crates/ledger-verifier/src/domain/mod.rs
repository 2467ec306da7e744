//! Domain layer: pure types and rules, no I/O.

pub mod config;
pub mod descriptor;
pub mod envelope;
pub mod errors;
pub mod events;
pub mod handle;
pub mod request_id;
pub mod state;

pub use config::*;
pub use descriptor::*;
pub use envelope::*;
pub use errors::*;
pub use events::*;
pub use handle::*;
pub use request_id::*;
pub use state::*;
