//! # Adapters
//!
//! | Adapter | Port |
//! |---------|------|
//! | `WebSocketTransport` | `Transport` |
//! | `InMemoryTransport` | `Transport` |
//! | `JwsAuthenticator` | `Authenticator` |
//! | `ChannelListener` | `EventListener` |

pub mod jws;
pub mod listener;
pub mod memory;
pub mod ws;

pub use jws::JwsAuthenticator;
pub use listener::ChannelListener;
pub use memory::{InMemoryTransport, ValidatorEndpoint};
pub use ws::{to_ws_url, WebSocketTransport};
