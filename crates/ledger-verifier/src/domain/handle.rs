//! Connection handles for registered monitor connections.

use crate::domain::errors::HandleError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque integer naming a registered, still-open connection.
///
/// Valid only between registration and removal. A removed handle's numeric
/// value may be handed out again by a later registration, so it must not be
/// kept as identity across a remove/add pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionHandle(usize);

impl ConnectionHandle {
    /// Wrap a raw slot index.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Slot index.
    pub const fn index(&self) -> usize {
        self.0
    }

    /// Parse the string form returned in a monitor-start `LedgerEvent`.
    pub fn parse(s: &str) -> Result<Self, HandleError> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| HandleError::Unparseable(s.to_string()))?;
        if value < 0 {
            return Err(HandleError::Negative(value));
        }
        usize::try_from(value)
            .map(Self)
            .map_err(|_| HandleError::Unparseable(s.to_string()))
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
