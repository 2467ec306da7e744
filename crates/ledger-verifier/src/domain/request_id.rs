//! Request identifiers.
//!
//! `"{validatorId}_{counter}"`, counter starting at 1 and wrapping back to 1
//! once it would exceed the configured ceiling. Unique within one wrap cycle
//! of one `VerifierClient`; not across restarts.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier correlating a request envelope with its response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Wrap an identifier received off the wire.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// String form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-client request id source.
pub struct RequestIdGenerator {
    validator_id: String,
    max_counter: u64,
    counter: Mutex<u64>,
}

impl RequestIdGenerator {
    /// Create a generator for `validator_id`; a zero ceiling is treated as 1.
    pub fn new(validator_id: impl Into<String>, max_counter: u64) -> Self {
        Self {
            validator_id: validator_id.into(),
            max_counter: max_counter.max(1),
            counter: Mutex::new(1),
        }
    }

    /// Issue the next id.
    pub fn next_id(&self) -> RequestId {
        let mut counter = self.counter.lock();
        if *counter > self.max_counter {
            *counter = 1;
        }
        let value = *counter;
        *counter += 1;
        RequestId(format!("{}_{}", self.validator_id, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_starts_at_one() {
        let gen = RequestIdGenerator::new("validator-a", 100);
        assert_eq!(gen.next_id().as_str(), "validator-a_1");
        assert_eq!(gen.next_id().as_str(), "validator-a_2");
    }

    #[test]
    fn test_wraps_after_ceiling() {
        let gen = RequestIdGenerator::new("v", 3);
        let ids: Vec<_> = (0..5).map(|_| gen.next_id().to_string()).collect();
        assert_eq!(ids, ["v_1", "v_2", "v_3", "v_1", "v_2"]);
    }

    #[test]
    fn test_concurrent_callers_get_distinct_ids() {
        let gen = Arc::new(RequestIdGenerator::new("v", 10_000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gen = Arc::clone(&gen);
                std::thread::spawn(move || (0..500).map(|_| gen.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id issued");
            }
        }
        assert_eq!(seen.len(), 4000);
    }

    proptest! {
        #[test]
        fn prop_no_duplicates_within_cycle(max in 1u64..200) {
            let gen = RequestIdGenerator::new("v", max);
            let mut seen = HashSet::new();
            for _ in 0..max {
                prop_assert!(seen.insert(gen.next_id()));
            }
            // First id of the next cycle repeats the first id of this one.
            let next = gen.next_id();
            prop_assert_eq!(next.as_str(), "v_1");
        }
    }
}
