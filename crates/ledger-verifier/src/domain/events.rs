//! Normalised ledger events handed to the event listener.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A ledger event delivered to business logic.
///
/// Monitor-start acknowledgements carry the connection handle in `id`;
/// event notifications carry `{status, blockData}` in `data`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEvent {
    pub id: String,
    pub verifier_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl LedgerEvent {
    /// Acknowledgement of a started monitor.
    pub fn monitor_started(handle: impl ToString, verifier_id: impl Into<String>) -> Self {
        Self {
            id: handle.to_string(),
            verifier_id: verifier_id.into(),
            data: None,
        }
    }

    /// Authenticated block notification.
    pub fn block(verifier_id: impl Into<String>, status: Value, block_data: Value) -> Self {
        Self {
            id: String::new(),
            verifier_id: verifier_id.into(),
            data: Some(json!({ "status": status, "blockData": block_data })),
        }
    }

    /// `data.blockData`, for notifications.
    pub fn block_data(&self) -> Option<&Value> {
        self.data.as_ref().and_then(|d| d.get("blockData"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_event_shape() {
        let event = LedgerEvent::block("v", json!(200), json!({ "number": 7 }));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "id": "",
                "verifierId": "v",
                "data": { "status": 200, "blockData": { "number": 7 } }
            })
        );
        assert_eq!(event.block_data(), Some(&json!({ "number": 7 })));
    }

    #[test]
    fn test_monitor_started_carries_handle() {
        let event = LedgerEvent::monitor_started(0usize, "v");
        assert_eq!(event.id, "0");
        assert!(event.data.is_none());
    }
}
