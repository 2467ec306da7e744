//! # Wire Envelopes
//!
//! Messages exchanged with a Validator. Every message is a tagged pair
//! `{"event": <kind>, "data": <payload>}`.
//!
//! | Direction | Kind | Payload |
//! |-----------|------|---------|
//! | out | `request` | `{func, args}` (args carries `reqID` for synchronous calls) |
//! | out | `request2` | `{contract, method, args, reqID?}` |
//! | out | `startMonitor` | none |
//! | out | `stopMonitor` | none |
//! | in | `response` | `{id, resObj}` |
//! | in | `eventReceived` | `{status, blockData}` |

use crate::domain::request_id::RequestId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which legacy requests carry their request id inside `args`.
pub const LEGACY_REQUEST_ID_KEY: &str = "reqID";

/// A named operation with arguments, supplied per call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerOperation {
    /// Operation name, sent as `func`.
    pub api_type: String,
    /// Free-form tag; never sent to the Validator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    /// Operation arguments, sent as `args`.
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl LedgerOperation {
    pub fn new(api_type: impl Into<String>) -> Self {
        Self {
            api_type: api_type.into(),
            progress: None,
            data: Map::new(),
        }
    }

    /// Add one argument.
    pub fn with_arg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

/// A call to a Validator, before a request id is attached.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerCall {
    /// `func` + `args`; responses are returned as-is.
    Legacy { func: String, args: Map<String, Value> },
    /// `contract` + `method` + `args`; responses carry a signed payload.
    Structured {
        contract: Value,
        method: Value,
        args: Value,
    },
}

impl LedgerCall {
    /// Whether responses to this call must pass the authenticator.
    pub fn is_secure(&self) -> bool {
        matches!(self, LedgerCall::Structured { .. })
    }

    /// Short label for logs.
    pub fn label(&self) -> String {
        match self {
            LedgerCall::Legacy { func, .. } => func.clone(),
            LedgerCall::Structured { method, .. } => match method {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        }
    }

    /// Build the outbound message. Legacy calls carry the id inside `args`.
    pub fn into_message(self, id: Option<&RequestId>) -> OutboundMessage {
        match self {
            LedgerCall::Legacy { func, mut args } => {
                if let Some(id) = id {
                    args.insert(
                        LEGACY_REQUEST_ID_KEY.to_string(),
                        Value::String(id.to_string()),
                    );
                }
                OutboundMessage::Request(LegacyRequest { func, args })
            }
            LedgerCall::Structured {
                contract,
                method,
                args,
            } => OutboundMessage::Request2(StructuredRequest {
                contract,
                method,
                args,
                req_id: id.cloned(),
            }),
        }
    }
}

impl From<LedgerOperation> for LedgerCall {
    fn from(op: LedgerOperation) -> Self {
        LedgerCall::Legacy {
            func: op.api_type,
            args: op.data,
        }
    }
}

/// Payload of a `request` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyRequest {
    pub func: String,
    pub args: Map<String, Value>,
}

/// Payload of a `request2` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredRequest {
    pub contract: Value,
    pub method: Value,
    pub args: Value,
    #[serde(rename = "reqID", default, skip_serializing_if = "Option::is_none")]
    pub req_id: Option<RequestId>,
}

/// Messages sent to a Validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum OutboundMessage {
    Request(LegacyRequest),
    Request2(StructuredRequest),
    StartMonitor,
    StopMonitor,
}

impl OutboundMessage {
    /// Event name on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::Request(_) => "request",
            OutboundMessage::Request2(_) => "request2",
            OutboundMessage::StartMonitor => "startMonitor",
            OutboundMessage::StopMonitor => "stopMonitor",
        }
    }
}

/// Payload of a `response` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Id of the request being answered.
    pub id: RequestId,
    /// Status code plus result payload (plain, or signed for `request2`).
    #[serde(rename = "resObj")]
    pub res_obj: Value,
}

impl ResponseEnvelope {
    /// `resObj.status`, `null` if absent.
    pub fn status(&self) -> Value {
        self.res_obj.get("status").cloned().unwrap_or(Value::Null)
    }

    /// `resObj.data`, the signed token for structured calls.
    pub fn data(&self) -> Option<&Value> {
        self.res_obj.get("data")
    }
}

/// Payload of an `eventReceived` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventNotification {
    #[serde(default)]
    pub status: Value,
    /// Signed block payload.
    #[serde(rename = "blockData", default)]
    pub block_data: Value,
}

/// Messages received from a Validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum InboundMessage {
    Response(ResponseEnvelope),
    EventReceived(EventNotification),
}

/// Result of a synchronous call.
///
/// Either the Validator's result or the soft-timeout sentinel
/// `{"status": 504, "amount": 0}`. Callers inspect `status()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallResult(Value);

/// Status carried by the soft-timeout sentinel.
pub const SOFT_TIMEOUT_STATUS: u64 = 504;

impl CallResult {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The soft-timeout sentinel.
    pub fn timeout() -> Self {
        Self(serde_json::json!({ "status": SOFT_TIMEOUT_STATUS, "amount": 0 }))
    }

    /// `{status, data}` shape returned by authenticated calls.
    pub fn authenticated(status: Value, data: Value) -> Self {
        Self(serde_json::json!({ "status": status, "data": data }))
    }

    /// Numeric status, if present.
    pub fn status(&self) -> Option<u64> {
        self.0.get("status").and_then(Value::as_u64)
    }

    /// Whether this is the soft-timeout sentinel.
    pub fn is_soft_timeout(&self) -> bool {
        *self == Self::timeout()
    }

    pub fn data(&self) -> Option<&Value> {
        self.0.get("data")
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legacy_request_carries_id_in_args() {
        let op = LedgerOperation::new("getNumericBalance").with_arg("owner", json!("alice"));
        let id = RequestId::new("v_7");
        let msg = LedgerCall::from(op).into_message(Some(&id));

        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "event": "request",
                "data": { "func": "getNumericBalance", "args": { "owner": "alice", "reqID": "v_7" } }
            })
        );
    }

    #[test]
    fn test_structured_request_wire_shape() {
        let call = LedgerCall::Structured {
            contract: json!({ "channelName": "mychannel" }),
            method: json!("getStatus"),
            args: json!([["a", "b"]]),
        };
        assert!(call.is_secure());
        let msg = call.into_message(Some(&RequestId::new("v_1")));
        assert_eq!(msg.kind(), "request2");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "event": "request2",
                "data": {
                    "contract": { "channelName": "mychannel" },
                    "method": "getStatus",
                    "args": [["a", "b"]],
                    "reqID": "v_1"
                }
            })
        );
    }

    #[test]
    fn test_unit_messages_have_no_data() {
        let value = serde_json::to_value(OutboundMessage::StartMonitor).unwrap();
        assert_eq!(value, json!({ "event": "startMonitor" }));
    }

    #[test]
    fn test_parse_inbound_response() {
        let raw = json!({
            "event": "response",
            "data": { "id": "v_3", "resObj": { "status": 200, "data": "ok" } }
        });
        let msg: InboundMessage = serde_json::from_value(raw).unwrap();
        match msg {
            InboundMessage::Response(res) => {
                assert_eq!(res.id.as_str(), "v_3");
                assert_eq!(res.status(), json!(200));
                assert_eq!(res.data(), Some(&json!("ok")));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_parse_event_received() {
        let raw = json!({
            "event": "eventReceived",
            "data": { "status": 200, "blockData": "eyJ..." }
        });
        let msg: InboundMessage = serde_json::from_value(raw).unwrap();
        assert!(matches!(msg, InboundMessage::EventReceived(ref e) if e.block_data == json!("eyJ...")));
    }

    #[test]
    fn test_timeout_sentinel() {
        let result = CallResult::timeout();
        assert!(result.is_soft_timeout());
        assert_eq!(result.status(), Some(504));
        assert_eq!(result.into_value(), json!({ "status": 504, "amount": 0 }));
        assert!(!CallResult::new(json!({ "status": 504, "amount": 1 })).is_soft_timeout());
    }
}
