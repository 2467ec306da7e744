//! # Synchronous Call Integration Tests
//!
//! Drive a `VerifierClient` against an in-memory Validator:
//!
//! 1. Client opens a connection and sends `request`/`request2` with a request id
//! 2. Test plays the Validator through the accepted `ValidatorEndpoint`
//! 3. Client resolves with the matching response, or the 504 sentinel at the deadline

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use ledger_verifier::domain::OutboundMessage;
use ledger_verifier::{
    AuthError, AuthFailurePolicy, Authenticator, CallResult, ConnectionPolicy, DecodedPayload,
    InMemoryTransport, KeyMaterialRef, LedgerOperation, MockAuthenticator, RequestId,
    TransportError, ValidatorDescriptor, Verifier, VerifierClient, VerifierConfig, VerifierError,
};
use serde_json::{json, Value};
use tokio::time::Instant;

const TIMEOUT: Duration = Duration::from_secs(5);

fn descriptor() -> ValidatorDescriptor {
    ValidatorDescriptor::from_json(
        r#"{
            "validatorID": "r7e3ojGRAS",
            "validatorURL": "ws://validator.local:5040",
            "validatorKeyPath": "/keys/r7e3ojGRAS.pem",
            "apiInfo": []
        }"#,
    )
    .unwrap()
}

fn client_with(
    transport: &InMemoryTransport,
    auth: MockAuthenticator,
    config: VerifierConfig,
) -> Arc<VerifierClient> {
    Arc::new(
        VerifierClient::new(descriptor(), config, Arc::new(transport.clone()), Arc::new(auth))
            .unwrap(),
    )
}

fn client(transport: &InMemoryTransport) -> Arc<VerifierClient> {
    client_with(transport, MockAuthenticator::default(), VerifierConfig::default())
}

/// Request id carried by an outbound request.
fn request_id(message: &OutboundMessage) -> RequestId {
    match message {
        OutboundMessage::Request(req) => RequestId::new(req.args["reqID"].as_str().unwrap()),
        OutboundMessage::Request2(req) => req.req_id.clone().unwrap(),
        other => panic!("Expected a request, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_matching_response_resolves_with_res_obj() {
    // Arrange
    let transport = InMemoryTransport::new();
    let client = client(&transport);

    // Act
    let call = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.exec_sync_function(LedgerOperation::new("foo")).await }
    });
    let mut validator = transport.accept().await.unwrap();
    let message = validator.next_message().await.unwrap();
    let id = request_id(&message);
    assert_eq!(id.as_str(), "r7e3ojGRAS_1");
    validator.respond(&id, json!({ "status": 200, "data": "ok" }));

    // Assert
    let result = call.await.unwrap().unwrap();
    assert_eq!(result.into_value(), json!({ "status": 200, "data": "ok" }));
    assert!(validator.is_closed(), "connection should be closed after resolve");
    assert_eq!(client.stats().calls_resolved, 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_response_resolves_with_sentinel_after_timeout() {
    // Arrange
    let transport = InMemoryTransport::new();
    let client = client(&transport);
    let started = Instant::now();

    // Act
    let call = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.exec_sync_function(LedgerOperation::new("foo")).await }
    });
    let mut validator = transport.accept().await.unwrap();
    let _ = validator.next_message().await.unwrap();

    // Assert
    let result = call.await.unwrap().unwrap();
    assert!(started.elapsed() >= TIMEOUT, "resolved before the deadline");
    assert_eq!(result, CallResult::timeout());
    assert_eq!(result.into_value(), json!({ "status": 504, "amount": 0 }));
    assert!(validator.is_closed(), "connection should be closed after timeout");
    assert_eq!(client.stats().soft_timeouts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_responses_for_other_ids_are_ignored() {
    let transport = InMemoryTransport::new();
    let client = client(&transport);

    let call = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.exec_sync_function(LedgerOperation::new("foo")).await }
    });
    let mut validator = transport.accept().await.unwrap();
    let id = request_id(&validator.next_message().await.unwrap());

    validator.respond(&RequestId::new("r7e3ojGRAS_99"), json!({ "status": 500 }));
    validator.respond(&id, json!({ "status": 200, "data": "mine" }));
    validator.respond(&id, json!({ "status": 200, "data": "duplicate" }));

    let result = call.await.unwrap().unwrap();
    assert_eq!(result.data(), Some(&json!("mine")));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_calls_receive_their_own_responses() {
    // Arrange: Validator answers in reverse arrival order
    let transport = InMemoryTransport::new();
    let client = client(&transport);
    const CALLS: usize = 5;

    let validator = tokio::spawn({
        let transport = transport.clone();
        async move {
            let mut endpoints = Vec::new();
            for _ in 0..CALLS {
                let mut endpoint = transport.accept().await.unwrap();
                let message = endpoint.next_message().await.unwrap();
                let marker = match &message {
                    OutboundMessage::Request(req) => req.args["marker"].clone(),
                    other => panic!("Expected request, got {:?}", other),
                };
                endpoints.push((endpoint, request_id(&message), marker));
            }
            for (endpoint, id, marker) in endpoints.iter().rev() {
                endpoint.respond(id, json!({ "status": 200, "data": marker }));
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            endpoints
        }
    });

    // Act
    let calls = (0..CALLS).map(|i| {
        let client = Arc::clone(&client);
        async move {
            let op = LedgerOperation::new("getStatus").with_arg("marker", json!(i));
            (i, client.exec_sync_function(op).await.unwrap())
        }
    });
    let results = join_all(calls).await;
    validator.await.unwrap();

    // Assert
    for (i, result) in results {
        assert_eq!(result.status(), Some(200));
        assert_eq!(result.data(), Some(&json!(i)));
    }
}

#[tokio::test(start_paused = true)]
async fn test_secure_call_authenticates_payload() {
    let transport = InMemoryTransport::new();
    let client = client(&transport);

    let call = tokio::spawn({
        let client = Arc::clone(&client);
        async move {
            client
                .exec_sync_function_neo(json!({ "channelName": "mychannel" }), json!("getStatus"), json!([["a"]]))
                .await
        }
    });
    let mut validator = transport.accept().await.unwrap();
    let message = validator.next_message().await.unwrap();
    match &message {
        OutboundMessage::Request2(req) => {
            assert_eq!(req.method, json!("getStatus"));
            assert_eq!(req.args, json!([["a"]]));
        }
        other => panic!("Expected request2, got {:?}", other),
    }
    validator.respond(
        &request_id(&message),
        json!({ "status": 200, "data": r#"{"result": ["active"]}"# }),
    );

    let result = call.await.unwrap().unwrap();
    assert_eq!(result.into_value(), json!({ "status": 200, "data": ["active"] }));
}

#[tokio::test(start_paused = true)]
async fn test_secure_auth_failure_waits_for_timeout() {
    let transport = InMemoryTransport::new();
    let client = client_with(&transport, MockAuthenticator::failing(), VerifierConfig::default());
    let started = Instant::now();

    let call = tokio::spawn({
        let client = Arc::clone(&client);
        async move {
            client
                .exec_sync_function_neo(json!("c"), json!("m"), json!([]))
                .await
        }
    });
    let mut validator = transport.accept().await.unwrap();
    let id = request_id(&validator.next_message().await.unwrap());
    validator.respond(&id, json!({ "status": 200, "data": "forged" }));

    let result = call.await.unwrap().unwrap();
    assert!(result.is_soft_timeout());
    assert!(started.elapsed() >= TIMEOUT);
    assert_eq!(client.stats().auth_failures, 1);
}

/// Authenticator whose verification never completes.
struct StalledAuthenticator;

#[async_trait]
impl Authenticator for StalledAuthenticator {
    async fn verify(
        &self,
        _key: &KeyMaterialRef,
        _payload: &Value,
    ) -> Result<DecodedPayload, AuthError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_stalled_authenticator_bounded_by_timeout() {
    // Arrange
    let transport = InMemoryTransport::new();
    let client = Arc::new(
        VerifierClient::new(
            descriptor(),
            VerifierConfig::default(),
            Arc::new(transport.clone()),
            Arc::new(StalledAuthenticator),
        )
        .unwrap(),
    );
    let started = Instant::now();

    // Act
    let call = tokio::spawn({
        let client = Arc::clone(&client);
        async move {
            client
                .exec_sync_function_neo(json!("c"), json!("m"), json!([]))
                .await
        }
    });
    let mut validator = transport.accept().await.unwrap();
    let id = request_id(&validator.next_message().await.unwrap());
    validator.respond(&id, json!({ "status": 200, "data": "slow" }));

    // Assert
    let result = tokio::time::timeout(TIMEOUT * 12, call)
        .await
        .expect("call outlived its timeout")
        .unwrap()
        .unwrap();
    assert!(result.is_soft_timeout());
    assert!(started.elapsed() >= TIMEOUT);
    assert!(started.elapsed() < TIMEOUT * 2);
    assert_eq!(client.stats().soft_timeouts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_secure_auth_failure_rejects_under_reject_policy() {
    let transport = InMemoryTransport::new();
    let config = VerifierConfig {
        auth_failure: AuthFailurePolicy::Reject,
        ..Default::default()
    };
    let client = client_with(&transport, MockAuthenticator::failing(), config);

    let call = tokio::spawn({
        let client = Arc::clone(&client);
        async move {
            client
                .exec_sync_function_neo(json!("c"), json!("m"), json!([]))
                .await
        }
    });
    let mut validator = transport.accept().await.unwrap();
    let id = request_id(&validator.next_message().await.unwrap());
    validator.respond(&id, json!({ "status": 200, "data": "forged" }));

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, VerifierError::Authentication(_)));
    assert!(validator.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_channel_error_fails_call() {
    let transport = InMemoryTransport::new();
    let client = client(&transport);

    let call = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.exec_sync_function(LedgerOperation::new("foo")).await }
    });
    let mut validator = transport.accept().await.unwrap();
    let _ = validator.next_message().await.unwrap();
    validator.fail(TransportError::Channel("connection reset".into()));

    let err = call.await.unwrap().unwrap_err();
    assert!(err.is_transport());
    assert_eq!(err.to_string(), "channel error: connection reset");
    assert!(validator.is_closed());
    assert_eq!(client.stats().transport_errors, 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_is_an_error() {
    let transport = InMemoryTransport::new();
    transport.refuse_connects(Some(TransportError::ConnectTimeout {
        url: "ws://validator.local:5040".into(),
        timeout: Duration::from_secs(20),
    }));
    let client = client(&transport);

    let err = client
        .exec_sync_function(LedgerOperation::new("foo"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VerifierError::Transport(TransportError::ConnectTimeout { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_validator_disconnect_waits_for_deadline() {
    let transport = InMemoryTransport::new();
    let client = client(&transport);
    let started = Instant::now();

    let call = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.exec_sync_function(LedgerOperation::new("foo")).await }
    });
    let mut validator = transport.accept().await.unwrap();
    let _ = validator.next_message().await.unwrap();
    validator.disconnect();

    let result = call.await.unwrap().unwrap();
    assert!(result.is_soft_timeout());
    assert!(started.elapsed() >= TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn test_fire_and_forget_sends_and_closes() {
    let transport = InMemoryTransport::new();
    let client = client(&transport);

    client
        .request_ledger_operation(
            LedgerOperation::new("transferNumericAsset").with_arg("amount", json!(10)),
        )
        .await
        .unwrap();

    let mut validator = transport.accept().await.unwrap();
    match validator.next_message().await.unwrap() {
        OutboundMessage::Request(req) => {
            assert_eq!(req.func, "transferNumericAsset");
            assert_eq!(req.args["amount"], json!(10));
        }
        other => panic!("Expected request, got {:?}", other),
    }
    assert!(validator.is_closed());
    assert!(validator.next_message().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_fire_and_forget_neo_connect_failure() {
    let transport = InMemoryTransport::new();
    transport.refuse_connects(Some(TransportError::ConnectFailed {
        url: "ws://validator.local:5040".into(),
        reason: "refused".into(),
    }));
    let client = client(&transport);

    let err = client
        .request_ledger_operation_neo(json!("c"), json!("m"), Value::Null)
        .await
        .unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test(start_paused = true)]
async fn test_shared_policy_reuses_one_connection() {
    // Arrange
    let transport = InMemoryTransport::new();
    let config = VerifierConfig {
        connection_policy: ConnectionPolicy::Shared,
        ..Default::default()
    };
    let client = client_with(&transport, MockAuthenticator::default(), config);

    let validator = tokio::spawn({
        let transport = transport.clone();
        async move {
            let mut endpoint = transport.accept().await.unwrap();
            let mut ids = Vec::new();
            for _ in 0..2 {
                let message = endpoint.next_message().await.unwrap();
                ids.push(request_id(&message));
            }
            // Answer out of order.
            for id in ids.iter().rev() {
                endpoint.respond(id, json!({ "status": 200, "data": id.as_str() }));
            }
            endpoint
        }
    });

    // Act
    let (first, second) = tokio::join!(
        client.exec_sync_function(LedgerOperation::new("a")),
        client.exec_sync_function(LedgerOperation::new("b")),
    );
    let endpoint = validator.await.unwrap();

    // Assert
    let first = first.unwrap();
    let second = second.unwrap();
    assert_ne!(first.data(), second.data());
    assert_eq!(first.status(), Some(200));
    assert_eq!(transport.connect_count(), 1);
    assert!(!endpoint.is_closed(), "shared connection stays open between calls");

    client.shutdown().await;
    assert!(endpoint.is_closed());
}
