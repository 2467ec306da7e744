//! ES256 compact-JWS authenticator.
//!
//! Validators sign response and block payloads as compact JWS tokens
//! (`base64url(header).base64url(claims).base64url(signature)`) with a P-256
//! key. The key reference names a PEM file holding the public key; parsed
//! keys are cached per reference.

use crate::domain::{AuthError, KeyMaterialRef};
use crate::ports::{Authenticator, DecodedPayload};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use dashmap::DashMap;
use p256::ecdsa::signature::Verifier as _;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey;
use serde::Deserialize;
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

const SUPPORTED_ALG: &str = "ES256";

#[derive(Deserialize)]
struct JwsHeader {
    alg: String,
}

/// `Authenticator` verifying ES256 compact JWS tokens.
#[derive(Default)]
pub struct JwsAuthenticator {
    keys: DashMap<KeyMaterialRef, VerifyingKey>,
}

impl JwsAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a public key under `key`, bypassing the filesystem.
    pub fn register_pem(&self, key: KeyMaterialRef, pem: &str) -> Result<(), AuthError> {
        let verifying_key = parse_pem(&key, pem)?;
        self.keys.insert(key, verifying_key);
        Ok(())
    }

    async fn load_key(&self, key: &KeyMaterialRef) -> Result<VerifyingKey, AuthError> {
        if let Some(cached) = self.keys.get(key) {
            return Ok(cached.value().clone());
        }
        let pem = tokio::fs::read_to_string(key.as_str())
            .await
            .map_err(|e| AuthError::KeyUnavailable {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        let verifying_key = parse_pem(key, &pem)?;
        self.keys.insert(key.clone(), verifying_key.clone());
        debug!(key = %key, "Loaded validator public key");
        Ok(verifying_key)
    }
}

fn parse_pem(key: &KeyMaterialRef, pem: &str) -> Result<VerifyingKey, AuthError> {
    VerifyingKey::from_public_key_pem(pem).map_err(|e| AuthError::KeyUnavailable {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn decode_segment(segment: &str, what: &str) -> Result<Vec<u8>, AuthError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::Malformed(format!("{what}: {e}")))
}

/// Verify `token` against `verifying_key` and return its claims.
pub fn verify_compact(verifying_key: &VerifyingKey, token: &str) -> Result<Value, AuthError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::Malformed("expected three dot-separated segments".into()));
    };

    let header: JwsHeader = serde_json::from_slice(&decode_segment(header_b64, "header")?)
        .map_err(|e| AuthError::Malformed(format!("header: {e}")))?;
    if header.alg != SUPPORTED_ALG {
        return Err(AuthError::UnsupportedAlgorithm(header.alg));
    }

    let signature = Signature::from_slice(&decode_segment(sig_b64, "signature")?)
        .map_err(|e| AuthError::Malformed(format!("signature: {e}")))?;
    let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| AuthError::BadSignature)?;

    let claims: Value = serde_json::from_slice(&decode_segment(claims_b64, "claims")?)
        .map_err(|e| AuthError::Malformed(format!("claims: {e}")))?;

    // NumericDate: integer or fractional seconds.
    if let Some(exp) = claims.get("exp") {
        let exp = exp
            .as_f64()
            .ok_or_else(|| AuthError::Malformed("exp is not a number".into()))?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        if exp <= now {
            return Err(AuthError::Expired {
                exp: exp.max(0.0) as u64,
            });
        }
    }

    Ok(claims)
}

#[async_trait]
impl Authenticator for JwsAuthenticator {
    async fn verify(
        &self,
        key: &KeyMaterialRef,
        payload: &Value,
    ) -> Result<DecodedPayload, AuthError> {
        let Some(token) = payload.as_str() else {
            return Err(AuthError::Malformed("payload is not a string token".into()));
        };
        let verifying_key = self.load_key(key).await?;
        verify_compact(&verifying_key, token).map(DecodedPayload::new)
    }
}
