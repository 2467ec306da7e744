//! Validator descriptor parsed from the construction JSON.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Descriptor parse failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// Not valid JSON, or a required field is missing or mistyped.
    #[error("malformed descriptor: {0}")]
    Malformed(String),

    /// A required field is present but empty.
    #[error("descriptor field {0} is empty")]
    EmptyField(&'static str),
}

/// One named argument of an operation a Validator accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedData {
    pub data_name: String,
    pub data_type: String,
}

/// An operation a Validator accepts through `request_ledger_operation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiInfo {
    pub api_type: String,
    #[serde(default)]
    pub requested_data: Vec<RequestedData>,
}

/// Validator identity, address and key-material reference.
///
/// Immutable once a `VerifierClient` is built from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorDescriptor {
    /// Validator identity; prefixes every request id.
    #[serde(rename = "validatorID")]
    pub validator_id: String,
    /// Network address of the Validator.
    #[serde(rename = "validatorURL")]
    pub validator_url: String,
    /// Reference to the key material used to authenticate signed payloads.
    #[serde(rename = "validatorKeyPath")]
    pub validator_key_path: String,
    /// Operations the Validator advertises.
    #[serde(rename = "apiInfo", default)]
    pub api_info: Vec<ApiInfo>,
}

impl ValidatorDescriptor {
    /// Parse and check a descriptor JSON document.
    pub fn from_json(json: &str) -> Result<Self, DescriptorError> {
        let descriptor: Self =
            serde_json::from_str(json).map_err(|e| DescriptorError::Malformed(e.to_string()))?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Reject empty identity or address.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.validator_id.trim().is_empty() {
            return Err(DescriptorError::EmptyField("validatorID"));
        }
        if self.validator_url.trim().is_empty() {
            return Err(DescriptorError::EmptyField("validatorURL"));
        }
        Ok(())
    }

    /// Key-material reference handed to the authenticator.
    pub fn key_ref(&self) -> KeyMaterialRef {
        KeyMaterialRef::new(self.validator_key_path.clone())
    }
}

/// Opaque reference to a Validator's key material (a PEM path for the JWS adapter).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyMaterialRef(String);

impl KeyMaterialRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for KeyMaterialRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
