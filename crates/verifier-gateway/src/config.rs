//! Gateway configuration.

use serde_json::Value;
use std::net::SocketAddr;
use thiserror::Error;

/// Default route for the HTLC status query.
pub const DEFAULT_STATUS_ROUTE: &str = "/api/v1/htlc/get-status";

/// Default contract method invoked by the status route.
pub const DEFAULT_STATUS_METHOD: &str = "getStatus";

/// Gateway configuration errors
#[derive(Debug, Error)]
pub enum GatewayConfigError {
    #[error("invalid route {0:?}: must start with '/'")]
    InvalidRoute(String),

    #[error("contract identifier cannot be empty")]
    EmptyContract,

    #[error("method name cannot be empty")]
    EmptyMethod,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Address the HTTP server binds to
    pub listen: SocketAddr,

    /// Contract identifier forwarded as `contract` in `request2`
    pub contract: Value,

    /// Method invoked for status queries
    pub method: String,

    /// Route serving status queries
    pub route: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 4000)),
            contract: Value::Null,
            method: DEFAULT_STATUS_METHOD.to_string(),
            route: DEFAULT_STATUS_ROUTE.to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), GatewayConfigError> {
        if !self.route.starts_with('/') {
            return Err(GatewayConfigError::InvalidRoute(self.route.clone()));
        }

        let empty_contract = match &self.contract {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if empty_contract {
            return Err(GatewayConfigError::EmptyContract);
        }

        if self.method.trim().is_empty() {
            return Err(GatewayConfigError::EmptyMethod);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> GatewayConfig {
        GatewayConfig {
            contract: json!({ "address": "0x5fbdb2315678afecb367f032d93f642f64180aa3" }),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_route_and_method() {
        let config = GatewayConfig::default();
        assert_eq!(config.route, "/api/v1/htlc/get-status");
        assert_eq!(config.method, "getStatus");
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_missing_contract_rejected() {
        let config = GatewayConfig::default();
        assert!(matches!(
            config.validate(),
            Err(GatewayConfigError::EmptyContract)
        ));

        let config = GatewayConfig {
            contract: json!("  "),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(GatewayConfigError::EmptyContract)
        ));
    }

    #[test]
    fn test_bad_route_and_method_rejected() {
        let config = GatewayConfig {
            route: "get-status".into(),
            ..valid()
        };
        assert!(matches!(
            config.validate(),
            Err(GatewayConfigError::InvalidRoute(_))
        ));

        let config = GatewayConfig {
            method: String::new(),
            ..valid()
        };
        assert!(matches!(
            config.validate(),
            Err(GatewayConfigError::EmptyMethod)
        ));
    }
}
