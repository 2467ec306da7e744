//! `GET <route>?ids=a,b,c`

use crate::invoker::ContractInvocation;
use crate::routes::GatewayState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    ids: Option<String>,
}

/// Comma-separated ids. A missing parameter yields no ids; anything else is
/// split verbatim.
pub fn split_ids(raw: Option<&str>) -> Vec<String> {
    match raw {
        Some(raw) => raw.split(',').map(str::to_string).collect(),
        None => Vec::new(),
    }
}

pub async fn get_status(
    State(state): State<GatewayState>,
    Query(query): Query<StatusQuery>,
) -> Response {
    let ids = split_ids(query.ids.as_deref());
    debug!(route = %state.config.route, ids = ids.len(), "Status query");

    let ids = ids.into_iter().map(Value::String).collect();
    let invocation = ContractInvocation {
        contract: state.config.contract.clone(),
        method: state.config.method.clone(),
        params: vec![Value::Array(ids)],
    };

    match state.invoker.invoke_contract(invocation).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to serve status query");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
