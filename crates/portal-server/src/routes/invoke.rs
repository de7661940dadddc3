//! Remote invocation endpoint.

use axum::{
    Json,
    extract::{Path, State},
};
use portal_invoke::InvocationRequest;
use portal_types::PortalError;
use serde::Deserialize;
use serde_json::Value;

use crate::boundary::respond;
use crate::error::Result;
use crate::routes::session::LoginInfo;
use crate::state::AppState;
use crate::surface::Surface;

/// Body of an invocation request.
#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    #[serde(flatten)]
    pub login: LoginInfo,
    #[serde(default = "empty_params")]
    pub params: Value,
}

fn empty_params() -> Value {
    Value::Object(Default::default())
}

/// `POST /api/v1/invoke/{surface}/{operation}`
///
/// Delegates the operation to the remote function and returns its `result`.
pub async fn invoke_handler(
    State(state): State<AppState>,
    Path((surface, operation)): Path<(String, String)>,
    Json(request): Json<InvokeRequest>,
) -> Result<Json<Value>> {
    respond("invoke", async move {
        let surface: Surface = surface.parse()?;
        let (identity, credential) = request.login.require()?;
        let payload = InvocationRequest::new(identity, credential, surface.as_str(), operation)
            .with_params(request.params)
            .into_payload()?;

        let result = state
            .invoker
            .invoke(&state.config.invoke_function, payload)
            .await?;
        Ok::<_, PortalError>(result)
    })
    .await
}
