//! The single point where RPC results become responses.
//!
//! Every handler passes its call through [`respond`]. Successful payloads are
//! wrapped as JSON; failures are classified once and leave as a
//! [`ServerError`] carrying the taxonomy code and message.

use std::future::Future;
use std::time::Instant;

use axum::Json;
use portal_types::PortalError;
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, ServerError};

/// Await `call` on behalf of the RPC method `method` and shape the outcome.
pub async fn respond<T, Fut>(method: &'static str, call: Fut) -> Result<Json<T>>
where
    T: Serialize,
    Fut: Future<Output = std::result::Result<T, PortalError>>,
{
    let started = Instant::now();
    let outcome = call.await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(payload) => {
            debug!(method, elapsed_ms, "RPC completed");
            Ok(Json(payload))
        }
        Err(failure) => {
            let error = ServerError::from(failure);
            debug!(method, elapsed_ms, error = %error, "RPC failed");
            Err(error)
        }
    }
}
