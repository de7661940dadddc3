//! Remote function invocation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use portal_types::HasInvokeConfig;

use crate::error::{Error, Result};
use crate::pool::{ConnectionFactory, ConnectionPool, RemoteConnection};

/// Invocation capability: `invoke(function, payload) → result | failure`.
#[async_trait]
pub trait Invoke: Send + Sync {
    async fn invoke(&self, function: &str, payload: Value) -> Result<Value>;

    /// Release pooled resources. Best effort.
    async fn shutdown(&self) {}
}

/// Payload sent to the portal function: credentials, a `[surface, operation]`
/// target and operation parameters.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationRequest {
    pub username: String,
    pub password: String,
    pub target: (String, String),
    pub params: Value,
}

impl InvocationRequest {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        surface: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            target: (surface.into(), operation.into()),
            params: Value::Object(Default::default()),
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn into_payload(self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Invokes remote functions over a [`ConnectionPool`].
pub struct RemoteInvoker<F: ConnectionFactory> {
    pool: ConnectionPool<F>,
    timeout: Duration,
}

impl<F: ConnectionFactory> RemoteInvoker<F> {
    /// `timeout` bounds the whole call, including waiting for a connection.
    pub fn new(pool: ConnectionPool<F>, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Build the pool and invoker from any invocation config provider.
    pub fn from_config<C: HasInvokeConfig>(factory: F, config: &C) -> Self {
        Self::new(
            ConnectionPool::new(factory, config.pool_capacity()),
            config.invoke_timeout(),
        )
    }

    pub fn pool(&self) -> &ConnectionPool<F> {
        &self.pool
    }

    async fn call(&self, function: &str, payload: &Value) -> Result<Value> {
        let connection = self.pool.get().await?;
        let outcome = connection.call(function, payload).await;
        // Returned on success and failure alike.
        self.pool.put(connection).await;
        outcome?.into_result()
    }
}

#[async_trait]
impl<F: ConnectionFactory> Invoke for RemoteInvoker<F> {
    async fn invoke(&self, function: &str, payload: Value) -> Result<Value> {
        debug!(function, "Invoking remote function");

        // A call cut off by the timeout drops its connection, which frees
        // the slot instead of returning a half-used connection.
        let result = match tokio::time::timeout(self.timeout, self.call(function, &payload)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.timeout)),
        };

        if let Err(e) = &result {
            warn!(function, error = %e, "Remote invocation failed");
        }
        result
    }

    async fn shutdown(&self) {
        self.pool.close().await;
    }
}
