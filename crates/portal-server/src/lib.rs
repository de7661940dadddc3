//! HTTP RPC server for the campus portal gateway.
//!
//! Exposes the per-surface session facades and remote invocation over a
//! small JSON API. Every failure leaves through one classification step and
//! reaches clients as `{"code", "message"}`.
//!
//! # Example
//!
//! ```ignore
//! use portal_server::{AppState, Server, ServerConfig};
//!
//! let state = AppState::new(ServerConfig::new(), invoker)
//!     .with_surface(mycqu_facade);
//! let _eviction = state.start_eviction();
//!
//! Server::from_state(state).run().await?;
//! ```

pub mod boundary;
pub mod config;
pub mod error;
pub mod facade;
pub mod routes;
pub mod state;
pub mod surface;
pub mod transport;

pub use boundary::respond;
pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError, status_for};
pub use facade::{Authenticator, SessionInfo, SurfaceFacade, SurfaceService};
pub use routes::{InvokeRequest, LoginInfo};
pub use state::AppState;
pub use surface::Surface;
pub use transport::{
    HttpAuthenticator, HttpFunctionConnection, HttpFunctionConnector, HttpSession,
    HttpSessionConnector,
};

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The portal RPC server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(routes::health_routes())
            .nest("/api/v1", self.api_routes())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    fn api_routes(&self) -> Router<AppState> {
        use axum::routing::post;

        Router::new()
            .route("/{surface}/session", post(routes::open_session_handler))
            .route(
                "/invoke/{surface}/{operation}",
                post(routes::invoke_handler),
            )
    }

    /// Run the server until the process is killed.
    pub async fn run(self) -> Result<()> {
        self.run_with_shutdown(std::future::pending()).await
    }

    /// Run the server until `signal` resolves, then drain connections.
    pub async fn run_with_shutdown<S>(self, signal: S) -> Result<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config.bind_address;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind {}: {}", addr, e)))?;

        self.serve(listener, signal).await
    }

    /// Serve on an already bound listener.
    pub async fn serve<S>(self, listener: TcpListener, signal: S) -> Result<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        if let Ok(addr) = listener.local_addr() {
            info!("Starting server on {}", addr);
        }

        axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        info!("Server stopped");
        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use parking_lot::Mutex;
    use portal_invoke::Invoke;
    use portal_session::{CacheConfig, Connector, SessionCache, SessionHandle};
    use portal_types::PortalError;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct NoopHandle;

    #[async_trait]
    impl SessionHandle for NoopHandle {
        async fn close(&self) -> portal_session::Result<()> {
            Ok(())
        }
    }

    struct NoopConnector;

    impl Connector for NoopConnector {
        type Handle = NoopHandle;

        fn connect(&self) -> portal_session::Result<NoopHandle> {
            Ok(NoopHandle)
        }
    }

    struct FixedPassword {
        logins: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Authenticator<NoopHandle> for FixedPassword {
        async fn login(
            &self,
            transport: NoopHandle,
            _identity: &str,
            credential: &str,
        ) -> std::result::Result<NoopHandle, PortalError> {
            self.logins.fetch_add(1, Ordering::SeqCst);
            if credential == "secret" {
                Ok(transport)
            } else {
                Err(PortalError::IncorrectLoginCredentials)
            }
        }
    }

    /// Replies with a scripted outcome and records the payloads it saw.
    struct ScriptedInvoke {
        reply: std::result::Result<Value, String>,
        seen: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl Invoke for ScriptedInvoke {
        async fn invoke(&self, function: &str, payload: Value) -> portal_invoke::Result<Value> {
            self.seen.lock().push((function.to_string(), payload));
            self.reply.clone().map_err(portal_invoke::Error::failed)
        }
    }

    fn server_with(reply: std::result::Result<Value, String>) -> (Server, Arc<ScriptedInvoke>, Arc<AtomicUsize>) {
        let invoker = Arc::new(ScriptedInvoke {
            reply,
            seen: Mutex::new(Vec::new()),
        });
        let logins = Arc::new(AtomicUsize::new(0));
        let facade = SurfaceFacade::new(
            Surface::Mycqu,
            SessionCache::new(
                NoopConnector,
                CacheConfig::new(
                    Duration::from_secs(60),
                    Duration::from_secs(600),
                    Duration::from_secs(5),
                ),
            ),
            FixedPassword {
                logins: Arc::clone(&logins),
            },
        );
        let state = AppState::new(ServerConfig::new(), invoker.clone()).with_surface(facade);
        (Server::from_state(state), invoker, logins)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_server_health_endpoint() {
        let (server, _, _) = server_with(Ok(Value::Null));

        let response = server
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_open_session_reuses_login() {
        let (server, _, logins) = server_with(Ok(Value::Null));
        let app = server.router();
        let body = json!({"auth": "2020001", "password": "secret"});

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(post_json("/api/v1/mycqu/session", body.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let info = json_body(response).await;
            assert_eq!(info["surface"], "mycqu");
            assert_eq!(info["identity"], "2020001");
        }

        assert_eq!(logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_open_session_wrong_password() {
        let (server, _, _) = server_with(Ok(Value::Null));

        let response = server
            .router()
            .oneshot(post_json(
                "/api/v1/mycqu/session",
                json!({"auth": "2020001", "password": "nope"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn test_open_session_missing_login_info() {
        let (server, _, logins) = server_with(Ok(Value::Null));

        let response = server
            .router()
            .oneshot(post_json("/api/v1/mycqu/session", json!({"auth": "2020001"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["code"], "INVALID_PARAMETER");
        assert_eq!(body["message"], "缺失登录信息");
        assert_eq!(logins.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_surface_is_invalid_parameter() {
        let (server, _, _) = server_with(Ok(Value::Null));

        let response = server
            .router()
            .oneshot(post_json(
                "/api/v1/gym/session",
                json!({"auth": "2020001", "password": "secret"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["code"], "INVALID_PARAMETER");
    }

    #[tokio::test]
    async fn test_surface_not_enabled() {
        let (server, _, _) = server_with(Ok(Value::Null));

        let response = server
            .router()
            .oneshot(post_json(
                "/api/v1/library/session",
                json!({"auth": "2020001", "password": "secret"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invoke_returns_result_and_builds_payload() {
        let (server, invoker, _) = server_with(Ok(json!({"score": 90})));

        let response = server
            .router()
            .oneshot(post_json(
                "/api/v1/invoke/mycqu/get_score",
                json!({"auth": "2020001", "password": "secret", "params": {"term": "2024"}}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"score": 90}));

        let seen = invoker.seen.lock();
        assert_eq!(seen.len(), 1);
        let (function, payload) = &seen[0];
        assert_eq!(function, "mycqu");
        assert_eq!(payload["username"], "2020001");
        assert_eq!(payload["target"], json!(["mycqu", "get_score"]));
        assert_eq!(payload["params"], json!({"term": "2024"}));
    }

    #[tokio::test]
    async fn test_invoke_defaults_params() {
        let (server, invoker, _) = server_with(Ok(Value::Null));

        let response = server
            .router()
            .oneshot(post_json(
                "/api/v1/invoke/card/get_balance",
                json!({"auth": "2020001", "password": "secret"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(invoker.seen.lock()[0].1["params"], json!({}));
    }

    #[tokio::test]
    async fn test_invoke_remote_failure_maps_to_known_kind() {
        let (server, _, _) = server_with(Err("用户名或密码错误".to_string()));

        let response = server
            .router()
            .oneshot(post_json(
                "/api/v1/invoke/mycqu/get_score",
                json!({"auth": "2020001", "password": "bad"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["code"], "INVALID_CREDENTIALS");
        assert_eq!(body["message"], "用户名或密码错误");
    }

    #[tokio::test]
    async fn test_invoke_opaque_remote_failure_is_verbatim() {
        let (server, _, _) = server_with(Err("X".to_string()));

        let response = server
            .router()
            .oneshot(post_json(
                "/api/v1/invoke/mycqu/get_score",
                json!({"auth": "2020001", "password": "secret"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = json_body(response).await;
        assert_eq!(body["code"], "REMOTE_INVOCATION_ERROR");
        assert_eq!(body["message"], "X");
    }

    #[tokio::test]
    async fn test_serve_stops_on_signal() {
        let (server, _, _) = server_with(Ok(Value::Null));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let task = tokio::spawn(server.serve(listener, async move {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();

        task.await.unwrap().unwrap();
    }

    #[test]
    fn test_server_config_builder() {
        let config = ServerConfig::new()
            .with_bind_address("0.0.0.0:9000".parse().unwrap())
            .with_invoke_function("portal");

        assert_eq!(config.bind_address.port(), 9000);
        assert_eq!(config.invoke_function, "portal");
    }
}
