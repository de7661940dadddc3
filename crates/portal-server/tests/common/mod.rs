//! Common test utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use axum::{
    Form, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use portal_invoke::{ConnectionPool, RemoteInvoker};
use portal_server::{
    AppState, HttpAuthenticator, HttpFunctionConnector, HttpSessionConnector, Server,
    ServerConfig, Surface, SurfaceFacade,
};
use portal_session::{CacheConfig, EvictionHandle, SessionCache};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Counters kept by the fake portal.
#[derive(Default)]
pub struct BackendCounters {
    pub logins: AtomicUsize,
    pub invocations: AtomicUsize,
}

impl BackendCounters {
    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn fake_login(
    State(counters): State<Arc<BackendCounters>>,
    Form(form): Form<LoginForm>,
) -> StatusCode {
    counters.logins.fetch_add(1, Ordering::SeqCst);
    match (form.username.as_str(), form.password.as_str()) {
        ("busy", _) => StatusCode::CONFLICT,
        (_, "secret") => StatusCode::OK,
        _ => StatusCode::UNAUTHORIZED,
    }
}

async fn fake_function(
    State(counters): State<Arc<BackendCounters>>,
    Path(_function): Path<String>,
    Json(payload): Json<Value>,
) -> Json<Value> {
    counters.invocations.fetch_add(1, Ordering::SeqCst);
    if payload["password"] != "secret" {
        return Json(json!({"status": 0, "error": "用户名或密码错误"}));
    }
    if payload["target"][1] == "explode" {
        return Json(json!({"status": false, "error": "X"}));
    }
    Json(json!({
        "status": true,
        "result": {"target": payload["target"], "params": payload["params"]},
    }))
}

/// Start the fake portal: `/login` for sessions, `/functions/{name}` for
/// remote invocation.
async fn spawn_backend(counters: Arc<BackendCounters>) -> Result<SocketAddr> {
    let app = Router::new()
        .route("/login", post(fake_login))
        .route("/functions/{function}", post(fake_function))
        .with_state(counters);
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(addr)
}

/// A gateway wired to a fake portal, running in the background.
pub struct TestServer {
    /// The gateway's address.
    pub addr: SocketAddr,
    /// HTTP client configured for this server.
    pub client: Client,
    /// What the fake portal has seen.
    pub backend: Arc<BackendCounters>,
    /// Shared with the running server.
    pub state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    _eviction: Vec<EvictionHandle>,
}

impl TestServer {
    /// Start with generous timeouts.
    pub async fn start() -> Result<Self> {
        Self::start_with(CacheConfig::new(
            Duration::from_secs(60),
            Duration::from_secs(600),
            Duration::from_secs(5),
        ))
        .await
    }

    /// Start with the given session cache settings for every surface.
    pub async fn start_with(cache_config: CacheConfig) -> Result<Self> {
        let backend = Arc::new(BackendCounters::default());
        let backend_addr = spawn_backend(Arc::clone(&backend)).await?;
        let base_url = format!("http://{backend_addr}");

        let invoker = RemoteInvoker::new(
            ConnectionPool::new(
                HttpFunctionConnector::new(
                    format!("{base_url}/functions"),
                    Duration::from_secs(5),
                ),
                4,
            ),
            Duration::from_secs(5),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let mut state = AppState::new(
            ServerConfig::new().with_bind_address(addr),
            Arc::new(invoker),
        );
        for surface in Surface::ALL {
            let cache = SessionCache::new(
                HttpSessionConnector::new(cache_config.request_timeout),
                cache_config.clone(),
            );
            state = state.with_surface(SurfaceFacade::new(
                surface,
                cache,
                HttpAuthenticator::new(base_url.clone(), surface),
            ));
        }
        let eviction = state.start_eviction();

        let (tx, rx) = oneshot::channel::<()>();
        let server = Server::from_state(state.clone());
        let handle = tokio::spawn(async move {
            let _ = server
                .serve(listener, async move {
                    let _ = rx.await;
                })
                .await;
        });

        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            backend,
            state,
            shutdown: Some(tx),
            handle: Some(handle),
            _eviction: eviction,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// POST a JSON body to `path`.
    pub async fn post_json(&self, path: &str, body: Value) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .json(&body)
            .send()
            .await?)
    }

    /// Signal graceful shutdown and wait for the server task.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            timeout(Duration::from_secs(5), handle).await??;
        }
        self.state.shutdown().await;
        Ok(())
    }
}

/// Wait for the server to accept health checks.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);
    let deadline = Duration::from_secs(5);

    timeout(deadline, async {
        loop {
            if let Ok(resp) = client.get(&url).send().await
                && resp.status().is_success()
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("Server did not start within {:?}", deadline))
}
