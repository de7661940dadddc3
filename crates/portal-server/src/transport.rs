//! reqwest-backed transports for portal sessions and remote invocation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use portal_invoke::{ConnectionFactory, InvocationOutcome, RemoteConnection};
use portal_session::{Connector, SessionHandle};
use portal_types::PortalError;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, trace};

use crate::facade::Authenticator;
use crate::surface::Surface;

// ─────────────────────────────────────────────────────────────────────────────
// Portal sessions
// ─────────────────────────────────────────────────────────────────────────────

/// An HTTP client carrying one account's portal cookies.
#[derive(Debug, Clone)]
pub struct HttpSession {
    client: Client,
    closed: Arc<AtomicBool>,
}

impl HttpSession {
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl SessionHandle for HttpSession {
    async fn close(&self) -> portal_session::Result<()> {
        // Pooled sockets go away with the last clone of the client.
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Opens cookie-carrying clients with a fixed request timeout.
#[derive(Debug, Clone)]
pub struct HttpSessionConnector {
    timeout: Duration,
}

impl HttpSessionConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Connector for HttpSessionConnector {
    type Handle = HttpSession;

    fn connect(&self) -> portal_session::Result<HttpSession> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(self.timeout)
            .build()
            .map_err(|e| portal_session::Error::Connect(e.to_string()))?;
        Ok(HttpSession {
            client,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// Logs in through the portal's auth server.
///
/// Posts the credentials to `{base_url}/login` with the surface as the
/// requested service, kicking any other session of the account.
#[derive(Debug, Clone)]
pub struct HttpAuthenticator {
    base_url: String,
    surface: Surface,
}

impl HttpAuthenticator {
    pub fn new(base_url: impl Into<String>, surface: Surface) -> Self {
        Self {
            base_url: base_url.into(),
            surface,
        }
    }

    fn login_url(&self) -> String {
        format!("{}/login", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Authenticator<HttpSession> for HttpAuthenticator {
    async fn login(
        &self,
        session: HttpSession,
        identity: &str,
        credential: &str,
    ) -> Result<HttpSession, PortalError> {
        let response = session
            .client()
            .post(self.login_url())
            .form(&[
                ("username", identity),
                ("password", credential),
                ("service", self.surface.as_str()),
                ("kick", "true"),
            ])
            .send()
            .await
            .map_err(|e| PortalError::Request(e.to_string()))?;

        login_status(response.status())?;
        debug!(surface = %self.surface, identity, "Portal login accepted");
        Ok(session)
    }
}

/// Map the auth server's answer onto the failure taxonomy.
fn login_status(status: StatusCode) -> Result<(), PortalError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::UNAUTHORIZED => Err(PortalError::IncorrectLoginCredentials),
        StatusCode::FORBIDDEN => Err(PortalError::NotAllowedService),
        StatusCode::CONFLICT => Err(PortalError::MultiSessionConflict),
        StatusCode::PRECONDITION_REQUIRED => Err(PortalError::NeedCaptcha),
        s if s.is_server_error() => Err(PortalError::Website(format!("auth server returned {s}"))),
        s => Err(PortalError::UnknownAuthserver(format!("unexpected status {s}"))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Remote invocation
// ─────────────────────────────────────────────────────────────────────────────

/// A client that posts payloads to `{endpoint}/{function}`.
#[derive(Debug)]
pub struct HttpFunctionConnection {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

#[async_trait]
impl RemoteConnection for HttpFunctionConnection {
    async fn call(&self, function: &str, payload: &Value) -> portal_invoke::Result<InvocationOutcome> {
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), function);
        trace!(url = %url, "Posting invocation");

        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        if status.is_success() {
            return InvocationOutcome::from_slice(&body);
        }

        // A structured outcome outranks the HTTP status it arrived with.
        InvocationOutcome::from_slice(&body).map_err(|_| {
            portal_invoke::Error::Transport(format!("{url} returned {status}"))
        })
    }

    async fn close(&self) -> portal_invoke::Result<()> {
        Ok(())
    }
}

impl HttpFunctionConnection {
    fn transport_error(&self, e: reqwest::Error) -> portal_invoke::Error {
        if e.is_timeout() {
            portal_invoke::Error::Timeout(self.timeout)
        } else {
            portal_invoke::Error::Transport(e.to_string())
        }
    }
}

/// Creates [`HttpFunctionConnection`]s for the invocation pool.
#[derive(Debug, Clone)]
pub struct HttpFunctionConnector {
    endpoint: String,
    timeout: Duration,
}

impl HttpFunctionConnector {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ConnectionFactory for HttpFunctionConnector {
    type Connection = HttpFunctionConnection;

    async fn create(&self) -> portal_invoke::Result<HttpFunctionConnection> {
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| portal_invoke::Error::Transport(e.to_string()))?;
        Ok(HttpFunctionConnection {
            client,
            endpoint: self.endpoint.clone(),
            timeout: self.timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use axum::{
        Form, Json, Router,
        extract::Path,
        http::StatusCode as AxumStatus,
        routing::post,
    };
    use portal_invoke::{Invoke, RemoteInvoker};
    use portal_types::ErrorKind;
    use serde::Deserialize;
    use serde_json::json;
    use tokio::net::TcpListener;

    #[derive(Deserialize)]
    struct LoginForm {
        username: String,
        password: String,
        service: String,
    }

    async fn fake_login(Form(form): Form<LoginForm>) -> AxumStatus {
        match (form.username.as_str(), form.password.as_str(), form.service.as_str()) {
            (_, _, "library") if form.username == "no-library" => AxumStatus::FORBIDDEN,
            ("captcha", _, _) => AxumStatus::PRECONDITION_REQUIRED,
            ("busy", _, _) => AxumStatus::CONFLICT,
            (_, "secret", _) => AxumStatus::OK,
            _ => AxumStatus::UNAUTHORIZED,
        }
    }

    async fn fake_function(Path(function): Path<String>, Json(payload): Json<Value>) -> Json<Value> {
        if payload["password"] != "secret" {
            return Json(json!({"status": 0, "error": "用户名或密码错误"}));
        }
        Json(json!({"status": 1, "result": {"function": function, "target": payload["target"]}}))
    }

    async fn failing_function() -> (AxumStatus, Json<Value>) {
        (
            AxumStatus::INTERNAL_SERVER_ERROR,
            Json(json!({"status": 0, "error": "用户名或密码错误"})),
        )
    }

    async fn spawn_backend() -> SocketAddr {
        let app = Router::new()
            .route("/login", post(fake_login))
            .route("/functions/{function}", post(fake_function))
            .route("/failing/{function}", post(failing_function));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn login(addr: SocketAddr, surface: Surface, user: &str, pass: &str) -> Result<HttpSession, PortalError> {
        let session = HttpSessionConnector::new(Duration::from_secs(5)).connect().unwrap();
        HttpAuthenticator::new(format!("http://{addr}"), surface)
            .login(session, user, pass)
            .await
    }

    #[tokio::test]
    async fn test_login_statuses() {
        let addr = spawn_backend().await;

        assert!(login(addr, Surface::Card, "u1", "secret").await.is_ok());
        assert_eq!(
            login(addr, Surface::Card, "u1", "wrong").await.unwrap_err(),
            PortalError::IncorrectLoginCredentials
        );
        assert_eq!(
            login(addr, Surface::Library, "no-library", "secret").await.unwrap_err(),
            PortalError::NotAllowedService
        );
        assert_eq!(
            login(addr, Surface::Mycqu, "captcha", "secret").await.unwrap_err(),
            PortalError::NeedCaptcha
        );
        assert_eq!(
            login(addr, Surface::Mycqu, "busy", "secret").await.unwrap_err(),
            PortalError::MultiSessionConflict
        );
    }

    #[tokio::test]
    async fn test_unreachable_portal_is_website_unavailable() {
        // Bind then drop to get a port nobody listens on.
        let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
        let err = login(addr, Surface::Card, "u1", "secret").await.unwrap_err();
        assert_eq!(
            err.classify().map(|c| c.kind()),
            Some(ErrorKind::WebsiteUnavailable)
        );
    }

    #[test]
    fn test_login_status_mapping() {
        assert!(login_status(StatusCode::OK).is_ok());
        assert!(matches!(
            login_status(StatusCode::BAD_GATEWAY),
            Err(PortalError::Website(_))
        ));
        assert!(matches!(
            login_status(StatusCode::IM_A_TEAPOT),
            Err(PortalError::UnknownAuthserver(_))
        ));
    }

    #[tokio::test]
    async fn test_close_marks_session() {
        let session = HttpSessionConnector::new(Duration::from_secs(1)).connect().unwrap();
        assert!(!session.is_closed());
        session.close().await.unwrap();
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_function_invocation_round_trip() {
        let addr = spawn_backend().await;
        let connector = HttpFunctionConnector::new(format!("http://{addr}/functions"), Duration::from_secs(5));
        let invoker = RemoteInvoker::new(portal_invoke::ConnectionPool::new(connector, 2), Duration::from_secs(5));

        let value = invoker
            .invoke(
                "mycqu",
                json!({"username": "u1", "password": "secret", "target": ["card", "card"], "params": {}}),
            )
            .await
            .unwrap();
        assert_eq!(value, json!({"function": "mycqu", "target": ["card", "card"]}));

        let err = invoker
            .invoke(
                "mycqu",
                json!({"username": "u1", "password": "bad", "target": ["card", "card"], "params": {}}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, portal_invoke::Error::Failed { ref message } if message == "用户名或密码错误"));
    }

    #[tokio::test]
    async fn test_function_http_error_is_transport() {
        let addr = spawn_backend().await;
        let connector = HttpFunctionConnector::new(format!("http://{addr}/missing"), Duration::from_secs(5));
        let connection = connector.create().await.unwrap();
        let err = connection.call("mycqu", &json!({})).await.unwrap_err();
        assert!(matches!(err, portal_invoke::Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_structured_failure_survives_error_status() {
        let addr = spawn_backend().await;
        let connector = HttpFunctionConnector::new(format!("http://{addr}/failing"), Duration::from_secs(5));
        let invoker = RemoteInvoker::new(portal_invoke::ConnectionPool::new(connector, 1), Duration::from_secs(5));

        let err = invoker.invoke("mycqu", json!({})).await.unwrap_err();
        assert!(matches!(err, portal_invoke::Error::Failed { ref message } if message == "用户名或密码错误"));

        let classified = PortalError::from(err).classify().unwrap();
        assert_eq!(classified.kind(), ErrorKind::RemoteInvocationError);
        assert_eq!(classified.message(), "用户名或密码错误");
        assert_eq!(classified.effective_kind(), ErrorKind::InvalidCredentials);
    }
}
