//! Session warm-up endpoint.

use axum::{
    Json,
    extract::{Path, State},
};
use portal_types::PortalError;
use portal_types::error::MISSING_LOGIN_INFO_MESSAGE;
use serde::Deserialize;

use crate::boundary::respond;
use crate::error::Result;
use crate::facade::SessionInfo;
use crate::state::AppState;
use crate::surface::Surface;

/// Credentials carried by every RPC request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginInfo {
    /// Account name.
    pub auth: String,
    pub password: String,
}

impl LoginInfo {
    /// `(identity, credential)`, or the missing-login-info failure.
    pub fn require(&self) -> std::result::Result<(&str, &str), PortalError> {
        if self.auth.is_empty() || self.password.is_empty() {
            return Err(PortalError::InvalidParameter(
                MISSING_LOGIN_INFO_MESSAGE.to_string(),
            ));
        }
        Ok((&self.auth, &self.password))
    }
}

/// `POST /api/v1/{surface}/session`
pub async fn open_session_handler(
    State(state): State<AppState>,
    Path(surface): Path<String>,
    Json(login): Json<LoginInfo>,
) -> Result<Json<SessionInfo>> {
    respond("open_session", async move {
        let surface: Surface = surface.parse()?;
        let (identity, credential) = login.require()?;
        let service = state.surface(surface)?;
        service.open_session(identity, credential).await
    })
    .await
}
