//! HTTP route handlers.

mod health;
mod invoke;
mod session;

pub use health::{HealthResponse, health, health_routes};
pub use invoke::{InvokeRequest, invoke_handler};
pub use session::{LoginInfo, open_session_handler};
