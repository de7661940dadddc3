//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use portal_types::config_defaults;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Remote function that serves `[surface, operation]` targets.
    pub invoke_function: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::new(
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                config_defaults::DEFAULT_PORT,
            ),
            invoke_function: "mycqu".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Set the remote function name.
    pub fn with_invoke_function(mut self, function: impl Into<String>) -> Self {
        self.invoke_function = function.into();
        self
    }
}
