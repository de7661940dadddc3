//! Shared types for the campus portal gateway.
//!
//! - [`error`]: the closed failure taxonomy and its total classification
//! - [`config`]: capability traits so crates can take configuration without
//!   depending on the full config schema

pub mod config;
pub mod error;

pub use config::{
    ConfigProvider, HasInvokeConfig, HasSessionConfig, InvokeConfigProvider,
    SessionConfigProvider, defaults as config_defaults,
};
pub use error::{ClassifiedError, ErrorKind, PortalError, Result};
