//! Remote function invocation over a bounded connection pool.
//!
//! Domain operations that are delegated to an external function-execution
//! backend go through a [`RemoteInvoker`]. It checks a connection out of a
//! [`ConnectionPool`], sends the payload, returns the connection, and turns
//! the backend's `{status, result | error}` reply into a value or an error.

mod error;
mod invoker;
mod outcome;
mod pool;

pub use error::{Error, Result};
pub use invoker::{Invoke, InvocationRequest, RemoteInvoker};
pub use outcome::{InvocationOutcome, InvocationStatus};
pub use pool::{ConnectionFactory, ConnectionPool, PoolStats, PooledConnection, RemoteConnection};
