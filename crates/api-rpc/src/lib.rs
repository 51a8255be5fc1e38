//! JSON-RPC API Layer
//!
//! Implements the JSON-RPC 2.0 server for the Quillforge batch engine.

pub mod error;
pub mod handler;
pub mod rate_limiter;
pub mod server;
pub mod types;

pub use handler::RateLimitConfig;
pub use server::{RpcServer, RpcServerConfig, RpcServerError, DEFAULT_RPC_PORT};
