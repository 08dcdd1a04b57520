//! JSON-RPC API Layer
//!
//! Implements the JSON-RPC 2.0 server for the Queue Server admin surface
//! and the external scheduling trigger.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use server::{RpcServer, RpcServerConfig};
