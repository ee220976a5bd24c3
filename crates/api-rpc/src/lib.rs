//! JSON-RPC API Layer
//!
//! Implements the JSON-RPC 2.0 server the presentation layer uses to start
//! runs and observe pipeline state, item statuses and alerts.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
