pub mod auth;
pub mod routes;
pub mod rpc;
pub mod server;
pub mod session;
pub mod tools;
pub mod transport;

pub use server::{start, ServerConfig, ServerHandle};

pub const SERVER_NAME: &str = "Lifelog MCP Remote Server";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
