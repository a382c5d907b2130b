//! HTTP + WebSocket surface for the dashboard: REST bot management,
//! session resolution, and live push updates.

pub mod client;
pub mod event_bridge;
pub mod handlers;
pub mod server;
pub mod session;

pub use server::{start, ServerConfig, ServerHandle};
