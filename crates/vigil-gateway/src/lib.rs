//! Gateway implementations: the real Discord-backed connection and a
//! scriptable mock for tests.

pub mod discord;
pub mod mock;

pub use discord::{DiscordGatewayConfig, DiscordGatewayFactory};
pub use mock::{MockBehavior, MockGatewayFactory};
