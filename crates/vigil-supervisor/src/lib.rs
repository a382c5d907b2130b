//! The connection supervisor: owns every live bot session, drives status
//! transitions from gateway notifications, mirrors them to the store, and
//! pushes dashboard updates.

pub mod error;
mod record;
pub mod supervisor;

pub use error::SupervisorError;
pub use supervisor::BotSupervisor;
