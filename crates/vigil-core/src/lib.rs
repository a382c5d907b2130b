pub mod classify;
pub mod events;
pub mod gateway;
pub mod history;
pub mod ids;
pub mod security;
pub mod status;
