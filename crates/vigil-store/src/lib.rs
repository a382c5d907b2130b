pub mod bots;
pub mod database;
pub mod error;
pub mod history;
mod row_helpers;
pub mod schema;
pub mod users;

pub use database::Database;
pub use error::StoreError;
