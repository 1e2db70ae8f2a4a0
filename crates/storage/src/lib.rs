pub mod api;
pub mod error;
mod store;
pub mod store_db;

pub use error::StoreError;
pub use store::{EngineType, SessionUpdates, Store};
