pub mod config;
pub mod error;
pub mod messaging;
pub mod models;
pub mod portals;
pub mod scrapers;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{Result, ServiceError, StoreError};
