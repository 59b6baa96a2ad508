pub mod cli;
pub mod commands;
pub mod config;
pub mod observability;
pub mod server;

pub use config::{AppConfig, ConfigLoadError, StorageBackend};
pub use server::{IdgateServer, build_app, build_state, open_storage};
