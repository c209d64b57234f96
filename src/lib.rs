#![doc = "The `taskvault` library crate."]
#![doc = ""]
#![doc = "This crate contains the account and token authentication layer, the task"]
#![doc = "query and statistics engine, the storage backends, routing configuration"]
#![doc = "and error handling for the TaskVault service. The binary (`main.rs`) only"]
#![doc = "loads configuration and starts the HTTP server."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod routes;
pub mod state;
pub mod stats;
pub mod store;

pub use crate::config::Config;
pub use crate::error::AppError;
pub use crate::state::AppState;
