pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod monitor;
pub mod queue_view;
pub mod repository;
pub mod schema;
pub mod stats;
pub mod store;

pub use api::{create_router, AppState};
pub use config::ServiceConfig;
