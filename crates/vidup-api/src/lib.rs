//! Vidup API Library
//!
//! This crate provides the HTTP handlers, upload services and application setup.

mod api_doc;
pub mod constants;
pub mod error;
mod handlers;
mod middleware;
pub mod services;
pub mod setup;
pub mod state;
mod telemetry;

pub use error::ErrorResponse;
pub use setup::build_app;
