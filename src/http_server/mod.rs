//! # HTTP Server Module
//!
//! Runs the REST binding for a store registry.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - one collection, item and field route set per registered store

pub mod config;
pub mod health;
pub mod server;

pub use config::HttpServerConfig;
pub use server::HttpServer;
