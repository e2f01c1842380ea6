//! HTTP API: configuration, server wiring, routing, and request/response
//! mapping for the forecast service.

pub mod app;
pub mod config;

pub use config::{ConfigError, ServiceConfig};
