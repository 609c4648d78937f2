//! Infrastructure adapters and runtime bootstrap.

pub mod auth;
pub mod bus;
pub mod definitions;
pub mod error;
pub mod files;
pub mod http;
pub mod store;
pub mod telemetry;
