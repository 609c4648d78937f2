//! Application services layer scaffolding.

pub mod auth;
pub mod contents;
pub mod definitions;
pub mod dispatch;
pub mod error;
pub mod files;
pub mod messaging;
pub mod pagination;
pub mod profiles;
pub mod repos;
pub mod request;
pub mod search;
