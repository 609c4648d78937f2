//! Domain layer types and invariants.

pub mod clock;
pub mod content;
pub mod counters;
pub mod error;
pub mod filter;
pub mod profile;
pub mod types;
