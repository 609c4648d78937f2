//! Mediateca: listing, search, and usage-counter service for a media
//! content catalogue.
//!
//! The crate is split along the same lines as the runtime: `domain` holds
//! the filter tree, clock helpers, and entities; `application` holds the
//! services and the contracts they consume; `cache` holds the listing
//! cache; `infra` holds the concrete adapters and the HTTP facade;
//! `config` holds the layered settings loader.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
