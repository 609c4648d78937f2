//! Listing cache.
//!
//! Two layers share one keyed store and one derived key family:
//!
//! - assembled JSON responses, kept for half the configured expiration
//!   so clients converge quickly after edits
//! - row pages and totals, kept for the full expiration as rebuild
//!   hints for the content store
//!
//! Keys embed the resolved time bucket, so every entry of a listing
//! shape rolls over together when the bucket advances.

mod keys;
mod lock;
mod store;

pub use keys::ListingKey;
pub use store::{CacheError, ListingCache, MemoryListingCache};
