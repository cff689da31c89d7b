//! Query keys and the cache the invalidation bridge drives.

mod cache;
mod key;

pub use cache::{CacheEntry, QueryCache};
pub use key::QueryKey;
