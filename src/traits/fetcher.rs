//! Query fetcher trait abstraction.
//!
//! The query cache never talks to the REST API itself. It asks a fetcher for
//! the current server value of a key.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;
use crate::query::QueryKey;

/// Loads the current server value for a query key.
///
/// # Example
///
/// ```ignore
/// use hpbiz_realtime::traits::QueryFetcher;
///
/// struct Companies;
///
/// #[async_trait]
/// impl QueryFetcher for Companies {
///     async fn fetch(&self, key: &QueryKey) -> Result<Value, FetchError> {
///         api.list_companies(key.parts()).await
///     }
/// }
/// ```
#[async_trait]
pub trait QueryFetcher: Send + Sync {
    async fn fetch(&self, key: &QueryKey) -> Result<Value, FetchError>;
}
