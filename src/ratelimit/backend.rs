//! Rate limiter trait for hosts that compose admission asynchronously.

use async_trait::async_trait;

use super::store::Store;
use crate::error::Result;

/// Trait for rate limiter implementations.
///
/// Request handlers (HTTP middleware, RPC services) hold a
/// `dyn RateLimiterBackend` so the limiter behind them can be swapped or
/// stubbed out in tests.
#[async_trait]
pub trait RateLimiterBackend: Send + Sync {
    /// Consume a permit for `namespace`.
    ///
    /// Resolves to the remaining count, or fails with
    /// [`WardenError::RateLimited`](crate::error::WardenError::RateLimited).
    async fn consume(&self, namespace: &str) -> Result<u64>;

    /// Check for a permit without consuming it.
    async fn has_token(&self, namespace: &str) -> Result<u64>;
}

#[async_trait]
impl RateLimiterBackend for Store {
    async fn consume(&self, namespace: &str) -> Result<u64> {
        Store::consume(self, namespace).await
    }

    async fn has_token(&self, namespace: &str) -> Result<u64> {
        Store::has_token(self, namespace).await
    }
}
