//! Core limiter store implementation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{ready, Ready};
use tracing::{debug, info, trace};

use super::bucket::Bucket;
use super::expiry::{Expire, ExpiryScheduler};
use crate::config::{validate_threshold, validate_ttl, LimiterConfig};
use crate::error::{Result, WardenError};

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// No namespace was given; the call is not rate limited.
    Unlimited,
    /// A permit was available. `remaining` is the count after the decision.
    Admitted { remaining: u64 },
    /// The namespace has no permit left in its current window.
    Rejected,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Admission::Rejected)
    }

    /// Remaining permits as a signed count.
    ///
    /// `-1` marks a rejection. An unlimited hop always reports `1`.
    pub fn remaining_tokens(&self) -> i64 {
        match self {
            Admission::Unlimited => 1,
            Admission::Admitted { remaining } => i64::try_from(*remaining).unwrap_or(i64::MAX),
            Admission::Rejected => -1,
        }
    }
}

/// Fixed-window limiter keyed by namespace.
///
/// Each namespace gets `threshold` permits when it is first seen. The window
/// is fixed at that moment: after `window` has elapsed the namespace's bucket
/// is swept by the expiry thread and the next check starts a fresh one.
///
/// The store is cheap to clone; all clones share the same buckets. The expiry
/// thread stops once the last clone is dropped.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    threshold: u64,
    window: Duration,
    /// Buckets indexed by namespace
    buckets: DashMap<String, Bucket>,
    next_generation: AtomicU64,
    expiry: ExpiryScheduler,
}

impl Store {
    /// Create a store from a threshold and a ttl in seconds.
    ///
    /// Fails with [`WardenError::InvalidConfiguration`] when either value is
    /// negative or the ttl is not a finite number.
    pub fn new(threshold: i64, ttl: f64) -> Result<Self> {
        Self::with_window(validate_threshold(threshold)?, validate_ttl(ttl)?)
    }

    /// Create a store from a raw configuration.
    pub fn from_config(config: &LimiterConfig) -> Result<Self> {
        let settings = config.validate()?;
        Self::with_window(settings.threshold, settings.window)
    }

    /// Create a store from already-typed settings.
    pub fn with_window(threshold: u64, window: Duration) -> Result<Self> {
        let inner = Arc::new(StoreInner {
            threshold,
            window,
            buckets: DashMap::new(),
            next_generation: AtomicU64::new(1),
            expiry: ExpiryScheduler::new(),
        });
        inner.expiry.start(Arc::downgrade(&inner))?;

        info!(
            threshold = threshold,
            window = ?window,
            "Limiter store initialized"
        );

        Ok(Self { inner })
    }

    /// Consume a permit for `namespace`. Returns whether the call was admitted.
    pub fn consume_sync(&self, namespace: &str) -> bool {
        self.check(namespace, true).is_admitted()
    }

    /// Report whether `namespace` has a permit, without consuming it.
    pub fn has_token_sync(&self, namespace: &str) -> bool {
        self.check(namespace, false).is_admitted()
    }

    /// Consume a permit, reporting the outcome through a ready future.
    ///
    /// The decision is made before this returns; the future only carries it.
    /// It resolves to the remaining count, or [`WardenError::RateLimited`].
    pub fn consume(&self, namespace: &str) -> Ready<Result<u64>> {
        ready(self.settle(namespace, true))
    }

    /// Peek for a permit, reporting the outcome through a ready future.
    pub fn has_token(&self, namespace: &str) -> Ready<Result<u64>> {
        ready(self.settle(namespace, false))
    }

    /// Run one admission check.
    ///
    /// An empty namespace is never limited and touches no state. Otherwise the
    /// namespace's bucket is created on first use (arming its expiry) and a
    /// permit is taken from it if one is left; `consume` decides whether the
    /// permit is actually spent.
    pub fn check(&self, namespace: &str, consume: bool) -> Admission {
        if namespace.is_empty() {
            trace!("No namespace given, not rate limiting");
            return Admission::Unlimited;
        }

        let taken = match self.inner.buckets.get_mut(namespace) {
            Some(mut bucket) => bucket.take(consume),
            None => self.take_or_create(namespace, consume),
        };

        trace!(
            namespace = %namespace,
            consume = consume,
            remaining = ?taken,
            "Checked rate limit"
        );

        match taken {
            Some(remaining) => Admission::Admitted { remaining },
            None => {
                debug!(namespace = %namespace, "Rate limit exceeded");
                Admission::Rejected
            }
        }
    }

    /// Slow path: the namespace had no bucket when we looked.
    ///
    /// Another caller may have created it in the meantime, so go through the
    /// entry API and only arm an expiry if this call inserted the bucket.
    fn take_or_create(&self, namespace: &str, consume: bool) -> Option<u64> {
        let (taken, created) = match self.inner.buckets.entry(namespace.to_string()) {
            Entry::Occupied(mut entry) => (entry.get_mut().take(consume), None),
            Entry::Vacant(entry) => {
                let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
                let mut bucket = Bucket::new(self.inner.threshold, generation);
                let taken = bucket.take(consume);
                entry.insert(bucket);
                (taken, Some(generation))
            }
        };

        if let Some(generation) = created {
            debug!(
                namespace = %namespace,
                generation = generation,
                threshold = self.inner.threshold,
                "Creating new bucket"
            );
            // A window too long to land on the clock never closes.
            match Instant::now().checked_add(self.inner.window) {
                Some(at) => self.inner.expiry.schedule(namespace, generation, at),
                None => debug!(
                    namespace = %namespace,
                    generation = generation,
                    "Window outlasts the clock, not arming expiry"
                ),
            }
        }

        taken
    }

    fn settle(&self, namespace: &str, consume: bool) -> Result<u64> {
        match self.check(namespace, consume) {
            Admission::Unlimited => Ok(1),
            Admission::Admitted { remaining } => Ok(remaining),
            Admission::Rejected => Err(WardenError::RateLimited {
                namespace: namespace.to_string(),
            }),
        }
    }

    /// Permits left for `namespace` in its current window.
    ///
    /// Returns `None` if the namespace has no active window. Unlike the
    /// admission checks this never creates a bucket.
    pub fn remaining(&self, namespace: &str) -> Option<u64> {
        self.inner.buckets.get(namespace).map(|b| b.remaining())
    }

    /// Time until `namespace`'s current window closes.
    pub fn time_until_reset(&self, namespace: &str) -> Option<Duration> {
        self.inner
            .buckets
            .get(namespace)
            .map(|b| b.time_until_reset(self.inner.window))
    }

    /// Get the number of namespaces with an active window.
    pub fn active_namespaces(&self) -> usize {
        self.inner.buckets.len()
    }

    pub fn threshold(&self) -> u64 {
        self.inner.threshold
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    #[cfg(test)]
    fn generation_of(&self, namespace: &str) -> Option<u64> {
        self.inner.buckets.get(namespace).map(|b| b.generation())
    }

    #[cfg(test)]
    fn expire(&self, namespace: &str, generation: u64) -> bool {
        self.inner.expire(namespace, generation)
    }
}

impl Expire for StoreInner {
    fn expire(&self, namespace: &str, generation: u64) -> bool {
        let removed = self
            .buckets
            .remove_if(namespace, |_, bucket| bucket.generation() == generation)
            .is_some();

        if removed {
            debug!(
                namespace = %namespace,
                generation = generation,
                "Bucket expired"
            );
        }

        removed
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("threshold", &self.inner.threshold)
            .field("window", &self.inner.window)
            .field("active_namespaces", &self.inner.buckets.len())
            .finish()
    }
}
