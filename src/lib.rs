//! Warden - In-process Rate Limiting
//!
//! This crate implements a fixed-window rate limiter meant to sit inside a
//! larger service as a request-admission gate. Each caller-supplied namespace
//! (a client address, an API key) gets a fixed number of permits that are
//! replenished when its window expires.
//!
//! ```no_run
//! use warden::ratelimit::Store;
//!
//! # fn main() -> warden::error::Result<()> {
//! let store = Store::new(3, 10.0)?;
//!
//! assert!(store.consume_sync("10.0.0.1"));
//! assert!(store.has_token_sync("10.0.0.1"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod ratelimit;

pub use config::{LimiterConfig, LimiterSettings};
pub use error::{Result, WardenError};
pub use ratelimit::{Admission, RateLimiterBackend, Store};
