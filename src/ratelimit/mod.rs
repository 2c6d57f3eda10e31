//! Rate limiting logic and state management.

mod backend;
mod bucket;
mod expiry;
mod store;

pub use backend::RateLimiterBackend;
pub use store::{Admission, Store};
