//! Rate limiting logic and state management.

mod entry;
mod key;
mod limiter;
mod policy;

pub use entry::{LimiterEntry, Verdict};
pub use key::LimiterKey;
pub use limiter::{LimiterSettings, RateLimiter};
pub use policy::{Policy, PolicyTable};
