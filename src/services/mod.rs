//! Background services for the wantlist monitor

pub mod metrics;
pub mod rate_limiter;
pub mod scheduler;

pub use metrics::{Metrics, MetricsSnapshot};
pub use rate_limiter::RateLimiter;
pub use scheduler::Scheduler;
