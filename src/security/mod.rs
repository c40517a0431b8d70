//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call (submit, query, probe, collaborator lookup):
//!     → rate_limit.rs (check the named resource)
//!     → allowed: proceed
//!     → denied: surface RateLimited with retry-after
//! ```
//!
//! # Design Decisions
//! - One limiter instance shared by every caller
//! - Callers decide what to do with a denial; nothing is auto-queued

pub mod rate_limit;

pub use rate_limit::{RateDecision, RateLimiter, RateUsage};
