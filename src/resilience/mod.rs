//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Ledger call:
//!     → timeouts.rs (every call carries a deadline)
//!     → On network failure: endpoint failover (rpc::manager)
//!     → Submission exhausted the pool: backoff.rs, then try again
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Only network failures are retried; ledger verdicts never are
//! - Jittered backoff prevents thundering herd

pub mod backoff;
pub mod timeouts;

pub use backoff::calculate_backoff;
pub use timeouts::with_timeout;
