//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → every cancel token flips to true → polling loops stop
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → Shutdown::trigger
//! ```
//!
//! # Design Decisions
//! - Cancellation is a `watch` flag so late subscribers still see it
//! - Cancelling a poll never cancels the transaction itself

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{spawn_interrupt_handler, wait_for_interrupt};
