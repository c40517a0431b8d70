//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON lines)
//!     → Whatever metrics recorder the host installs
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Key material, passwords and decrypted bundles never reach a log field
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

use crate::config::ObservabilityConfig;

/// Initialize logging and metric switches from config.
pub fn init(config: &ObservabilityConfig) {
    logging::init(config);
    metrics::set_enabled(config.metrics_enabled);
}
