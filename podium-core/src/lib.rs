//! # Podium Core
//!
//! Fundamental building blocks shared by every Podium crate:
//! error types, configuration, the public `Entry` record and metrics
//! counters.
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  podium-core                    │
//! ├─────────────────────────────────────────────────┤
//! │  • types      - Entry record, validation        │
//! │  • error      - Error handling                  │
//! │  • config     - Ranker and store options        │
//! │  • metrics    - Atomic operation counters       │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// Re-export commonly used types
pub use config::{RankerOptions, StoreConfig};
pub use error::{Error, Result};
pub use metrics::{Metrics, MetricsSnapshot};
pub use types::Entry;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
