//! FarmDispatch common library
//!
//! This crate contains shared code used by the coordinator and the workers.

pub mod config;
pub mod error;
pub mod metrics;
pub mod status;

// Re-export commonly used types
pub use config::FarmDispatchConfig;
pub use error::{DispatchError, Result};
pub use metrics::{MetricsRegistry, METRICS};
