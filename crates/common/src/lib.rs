//! citenet Common Library
//!
//! Shared code for the citenet crates including:
//! - Citation database record model
//! - Error types and handling
//! - Configuration management
//! - Outbound HTTP client seam
//! - Metrics and observability

pub mod config;
pub mod errors;
pub mod http;
pub mod metrics;
pub mod records;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use http::{HttpResponse, NetworkClient};
pub use records::{IdKind, Record};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
