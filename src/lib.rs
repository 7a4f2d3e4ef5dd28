// Error taxonomy
pub mod error;

// Configuration and provider registry
pub mod config;

// Encrypted credential storage
pub mod credentials;

// Proxy-aware HTTP transport
pub mod transport;

// Token lifecycle and single-flight refresh
pub mod oauth;

// Authenticated request executor
pub mod executor;

// Cursor pagination
pub mod pagination;

// Metric classification
pub mod classify;

pub use error::{Error, Result};
