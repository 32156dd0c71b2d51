//! # autoretry-core
//!
//! Core library for autoretry providing:
//! - Retry controller driving logical requests through their attempts
//! - Task tracker mapping in-flight attempts to logical requests
//! - Delay calculators, retry predicates and observers
//! - Runtime configuration types and the hierarchical config loader

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use config::HierarchicalConfigLoader;
pub use error::{Error, Result};
pub use retry::{RequestControl, RequestHandle, RetryController, RetryError, RetryOptions};
