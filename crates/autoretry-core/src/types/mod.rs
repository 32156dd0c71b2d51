//! Type definitions for autoretry configuration and request tracking

mod request;
mod runtime_config;

pub use request::*;
pub use runtime_config::*;
