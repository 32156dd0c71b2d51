//! Runtime configuration types for operational parameters
//!
//! These types define configuration that controls runtime behavior like
//! HTTP timeouts, default retry budgets and backoff policies.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuntimeConfig {
    /// Network and HTTP configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Retry defaults and backoff policy
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Network and HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkConfig {
    /// Per-attempt HTTP timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Connection establishment timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// User agent string for HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl NetworkConfig {
    /// Per-attempt timeout as a `Duration`
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Connect timeout as a `Duration`
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_http_timeout() -> u64 {
    60
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_user_agent() -> String {
    format!(
        "autoretry/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Retry defaults applied when a request does not specify its own
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Retries used when a request omits `auto_retry`
    #[serde(default)]
    pub default_retries: u32,

    /// Interval used by the short overload (retries only)
    #[serde(default)]
    pub default_interval_secs: u64,

    /// Extra integer handed to every delay calculation
    #[serde(default)]
    pub delay_modifier: u32,

    /// Emit tracing events for every attempt
    #[serde(default)]
    pub log_attempts: bool,

    /// Backoff policy used by the built-in delay calculators
    #[serde(default)]
    pub backoff: BackoffPolicy,
}

impl RetryConfig {
    /// Default interval as a `Duration`
    pub fn default_interval(&self) -> Duration {
        Duration::from_secs(self.default_interval_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            default_retries: 0,
            default_interval_secs: 0,
            delay_modifier: 0,
            log_attempts: false,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Backoff policy for the built-in delay calculators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BackoffPolicy {
    /// Backoff strategy
    #[serde(default)]
    pub strategy: BackoffStrategy,

    /// Growth factor for exponential backoff
    #[serde(default = "default_backoff_multiplier")]
    pub multiplier: f64,

    /// Upper bound for any computed delay, in seconds
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,

    /// Add up to 25% random jitter to computed delays
    #[serde(default)]
    pub jitter: bool,
}

impl BackoffPolicy {
    /// Maximum delay as a `Duration`
    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::default(),
            multiplier: default_backoff_multiplier(),
            max_delay_secs: default_max_delay(),
            jitter: false,
        }
    }
}

fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_max_delay() -> u64 {
    300 // 5 minutes
}

/// Backoff strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackoffStrategy {
    /// Constant interval between attempts (default)
    #[default]
    Fixed,

    /// Interval grows by one step per retry
    Linear,

    /// Interval multiplies per retry
    Exponential,
}

impl std::str::FromStr for BackoffStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "linear" => Ok(Self::Linear),
            "exponential" => Ok(Self::Exponential),
            other => Err(format!(
                "unknown backoff strategy '{}': expected fixed, linear or exponential",
                other
            )),
        }
    }
}
