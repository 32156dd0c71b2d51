//! Hierarchical configuration loader with precedence
//!
//! Loads runtime configuration from multiple sources with the following
//! precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. User config (~/.autoretry/runtime.yaml)
//! 3. An explicit file supplied by the caller
//! 4. Environment variables (AUTORETRY_* prefix)
//! 5. CLI flags (handled by caller)
//!
//! File layers are merged key by key, so a file that only sets
//! `retry.default-retries` leaves every other value untouched.

use crate::error::{Error, Result};
use crate::types::RuntimeConfig;
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde_yaml_ng::Value;
use std::env;
use std::fs;
use std::str::FromStr;

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

const RUNTIME_DEFAULTS: &str = "runtime-defaults.yaml";
const RUNTIME_FILE: &str = "runtime.yaml";

/// Configuration hierarchy loader
#[derive(Debug, Clone)]
pub struct HierarchicalConfigLoader {
    /// Base directory for configuration files
    config_dir: Utf8PathBuf,

    /// Explicit configuration file layered above the user config
    explicit_file: Option<Utf8PathBuf>,
}

impl HierarchicalConfigLoader {
    /// Create a loader rooted at the standard config directory
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        Ok(Self::with_dir(config_dir))
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self {
            config_dir,
            explicit_file: None,
        }
    }

    /// Layer an explicit file above the user config
    ///
    /// Unlike the user config, this file must exist.
    pub fn with_file(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.explicit_file = Some(path.into());
        self
    }

    /// Get the standard config directory (~/.autoretry)
    fn get_config_dir() -> Result<Utf8PathBuf> {
        let home = env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .ok()
            .map(Utf8PathBuf::from)
            .or_else(|| dirs::home_dir().and_then(|home| Utf8PathBuf::from_path_buf(home).ok()))
            .ok_or_else(|| Error::invalid_config("Could not determine home directory"))?;

        Ok(home.join(".autoretry"))
    }

    /// Load runtime configuration with hierarchical precedence
    pub fn load_runtime_config(&self) -> Result<RuntimeConfig> {
        // Start with embedded defaults
        let mut merged = Self::load_embedded_yaml(RUNTIME_DEFAULTS)?;

        let user_path = self.config_dir.join(RUNTIME_FILE);
        if user_path.exists() {
            tracing::debug!(path = %user_path, "loading user runtime config");
            merge_yaml(&mut merged, self.load_yaml_file(&user_path)?);
        }

        if let Some(path) = &self.explicit_file {
            if !path.exists() {
                return Err(Error::config_not_found(path.as_str()));
            }
            tracing::debug!(path = %path, "loading explicit runtime config");
            merge_yaml(&mut merged, self.load_yaml_file(path)?);
        }

        let config: RuntimeConfig = serde_yaml_ng::from_value(merged)
            .map_err(|e| Error::invalid_config(format!("Failed to parse runtime config: {}", e)))?;

        let config = self.apply_env_overrides(config)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load an embedded configuration file
    fn load_embedded_yaml(filename: &str) -> Result<Value> {
        let embedded_file = EmbeddedConfigs::get(filename).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", filename))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", filename))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to parse embedded config {}: {}",
                filename, e
            ))
        })
    }

    /// Load a YAML file and parse it
    fn load_yaml_file(&self, path: &Utf8Path) -> Result<Value> {
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Value::Mapping(Default::default()));
        }
        let value: Value = serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))?;
        // A comment-only file parses to null and contributes nothing
        Ok(match value {
            Value::Null => Value::Mapping(Default::default()),
            other => other,
        })
    }

    /// Apply environment variable overrides to runtime config
    fn apply_env_overrides(&self, mut config: RuntimeConfig) -> Result<RuntimeConfig> {
        // Network
        if let Some(val) = env_parse("AUTORETRY_HTTP_TIMEOUT_SECS")? {
            config.network.http_timeout_secs = val;
        }

        if let Some(val) = env_parse("AUTORETRY_CONNECT_TIMEOUT_SECS")? {
            config.network.connect_timeout_secs = val;
        }

        if let Ok(val) = env::var("AUTORETRY_USER_AGENT") {
            config.network.user_agent = val;
        }

        // Retry defaults
        if let Some(val) = env_parse("AUTORETRY_DEFAULT_RETRIES")? {
            config.retry.default_retries = val;
        }

        if let Some(val) = env_parse("AUTORETRY_DEFAULT_INTERVAL_SECS")? {
            config.retry.default_interval_secs = val;
        }

        if let Some(val) = env_parse("AUTORETRY_DELAY_MODIFIER")? {
            config.retry.delay_modifier = val;
        }

        if let Some(val) = env_parse("AUTORETRY_LOG_ATTEMPTS")? {
            config.retry.log_attempts = val;
        }

        // Backoff
        if let Ok(val) = env::var("AUTORETRY_BACKOFF_STRATEGY") {
            config.retry.backoff.strategy = val.parse().map_err(Error::invalid_config)?;
        }

        if let Some(val) = env_parse("AUTORETRY_BACKOFF_MULTIPLIER")? {
            config.retry.backoff.multiplier = val;
        }

        if let Some(val) = env_parse("AUTORETRY_MAX_DELAY_SECS")? {
            config.retry.backoff.max_delay_secs = val;
        }

        if let Some(val) = env_parse("AUTORETRY_JITTER")? {
            config.retry.backoff.jitter = val;
        }

        Ok(config)
    }

    fn validate(config: &RuntimeConfig) -> Result<()> {
        let multiplier = config.retry.backoff.multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(Error::invalid_config(format!(
                "retry.backoff.multiplier must be a finite number >= 1.0, got {}",
                multiplier
            )));
        }
        if config.network.http_timeout_secs == 0 {
            return Err(Error::invalid_config(
                "network.http-timeout-secs must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}

/// Parse an environment variable if it is set
fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::invalid_config(format!("{} has an invalid value: {}", name, val))),
        Err(_) => Ok(None),
    }
}

/// Recursively merge `overlay` into `base`; overlay scalars win
fn merge_yaml(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BackoffStrategy;
    use serial_test::serial;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "AUTORETRY_HTTP_TIMEOUT_SECS",
        "AUTORETRY_CONNECT_TIMEOUT_SECS",
        "AUTORETRY_USER_AGENT",
        "AUTORETRY_DEFAULT_RETRIES",
        "AUTORETRY_DEFAULT_INTERVAL_SECS",
        "AUTORETRY_DELAY_MODIFIER",
        "AUTORETRY_LOG_ATTEMPTS",
        "AUTORETRY_BACKOFF_STRATEGY",
        "AUTORETRY_BACKOFF_MULTIPLIER",
        "AUTORETRY_MAX_DELAY_SECS",
        "AUTORETRY_JITTER",
    ];

    fn clear_env() {
        for name in ENV_VARS {
            env::remove_var(name);
        }
    }

    fn create_temp_loader() -> (HierarchicalConfigLoader, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_dir =
            Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).expect("Invalid UTF-8 path");
        let loader = HierarchicalConfigLoader::with_dir(config_dir);
        (loader, temp_dir)
    }

    #[test]
    #[serial]
    fn test_load_runtime_config_defaults() {
        clear_env();
        let (loader, _temp) = create_temp_loader();
        let config = loader.load_runtime_config().unwrap();
        assert_eq!(config.network.http_timeout_secs, 60);
        assert_eq!(config.network.connect_timeout_secs, 10);
        assert!(config.network.user_agent.starts_with("autoretry/"));
        assert_eq!(config.retry.default_retries, 0);
        assert_eq!(config.retry.default_interval_secs, 0);
        assert_eq!(config.retry.backoff.strategy, BackoffStrategy::Fixed);
    }

    #[test]
    #[serial]
    fn test_user_file_overrides_only_given_keys() {
        clear_env();
        let (loader, _temp) = create_temp_loader();

        let config_content = r#"
retry:
  default-retries: 4
  backoff:
    strategy: exponential
"#;
        fs::write(loader.config_dir().join(RUNTIME_FILE), config_content).unwrap();

        let config = loader.load_runtime_config().unwrap();
        assert_eq!(config.retry.default_retries, 4);
        assert_eq!(config.retry.backoff.strategy, BackoffStrategy::Exponential);
        assert_eq!(config.retry.backoff.max_delay_secs, 300);
        assert_eq!(config.network.http_timeout_secs, 60);
    }

    #[test]
    #[serial]
    fn test_explicit_file_beats_user_file() {
        clear_env();
        let (loader, temp) = create_temp_loader();

        fs::write(
            loader.config_dir().join(RUNTIME_FILE),
            "retry:\n  default-retries: 4\n  delay-modifier: 1\n",
        )
        .unwrap();
        let explicit = temp.path().join("ci.yaml");
        fs::write(&explicit, "retry:\n  default-retries: 9\n").unwrap();

        let loader = loader.with_file(Utf8PathBuf::from_path_buf(explicit).unwrap());
        let config = loader.load_runtime_config().unwrap();
        assert_eq!(config.retry.default_retries, 9);
        assert_eq!(config.retry.delay_modifier, 1);
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_an_error() {
        clear_env();
        let (loader, temp) = create_temp_loader();
        let missing = Utf8PathBuf::from_path_buf(temp.path().join("nope.yaml")).unwrap();

        let err = loader.with_file(missing).load_runtime_config().unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    #[serial]
    fn test_empty_user_file_is_ignored() {
        clear_env();
        let (loader, _temp) = create_temp_loader();
        fs::write(loader.config_dir().join(RUNTIME_FILE), "").unwrap();

        let config = loader.load_runtime_config().unwrap();
        assert_eq!(config.network.http_timeout_secs, 60);
    }

    #[test]
    #[serial]
    fn test_env_overrides_beat_file() {
        clear_env();
        let (loader, _temp) = create_temp_loader();
        fs::write(
            loader.config_dir().join(RUNTIME_FILE),
            "network:\n  http-timeout-secs: 600\nretry:\n  default-retries: 4\n",
        )
        .unwrap();

        env::set_var("AUTORETRY_HTTP_TIMEOUT_SECS", "1200");
        env::set_var("AUTORETRY_BACKOFF_STRATEGY", "linear");
        env::set_var("AUTORETRY_JITTER", "true");

        let config = loader.load_runtime_config().unwrap();
        assert_eq!(config.network.http_timeout_secs, 1200);
        assert_eq!(config.retry.default_retries, 4);
        assert_eq!(config.retry.backoff.strategy, BackoffStrategy::Linear);
        assert!(config.retry.backoff.jitter);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_env_value_is_rejected() {
        clear_env();
        let (loader, _temp) = create_temp_loader();

        env::set_var("AUTORETRY_DEFAULT_RETRIES", "many");
        let err = loader.load_runtime_config().unwrap_err();
        assert!(err.to_string().contains("AUTORETRY_DEFAULT_RETRIES"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_multiplier_below_one_is_rejected() {
        clear_env();
        let (loader, _temp) = create_temp_loader();
        fs::write(
            loader.config_dir().join(RUNTIME_FILE),
            "retry:\n  backoff:\n    multiplier: 0.5\n",
        )
        .unwrap();

        let err = loader.load_runtime_config().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_merge_yaml_nested() {
        let mut base: Value = serde_yaml_ng::from_str("a:\n  b: 1\n  c: 2\nd: 3\n").unwrap();
        let overlay: Value = serde_yaml_ng::from_str("a:\n  c: 20\ne: 5\n").unwrap();

        merge_yaml(&mut base, overlay);

        let expected: Value =
            serde_yaml_ng::from_str("a:\n  b: 1\n  c: 20\nd: 3\ne: 5\n").unwrap();
        assert_eq!(base, expected);
    }

    #[test]
    fn test_config_dir_is_not_created() {
        let temp_dir = TempDir::new().unwrap();
        let config_dir = Utf8PathBuf::from_path_buf(temp_dir.path().join("new_config"))
            .expect("Invalid UTF-8 path");

        let loader = HierarchicalConfigLoader::with_dir(config_dir.clone());
        assert_eq!(loader.config_dir(), config_dir);
        assert!(!config_dir.exists());
    }
}
