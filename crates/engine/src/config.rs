//! Engine configuration.
//!
//! Loaded from an optional TOML file; every section and key has a default,
//! so an empty file (or none at all) yields the stock behaviour.
//!
//! # Example
//!
//! ```toml
//! [uniqueness]
//! debounce_ms = 400
//! timeout_ms = 8000
//! national_id_min_len = 9
//! trigger = "debounced"   # or "on_blur"
//!
//! [lookup]
//! min_key_len = 9
//! timeout_ms = 8000
//!
//! [rules]
//! min_age_years = 18
//!
//! [gateway]
//! base_url = "https://directory.example.org/api"
//! auth_token = "..."
//! ```
//!
//! A few keys can be overridden from the environment: `INTAKE_GATEWAY_BASE_URL`,
//! `INTAKE_GATEWAY_AUTH_TOKEN`, `INTAKE_UNIQUENESS_DEBOUNCE_MS` and
//! `INTAKE_LOOKUP_TIMEOUT_MS`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::autofill::LookupSettings;
use crate::rules::DEFAULT_MIN_AGE_YEARS;
use crate::uniqueness::{TriggerPolicy, UniquenessSettings};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse '{path}': {message}")]
    Parse { path: String, message: String },
    #[error("environment variable {name} must be a whole number of milliseconds, got '{value}'")]
    BadEnv { name: String, value: String },
}

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub uniqueness: UniquenessConfig,
    pub lookup: LookupConfig,
    pub rules: RulesConfig,
    pub gateway: GatewayConfig,
}

/// `[uniqueness]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UniquenessConfig {
    pub debounce_ms: u64,
    pub timeout_ms: u64,
    /// Digits a national id needs before it is probed on change.
    pub national_id_min_len: usize,
    pub trigger: TriggerPolicy,
}

impl Default for UniquenessConfig {
    fn default() -> Self {
        UniquenessConfig {
            debounce_ms: 400,
            timeout_ms: 8000,
            national_id_min_len: 9,
            trigger: TriggerPolicy::Debounced,
        }
    }
}

/// `[lookup]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LookupConfig {
    pub min_key_len: usize,
    pub timeout_ms: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        LookupConfig {
            min_key_len: 9,
            timeout_ms: 8000,
        }
    }
}

/// `[rules]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesConfig {
    pub min_age_years: u8,
}

impl Default for RulesConfig {
    fn default() -> Self {
        RulesConfig {
            min_age_years: DEFAULT_MIN_AGE_YEARS,
        }
    }
}

/// `[gateway]`, used by the HTTP adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    pub base_url: Option<String>,
    pub auth_token: Option<String>,
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl EngineConfig {
    /// Read a TOML file and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })?;
        config.with_env_overrides(|name| std::env::var(name).ok())
    }

    /// Defaults plus environment overrides, for runs without a file.
    pub fn from_env() -> Result<Self, ConfigError> {
        EngineConfig::default().with_env_overrides(|name| std::env::var(name).ok())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Apply `INTAKE_*` overrides read through `var`.
    pub fn with_env_overrides(
        mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(url) = var("INTAKE_GATEWAY_BASE_URL") {
            self.gateway.base_url = Some(url);
        }
        if let Some(token) = var("INTAKE_GATEWAY_AUTH_TOKEN") {
            self.gateway.auth_token = Some(token);
        }
        if let Some(ms) = millis(&var, "INTAKE_UNIQUENESS_DEBOUNCE_MS")? {
            self.uniqueness.debounce_ms = ms;
        }
        if let Some(ms) = millis(&var, "INTAKE_LOOKUP_TIMEOUT_MS")? {
            self.lookup.timeout_ms = ms;
        }
        Ok(self)
    }

    pub fn uniqueness_settings(&self) -> UniquenessSettings {
        UniquenessSettings {
            trigger: self.uniqueness.trigger,
            debounce: Duration::from_millis(self.uniqueness.debounce_ms),
            timeout: Duration::from_millis(self.uniqueness.timeout_ms),
            national_id_min_len: self.uniqueness.national_id_min_len,
        }
    }

    pub fn lookup_settings(&self) -> LookupSettings {
        LookupSettings {
            min_key_len: self.lookup.min_key_len,
            timeout: Duration::from_millis(self.lookup.timeout_ms),
        }
    }
}

fn millis(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<u64>, ConfigError> {
    match var(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::BadEnv {
                name: name.to_string(),
                value: raw,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_document_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.uniqueness.debounce_ms, 400);
        assert_eq!(config.lookup.timeout_ms, 8000);
        assert_eq!(config.rules.min_age_years, 18);
    }

    #[test]
    fn sections_are_partial() {
        let config = EngineConfig::from_toml_str(
            r#"
            [uniqueness]
            trigger = "on_blur"

            [gateway]
            base_url = "http://localhost:9000"
            "#,
        )
        .unwrap();
        assert_eq!(config.uniqueness.trigger, TriggerPolicy::OnBlur);
        assert_eq!(config.uniqueness.timeout_ms, 8000);
        assert_eq!(config.gateway.base_url.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = EngineConfig::from_toml_str("[lookup]\nmin_len = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("INTAKE_GATEWAY_AUTH_TOKEN", "secret"),
            ("INTAKE_UNIQUENESS_DEBOUNCE_MS", "250"),
        ]
        .into_iter()
        .collect();
        let config = EngineConfig::default()
            .with_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.gateway.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.uniqueness_settings().debounce, Duration::from_millis(250));
    }

    #[test]
    fn malformed_env_numbers_are_errors() {
        let err = EngineConfig::default()
            .with_env_overrides(|k| (k == "INTAKE_LOOKUP_TIMEOUT_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::BadEnv { .. }));
    }
}
