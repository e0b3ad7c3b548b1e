//! Runtime settings: provider selection, fallback mode and routing limits.
//!
//! Resolved in three layers, later layers winning:
//! 1. `.discovery/settings.json` (optional)
//! 2. `DISCOVERY_*` environment variables
//! 3. command-line flags, applied by the caller

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Default settings file location relative to the working directory.
pub const SETTINGS_FILE: &str = ".discovery/settings.json";

/// Default bound on routing hops per request.
pub const DEFAULT_MAX_ROUTE_HOPS: usize = 5;

/// Default number of recent turns shown to the classifier.
pub const DEFAULT_CLASSIFICATION_WINDOW: usize = 5;

/// Which completion backend to use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// First provider with credentials in the environment
    #[default]
    Auto,
    OpenAI,
    Anthropic,
    /// Deterministic offline replies
    Null,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Null => "null",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "null" | "mock" | "none" => Ok(Self::Null),
            other => Err(ConfigError::invalid_setting(
                "provider",
                format!("unknown provider `{}` (expected auto, openai, anthropic or null)", other),
            )),
        }
    }
}

/// Process-wide runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeSettings {
    pub provider: ProviderKind,
    /// Answer with deterministic text when the completion service is unavailable
    pub fallback: bool,
    pub max_route_hops: usize,
    /// Temperature override for classification calls
    pub classification_temperature: f64,
    /// Number of recent non-system turns serialized for classification
    pub classification_window: usize,
    /// Token cap for classification answers
    pub classification_max_tokens: u32,
    /// Guardrails document reference overriding the one in the agents file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardrails: Option<String>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Auto,
            fallback: true,
            max_route_hops: DEFAULT_MAX_ROUTE_HOPS,
            classification_temperature: 0.0,
            classification_window: DEFAULT_CLASSIFICATION_WINDOW,
            classification_max_tokens: 16,
            guardrails: None,
        }
    }
}

impl RuntimeSettings {
    /// Load settings from an optional file, then apply the environment.
    ///
    /// With no explicit path, `.discovery/settings.json` is used when present.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = PathBuf::from(SETTINGS_FILE);
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        let settings = settings.apply_env()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        debug!("Reading runtime settings from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Apply `DISCOVERY_*` environment variables.
    pub fn apply_env(self) -> ConfigResult<Self> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = lookup("DISCOVERY_PROVIDER") {
            self.provider = provider.parse()?;
        }
        if let Some(fallback) = lookup("DISCOVERY_FALLBACK") {
            self.fallback = parse_flag("DISCOVERY_FALLBACK", &fallback)?;
        }
        if let Some(hops) = lookup("DISCOVERY_MAX_HOPS") {
            self.max_route_hops = hops.trim().parse().map_err(|_| {
                ConfigError::invalid_setting("DISCOVERY_MAX_HOPS", format!("`{}` is not a number", hops))
            })?;
        }
        if let Some(guardrails) = lookup("DISCOVERY_GUARDRAILS") {
            self.guardrails = Some(guardrails);
        }
        Ok(self)
    }

    /// Check value ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_route_hops == 0 {
            return Err(ConfigError::invalid_setting("maxRouteHops", "must be at least 1"));
        }
        if self.classification_window == 0 {
            return Err(ConfigError::invalid_setting("classificationWindow", "must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.classification_temperature) {
            return Err(ConfigError::invalid_setting(
                "classificationTemperature",
                "must be between 0 and 2",
            ));
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid_setting(key, format!("`{}` is not a boolean", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = RuntimeSettings::default();
        assert_eq!(settings.provider, ProviderKind::Auto);
        assert!(settings.fallback);
        assert_eq!(settings.max_route_hops, 5);
        assert_eq!(settings.classification_window, 5);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let settings = RuntimeSettings::default()
            .apply_vars(vars(&[
                ("DISCOVERY_PROVIDER", "Anthropic"),
                ("DISCOVERY_FALLBACK", "off"),
                ("DISCOVERY_MAX_HOPS", "3"),
            ]))
            .unwrap();
        assert_eq!(settings.provider, ProviderKind::Anthropic);
        assert!(!settings.fallback);
        assert_eq!(settings.max_route_hops, 3);
    }

    #[test]
    fn test_blank_env_ignored() {
        let settings = RuntimeSettings::default()
            .apply_vars(vars(&[("DISCOVERY_PROVIDER", "  ")]))
            .unwrap();
        assert_eq!(settings.provider, ProviderKind::Auto);
    }

    #[test]
    fn test_bad_env_values() {
        let err = RuntimeSettings::default()
            .apply_vars(vars(&[("DISCOVERY_MAX_HOPS", "many")]))
            .unwrap_err();
        assert_eq!(err.field(), Some("DISCOVERY_MAX_HOPS"));

        let err = RuntimeSettings::default()
            .apply_vars(vars(&[("DISCOVERY_PROVIDER", "azure")]))
            .unwrap_err();
        assert_eq!(err.field(), Some("provider"));
    }

    #[test]
    fn test_zero_hops_rejected() {
        let settings = RuntimeSettings {
            max_route_hops: 0,
            ..RuntimeSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_from_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "provider": "null", "maxRouteHops": 2 }"#).unwrap();

        let settings = RuntimeSettings::from_file(&path).unwrap();
        assert_eq!(settings.provider, ProviderKind::Null);
        assert_eq!(settings.max_route_hops, 2);
        assert!(settings.fallback);
    }
}
