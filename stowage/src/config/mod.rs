//! Configuration management for stowage
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `STOWAGE_` prefix, `__` nesting)
//! 2. `./config.toml` (development)
//! 3. `~/.config/stowage/<service>/config.toml` (user config)
//! 4. `/etc/stowage/<service>/config.toml` (system config)
//! 5. Hardcoded defaults (fallback)
//!
//! # Example Configuration
//!
//! ```toml
//! [naming]
//! default_expression = "{name}-{rand}{ext}"
//! rand_length = 8
//! checksum_algorithm = "sha256"
//! slugger = "ascii"
//!
//! [pending]
//! temp_dir = "/var/tmp/uploads"
//!
//! [namers.avatar]
//! id = "expression:avatars/{userId}/{checksum:12}{ext}"
//!
//! [namers.invoice]
//! id = "handlebars:invoices/{{year}}/{{node.name}}"
//! context = { year = 2024 }
//! ```

use crate::error::{StowageError, StowageResult};
use crate::expression::{DEFAULT_EXPRESSION, DEFAULT_RAND_LENGTH};
use crate::namer::Namer;
use crate::node::ChecksumAlgorithm;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Which slugger the expression engine uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SluggerKind {
    /// Unicode-aware transliteration to ASCII
    #[default]
    Ascii,
    /// Lowercase and replace spaces with hyphens
    Fallback,
}

/// Expression engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Expression used when a namer carries none
    pub default_expression: String,
    /// Length of `{rand}` without an argument
    pub rand_length: usize,
    /// Algorithm of `{checksum}` without an algorithm option
    pub checksum_algorithm: ChecksumAlgorithm,
    /// Slugger used by `{name}` and `|slug`
    pub slugger: SluggerKind,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            default_expression: DEFAULT_EXPRESSION.to_string(),
            rand_length: DEFAULT_RAND_LENGTH,
            checksum_algorithm: ChecksumAlgorithm::default(),
            slugger: SluggerKind::default(),
        }
    }
}

/// Pending file settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PendingConfig {
    /// Directory for temporary upload copies; the OS temp dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StowageConfig {
    /// `[naming]`
    pub naming: NamingConfig,
    /// `[pending]`
    pub pending: PendingConfig,
    /// `[namers.<name>]` declared namers
    pub namers: BTreeMap<String, Namer>,
}

impl StowageConfig {
    /// Load configuration for a specific service
    ///
    /// Searches for configuration files in order:
    /// 1. `./config.toml`
    /// 2. `~/.config/stowage/{service_name}/config.toml`
    /// 3. `/etc/stowage/{service_name}/config.toml`
    ///
    /// Environment variables override file values, e.g.
    /// `STOWAGE_NAMING__RAND_LENGTH=8`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Default configuration cannot be serialized to TOML
    /// - A configuration file cannot be read or parsed
    /// - Configuration values fail type conversion
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use stowage::config::StowageConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = StowageConfig::load_for_service("media-api")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load_for_service(service_name: &str) -> anyhow::Result<Self> {
        let mut figment =
            Figment::new().merge(Toml::string(&toml::to_string(&Self::default())?));

        let system_config = PathBuf::from("/etc/stowage")
            .join(service_name)
            .join("config.toml");
        if system_config.exists() {
            figment = figment.merge(Toml::file(&system_config));
        }

        let user_config = Self::recommended_path(service_name);
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }

        let local_config = PathBuf::from("./config.toml");
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }

        figment = figment.merge(Env::prefixed("STOWAGE_").split("__").lowercase(true));

        let config: Self = figment.extract()?;
        tracing::debug!(
            service = service_name,
            namers = config.namers.len(),
            "Loaded stowage configuration"
        );
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// A missing file yields the defaults (still overridable from the
    /// environment).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Default configuration cannot be serialized to TOML
    /// - The file contains invalid TOML
    /// - Configuration values fail type conversion
    pub fn load_from(path: &str) -> anyhow::Result<Self> {
        let config = Figment::new()
            .merge(Toml::string(&toml::to_string(&Self::default())?))
            .merge(Toml::file(path))
            .merge(Env::prefixed("STOWAGE_").split("__").lowercase(true))
            .extract()?;

        Ok(config)
    }

    /// Get the recommended user config path for a service
    ///
    /// # Example
    ///
    /// ```rust
    /// use stowage::config::StowageConfig;
    ///
    /// let path = StowageConfig::recommended_path("media-api");
    /// assert!(path.ends_with("config.toml"));
    /// ```
    #[must_use]
    pub fn recommended_path(service_name: &str) -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from("./config.toml"),
            |config_dir| {
                config_dir
                    .join("stowage")
                    .join(service_name)
                    .join("config.toml")
            },
        )
    }

    /// A declared namer by name
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::Config`] if no namer is declared under `name`.
    pub fn namer(&self, name: &str) -> StowageResult<Namer> {
        self.namers
            .get(name)
            .cloned()
            .ok_or_else(|| StowageError::Config(format!("No namer declared as \"{name}\"")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::fs;

    #[test]
    fn test_default_config() {
        let config = StowageConfig::default();
        assert_eq!(config.naming.default_expression, "{name}-{rand}{ext}");
        assert_eq!(config.naming.rand_length, 6);
        assert_eq!(config.naming.checksum_algorithm, ChecksumAlgorithm::Md5);
        assert_eq!(config.naming.slugger, SluggerKind::Ascii);
        assert!(config.pending.temp_dir.is_none());
        assert!(config.namers.is_empty());
    }

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let rendered = toml::to_string(&StowageConfig::default()).unwrap();
        let parsed: StowageConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, StowageConfig::default());
    }

    #[test]
    fn test_recommended_path() {
        let path = StowageConfig::recommended_path("test-app");
        let path = path.to_str().unwrap();
        assert!(path.contains("test-app"));
        assert!(path.ends_with("config.toml"));
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let config = StowageConfig::load_from("/nonexistent/path/config.toml").unwrap();
        assert_eq!(config.naming.rand_length, 6);
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[naming]
rand_length = 10
checksum_algorithm = "sha256"
slugger = "fallback"

[pending]
temp_dir = "/var/tmp/uploads"

[namers.avatar]
id = "expression:avatars/{userId}{ext}"

[namers.invoice]
id = "handlebars:{{year}}/{{node.name}}"
context = { year = 2024, prefix = "inv" }
"#,
        )
        .unwrap();

        let config = StowageConfig::load_from(config_path.to_str().unwrap()).unwrap();
        assert_eq!(config.naming.rand_length, 10);
        assert_eq!(config.naming.checksum_algorithm, ChecksumAlgorithm::Sha256);
        assert_eq!(config.naming.slugger, SluggerKind::Fallback);
        assert_eq!(config.naming.default_expression, DEFAULT_EXPRESSION);
        assert_eq!(config.pending.temp_dir, Some(PathBuf::from("/var/tmp/uploads")));

        let avatar = config.namer("avatar").unwrap();
        assert_eq!(avatar.id(), "expression:avatars/{userId}{ext}");
        assert!(avatar.context().is_empty());

        let invoice = config.namer("invoice").unwrap();
        assert_eq!(invoice.context()["year"], Value::Int(2024));
        assert_eq!(invoice.context()["prefix"], Value::from("inv"));
    }

    #[test]
    fn test_undeclared_namer_is_config_error() {
        let config = StowageConfig::default();
        assert!(matches!(config.namer("missing"), Err(StowageError::Config(_))));
    }

    #[test]
    fn test_load_for_service_with_defaults() {
        let config = StowageConfig::load_for_service("nonexistent-service-123").unwrap();
        assert_eq!(config.naming.default_expression, DEFAULT_EXPRESSION);
    }
}
