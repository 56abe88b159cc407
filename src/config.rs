//! Configuration loading via `ortho-config`.

use std::ffi::OsString;

use camino::Utf8PathBuf;
use ortho_config::{ConfigDiscovery, OrthoConfig};
use serde::Deserialize;
use thiserror::Error;

const APP_NAME: &str = "flotilla";
const CONFIG_ENV_VAR: &str = "FLOTILLA_CONFIG_PATH";
const CONFIG_FILE_NAME: &str = "flotilla.toml";
const DOTFILE_NAME: &str = ".flotilla.toml";

/// Credentials and launch defaults, merged from defaults, configuration
/// files, environment variables, and CLI flags in that order of precedence.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "FLOTILLA",
    discovery(
        app_name = "flotilla",
        env_var = "FLOTILLA_CONFIG_PATH",
        config_file_name = "flotilla.toml",
        dotfile_name = ".flotilla.toml",
        project_file_name = "flotilla.toml"
    )
)]
pub struct FleetConfig {
    /// Access key of the API key. Required to look up the owning project.
    pub access_key_id: Option<String>,
    /// Secret key used to authenticate every API call.
    #[ortho_config(default = String::new())]
    pub secret_access_key: String,
    /// Key-pair name applied when neither the caller nor the source instance
    /// provides one.
    #[ortho_config(default = String::new())]
    pub default_key: String,
    /// Security group identifier applied to new instances by default.
    #[ortho_config(default = String::new())]
    pub default_security_group: String,
    /// Availability zone all calls are scoped to. Defaults to `fr-par-1`.
    #[ortho_config(default = "fr-par-1".to_owned())]
    pub default_zone: String,
}

impl FleetConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from(APP_NAME)])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads and validates configuration in one step.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CredentialsMissing`] when no secret key is
    /// available from any source, and other [`ConfigError`] variants when
    /// loading or validation fails.
    pub fn load_validated() -> Result<Self, ConfigError> {
        let config = Self::load_without_cli_args()?;
        config.validate()?;
        Ok(config)
    }

    /// Returns a copy scoped to a different availability zone.
    #[must_use]
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.default_zone = zone.into().trim().to_owned();
        self
    }

    /// Returns the configured default key, if non-empty.
    #[must_use]
    pub fn default_key_name(&self) -> Option<&str> {
        non_blank(&self.default_key)
    }

    /// Returns the configured default security group, if non-empty.
    #[must_use]
    pub fn default_security_group_id(&self) -> Option<&str> {
        non_blank(&self.default_security_group)
    }

    /// Performs semantic validation on required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CredentialsMissing`] when the secret key is
    /// blank and [`ConfigError::MissingField`] when the zone is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_access_key.trim().is_empty() {
            return Err(ConfigError::CredentialsMissing {
                searched: candidate_paths(),
            });
        }
        if self.default_zone.trim().is_empty() {
            return Err(ConfigError::MissingField(String::from(
                "missing availability zone: set FLOTILLA_DEFAULT_ZONE or add default_zone to flotilla.toml",
            )));
        }
        Ok(())
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Lists the configuration files searched, in discovery order.
#[must_use]
pub fn candidate_paths() -> Vec<Utf8PathBuf> {
    ConfigDiscovery::builder(APP_NAME)
        .env_var(CONFIG_ENV_VAR)
        .config_file_name(CONFIG_FILE_NAME)
        .dotfile_name(DOTFILE_NAME)
        .project_file_name(CONFIG_FILE_NAME)
        .build()
        .utf8_candidates()
}

fn render_paths(paths: &[Utf8PathBuf]) -> String {
    if paths.is_empty() {
        return String::from("no candidate files");
    }
    paths
        .iter()
        .map(|path| path.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// No secret key was found in any configuration source.
    #[error(
        "no API credentials found: set FLOTILLA_SECRET_ACCESS_KEY or add secret_access_key to flotilla.toml (searched: {})",
        render_paths(.searched)
    )]
    CredentialsMissing {
        /// Configuration files searched during discovery.
        searched: Vec<Utf8PathBuf>,
    },
    /// A required configuration field is empty.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
