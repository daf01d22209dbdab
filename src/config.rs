//! Validated run configuration
//!
//! Everything the user supplies is checked here once, before any network call
//! is made. A [`MigrationConfig`] either comes out whole or not at all.

use crate::migration::MigrationSettings;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

pub const NUM_OF_WORKERS: usize = 2;
pub const MIN_NUM_OF_WORKERS: usize = 1;
pub const MAX_NUM_OF_WORKERS: usize = 16;

pub const QUAY_URL: &str = "https://quay.io";
/// Username registries expect when an OAuth2 token is used as the password
pub const OAUTH_TOKEN_USERNAME: &str = "$oauthtoken";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("--num-of-workers must be between {min} and {max}, got {value}")]
    WorkerCount { value: usize, min: usize, max: usize },

    #[error("--source-username and --source-password must both be provided or neither.")]
    IncompleteCredentials,

    #[error("The token and source username/password arguments are mutually exclusive.")]
    ConflictingCredentials,

    #[error("The token or source username/password arguments must be specified.")]
    MissingCredentials,

    #[error("Invalid {field} URL '{url}': {reason}")]
    InvalidUrl {
        field: &'static str,
        url: String,
        reason: String,
    },

    #[error("{0} cannot be empty")]
    Empty(&'static str),
}

/// Username and password pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Credentials for a registry that accepts an OAuth2 token
    pub fn from_token(token: impl Into<String>) -> Self {
        Self::new(OAUTH_TOKEN_USERNAME, token)
    }

    /// Both halves or neither
    pub fn from_pair(
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        match (non_empty(username), non_empty(password)) {
            (Some(username), Some(password)) => Ok(Some(Self::new(username, password))),
            (None, None) => Ok(None),
            _ => Err(ConfigError::IncompleteCredentials),
        }
    }

    /// Either a username/password pair or a token, never both
    pub fn pair_or_token(
        username: Option<String>,
        password: Option<String>,
        token: Option<String>,
    ) -> Result<Self, ConfigError> {
        let pair = Self::from_pair(username, password)?;
        match (pair, non_empty(token)) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingCredentials),
            (Some(pair), None) => Ok(pair),
            (None, Some(token)) => Ok(Self::from_token(token)),
            (None, None) => Err(ConfigError::MissingCredentials),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where images are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    /// Any V2 registry with optional basic or token auth
    Generic {
        url: String,
        credentials: Option<Credentials>,
    },
    /// Quay SaaS; the catalog comes from the Quay API for one namespace
    Quay { namespace: String, token: String },
    /// Quay Enterprise, accessed like a generic registry
    QuayEnterprise { url: String, credentials: Credentials },
}

impl SourceConfig {
    pub fn registry_url(&self) -> &str {
        match self {
            SourceConfig::Generic { url, .. } | SourceConfig::QuayEnterprise { url, .. } => url,
            SourceConfig::Quay { .. } => QUAY_URL,
        }
    }

    pub fn registry_credentials(&self) -> Option<Credentials> {
        match self {
            SourceConfig::Generic { credentials, .. } => credentials.clone(),
            SourceConfig::Quay { token, .. } => Some(Credentials::from_token(token.clone())),
            SourceConfig::QuayEnterprise { credentials, .. } => Some(credentials.clone()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            SourceConfig::Generic { url, .. } | SourceConfig::QuayEnterprise { url, .. } => {
                validate_url("source", url)
            }
            SourceConfig::Quay { namespace, token } => {
                if namespace.trim().is_empty() {
                    return Err(ConfigError::Empty("Quay namespace"));
                }
                if token.trim().is_empty() {
                    return Err(ConfigError::Empty("Quay token"));
                }
                Ok(())
            }
        }
    }
}

/// The Artifactory instance and Docker repository images go to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactoryConfig {
    pub url: String,
    pub credentials: Credentials,
    pub repo: String,
}

impl ArtifactoryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_url("Artifactory", &self.url)?;
        if self.credentials.username.is_empty() {
            return Err(ConfigError::Empty("Artifactory username"));
        }
        if self.repo.trim().is_empty() {
            return Err(ConfigError::Empty("Artifactory repository"));
        }
        Ok(())
    }
}

/// Complete, validated configuration of one migration run
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub source: SourceConfig,
    pub destination: ArtifactoryConfig,
    pub settings: MigrationSettings,
    pub ignore_cert: bool,
    pub image_file: Option<PathBuf>,
    pub failed_output: Option<PathBuf>,
    pub verbose: bool,
}

/// Unvalidated inputs for a [`MigrationConfig`]
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub workers: usize,
    pub overwrite: bool,
    pub ignore_cert: bool,
    pub image_file: Option<PathBuf>,
    pub failed_output: Option<PathBuf>,
    pub verbose: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: NUM_OF_WORKERS,
            overwrite: false,
            ignore_cert: false,
            image_file: None,
            failed_output: None,
            verbose: false,
        }
    }
}

impl MigrationConfig {
    pub fn new(
        source: SourceConfig,
        destination: ArtifactoryConfig,
        options: RunOptions,
    ) -> Result<Self, ConfigError> {
        let settings = MigrationSettings::new(options.workers, options.overwrite)?;
        source.validate()?;
        destination.validate()?;

        Ok(Self {
            source,
            destination,
            settings,
            ignore_cert: options.ignore_cert,
            image_file: options.image_file,
            failed_output: options.failed_output,
            verbose: options.verbose,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn validate_url(field: &'static str, url: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        field,
        url: url.to_string(),
        reason,
    };

    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    }
    if parsed.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(())
}
