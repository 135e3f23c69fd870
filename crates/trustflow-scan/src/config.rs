use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Proxy-extension path on a locally forwarded Argo CD server
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/extensions/trustflow";
pub const DEFAULT_SCANNER_NAME: &str = "Trivy";

pub const ENV_BASE_URL: &str = "TRUSTFLOW_BASE_URL";
pub const ENV_SCANNER_NAME: &str = "TRUSTFLOW_SCANNER_NAME";
pub const ENV_AUTH_TOKEN: &str = "ARGOCD_AUTH_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Backend settings threaded into every scan call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Base URL of the verification backend
    pub base_url: String,

    /// Display name of the vulnerability scanner
    pub scanner_name: String,

    /// Argo CD session token, sent as the `argocd.token` cookie
    pub auth_token: Option<String>,

    /// Skip TLS certificate verification
    pub insecure: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            scanner_name: DEFAULT_SCANNER_NAME.to_string(),
            auth_token: None,
            insecure: false,
        }
    }
}

impl ScanConfig {
    /// Default config file location (~/.trustflow/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        let home = dirs::home_dir()?;
        Some(home.join(".trustflow").join("config.toml"))
    }

    /// Load from an explicit file, or from the default location when it exists,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from a key lookup (the process environment in practice).
    /// Empty values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(base_url) = lookup(ENV_BASE_URL) {
            self.base_url = base_url;
        }
        if let Some(scanner_name) = lookup(ENV_SCANNER_NAME) {
            self.scanner_name = scanner_name;
        }
        if let Some(token) = lookup(ENV_AUTH_TOKEN) {
            self.auth_token = Some(token);
        }
        self
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
