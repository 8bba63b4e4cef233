//! Manifest loading.
//!
//! The manifest describes everything the sources cannot: document info,
//! servers, authentication, the routes and their bound types, entity
//! registrations and overrides. It is read from YAML or JSON.

use crate::error::{Error, Result};
use crate::overrides::Overrides;
use crate::routes::RouteInfo;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Manifest file names looked up in the project root, in order.
pub const MANIFEST_FILENAMES: &[&str] = &["openapi-docs.yaml", "openapi-docs.yml", "openapi-docs.json"];

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub info: InfoConfig,
    pub servers: Vec<ServerConfig>,
    pub auth: AuthConfig,
    /// Rebuild the document on every request
    pub live: bool,
    /// Glob patterns (`*` stays within one segment) of paths left out
    pub exclude_routes: Vec<String>,
    /// Path prefixes left out
    pub exclude_prefixes: Vec<String>,
    /// Type expressions compiled with Create/Update variants and relationships
    pub entities: Vec<String>,
    pub routes: Vec<RouteInfo>,
    pub overrides: Overrides,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfoConfig {
    pub title: String,
    pub description: Option<String>,
    pub version: String,
    pub contact: Option<ContactConfig>,
    pub license: Option<LicenseConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    pub name: Option<String>,
    pub url: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
    pub name: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub url: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    #[default]
    None,
    Bearer,
    ApiKey,
    Basic,
}

/// Security scheme published under `components.securitySchemes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub kind: AuthKind,
    /// Header or query parameter name for API keys (default `X-API-Key`)
    pub name: Option<String>,
    /// `header` or `query` for API keys (default `header`)
    #[serde(rename = "in")]
    pub location: Option<String>,
    /// HTTP scheme for bearer auth (default `bearer`)
    pub scheme: Option<String>,
    pub bearer_format: Option<String>,
}

impl Default for InfoConfig {
    fn default() -> Self {
        Self {
            title: "API Documentation".to_string(),
            description: None,
            version: "1.0.0".to_string(),
            contact: None,
            license: None,
        }
    }
}

impl Config {
    /// Whether a route path is excluded by prefix or glob pattern.
    ///
    /// Invalid patterns never match; [`Config::validate`] reports them.
    pub fn is_excluded(&self, path: &str) -> bool {
        if self.exclude_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str())) {
            return true;
        }
        let options = glob::MatchOptions {
            require_literal_separator: true,
            ..Default::default()
        };
        self.exclude_routes.iter().any(|pattern| {
            glob::Pattern::new(pattern).map_or(false, |p| p.matches_with(path, options))
        })
    }

    /// Checks the parts serde cannot: glob syntax.
    pub fn validate(&self, file: &Path) -> Result<()> {
        for pattern in &self.exclude_routes {
            glob::Pattern::new(pattern).map_err(|e| Error::ConfigError {
                file: file.to_path_buf(),
                message: format!("invalid exclude pattern `{}`: {}", pattern, e),
            })?;
        }
        Ok(())
    }
}

/// Configuration manager for locating and loading manifests.
pub struct ConfigManager;

impl ConfigManager {
    /// Load the manifest.
    ///
    /// An explicit `path` must exist. Without one, the first of
    /// [`MANIFEST_FILENAMES`] found under `project_root` is used; if there is
    /// none the default configuration is returned.
    pub fn load(path: Option<&Path>, project_root: &Path) -> Result<Config> {
        let config_path = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::ConfigError {
                        file: path.to_path_buf(),
                        message: "file does not exist".to_string(),
                    });
                }
                path.to_path_buf()
            }
            None => match Self::discover(project_root) {
                Some(found) => found,
                None => {
                    debug!("No manifest under {}, using defaults", project_root.display());
                    return Ok(Config::default());
                }
            },
        };

        info!("Loading manifest {}", config_path.display());
        let content = std::fs::read_to_string(&config_path)?;
        Self::from_str(&content, &config_path)
    }

    /// The first manifest file present under `root`.
    pub fn discover(root: &Path) -> Option<PathBuf> {
        MANIFEST_FILENAMES
            .iter()
            .map(|name| root.join(name))
            .find(|candidate| candidate.is_file())
    }

    /// Parse manifest text; `file` selects JSON by its extension and names
    /// the source in errors.
    pub fn from_str(content: &str, file: &Path) -> Result<Config> {
        let is_json = file
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            serde_json::from_str::<Config>(content).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str::<Config>(content).map_err(|e| e.to_string())
        };
        let config = parsed.map_err(|message| Error::ConfigError {
            file: file.to_path_buf(),
            message,
        })?;

        config.validate(file)?;
        debug!(
            "Manifest declares {} routes and {} entities",
            config.routes.len(),
            config.entities.len()
        );
        Ok(config)
    }
}
