//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults. The config file is
//! optional; credentials never live in it and are read by the auth chain
//! straight from the environment.

use common::env::var;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file used when neither `--config` nor `CONFIG_PATH` is given.
pub const DEFAULT_CONFIG_FILE: &str = "google-sheets-mcp.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub http: HttpConfig,
    pub endpoints: EndpointsConfig,
}

/// MCP server identity and folder context
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Name reported in the `initialize` response
    pub name: String,
    /// Drive folder used when a tool call names none (`DRIVE_FOLDER_ID`)
    pub drive_folder_id: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: String::from("google-sheets-server"),
            drive_folder_id: None,
        }
    }
}

/// Outbound HTTP settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

/// Google API base URLs
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub token_url: String,
    pub sheets_url: String,
    pub drive_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            token_url: google_auth::TOKEN_ENDPOINT.to_string(),
            sheets_url: String::from("https://sheets.googleapis.com/v4"),
            drive_url: String::from("https://www.googleapis.com/drive/v3"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// A missing file is an error only when `required` is set; otherwise the
    /// defaults are used.
    pub fn load(path: &Path, required: bool) -> common::Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str::<Config>(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => Config::default(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(common::Error::MissingFile(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(folder) = var("DRIVE_FOLDER_ID") {
            config.server.drive_folder_id = Some(folder);
        }
        config.server.drive_folder_id = config
            .server
            .drive_folder_id
            .filter(|id| !id.trim().is_empty());

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.server.name.trim().is_empty() {
            return Err(common::Error::Config("server.name must not be empty".into()));
        }

        if self.http.timeout_secs == 0 {
            return Err(common::Error::Config(
                "http.timeout_secs must be greater than 0".into(),
            ));
        }

        for (field, url) in [
            ("endpoints.token_url", &self.endpoints.token_url),
            ("endpoints.sheets_url", &self.endpoints.sheets_url),
            ("endpoints.drive_url", &self.endpoints.drive_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{field} must start with http:// or https://, got: {url}"
                )));
            }
        }
        Ok(())
    }

    /// Resolve the config file path from CLI arg or CONFIG_PATH env var.
    ///
    /// Returns the path and whether it was named explicitly.
    pub fn resolve_path(cli_path: Option<&str>) -> (PathBuf, bool) {
        if let Some(p) = cli_path {
            return (PathBuf::from(p), true);
        }
        if let Some(p) = var("CONFIG_PATH") {
            return (PathBuf::from(p), true);
        }
        (PathBuf::from(DEFAULT_CONFIG_FILE), false)
    }
}
