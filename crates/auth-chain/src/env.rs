//! Resolution inputs
//!
//! `AuthEnv` is a snapshot of every environment variable the strategies
//! read. The resolver never touches the process environment itself, so a
//! test can describe a configuration by building this struct directly.

use std::path::PathBuf;

use common::Secret;
use common::env::{path, path_or, var};
use google_auth::{AmbientConfig, TOKEN_ENDPOINT};

pub const CREDENTIALS_CONFIG: &str = "CREDENTIALS_CONFIG";
pub const SERVICE_ACCOUNT_PATH: &str = "SERVICE_ACCOUNT_PATH";
pub const ACCESS_TOKEN: &str = "GOOGLE_SHEETS_ACCESS_TOKEN";
pub const REFRESH_TOKEN: &str = "GOOGLE_SHEETS_REFRESH_TOKEN";
pub const CLIENT_ID: &str = "GOOGLE_SHEETS_CLIENT_ID";
pub const CLIENT_SECRET: &str = "GOOGLE_SHEETS_CLIENT_SECRET";
pub const TOKEN_EXPIRY: &str = "GOOGLE_SHEETS_TOKEN_EXPIRY";
pub const TOKEN_PATH: &str = "TOKEN_PATH";
pub const CREDENTIALS_PATH: &str = "CREDENTIALS_PATH";

pub const DEFAULT_TOKEN_PATH: &str = "token.json";
pub const DEFAULT_CREDENTIALS_PATH: &str = "credentials.json";

/// Everything the strategy chain reads from its environment.
#[derive(Debug, Clone)]
pub struct AuthEnv {
    /// Base64 JSON service account key
    pub credentials_config: Option<Secret<String>>,
    pub service_account_path: Option<PathBuf>,
    pub access_token: Option<Secret<String>>,
    pub refresh_token: Option<Secret<String>>,
    pub client_id: Option<String>,
    pub client_secret: Option<Secret<String>>,
    /// RFC 3339 timestamp or epoch milliseconds, parsed by the strategy
    pub token_expiry: Option<String>,
    pub token_path: PathBuf,
    pub credentials_path: PathBuf,
    /// Token endpoint for every OAuth and JWT exchange
    pub token_url: String,
    pub ambient: AmbientConfig,
}

impl Default for AuthEnv {
    fn default() -> Self {
        Self {
            credentials_config: None,
            service_account_path: None,
            access_token: None,
            refresh_token: None,
            client_id: None,
            client_secret: None,
            token_expiry: None,
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_PATH),
            token_url: TOKEN_ENDPOINT.to_string(),
            ambient: AmbientConfig {
                token_url: TOKEN_ENDPOINT.to_string(),
                ..Default::default()
            },
        }
    }
}

impl AuthEnv {
    /// Capture the current process environment.
    pub fn from_env() -> Self {
        Self {
            credentials_config: var(CREDENTIALS_CONFIG).map(Secret::new),
            service_account_path: path(SERVICE_ACCOUNT_PATH),
            access_token: var(ACCESS_TOKEN).map(Secret::new),
            refresh_token: var(REFRESH_TOKEN).map(Secret::new),
            client_id: var(CLIENT_ID),
            client_secret: var(CLIENT_SECRET).map(Secret::new),
            token_expiry: var(TOKEN_EXPIRY),
            token_path: path_or(TOKEN_PATH, DEFAULT_TOKEN_PATH),
            credentials_path: path_or(CREDENTIALS_PATH, DEFAULT_CREDENTIALS_PATH),
            token_url: TOKEN_ENDPOINT.to_string(),
            ambient: AmbientConfig {
                credentials_file: path("GOOGLE_APPLICATION_CREDENTIALS"),
                gcloud_config_dir: path("CLOUDSDK_CONFIG"),
                home_dir: path("HOME"),
                metadata_host: var("GCE_METADATA_HOST"),
                token_url: TOKEN_ENDPOINT.to_string(),
            },
        }
    }

    /// Send every token exchange to `token_url` instead of Google.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        let token_url = token_url.into();
        self.ambient.token_url = token_url.clone();
        self.token_url = token_url;
        self
    }
}
