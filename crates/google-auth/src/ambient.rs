//! Application default credentials
//!
//! Discovery order:
//! 1. the file named by `GOOGLE_APPLICATION_CREDENTIALS`
//! 2. gcloud's well-known file under `$CLOUDSDK_CONFIG` or `~/.config/gcloud`
//! 3. the instance metadata server
//!
//! An explicitly named file that cannot be used is an error; discovery does
//! not fall back past it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::client_secrets::OAuthClient;
use crate::constants::{
    DEFAULT_REDIRECT_URI, METADATA_FLAVOR, METADATA_FLAVOR_HEADER, METADATA_HOST,
    METADATA_TIMEOUT_SECS, SCOPES, WELL_KNOWN_CREDENTIALS_FILE, scope_string,
};
use crate::credential::ResolvedCredential;
use crate::error::{Error, Result};
use crate::service_account::ServiceAccountKey;
use crate::token::{self, TokenRecord, TokenResponse, now_millis};

/// Inputs to ambient discovery, captured from the environment by the caller.
#[derive(Debug, Clone, Default)]
pub struct AmbientConfig {
    /// `GOOGLE_APPLICATION_CREDENTIALS`
    pub credentials_file: Option<PathBuf>,
    /// `CLOUDSDK_CONFIG`
    pub gcloud_config_dir: Option<PathBuf>,
    /// `HOME`
    pub home_dir: Option<PathBuf>,
    /// `GCE_METADATA_HOST`, defaulting to `metadata.google.internal`
    pub metadata_host: Option<String>,
    pub token_url: String,
}

impl AmbientConfig {
    /// Location of gcloud's application default credentials, if a config
    /// directory can be determined.
    pub fn well_known_file(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.gcloud_config_dir {
            return Some(dir.join(WELL_KNOWN_CREDENTIALS_FILE));
        }
        self.home_dir.as_ref().map(|home| {
            home.join(".config")
                .join("gcloud")
                .join(WELL_KNOWN_CREDENTIALS_FILE)
        })
    }

    pub fn metadata_host(&self) -> &str {
        self.metadata_host.as_deref().unwrap_or(METADATA_HOST)
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AdcFile {
    ServiceAccount(serde_json::Map<String, serde_json::Value>),
    AuthorizedUser(AuthorizedUser),
}

#[derive(Deserialize)]
struct AuthorizedUser {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    #[serde(default)]
    quota_project_id: Option<String>,
}

/// Find ambient credentials.
pub async fn discover(http: &reqwest::Client, config: &AmbientConfig) -> Result<ResolvedCredential> {
    if let Some(path) = &config.credentials_file {
        debug!(path = %path.display(), "using GOOGLE_APPLICATION_CREDENTIALS");
        return load_adc_file(http, path, &config.token_url).await;
    }

    if let Some(path) = config.well_known_file()
        && tokio::fs::try_exists(&path).await.unwrap_or(false)
    {
        debug!(path = %path.display(), "using gcloud application default credentials");
        return load_adc_file(http, &path, &config.token_url).await;
    }

    let host = config.metadata_host();
    let response = fetch_metadata_token(http, host).await.map_err(|e| {
        Error::NotFound(format!(
            "no application default credentials file and metadata server unavailable: {e}"
        ))
    })?;
    info!(host, "using metadata server credentials");
    Ok(ResolvedCredential::metadata(
        http.clone(),
        host,
        TokenRecord::from_response(response, now_millis()),
    ))
}

async fn load_adc_file(
    http: &reqwest::Client,
    path: &Path,
    token_url: &str,
) -> Result<ResolvedCredential> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Io(format!("reading {}: {e}", path.display())))?;
    let file: AdcFile = serde_json::from_str(&contents).map_err(|e| {
        Error::CredentialParse(format!(
            "parsing application default credentials {}: {e}",
            path.display()
        ))
    })?;

    match file {
        AdcFile::ServiceAccount(fields) => {
            let key = ServiceAccountKey::from_value(serde_json::Value::Object(fields))?;
            info!(client_email = %key.client_email, "using ambient service account");
            Ok(ResolvedCredential::service_account(http.clone(), key, token_url))
        }
        AdcFile::AuthorizedUser(user) => {
            let oauth = OAuthClient::new(user.client_id, user.client_secret, DEFAULT_REDIRECT_URI)
                .with_token_url(token_url);

            // Proves the refresh token still works before the chain settles.
            let response = token::refresh_token(http, &oauth, &user.refresh_token).await?;
            let seed = TokenRecord {
                access_token: String::new(),
                token_type: String::from("Bearer"),
                scope: scope_string(),
                refresh_token: Some(user.refresh_token),
                expiry_date: None,
            };
            info!("using ambient authorized user");
            Ok(
                ResolvedCredential::user(http.clone(), oauth, seed.refreshed(response, now_millis()))
                    .with_quota_project(user.quota_project_id),
            )
        }
    }
}

/// Fetch an access token for the instance's default service account.
pub async fn fetch_metadata_token(http: &reqwest::Client, host: &str) -> Result<TokenResponse> {
    let url = format!("http://{host}/computeMetadata/v1/instance/service-accounts/default/token");
    let response = http
        .get(&url)
        .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR)
        .query(&[("scopes", SCOPES.join(","))])
        .timeout(Duration::from_secs(METADATA_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|e| Error::Http(format!("metadata server request failed: {e}")))?;

    token::read_token_response(response, "metadata token").await
}
