//! OAuth client identity and the legacy client-secrets file
//!
//! The client-secrets file is the JSON downloaded from the Google Cloud
//! console. It holds the client under an `installed` (desktop app) or `web`
//! key; when both are present the installed entry wins.

use std::fmt;
use std::path::Path;

use common::Secret;
use serde::Deserialize;

use crate::constants::{DEFAULT_REDIRECT_URI, TOKEN_ENDPOINT};
use crate::error::{Error, Result};

/// An OAuth client: identity, secret, redirect URI, and the token endpoint
/// used for exchange and refresh.
#[derive(Clone)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    pub token_url: String,
}

impl OAuthClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<Secret<String>>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            token_url: TOKEN_ENDPOINT.to_string(),
        }
    }

    /// Point exchange and refresh at a different token endpoint.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }
}

impl fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClient")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret)
            .field("redirect_uri", &self.redirect_uri)
            .field("token_url", &self.token_url)
            .finish()
    }
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecretsEntry>,
    web: Option<ClientSecretsEntry>,
}

#[derive(Deserialize)]
struct ClientSecretsEntry {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

/// Parse a client-secrets document.
///
/// The first redirect URI is used; an entry without any falls back to
/// `http://localhost`, which is all a refresh exchange needs.
pub fn parse_client_secrets(contents: &str) -> Result<OAuthClient> {
    let file: ClientSecretsFile = serde_json::from_str(contents)
        .map_err(|e| Error::CredentialParse(format!("parsing client secrets: {e}")))?;

    let entry = file.installed.or(file.web).ok_or_else(|| {
        Error::CredentialParse("client secrets contain neither \"installed\" nor \"web\"".into())
    })?;

    let redirect_uri = entry
        .redirect_uris
        .into_iter()
        .next()
        .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

    Ok(OAuthClient::new(
        entry.client_id,
        entry.client_secret,
        redirect_uri,
    ))
}

/// Read and parse a client-secrets file.
pub async fn load_client_secrets(path: &Path) -> Result<OAuthClient> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Io(format!("reading {}: {e}", path.display())))?;
    parse_client_secrets(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installed_entry_is_used() {
        let json = r#"{"installed":{"client_id":"cid","client_secret":"cs","redirect_uris":["urn:ietf:wg:oauth:2.0:oob","http://localhost"]}}"#;
        let client = parse_client_secrets(json).unwrap();
        assert_eq!(client.client_id, "cid");
        assert_eq!(client.client_secret.expose_str(), "cs");
        assert_eq!(client.redirect_uri, "urn:ietf:wg:oauth:2.0:oob");
        assert_eq!(client.token_url, TOKEN_ENDPOINT);
    }

    #[test]
    fn web_entry_is_used_when_installed_absent() {
        let json = r#"{"web":{"client_id":"web-id","client_secret":"web-secret","redirect_uris":["https://example.com/cb"]}}"#;
        let client = parse_client_secrets(json).unwrap();
        assert_eq!(client.client_id, "web-id");
        assert_eq!(client.redirect_uri, "https://example.com/cb");
    }

    #[test]
    fn installed_takes_precedence_over_web() {
        let json = r#"{
            "installed":{"client_id":"installed-id","client_secret":"a","redirect_uris":["http://localhost"]},
            "web":{"client_id":"web-id","client_secret":"b","redirect_uris":["https://example.com"]}
        }"#;
        let client = parse_client_secrets(json).unwrap();
        assert_eq!(client.client_id, "installed-id");
    }

    #[test]
    fn missing_redirect_uris_defaults_to_localhost() {
        let json = r#"{"installed":{"client_id":"cid","client_secret":"cs"}}"#;
        let client = parse_client_secrets(json).unwrap();
        assert_eq!(client.redirect_uri, DEFAULT_REDIRECT_URI);
    }

    #[test]
    fn neither_entry_is_an_error() {
        let result = parse_client_secrets(r#"{"other":{}}"#);
        assert!(matches!(result, Err(Error::CredentialParse(_))));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_client_secrets("{not json").is_err());
    }

    #[test]
    fn debug_redacts_secret() {
        let client = OAuthClient::new("cid", "super-secret", "http://localhost");
        let debug = format!("{client:?}");
        assert!(debug.contains("cid"));
        assert!(!debug.contains("super-secret"));
    }

    #[tokio::test]
    async fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        tokio::fs::write(
            &path,
            r#"{"installed":{"client_id":"from-file","client_secret":"cs","redirect_uris":["http://localhost"]}}"#,
        )
        .await
        .unwrap();
        let client = load_client_secrets(&path).await.unwrap();
        assert_eq!(client.client_id, "from-file");
    }
}
